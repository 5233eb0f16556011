//! `asm6809-bin` is the executable of the assembler.
//!
//! It parses the command line, drives the engine over the source files, and
//! hands the finished image to the selected output format.

mod error;

use std::{
    env,
    ffi::OsString,
    fs::File,
    io::Write as _,
    path::{Path, PathBuf},
    process,
};

use argh::FromArgs;
use asm6809_engine::{Assembler, Isa, Options};
use asm6809_errors::{Result, Severity};
use asm6809_object::Format;
use error::Error;

/// The `asm6809` command assembles Motorola 6809 and Hitachi 6309 source
/// code. If more than one SOURCE-FILE is specified, they are assembled as
/// though they were all in one file.
#[derive(Debug, FromArgs)]
struct Asm6809 {
    /// output to binary file (default)
    #[argh(switch, short = 'B')]
    bin: bool,

    /// output to DragonDOS binary file
    #[argh(switch, short = 'D')]
    dragondos: bool,

    /// output to CoCo segmented binary file
    #[argh(switch, short = 'C')]
    coco: bool,

    /// output to Motorola SREC file
    #[argh(switch, short = 'S')]
    srec: bool,

    /// output to Intel hex record file
    #[argh(switch, short = 'H')]
    hex: bool,

    /// EXEC address (for output formats that support one)
    #[argh(option, short = 'e')]
    exec: Option<String>,

    /// set output filename
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// create listing file
    #[argh(option, short = 'l')]
    listing: Option<PathBuf>,

    /// create symbol table
    #[argh(option, short = 's')]
    symbols: Option<PathBuf>,

    /// enable 6309 extensions
    #[argh(switch, long = "6309")]
    hd6309: bool,

    /// show program version
    #[argh(switch)]
    version: bool,

    /// source files
    #[argh(positional)]
    source_files: Vec<PathBuf>,
}

impl Asm6809 {
    /// Creates a new `Self` type based on [`std::env::args_os`].
    fn new() -> Result<Self, Error> {
        // Collect all arguments.
        let arguments =
            env::args_os().map(OsString::into_string).collect::<Result<Vec<_>, _>>().map_err(
                |argument| Error::InvalidArgumentEncoding(argument.to_string_lossy().to_string()),
            )?;

        // Check whether `argv` is present.
        if arguments.is_empty() {
            return Err(Error::ProgramNameIsMissing);
        }

        // Extract the base command from a path.
        let command = Path::new(&arguments[0])
            .file_name()
            .and_then(|file_name| file_name.to_str())
            .unwrap_or(&arguments[0]);

        // Extract all arguments.
        let arguments =
            arguments.iter().skip(1).map(|argument| argument.as_str()).collect::<Vec<_>>();

        // Parse and build `Self`.
        match Asm6809::from_args(&[command], &arguments) {
            Ok(asm6809) => Ok(asm6809),
            Err(early_exit) => match early_exit.status {
                // The command was parsed successfully and the early exit is due to a flag like
                // `--help` causing early exit with output.
                Ok(()) => {
                    println!("{}", early_exit.output);

                    process::exit(0);
                }

                // The arguments were not successfully parsed.
                Err(()) => Err(Error::CommandLine(early_exit.output.trim().to_string())),
            },
        }
    }

    fn format(&self) -> Format {
        if self.hex {
            Format::IntelHex
        } else if self.srec {
            Format::Srec
        } else if self.coco {
            Format::Coco
        } else if self.dragondos {
            Format::DragonDos
        } else {
            // `-B` merely reasserts the default.
            let _ = self.bin;
            Format::Binary
        }
    }
}

fn main() -> Result<()> {
    // Install the error report.
    Error::install_and_configure()?;

    // Logging is opt-in via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Build the command-line arguments.
    let asm6809 = Asm6809::new()?;

    if asm6809.version {
        println!("asm6809 {}", env!("CARGO_PKG_VERSION"));

        return Ok(());
    }

    let options = Options {
        isa: if asm6809.hd6309 { Isa::Hd6309 } else { Isa::Mc6809 },
        listing: asm6809.listing.is_some(),
        ..Options::default()
    };
    let mut asm = Assembler::new(options);

    // Read in each file.
    for path in &asm6809.source_files {
        asm.add_file(&path.to_string_lossy())?;
    }

    // Assemble until consistent, then report everything that survived.
    let outcome = asm.run();
    eprint!("{}", asm.events());
    let reported = asm.events().events().len();
    outcome?;

    // Generate the listing file.
    if let Some(path) = &asm6809.listing {
        let mut file = create(path)?;
        asm.write_listing(&mut file).map_err(|source| io_error(path, source))?;
    }

    // Generate the output file.
    if let Some(path) = &asm6809.output {
        let format = asm6809.format();

        // Only an explicit `--exec` reaches the binary format, where it is
        // an error; the others may fall back to an `end` address.
        let exec = match &asm6809.exec {
            Some(text) => match asm.exec_address(text) {
                Some(addr) => Some(addr),
                None => {
                    report_tail(&asm, reported);
                    return Err(asm6809_errors::Error::AssemblyFailed(1).into());
                }
            },
            None if format == Format::Binary => None,
            None => asm.default_exec(),
        };

        let image = asm.image(format.wants_padding());
        let mut file = create(path)?;
        format.write(&image, exec, &mut file).map_err(Error::Object)?;
        file.flush().map_err(|source| io_error(path, source))?;
    }

    // Generate the symbols file.
    if let Some(path) = &asm6809.symbols {
        let mut file = create(path)?;
        asm.write_exports(&mut file).map_err(|source| io_error(path, source))?;
    }

    // Anything new to complain about in all that?
    report_tail(&asm, reported);
    if asm.events().at_least(Severity::Syntax) {
        return Err(asm6809_errors::Error::AssemblyFailed(asm.events().events().len()).into());
    }

    Ok(())
}

/// Prints the events recorded after the first `already_reported` ones, i.e.
/// those produced by output generation.
fn report_tail(asm: &Assembler, already_reported: usize) {
    for event in asm.events().events().iter().skip(already_reported) {
        eprintln!("{event}");
    }
}

fn create(path: &Path) -> Result<File, Error> {
    File::create(path).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::OutputFile { path: path.display().to_string(), source }
}
