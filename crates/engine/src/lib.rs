//! `asm6809-engine` is the assembler proper: expression evaluation, the
//! symbol model, the section/span byte-emission model, per-family
//! instruction encoding for the full 6809/6309 sets, and the multi-pass
//! driver that re-assembles until addresses stop moving.
//!
//! The whole engine is one [`Assembler`] value — no globals — so the CLI
//! and the tests are both thin drivers:
//!
//! ```
//! use asm6809_engine::{Assembler, Options};
//!
//! let mut asm = Assembler::new(Options::default());
//! asm.add_source("demo.s", " org $4000\n lda #$10\n rts\n");
//! asm.run().unwrap();
//! let image = asm.image(true);
//! assert_eq!(image.segments[0].data, [0x86, 0x10, 0x39]);
//! ```

mod assemble;
mod assembler;
mod eval;
mod instr;
mod interp;
mod listing;
mod opcode;
mod program;
mod section;
mod symbol;

pub use assembler::{Assembler, Options, MAX_PASSES};
pub use opcode::{opcode_by_name, Family, Mode, Opcode};

pub use asm6809_parser::Isa;
