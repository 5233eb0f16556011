//! End-to-end assembly tests: source text in, object bytes out.

use asm6809_engine::{Assembler, Isa, Options};
use asm6809_errors::Severity;
use pretty_assertions::assert_eq;

fn assemble_with(options: Options, source: &str) -> (Assembler, Vec<u8>) {
    let mut asm = Assembler::new(options);
    asm.add_source("test.s", source);
    asm.run().expect("assembles cleanly");
    let image = asm.image(true);
    let bytes = image.segments.first().map(|s| s.data.clone()).unwrap_or_default();
    (asm, bytes)
}

fn assemble(source: &str) -> Vec<u8> {
    assemble_with(Options::default(), source).1
}

fn assemble_6309(source: &str) -> Vec<u8> {
    assemble_with(Options { isa: Isa::Hd6309, ..Options::default() }, source).1
}

fn assemble_err(source: &str) -> Assembler {
    let mut asm = Assembler::new(Options::default());
    asm.add_source("test.s", source);
    asm.run().expect_err("assembly fails");
    asm
}

#[test]
fn test_immediate_and_inherent() {
    let bytes = assemble(" org $4000\n lda #$10\n rts\n");
    assert_eq!(bytes, vec![0x86, 0x10, 0x39]);
}

#[test]
fn test_direct_page_via_setdp() {
    // With the direct page established, an 8-bit encoding is selected.
    let bytes = assemble(" org $4000\n setdp $00\n lda $20\n");
    assert_eq!(bytes, vec![0x96, 0x20]);

    // Without it, the assembler has to use extended addressing.
    let bytes = assemble(" org $4000\n lda $20\n");
    assert_eq!(bytes, vec![0xb6, 0x00, 0x20]);
}

#[test]
fn test_size_forcing_on_addresses() {
    let bytes = assemble(" org $4000\n jmp >$0020\n jmp <$20\n");
    assert_eq!(bytes, vec![0x7e, 0x00, 0x20, 0x0e, 0x20]);
}

#[test]
fn test_relative_branches() {
    // `loop` is at $4000; the branches start 6 bytes in.
    let source = " org $4000\nloop rzb 6\n bra loop\n";
    assert_eq!(&assemble(source)[6..], [0x20, 0xf8]);

    let source = " org $4000\nloop rzb 6\n lbra loop\n";
    assert_eq!(&assemble(source)[6..], [0x16, 0xff, 0xf7]);
}

#[test]
fn test_long_branch_warns_when_short_would_do() {
    let (asm, _) = assemble_with(
        Options::default(),
        " org $4000\nloop nop\n lbra loop\n",
    );
    assert_eq!(asm.events().level(), Some(Severity::Warning));

    // Forcing 16 bits silences the warning.
    let (asm, _) = assemble_with(
        Options::default(),
        " org $4000\nloop nop\n lbra >loop\n",
    );
    assert_eq!(asm.events().level(), None);
}

#[test]
fn test_indexed_modes() {
    // Auto-increment, indirect auto-increment.
    assert_eq!(assemble(" org $4000\n ldx ,x+\n"), vec![0xae, 0x80]);
    assert_eq!(assemble(" org $4000\n ldx [,x++]\n"), vec![0xae, 0x91]);
    // No-offset and 5-bit constant offsets.
    assert_eq!(assemble(" org $4000\n ldx ,x\n"), vec![0xae, 0x84]);
    assert_eq!(assemble(" org $4000\n ldx 5,x\n"), vec![0xae, 0x05]);
    assert_eq!(assemble(" org $4000\n ldd -2,y\n"), vec![0xec, 0x3e]);
    // Accumulator offsets.
    assert_eq!(assemble(" org $4000\n lda b,x\n"), vec![0xa6, 0x85]);
    assert_eq!(assemble(" org $4000\n lda d,y\n"), vec![0xa6, 0xab]);
    // 8-bit and 16-bit constant offsets pick the smallest fit.
    assert_eq!(assemble(" org $4000\n ldx 100,u\n"), vec![0xae, 0xc8, 0x64]);
    assert_eq!(
        assemble(" org $4000\n ldx 1000,s\n"),
        vec![0xae, 0xe9, 0x03, 0xe8]
    );
    // Extended indirect.
    assert_eq!(
        assemble(" org $4000\n ldx [$fffe]\n"),
        vec![0xae, 0x9f, 0xff, 0xfe]
    );
}

#[test]
fn test_pcr_offset_resolves_relative() {
    let bytes = assemble(" org $4000\nback fcb $55\n ldx back,pcr\n");
    // Postbyte $8C, then the displacement from the end of the instruction.
    assert_eq!(bytes, vec![0x55, 0xae, 0x8c, 0xfc]);
}

#[test]
fn test_register_pair_transfer() {
    assert_eq!(assemble(" org $4000\n tfr x,y\n"), vec![0x1f, 0x12]);
    assert_eq!(assemble(" org $4000\n exg a,b\n"), vec![0x1e, 0x89]);
}

#[test]
fn test_mismatched_pair_sizes_are_illegal_but_encode() {
    let (asm, bytes) = assemble_with(Options::default(), " org $4000\n tfr a,x\n");
    assert_eq!(asm.events().level(), Some(Severity::Illegal));
    assert_eq!(bytes, vec![0x1f, 0x81]);
}

#[test]
fn test_stack_lists() {
    assert_eq!(assemble(" org $4000\n pshs cc,a,dp,x\n"), vec![0x34, 0x1b]);
    assert_eq!(assemble(" org $4000\n puls a,b,pc\n"), vec![0x35, 0x86]);
    assert_eq!(assemble(" org $4000\n pshu s\n"), vec![0x36, 0x40]);
}

#[test]
fn test_pushing_own_stack_pointer_fails() {
    let asm = assemble_err(" org $4000\n pshs s\n");
    assert!(asm.events().at_least(Severity::Syntax));
}

#[test]
fn test_forward_reference_converges() {
    let source = " org $4000\n setdp $40\nstart lda later\n rts\nlater fcb $55\n";
    let bytes = assemble(source);
    // Once `later` settles into the direct page, the load shrinks to the
    // 2-byte form and everything re-stabilises.
    assert_eq!(bytes, vec![0x96, 0x03, 0x39, 0x55]);
}

#[test]
fn test_local_labels() {
    let source = " org $4000\n1 nop\n bra 1b\n bra 1f\n1 rts\n";
    let bytes = assemble(source);
    assert_eq!(bytes, vec![0x12, 0x20, 0xfd, 0x20, 0x00, 0x39]);
}

#[test]
fn test_data_directives() {
    let bytes = assemble(" org $4000\n fcb 1,2\n fdb $1234\n fcc /HI/\n rzb 2\n");
    assert_eq!(bytes, vec![1, 2, 0x12, 0x34, b'H', b'I', 0, 0]);
}

#[test]
fn test_rmb_leaves_a_padded_gap() {
    let bytes = assemble(" org $4000\n fcb 1,2\n rmb 4\n fcb 3\n");
    assert_eq!(bytes, vec![1, 2, 0, 0, 0, 0, 3]);
}

#[test]
fn test_fill() {
    let bytes = assemble(" org $4000\n fill $aa,3\n");
    assert_eq!(bytes, vec![0xaa, 0xaa, 0xaa]);
}

#[test]
fn test_equ_and_set() {
    let bytes = assemble("n equ 3\n org $4000\n lda #n\n");
    assert_eq!(bytes, vec![0x86, 3]);

    // `set` symbols may be reassigned within a pass.
    let bytes = assemble("n set 1\n org $4000\n lda #n\nn set 2\n ldb #n\n");
    assert_eq!(bytes, vec![0x86, 1, 0xc6, 2]);

    // `equ` symbols may not.
    let asm = assemble_err("n equ 1\nn equ 2\n org $4000\n lda #n\n");
    assert!(asm.events().at_least(Severity::Syntax));
}

#[test]
fn test_expressions_in_operands() {
    let bytes = assemble(" org $4000\n lda #2+3*4\n ldb #%1010&%0110\n");
    assert_eq!(bytes, vec![0x86, 14, 0xc6, 0b0010]);
}

#[test]
fn test_pc_reference_in_expression() {
    // `*` is the address of the instruction.
    let bytes = assemble(" org $4000\n ldx #*\n");
    assert_eq!(bytes, vec![0x8e, 0x40, 0x00]);
}

#[test]
fn test_conditional_assembly() {
    let source = " org $4000\n if 1\n lda #1\n else\n lda #2\n endif\n";
    assert_eq!(assemble(source), vec![0x86, 1]);

    let source = " org $4000\n if 0\n lda #1\n elsif 1\n lda #2\n else\n lda #3\n endif\n";
    assert_eq!(assemble(source), vec![0x86, 2]);

    let source = " org $4000\n ifdef n\n lda #1\n endif\n rts\n";
    assert_eq!(assemble(source), vec![0x39]);

    let source = "n equ 1\n org $4000\n ifndef n\n lda #1\n endif\n rts\n";
    assert_eq!(assemble(source), vec![0x39]);
}

#[test]
fn test_macro_expansion() {
    let source = "\
twice macro
 lda #\\1
 ldb #\\1+1
 endm
 org $4000
 twice 4
";
    assert_eq!(assemble(source), vec![0x86, 4, 0xc6, 5]);
}

#[test]
fn test_macro_name_pasting() {
    let source = "\
val1 equ $11
pick macro
 lda #val\\1
 endm
 org $4000
 pick 1
";
    assert_eq!(assemble(source), vec![0x86, 0x11]);
}

#[test]
fn test_include_uses_cached_sources() {
    let mut asm = Assembler::new(Options::default());
    asm.preload_source("lib.s", "shared equ $22\n");
    asm.add_source("main.s", " include \"lib.s\"\n org $4000\n lda #shared\n");
    asm.run().expect("assembles");
    let image = asm.image(true);
    assert_eq!(image.segments[0].data, vec![0x86, 0x22]);
}

#[test]
fn test_sections_emit_separate_segments() {
    let source = " section \"code\"\n org $4000\n rts\n section \"data\"\n org $6000\n fcb $aa\n";
    let mut asm = Assembler::new(Options::default());
    asm.add_source("test.s", source);
    asm.run().expect("assembles");
    let image = asm.image(false);
    assert_eq!(image.segments.len(), 2);
    assert_eq!(image.segments[0].put, 0x4000);
    assert_eq!(image.segments[0].data, vec![0x39]);
    assert_eq!(image.segments[1].put, 0x6000);
    assert_eq!(image.segments[1].data, vec![0xaa]);
}

#[test]
fn test_end_records_default_exec() {
    let (asm, bytes) = assemble_with(Options::default(), " org $4000\n rts\n end $4000\n");
    assert_eq!(bytes, vec![0x39]);
    assert_eq!(asm.default_exec(), Some(0x4000));
}

#[test]
fn test_undefined_symbol_fails_after_max_passes() {
    let asm = assemble_err(" org $4000\n lda nowhere\n");
    assert!(asm.events().at_least(Severity::Inconsistent));
}

#[test]
fn test_6309_instructions() {
    assert_eq!(
        assemble_6309(" org $4000\n tfm x+,y+\n"),
        vec![0x11, 0x38, 0x12]
    );
    assert_eq!(
        assemble_6309(" org $4000\n tfm x-,y-\n"),
        vec![0x11, 0x39, 0x12]
    );
    assert_eq!(
        assemble_6309(" org $4000\n ldq #$12345678\n"),
        vec![0xcd, 0x12, 0x34, 0x56, 0x78]
    );
    assert_eq!(
        assemble_6309(" org $4000\n setdp $00\n aim #$0f,$20\n"),
        vec![0x02, 0x0f, 0x20]
    );
    assert_eq!(
        assemble_6309(" org $4000\n band a,1,2,<$40\n"),
        vec![0x11, 0x30, 0x4a, 0x40]
    );
    assert_eq!(assemble_6309(" org $4000\n addr x,y\n"), vec![0x10, 0x30, 0x12]);
    assert_eq!(assemble_6309(" org $4000\n ldw #$1234\n"), vec![0x10, 0x86, 0x12, 0x34]);
}

#[test]
fn test_6309_mnemonics_rejected_on_6809() {
    let asm = assemble_err(" org $4000\n ldq #1\n");
    assert!(asm.events().at_least(Severity::Syntax));
}

#[test]
fn test_exports() {
    let source = "value equ $1234\n export value\n org $4000\n rts\n";
    let (mut asm, _) = assemble_with(Options::default(), source);
    let mut out = Vec::new();
    asm.write_exports(&mut out).expect("writes");
    assert_eq!(String::from_utf8(out).unwrap(), "value\tequ\t4660\n");
}

#[test]
fn test_listing() {
    let options = Options { listing: true, ..Options::default() };
    let (asm, _) = assemble_with(options, " org $4000\n lda #$10 ; load\n");
    let mut out = Vec::new();
    asm.write_listing(&mut out).expect("writes");
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[1].starts_with("4000  8610"));
    assert!(lines[1].contains("lda #$10"));
}

#[test]
fn test_out_of_range_branch_is_reported_but_not_fatal() {
    // Out-of-range displacements are reported, bytes still emitted, and —
    // like the warnings — they do not fail the run.
    let (asm, bytes) = assemble_with(Options::default(), " org $4000\n bra $5000\n");
    assert_eq!(asm.events().level(), Some(Severity::OutOfRange));
    assert_eq!(bytes.len(), 2);
}
