//! The instruction tables.
//!
//! Each entry carries up to four opcode words — immediate, direct, indexed
//! and extended — with an instruction page prefix (`$10` or `$11`) in the
//! high byte where one applies. Which memory modes actually exist is tracked
//! separately in a flag set, because `NEG <$00` really is opcode `$00` and a
//! zero word cannot mean "absent". The [`Family`] says how the immediate
//! word and its operands are to be interpreted by the encoder.

use enumflags2::{bitflags, make_bitflags, BitFlags};

use asm6809_parser::Isa;

/// Memory addressing modes an instruction supports.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Direct-page addressing.
    Direct = 0b001,
    /// Indexed addressing (with postbyte).
    Indexed = 0b010,
    /// Extended (16-bit absolute) addressing.
    Extended = 0b100,
}

/// How the non-memory form of an instruction encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Memory modes only — stores, `JMP`, `LEAX`, …
    Mem,
    /// No operand.
    Inherent,
    /// 8-bit immediate.
    Imm8,
    /// 16-bit immediate.
    Imm16,
    /// 32-bit immediate (`LDQ #`).
    Imm32,
    /// Inter-register postbyte (`TFR`, `EXG`, 6309 `ADDR`…).
    Pair,
    /// Stack list against the S stack (`PSHS`, `PULS`).
    StackS,
    /// Stack list against the U stack (`PSHU`, `PULU`).
    StackU,
    /// 8-bit relative branch.
    Rel8,
    /// 16-bit relative branch.
    Rel16,
    /// 6309 immediate-to-memory (`AIM`, `OIM`, `EIM`, `TIM`).
    Imm8Mem,
    /// 6309 register-bit to memory-bit (`BAND`…`STBT`).
    RegMem,
    /// 6309 block transfer (`TFM`).
    Tfm,
}

/// One instruction table entry.
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    /// Mnemonic, lower case.
    pub name: &'static str,
    /// Encoder family for the immediate/inherent form.
    pub family: Family,
    /// Memory modes present.
    pub modes: BitFlags<Mode>,
    /// Opcode word for the immediate/inherent form.
    pub immediate: u16,
    /// Opcode word for direct addressing.
    pub direct: u16,
    /// Opcode word for indexed addressing.
    pub indexed: u16,
    /// Opcode word for extended addressing.
    pub extended: u16,
}

/// An entry whose only operand bytes come from the immediate word:
/// inherent instructions, branches, stack lists, register pairs.
const fn word_only(name: &'static str, family: Family, op: u16) -> Opcode {
    Opcode {
        name,
        family,
        modes: BitFlags::EMPTY,
        immediate: op,
        direct: 0,
        indexed: 0,
        extended: 0,
    }
}

const fn inherent(name: &'static str, op: u16) -> Opcode {
    word_only(name, Family::Inherent, op)
}

const fn imm8(name: &'static str, op: u16) -> Opcode {
    word_only(name, Family::Imm8, op)
}

const fn rel8(name: &'static str, op: u16) -> Opcode {
    word_only(name, Family::Rel8, op)
}

const fn rel16(name: &'static str, op: u16) -> Opcode {
    word_only(name, Family::Rel16, op)
}

const fn pair(name: &'static str, op: u16) -> Opcode {
    word_only(name, Family::Pair, op)
}

const ALL_MEM: BitFlags<Mode> = make_bitflags!(Mode::{Direct | Indexed | Extended});

/// Immediate plus all three memory modes.
const fn mem(
    name: &'static str,
    family: Family,
    imm: u16,
    dir: u16,
    idx: u16,
    ext: u16,
) -> Opcode {
    Opcode {
        name,
        family,
        modes: ALL_MEM,
        immediate: imm,
        direct: dir,
        indexed: idx,
        extended: ext,
    }
}

/// Memory modes only, no immediate form.
const fn store(name: &'static str, dir: u16, idx: u16, ext: u16) -> Opcode {
    Opcode {
        name,
        family: Family::Mem,
        modes: ALL_MEM,
        immediate: 0,
        direct: dir,
        indexed: idx,
        extended: ext,
    }
}

/// Indexed only (`LEAX` and friends).
const fn indexed_only(name: &'static str, idx: u16) -> Opcode {
    Opcode {
        name,
        family: Family::Mem,
        modes: make_bitflags!(Mode::{Indexed}),
        immediate: 0,
        direct: 0,
        indexed: idx,
        extended: 0,
    }
}

/// 6309 immediate-to-memory.
const fn imm8_mem(name: &'static str, dir: u16, idx: u16, ext: u16) -> Opcode {
    Opcode {
        name,
        family: Family::Imm8Mem,
        modes: ALL_MEM,
        immediate: 0,
        direct: dir,
        indexed: idx,
        extended: ext,
    }
}

/// 6309 register-bit to direct memory.
const fn reg_mem(name: &'static str, dir: u16) -> Opcode {
    Opcode {
        name,
        family: Family::RegMem,
        modes: make_bitflags!(Mode::{Direct}),
        immediate: 0,
        direct: dir,
        indexed: 0,
        extended: 0,
    }
}

const fn stack(name: &'static str, family: Family, op: u16) -> Opcode {
    word_only(name, family, op)
}

static OPCODES_6809: &[Opcode] = &[
    // Read-modify-write memory.
    store("neg", 0x00, 0x60, 0x70),
    store("com", 0x03, 0x63, 0x73),
    store("lsr", 0x04, 0x64, 0x74),
    store("ror", 0x06, 0x66, 0x76),
    store("asr", 0x07, 0x67, 0x77),
    store("asl", 0x08, 0x68, 0x78),
    store("lsl", 0x08, 0x68, 0x78),
    store("rol", 0x09, 0x69, 0x79),
    store("dec", 0x0a, 0x6a, 0x7a),
    store("inc", 0x0c, 0x6c, 0x7c),
    store("tst", 0x0d, 0x6d, 0x7d),
    store("jmp", 0x0e, 0x6e, 0x7e),
    store("clr", 0x0f, 0x6f, 0x7f),
    store("jsr", 0x9d, 0xad, 0xbd),
    // Inherent.
    inherent("nop", 0x12),
    inherent("sync", 0x13),
    inherent("daa", 0x19),
    inherent("sex", 0x1d),
    inherent("rts", 0x39),
    inherent("abx", 0x3a),
    inherent("rti", 0x3b),
    inherent("mul", 0x3d),
    inherent("swi", 0x3f),
    inherent("swi2", 0x103f),
    inherent("swi3", 0x113f),
    inherent("nega", 0x40),
    inherent("coma", 0x43),
    inherent("lsra", 0x44),
    inherent("rora", 0x46),
    inherent("asra", 0x47),
    inherent("asla", 0x48),
    inherent("lsla", 0x48),
    inherent("rola", 0x49),
    inherent("deca", 0x4a),
    inherent("inca", 0x4c),
    inherent("tsta", 0x4d),
    inherent("clra", 0x4f),
    inherent("negb", 0x50),
    inherent("comb", 0x53),
    inherent("lsrb", 0x54),
    inherent("rorb", 0x56),
    inherent("asrb", 0x57),
    inherent("aslb", 0x58),
    inherent("lslb", 0x58),
    inherent("rolb", 0x59),
    inherent("decb", 0x5a),
    inherent("incb", 0x5c),
    inherent("tstb", 0x5d),
    inherent("clrb", 0x5f),
    // Immediate only.
    imm8("orcc", 0x1a),
    imm8("andcc", 0x1c),
    imm8("cwai", 0x3c),
    // Short branches.
    rel8("bra", 0x20),
    rel8("brn", 0x21),
    rel8("bhi", 0x22),
    rel8("bls", 0x23),
    rel8("bhs", 0x24),
    rel8("bcc", 0x24),
    rel8("blo", 0x25),
    rel8("bcs", 0x25),
    rel8("bne", 0x26),
    rel8("beq", 0x27),
    rel8("bvc", 0x28),
    rel8("bvs", 0x29),
    rel8("bpl", 0x2a),
    rel8("bmi", 0x2b),
    rel8("bge", 0x2c),
    rel8("blt", 0x2d),
    rel8("bgt", 0x2e),
    rel8("ble", 0x2f),
    rel8("bsr", 0x8d),
    // Long branches.
    rel16("lbra", 0x16),
    rel16("lbsr", 0x17),
    rel16("lbrn", 0x1021),
    rel16("lbhi", 0x1022),
    rel16("lbls", 0x1023),
    rel16("lbhs", 0x1024),
    rel16("lbcc", 0x1024),
    rel16("lblo", 0x1025),
    rel16("lbcs", 0x1025),
    rel16("lbne", 0x1026),
    rel16("lbeq", 0x1027),
    rel16("lbvc", 0x1028),
    rel16("lbvs", 0x1029),
    rel16("lbpl", 0x102a),
    rel16("lbmi", 0x102b),
    rel16("lbge", 0x102c),
    rel16("lblt", 0x102d),
    rel16("lbgt", 0x102e),
    rel16("lble", 0x102f),
    // Load effective address.
    indexed_only("leax", 0x30),
    indexed_only("leay", 0x31),
    indexed_only("leas", 0x32),
    indexed_only("leau", 0x33),
    // Stack lists.
    stack("pshs", Family::StackS, 0x34),
    stack("puls", Family::StackS, 0x35),
    stack("pshu", Family::StackU, 0x36),
    stack("pulu", Family::StackU, 0x37),
    // Inter-register.
    pair("exg", 0x1e),
    pair("tfr", 0x1f),
    // 8-bit accumulator memory ops.
    mem("suba", Family::Imm8, 0x80, 0x90, 0xa0, 0xb0),
    mem("cmpa", Family::Imm8, 0x81, 0x91, 0xa1, 0xb1),
    mem("sbca", Family::Imm8, 0x82, 0x92, 0xa2, 0xb2),
    mem("anda", Family::Imm8, 0x84, 0x94, 0xa4, 0xb4),
    mem("bita", Family::Imm8, 0x85, 0x95, 0xa5, 0xb5),
    mem("lda", Family::Imm8, 0x86, 0x96, 0xa6, 0xb6),
    mem("eora", Family::Imm8, 0x88, 0x98, 0xa8, 0xb8),
    mem("adca", Family::Imm8, 0x89, 0x99, 0xa9, 0xb9),
    mem("ora", Family::Imm8, 0x8a, 0x9a, 0xaa, 0xba),
    mem("adda", Family::Imm8, 0x8b, 0x9b, 0xab, 0xbb),
    mem("subb", Family::Imm8, 0xc0, 0xd0, 0xe0, 0xf0),
    mem("cmpb", Family::Imm8, 0xc1, 0xd1, 0xe1, 0xf1),
    mem("sbcb", Family::Imm8, 0xc2, 0xd2, 0xe2, 0xf2),
    mem("andb", Family::Imm8, 0xc4, 0xd4, 0xe4, 0xf4),
    mem("bitb", Family::Imm8, 0xc5, 0xd5, 0xe5, 0xf5),
    mem("ldb", Family::Imm8, 0xc6, 0xd6, 0xe6, 0xf6),
    mem("eorb", Family::Imm8, 0xc8, 0xd8, 0xe8, 0xf8),
    mem("adcb", Family::Imm8, 0xc9, 0xd9, 0xe9, 0xf9),
    mem("orb", Family::Imm8, 0xca, 0xda, 0xea, 0xfa),
    mem("addb", Family::Imm8, 0xcb, 0xdb, 0xeb, 0xfb),
    // 16-bit memory ops.
    mem("subd", Family::Imm16, 0x83, 0x93, 0xa3, 0xb3),
    mem("cmpx", Family::Imm16, 0x8c, 0x9c, 0xac, 0xbc),
    mem("ldx", Family::Imm16, 0x8e, 0x9e, 0xae, 0xbe),
    mem("addd", Family::Imm16, 0xc3, 0xd3, 0xe3, 0xf3),
    mem("ldd", Family::Imm16, 0xcc, 0xdc, 0xec, 0xfc),
    mem("ldu", Family::Imm16, 0xce, 0xde, 0xee, 0xfe),
    mem("cmpd", Family::Imm16, 0x1083, 0x1093, 0x10a3, 0x10b3),
    mem("cmpy", Family::Imm16, 0x108c, 0x109c, 0x10ac, 0x10bc),
    mem("ldy", Family::Imm16, 0x108e, 0x109e, 0x10ae, 0x10be),
    mem("lds", Family::Imm16, 0x10ce, 0x10de, 0x10ee, 0x10fe),
    mem("cmpu", Family::Imm16, 0x1183, 0x1193, 0x11a3, 0x11b3),
    mem("cmps", Family::Imm16, 0x118c, 0x119c, 0x11ac, 0x11bc),
    // Stores.
    store("sta", 0x97, 0xa7, 0xb7),
    store("stb", 0xd7, 0xe7, 0xf7),
    store("std", 0xdd, 0xed, 0xfd),
    store("stx", 0x9f, 0xaf, 0xbf),
    store("stu", 0xdf, 0xef, 0xff),
    store("sty", 0x109f, 0x10af, 0x10bf),
    store("sts", 0x10df, 0x10ef, 0x10ff),
];

static OPCODES_6309: &[Opcode] = &[
    // Immediate-to-memory.
    imm8_mem("oim", 0x01, 0x61, 0x71),
    imm8_mem("aim", 0x02, 0x62, 0x72),
    imm8_mem("eim", 0x05, 0x65, 0x75),
    imm8_mem("tim", 0x0b, 0x6b, 0x7b),
    // Inherent.
    inherent("sexw", 0x14),
    inherent("pshsw", 0x1038),
    inherent("pulsw", 0x1039),
    inherent("pshuw", 0x103a),
    inherent("puluw", 0x103b),
    inherent("negd", 0x1040),
    inherent("comd", 0x1043),
    inherent("lsrd", 0x1044),
    inherent("rord", 0x1046),
    inherent("asrd", 0x1047),
    inherent("asld", 0x1048),
    inherent("lsld", 0x1048),
    inherent("rold", 0x1049),
    inherent("decd", 0x104a),
    inherent("incd", 0x104c),
    inherent("tstd", 0x104d),
    inherent("clrd", 0x104f),
    inherent("comw", 0x1053),
    inherent("lsrw", 0x1054),
    inherent("rorw", 0x1056),
    inherent("rolw", 0x1059),
    inherent("decw", 0x105a),
    inherent("incw", 0x105c),
    inherent("tstw", 0x105d),
    inherent("clrw", 0x105f),
    inherent("come", 0x1143),
    inherent("dece", 0x114a),
    inherent("ince", 0x114c),
    inherent("tste", 0x114d),
    inherent("clre", 0x114f),
    inherent("comf", 0x1153),
    inherent("decf", 0x115a),
    inherent("incf", 0x115c),
    inherent("tstf", 0x115d),
    inherent("clrf", 0x115f),
    // Inter-register arithmetic.
    pair("addr", 0x1030),
    pair("adcr", 0x1031),
    pair("subr", 0x1032),
    pair("sbcr", 0x1033),
    pair("andr", 0x1034),
    pair("orr", 0x1035),
    pair("eorr", 0x1036),
    pair("cmpr", 0x1037),
    // 16-bit memory ops.
    mem("subw", Family::Imm16, 0x1080, 0x1090, 0x10a0, 0x10b0),
    mem("cmpw", Family::Imm16, 0x1081, 0x1091, 0x10a1, 0x10b1),
    mem("sbcd", Family::Imm16, 0x1082, 0x1092, 0x10a2, 0x10b2),
    mem("andd", Family::Imm16, 0x1084, 0x1094, 0x10a4, 0x10b4),
    mem("bitd", Family::Imm16, 0x1085, 0x1095, 0x10a5, 0x10b5),
    mem("ldw", Family::Imm16, 0x1086, 0x1096, 0x10a6, 0x10b6),
    mem("eord", Family::Imm16, 0x1088, 0x1098, 0x10a8, 0x10b8),
    mem("adcd", Family::Imm16, 0x1089, 0x1099, 0x10a9, 0x10b9),
    mem("ord", Family::Imm16, 0x108a, 0x109a, 0x10aa, 0x10ba),
    mem("addw", Family::Imm16, 0x108b, 0x109b, 0x10ab, 0x10bb),
    mem("divq", Family::Imm16, 0x118e, 0x119e, 0x11ae, 0x11be),
    mem("muld", Family::Imm16, 0x118f, 0x119f, 0x11af, 0x11bf),
    // 8-bit memory ops.
    mem("sube", Family::Imm8, 0x1180, 0x1190, 0x11a0, 0x11b0),
    mem("cmpe", Family::Imm8, 0x1181, 0x1191, 0x11a1, 0x11b1),
    mem("lde", Family::Imm8, 0x1186, 0x1196, 0x11a6, 0x11b6),
    mem("adde", Family::Imm8, 0x118b, 0x119b, 0x11ab, 0x11bb),
    mem("divd", Family::Imm8, 0x118d, 0x119d, 0x11ad, 0x11bd),
    mem("subf", Family::Imm8, 0x11c0, 0x11d0, 0x11e0, 0x11f0),
    mem("cmpf", Family::Imm8, 0x11c1, 0x11d1, 0x11e1, 0x11f1),
    mem("ldf", Family::Imm8, 0x11c6, 0x11d6, 0x11e6, 0x11f6),
    mem("addf", Family::Imm8, 0x11cb, 0x11db, 0x11eb, 0x11fb),
    // 32-bit load and the stores.
    mem("ldq", Family::Imm32, 0x00cd, 0x10dc, 0x10ec, 0x10fc),
    store("stw", 0x1097, 0x10a7, 0x10b7),
    store("stq", 0x10dd, 0x10ed, 0x10fd),
    store("ste", 0x1197, 0x11a7, 0x11b7),
    store("stf", 0x11d7, 0x11e7, 0x11f7),
    // Mode register.
    imm8("bitmd", 0x113c),
    imm8("ldmd", 0x113d),
    // Bit operations on direct memory.
    reg_mem("band", 0x1130),
    reg_mem("biand", 0x1131),
    reg_mem("bor", 0x1132),
    reg_mem("bior", 0x1133),
    reg_mem("beor", 0x1134),
    reg_mem("bieor", 0x1135),
    reg_mem("ldbt", 0x1136),
    reg_mem("stbt", 0x1137),
    // Block transfer. The four variants are immediate + 0..3.
    stack("tfm", Family::Tfm, 0x1138),
];

/// Looks a mnemonic up, case-insensitively. 6309-only instructions resolve
/// only under [`Isa::Hd6309`].
pub fn opcode_by_name(name: &str, isa: Isa) -> Option<&'static Opcode> {
    let tables: &[&[Opcode]] = match isa {
        Isa::Mc6809 => &[OPCODES_6809],
        Isa::Hd6309 => &[OPCODES_6309, OPCODES_6809],
    };
    tables
        .iter()
        .flat_map(|table| table.iter())
        .find(|op| op.name.eq_ignore_ascii_case(name))
}

impl Opcode {
    /// How many bytes the given opcode word occupies: two when it carries a
    /// page prefix, one otherwise.
    pub fn word_size(word: u16) -> usize {
        if word & 0xff00 != 0 {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        let op = opcode_by_name("LDA", Isa::Mc6809).expect("lda exists");
        assert_eq!(op.immediate, 0x86);
        assert_eq!(op.direct, 0x96);
        assert_eq!(op.indexed, 0xa6);
        assert_eq!(op.extended, 0xb6);
        assert_eq!(op.family, Family::Imm8);
    }

    #[test]
    fn test_6309_gated() {
        assert!(opcode_by_name("ldq", Isa::Mc6809).is_none());
        let op = opcode_by_name("ldq", Isa::Hd6309).expect("ldq exists on 6309");
        assert_eq!(op.immediate, 0xcd);
        assert_eq!(op.family, Family::Imm32);
    }

    #[test]
    fn test_aliases_share_encodings() {
        let asl = opcode_by_name("asl", Isa::Mc6809).unwrap();
        let lsl = opcode_by_name("lsl", Isa::Mc6809).unwrap();
        assert_eq!(asl.direct, lsl.direct);

        let bhs = opcode_by_name("bhs", Isa::Mc6809).unwrap();
        let bcc = opcode_by_name("bcc", Isa::Mc6809).unwrap();
        assert_eq!(bhs.immediate, bcc.immediate);
    }

    #[test]
    fn test_neg_direct_is_zero_but_present() {
        let neg = opcode_by_name("neg", Isa::Mc6809).unwrap();
        assert_eq!(neg.direct, 0x00);
        assert!(neg.modes.contains(Mode::Direct));
        assert_eq!(neg.family, Family::Mem);
    }

    #[test]
    fn test_page_prefix_sizing() {
        assert_eq!(Opcode::word_size(0x86), 1);
        assert_eq!(Opcode::word_size(0x1083), 2);
    }
}
