//! CPU registers and the instruction-set dialect that gates them.

use std::fmt;

/// Which instruction set the assembler is targeting.
///
/// The 6309 is a superset of the 6809; selecting [`Isa::Hd6309`] enables the
/// extra registers and the extended opcode set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Isa {
    /// Motorola 6809 (the default).
    #[default]
    Mc6809,
    /// Hitachi 6309 extensions enabled.
    Hd6309,
}

/// A named CPU register.
///
/// `Pcr` is not a real register: it is the "program counter relative" pseudo
/// register accepted in indexed addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    /// Condition codes.
    Cc,
    /// Accumulator A.
    A,
    /// Accumulator B.
    B,
    /// Direct page register.
    Dp,
    /// Index register X.
    X,
    /// Index register Y.
    Y,
    /// User stack pointer.
    U,
    /// System stack pointer.
    S,
    /// Program counter.
    Pc,
    /// Combined accumulator D (A:B).
    D,
    /// PC-relative pseudo register for indexed addressing.
    Pcr,
    /// 6309 accumulator E.
    E,
    /// 6309 accumulator F.
    F,
    /// 6309 combined accumulator W (E:F).
    W,
    /// 6309 combined accumulator Q (D:W).
    Q,
    /// 6309 zero register V.
    V,
}

const REGISTERS_6809: &[(&str, Reg)] = &[
    ("cc", Reg::Cc),
    ("a", Reg::A),
    ("b", Reg::B),
    ("dp", Reg::Dp),
    ("x", Reg::X),
    ("y", Reg::Y),
    ("u", Reg::U),
    ("s", Reg::S),
    ("pc", Reg::Pc),
    ("d", Reg::D),
    ("pcr", Reg::Pcr),
];

const REGISTERS_6309: &[(&str, Reg)] = &[
    ("e", Reg::E),
    ("f", Reg::F),
    ("w", Reg::W),
    ("q", Reg::Q),
    ("v", Reg::V),
];

impl Reg {
    /// Looks a register up by name, case-insensitively. Registers only valid
    /// on the 6309 are not recognised under [`Isa::Mc6809`].
    pub fn by_name(name: &str, isa: Isa) -> Option<Reg> {
        let tables: &[&[(&str, Reg)]] = match isa {
            Isa::Mc6809 => &[REGISTERS_6809],
            Isa::Hd6309 => &[REGISTERS_6309, REGISTERS_6809],
        };
        tables
            .iter()
            .flat_map(|table| table.iter())
            .find(|(reg_name, _)| reg_name.eq_ignore_ascii_case(name))
            .map(|(_, reg)| *reg)
    }

    /// The canonical (lower case) name of the register.
    pub fn name(self) -> &'static str {
        REGISTERS_6809
            .iter()
            .chain(REGISTERS_6309.iter())
            .find(|(_, reg)| *reg == self)
            .map(|(name, _)| *name)
            .expect("every register is named")
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
