//! Stack VM code generation
//!
//! Instruction fragments, label allocation, and the fixed code shapes for
//! control flow and program assembly.

use std::fmt;

use crate::semantic::{BinaryOp, SymbolTable};
use crate::types::{Type, TypedExpr};

/// VM instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    PushI(i64),
    PushF(f64),
    PushS(String),
    PushG(usize),
    StoreG(usize),
    Load(i64),
    Store(i64),

    Add,
    FAdd,
    Sub,
    FSub,
    Mul,
    FMul,
    Div,
    FDiv,
    Mod,
    Itof,

    Inf,
    Sup,
    InfEq,
    SupEq,
    FInf,
    FSup,
    FInfEq,
    FSupEq,
    Equal,
    Not,
    And,
    Or,

    Concat,
    Strlen,
    AllocN,
    PAdd,

    Jump(Label),
    Jz(Label),
    /// Label definition
    Mark(Label),

    WriteI,
    WriteF,
    WriteS,
    WriteLn,
    Read,
    Atoi,
    Atof,

    Start,
    Stop,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushI(n) => write!(f, "pushi {}", n),
            Instr::PushF(x) => write!(f, "pushf {}", format_real(*x)),
            Instr::PushS(s) => write!(
                f,
                "pushs \"{}\"",
                s.replace('"', "\\\"").replace('\n', "\\n")
            ),
            Instr::PushG(addr) => write!(f, "pushg {}", addr),
            Instr::StoreG(addr) => write!(f, "storeg {}", addr),
            Instr::Load(n) => write!(f, "load {}", n),
            Instr::Store(n) => write!(f, "store {}", n),
            Instr::Add => f.write_str("add"),
            Instr::FAdd => f.write_str("fadd"),
            Instr::Sub => f.write_str("sub"),
            Instr::FSub => f.write_str("fsub"),
            Instr::Mul => f.write_str("mul"),
            Instr::FMul => f.write_str("fmul"),
            Instr::Div => f.write_str("div"),
            Instr::FDiv => f.write_str("fdiv"),
            Instr::Mod => f.write_str("mod"),
            Instr::Itof => f.write_str("itof"),
            Instr::Inf => f.write_str("inf"),
            Instr::Sup => f.write_str("sup"),
            Instr::InfEq => f.write_str("infeq"),
            Instr::SupEq => f.write_str("supeq"),
            Instr::FInf => f.write_str("finf"),
            Instr::FSup => f.write_str("fsup"),
            Instr::FInfEq => f.write_str("finfeq"),
            Instr::FSupEq => f.write_str("fsupeq"),
            Instr::Equal => f.write_str("equal"),
            Instr::Not => f.write_str("not"),
            Instr::And => f.write_str("and"),
            Instr::Or => f.write_str("or"),
            Instr::Concat => f.write_str("concat"),
            Instr::Strlen => f.write_str("strlen"),
            Instr::AllocN => f.write_str("allocn"),
            Instr::PAdd => f.write_str("padd"),
            Instr::Jump(label) => write!(f, "jump {}", label),
            Instr::Jz(label) => write!(f, "jz {}", label),
            Instr::Mark(label) => write!(f, "{}:", label),
            Instr::WriteI => f.write_str("writei"),
            Instr::WriteF => f.write_str("writef"),
            Instr::WriteS => f.write_str("writes"),
            Instr::WriteLn => f.write_str("writeln"),
            Instr::Read => f.write_str("read"),
            Instr::Atoi => f.write_str("atoi"),
            Instr::Atof => f.write_str("atof"),
            Instr::Start => f.write_str("start"),
            Instr::Stop => f.write_str("stop"),
        }
    }
}

/// Shortest round-trip form of a real; exponents carry a sign and at
/// least two digits (`1e+20`, `1.5e-07`)
fn format_real(x: f64) -> String {
    let text = format!("{:?}", x);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

/// Jump target family; the prefix of the emitted label name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Else,
    EndIf,
    While,
    EndWhile,
    ForStart,
    ForEnd,
    RepeatStart,
    BoolFalse,
    BoolEnd,
}

impl LabelKind {
    fn prefix(self) -> &'static str {
        match self {
            LabelKind::Else => "else",
            LabelKind::EndIf => "endif",
            LabelKind::While => "while",
            LabelKind::EndWhile => "endwhile",
            LabelKind::ForStart => "forstart",
            LabelKind::ForEnd => "forend",
            LabelKind::RepeatStart => "repeatstart",
            LabelKind::BoolFalse => "boolfalse",
            LabelKind::BoolEnd => "boolend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub kind: LabelKind,
    pub id: u32,
}

impl Label {
    pub fn new(kind: LabelKind, id: u32) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

/// Monotonic label id source; ids are never reused within a compilation
#[derive(Debug, Clone, Default)]
pub struct LabelCounter {
    next: u32,
}

impl LabelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u32 {
        self.next
    }
}

/// An instruction fragment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Code(Vec<Instr>);

impl Code {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, instr: Instr) {
        self.0.push(instr);
    }

    pub fn append(&mut self, mut other: Code) {
        self.0.append(&mut other.0);
    }

    /// Chainable form of [`Code::append`]
    pub fn then(mut self, other: impl Into<Code>) -> Self {
        self.append(other.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instr> {
        self.0.iter()
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.0
    }

    /// Rendered instruction lines
    pub fn lines(&self) -> Vec<String> {
        self.0.iter().map(Instr::to_string).collect()
    }
}

impl From<Vec<Instr>> for Code {
    fn from(instrs: Vec<Instr>) -> Self {
        Self(instrs)
    }
}

impl From<Instr> for Code {
    fn from(instr: Instr) -> Self {
        Self(vec![instr])
    }
}

impl FromIterator<Instr> for Code {
    fn from_iter<I: IntoIterator<Item = Instr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Instr> for Code {
    fn extend<I: IntoIterator<Item = Instr>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Code {
    type Item = Instr;
    type IntoIter = std::vec::IntoIter<Instr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Code {
    type Item = &'a Instr;
    type IntoIter = std::slice::Iter<'a, Instr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", instr)?;
        }
        Ok(())
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Instructions for a checked binary operator.
///
/// `real` selects the floating-point family; operands must already have
/// been widened by the caller.
pub fn binary_instrs(op: BinaryOp, real: bool) -> Vec<Instr> {
    match (op, real) {
        (BinaryOp::Add, false) => vec![Instr::Add],
        (BinaryOp::Add, true) => vec![Instr::FAdd],
        (BinaryOp::Sub, false) => vec![Instr::Sub],
        (BinaryOp::Sub, true) => vec![Instr::FSub],
        (BinaryOp::Mul, false) => vec![Instr::Mul],
        (BinaryOp::Mul, true) => vec![Instr::FMul],
        (BinaryOp::Divide, _) => vec![Instr::FDiv],
        (BinaryOp::IntDiv, _) => vec![Instr::Div],
        (BinaryOp::Mod, _) => vec![Instr::Mod],
        (BinaryOp::Lt, false) => vec![Instr::Inf],
        (BinaryOp::Lt, true) => vec![Instr::FInf],
        (BinaryOp::Gt, false) => vec![Instr::Sup],
        (BinaryOp::Gt, true) => vec![Instr::FSup],
        (BinaryOp::Le, false) => vec![Instr::InfEq],
        (BinaryOp::Le, true) => vec![Instr::FInfEq],
        (BinaryOp::Ge, false) => vec![Instr::SupEq],
        (BinaryOp::Ge, true) => vec![Instr::FSupEq],
        (BinaryOp::Eq, _) => vec![Instr::Equal],
        (BinaryOp::Ne, _) => vec![Instr::Equal, Instr::Not],
        (BinaryOp::And, _) => vec![Instr::And],
        (BinaryOp::Or, _) => vec![Instr::Or],
    }
}

// =============================================================================
// Control flow
// =============================================================================

pub fn if_then(cond: Code, then_code: Code, id: u32) -> Code {
    let end = Label::new(LabelKind::EndIf, id);
    cond.then(Instr::Jz(end))
        .then(then_code)
        .then(Instr::Mark(end))
}

pub fn if_then_else(cond: Code, then_code: Code, else_code: Code, id: u32) -> Code {
    let else_label = Label::new(LabelKind::Else, id);
    let end = Label::new(LabelKind::EndIf, id);
    cond.then(Instr::Jz(else_label))
        .then(then_code)
        .then(vec![Instr::Jump(end), Instr::Mark(else_label)])
        .then(else_code)
        .then(Instr::Mark(end))
}

pub fn while_do(cond: Code, body: Code, id: u32) -> Code {
    let start = Label::new(LabelKind::While, id);
    let end = Label::new(LabelKind::EndWhile, id);
    Code::from(Instr::Mark(start))
        .then(cond)
        .then(Instr::Jz(end))
        .then(body)
        .then(vec![Instr::Jump(start), Instr::Mark(end)])
}

/// Loop direction of a `for` statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    To,
    Downto,
}

/// Counted loop over the global at `var`; bounds are inclusive
pub fn for_loop(
    var: usize,
    start: Code,
    end: Code,
    body: Code,
    direction: Direction,
    id: u32,
) -> Code {
    let head = Label::new(LabelKind::ForStart, id);
    let exit = Label::new(LabelKind::ForEnd, id);
    let (test, step) = match direction {
        Direction::To => (Instr::InfEq, Instr::Add),
        Direction::Downto => (Instr::SupEq, Instr::Sub),
    };
    start
        .then(vec![Instr::StoreG(var), Instr::Mark(head), Instr::PushG(var)])
        .then(end)
        .then(vec![test, Instr::Jz(exit)])
        .then(body)
        .then(vec![
            Instr::PushG(var),
            Instr::PushI(1),
            step,
            Instr::StoreG(var),
            Instr::Jump(head),
            Instr::Mark(exit),
        ])
}

/// Body runs at least once and repeats while the condition is false
pub fn repeat_until(body: Code, cond: Code, id: u32) -> Code {
    let start = Label::new(LabelKind::RepeatStart, id);
    Code::from(Instr::Mark(start))
        .then(body)
        .then(cond)
        .then(Instr::Jz(start))
}

// =============================================================================
// I/O
// =============================================================================

/// Print one value; booleans are rendered as "true"/"false"
pub fn write_value(expr: TypedExpr, labels: &mut LabelCounter) -> Code {
    match expr.ty {
        Type::Real => expr.code.then(Instr::WriteF),
        Type::String | Type::Char => expr.code.then(Instr::WriteS),
        Type::Integer => expr.code.then(Instr::WriteI),
        Type::Boolean => {
            let id = labels.fresh();
            let false_label = Label::new(LabelKind::BoolFalse, id);
            let end = Label::new(LabelKind::BoolEnd, id);
            expr.code.then(vec![
                Instr::Jz(false_label),
                Instr::PushS("true".into()),
                Instr::Jump(end),
                Instr::Mark(false_label),
                Instr::PushS("false".into()),
                Instr::Mark(end),
                Instr::WriteS,
            ])
        }
    }
}

/// Prompt, read a line, and convert it for a target of type `ty`
pub fn read_value(ty: Type) -> Code {
    let mut code = Code::from(vec![
        Instr::PushS("? ".into()),
        Instr::WriteS,
        Instr::Read,
    ]);
    match ty {
        Type::Integer | Type::Boolean => code.push(Instr::Atoi),
        Type::Real => code.push(Instr::Atof),
        Type::Char | Type::String => {}
    }
    code
}

// =============================================================================
// Program assembly
// =============================================================================

/// Default value pushed for a freshly declared scalar
pub fn default_value(ty: Type) -> Instr {
    match ty {
        Type::Real => Instr::PushF(0.0),
        Type::String | Type::Char => Instr::PushS(String::new()),
        Type::Integer | Type::Boolean => Instr::PushI(0),
    }
}

/// Scalar initialisation, array allocation, then the body between start/stop
pub fn assemble(symbols: &SymbolTable, body: Code) -> Code {
    let mut code = Code::new();

    for symbol in symbols.scalars() {
        code.push(default_value(symbol.ty.base()));
        code.push(Instr::StoreG(symbol.address));
    }

    for alloc in symbols.allocations() {
        code.extend([
            Instr::PushI(alloc.size),
            Instr::AllocN,
            Instr::StoreG(alloc.address),
        ]);
    }

    code.push(Instr::Start);
    code.append(body);
    code.push(Instr::Stop);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_rendering() {
        assert_eq!(Instr::PushI(-3).to_string(), "pushi -3");
        assert_eq!(Instr::PushF(0.0).to_string(), "pushf 0.0");
        assert_eq!(Instr::PushF(2.5).to_string(), "pushf 2.5");
        assert_eq!(Instr::PushS("hi".into()).to_string(), "pushs \"hi\"");
        assert_eq!(
            Instr::PushS("say \"x\"".into()).to_string(),
            "pushs \"say \\\"x\\\"\""
        );
        assert_eq!(
            Instr::PushS("a\nb".into()).to_string(),
            "pushs \"a\\nb\""
        );
        assert_eq!(Instr::Load(0).to_string(), "load 0");
        let label = Label::new(LabelKind::EndWhile, 4);
        assert_eq!(Instr::Jz(label).to_string(), "jz endwhile4");
        assert_eq!(Instr::Mark(label).to_string(), "endwhile4:");
    }

    #[test]
    fn test_real_formatting() {
        assert_eq!(Instr::PushF(100000.0).to_string(), "pushf 100000.0");
        assert_eq!(Instr::PushF(1e20).to_string(), "pushf 1e+20");
        assert_eq!(Instr::PushF(1e-7).to_string(), "pushf 1e-07");
        assert_eq!(Instr::PushF(1.5e-7).to_string(), "pushf 1.5e-07");
        assert_eq!(Instr::PushF(2.5e123).to_string(), "pushf 2.5e+123");
        assert_eq!(Instr::PushF(0.001).to_string(), "pushf 0.001");
    }

    #[test]
    fn test_label_counter_is_monotonic() {
        let mut labels = LabelCounter::new();
        assert_eq!(labels.fresh(), 0);
        assert_eq!(labels.fresh(), 1);
        assert_eq!(labels.fresh(), 2);
        assert_eq!(labels.issued(), 3);
    }

    #[test]
    fn test_if_then_else_shape() {
        let code = if_then_else(
            Code::from(Instr::PushI(1)),
            Code::from(Instr::PushI(2)),
            Code::from(Instr::PushI(3)),
            7,
        );
        assert_eq!(
            code.lines(),
            vec![
                "pushi 1", "jz else7", "pushi 2", "jump endif7", "else7:", "pushi 3", "endif7:"
            ]
        );
    }

    #[test]
    fn test_for_downto_shape() {
        let code = for_loop(
            2,
            Code::from(Instr::PushI(10)),
            Code::from(Instr::PushI(1)),
            Code::new(),
            Direction::Downto,
            0,
        );
        assert_eq!(
            code.lines(),
            vec![
                "pushi 10",
                "storeg 2",
                "forstart0:",
                "pushg 2",
                "pushi 1",
                "supeq",
                "jz forend0",
                "pushg 2",
                "pushi 1",
                "sub",
                "storeg 2",
                "jump forstart0",
                "forend0:",
            ]
        );
    }

    #[test]
    fn test_repeat_shape() {
        let code = repeat_until(Code::from(Instr::PushI(1)), Code::from(Instr::PushI(0)), 3);
        assert_eq!(
            code.lines(),
            vec!["repeatstart3:", "pushi 1", "pushi 0", "jz repeatstart3"]
        );
    }

    #[test]
    fn test_write_boolean_uses_fresh_labels() {
        let mut labels = LabelCounter::new();
        labels.fresh();
        let code = write_value(TypedExpr::new(Type::Boolean, Instr::PushI(1)), &mut labels);
        assert_eq!(
            code.lines(),
            vec![
                "pushi 1",
                "jz boolfalse1",
                "pushs \"true\"",
                "jump boolend1",
                "boolfalse1:",
                "pushs \"false\"",
                "boolend1:",
                "writes",
            ]
        );
        assert_eq!(labels.issued(), 2);
    }

    #[test]
    fn test_read_value_conversions() {
        assert_eq!(read_value(Type::Real).lines().last().unwrap(), "atof");
        assert_eq!(read_value(Type::Boolean).lines().last().unwrap(), "atoi");
        assert_eq!(read_value(Type::String).lines().last().unwrap(), "read");
    }

    #[test]
    fn test_not_equal_is_two_instructions() {
        assert_eq!(
            binary_instrs(BinaryOp::Ne, false),
            vec![Instr::Equal, Instr::Not]
        );
        assert_eq!(binary_instrs(BinaryOp::Divide, false), vec![Instr::FDiv]);
        assert_eq!(binary_instrs(BinaryOp::Le, true), vec![Instr::FInfEq]);
    }
}
