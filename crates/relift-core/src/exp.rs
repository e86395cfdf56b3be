//! Expression trees.
//!
//! An [`Exp`] is a tree headed by an [`Operator`]: 0-ary terminals and
//! constants, unary through ternary interior nodes, typed wrappers,
//! addressable locations, SSA references, and flag definitions. Subtrees
//! may be shared by value cloning only -- `clone` is a deep copy, and
//! transformations always rebuild rather than mutate shared structure.
//!
//! Equality, ordering, and hashing are structural and mutually consistent:
//! the total order is the lexicographic compare over (operator, children),
//! which makes expressions usable as `BTreeMap` keys. Constant conscripts
//! and location owners do not participate; they disambiguate for analyses,
//! not for value identity.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::id::{Addr, ProcId, RtlId, StmtId};
use crate::operator::Operator;
use crate::ty::Type;
use crate::util::escape_str;

/// Payload of a constant expression. The carried operator is implied by
/// the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstKind {
    Int(i64),
    Flt(f64),
    Str(String),
    /// Address of a procedure taken as a value.
    Func(Addr),
}

impl ConstKind {
    pub fn op(&self) -> Operator {
        match self {
            ConstKind::Int(_) => Operator::IntConst,
            ConstKind::Flt(_) => Operator::FltConst,
            ConstKind::Str(_) => Operator::StrConst,
            ConstKind::Func(_) => Operator::FuncConst,
        }
    }

    fn cmp_kind(&self, other: &ConstKind) -> Ordering {
        match (self, other) {
            (ConstKind::Int(a), ConstKind::Int(b)) => a.cmp(b),
            (ConstKind::Flt(a), ConstKind::Flt(b)) => a.total_cmp(b),
            (ConstKind::Str(a), ConstKind::Str(b)) => a.cmp(b),
            (ConstKind::Func(a), ConstKind::Func(b)) => a.cmp(b),
            // Distinct kinds carry distinct operators; the caller has
            // already ordered on those.
            _ => Ordering::Equal,
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Exp {
    /// 0-ary leaf identified by its operator alone.
    Terminal(Operator),
    /// A literal. `conscript` numbers repeated constants for adhoc type
    /// analysis and does not affect value identity.
    Const { kind: ConstKind, conscript: u32 },
    Unary { op: Operator, sub1: Box<Exp> },
    Binary {
        op: Operator,
        sub1: Box<Exp>,
        sub2: Box<Exp>,
    },
    Ternary {
        op: Operator,
        sub1: Box<Exp>,
        sub2: Box<Exp>,
        sub3: Box<Exp>,
    },
    /// A subtree with an explicit type ascription.
    Typed { ty: Type, sub1: Box<Exp> },
    /// An addressable storage slot: register, memory cell, parameter,
    /// local, or global. `proc` is the owning procedure, so `r[n]` can be
    /// resolved against that procedure's signature and locals.
    Location {
        op: Operator,
        sub1: Box<Exp>,
        proc: Option<ProcId>,
    },
    /// An SSA reference: the location together with the statement that
    /// defined it. `None` means the definition is implicit (live on
    /// entry) or not yet resolved.
    Ref {
        sub1: Box<Exp>,
        def: Option<StmtId>,
    },
    /// A flag-function definition; `rtl` names the semantics RTL
    /// registered with the program (runtime-only, never persisted).
    FlagDef {
        sub1: Box<Exp>,
        rtl: Option<RtlId>,
    },
    /// A type used as a value, for type-analysis constraints.
    TypeVal(Type),
}

impl Exp {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    pub fn int(v: i64) -> Exp {
        Exp::Const {
            kind: ConstKind::Int(v),
            conscript: 0,
        }
    }

    pub fn flt(v: f64) -> Exp {
        Exp::Const {
            kind: ConstKind::Flt(v),
            conscript: 0,
        }
    }

    pub fn str_const(s: &str) -> Exp {
        Exp::Const {
            kind: ConstKind::Str(s.to_string()),
            conscript: 0,
        }
    }

    pub fn func_const(addr: Addr) -> Exp {
        Exp::Const {
            kind: ConstKind::Func(addr),
            conscript: 0,
        }
    }

    pub fn unary(op: Operator, sub1: Exp) -> Exp {
        Exp::Unary {
            op,
            sub1: Box::new(sub1),
        }
    }

    pub fn binary(op: Operator, sub1: Exp, sub2: Exp) -> Exp {
        Exp::Binary {
            op,
            sub1: Box::new(sub1),
            sub2: Box::new(sub2),
        }
    }

    pub fn ternary(op: Operator, sub1: Exp, sub2: Exp, sub3: Exp) -> Exp {
        Exp::Ternary {
            op,
            sub1: Box::new(sub1),
            sub2: Box::new(sub2),
            sub3: Box::new(sub3),
        }
    }

    pub fn typed(ty: Type, sub1: Exp) -> Exp {
        Exp::Typed {
            ty,
            sub1: Box::new(sub1),
        }
    }

    /// `r<n>` for a constant register number.
    pub fn reg(n: i64) -> Exp {
        Exp::Location {
            op: Operator::RegOf,
            sub1: Box::new(Exp::int(n)),
            proc: None,
        }
    }

    pub fn reg_of(sub1: Exp) -> Exp {
        Exp::Location {
            op: Operator::RegOf,
            sub1: Box::new(sub1),
            proc: None,
        }
    }

    pub fn mem_of(sub1: Exp) -> Exp {
        Exp::Location {
            op: Operator::MemOf,
            sub1: Box::new(sub1),
            proc: None,
        }
    }

    pub fn location(op: Operator, sub1: Exp, proc: Option<ProcId>) -> Exp {
        Exp::Location {
            op,
            sub1: Box::new(sub1),
            proc,
        }
    }

    /// A named local of `proc`.
    pub fn local(name: &str, proc: ProcId) -> Exp {
        Exp::location(Operator::Local, Exp::str_const(name), Some(proc))
    }

    /// Wraps `sub1` into an SSA reference to `def`.
    pub fn subscript(sub1: Exp, def: Option<StmtId>) -> Exp {
        Exp::Ref {
            sub1: Box::new(sub1),
            def,
        }
    }

    // -----------------------------------------------------------------
    // Shape
    // -----------------------------------------------------------------

    /// The head operator of this node.
    pub fn op(&self) -> Operator {
        match self {
            Exp::Terminal(op) => *op,
            Exp::Const { kind, .. } => kind.op(),
            Exp::Unary { op, .. } => *op,
            Exp::Binary { op, .. } => *op,
            Exp::Ternary { op, .. } => *op,
            Exp::Typed { .. } => Operator::TypedExp,
            Exp::Location { op, .. } => *op,
            Exp::Ref { .. } => Operator::Subscript,
            Exp::FlagDef { .. } => Operator::FlagDef,
            Exp::TypeVal(_) => Operator::TypeVal,
        }
    }

    /// Number of child expressions.
    pub fn arity(&self) -> usize {
        match self {
            Exp::Terminal(_) | Exp::Const { .. } | Exp::TypeVal(_) => 0,
            Exp::Unary { .. }
            | Exp::Typed { .. }
            | Exp::Location { .. }
            | Exp::Ref { .. }
            | Exp::FlagDef { .. } => 1,
            Exp::Binary { .. } => 2,
            Exp::Ternary { .. } => 3,
        }
    }

    /// Child subexpressions in order.
    pub fn children(&self) -> Vec<&Exp> {
        match self {
            Exp::Terminal(_) | Exp::Const { .. } | Exp::TypeVal(_) => vec![],
            Exp::Unary { sub1, .. }
            | Exp::Typed { sub1, .. }
            | Exp::Location { sub1, .. }
            | Exp::Ref { sub1, .. }
            | Exp::FlagDef { sub1, .. } => vec![&**sub1],
            Exp::Binary { sub1, sub2, .. } => vec![&**sub1, &**sub2],
            Exp::Ternary {
                sub1, sub2, sub3, ..
            } => vec![&**sub1, &**sub2, &**sub3],
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Exp> {
        match self {
            Exp::Terminal(_) | Exp::Const { .. } | Exp::TypeVal(_) => vec![],
            Exp::Unary { sub1, .. }
            | Exp::Typed { sub1, .. }
            | Exp::Location { sub1, .. }
            | Exp::Ref { sub1, .. }
            | Exp::FlagDef { sub1, .. } => vec![&mut **sub1],
            Exp::Binary { sub1, sub2, .. } => vec![&mut **sub1, &mut **sub2],
            Exp::Ternary {
                sub1, sub2, sub3, ..
            } => vec![&mut **sub1, &mut **sub2, &mut **sub3],
        }
    }

    pub fn is_location(&self) -> bool {
        matches!(self, Exp::Location { .. })
    }

    /// For `r<n>` locations, the register number.
    pub fn reg_number(&self) -> Option<i64> {
        if let Exp::Location { op: Operator::RegOf, sub1, .. } = self {
            if let Exp::Const {
                kind: ConstKind::Int(n),
                ..
            } = &**sub1
            {
                return Some(*n);
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Pattern matching
    // -----------------------------------------------------------------

    /// Structural match where wildcard operators in `pattern` match
    /// anything of the right shape.
    pub fn matches(&self, pattern: &Exp) -> bool {
        match pattern {
            Exp::Terminal(Operator::Wild) => return true,
            Exp::Terminal(Operator::WildIntConst) => {
                return matches!(
                    self,
                    Exp::Const {
                        kind: ConstKind::Int(_),
                        ..
                    }
                )
            }
            Exp::Terminal(Operator::WildStrConst) => {
                return matches!(
                    self,
                    Exp::Const {
                        kind: ConstKind::Str(_),
                        ..
                    }
                )
            }
            Exp::Terminal(Operator::WildMemOf) => {
                return matches!(
                    self,
                    Exp::Location {
                        op: Operator::MemOf,
                        ..
                    }
                )
            }
            Exp::Terminal(Operator::WildRegOf) => {
                return matches!(
                    self,
                    Exp::Location {
                        op: Operator::RegOf,
                        ..
                    }
                )
            }
            Exp::Terminal(Operator::WildAddrOf) => {
                return matches!(
                    self,
                    Exp::Unary {
                        op: Operator::AddrOf,
                        ..
                    }
                )
            }
            _ => {}
        }
        if self.op() != pattern.op() || self.arity() != pattern.arity() {
            return false;
        }
        // Node payloads must agree exactly; only children may be wild.
        let payload_ok = match (self, pattern) {
            (Exp::Const { kind: a, .. }, Exp::Const { kind: b, .. }) => {
                a.cmp_kind(b) == Ordering::Equal
            }
            (Exp::Ref { def: a, .. }, Exp::Ref { def: b, .. }) => a == b,
            (Exp::Typed { ty: a, .. }, Exp::Typed { ty: b, .. }) => a == b,
            (Exp::TypeVal(a), Exp::TypeVal(b)) => a == b,
            _ => true,
        };
        payload_ok
            && self
                .children()
                .iter()
                .zip(pattern.children())
                .all(|(c, p)| c.matches(p))
    }

    /// Collects every subtree matching `pattern`, in pre-order.
    pub fn search_all<'a>(&'a self, pattern: &Exp, out: &mut Vec<&'a Exp>) {
        if self.matches(pattern) {
            out.push(self);
        }
        for c in self.children() {
            c.search_all(pattern, out);
        }
    }

    /// Returns a copy with every subtree matching `pattern` replaced by
    /// `repl`, plus a flag saying whether anything changed. Replacement
    /// subtrees are not re-searched.
    pub fn search_replace_all(&self, pattern: &Exp, repl: &Exp) -> (Exp, bool) {
        if self.matches(pattern) {
            return (repl.clone(), true);
        }
        let mut out = self.clone();
        let mut changed = false;
        for c in out.children_mut() {
            let (nc, ch) = c.search_replace_all(pattern, repl);
            if ch {
                *c = nc;
                changed = true;
            }
        }
        (out, changed)
    }

    // -----------------------------------------------------------------
    // Visitors
    // -----------------------------------------------------------------

    /// Pre-order traversal. The visitor may rewrite the node it is given;
    /// returning `false` prunes the subtree.
    pub fn accept_pre(&mut self, v: &mut dyn ExpVisitor) {
        if v.visit(self) {
            for c in self.children_mut() {
                c.accept_pre(v);
            }
        }
    }

    /// Post-order traversal; children first.
    pub fn accept_post(&mut self, v: &mut dyn ExpVisitor) {
        for c in self.children_mut() {
            c.accept_post(v);
        }
        v.visit(self);
    }

    // -----------------------------------------------------------------
    // Simplification
    // -----------------------------------------------------------------

    /// Constant folding, algebraic identities, and address-of-dereference
    /// cancellation. A pure function of the subtree; runs to a fixed
    /// point, so `e.simplify().simplify() == e.simplify()`.
    pub fn simplify(self) -> Exp {
        let mut e = self;
        loop {
            let (next, changed) = Self::simplify_pass(e);
            e = next;
            if !changed {
                return e;
            }
        }
    }

    fn simplify_pass(self) -> (Exp, bool) {
        // Children first.
        let mut e = self;
        let mut changed = false;
        for c in e.children_mut() {
            let (nc, ch) = std::mem::replace(c, Exp::Terminal(Operator::Nil)).simplify_pass();
            *c = nc;
            changed |= ch;
        }
        let (e, local) = Self::simplify_node(e);
        (e, changed || local)
    }

    fn simplify_node(e: Exp) -> (Exp, bool) {
        use Operator::*;
        match e {
            Exp::Binary { op, sub1, sub2 } => {
                // Constant folding.
                if let (
                    Exp::Const {
                        kind: ConstKind::Int(a),
                        ..
                    },
                    Exp::Const {
                        kind: ConstKind::Int(b),
                        ..
                    },
                ) = (&*sub1, &*sub2)
                {
                    if let Some(v) = fold_int(op, *a, *b) {
                        return (Exp::int(v), true);
                    }
                }
                // Identities.
                let is_zero = |e: &Exp| {
                    matches!(
                        e,
                        Exp::Const {
                            kind: ConstKind::Int(0),
                            ..
                        }
                    )
                };
                let is_one = |e: &Exp| {
                    matches!(
                        e,
                        Exp::Const {
                            kind: ConstKind::Int(1),
                            ..
                        }
                    )
                };
                match op {
                    Plus if is_zero(&sub2) => return (*sub1, true),
                    Plus if is_zero(&sub1) => return (*sub2, true),
                    Minus if is_zero(&sub2) => return (*sub1, true),
                    Minus if sub1 == sub2 => return (Exp::int(0), true),
                    Mult | Mults if is_one(&sub2) => return (*sub1, true),
                    Mult | Mults if is_one(&sub1) => return (*sub2, true),
                    Mult | Mults if is_zero(&sub1) || is_zero(&sub2) => {
                        return (Exp::int(0), true)
                    }
                    Div | Divs if is_one(&sub2) => return (*sub1, true),
                    BitOr | BitXor if is_zero(&sub2) => return (*sub1, true),
                    BitOr | BitXor if is_zero(&sub1) => return (*sub2, true),
                    BitAnd if is_zero(&sub1) || is_zero(&sub2) => return (Exp::int(0), true),
                    ShiftL | ShiftR | ShiftRA if is_zero(&sub2) => return (*sub1, true),
                    _ => {}
                }
                (Exp::Binary { op, sub1, sub2 }, false)
            }
            Exp::Unary { op: Neg, sub1 } => match *sub1 {
                Exp::Const {
                    kind: ConstKind::Int(a),
                    ..
                } => (Exp::int(a.wrapping_neg()), true),
                Exp::Unary {
                    op: Neg,
                    sub1: inner,
                } => (*inner, true),
                other => (Exp::unary(Neg, other), false),
            },
            Exp::Unary { op: Not, sub1 } => match *sub1 {
                Exp::Const {
                    kind: ConstKind::Int(a),
                    ..
                } => (Exp::int(!a), true),
                Exp::Unary {
                    op: Not,
                    sub1: inner,
                } => (*inner, true),
                other => (Exp::unary(Not, other), false),
            },
            Exp::Unary { op: LNot, sub1 } => match *sub1 {
                Exp::Terminal(True) => (Exp::Terminal(False), true),
                Exp::Terminal(False) => (Exp::Terminal(True), true),
                Exp::Unary {
                    op: LNot,
                    sub1: inner,
                } => (*inner, true),
                other => (Exp::unary(LNot, other), false),
            },
            // a[m[x]] == x
            Exp::Unary { op: AddrOf, sub1 } => match *sub1 {
                Exp::Location {
                    op: MemOf,
                    sub1: inner,
                    ..
                } => (*inner, true),
                other => (Exp::unary(AddrOf, other), false),
            },
            // m[a[x]] == x
            Exp::Location {
                op: MemOf,
                sub1,
                proc,
            } => match *sub1 {
                Exp::Unary {
                    op: AddrOf,
                    sub1: inner,
                } => (*inner, true),
                other => (
                    Exp::Location {
                        op: MemOf,
                        sub1: Box::new(other),
                        proc,
                    },
                    false,
                ),
            },
            Exp::Ternary {
                op: Tern,
                sub1,
                sub2,
                sub3,
            } => match *sub1 {
                Exp::Terminal(True) => (*sub2, true),
                Exp::Terminal(False) => (*sub3, true),
                Exp::Const {
                    kind: ConstKind::Int(c),
                    ..
                } => (if c != 0 { *sub2 } else { *sub3 }, true),
                other => (
                    Exp::Ternary {
                        op: Tern,
                        sub1: Box::new(other),
                        sub2,
                        sub3,
                    },
                    false,
                ),
            },
            other => (other, false),
        }
    }
}

/// Folds an integer binary operation; `None` when the operator does not
/// fold or the operation is undefined (division by zero).
fn fold_int(op: Operator, a: i64, b: i64) -> Option<i64> {
    use Operator::*;
    Some(match op {
        Plus => a.wrapping_add(b),
        Minus => a.wrapping_sub(b),
        Mult | Mults => a.wrapping_mul(b),
        Div => ((a as u64).checked_div(b as u64)?) as i64,
        Divs => a.checked_div(b)?,
        Mod => ((a as u64).checked_rem(b as u64)?) as i64,
        Mods => a.checked_rem(b)?,
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        ShiftL => a.wrapping_shl(b as u32),
        ShiftR => ((a as u64).wrapping_shr(b as u32)) as i64,
        ShiftRA => a.wrapping_shr(b as u32),
        Equal => (a == b) as i64,
        NotEqual => (a != b) as i64,
        Less => (a < b) as i64,
        Gtr => (a > b) as i64,
        LessEq => (a <= b) as i64,
        GtrEq => (a >= b) as i64,
        LessUns => ((a as u64) < b as u64) as i64,
        GtrUns => (a as u64 > b as u64) as i64,
        LessEqUns => (a as u64 <= b as u64) as i64,
        GtrEqUns => (a as u64 >= b as u64) as i64,
        _ => return None,
    })
}

/// Visitor over expression nodes. The traversal hands each node to
/// [`visit`](ExpVisitor::visit) mutably so visitors can rewrite in place.
pub trait ExpVisitor {
    /// Returning `false` from a pre-order traversal prunes the children.
    fn visit(&mut self, e: &mut Exp) -> bool;
}

// ---------------------------------------------------------------------
// Structural equality, total order, hashing
// ---------------------------------------------------------------------

impl PartialEq for Exp {
    fn eq(&self, other: &Exp) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Exp {}

impl PartialOrd for Exp {
    fn partial_cmp(&self, other: &Exp) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Exp {
    /// Lexicographic over (operator, children), then node payload.
    fn cmp(&self, other: &Exp) -> Ordering {
        (self.op() as u16)
            .cmp(&(other.op() as u16))
            .then_with(|| self.arity().cmp(&other.arity()))
            .then_with(|| {
                for (a, b) in self.children().iter().zip(other.children()) {
                    let c = (*a).cmp(b);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                Ordering::Equal
            })
            .then_with(|| match (self, other) {
                (Exp::Const { kind: a, .. }, Exp::Const { kind: b, .. }) => a.cmp_kind(b),
                (Exp::Typed { ty: a, .. }, Exp::Typed { ty: b, .. }) => a.cmp(b),
                (Exp::TypeVal(a), Exp::TypeVal(b)) => a.cmp(b),
                (Exp::Ref { def: a, .. }, Exp::Ref { def: b, .. }) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

impl Hash for Exp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.op() as u16).hash(state);
        for c in self.children() {
            c.hash(state);
        }
        match self {
            Exp::Const { kind, .. } => match kind {
                ConstKind::Int(v) => v.hash(state),
                ConstKind::Flt(v) => v.to_bits().hash(state),
                ConstKind::Str(v) => v.hash(state),
                ConstKind::Func(v) => v.hash(state),
            },
            Exp::Typed { ty, .. } => ty.hash(state),
            Exp::TypeVal(ty) => ty.hash(state),
            Exp::Ref { def, .. } => def.hash(state),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------

/// Infix symbol for binary operators that print infix.
fn infix_symbol(op: Operator) -> Option<&'static str> {
    use Operator::*;
    Some(match op {
        Plus => "+",
        Minus => "-",
        Mult => "*",
        Div => "/",
        Mod => "%",
        Mults => "*!",
        Divs => "/!",
        Mods => "%!",
        FPlus | FPlusD | FPlusQ => "+f",
        FMinus | FMinusD | FMinusQ => "-f",
        FMult | FMultD | FMultQ => "*f",
        FDiv | FDivD | FDivQ => "/f",
        Equal => "=",
        NotEqual => "~=",
        Less => "<",
        Gtr => ">",
        LessEq => "<=",
        GtrEq => ">=",
        LessUns => "<u",
        GtrUns => ">u",
        LessEqUns => "<=u",
        GtrEqUns => ">=u",
        And => "and",
        Or => "or",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        ShiftL => "<<",
        ShiftR => ">>",
        ShiftRA => ">>A",
        RotateL => "rl",
        RotateR => "rr",
        _ => return None,
    })
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        match self {
            Exp::Terminal(op) => match op {
                Pc => write!(f, "%pc"),
                Afp => write!(f, "%afp"),
                Agp => write!(f, "%agp"),
                Flags => write!(f, "%flags"),
                FFlags => write!(f, "%fflags"),
                CF => write!(f, "%CF"),
                ZF => write!(f, "%ZF"),
                NF => write!(f, "%NF"),
                OF => write!(f, "%OF"),
                DF => write!(f, "%DF"),
                True => write!(f, "true"),
                False => write!(f, "false"),
                Anull => write!(f, "%anul"),
                Nil => Ok(()),
                other => write!(f, "{}", other.name()),
            },
            Exp::Const { kind, .. } => match kind {
                ConstKind::Int(v) => write!(f, "{}", v),
                ConstKind::Flt(v) => write!(f, "{}", v),
                ConstKind::Str(s) => write!(f, "\"{}\"", escape_str(s)),
                ConstKind::Func(a) => write!(f, "{}", a),
            },
            Exp::Unary { op, sub1 } => match op {
                Neg => write!(f, "-{}", sub1),
                Not => write!(f, "~{}", sub1),
                LNot => write!(f, "!{}", sub1),
                FNeg => write!(f, "~f{}", sub1),
                AddrOf => write!(f, "a[{}]", sub1),
                _ => write!(f, "{}({})", op.name(), sub1),
            },
            Exp::Binary { op, sub1, sub2 } => {
                if *op == List {
                    // Cons list; print comma-separated up to the nil.
                    write!(f, "{}", sub1)?;
                    let mut rest = sub2;
                    loop {
                        match &**rest {
                            Exp::Terminal(Nil) => break,
                            Exp::Binary {
                                op: List,
                                sub1,
                                sub2,
                            } => {
                                write!(f, ", {}", sub1)?;
                                rest = sub2;
                            }
                            other => {
                                write!(f, ", {}", other)?;
                                break;
                            }
                        }
                    }
                    Ok(())
                } else if *op == FlagCall {
                    write!(f, "{}({})", sub1, sub2)
                } else if let Some(sym) = infix_symbol(*op) {
                    write!(f, "{} {} {}", sub1, sym, sub2)
                } else {
                    write!(f, "{}({}, {})", op.name(), sub1, sub2)
                }
            }
            Exp::Ternary {
                op,
                sub1,
                sub2,
                sub3,
            } => match op {
                Tern => write!(f, "{} ? {} : {}", sub1, sub2, sub3),
                At => write!(f, "{}@{}:{}", sub1, sub2, sub3),
                _ => write!(f, "{}({}, {}, {})", op.name(), sub1, sub2, sub3),
            },
            Exp::Typed { ty, sub1 } => write!(f, "*{}* {}", ty, sub1),
            Exp::Location { op, sub1, .. } => match op {
                RegOf => {
                    if let Some(n) = self.reg_number() {
                        write!(f, "r{}", n)
                    } else {
                        write!(f, "r[{}]", sub1)
                    }
                }
                MemOf => write!(f, "m[{}]", sub1),
                Temp | Param | Local | Global => {
                    if let Exp::Const {
                        kind: ConstKind::Str(name),
                        ..
                    } = &**sub1
                    {
                        write!(f, "{}", name)
                    } else {
                        write!(f, "{}({})", op.name(), sub1)
                    }
                }
                _ => write!(f, "{}({})", op.name(), sub1),
            },
            Exp::Ref { sub1, def } => match def {
                Some(id) => write!(f, "{}{{{}}}", sub1, id),
                None => write!(f, "{}{{-}}", sub1),
            },
            Exp::FlagDef { sub1, .. } => write!(f, "FLAGDEF({})", sub1),
            Exp::TypeVal(ty) => write!(f, "<{}>", ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Signedness;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn five_plus_six() -> Exp {
        Exp::binary(Operator::Plus, Exp::int(5), Exp::int(6))
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let e = Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(6));
        let mut c = e.clone();
        assert_eq!(c, e);
        if let Exp::Binary { sub2, .. } = &mut c {
            **sub2 = Exp::int(99);
        }
        assert_ne!(c, e);
        assert_eq!(
            e,
            Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(6))
        );
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(five_plus_six(), five_plus_six());
        assert_ne!(
            five_plus_six(),
            Exp::binary(Operator::Plus, Exp::int(5), Exp::int(7))
        );
        // Conscripts do not affect identity.
        let a = Exp::Const {
            kind: ConstKind::Int(5),
            conscript: 1,
        };
        assert_eq!(a, Exp::int(5));
    }

    #[test]
    fn refs_with_different_defs_are_distinct() {
        let a = Exp::subscript(Exp::reg(0), Some(StmtId(1)));
        let b = Exp::subscript(Exp::reg(0), Some(StmtId(2)));
        let c = Exp::subscript(Exp::reg(0), None);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Exp::subscript(Exp::reg(0), Some(StmtId(1))));
    }

    #[test]
    fn usable_as_ordered_map_key() {
        let mut m: BTreeMap<Exp, i32> = BTreeMap::new();
        m.insert(Exp::reg(0), 1);
        m.insert(Exp::reg(1), 2);
        m.insert(five_plus_six(), 3);
        assert_eq!(m.get(&Exp::reg(1)), Some(&2));
        assert_eq!(m.len(), 3);
        m.insert(Exp::reg(1), 4);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn simplify_folds_constants() {
        assert_eq!(five_plus_six().simplify(), Exp::int(11));
        assert_eq!(
            Exp::binary(Operator::Mult, Exp::int(3), Exp::int(4)).simplify(),
            Exp::int(12)
        );
        assert_eq!(
            Exp::binary(Operator::Equal, Exp::int(3), Exp::int(3)).simplify(),
            Exp::int(1)
        );
    }

    #[test]
    fn simplify_applies_identities() {
        let e = Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(0));
        assert_eq!(e.simplify(), Exp::reg(0));

        let e = Exp::binary(Operator::Mult, Exp::reg(0), Exp::int(1));
        assert_eq!(e.simplify(), Exp::reg(0));

        let e = Exp::binary(Operator::Mult, Exp::reg(0), Exp::int(0));
        assert_eq!(e.simplify(), Exp::int(0));
    }

    #[test]
    fn simplify_cancels_addr_of_deref() {
        // a[m[r0]] == r0
        let e = Exp::unary(Operator::AddrOf, Exp::mem_of(Exp::reg(0)));
        assert_eq!(e.simplify(), Exp::reg(0));
        // m[a[r0]] == r0
        let e = Exp::mem_of(Exp::unary(Operator::AddrOf, Exp::reg(0)));
        assert_eq!(e.simplify(), Exp::reg(0));
    }

    #[test]
    fn simplify_does_not_fold_div_by_zero() {
        let e = Exp::binary(Operator::Divs, Exp::int(5), Exp::int(0));
        assert_eq!(e.clone().simplify(), e);
    }

    #[test]
    fn simplify_is_idempotent_on_nested_tree() {
        let e = Exp::binary(
            Operator::Plus,
            Exp::binary(Operator::Mult, Exp::int(2), Exp::int(3)),
            Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(0)),
        );
        let once = e.clone().simplify();
        assert_eq!(once.clone().simplify(), once);
        assert_eq!(once, Exp::binary(Operator::Plus, Exp::int(6), Exp::reg(0)));
    }

    #[test]
    fn wildcard_matches() {
        let wild = Exp::Terminal(Operator::Wild);
        assert!(five_plus_six().matches(&wild));
        assert!(Exp::reg(3).matches(&wild));

        let pat = Exp::binary(
            Operator::Plus,
            Exp::Terminal(Operator::WildIntConst),
            Exp::Terminal(Operator::Wild),
        );
        assert!(five_plus_six().matches(&pat));
        assert!(!Exp::binary(Operator::Minus, Exp::int(5), Exp::int(6)).matches(&pat));
        assert!(!Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(6)).matches(&pat));
    }

    #[test]
    fn match_distinguishes_ref_definitions() {
        let use_of_5 = Exp::subscript(Exp::reg(0), Some(StmtId(5)));
        let use_of_7 = Exp::subscript(Exp::reg(0), Some(StmtId(7)));
        assert!(use_of_5.matches(&use_of_5.clone()));
        assert!(!use_of_7.matches(&use_of_5));
        let (out, changed) = use_of_7.search_replace_all(&use_of_5, &Exp::int(1));
        assert!(!changed);
        assert_eq!(out, use_of_7);
    }

    #[test]
    fn search_all_finds_every_match() {
        let e = Exp::binary(
            Operator::Plus,
            Exp::mem_of(Exp::reg(0)),
            Exp::mem_of(Exp::reg(1)),
        );
        let mut found = Vec::new();
        e.search_all(&Exp::Terminal(Operator::WildMemOf), &mut found);
        assert_eq!(found.len(), 2);
        let mut regs = Vec::new();
        e.search_all(&Exp::Terminal(Operator::WildRegOf), &mut regs);
        assert_eq!(regs.len(), 2);
    }

    #[test]
    fn search_replace_all_reports_change() {
        let e = Exp::binary(Operator::Plus, Exp::reg(0), Exp::reg(0));
        let (out, changed) = e.search_replace_all(&Exp::reg(0), &Exp::reg(7));
        assert!(changed);
        assert_eq!(out, Exp::binary(Operator::Plus, Exp::reg(7), Exp::reg(7)));

        let (out2, changed2) = out.search_replace_all(&Exp::reg(0), &Exp::reg(9));
        assert!(!changed2);
        assert_eq!(out2, out);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Exp::reg(0).to_string(), "r0");
        assert_eq!(Exp::mem_of(Exp::reg(28)).to_string(), "m[r28]");
        assert_eq!(five_plus_six().to_string(), "5 + 6");
        assert_eq!(
            Exp::reg_of(Exp::binary(Operator::Plus, Exp::int(1), Exp::int(2))).to_string(),
            "r[1 + 2]"
        );
        assert_eq!(
            Exp::subscript(Exp::reg(0), Some(StmtId(4))).to_string(),
            "r0{4}"
        );
        assert_eq!(Exp::subscript(Exp::reg(0), None).to_string(), "r0{-}");
        assert_eq!(
            Exp::typed(Type::int(32, Signedness::Signed), Exp::reg(0)).to_string(),
            "*i32* r0"
        );
        assert_eq!(Exp::str_const("hi\n").to_string(), "\"hi\\n\"");
    }

    #[test]
    fn visitor_collects_constants() {
        struct CollectInts(Vec<i64>);
        impl ExpVisitor for CollectInts {
            fn visit(&mut self, e: &mut Exp) -> bool {
                if let Exp::Const {
                    kind: ConstKind::Int(v),
                    ..
                } = e
                {
                    self.0.push(*v);
                }
                true
            }
        }
        let mut e = five_plus_six();
        let mut v = CollectInts(Vec::new());
        e.accept_pre(&mut v);
        assert_eq!(v.0, vec![5, 6]);
    }

    #[test]
    fn visitor_can_rewrite_in_post_order() {
        struct Bump;
        impl ExpVisitor for Bump {
            fn visit(&mut self, e: &mut Exp) -> bool {
                if let Exp::Const {
                    kind: ConstKind::Int(v),
                    ..
                } = e
                {
                    *v += 1;
                }
                true
            }
        }
        let mut e = five_plus_six();
        e.accept_post(&mut Bump);
        assert_eq!(e, Exp::binary(Operator::Plus, Exp::int(6), Exp::int(7)));
    }

    fn arb_exp() -> impl Strategy<Value = Exp> {
        let leaf = prop_oneof![
            (-64i64..64).prop_map(Exp::int),
            (0i64..8).prop_map(Exp::reg),
            Just(Exp::Terminal(Operator::True)),
            Just(Exp::Terminal(Operator::False)),
        ];
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| Exp::binary(Operator::Plus, a, b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| Exp::binary(Operator::Mult, a, b)),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| Exp::binary(Operator::BitAnd, a, b)),
                inner.clone().prop_map(|a| Exp::unary(Operator::Neg, a)),
                inner.clone().prop_map(Exp::mem_of),
            ]
        })
    }

    proptest! {
        #[test]
        fn simplify_idempotent(e in arb_exp()) {
            let once = e.simplify();
            prop_assert_eq!(once.clone().simplify(), once);
        }

        #[test]
        fn clone_equals_original(e in arb_exp()) {
            prop_assert_eq!(e.clone(), e);
        }
    }
}
