//! Statements: the single-address operations RTLs are made of.
//!
//! Every statement carries a program-unique id, a sequence number within
//! its procedure, an optional parent statement, and the owning procedure.
//! The kind sum covers plain, phi, and boolean assignments, calls, jumps,
//! branches, computed switches, and returns.
//!
//! The contracts here are the ones SSA conversion and the later passes
//! lean on: which locations a statement reads and writes, wrapping uses of
//! a location into [`Exp::Ref`] subscripts, and stripping size annotations
//! once type analysis has consumed them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exp::{ConstKind, Exp, ExpVisitor};
use crate::id::{Addr, BbId, ProcId, StmtId};
use crate::operator::Operator;
use crate::ty::Type;

/// An ordered set of location expressions.
pub type LocationSet = BTreeSet<Exp>;

/// The condition a branch or boolean assignment tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Eq,
    Ne,
    SLess,
    SLessEq,
    SGtrEq,
    SGtr,
    ULess,
    ULessEq,
    UGtrEq,
    UGtr,
    Minus,
    Pos,
    Overflow,
    NoOverflow,
    Parity,
}

impl BranchKind {
    pub fn to_int(self) -> i32 {
        self as i32
    }

    pub fn from_int(i: i32) -> Option<BranchKind> {
        use BranchKind::*;
        [
            Eq, Ne, SLess, SLessEq, SGtrEq, SGtr, ULess, ULessEq, UGtrEq, UGtr, Minus, Pos,
            Overflow, NoOverflow, Parity,
        ]
        .get(i as usize)
        .copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BranchKind::Eq => "equals",
            BranchKind::Ne => "not equals",
            BranchKind::SLess => "signed less",
            BranchKind::SLessEq => "signed less or equals",
            BranchKind::SGtrEq => "signed greater or equals",
            BranchKind::SGtr => "signed greater",
            BranchKind::ULess => "unsigned less",
            BranchKind::ULessEq => "unsigned less or equals",
            BranchKind::UGtrEq => "unsigned greater or equals",
            BranchKind::UGtr => "unsigned greater",
            BranchKind::Minus => "minus",
            BranchKind::Pos => "plus",
            BranchKind::Overflow => "overflow",
            BranchKind::NoOverflow => "no overflow",
            BranchKind::Parity => "parity",
        }
    }
}

/// A plain assignment, optionally typed and guarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub lhs: Exp,
    pub rhs: Exp,
    pub ty: Option<Type>,
    pub guard: Option<Exp>,
}

impl Assign {
    pub fn new(lhs: Exp, rhs: Exp) -> Assign {
        Assign {
            lhs,
            rhs,
            ty: None,
            guard: None,
        }
    }

    pub fn typed(ty: Type, lhs: Exp, rhs: Exp) -> Assign {
        Assign {
            lhs,
            rhs,
            ty: Some(ty),
            guard: None,
        }
    }
}

/// One phi argument: the predecessor block it flows in from, the defining
/// statement, and the value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiDef {
    pub bb: BbId,
    pub stmt: Option<StmtId>,
    pub exp: Exp,
}

/// An SSA phi node. `defs` is ordered by the in-edge order of the owning
/// block at the time variables were renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiAssign {
    pub lhs: Exp,
    pub defs: Vec<PhiDef>,
}

/// Sets `lhs` to 0 or 1 from a condition-code test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolAssign {
    pub lhs: Exp,
    pub cond: Exp,
    pub jt: BranchKind,
    pub is_float: bool,
    pub size: u16,
}

/// A call site. Arguments and defines are assignments (actual to formal,
/// and returned-location bindings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStmt {
    pub dest: Exp,
    pub dest_proc: Option<ProcId>,
    pub is_computed: bool,
    pub return_after_call: bool,
    pub arguments: Vec<Statement>,
    pub defines: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoStmt {
    pub dest: Exp,
    pub is_computed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStmt {
    pub dest: Exp,
    pub cond: Option<Exp>,
    pub jt: BranchKind,
    pub is_float: bool,
    pub is_computed: bool,
}

/// Decoded form of a jump table; runtime-only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub scrutinee: Exp,
    pub lower: i64,
    pub upper: i64,
    pub table_addr: Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStmt {
    pub dest: Exp,
    pub is_computed: bool,
    pub switch_info: Option<SwitchInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub modifieds: Vec<Statement>,
    pub returns: Vec<Statement>,
    pub ret_addr: Addr,
}

/// The statement sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign(Assign),
    Phi(PhiAssign),
    Bool(BoolAssign),
    Call(CallStmt),
    Goto(GotoStmt),
    Branch(BranchStmt),
    Case(CaseStmt),
    Return(ReturnStmt),
}

/// A statement with its identity and ownership header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StmtId,
    /// Sequence number within the owning procedure, assigned by
    /// `Program::init_statements`.
    pub number: u32,
    pub parent: Option<StmtId>,
    pub proc: Option<ProcId>,
    pub kind: StmtKind,
}

impl Statement {
    pub fn new(kind: StmtKind) -> Statement {
        Statement {
            id: StmtId::UNASSIGNED,
            number: 0,
            parent: None,
            proc: None,
            kind,
        }
    }

    pub fn assign(lhs: Exp, rhs: Exp) -> Statement {
        Statement::new(StmtKind::Assign(Assign::new(lhs, rhs)))
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Assign(_) | StmtKind::Phi(_) | StmtKind::Bool(_)
        )
    }

    /// A flag assignment: an assign whose right side is a flag call.
    pub fn is_flag_assign(&self) -> bool {
        match &self.kind {
            StmtKind::Assign(a) => a.rhs.op() == Operator::FlagCall,
            _ => false,
        }
    }

    /// The location this statement writes, for assignment kinds.
    pub fn lhs(&self) -> Option<&Exp> {
        match &self.kind {
            StmtKind::Assign(a) => Some(&a.lhs),
            StmtKind::Phi(p) => Some(&p.lhs),
            StmtKind::Bool(b) => Some(&b.lhs),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Expression traversal
    // -----------------------------------------------------------------

    /// Runs `v` over every expression in the statement, pre-order.
    pub fn accept(&mut self, v: &mut dyn ExpVisitor) {
        self.for_each_exp_mut(&mut |e| e.accept_pre(v));
    }

    fn for_each_exp_mut(&mut self, f: &mut dyn FnMut(&mut Exp)) {
        match &mut self.kind {
            StmtKind::Assign(a) => {
                f(&mut a.lhs);
                f(&mut a.rhs);
                if let Some(g) = &mut a.guard {
                    f(g);
                }
            }
            StmtKind::Phi(p) => {
                f(&mut p.lhs);
                for d in &mut p.defs {
                    f(&mut d.exp);
                }
            }
            StmtKind::Bool(b) => {
                f(&mut b.lhs);
                f(&mut b.cond);
            }
            StmtKind::Call(c) => {
                f(&mut c.dest);
                for a in &mut c.arguments {
                    a.for_each_exp_mut(f);
                }
                for d in &mut c.defines {
                    d.for_each_exp_mut(f);
                }
            }
            StmtKind::Goto(g) => f(&mut g.dest),
            StmtKind::Branch(b) => {
                f(&mut b.dest);
                if let Some(c) = &mut b.cond {
                    f(c);
                }
            }
            StmtKind::Case(c) => f(&mut c.dest),
            StmtKind::Return(r) => {
                for s in &mut r.modifieds {
                    s.for_each_exp_mut(f);
                }
                for s in &mut r.returns {
                    s.for_each_exp_mut(f);
                }
            }
        }
    }

    /// Runs `f` over every expression in the statement, including those
    /// of nested call/return assignments.
    pub fn visit_exps(&self, f: &mut dyn FnMut(&Exp)) {
        match &self.kind {
            StmtKind::Assign(a) => {
                f(&a.lhs);
                f(&a.rhs);
                if let Some(g) = &a.guard {
                    f(g);
                }
            }
            StmtKind::Phi(p) => {
                f(&p.lhs);
                for d in &p.defs {
                    f(&d.exp);
                }
            }
            StmtKind::Bool(b) => {
                f(&b.lhs);
                f(&b.cond);
            }
            StmtKind::Call(c) => {
                f(&c.dest);
                for a in &c.arguments {
                    a.visit_exps(f);
                }
                for d in &c.defines {
                    d.visit_exps(f);
                }
            }
            StmtKind::Goto(g) => f(&g.dest),
            StmtKind::Branch(b) => {
                f(&b.dest);
                if let Some(c) = &b.cond {
                    f(c);
                }
            }
            StmtKind::Case(c) => f(&c.dest),
            StmtKind::Return(r) => {
                for s in &r.modifieds {
                    s.visit_exps(f);
                }
                for s in &r.returns {
                    s.visit_exps(f);
                }
            }
        }
    }

    /// All integer constants appearing in the statement, in traversal
    /// order.
    pub fn find_constants(&self) -> Vec<i64> {
        let mut out = Vec::new();
        self.visit_exps(&mut |e| {
            collect_ints(e, &mut out);
        });
        out
    }

    // -----------------------------------------------------------------
    // Use/def sets
    // -----------------------------------------------------------------

    /// Locations this statement reads.
    pub fn used_locations(&self, out: &mut LocationSet) {
        match &self.kind {
            StmtKind::Assign(a) => {
                collect_locations(&a.rhs, out);
                // Writing through memory still reads the address.
                collect_lhs_inner_uses(&a.lhs, out);
                if let Some(g) = &a.guard {
                    collect_locations(g, out);
                }
            }
            StmtKind::Phi(p) => {
                for d in &p.defs {
                    collect_locations(&d.exp, out);
                }
            }
            StmtKind::Bool(b) => {
                collect_locations(&b.cond, out);
                collect_lhs_inner_uses(&b.lhs, out);
            }
            StmtKind::Call(c) => {
                collect_locations(&c.dest, out);
                for a in &c.arguments {
                    a.used_locations(out);
                }
            }
            StmtKind::Goto(g) => collect_locations(&g.dest, out),
            StmtKind::Branch(b) => {
                collect_locations(&b.dest, out);
                if let Some(c) = &b.cond {
                    collect_locations(c, out);
                }
            }
            StmtKind::Case(c) => collect_locations(&c.dest, out),
            StmtKind::Return(r) => {
                for s in &r.returns {
                    s.used_locations(out);
                }
            }
        }
    }

    /// Locations this statement writes.
    pub fn defined_locations(&self, out: &mut LocationSet) {
        match &self.kind {
            StmtKind::Assign(a) => {
                out.insert(a.lhs.clone());
            }
            StmtKind::Phi(p) => {
                out.insert(p.lhs.clone());
            }
            StmtKind::Bool(b) => {
                out.insert(b.lhs.clone());
            }
            StmtKind::Call(c) => {
                for d in &c.defines {
                    if let Some(l) = d.lhs() {
                        out.insert(l.clone());
                    }
                }
            }
            StmtKind::Return(r) => {
                for m in &r.modifieds {
                    if let Some(l) = m.lhs() {
                        out.insert(l.clone());
                    }
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // SSA support
    // -----------------------------------------------------------------

    /// Wraps every use of `loc` into `Ref(loc, def)`. The top-level lhs of
    /// an assignment is a definition and stays bare, but uses inside it
    /// (a memory write's address) are subscripted.
    pub fn subscript_var(&mut self, loc: &Exp, def: Option<StmtId>) {
        let loc = loc.clone();
        match &mut self.kind {
            StmtKind::Assign(a) => {
                a.rhs = subscript_exp(std::mem::replace(&mut a.rhs, Exp::int(0)), &loc, def);
                a.lhs = subscript_lhs(std::mem::replace(&mut a.lhs, Exp::int(0)), &loc, def);
                if let Some(g) = a.guard.take() {
                    a.guard = Some(subscript_exp(g, &loc, def));
                }
            }
            StmtKind::Phi(p) => {
                p.lhs = subscript_lhs(std::mem::replace(&mut p.lhs, Exp::int(0)), &loc, def);
            }
            StmtKind::Bool(b) => {
                b.cond = subscript_exp(std::mem::replace(&mut b.cond, Exp::int(0)), &loc, def);
                b.lhs = subscript_lhs(std::mem::replace(&mut b.lhs, Exp::int(0)), &loc, def);
            }
            StmtKind::Call(c) => {
                c.dest = subscript_exp(std::mem::replace(&mut c.dest, Exp::int(0)), &loc, def);
                for a in &mut c.arguments {
                    a.subscript_var(&loc, def);
                }
            }
            StmtKind::Goto(g) => {
                g.dest = subscript_exp(std::mem::replace(&mut g.dest, Exp::int(0)), &loc, def);
            }
            StmtKind::Branch(b) => {
                b.dest = subscript_exp(std::mem::replace(&mut b.dest, Exp::int(0)), &loc, def);
                if let Some(c) = b.cond.take() {
                    b.cond = Some(subscript_exp(c, &loc, def));
                }
            }
            StmtKind::Case(c) => {
                c.dest = subscript_exp(std::mem::replace(&mut c.dest, Exp::int(0)), &loc, def);
            }
            StmtKind::Return(r) => {
                for s in &mut r.returns {
                    s.subscript_var(&loc, def);
                }
            }
        }
    }

    /// Substitutes `rhs` for uses of `lhs`; the propagation peephole.
    /// Returns whether anything changed.
    pub fn bypass(&mut self, lhs: &Exp, rhs: &Exp) -> bool {
        let mut changed = false;
        self.for_each_exp_mut(&mut |e| {
            let (ne, ch) = e.search_replace_all(lhs, rhs);
            if ch {
                *e = ne;
                changed = true;
            }
        });
        changed
    }

    /// Removes `Size(n, e)` wrappers once type inference has consumed
    /// them.
    pub fn strip_sizes(&mut self) {
        struct Strip;
        impl ExpVisitor for Strip {
            fn visit(&mut self, e: &mut Exp) -> bool {
                loop {
                    let inner = match e {
                        Exp::Binary {
                            op: Operator::Size,
                            sub2,
                            ..
                        } => Some(std::mem::replace(&mut **sub2, Exp::int(0))),
                        _ => None,
                    };
                    match inner {
                        Some(i) => *e = i,
                        None => break,
                    }
                }
                true
            }
        }
        self.accept(&mut Strip);
    }
}

fn collect_ints(e: &Exp, out: &mut Vec<i64>) {
    match e {
        Exp::Const {
            kind: ConstKind::Int(v),
            ..
        } => out.push(*v),
        Exp::Location { op, sub1, .. } => {
            // Register numbers and symbol names are spellings, not values;
            // only memory address computations hold real constants.
            if *op == Operator::MemOf || *op == Operator::Idx {
                collect_ints(sub1, out);
            }
            return;
        }
        _ => {}
    }
    for c in e.children() {
        collect_ints(c, out);
    }
}

/// Inserts every location (and subscripted location) in `e` into `out`,
/// recursing so address computations inside memory accesses count too.
fn collect_locations(e: &Exp, out: &mut LocationSet) {
    match e {
        Exp::Location { .. } => {
            out.insert(e.clone());
        }
        Exp::Ref { sub1, .. } => {
            if sub1.is_location() {
                out.insert(e.clone());
            }
        }
        _ => {}
    }
    for c in e.children() {
        collect_locations(c, out);
    }
}

/// Uses hiding inside a definition's lhs: for a memory write the address
/// expression is read, for a plain register lhs nothing is.
fn collect_lhs_inner_uses(lhs: &Exp, out: &mut LocationSet) {
    if let Exp::Location {
        op: Operator::MemOf,
        sub1,
        ..
    } = lhs
    {
        collect_locations(sub1, out);
    }
}

/// Rewrites uses of `loc` in an r-value position.
fn subscript_exp(e: Exp, loc: &Exp, def: Option<StmtId>) -> Exp {
    if e == *loc {
        return Exp::subscript(e, def);
    }
    if let Exp::Ref { .. } = e {
        // Already subscripted; do not re-wrap.
        return e;
    }
    let mut e = e;
    match &mut e {
        Exp::Terminal(_) | Exp::Const { .. } | Exp::TypeVal(_) => {}
        Exp::Unary { sub1, .. }
        | Exp::Typed { sub1, .. }
        | Exp::Location { sub1, .. }
        | Exp::FlagDef { sub1, .. } => {
            **sub1 = subscript_exp(std::mem::replace(&mut **sub1, Exp::int(0)), loc, def);
        }
        Exp::Binary { sub1, sub2, .. } => {
            **sub1 = subscript_exp(std::mem::replace(&mut **sub1, Exp::int(0)), loc, def);
            **sub2 = subscript_exp(std::mem::replace(&mut **sub2, Exp::int(0)), loc, def);
        }
        Exp::Ternary {
            sub1, sub2, sub3, ..
        } => {
            **sub1 = subscript_exp(std::mem::replace(&mut **sub1, Exp::int(0)), loc, def);
            **sub2 = subscript_exp(std::mem::replace(&mut **sub2, Exp::int(0)), loc, def);
            **sub3 = subscript_exp(std::mem::replace(&mut **sub3, Exp::int(0)), loc, def);
        }
        Exp::Ref { .. } => {}
    }
    e
}

/// Rewrites uses inside a definition's lhs without touching the defined
/// location itself.
fn subscript_lhs(lhs: Exp, loc: &Exp, def: Option<StmtId>) -> Exp {
    match lhs {
        Exp::Location {
            op: Operator::MemOf,
            sub1,
            proc,
        } => Exp::Location {
            op: Operator::MemOf,
            sub1: Box::new(subscript_exp(*sub1, loc, def)),
            proc,
        },
        other => other,
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4} ", self.number)?;
        match &self.kind {
            StmtKind::Assign(a) => {
                if let Some(g) = &a.guard {
                    write!(f, "{} => ", g)?;
                }
                if let Some(ty) = &a.ty {
                    write!(f, "*{}* ", ty)?;
                }
                write!(f, "{} := {}", a.lhs, a.rhs)
            }
            StmtKind::Phi(p) => {
                write!(f, "{} := phi{{", p.lhs)?;
                for (i, d) in p.defs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match d.stmt {
                        Some(s) => write!(f, "{}", s)?,
                        None => write!(f, "-")?,
                    }
                }
                write!(f, "}}")
            }
            StmtKind::Bool(b) => {
                write!(f, "BOOL {} := CC({}), condition {}", b.lhs, b.cond, b.jt.name())
            }
            StmtKind::Call(c) => write!(f, "CALL {}", c.dest),
            StmtKind::Goto(g) => write!(f, "GOTO {}", g.dest),
            StmtKind::Branch(b) => {
                write!(f, "BRANCH {}, condition {}", b.dest, b.jt.name())?;
                if let Some(c) = &b.cond {
                    write!(f, " {}", c)?;
                }
                Ok(())
            }
            StmtKind::Case(c) => write!(f, "SWITCH({})", c.dest),
            StmtKind::Return(r) => {
                write!(f, "RET")?;
                for (i, s) in r.returns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if let StmtKind::Assign(a) = &s.kind {
                        write!(f, " {} := {}", a.lhs, a.rhs)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Signedness;

    #[test]
    fn typed_assign_prints_in_dump_form() {
        let mut s = Statement::new(StmtKind::Assign(Assign::typed(
            Type::int(32, Signedness::Signed),
            Exp::reg(0),
            Exp::binary(Operator::Plus, Exp::int(5), Exp::int(6)),
        )));
        s.number = 0;
        assert_eq!(s.to_string(), "   0 *i32* r0 := 5 + 6");
    }

    #[test]
    fn untyped_assign_prints_without_type() {
        let mut s = Statement::assign(Exp::reg(8), Exp::reg(9));
        s.number = 12;
        assert_eq!(s.to_string(), "  12 r8 := r9");
    }

    #[test]
    fn find_constants_reports_both_operands() {
        let s = Statement::assign(
            Exp::reg(0),
            Exp::binary(Operator::Plus, Exp::int(5), Exp::int(6)),
        );
        assert_eq!(s.find_constants(), vec![5, 6]);
    }

    #[test]
    fn used_and_defined_locations() {
        // m[r28 + 4] := r24
        let s = Statement::assign(
            Exp::mem_of(Exp::binary(Operator::Plus, Exp::reg(28), Exp::int(4))),
            Exp::reg(24),
        );
        let mut used = LocationSet::new();
        s.used_locations(&mut used);
        assert!(used.contains(&Exp::reg(24)));
        assert!(used.contains(&Exp::reg(28)));
        assert!(!used.contains(&s.lhs().unwrap().clone()));

        let mut defined = LocationSet::new();
        s.defined_locations(&mut defined);
        assert_eq!(defined.len(), 1);
        assert!(defined.contains(s.lhs().unwrap()));
    }

    #[test]
    fn subscript_var_wraps_uses_not_defs() {
        // r0 := r0 + 1  -- the use gets subscripted, the def stays bare.
        let mut s = Statement::assign(
            Exp::reg(0),
            Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(1)),
        );
        s.subscript_var(&Exp::reg(0), Some(StmtId(7)));
        match &s.kind {
            StmtKind::Assign(a) => {
                assert_eq!(a.lhs, Exp::reg(0));
                assert_eq!(
                    a.rhs,
                    Exp::binary(
                        Operator::Plus,
                        Exp::subscript(Exp::reg(0), Some(StmtId(7))),
                        Exp::int(1)
                    )
                );
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn subscript_var_reaches_memory_write_address() {
        // m[r28] := 5 -- the address read is a use.
        let mut s = Statement::assign(Exp::mem_of(Exp::reg(28)), Exp::int(5));
        s.subscript_var(&Exp::reg(28), Some(StmtId(3)));
        match &s.kind {
            StmtKind::Assign(a) => {
                assert_eq!(
                    a.lhs,
                    Exp::mem_of(Exp::subscript(Exp::reg(28), Some(StmtId(3))))
                );
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn subscript_var_does_not_double_wrap() {
        let mut s = Statement::assign(
            Exp::reg(1),
            Exp::subscript(Exp::reg(0), Some(StmtId(2))),
        );
        s.subscript_var(&Exp::reg(0), Some(StmtId(9)));
        match &s.kind {
            StmtKind::Assign(a) => {
                assert_eq!(a.rhs, Exp::subscript(Exp::reg(0), Some(StmtId(2))));
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn strip_sizes_unwraps() {
        let mut s = Statement::assign(
            Exp::reg(0),
            Exp::binary(
                Operator::Size,
                Exp::int(32),
                Exp::binary(Operator::Plus, Exp::reg(1), Exp::int(4)),
            ),
        );
        s.strip_sizes();
        match &s.kind {
            StmtKind::Assign(a) => {
                assert_eq!(a.rhs, Exp::binary(Operator::Plus, Exp::reg(1), Exp::int(4)));
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn bypass_substitutes_uses() {
        let mut s = Statement::assign(
            Exp::reg(1),
            Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(1)),
        );
        let changed = s.bypass(&Exp::reg(0), &Exp::int(41));
        assert!(changed);
        match &s.kind {
            StmtKind::Assign(a) => {
                assert_eq!(a.rhs, Exp::binary(Operator::Plus, Exp::int(41), Exp::int(1)));
            }
            _ => panic!("expected assign"),
        }
        assert!(!s.bypass(&Exp::reg(0), &Exp::int(41)));
    }

    #[test]
    fn flag_assign_detection() {
        let flagcall = Exp::binary(
            Operator::FlagCall,
            Exp::str_const("SUBFLAGS"),
            Exp::Terminal(Operator::Nil),
        );
        let s = Statement::assign(Exp::Terminal(Operator::Flags), flagcall);
        assert!(s.is_flag_assign());
        assert!(s.is_assignment());
        let t = Statement::assign(Exp::reg(0), Exp::int(1));
        assert!(!t.is_flag_assign());
    }

    #[test]
    fn branch_kind_int_roundtrip() {
        for i in 0..15 {
            let k = BranchKind::from_int(i).unwrap();
            assert_eq!(k.to_int(), i);
        }
        assert_eq!(BranchKind::from_int(99), None);
    }
}
