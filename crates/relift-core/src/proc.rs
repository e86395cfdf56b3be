//! Library and user procedures.
//!
//! A [`LibProc`] is external: a signature and caller bookkeeping, never a
//! body. A [`UserProc`] owns a [`Cfg`] and everything the decompilation
//! passes accumulate: locals, the symbol map, callee links, and the
//! proven-true facts callers may substitute at their call sites.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cfg::Cfg;
use crate::exp::Exp;
use crate::id::{Addr, ClusterId, ProcId, StmtId};
use crate::signature::Signature;
use crate::stmt::Statement;
use crate::ty::Type;

/// Decompilation progress of a user procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcStatus {
    #[default]
    New,
    Decoded,
    Visited,
    EarlyDone,
    FinalDone,
    CodeGenerated,
}

impl ProcStatus {
    pub fn to_int(self) -> i32 {
        self as i32
    }

    pub fn from_int(i: i32) -> Option<ProcStatus> {
        use ProcStatus::*;
        [New, Decoded, Visited, EarlyDone, FinalDone, CodeGenerated]
            .get(i as usize)
            .copied()
    }
}

/// State shared by library and user procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcCommon {
    pub address: Addr,
    pub signature: Signature,
    pub first_caller: Option<ProcId>,
    pub first_caller_addr: Addr,
    pub cluster: Option<ClusterId>,
    /// Call statements known to target this procedure.
    pub callers: std::collections::BTreeSet<StmtId>,
    /// Facts established about this procedure, e.g.
    /// `r28 == r28{entry} + 4`. Ordered by the expression total order so
    /// iteration and persistence are deterministic.
    pub proven_true: BTreeMap<Exp, Exp>,
}

impl ProcCommon {
    pub fn new(name: &str, address: Addr) -> ProcCommon {
        ProcCommon {
            address,
            signature: Signature::new(name),
            first_caller: None,
            first_caller_addr: Addr::INVALID,
            cluster: None,
            callers: std::collections::BTreeSet::new(),
            proven_true: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn add_caller(&mut self, call: StmtId) {
        self.callers.insert(call);
    }

    pub fn set_proven_true(&mut self, lhs: Exp, rhs: Exp) {
        self.proven_true.insert(lhs, rhs);
    }
}

/// An external (library) procedure; signature only, no body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibProc {
    pub common: ProcCommon,
}

/// A procedure with a decoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProc {
    pub common: ProcCommon,
    pub status: ProcStatus,
    pub cfg: Cfg,
    /// Local variables in insertion order.
    pub locals: IndexMap<String, Type>,
    /// Maps IR expressions to the symbolic expressions naming them; a
    /// multimap since one location can acquire several names.
    pub symbol_map: BTreeMap<Exp, Vec<Exp>>,
    pub callees: Vec<ProcId>,
    pub return_stmt: Option<StmtId>,
}

impl UserProc {
    pub fn new(name: &str, address: Addr) -> UserProc {
        UserProc {
            common: ProcCommon::new(name, address),
            status: ProcStatus::New,
            cfg: Cfg::new(),
            locals: IndexMap::new(),
            symbol_map: BTreeMap::new(),
            callees: Vec::new(),
            return_stmt: None,
        }
    }

    pub fn add_local(&mut self, name: &str, ty: Type) {
        self.locals.insert(name.to_string(), ty);
    }

    pub fn map_symbol_to(&mut self, from: Exp, to: Exp) {
        self.symbol_map.entry(from).or_default().push(to);
    }

    pub fn add_callee(&mut self, callee: ProcId) {
        if !self.callees.contains(&callee) {
            self.callees.push(callee);
        }
    }

    /// Finds a statement by id anywhere in the body, including the nested
    /// assignments of calls and returns.
    pub fn find_statement(&self, id: StmtId) -> Option<&Statement> {
        for (_, bb) in self.cfg.blocks() {
            for rtl in &bb.rtls {
                for s in &rtl.stmts {
                    if let Some(found) = find_in_stmt(s, id) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Substitutes this procedure's proven facts into `e`; the caller-side
    /// propagation step. Returns the rewritten expression and whether
    /// anything changed.
    pub fn substitute_proven(&self, e: &Exp) -> (Exp, bool) {
        let mut out = e.clone();
        let mut changed = false;
        for (lhs, rhs) in &self.common.proven_true {
            let (next, ch) = out.search_replace_all(lhs, rhs);
            if ch {
                out = next;
                changed = true;
            }
        }
        (out, changed)
    }
}

fn find_in_stmt(s: &Statement, id: StmtId) -> Option<&Statement> {
    use crate::stmt::StmtKind;
    if s.id == id {
        return Some(s);
    }
    match &s.kind {
        StmtKind::Call(c) => c
            .arguments
            .iter()
            .chain(&c.defines)
            .find_map(|n| find_in_stmt(n, id)),
        StmtKind::Return(r) => r
            .modifieds
            .iter()
            .chain(&r.returns)
            .find_map(|n| find_in_stmt(n, id)),
        _ => None,
    }
}

/// A procedure: external or decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Proc {
    Lib(LibProc),
    User(UserProc),
}

impl Proc {
    pub fn lib(name: &str, address: Addr) -> Proc {
        Proc::Lib(LibProc {
            common: ProcCommon::new(name, address),
        })
    }

    pub fn user(name: &str, address: Addr) -> Proc {
        Proc::User(UserProc::new(name, address))
    }

    pub fn is_lib(&self) -> bool {
        matches!(self, Proc::Lib(_))
    }

    pub fn common(&self) -> &ProcCommon {
        match self {
            Proc::Lib(p) => &p.common,
            Proc::User(p) => &p.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut ProcCommon {
        match self {
            Proc::Lib(p) => &mut p.common,
            Proc::User(p) => &mut p.common,
        }
    }

    pub fn name(&self) -> &str {
        self.common().name()
    }

    pub fn as_user(&self) -> Option<&UserProc> {
        match self {
            Proc::User(p) => Some(p),
            Proc::Lib(_) => None,
        }
    }

    pub fn as_user_mut(&mut self) -> Option<&mut UserProc> {
        match self {
            Proc::User(p) => Some(p),
            Proc::Lib(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;

    #[test]
    fn lib_proc_has_no_body() {
        let p = Proc::lib("printf", Addr(0x8048000));
        assert!(p.is_lib());
        assert!(p.as_user().is_none());
        assert_eq!(p.name(), "printf");
    }

    #[test]
    fn proven_true_iterates_in_expression_order() {
        let mut c = ProcCommon::new("f", Addr(0));
        c.set_proven_true(Exp::reg(29), Exp::reg(29));
        c.set_proven_true(
            Exp::reg(28),
            Exp::binary(Operator::Plus, Exp::reg(28), Exp::int(4)),
        );
        let keys: Vec<&Exp> = c.proven_true.keys().collect();
        assert_eq!(keys, vec![&Exp::reg(28), &Exp::reg(29)]);
    }

    #[test]
    fn substitute_proven_rewrites_caller_exp() {
        let mut u = UserProc::new("callee", Addr(0x100));
        u.common.set_proven_true(
            Exp::reg(28),
            Exp::binary(Operator::Plus, Exp::reg(28), Exp::int(4)),
        );
        let e = Exp::mem_of(Exp::reg(28));
        let (out, changed) = u.substitute_proven(&e);
        assert!(changed);
        assert_eq!(
            out,
            Exp::mem_of(Exp::binary(Operator::Plus, Exp::reg(28), Exp::int(4)))
        );
    }

    #[test]
    fn symbol_map_is_a_multimap() {
        let mut u = UserProc::new("f", Addr(0));
        u.map_symbol_to(Exp::reg(24), Exp::local("x", ProcId(0)));
        u.map_symbol_to(Exp::reg(24), Exp::local("y", ProcId(0)));
        assert_eq!(u.symbol_map.get(&Exp::reg(24)).unwrap().len(), 2);
    }

    #[test]
    fn status_int_roundtrip() {
        for i in 0..6 {
            assert_eq!(ProcStatus::from_int(i).unwrap().to_int(), i);
        }
        assert_eq!(ProcStatus::from_int(6), None);
    }
}
