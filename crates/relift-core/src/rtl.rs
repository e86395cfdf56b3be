//! Register Transfer Lists.
//!
//! An RTL is the ordered list of statements produced for one native
//! instruction, anchored at that instruction's address. Statement order is
//! semantic: earlier statements' effects are visible to later ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exp::ExpVisitor;
use crate::id::Addr;
use crate::stmt::{LocationSet, Statement};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rtl {
    pub addr: Addr,
    pub stmts: Vec<Statement>,
}

impl Rtl {
    pub fn new(addr: Addr) -> Rtl {
        Rtl {
            addr,
            stmts: Vec::new(),
        }
    }

    pub fn with_stmts(addr: Addr, stmts: Vec<Statement>) -> Rtl {
        Rtl { addr, stmts }
    }

    pub fn append(&mut self, stmt: Statement) {
        self.stmts.push(stmt);
    }

    /// Inserts a statement at the front; used for phi placement at a
    /// block's head RTL.
    pub fn prepend(&mut self, stmt: Statement) {
        self.stmts.insert(0, stmt);
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Runs an expression visitor over every statement.
    pub fn accept(&mut self, v: &mut dyn ExpVisitor) {
        for s in &mut self.stmts {
            s.accept(v);
        }
    }

    /// Locations read by any statement in the list.
    pub fn used_locations(&self, out: &mut LocationSet) {
        for s in &self.stmts {
            s.used_locations(out);
        }
    }

    /// Locations written by any statement in the list.
    pub fn defined_locations(&self, out: &mut LocationSet) {
        for s in &self.stmts {
            s.defined_locations(out);
        }
    }
}

impl fmt::Display for Rtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:08x}", self.addr.0)?;
        for s in &self.stmts {
            writeln!(f, "{}", s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::{ConstKind, Exp, ExpVisitor};
    use crate::operator::Operator;

    /// A constant-collecting visitor over an RTL's statements. Location
    /// spellings (register numbers, symbol names) are pruned; only value
    /// constants count.
    struct CollectConsts(Vec<i64>);

    impl ExpVisitor for CollectConsts {
        fn visit(&mut self, e: &mut Exp) -> bool {
            match e {
                Exp::Const {
                    kind: ConstKind::Int(v),
                    ..
                } => {
                    self.0.push(*v);
                    true
                }
                Exp::Location { op, .. } => *op == Operator::MemOf,
                _ => true,
            }
        }
    }

    #[test]
    fn visitor_sees_exactly_the_constants() {
        // r0 := 5 + 6 -- the visitor must report exactly 5 and 6, not the
        // register number inside r0.
        let mut rtl = Rtl::new(Addr(0x1000));
        rtl.append(Statement::assign(
            Exp::reg(0),
            Exp::binary(Operator::Plus, Exp::int(5), Exp::int(6)),
        ));
        let mut v = CollectConsts(Vec::new());
        rtl.accept(&mut v);
        assert_eq!(v.0, vec![5, 6]);
    }

    #[test]
    fn order_is_preserved() {
        let mut rtl = Rtl::new(Addr(0));
        rtl.append(Statement::assign(Exp::reg(0), Exp::int(1)));
        rtl.append(Statement::assign(Exp::reg(1), Exp::int(2)));
        rtl.prepend(Statement::assign(Exp::reg(2), Exp::int(3)));
        let firsts: Vec<i64> = rtl
            .stmts
            .iter()
            .map(|s| s.find_constants()[0])
            .collect();
        assert_eq!(firsts, vec![3, 1, 2]);
    }

    #[test]
    fn use_def_aggregation() {
        let mut rtl = Rtl::new(Addr(4));
        rtl.append(Statement::assign(
            Exp::reg(0),
            Exp::binary(Operator::Plus, Exp::reg(1), Exp::int(1)),
        ));
        rtl.append(Statement::assign(Exp::reg(2), Exp::reg(0)));
        let mut used = LocationSet::new();
        rtl.used_locations(&mut used);
        assert!(used.contains(&Exp::reg(1)));
        assert!(used.contains(&Exp::reg(0)));
        let mut defined = LocationSet::new();
        rtl.defined_locations(&mut defined);
        assert!(defined.contains(&Exp::reg(0)));
        assert!(defined.contains(&Exp::reg(2)));
    }
}
