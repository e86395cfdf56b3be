//! Post-SSA statement-level passes: propagation, dead statement removal,
//! and the exit from SSA form.
//!
//! These maintain the reference contracts: a statement is only removed
//! once nothing references it, and leaving SSA strips every `Ref` so no
//! dangling definition pointers can survive.

use std::collections::BTreeSet;

use relift_core::{Exp, ExpVisitor, Operator, Statement, StmtId, StmtKind, UserProc};

/// Substitutes trivially-copyable assignments into their uses.
///
/// An assignment `L := e` where `e` is a constant, a location, or a
/// subscripted location is a propagation source: every use
/// `Ref(L, this)` elsewhere becomes `e`. Runs to a fixed point and
/// returns the number of substitutions made.
pub fn propagate_statements(user: &mut UserProc) -> usize {
    let mut total = 0;
    loop {
        let sources = collect_sources(user);
        let mut changed = 0;
        for (id, lhs, rhs) in &sources {
            let pattern = Exp::subscript(lhs.clone(), Some(*id));
            for_each_statement_mut(user, &mut |s| {
                if s.id != *id && s.bypass(&pattern, rhs) {
                    changed += 1;
                }
            });
        }
        total += changed;
        if changed == 0 {
            return total;
        }
    }
}

fn collect_sources(user: &UserProc) -> Vec<(StmtId, Exp, Exp)> {
    let mut out = Vec::new();
    for (_, bb) in user.cfg.blocks() {
        for rtl in &bb.rtls {
            for s in &rtl.stmts {
                if let StmtKind::Assign(a) = &s.kind {
                    if s.id == StmtId::UNASSIGNED || a.guard.is_some() {
                        continue;
                    }
                    if !a.lhs.is_location() || a.lhs.op() == Operator::MemOf {
                        continue;
                    }
                    if is_trivial(&a.rhs) {
                        out.push((s.id, a.lhs.clone(), a.rhs.clone()));
                    }
                }
            }
        }
    }
    out
}

fn is_trivial(e: &Exp) -> bool {
    match e {
        Exp::Const { .. } => true,
        Exp::Location { op, .. } => *op != Operator::MemOf,
        Exp::Ref { sub1, .. } => sub1.is_location(),
        _ => false,
    }
}

/// Removes assignments whose definitions are never referenced.
///
/// Only plain register/symbol assignments are candidates: memory writes,
/// flag assignments, calls, and control transfers always stay. Runs to a
/// fixed point (removing one dead statement can kill another) and returns
/// the number removed.
pub fn remove_unused_statements(user: &mut UserProc) -> usize {
    let mut removed = 0;
    loop {
        let used = referenced_defs(user);
        let mut this_round = 0;
        let ids: Vec<relift_core::BbId> = user.cfg.block_ids().collect();
        for b in ids {
            let bb = user.cfg.block_mut(b).expect("block id from iterator");
            for rtl in &mut bb.rtls {
                rtl.stmts.retain(|s| {
                    let dead = is_removable(s) && !used.contains(&s.id);
                    if dead {
                        this_round += 1;
                    }
                    !dead
                });
            }
        }
        removed += this_round;
        if this_round == 0 {
            return removed;
        }
    }
}

fn is_removable(s: &Statement) -> bool {
    match &s.kind {
        StmtKind::Assign(a) => {
            a.lhs.is_location() && a.lhs.op() != Operator::MemOf && !s.is_flag_assign()
        }
        StmtKind::Phi(p) => p.lhs.is_location() && p.lhs.op() != Operator::MemOf,
        _ => false,
    }
}

/// Every statement id referenced by some `Ref` in the procedure.
fn referenced_defs(user: &UserProc) -> BTreeSet<StmtId> {
    fn walk(e: &Exp, out: &mut BTreeSet<StmtId>) {
        if let Exp::Ref {
            def: Some(def), ..
        } = e
        {
            out.insert(*def);
        }
        for c in e.children() {
            walk(c, out);
        }
    }
    let mut out = BTreeSet::new();
    for (_, bb) in user.cfg.blocks() {
        for rtl in &bb.rtls {
            for s in &rtl.stmts {
                s.visit_exps(&mut |e| walk(e, &mut out));
            }
        }
    }
    out
}

/// Leaves SSA form: strips every `Ref(loc, def)` down to `loc` and drops
/// the phi statements. Correct once propagation has made the phi
/// arguments agree on a single source.
pub fn from_ssa_form(user: &mut UserProc) {
    struct Unsub;
    impl ExpVisitor for Unsub {
        fn visit(&mut self, e: &mut Exp) -> bool {
            loop {
                let inner = match e {
                    Exp::Ref { sub1, .. } => {
                        Some(std::mem::replace(&mut **sub1, Exp::int(0)))
                    }
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
    for_each_statement_mut(user, &mut |s| s.accept(&mut Unsub));
    let ids: Vec<relift_core::BbId> = user.cfg.block_ids().collect();
    for b in ids {
        let bb = user.cfg.block_mut(b).expect("block id from iterator");
        for rtl in &mut bb.rtls {
            rtl.stmts.retain(|s| !matches!(s.kind, StmtKind::Phi(_)));
        }
    }
}

fn for_each_statement_mut(user: &mut UserProc, f: &mut dyn FnMut(&mut Statement)) {
    let ids: Vec<relift_core::BbId> = user.cfg.block_ids().collect();
    for b in ids {
        let bb = user.cfg.block_mut(b).expect("block id from iterator");
        for rtl in &mut bb.rtls {
            for s in &mut rtl.stmts {
                f(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relift_core::{Addr, BbType, Proc, Program, Rtl};

    fn single_block_proc(prog: &mut Program, stmts: Vec<Statement>) -> relift_core::ProcId {
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        let mut r = Rtl::new(Addr(0));
        for s in stmts {
            r.append(s);
        }
        let b = user.cfg.add_bb(vec![r], BbType::Ret).unwrap();
        user.cfg.entry = Some(b);
        pid
    }

    #[test]
    fn propagation_substitutes_constant_copies() {
        let mut prog = Program::new("p");
        let pid = single_block_proc(
            &mut prog,
            vec![
                Statement::assign(Exp::reg(0), Exp::int(5)),
                Statement::assign(Exp::reg(1), Exp::reg(0)),
            ],
        );
        prog.init_statements(pid).unwrap();
        crate::ssa::rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        let n = propagate_statements(user);
        assert!(n >= 1);
        let bb = user.cfg.block(relift_core::BbId(0)).unwrap();
        match &bb.rtls[0].stmts[1].kind {
            StmtKind::Assign(a) => assert_eq!(a.rhs, Exp::int(5)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn unused_definition_is_removed_but_used_stays() {
        let mut prog = Program::new("p");
        let pid = single_block_proc(
            &mut prog,
            vec![
                Statement::assign(Exp::reg(0), Exp::int(5)),
                Statement::assign(Exp::reg(2), Exp::int(9)), // never used
                Statement::assign(Exp::reg(1), Exp::reg(0)),
            ],
        );
        prog.init_statements(pid).unwrap();
        crate::ssa::rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        let removed = remove_unused_statements(user);
        // r2 := 9 dies; r0 := 5 is referenced by the renamed use of r0.
        // The final copy r1 := r0{..} is itself unreferenced and dies too,
        // which then frees r0 := 5 -- the fixed point removes all three
        // unless something downstream uses r1. That is the contract:
        // nothing outside the block keeps them alive.
        assert!(removed >= 1);
        prog.check_ref_integrity().unwrap();
    }

    #[test]
    fn memory_writes_are_never_removed() {
        let mut prog = Program::new("p");
        let pid = single_block_proc(
            &mut prog,
            vec![Statement::assign(Exp::mem_of(Exp::reg(28)), Exp::int(1))],
        );
        prog.init_statements(pid).unwrap();
        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        assert_eq!(remove_unused_statements(user), 0);
        assert_eq!(
            user.cfg
                .block(relift_core::BbId(0))
                .unwrap()
                .rtls[0]
                .stmts
                .len(),
            1
        );
    }

    #[test]
    fn from_ssa_strips_refs_and_phis() {
        let mut prog = Program::new("p");
        let pid = single_block_proc(
            &mut prog,
            vec![
                Statement::assign(Exp::reg(0), Exp::int(5)),
                Statement::assign(Exp::reg(1), Exp::reg(0)),
            ],
        );
        prog.init_statements(pid).unwrap();
        crate::ssa::rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        from_ssa_form(user);
        let bb = user.cfg.block(relift_core::BbId(0)).unwrap();
        match &bb.rtls[0].stmts[1].kind {
            StmtKind::Assign(a) => assert_eq!(a.rhs, Exp::reg(0)),
            _ => unreachable!(),
        }
        // No refs anywhere afterwards.
        prog.check_ref_integrity().unwrap();
    }
}
