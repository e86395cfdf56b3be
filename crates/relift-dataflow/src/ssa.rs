//! SSA construction: phi placement and variable renaming.
//!
//! `place_phi` inserts a [`PhiAssign`] for every location assigned in the
//! procedure at each block of the iterated dominance frontier of its
//! definition sites. `rename_variables` then walks the dominator tree in
//! the style of Cytron et al., wrapping every use into `Ref(loc, def)`
//! from a per-location stack of current definitions and filling phi
//! arguments in predecessor in-edge order.

use std::collections::{BTreeMap, BTreeSet};

use relift_core::{
    BbId, Cfg, Exp, LocationSet, PhiAssign, PhiDef, ProcId, Program, Statement, StmtId, StmtKind,
};

use crate::dominators::{compute_dominators, DomTree};
use crate::error::FlowError;

/// Inserts phi assignments at iterated dominance frontiers.
///
/// A CFG with no entry is left untouched. Blocks that already carry a phi
/// for a location don't get a second one, so the pass is idempotent.
pub fn place_phi(prog: &mut Program, pid: ProcId) -> Result<(), FlowError> {
    let dom = {
        let Some(user) = prog.proc(pid).and_then(|p| p.as_user()) else {
            return Ok(());
        };
        match compute_dominators(&user.cfg) {
            Some(d) => d,
            None => return Ok(()),
        }
    };

    // Definition sites per location.
    let mut def_sites: BTreeMap<Exp, BTreeSet<BbId>> = BTreeMap::new();
    {
        let user = prog.proc(pid).and_then(|p| p.as_user()).expect("checked");
        for (id, bb) in user.cfg.blocks() {
            for rtl in &bb.rtls {
                for s in &rtl.stmts {
                    let mut defs = LocationSet::new();
                    s.defined_locations(&mut defs);
                    for loc in defs {
                        if loc.is_location() {
                            def_sites.entry(loc).or_default().insert(id);
                        }
                    }
                }
            }
        }
    }

    let mut ctx = prog.user_ctx(pid)?;
    for (loc, sites) in def_sites {
        let mut worklist: Vec<BbId> = sites.iter().copied().collect();
        let mut ever: BTreeSet<BbId> = sites;
        let mut placed: BTreeSet<BbId> = BTreeSet::new();
        while let Some(b) = worklist.pop() {
            let frontier: Vec<BbId> = dom.frontier[b.0 as usize].iter().copied().collect();
            for df in frontier {
                if placed.contains(&df) {
                    continue;
                }
                placed.insert(df);
                if !has_phi_for(&ctx.user.cfg, df, &loc) {
                    let sid = ctx.alloc_stmt_id();
                    insert_phi(&mut ctx.user.cfg, df, &loc, sid, pid);
                }
                if ever.insert(df) {
                    worklist.push(df);
                }
            }
        }
    }
    Ok(())
}

fn has_phi_for(cfg: &Cfg, b: BbId, loc: &Exp) -> bool {
    let Some(bb) = cfg.block(b) else { return false };
    bb.rtls.iter().flat_map(|r| &r.stmts).any(|s| {
        matches!(&s.kind, StmtKind::Phi(p) if p.lhs == *loc)
    })
}

/// Inserts a phi for `loc` at the head RTL of `b`, after any phis already
/// there, with one argument slot per in-edge.
fn insert_phi(cfg: &mut Cfg, b: BbId, loc: &Exp, sid: StmtId, pid: ProcId) {
    let Some(bb) = cfg.block_mut(b) else { return };
    let defs: Vec<PhiDef> = bb
        .in_edges
        .iter()
        .map(|&pred| PhiDef {
            bb: pred,
            stmt: None,
            exp: loc.clone(),
        })
        .collect();
    let mut stmt = Statement::new(StmtKind::Phi(PhiAssign {
        lhs: loc.clone(),
        defs,
    }));
    stmt.id = sid;
    stmt.proc = Some(pid);
    if bb.rtls.is_empty() {
        let addr = relift_core::Addr(0);
        bb.rtls.push(relift_core::Rtl::new(addr));
    }
    let head = &mut bb.rtls[0];
    let pos = head
        .stmts
        .iter()
        .take_while(|s| matches!(s.kind, StmtKind::Phi(_)))
        .count();
    head.stmts.insert(pos, stmt);
}

/// Renames variables into SSA references.
///
/// An in-order walk over the dominator tree: uses are rewritten to the
/// current top-of-stack definition, definitions push, successors' phi
/// arguments are filled for the edge from the current block, and stacks
/// pop back on exit. Uses with no visible definition get `Ref(loc, None)`
/// (live on entry).
pub fn rename_variables(prog: &mut Program, pid: ProcId) -> Result<(), FlowError> {
    prog.init_statements(pid)?;
    let Some(user) = prog.proc_mut(pid).and_then(|p| p.as_user_mut()) else {
        return Ok(());
    };
    let Some(dom) = compute_dominators(&user.cfg) else {
        return Ok(());
    };
    let entry = user.cfg.entry.expect("dominators imply an entry");

    let mut stacks: BTreeMap<Exp, Vec<StmtId>> = BTreeMap::new();
    rename_block(&mut user.cfg, &dom, entry, &mut stacks);

    // Every phi must have argument slots after renaming.
    for (_, bb) in user.cfg.blocks() {
        for rtl in &bb.rtls {
            for s in &rtl.stmts {
                if let StmtKind::Phi(p) = &s.kind {
                    if p.defs.is_empty() {
                        return Err(FlowError::PhiWithoutDefs { stmt: s.id });
                    }
                }
            }
        }
    }
    Ok(())
}

fn rename_block(
    cfg: &mut Cfg,
    dom: &DomTree,
    b: BbId,
    stacks: &mut BTreeMap<Exp, Vec<StmtId>>,
) {
    let mut pushed: Vec<Exp> = Vec::new();

    if let Some(bb) = cfg.block_mut(b) {
        for rtl in &mut bb.rtls {
            for s in &mut rtl.stmts {
                let is_phi = matches!(s.kind, StmtKind::Phi(_));
                if !is_phi {
                    let mut used = LocationSet::new();
                    s.used_locations(&mut used);
                    for loc in used.iter().filter(|l| l.is_location()) {
                        let top = stacks.get(loc).and_then(|v| v.last().copied());
                        s.subscript_var(loc, top);
                    }
                }
                let mut defs = LocationSet::new();
                s.defined_locations(&mut defs);
                for loc in defs {
                    if loc.is_location() {
                        stacks.entry(loc.clone()).or_default().push(s.id);
                        pushed.push(loc);
                    }
                }
            }
        }
    }

    // Fill phi arguments in the successors for the edge from this block.
    let succs: Vec<BbId> = cfg
        .block(b)
        .map(|bb| bb.out_edges.to_vec())
        .unwrap_or_default();
    for succ in succs {
        let Some(j) = cfg
            .block(succ)
            .and_then(|bb| bb.in_edges.iter().position(|&p| p == b))
        else {
            continue;
        };
        if let Some(bb) = cfg.block_mut(succ) {
            for rtl in &mut bb.rtls {
                for s in &mut rtl.stmts {
                    if let StmtKind::Phi(p) = &mut s.kind {
                        let loc = p.lhs.clone();
                        let top = stacks.get(&loc).and_then(|v| v.last().copied());
                        if let Some(d) = p.defs.get_mut(j) {
                            d.bb = b;
                            d.stmt = top;
                            d.exp = Exp::subscript(loc, top);
                        }
                    }
                }
            }
        }
    }

    for &child in &dom.children[b.0 as usize] {
        rename_block(cfg, dom, child, stacks);
    }

    for loc in pushed {
        if let Some(v) = stacks.get_mut(&loc) {
            v.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relift_core::{Addr, BbType, Proc, Rtl};

    /// Diamond CFG where both arms assign r0 and the join uses it.
    fn build_diamond(prog: &mut Program) -> (ProcId, BbId, BbId, BbId, BbId) {
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
        let mk = |addr: u32, stmts: Vec<Statement>| {
            let mut r = Rtl::new(Addr(addr));
            for s in stmts {
                r.append(s);
            }
            vec![r]
        };
        let a = user
            .cfg
            .add_bb(
                mk(0, vec![Statement::assign(Exp::reg(1), Exp::int(0))]),
                BbType::TwoWay,
            )
            .unwrap();
        let b = user
            .cfg
            .add_bb(
                mk(4, vec![Statement::assign(Exp::reg(0), Exp::int(1))]),
                BbType::Fall,
            )
            .unwrap();
        let c = user
            .cfg
            .add_bb(
                mk(8, vec![Statement::assign(Exp::reg(0), Exp::int(2))]),
                BbType::Fall,
            )
            .unwrap();
        let d = user
            .cfg
            .add_bb(
                mk(12, vec![Statement::assign(Exp::reg(1), Exp::reg(0))]),
                BbType::Ret,
            )
            .unwrap();
        user.cfg.add_edge(a, b).unwrap();
        user.cfg.add_edge(a, c).unwrap();
        user.cfg.add_edge(b, d).unwrap();
        user.cfg.add_edge(c, d).unwrap();
        user.cfg.entry = Some(a);
        user.cfg.exit = Some(d);
        (pid, a, b, c, d)
    }

    fn phis_in(prog: &Program, pid: ProcId, b: BbId) -> Vec<PhiAssign> {
        let user = prog.proc(pid).unwrap().as_user().unwrap();
        user.cfg
            .block(b)
            .unwrap()
            .rtls
            .iter()
            .flat_map(|r| &r.stmts)
            .filter_map(|s| match &s.kind {
                StmtKind::Phi(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn place_phi_inserts_at_the_join() {
        let mut prog = Program::new("p");
        let (pid, _a, _b, _c, d) = build_diamond(&mut prog);
        prog.init_statements(pid).unwrap();
        place_phi(&mut prog, pid).unwrap();

        let phis = phis_in(&prog, pid, d);
        assert!(phis.iter().any(|p| p.lhs == Exp::reg(0)));
        // One argument slot per in-edge.
        let phi = phis.iter().find(|p| p.lhs == Exp::reg(0)).unwrap();
        assert_eq!(phi.defs.len(), 2);
    }

    #[test]
    fn place_phi_is_idempotent() {
        let mut prog = Program::new("p");
        let (pid, _a, _b, _c, d) = build_diamond(&mut prog);
        prog.init_statements(pid).unwrap();
        place_phi(&mut prog, pid).unwrap();
        let before = phis_in(&prog, pid, d).len();
        place_phi(&mut prog, pid).unwrap();
        assert_eq!(phis_in(&prog, pid, d).len(), before);
    }

    #[test]
    fn rename_fills_phi_args_in_in_edge_order() {
        let mut prog = Program::new("p");
        let (pid, _a, b, c, d) = build_diamond(&mut prog);
        prog.init_statements(pid).unwrap();
        place_phi(&mut prog, pid).unwrap();
        rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc(pid).unwrap().as_user().unwrap();
        let def_in = |blk: BbId| {
            user.cfg.block(blk).unwrap().rtls[0]
                .stmts
                .iter()
                .find(|s| matches!(s.kind, StmtKind::Assign(_)))
                .unwrap()
                .id
        };
        let phis = phis_in(&prog, pid, d);
        let phi = phis.iter().find(|p| p.lhs == Exp::reg(0)).unwrap();
        assert_eq!(phi.defs[0].bb, b);
        assert_eq!(phi.defs[0].stmt, Some(def_in(b)));
        assert_eq!(phi.defs[1].bb, c);
        assert_eq!(phi.defs[1].stmt, Some(def_in(c)));
    }

    #[test]
    fn rename_subscripts_the_join_use_with_the_phi() {
        let mut prog = Program::new("p");
        let (pid, _a, _b, _c, d) = build_diamond(&mut prog);
        prog.init_statements(pid).unwrap();
        place_phi(&mut prog, pid).unwrap();
        rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc(pid).unwrap().as_user().unwrap();
        let bb = user.cfg.block(d).unwrap();
        let phi_id = bb.rtls[0]
            .stmts
            .iter()
            .find(|s| matches!(s.kind, StmtKind::Phi(_)))
            .unwrap()
            .id;
        let use_stmt = bb
            .rtls
            .iter()
            .flat_map(|r| &r.stmts)
            .find(|s| matches!(&s.kind, StmtKind::Assign(a) if a.lhs == Exp::reg(1)))
            .unwrap();
        match &use_stmt.kind {
            StmtKind::Assign(a) => {
                assert_eq!(a.rhs, Exp::subscript(Exp::reg(0), Some(phi_id)));
            }
            _ => unreachable!(),
        }
        // Every ref resolves to a live statement.
        prog.check_ref_integrity().unwrap();
    }

    #[test]
    fn rename_uses_none_for_live_on_entry() {
        let mut prog = Program::new("p");
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        {
            let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
            let mut r = Rtl::new(Addr(0));
            // Uses r5 before any definition.
            r.append(Statement::assign(Exp::reg(0), Exp::reg(5)));
            let a = user.cfg.add_bb(vec![r], BbType::Ret).unwrap();
            user.cfg.entry = Some(a);
        }
        prog.init_statements(pid).unwrap();
        rename_variables(&mut prog, pid).unwrap();
        let user = prog.proc(pid).unwrap().as_user().unwrap();
        let s = &user.cfg.block(BbId(0)).unwrap().rtls[0].stmts[0];
        match &s.kind {
            StmtKind::Assign(a) => assert_eq!(a.rhs, Exp::subscript(Exp::reg(5), None)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn defs_dominate_uses_after_rename() {
        let mut prog = Program::new("p");
        let (pid, ..) = build_diamond(&mut prog);
        prog.init_statements(pid).unwrap();
        place_phi(&mut prog, pid).unwrap();
        rename_variables(&mut prog, pid).unwrap();

        let user = prog.proc(pid).unwrap().as_user().unwrap();
        let dom = compute_dominators(&user.cfg).unwrap();

        // Map statement id -> block.
        let mut stmt_block: BTreeMap<StmtId, BbId> = BTreeMap::new();
        for (id, bb) in user.cfg.blocks() {
            for rtl in &bb.rtls {
                for s in &rtl.stmts {
                    stmt_block.insert(s.id, id);
                }
            }
        }
        // Every non-phi use's def must dominate the block of the use.
        for (id, bb) in user.cfg.blocks() {
            for rtl in &bb.rtls {
                for s in &rtl.stmts {
                    if matches!(s.kind, StmtKind::Phi(_)) {
                        continue;
                    }
                    let mut used = LocationSet::new();
                    s.used_locations(&mut used);
                    for u in used {
                        if let Exp::Ref {
                            def: Some(def), ..
                        } = u
                        {
                            let db = stmt_block[&def];
                            assert!(
                                dom.dominates(db, id),
                                "def block {} must dominate use block {}",
                                db,
                                id
                            );
                        }
                    }
                }
            }
        }
    }
}
