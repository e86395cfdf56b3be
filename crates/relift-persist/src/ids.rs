//! Identity across the serialization boundary.
//!
//! The writer mints a unique integer id for every entity in one numbering
//! pass so that cross-references (a `Ref`'s defining statement, a basic
//! block edge) can be written before or after their target. The reader
//! records `id -> handle` in phase 0 and resolves reference attributes in
//! phase 1; ids are unique within one save but deliberately not preserved
//! across saves.

use std::collections::HashMap;

use relift_core::{
    BbId, ClusterId, ProcId, Program, Statement, StmtId, StmtKind,
};

use crate::error::PersistError;

/// Writer-side id mint. `number_program` assigns ids to every entity that
/// can be the target of a reference attribute; everything else gets a
/// fresh id at write time.
#[derive(Debug, Default)]
pub struct IdMint {
    next: u32,
    clusters: HashMap<u32, u32>,
    procs: HashMap<u32, u32>,
    cfgs: HashMap<u32, u32>,
    bbs: HashMap<(u32, u32), u32>,
    stmts: HashMap<u32, u32>,
}

impl IdMint {
    pub fn number_program(prog: &Program) -> IdMint {
        let mut mint = IdMint {
            next: 1,
            ..IdMint::default()
        };
        for id in prog.cluster_ids() {
            let n = mint.fresh();
            mint.clusters.insert(id.0, n);
        }
        for (pid, proc) in prog.procs() {
            let n = mint.fresh();
            mint.procs.insert(pid.0, n);
            if let Some(user) = proc.as_user() {
                let n = mint.fresh();
                mint.cfgs.insert(pid.0, n);
                for (bbid, bb) in user.cfg.blocks() {
                    let n = mint.fresh();
                    mint.bbs.insert((pid.0, bbid.0), n);
                    for rtl in &bb.rtls {
                        for s in &rtl.stmts {
                            mint.number_stmt(s);
                        }
                    }
                }
            }
        }
        mint
    }

    fn number_stmt(&mut self, s: &Statement) {
        if s.id != StmtId::UNASSIGNED {
            let n = self.fresh();
            self.stmts.insert(s.id.0, n);
        }
        match &s.kind {
            StmtKind::Call(c) => {
                for n in c.arguments.iter().chain(&c.defines) {
                    self.number_stmt(n);
                }
            }
            StmtKind::Return(r) => {
                for n in r.modifieds.iter().chain(&r.returns) {
                    self.number_stmt(n);
                }
            }
            _ => {}
        }
    }

    /// A fresh id for an entity nothing references (expressions, types).
    pub fn fresh(&mut self) -> u32 {
        let n = self.next;
        self.next += 1;
        n
    }

    pub fn cluster(&self, id: ClusterId) -> u32 {
        self.clusters[&id.0]
    }

    pub fn proc(&self, id: ProcId) -> u32 {
        self.procs[&id.0]
    }

    pub fn cfg(&self, id: ProcId) -> u32 {
        self.cfgs[&id.0]
    }

    pub fn bb(&self, proc: ProcId, bb: BbId) -> u32 {
        self.bbs[&(proc.0, bb.0)]
    }

    /// Id of a statement; saving a program with a `Ref` to a statement
    /// that was never numbered is a dangling-reference error.
    pub fn stmt(&self, id: StmtId) -> Result<u32, PersistError> {
        self.stmts
            .get(&id.0)
            .copied()
            .ok_or(PersistError::DanglingStmtRef { stmt: id })
    }

    /// Id of this statement itself; statements that never got a runtime
    /// id are minted one on the spot (they cannot be referenced).
    pub fn stmt_or_fresh(&mut self, id: StmtId) -> u32 {
        if id == StmtId::UNASSIGNED {
            return self.fresh();
        }
        match self.stmts.get(&id.0) {
            Some(&n) => n,
            None => {
                let n = self.fresh();
                self.stmts.insert(id.0, n);
                n
            }
        }
    }
}

/// What an XML id resolved to during phase 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Prog,
    Cluster(ClusterId),
    Proc(ProcId),
    Cfg(ProcId),
    Bb(ProcId, BbId),
    Stmt(StmtId),
}

/// Reader-side id table.
#[derive(Debug, Default)]
pub struct IdTable {
    map: HashMap<u32, Handle>,
}

impl IdTable {
    pub fn new() -> IdTable {
        IdTable::default()
    }

    pub fn insert(&mut self, id: u32, handle: Handle) {
        self.map.insert(id, handle);
    }

    /// Phase-1 lookup; an unresolved id is a fatal parse error.
    pub fn resolve(&self, id: u32) -> Result<Handle, PersistError> {
        self.map.get(&id).copied().ok_or(PersistError::UnknownId(id))
    }

    pub fn resolve_proc(&self, id: u32) -> Result<ProcId, PersistError> {
        match self.resolve(id)? {
            Handle::Proc(p) => Ok(p),
            _ => Err(PersistError::WrongIdKind {
                id,
                expected: "procedure",
            }),
        }
    }

    pub fn resolve_cluster(&self, id: u32) -> Result<ClusterId, PersistError> {
        match self.resolve(id)? {
            Handle::Cluster(c) => Ok(c),
            _ => Err(PersistError::WrongIdKind {
                id,
                expected: "cluster",
            }),
        }
    }

    pub fn resolve_stmt(&self, id: u32) -> Result<StmtId, PersistError> {
        match self.resolve(id)? {
            Handle::Stmt(s) => Ok(s),
            _ => Err(PersistError::WrongIdKind {
                id,
                expected: "statement",
            }),
        }
    }

    pub fn resolve_bb(&self, id: u32) -> Result<(ProcId, BbId), PersistError> {
        match self.resolve(id)? {
            Handle::Bb(p, b) => Ok((p, b)),
            _ => Err(PersistError::WrongIdKind {
                id,
                expected: "basic block",
            }),
        }
    }
}
