//! The program: procedures, globals, and the cluster namespace.
//!
//! A [`Program`] owns everything: the procedure arena (insertion order is
//! iteration order), the globals, the cluster tree that shards persistence
//! across files, the statement/RTL id counters, and an opaque front-end
//! handle. Cross-references anywhere in the IR resolve against these
//! arenas.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::exp::Exp;
use crate::id::{Addr, ClusterId, ProcId, RtlId, StmtId};
use crate::proc::{Proc, UserProc};
use crate::rtl::Rtl;
use crate::stmt::{Statement, StmtKind};
use crate::ty::Type;

/// A global variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub uaddr: Addr,
    pub ty: Type,
}

/// A node in the hierarchical persistence namespace. Each cluster becomes
/// one XML file; children nest in a directory named for their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub parent: Option<ClusterId>,
    pub children: Vec<ClusterId>,
}

/// The front end that produced this program; the core only needs its
/// identity and entry point, the decoding machinery stays external.
pub trait FrontEnd: fmt::Debug {
    fn name(&self) -> &str;
    fn entry_point(&self) -> Option<Addr>;
}

/// A decompiled (or loading) program.
#[derive(Debug)]
pub struct Program {
    pub path: String,
    pub name: String,
    /// Counter backing `proc%d` names for unnamed procedures.
    pub numbered_proc: i32,
    procs: Vec<Proc>,
    pub proc_labels: BTreeMap<Addr, ProcId>,
    /// Globals, kept sorted by (address, name).
    globals: Vec<Global>,
    clusters: Vec<Cluster>,
    root_cluster: ClusterId,
    front_end: Option<Box<dyn FrontEnd>>,
    next_stmt_id: u32,
    next_rtl_id: u32,
    /// Flag-function semantics RTLs referenced by `Exp::FlagDef`.
    flag_rtls: IndexMap<RtlId, Rtl>,
}

impl Program {
    /// Creates a program for the binary at `path`. The program's name
    /// starts out as the path and can be changed with [`set_name`].
    ///
    /// [`set_name`]: Program::set_name
    pub fn new(path: &str) -> Program {
        Program {
            path: path.to_string(),
            name: path.to_string(),
            numbered_proc: 1,
            procs: Vec::new(),
            proc_labels: BTreeMap::new(),
            globals: Vec::new(),
            clusters: vec![Cluster {
                name: "prog".to_string(),
                parent: None,
                children: Vec::new(),
            }],
            root_cluster: ClusterId(0),
            front_end: None,
            next_stmt_id: 1,
            next_rtl_id: 1,
            flag_rtls: IndexMap::new(),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.clusters[self.root_cluster.0 as usize].name = name.to_string();
    }

    pub fn set_front_end(&mut self, fe: Box<dyn FrontEnd>) {
        self.front_end = Some(fe);
    }

    pub fn front_end(&self) -> Option<&dyn FrontEnd> {
        self.front_end.as_deref()
    }

    // -----------------------------------------------------------------
    // Clusters
    // -----------------------------------------------------------------

    pub fn root_cluster(&self) -> ClusterId {
        self.root_cluster
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0 as usize)
    }

    pub fn cluster_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(id.0 as usize)
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
        (0..self.clusters.len()).map(|i| ClusterId(i as u32))
    }

    /// Creates a cluster with no parent yet; the persistence reader
    /// attaches it once the enclosing element closes.
    pub fn new_orphan_cluster(&mut self, name: &str) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(Cluster {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Attaches an orphan cluster under `parent`.
    pub fn attach_cluster(&mut self, parent: ClusterId, child: ClusterId) -> Result<(), CoreError> {
        if self.cluster(parent).is_none() {
            return Err(CoreError::ClusterNotFound { id: parent });
        }
        let c = self
            .clusters
            .get_mut(child.0 as usize)
            .ok_or(CoreError::ClusterNotFound { id: child })?;
        c.parent = Some(parent);
        self.clusters[parent.0 as usize].children.push(child);
        Ok(())
    }

    /// Adds a child cluster under `parent`.
    pub fn new_cluster(&mut self, name: &str, parent: ClusterId) -> Result<ClusterId, CoreError> {
        if self.cluster(parent).is_none() {
            return Err(CoreError::ClusterNotFound { id: parent });
        }
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(Cluster {
            name: name.to_string(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.clusters[parent.0 as usize].children.push(id);
        Ok(id)
    }

    /// Cluster names from the root down to `id`, inclusive.
    pub fn cluster_path(&self, id: ClusterId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let cluster = &self.clusters[c.0 as usize];
            names.push(cluster.name.clone());
            cur = cluster.parent;
        }
        names.reverse();
        names
    }

    // -----------------------------------------------------------------
    // Procedures
    // -----------------------------------------------------------------

    /// Inserts a procedure; iteration follows insertion order.
    pub fn add_proc(&mut self, proc: Proc) -> ProcId {
        let id = ProcId(self.procs.len() as u32);
        let addr = proc.common().address;
        if addr.is_valid() {
            self.proc_labels.insert(addr, id);
        }
        self.procs.push(proc);
        id
    }

    pub fn proc(&self, id: ProcId) -> Option<&Proc> {
        self.procs.get(id.0 as usize)
    }

    pub fn proc_mut(&mut self, id: ProcId) -> Option<&mut Proc> {
        self.procs.get_mut(id.0 as usize)
    }

    pub fn num_procs(&self) -> usize {
        self.procs.len()
    }

    pub fn procs(&self) -> impl Iterator<Item = (ProcId, &Proc)> {
        self.procs
            .iter()
            .enumerate()
            .map(|(i, p)| (ProcId(i as u32), p))
    }

    pub fn find_proc_by_addr(&self, addr: Addr) -> Option<ProcId> {
        self.proc_labels.get(&addr).copied()
    }

    pub fn find_proc_by_name(&self, name: &str) -> Option<ProcId> {
        self.procs
            .iter()
            .position(|p| p.name() == name)
            .map(|i| ProcId(i as u32))
    }

    /// A fresh `proc%d` name for a procedure with no symbol.
    pub fn next_numbered_name(&mut self) -> String {
        let n = self.numbered_proc;
        self.numbered_proc += 1;
        format!("proc{}", n)
    }

    // -----------------------------------------------------------------
    // Globals
    // -----------------------------------------------------------------

    pub fn add_global(&mut self, g: Global) {
        let pos = self
            .globals
            .partition_point(|x| (x.uaddr, &x.name) < (g.uaddr, &g.name));
        self.globals.insert(pos, g);
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    // -----------------------------------------------------------------
    // Statement and RTL identity
    // -----------------------------------------------------------------

    pub fn alloc_stmt_id(&mut self) -> StmtId {
        let id = StmtId(self.next_stmt_id);
        self.next_stmt_id += 1;
        id
    }

    /// Registers a flag-function RTL and returns its id for
    /// `Exp::FlagDef` back-links.
    pub fn register_flag_rtl(&mut self, rtl: Rtl) -> RtlId {
        let id = RtlId(self.next_rtl_id);
        self.next_rtl_id += 1;
        self.flag_rtls.insert(id, rtl);
        id
    }

    pub fn flag_rtl(&self, id: RtlId) -> Option<&Rtl> {
        self.flag_rtls.get(&id)
    }

    /// Assigns ids, sequence numbers, owner, and parent links to every
    /// statement of the procedure, in block/RTL order. Idempotent for
    /// statements that already carry an id.
    pub fn init_statements(&mut self, pid: ProcId) -> Result<(), CoreError> {
        let next_stmt_id = &mut self.next_stmt_id;
        let proc = self
            .procs
            .get_mut(pid.0 as usize)
            .ok_or(CoreError::ProcNotFound { id: pid })?;
        let Some(user) = proc.as_user_mut() else {
            return Ok(());
        };
        let mut number = 0u32;
        let ids: Vec<crate::id::BbId> = user.cfg.block_ids().collect();
        for bb in ids {
            let bb = user.cfg.block_mut(bb).expect("block id from iterator");
            for rtl in &mut bb.rtls {
                for s in &mut rtl.stmts {
                    init_stmt(s, None, pid, &mut number, next_stmt_id);
                }
            }
        }
        Ok(())
    }

    /// Finds a statement of `pid` by id.
    pub fn find_statement(&self, pid: ProcId, id: StmtId) -> Option<&Statement> {
        self.proc(pid)?.as_user()?.find_statement(id)
    }

    // -----------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------

    /// Checks that every `Ref` definition in every user procedure names a
    /// statement still present in that procedure's body.
    pub fn check_ref_integrity(&self) -> Result<(), CoreError> {
        for (_, proc) in self.procs() {
            let Some(user) = proc.as_user() else { continue };
            let mut defs: Vec<StmtId> = Vec::new();
            for (_, bb) in user.cfg.blocks() {
                for rtl in &bb.rtls {
                    for s in &rtl.stmts {
                        collect_ref_defs(s, &mut defs);
                    }
                }
            }
            for def in defs {
                if user.find_statement(def).is_none() {
                    return Err(CoreError::StmtNotFound { id: def });
                }
            }
        }
        Ok(())
    }
}

fn init_stmt(
    s: &mut Statement,
    parent: Option<StmtId>,
    pid: ProcId,
    number: &mut u32,
    next_stmt_id: &mut u32,
) {
    if s.id == StmtId::UNASSIGNED {
        s.id = StmtId(*next_stmt_id);
        *next_stmt_id += 1;
    }
    s.number = *number;
    *number += 1;
    s.parent = parent;
    s.proc = Some(pid);
    let own = s.id;
    match &mut s.kind {
        StmtKind::Call(c) => {
            for n in c.arguments.iter_mut().chain(&mut c.defines) {
                init_stmt(n, Some(own), pid, number, next_stmt_id);
            }
        }
        StmtKind::Return(r) => {
            for n in r.modifieds.iter_mut().chain(&mut r.returns) {
                init_stmt(n, Some(own), pid, number, next_stmt_id);
            }
        }
        _ => {}
    }
}

fn collect_ref_defs(s: &Statement, out: &mut Vec<StmtId>) {
    fn walk(e: &Exp, out: &mut Vec<StmtId>) {
        if let Exp::Ref {
            def: Some(def), ..
        } = e
        {
            out.push(*def);
        }
        for c in e.children() {
            walk(c, out);
        }
    }
    match &s.kind {
        StmtKind::Assign(a) => {
            walk(&a.lhs, out);
            walk(&a.rhs, out);
            if let Some(g) = &a.guard {
                walk(g, out);
            }
        }
        StmtKind::Phi(p) => {
            walk(&p.lhs, out);
            for d in &p.defs {
                walk(&d.exp, out);
            }
        }
        StmtKind::Bool(b) => {
            walk(&b.lhs, out);
            walk(&b.cond, out);
        }
        StmtKind::Call(c) => {
            walk(&c.dest, out);
            for n in c.arguments.iter().chain(&c.defines) {
                collect_ref_defs(n, out);
            }
        }
        StmtKind::Goto(g) => walk(&g.dest, out),
        StmtKind::Branch(b) => {
            walk(&b.dest, out);
            if let Some(c) = &b.cond {
                walk(c, out);
            }
        }
        StmtKind::Case(c) => walk(&c.dest, out),
        StmtKind::Return(r) => {
            for n in r.modifieds.iter().chain(&r.returns) {
                collect_ref_defs(n, out);
            }
        }
    }
}

/// Convenience: a mutable view of one user procedure plus the program's
/// id allocator, for passes that insert statements.
pub struct UserProcCtx<'a> {
    pub pid: ProcId,
    pub user: &'a mut UserProc,
    next_stmt_id: &'a mut u32,
}

impl<'a> UserProcCtx<'a> {
    pub fn alloc_stmt_id(&mut self) -> StmtId {
        let id = StmtId(*self.next_stmt_id);
        *self.next_stmt_id += 1;
        id
    }
}

impl Program {
    /// Borrows one user procedure together with the statement id
    /// allocator.
    pub fn user_ctx(&mut self, pid: ProcId) -> Result<UserProcCtx<'_>, CoreError> {
        let next_stmt_id = &mut self.next_stmt_id;
        let proc = self
            .procs
            .get_mut(pid.0 as usize)
            .ok_or(CoreError::ProcNotFound { id: pid })?;
        let user = proc
            .as_user_mut()
            .ok_or(CoreError::ProcNotFound { id: pid })?;
        Ok(UserProcCtx {
            pid,
            user,
            next_stmt_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::BbType;
    use crate::operator::Operator;
    use crate::ty::Signedness;

    #[test]
    fn program_name_defaults_to_path() {
        let mut prog = Program::new("test/pentium/hello");
        assert_eq!(prog.name, "test/pentium/hello");
        prog.set_name("Happy prog");
        assert_eq!(prog.name, "Happy prog");
    }

    #[test]
    fn procs_iterate_in_insertion_order() {
        let mut prog = Program::new("p");
        let a = prog.add_proc(Proc::user("main", Addr(0x100)));
        let b = prog.add_proc(Proc::lib("printf", Addr(0x200)));
        let names: Vec<&str> = prog.procs().map(|(_, p)| p.name()).collect();
        assert_eq!(names, vec!["main", "printf"]);
        assert_eq!(prog.find_proc_by_addr(Addr(0x100)), Some(a));
        assert_eq!(prog.find_proc_by_name("printf"), Some(b));
    }

    #[test]
    fn globals_sort_by_address() {
        let mut prog = Program::new("p");
        prog.add_global(Global {
            name: "b".into(),
            uaddr: Addr(0x2000),
            ty: Type::int(32, Signedness::Signed),
        });
        prog.add_global(Global {
            name: "a".into(),
            uaddr: Addr(0x1000),
            ty: Type::Char,
        });
        let addrs: Vec<u32> = prog.globals().iter().map(|g| g.uaddr.0).collect();
        assert_eq!(addrs, vec![0x1000, 0x2000]);
    }

    #[test]
    fn cluster_tree_paths() {
        let mut prog = Program::new("p");
        prog.set_name("hello");
        let root = prog.root_cluster();
        let sub = prog.new_cluster("libc", root).unwrap();
        let subsub = prog.new_cluster("stdio", sub).unwrap();
        assert_eq!(prog.cluster_path(subsub), vec!["hello", "libc", "stdio"]);
        assert_eq!(prog.cluster(root).unwrap().children, vec![sub]);
    }

    #[test]
    fn init_statements_numbers_and_owns() {
        let mut prog = Program::new("p");
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        {
            let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
            let mut rtl = Rtl::new(Addr(0));
            rtl.append(Statement::assign(Exp::reg(0), Exp::int(1)));
            rtl.append(Statement::assign(
                Exp::reg(1),
                Exp::binary(Operator::Plus, Exp::reg(0), Exp::int(2)),
            ));
            user.cfg.add_bb(vec![rtl], BbType::Fall).unwrap();
        }
        prog.init_statements(pid).unwrap();

        let user = prog.proc(pid).unwrap().as_user().unwrap();
        let bb = user.cfg.block(crate::id::BbId(0)).unwrap();
        let stmts = &bb.rtls[0].stmts;
        assert_eq!(stmts[0].number, 0);
        assert_eq!(stmts[1].number, 1);
        assert_ne!(stmts[0].id, StmtId::UNASSIGNED);
        assert_ne!(stmts[0].id, stmts[1].id);
        assert_eq!(stmts[0].proc, Some(pid));
        assert_eq!(stmts[1].proc, Some(pid));
    }

    #[test]
    fn ref_integrity_detects_dangling_defs() {
        let mut prog = Program::new("p");
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        {
            let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
            let mut rtl = Rtl::new(Addr(0));
            rtl.append(Statement::assign(
                Exp::reg(1),
                Exp::subscript(Exp::reg(0), Some(StmtId(999))),
            ));
            user.cfg.add_bb(vec![rtl], BbType::Fall).unwrap();
        }
        assert!(prog.check_ref_integrity().is_err());
    }

    #[test]
    fn ref_integrity_accepts_resolvable_defs() {
        let mut prog = Program::new("p");
        let pid = prog.add_proc(Proc::user("f", Addr(0)));
        {
            let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
            let mut rtl = Rtl::new(Addr(0));
            rtl.append(Statement::assign(Exp::reg(0), Exp::int(5)));
            rtl.append(Statement::assign(Exp::reg(1), Exp::reg(0)));
            user.cfg.add_bb(vec![rtl], BbType::Fall).unwrap();
        }
        prog.init_statements(pid).unwrap();
        // Rebind the use to the real definition.
        let def_id = {
            let user = prog.proc(pid).unwrap().as_user().unwrap();
            user.cfg.block(crate::id::BbId(0)).unwrap().rtls[0].stmts[0].id
        };
        {
            let user = prog.proc_mut(pid).unwrap().as_user_mut().unwrap();
            let bb = user.cfg.block_mut(crate::id::BbId(0)).unwrap();
            bb.rtls[0].stmts[1].subscript_var(&Exp::reg(0), Some(def_id));
        }
        prog.check_ref_integrity().unwrap();
    }
}
