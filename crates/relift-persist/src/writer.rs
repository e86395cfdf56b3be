//! The XML writer.
//!
//! A save fans out across one stream per cluster: the root cluster's file
//! carries the `<prog>` element, the globals, the cluster tree, and the
//! root cluster's procedures; every other cluster's file carries its own
//! procedures inside a `<procs>` container. [`StreamSet`] opens the whole
//! set up front and guarantees the files are closed on every exit path.
//!
//! Elements are emitted attributes-first, children in a fixed order, so a
//! reloaded program re-persists byte-identically modulo id renumbering.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use relift_core::{
    BasicBlock, BbId, Cfg, ClusterId, ConstKind, Exp, Global, Proc, ProcId, Program, Rtl,
    Signature, Statement, StmtKind, Type,
};

use crate::error::PersistError;
use crate::ids::IdMint;
use crate::util::escape_xml;

/// One output stream per cluster, opened together and closed together.
pub struct StreamSet {
    writers: Vec<Option<BufWriter<File>>>,
    root: ClusterId,
    closed: bool,
}

impl StreamSet {
    /// Opens every cluster's file, creating directories as needed. The
    /// root file is `<out_dir>/<name>.xml`; a child of cluster `c` lives
    /// in `c`'s directory, named after the child.
    pub fn open(prog: &Program, out_dir: &Path) -> Result<StreamSet, PersistError> {
        let root = prog.root_cluster();
        let mut writers: Vec<Option<BufWriter<File>>> = Vec::new();
        for _ in prog.cluster_ids() {
            writers.push(None);
        }
        create_dir_all(out_dir)?;
        for id in prog.cluster_ids() {
            let path = Self::file_path(prog, id, out_dir);
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            let mut w = BufWriter::new(File::create(&path)?);
            if id != root {
                writeln!(w, "<procs>")?;
            }
            writers[id.0 as usize] = Some(w);
        }
        Ok(StreamSet {
            writers,
            root,
            closed: false,
        })
    }

    /// Where a cluster's file lives under `out_dir`.
    pub fn file_path(prog: &Program, id: ClusterId, out_dir: &Path) -> PathBuf {
        let components = prog.cluster_path(id);
        let mut path = out_dir.to_path_buf();
        for c in &components[..components.len() - 1] {
            path.push(c);
        }
        path.push(format!("{}.xml", components.last().expect("non-empty path")));
        path
    }

    pub fn stream_mut(&mut self, id: ClusterId) -> &mut BufWriter<File> {
        self.writers[id.0 as usize]
            .as_mut()
            .expect("stream opened for every cluster")
    }

    /// Writes the container close tags and flushes everything.
    pub fn close(&mut self) -> Result<(), PersistError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for (i, w) in self.writers.iter_mut().enumerate() {
            if let Some(w) = w {
                if ClusterId(i as u32) != self.root {
                    writeln!(w, "</procs>")?;
                }
                w.flush()?;
            }
        }
        Ok(())
    }
}

impl Drop for StreamSet {
    fn drop(&mut self) {
        // Close on every exit path; errors here have nowhere to go.
        let _ = self.close();
    }
}

/// Serializes `prog` under `out_dir`, one file per cluster.
pub fn save(prog: &Program, out_dir: &Path) -> Result<(), PersistError> {
    let mut mint = IdMint::number_program(prog);
    let mut streams = StreamSet::open(prog, out_dir)?;

    {
        let out = streams.stream_mut(prog.root_cluster());
        writeln!(
            out,
            "<prog path=\"{}\" name=\"{}\" iNumberedProc=\"{}\">",
            escape_xml(&prog.path),
            escape_xml(&prog.name),
            prog.numbered_proc
        )?;
    }
    for g in prog.globals() {
        let out = streams.stream_mut(prog.root_cluster());
        write_global(out, &mut mint, g)?;
    }
    {
        let out = streams.stream_mut(prog.root_cluster());
        write_cluster(out, &mut mint, prog, prog.root_cluster())?;
    }
    for (pid, proc) in prog.procs() {
        let cluster = proc.common().cluster.unwrap_or(prog.root_cluster());
        let out = streams.stream_mut(cluster);
        write_proc(out, &mut mint, prog, pid, proc)?;
    }
    {
        let out = streams.stream_mut(prog.root_cluster());
        writeln!(out, "</prog>")?;
    }
    streams.close()
}

fn write_global(
    out: &mut dyn Write,
    mint: &mut IdMint,
    g: &Global,
) -> Result<(), PersistError> {
    writeln!(
        out,
        "<global name=\"{}\" uaddr=\"{}\">",
        escape_xml(&g.name),
        g.uaddr.0
    )?;
    writeln!(out, "<type>")?;
    write_type(out, mint, &g.ty)?;
    writeln!(out, "</type>")?;
    writeln!(out, "</global>")?;
    Ok(())
}

fn write_cluster(
    out: &mut dyn Write,
    mint: &mut IdMint,
    prog: &Program,
    id: ClusterId,
) -> Result<(), PersistError> {
    let cluster = prog.cluster(id).expect("cluster id from iterator");
    writeln!(
        out,
        "<cluster id=\"{}\" name=\"{}\">",
        mint.cluster(id),
        escape_xml(&cluster.name)
    )?;
    for &child in &cluster.children {
        write_cluster(out, mint, prog, child)?;
    }
    writeln!(out, "</cluster>")?;
    Ok(())
}

fn write_proc(
    out: &mut dyn Write,
    mint: &mut IdMint,
    prog: &Program,
    pid: ProcId,
    proc: &Proc,
) -> Result<(), PersistError> {
    let common = proc.common();
    match proc {
        Proc::Lib(_) => {
            write!(
                out,
                "<libproc id=\"{}\" address=\"{}\" firstCallerAddress=\"{}\"",
                mint.proc(pid),
                common.address.0,
                common.first_caller_addr.0
            )?;
            if let Some(fc) = common.first_caller {
                write!(out, " firstCaller=\"{}\"", mint.proc(fc))?;
            }
            if let Some(c) = common.cluster {
                write!(out, " cluster=\"{}\"", mint.cluster(c))?;
            }
            writeln!(out, ">")?;
            write_signature(out, mint, &common.signature)?;
            write_proc_links(out, mint, proc)?;
            writeln!(out, "</libproc>")?;
        }
        Proc::User(user) => {
            write!(
                out,
                "<userproc id=\"{}\" address=\"{}\" status=\"{}\" firstCallerAddress=\"{}\"",
                mint.proc(pid),
                common.address.0,
                user.status.to_int(),
                common.first_caller_addr.0
            )?;
            if let Some(fc) = common.first_caller {
                write!(out, " firstCaller=\"{}\"", mint.proc(fc))?;
            }
            if let Some(c) = common.cluster {
                write!(out, " cluster=\"{}\"", mint.cluster(c))?;
            }
            if let Some(r) = user.return_stmt {
                write!(out, " retstmt=\"{}\"", mint.stmt(r)?)?;
            }
            writeln!(out, ">")?;

            write_signature(out, mint, &common.signature)?;
            write_proc_links(out, mint, proc)?;

            for (name, ty) in &user.locals {
                writeln!(out, "<local name=\"{}\">", escape_xml(name))?;
                writeln!(out, "<type>")?;
                write_type(out, mint, ty)?;
                writeln!(out, "</type>")?;
                writeln!(out, "</local>")?;
            }
            for (from, tos) in &user.symbol_map {
                for to in tos {
                    writeln!(out, "<symbol>")?;
                    writeln!(out, "<exp>")?;
                    write_exp(out, mint, from)?;
                    writeln!(out, "</exp>")?;
                    writeln!(out, "<secondexp>")?;
                    write_exp(out, mint, to)?;
                    writeln!(out, "</secondexp>")?;
                    writeln!(out, "</symbol>")?;
                }
            }
            for &callee in &user.callees {
                writeln!(out, "<callee proc=\"{}\"/>", mint.proc(callee))?;
            }
            write_cfg(out, mint, pid, &user.cfg)?;
            writeln!(out, "</userproc>")?;
        }
    }
    Ok(())
}

/// Caller links and proven facts, common to both procedure kinds.
fn write_proc_links(
    out: &mut dyn Write,
    mint: &mut IdMint,
    proc: &Proc,
) -> Result<(), PersistError> {
    let common = proc.common();
    for &caller in &common.callers {
        writeln!(out, "<caller call=\"{}\"/>", mint.stmt(caller)?)?;
    }
    for (lhs, rhs) in &common.proven_true {
        writeln!(out, "<proven_true>")?;
        write_exp(out, mint, lhs)?;
        write_exp(out, mint, rhs)?;
        writeln!(out, "</proven_true>")?;
    }
    Ok(())
}

fn write_signature(
    out: &mut dyn Write,
    mint: &mut IdMint,
    sig: &Signature,
) -> Result<(), PersistError> {
    write!(
        out,
        "<signature id=\"{}\" name=\"{}\" ellipsis=\"{}\" preferedName=\"{}\"",
        mint.fresh(),
        escape_xml(&sig.name),
        sig.ellipsis as i32,
        escape_xml(&sig.preferred_name)
    )?;
    if sig.platform != relift_core::Platform::Generic {
        write!(out, " platform=\"{}\"", sig.platform.name())?;
    }
    if sig.convention != relift_core::Convention::None {
        write!(out, " convention=\"{}\"", sig.convention.name())?;
    }
    writeln!(out, ">")?;
    for p in &sig.params {
        writeln!(
            out,
            "<param id=\"{}\" name=\"{}\">",
            mint.fresh(),
            escape_xml(&p.name)
        )?;
        writeln!(out, "<type>")?;
        write_type(out, mint, &p.ty)?;
        writeln!(out, "</type>")?;
        writeln!(out, "<exp>")?;
        write_exp(out, mint, &p.exp)?;
        writeln!(out, "</exp>")?;
        writeln!(out, "</param>")?;
    }
    for r in &sig.returns {
        writeln!(out, "<return>")?;
        writeln!(out, "<type>")?;
        write_type(out, mint, &r.ty)?;
        writeln!(out, "</type>")?;
        writeln!(out, "<exp>")?;
        write_exp(out, mint, &r.exp)?;
        writeln!(out, "</exp>")?;
        writeln!(out, "</return>")?;
    }
    if let Some(rt) = &sig.rettype {
        writeln!(out, "<rettype>")?;
        write_type(out, mint, rt)?;
        writeln!(out, "</rettype>")?;
    }
    if let Some(pr) = &sig.preferred_return {
        writeln!(out, "<prefreturn>")?;
        write_type(out, mint, pr)?;
        writeln!(out, "</prefreturn>")?;
    }
    for &i in &sig.preferred_params {
        writeln!(out, "<prefparam index=\"{}\"/>", i)?;
    }
    writeln!(out, "</signature>")?;
    Ok(())
}

fn write_cfg(
    out: &mut dyn Write,
    mint: &mut IdMint,
    pid: ProcId,
    cfg: &Cfg,
) -> Result<(), PersistError> {
    write!(
        out,
        "<cfg id=\"{}\" wellformed=\"{}\" lastLabel=\"{}\"",
        mint.cfg(pid),
        cfg.well_formed as i32,
        cfg.last_label
    )?;
    if let Some(e) = cfg.entry {
        write!(out, " entryBB=\"{}\"", mint.bb(pid, e))?;
    }
    if let Some(e) = cfg.exit {
        write!(out, " exitBB=\"{}\"", mint.bb(pid, e))?;
    }
    writeln!(out, ">")?;
    for (bbid, bb) in cfg.blocks() {
        write_bb(out, mint, pid, bbid, bb)?;
    }
    for &b in &cfg.ordering {
        writeln!(out, "<order bb=\"{}\"/>", mint.bb(pid, b))?;
    }
    for &b in &cfg.rev_ordering {
        writeln!(out, "<revorder bb=\"{}\"/>", mint.bb(pid, b))?;
    }
    writeln!(out, "</cfg>")?;
    Ok(())
}

fn opt_bb_attr(
    out: &mut dyn Write,
    mint: &IdMint,
    pid: ProcId,
    name: &str,
    bb: Option<BbId>,
) -> Result<(), PersistError> {
    if let Some(b) = bb {
        write!(out, " {}=\"{}\"", name, mint.bb(pid, b))?;
    }
    Ok(())
}

fn write_bb(
    out: &mut dyn Write,
    mint: &mut IdMint,
    pid: ProcId,
    bbid: BbId,
    bb: &BasicBlock,
) -> Result<(), PersistError> {
    write!(
        out,
        "<bb id=\"{}\" nodeType=\"{}\" labelNum=\"{}\" labelneeded=\"{}\" incomplete=\"{}\" \
         jumpreqd=\"{}\" DFTfirst=\"{}\" DFTlast=\"{}\" DFTrevfirst=\"{}\" DFTrevlast=\"{}\" \
         structType=\"{}\" loopCondType=\"{}\"",
        mint.bb(pid, bbid),
        bb.node_type.to_int(),
        bb.label_num,
        bb.label_needed as i32,
        bb.incomplete as i32,
        bb.jump_required as i32,
        bb.dft_first,
        bb.dft_last,
        bb.dft_rev_first,
        bb.dft_rev_last,
        bb.sbb.struct_type.to_int(),
        bb.sbb.loop_cond_type.to_int()
    )?;
    opt_bb_attr(out, mint, pid, "m_loopHead", bb.sbb.loop_head)?;
    opt_bb_attr(out, mint, pid, "m_caseHead", bb.sbb.case_head)?;
    opt_bb_attr(out, mint, pid, "m_condFollow", bb.sbb.cond_follow)?;
    opt_bb_attr(out, mint, pid, "m_loopFollow", bb.sbb.loop_follow)?;
    opt_bb_attr(out, mint, pid, "m_latchNode", bb.sbb.latch_node)?;
    write!(
        out,
        " ord=\"{}\" revOrd=\"{}\" inEdgesVisited=\"{}\" numForwardInEdges=\"{}\" \
         loopStamp1=\"{}\" loopStamp2=\"{}\" revLoopStamp1=\"{}\" revLoopStamp2=\"{}\" \
         traversed=\"{}\" hllLabel=\"{}\"",
        bb.ord,
        bb.rev_ord,
        bb.in_edges_visited,
        bb.num_forward_in_edges,
        bb.loop_stamps[0],
        bb.loop_stamps[1],
        bb.rev_loop_stamps[0],
        bb.rev_loop_stamps[1],
        bb.traversed.to_int(),
        bb.hll_label as i32
    )?;
    if let Some(s) = &bb.label_str {
        write!(out, " labelStr=\"{}\"", escape_xml(s))?;
    }
    write!(out, " indentLevel=\"{}\"", bb.indent_level)?;
    opt_bb_attr(out, mint, pid, "immPDom", bb.hll.imm_pdom)?;
    opt_bb_attr(out, mint, pid, "loopHead", bb.hll.loop_head)?;
    opt_bb_attr(out, mint, pid, "caseHead", bb.hll.case_head)?;
    opt_bb_attr(out, mint, pid, "condFollow", bb.hll.cond_follow)?;
    opt_bb_attr(out, mint, pid, "loopFollow", bb.hll.loop_follow)?;
    opt_bb_attr(out, mint, pid, "latchNode", bb.hll.latch_node)?;
    writeln!(
        out,
        " sType=\"{}\" usType=\"{}\" lType=\"{}\" cType=\"{}\">",
        bb.hll.s_type.to_int(),
        bb.hll.us_type.to_int(),
        bb.hll.l_type.to_int(),
        bb.hll.c_type.to_int()
    )?;

    for &e in &bb.in_edges {
        writeln!(out, "<inedge bb=\"{}\"/>", mint.bb(pid, e))?;
    }
    for &e in &bb.out_edges {
        writeln!(out, "<outedge bb=\"{}\"/>", mint.bb(pid, e))?;
    }
    for l in &bb.live_in {
        writeln!(out, "<livein>")?;
        write_exp(out, mint, l)?;
        writeln!(out, "</livein>")?;
    }
    for rtl in &bb.rtls {
        write_rtl(out, mint, pid, rtl)?;
    }
    writeln!(out, "</bb>")?;
    Ok(())
}

fn write_rtl(
    out: &mut dyn Write,
    mint: &mut IdMint,
    pid: ProcId,
    rtl: &Rtl,
) -> Result<(), PersistError> {
    writeln!(out, "<rtl id=\"{}\" addr=\"{}\">", mint.fresh(), rtl.addr.0)?;
    for s in &rtl.stmts {
        writeln!(out, "<stmt>")?;
        write_stmt(out, mint, pid, s)?;
        writeln!(out, "</stmt>")?;
    }
    writeln!(out, "</rtl>")?;
    Ok(())
}

/// The id/number/parent/proc attribute prefix shared by every statement
/// kind.
fn stmt_header(
    out: &mut dyn Write,
    mint: &mut IdMint,
    pid: ProcId,
    s: &Statement,
) -> Result<(), PersistError> {
    write!(
        out,
        " id=\"{}\" number=\"{}\"",
        mint.stmt_or_fresh(s.id),
        s.number
    )?;
    if let Some(p) = s.parent {
        write!(out, " parent=\"{}\"", mint.stmt(p)?)?;
    }
    if s.proc.is_some() {
        write!(out, " proc=\"{}\"", mint.proc(pid))?;
    }
    Ok(())
}

fn write_stmt(
    out: &mut dyn Write,
    mint: &mut IdMint,
    pid: ProcId,
    s: &Statement,
) -> Result<(), PersistError> {
    match &s.kind {
        StmtKind::Assign(a) => {
            write!(out, "<assign")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(out, ">")?;
            writeln!(out, "<lhs>")?;
            write_exp(out, mint, &a.lhs)?;
            writeln!(out, "</lhs>")?;
            writeln!(out, "<rhs>")?;
            write_exp(out, mint, &a.rhs)?;
            writeln!(out, "</rhs>")?;
            if let Some(ty) = &a.ty {
                writeln!(out, "<type>")?;
                write_type(out, mint, ty)?;
                writeln!(out, "</type>")?;
            }
            if let Some(g) = &a.guard {
                writeln!(out, "<guard>")?;
                write_exp(out, mint, g)?;
                writeln!(out, "</guard>")?;
            }
            writeln!(out, "</assign>")?;
        }
        StmtKind::Phi(p) => {
            write!(out, "<phiassign")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(out, ">")?;
            writeln!(out, "<lhs>")?;
            write_exp(out, mint, &p.lhs)?;
            writeln!(out, "</lhs>")?;
            for d in &p.defs {
                write!(out, "<def bb=\"{}\"", mint.bb(pid, d.bb))?;
                if let Some(ds) = d.stmt {
                    write!(out, " stmt=\"{}\"", mint.stmt(ds)?)?;
                }
                writeln!(out, ">")?;
                writeln!(out, "<exp>")?;
                write_exp(out, mint, &d.exp)?;
                writeln!(out, "</exp>")?;
                writeln!(out, "</def>")?;
            }
            writeln!(out, "</phiassign>")?;
        }
        StmtKind::Bool(b) => {
            write!(out, "<boolasgn")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(
                out,
                " jtcond=\"{}\" float=\"{}\" size=\"{}\">",
                b.jt.to_int(),
                b.is_float as i32,
                b.size
            )?;
            writeln!(out, "<lhs>")?;
            write_exp(out, mint, &b.lhs)?;
            writeln!(out, "</lhs>")?;
            writeln!(out, "<cond>")?;
            write_exp(out, mint, &b.cond)?;
            writeln!(out, "</cond>")?;
            writeln!(out, "</boolasgn>")?;
        }
        StmtKind::Call(c) => {
            write!(out, "<callstmt")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(
                out,
                " computed=\"{}\" returnAfterCall=\"{}\">",
                c.is_computed as i32,
                c.return_after_call as i32
            )?;
            write!(out, "<dest")?;
            if let Some(dp) = c.dest_proc {
                write!(out, " proc=\"{}\"", mint.proc(dp))?;
            }
            writeln!(out, ">")?;
            write_exp(out, mint, &c.dest)?;
            writeln!(out, "</dest>")?;
            for a in &c.arguments {
                writeln!(out, "<argument>")?;
                write_stmt(out, mint, pid, a)?;
                writeln!(out, "</argument>")?;
            }
            for d in &c.defines {
                writeln!(out, "<defines>")?;
                write_stmt(out, mint, pid, d)?;
                writeln!(out, "</defines>")?;
            }
            writeln!(out, "</callstmt>")?;
        }
        StmtKind::Goto(g) => {
            write!(out, "<gotostmt")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(out, " computed=\"{}\">", g.is_computed as i32)?;
            writeln!(out, "<dest>")?;
            write_exp(out, mint, &g.dest)?;
            writeln!(out, "</dest>")?;
            writeln!(out, "</gotostmt>")?;
        }
        StmtKind::Branch(b) => {
            write!(out, "<branchstmt")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(
                out,
                " computed=\"{}\" jtcond=\"{}\" float=\"{}\">",
                b.is_computed as i32,
                b.jt.to_int(),
                b.is_float as i32
            )?;
            writeln!(out, "<dest>")?;
            write_exp(out, mint, &b.dest)?;
            writeln!(out, "</dest>")?;
            if let Some(c) = &b.cond {
                writeln!(out, "<cond>")?;
                write_exp(out, mint, c)?;
                writeln!(out, "</cond>")?;
            }
            writeln!(out, "</branchstmt>")?;
        }
        StmtKind::Case(c) => {
            write!(out, "<casestmt")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(out, " computed=\"{}\">", c.is_computed as i32)?;
            writeln!(out, "<dest>")?;
            write_exp(out, mint, &c.dest)?;
            writeln!(out, "</dest>")?;
            // switch_info is runtime-only.
            writeln!(out, "</casestmt>")?;
        }
        StmtKind::Return(r) => {
            write!(out, "<returnstmt")?;
            stmt_header(out, mint, pid, s)?;
            writeln!(out, " retAddr=\"{}\">", r.ret_addr.0)?;
            for m in &r.modifieds {
                writeln!(out, "<modifieds>")?;
                write_stmt(out, mint, pid, m)?;
                writeln!(out, "</modifieds>")?;
            }
            for ret in &r.returns {
                writeln!(out, "<returns>")?;
                write_stmt(out, mint, pid, ret)?;
                writeln!(out, "</returns>")?;
            }
            writeln!(out, "</returnstmt>")?;
        }
    }
    Ok(())
}

fn write_type(out: &mut dyn Write, mint: &mut IdMint, ty: &Type) -> Result<(), PersistError> {
    match ty {
        Type::Void => writeln!(out, "<voidtype id=\"{}\"/>", mint.fresh())?,
        Type::Char => writeln!(out, "<chartype id=\"{}\"/>", mint.fresh())?,
        Type::Boolean => writeln!(out, "<booleantype id=\"{}\"/>", mint.fresh())?,
        Type::Integer { size, signedness } => writeln!(
            out,
            "<integertype id=\"{}\" size=\"{}\" signedness=\"{}\"/>",
            mint.fresh(),
            size,
            signedness.to_int()
        )?,
        Type::Float { size } => writeln!(
            out,
            "<floattype id=\"{}\" size=\"{}\"/>",
            mint.fresh(),
            size
        )?,
        Type::Size { size } => writeln!(
            out,
            "<sizetype id=\"{}\" size=\"{}\"/>",
            mint.fresh(),
            size
        )?,
        Type::Pointer(to) => {
            writeln!(out, "<pointertype id=\"{}\">", mint.fresh())?;
            write_type(out, mint, to)?;
            writeln!(out, "</pointertype>")?;
        }
        Type::Array { element, length } => {
            writeln!(
                out,
                "<arraytype id=\"{}\" length=\"{}\">",
                mint.fresh(),
                length
            )?;
            writeln!(out, "<basetype>")?;
            write_type(out, mint, element)?;
            writeln!(out, "</basetype>")?;
            writeln!(out, "</arraytype>")?;
        }
        Type::Named(name) => writeln!(
            out,
            "<namedtype id=\"{}\" name=\"{}\"/>",
            mint.fresh(),
            escape_xml(name)
        )?,
        Type::Compound { fields } => {
            writeln!(out, "<compoundtype id=\"{}\">", mint.fresh())?;
            for (name, ty) in fields {
                writeln!(out, "<member name=\"{}\">", escape_xml(name))?;
                write_type(out, mint, ty)?;
                writeln!(out, "</member>")?;
            }
            writeln!(out, "</compoundtype>")?;
        }
        Type::Func(sig) => {
            writeln!(out, "<functype id=\"{}\">", mint.fresh())?;
            write_signature(out, mint, sig)?;
            writeln!(out, "</functype>")?;
        }
    }
    Ok(())
}

fn write_exp(out: &mut dyn Write, mint: &mut IdMint, e: &Exp) -> Result<(), PersistError> {
    match e {
        Exp::Terminal(op) => writeln!(
            out,
            "<terminal id=\"{}\" op=\"{}\"/>",
            mint.fresh(),
            op.name()
        )?,
        Exp::Const { kind, conscript } => {
            write!(
                out,
                "<const id=\"{}\" op=\"{}\" conscript=\"{}\" value=\"",
                mint.fresh(),
                kind.op().name(),
                conscript
            )?;
            match kind {
                ConstKind::Int(v) => write!(out, "{}", v)?,
                ConstKind::Flt(v) => write!(out, "{:.6}", v)?,
                ConstKind::Str(v) => write!(out, "{}", escape_xml(v))?,
                ConstKind::Func(a) => write!(out, "{}", a.0)?,
            }
            writeln!(out, "\"/>")?;
        }
        Exp::Unary { op, sub1 } => {
            writeln!(
                out,
                "<unary id=\"{}\" op=\"{}\">",
                mint.fresh(),
                op.name()
            )?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "</unary>")?;
        }
        Exp::Binary { op, sub1, sub2 } => {
            writeln!(
                out,
                "<binary id=\"{}\" op=\"{}\">",
                mint.fresh(),
                op.name()
            )?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "<subexp2>")?;
            write_exp(out, mint, sub2)?;
            writeln!(out, "</subexp2>")?;
            writeln!(out, "</binary>")?;
        }
        Exp::Ternary {
            op,
            sub1,
            sub2,
            sub3,
        } => {
            writeln!(
                out,
                "<ternary id=\"{}\" op=\"{}\">",
                mint.fresh(),
                op.name()
            )?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "<subexp2>")?;
            write_exp(out, mint, sub2)?;
            writeln!(out, "</subexp2>")?;
            writeln!(out, "<subexp3>")?;
            write_exp(out, mint, sub3)?;
            writeln!(out, "</subexp3>")?;
            writeln!(out, "</ternary>")?;
        }
        Exp::Typed { ty, sub1 } => {
            writeln!(out, "<typedexp id=\"{}\" op=\"TypedExp\">", mint.fresh())?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "<type>")?;
            write_type(out, mint, ty)?;
            writeln!(out, "</type>")?;
            writeln!(out, "</typedexp>")?;
        }
        Exp::Location { op, sub1, proc } => {
            write!(out, "<location id=\"{}\"", mint.fresh())?;
            if let Some(p) = proc {
                write!(out, " proc=\"{}\"", mint.proc(*p))?;
            }
            writeln!(out, " op=\"{}\">", op.name())?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "</location>")?;
        }
        Exp::Ref { sub1, def } => {
            write!(out, "<refexp id=\"{}\"", mint.fresh())?;
            if let Some(d) = def {
                write!(out, " def=\"{}\"", mint.stmt(*d)?)?;
            }
            writeln!(out, " op=\"Subscript\">")?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "</refexp>")?;
        }
        Exp::FlagDef { sub1, .. } => {
            // The semantics-RTL link is runtime-only.
            writeln!(out, "<flagdef id=\"{}\" op=\"FlagDef\">", mint.fresh())?;
            writeln!(out, "<subexp1>")?;
            write_exp(out, mint, sub1)?;
            writeln!(out, "</subexp1>")?;
            writeln!(out, "</flagdef>")?;
        }
        Exp::TypeVal(ty) => {
            writeln!(out, "<typeval id=\"{}\" op=\"TypeVal\">", mint.fresh())?;
            writeln!(out, "<type>")?;
            write_type(out, mint, ty)?;
            writeln!(out, "</type>")?;
            writeln!(out, "</typeval>")?;
        }
    }
    Ok(())
}
