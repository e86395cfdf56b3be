//! The declarative tag table: for every element tag, a start routine run
//! when the element opens and an add-child routine run as each child
//! element closes. Handlers check the reader's phase the same way
//! throughout: phase 0 constructs and registers, phase 1 resolves and
//! patches.

use relift_core::{
    Addr, BasicBlock, BbId, BbType, BranchKind, Convention, Exp, Operator, Platform, Proc,
    ProcStatus, Rtl, SbbType, Signature, Signedness, Statement, StmtKind, TravKind, Type,
};
use relift_core::cfg::{CondType, LoopType, StructType, UnstructType};
use relift_core::stmt::{
    Assign, BoolAssign, BranchStmt, CallStmt, CaseStmt, GotoStmt, PhiAssign, PhiDef, ReturnStmt,
};
use relift_core::ConstKind;
use relift_core::Global;

use crate::error::PersistError;
use crate::ids::Handle;
use crate::reader::{AttrMap, Context, XmlProgReader};

type Rd = XmlProgReader;
type R = Result<(), PersistError>;

pub type StartFn = fn(&mut Rd, &mut Context, &AttrMap) -> R;
pub type AddFn = fn(&mut Rd, &mut Context, Context) -> R;

pub struct TagHandler {
    pub tag: &'static str,
    pub start: StartFn,
    pub add_child: AddFn,
}

/// Sentinel tag index for elements outside the table; their subtrees are
/// ignored.
pub const UNKNOWN_TAG: usize = usize::MAX;

macro_rules! tag {
    ($name:literal, $start:expr, $add:expr) => {
        TagHandler {
            tag: $name,
            start: $start,
            add_child: $add,
        }
    };
}

pub static TAGS: &[TagHandler] = &[
    tag!("prog", start_prog, add_to_prog),
    tag!("procs", start_noop, add_noop),
    tag!("global", start_global, add_to_global),
    tag!("cluster", start_cluster, add_to_cluster),
    tag!("libproc", start_libproc, add_to_libproc),
    tag!("userproc", start_userproc, add_to_userproc),
    tag!("local", start_named, add_lift_ty),
    tag!("symbol", start_noop, add_to_symbol),
    tag!("exp", start_noop, add_lift_exp),
    tag!("secondexp", start_noop, add_lift_exp),
    tag!("proven_true", start_noop, add_to_proven_true),
    tag!("caller", start_caller, add_noop),
    tag!("callee", start_callee, add_noop),
    tag!("signature", start_signature, add_to_signature),
    tag!("param", start_named, add_exp_and_ty),
    tag!("return", start_noop, add_exp_and_ty),
    tag!("rettype", start_noop, add_lift_ty),
    tag!("prefreturn", start_noop, add_lift_ty),
    tag!("prefparam", start_prefparam, add_noop),
    tag!("cfg", start_cfg, add_to_cfg),
    tag!("bb", start_bb, add_to_bb),
    tag!("inedge", start_edge_ref, add_noop),
    tag!("outedge", start_edge_ref, add_noop),
    tag!("livein", start_noop, add_lift_exp),
    tag!("order", start_edge_ref, add_noop),
    tag!("revorder", start_edge_ref, add_noop),
    tag!("rtl", start_rtl, add_to_rtl),
    tag!("stmt", start_noop, add_lift_stmt),
    tag!("assign", start_assign, add_to_assign),
    tag!("phiassign", start_phiassign, add_to_phiassign),
    tag!("def", start_def, add_lift_exp),
    tag!("lhs", start_noop, add_lift_exp),
    tag!("rhs", start_noop, add_lift_exp),
    tag!("guard", start_noop, add_lift_exp),
    tag!("cond", start_noop, add_lift_exp),
    tag!("callstmt", start_callstmt, add_to_callstmt),
    tag!("dest", start_dest, add_lift_exp),
    tag!("argument", start_noop, add_lift_stmt),
    tag!("defines", start_noop, add_lift_stmt),
    tag!("gotostmt", start_gotostmt, add_to_gotostmt),
    tag!("branchstmt", start_branchstmt, add_to_branchstmt),
    tag!("casestmt", start_casestmt, add_to_casestmt),
    tag!("boolasgn", start_boolasgn, add_to_boolasgn),
    tag!("returnstmt", start_returnstmt, add_to_returnstmt),
    tag!("modifieds", start_noop, add_lift_stmt),
    tag!("returns", start_noop, add_lift_stmt),
    tag!("type", start_noop, add_lift_ty),
    tag!("basetype", start_noop, add_lift_ty),
    tag!("voidtype", start_voidtype, add_noop),
    tag!("chartype", start_chartype, add_noop),
    tag!("booleantype", start_booleantype, add_noop),
    tag!("integertype", start_integertype, add_noop),
    tag!("floattype", start_floattype, add_noop),
    tag!("sizetype", start_sizetype, add_noop),
    tag!("namedtype", start_namedtype, add_noop),
    tag!("pointertype", start_pointertype, add_to_pointertype),
    tag!("arraytype", start_arraytype, add_to_arraytype),
    tag!("compoundtype", start_compoundtype, add_to_compoundtype),
    tag!("member", start_named, add_to_member),
    tag!("functype", start_functype, add_to_functype),
    tag!("location", start_location, add_to_exp_node),
    tag!("unary", start_unary, add_to_exp_node),
    tag!("binary", start_binary, add_to_exp_node),
    tag!("ternary", start_ternary, add_to_exp_node),
    tag!("const", start_const, add_noop),
    tag!("terminal", start_terminal, add_noop),
    tag!("typedexp", start_typedexp, add_to_exp_node),
    tag!("refexp", start_refexp, add_to_exp_node),
    tag!("flagdef", start_flagdef, add_to_exp_node),
    tag!("typeval", start_typeval, add_to_exp_node),
    tag!("subexp1", start_noop, add_lift_exp),
    tag!("subexp2", start_noop, add_lift_exp),
    tag!("subexp3", start_noop, add_lift_exp),
];

pub fn tag_index(tag: &str) -> Option<usize> {
    TAGS.iter().position(|t| t.tag == tag)
}

fn name_of(idx: usize) -> &'static str {
    TAGS[idx].tag
}

fn placeholder() -> Exp {
    Exp::Terminal(Operator::Nil)
}

// ---------------------------------------------------------------------
// Generic handlers
// ---------------------------------------------------------------------

fn start_noop(_rd: &mut Rd, _ctx: &mut Context, _attrs: &AttrMap) -> R {
    Ok(())
}

fn add_noop(_rd: &mut Rd, _ctx: &mut Context, _child: Context) -> R {
    Ok(())
}

/// Lifts an expression element into the wrapper's `exp` slot.
fn add_lift_exp(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let Some(e) = child.exp {
        ctx.exp = Some(e);
    }
    // Phi arguments carry their references on the wrapper itself.
    if child.ref_bb.is_some() {
        ctx.ref_bb = child.ref_bb;
    }
    if child.ref_stmt.is_some() {
        ctx.ref_stmt = child.ref_stmt;
    }
    Ok(())
}

/// Lifts a type element into the wrapper's `ty` slot.
fn add_lift_ty(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let Some(t) = child.ty {
        ctx.ty = Some(t);
    }
    Ok(())
}

/// Lifts a statement element into the wrapper's `stmt` slot.
fn add_lift_stmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let Some(s) = child.stmt {
        ctx.stmt = Some(s);
    }
    Ok(())
}

/// For elements with a `name` attribute and type/exp children (param,
/// local, member).
fn start_named(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.name = attrs.get("name").unwrap_or_default().to_string();
    Ok(())
}

/// Collects `<type>` and `<exp>` wrapper children (param, return).
fn add_exp_and_ty(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    match name_of(child.tag) {
        "type" => ctx.ty = child.ty,
        "exp" => ctx.exp = child.exp,
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------
// prog, global, cluster
// ---------------------------------------------------------------------

fn start_prog(rd: &mut Rd, _ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        return Ok(());
    }
    let path = attrs.get("path").unwrap_or_default().to_string();
    let mut prog = relift_core::Program::new(&path);
    if let Some(name) = attrs.get("name") {
        prog.set_name(name);
    }
    if let Some(n) = attrs.opt_i32("iNumberedProc")? {
        prog.numbered_proc = n;
    }
    rd.prog = Some(prog);
    Ok(())
}

fn add_to_prog(rd: &mut Rd, _ctx: &mut Context, child: Context) -> R {
    if rd.phase == 1 {
        return Ok(());
    }
    if name_of(child.tag) == "global" {
        let ty = child.ty.unwrap_or(Type::Void);
        rd.prog_mut()?.add_global(Global {
            name: child.name,
            uaddr: Addr(child.int as u32),
            ty,
        });
    }
    Ok(())
}

fn start_global(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        return Ok(());
    }
    ctx.name = attrs.get("name").unwrap_or_default().to_string();
    ctx.int = attrs.opt_u32("uaddr")?.unwrap_or(0) as i64;
    Ok(())
}

fn add_to_global(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if name_of(child.tag) == "type" {
        ctx.ty = child.ty;
    }
    Ok(())
}

fn start_cluster(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        if let Some(xml) = attrs.opt_u32("id")? {
            ctx.cluster = Some(rd.ids.resolve_cluster(xml)?);
        }
        return Ok(());
    }
    let name = attrs.get("name").unwrap_or_default().to_string();
    let nested = rd
        .stack
        .last()
        .map(|c| c.tag != UNKNOWN_TAG && name_of(c.tag) == "cluster")
        .unwrap_or(false);
    let id = if nested {
        rd.prog_mut()?.new_orphan_cluster(&name)
    } else {
        let root = rd.prog_mut()?.root_cluster();
        if let Some(c) = rd.prog_mut()?.cluster_mut(root) {
            c.name = name;
        }
        root
    };
    ctx.cluster = Some(id);
    if let Some(xml) = attrs.opt_u32("id")? {
        rd.ids.insert(xml, Handle::Cluster(id));
    }
    Ok(())
}

fn add_to_cluster(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if rd.phase == 1 || name_of(child.tag) != "cluster" {
        return Ok(());
    }
    if let (Some(parent), Some(c)) = (ctx.cluster, child.cluster) {
        rd.prog_mut()?.attach_cluster(parent, c)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------

fn start_libproc(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        let xml = attrs.u32("id")?;
        let pid = rd.ids.resolve_proc(xml)?;
        ctx.proc = Some(pid);
        patch_proc_links(rd, pid, attrs)?;
        let prog = rd.prog_mut()?;
        if let Some(p) = prog.proc_mut(pid) {
            p.common_mut().proven_true.clear();
        }
        return Ok(());
    }
    let address = Addr(attrs.opt_u32("address")?.unwrap_or(u32::MAX));
    let mut p = Proc::lib("", address);
    p.common_mut().first_caller_addr =
        Addr(attrs.opt_u32("firstCallerAddress")?.unwrap_or(u32::MAX));
    let pid = rd.prog_mut()?.add_proc(p);
    ctx.proc = Some(pid);
    if let Some(xml) = attrs.opt_u32("id")? {
        rd.ids.insert(xml, Handle::Proc(pid));
    }
    Ok(())
}

fn start_userproc(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        let xml = attrs.u32("id")?;
        let pid = rd.ids.resolve_proc(xml)?;
        ctx.proc = Some(pid);
        patch_proc_links(rd, pid, attrs)?;
        let retstmt = attrs
            .opt_u32("retstmt")?
            .map(|r| rd.ids.resolve_stmt(r))
            .transpose()?;
        let user = rd.user_mut(pid)?;
        user.common.proven_true.clear();
        user.symbol_map.clear();
        user.return_stmt = retstmt;
        return Ok(());
    }
    let address = Addr(attrs.opt_u32("address")?.unwrap_or(u32::MAX));
    let mut p = Proc::user("", address);
    p.common_mut().first_caller_addr =
        Addr(attrs.opt_u32("firstCallerAddress")?.unwrap_or(u32::MAX));
    if let Some(user) = p.as_user_mut() {
        if let Some(s) = attrs.opt_i32("status")? {
            user.status = ProcStatus::from_int(s).unwrap_or(ProcStatus::New);
        }
    }
    let pid = rd.prog_mut()?.add_proc(p);
    ctx.proc = Some(pid);
    if let Some(xml) = attrs.opt_u32("id")? {
        rd.ids.insert(xml, Handle::Proc(pid));
    }
    Ok(())
}

/// Phase-1 patches shared by both procedure kinds: the first caller and
/// the owning cluster.
fn patch_proc_links(rd: &mut Rd, pid: relift_core::ProcId, attrs: &AttrMap) -> R {
    let first_caller = attrs
        .opt_u32("firstCaller")?
        .map(|f| rd.ids.resolve_proc(f))
        .transpose()?;
    let cluster = attrs
        .opt_u32("cluster")?
        .map(|c| rd.ids.resolve_cluster(c))
        .transpose()?;
    let prog = rd.prog_mut()?;
    if let Some(p) = prog.proc_mut(pid) {
        let common = p.common_mut();
        if first_caller.is_some() {
            common.first_caller = first_caller;
        }
        if cluster.is_some() {
            common.cluster = cluster;
        }
    }
    Ok(())
}

fn add_to_libproc(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(pid) = ctx.proc else { return Ok(()) };
    match name_of(child.tag) {
        "signature" => {
            if let Some(sig) = child.sig {
                let prog = rd.prog_mut()?;
                if let Some(p) = prog.proc_mut(pid) {
                    p.common_mut().signature = sig;
                }
            }
        }
        "proven_true" => {
            if let (Some(lhs), Some(rhs)) = (child.exp, child.exp2) {
                let prog = rd.prog_mut()?;
                if let Some(p) = prog.proc_mut(pid) {
                    p.common_mut().set_proven_true(lhs, rhs);
                }
            }
        }
        "caller" => {
            if rd.phase == 1 {
                if let Some(call) = child.ref_stmt {
                    let prog = rd.prog_mut()?;
                    if let Some(p) = prog.proc_mut(pid) {
                        p.common_mut().add_caller(call);
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn add_to_userproc(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(pid) = ctx.proc else { return Ok(()) };
    match name_of(child.tag) {
        "signature" | "proven_true" | "caller" => {
            return add_to_libproc(rd, ctx, child);
        }
        "local" => {
            if rd.phase == 0 {
                if let Some(ty) = child.ty {
                    rd.user_mut(pid)?.add_local(&child.name, ty);
                }
            }
        }
        "symbol" => {
            if let (Some(from), Some(to)) = (child.exp, child.exp2) {
                rd.user_mut(pid)?.map_symbol_to(from, to);
            }
        }
        "callee" => {
            if rd.phase == 1 {
                if let Some(callee) = child.ref_proc {
                    rd.user_mut(pid)?.add_callee(callee);
                }
            }
        }
        "cfg" => {
            if rd.phase == 0 {
                rd.user_mut(pid)?.cfg.rebuild_addr_map();
            }
        }
        _ => {}
    }
    Ok(())
}

fn add_to_symbol(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    match name_of(child.tag) {
        "exp" => ctx.exp = child.exp,
        "secondexp" => ctx.exp2 = child.exp,
        _ => {}
    }
    Ok(())
}

fn add_to_proven_true(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let Some(e) = child.exp {
        if ctx.exp.is_none() {
            ctx.exp = Some(e);
        } else {
            ctx.exp2 = Some(e);
        }
    }
    Ok(())
}

fn start_caller(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        ctx.ref_stmt = Some(rd.ids.resolve_stmt(attrs.u32("call")?)?);
    }
    Ok(())
}

fn start_callee(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        ctx.ref_proc = Some(rd.ids.resolve_proc(attrs.u32("proc")?)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------

fn start_signature(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let platform = match attrs.get("platform") {
        Some(p) => Platform::from_name(p).ok_or_else(|| PersistError::MalformedAttr {
            attr: "platform".to_string(),
            value: p.to_string(),
        })?,
        None => Platform::Generic,
    };
    let convention = match attrs.get("convention") {
        Some(c) => Convention::from_name(c).ok_or_else(|| PersistError::MalformedAttr {
            attr: "convention".to_string(),
            value: c.to_string(),
        })?,
        None => Convention::None,
    };
    let mut sig =
        Signature::instantiate(platform, convention, attrs.get("name").unwrap_or_default());
    if let Some(e) = attrs.opt_i32("ellipsis")? {
        sig.ellipsis = e != 0;
    }
    if let Some(p) = attrs.get("preferedName") {
        sig.preferred_name = p.to_string();
    }
    ctx.sig = Some(sig);
    Ok(())
}

fn add_to_signature(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(sig) = ctx.sig.as_mut() else {
        return Ok(());
    };
    match name_of(child.tag) {
        "param" => sig.params.push(relift_core::Parameter {
            name: child.name,
            ty: child.ty.unwrap_or(Type::Void),
            exp: child.exp.unwrap_or_else(placeholder),
        }),
        "return" => sig.returns.push(relift_core::Return {
            ty: child.ty.unwrap_or(Type::Void),
            exp: child.exp.unwrap_or_else(placeholder),
        }),
        "rettype" => sig.rettype = child.ty,
        "prefreturn" => sig.preferred_return = child.ty,
        "prefparam" => sig.preferred_params.push(child.int as usize),
        _ => {}
    }
    Ok(())
}

fn start_prefparam(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.int = attrs.i64("index")?;
    Ok(())
}

// ---------------------------------------------------------------------
// CFG and basic blocks
// ---------------------------------------------------------------------

fn start_cfg(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let Some(pid) = rd.enclosing_proc() else {
        return Ok(());
    };
    ctx.proc = Some(pid);
    if rd.phase == 0 {
        if let Some(xml) = attrs.opt_u32("id")? {
            rd.ids.insert(xml, Handle::Cfg(pid));
        }
        let well_formed = attrs.opt_i32("wellformed")?.unwrap_or(0) != 0;
        let last_label = attrs.opt_i32("lastLabel")?.unwrap_or(0);
        let user = rd.user_mut(pid)?;
        user.cfg.well_formed = well_formed;
        user.cfg.last_label = last_label;
    } else {
        let entry = attrs
            .opt_u32("entryBB")?
            .map(|e| rd.ids.resolve_bb(e))
            .transpose()?;
        let exit = attrs
            .opt_u32("exitBB")?
            .map(|e| rd.ids.resolve_bb(e))
            .transpose()?;
        let user = rd.user_mut(pid)?;
        if let Some((_, b)) = entry {
            user.cfg.entry = Some(b);
        }
        if let Some((_, b)) = exit {
            user.cfg.exit = Some(b);
        }
    }
    Ok(())
}

fn add_to_cfg(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if rd.phase != 1 {
        return Ok(());
    }
    let Some(pid) = ctx.proc else { return Ok(()) };
    match name_of(child.tag) {
        "order" => {
            if let Some(b) = child.ref_bb {
                rd.user_mut(pid)?.cfg.ordering.push(b);
            }
        }
        "revorder" => {
            if let Some(b) = child.ref_bb {
                rd.user_mut(pid)?.cfg.rev_ordering.push(b);
            }
        }
        _ => {}
    }
    Ok(())
}

/// inedge, outedge, order, revorder: a bare `bb` reference.
fn start_edge_ref(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        let (_, b) = rd.ids.resolve_bb(attrs.u32("bb")?)?;
        ctx.ref_bb = Some(b);
    }
    Ok(())
}

fn opt_bb_ref(rd: &Rd, attrs: &AttrMap, name: &str) -> Result<Option<BbId>, PersistError> {
    Ok(attrs
        .opt_u32(name)?
        .map(|v| rd.ids.resolve_bb(v))
        .transpose()?
        .map(|(_, b)| b))
}

fn start_bb(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        let (pid, bbid) = rd.ids.resolve_bb(attrs.u32("id")?)?;
        ctx.proc = Some(pid);
        ctx.bb = Some(bbid);
        let sbb_loop_head = opt_bb_ref(rd, attrs, "m_loopHead")?;
        let sbb_case_head = opt_bb_ref(rd, attrs, "m_caseHead")?;
        let sbb_cond_follow = opt_bb_ref(rd, attrs, "m_condFollow")?;
        let sbb_loop_follow = opt_bb_ref(rd, attrs, "m_loopFollow")?;
        let sbb_latch = opt_bb_ref(rd, attrs, "m_latchNode")?;
        let imm_pdom = opt_bb_ref(rd, attrs, "immPDom")?;
        let loop_head = opt_bb_ref(rd, attrs, "loopHead")?;
        let case_head = opt_bb_ref(rd, attrs, "caseHead")?;
        let cond_follow = opt_bb_ref(rd, attrs, "condFollow")?;
        let loop_follow = opt_bb_ref(rd, attrs, "loopFollow")?;
        let latch = opt_bb_ref(rd, attrs, "latchNode")?;
        let bb = rd.bb_mut(pid, bbid)?;
        bb.sbb.loop_head = sbb_loop_head;
        bb.sbb.case_head = sbb_case_head;
        bb.sbb.cond_follow = sbb_cond_follow;
        bb.sbb.loop_follow = sbb_loop_follow;
        bb.sbb.latch_node = sbb_latch;
        bb.hll.imm_pdom = imm_pdom;
        bb.hll.loop_head = loop_head;
        bb.hll.case_head = case_head;
        bb.hll.cond_follow = cond_follow;
        bb.hll.loop_follow = loop_follow;
        bb.hll.latch_node = latch;
        return Ok(());
    }

    let Some(pid) = rd.enclosing_proc() else {
        return Ok(());
    };
    let mut bb = BasicBlock::empty(
        attrs
            .opt_i32("nodeType")?
            .and_then(BbType::from_int)
            .unwrap_or(BbType::Invalid),
    );
    bb.label_num = attrs.opt_i32("labelNum")?.unwrap_or(0);
    bb.label_needed = attrs.opt_i32("labelneeded")?.unwrap_or(0) != 0;
    bb.incomplete = attrs.opt_i32("incomplete")?.unwrap_or(0) != 0;
    bb.jump_required = attrs.opt_i32("jumpreqd")?.unwrap_or(0) != 0;
    bb.dft_first = attrs.opt_i32("DFTfirst")?.unwrap_or(0);
    bb.dft_last = attrs.opt_i32("DFTlast")?.unwrap_or(0);
    bb.dft_rev_first = attrs.opt_i32("DFTrevfirst")?.unwrap_or(0);
    bb.dft_rev_last = attrs.opt_i32("DFTrevlast")?.unwrap_or(0);
    bb.sbb.struct_type = attrs
        .opt_i32("structType")?
        .and_then(SbbType::from_int)
        .unwrap_or(SbbType::None);
    bb.sbb.loop_cond_type = attrs
        .opt_i32("loopCondType")?
        .and_then(SbbType::from_int)
        .unwrap_or(SbbType::None);
    bb.ord = attrs.opt_i32("ord")?.unwrap_or(-1);
    bb.rev_ord = attrs.opt_i32("revOrd")?.unwrap_or(-1);
    bb.in_edges_visited = attrs.opt_i32("inEdgesVisited")?.unwrap_or(0);
    bb.num_forward_in_edges = attrs.opt_i32("numForwardInEdges")?.unwrap_or(-1);
    bb.loop_stamps[0] = attrs.opt_i32("loopStamp1")?.unwrap_or(0);
    bb.loop_stamps[1] = attrs.opt_i32("loopStamp2")?.unwrap_or(0);
    bb.rev_loop_stamps[0] = attrs.opt_i32("revLoopStamp1")?.unwrap_or(0);
    bb.rev_loop_stamps[1] = attrs.opt_i32("revLoopStamp2")?.unwrap_or(0);
    bb.traversed = attrs
        .opt_i32("traversed")?
        .and_then(TravKind::from_int)
        .unwrap_or(TravKind::Untraversed);
    bb.hll_label = attrs.opt_i32("hllLabel")?.unwrap_or(0) != 0;
    bb.label_str = attrs.get("labelStr").map(|s| s.to_string());
    bb.indent_level = attrs.opt_i32("indentLevel")?.unwrap_or(0);
    bb.hll.s_type = attrs
        .opt_i32("sType")?
        .and_then(StructType::from_int)
        .unwrap_or(StructType::Seq);
    bb.hll.us_type = attrs
        .opt_i32("usType")?
        .and_then(UnstructType::from_int)
        .unwrap_or(UnstructType::Structured);
    bb.hll.l_type = attrs
        .opt_i32("lType")?
        .and_then(LoopType::from_int)
        .unwrap_or(LoopType::PreTested);
    bb.hll.c_type = attrs
        .opt_i32("cType")?
        .and_then(CondType::from_int)
        .unwrap_or(CondType::IfThen);

    let bbid = rd.user_mut(pid)?.cfg.push_block(bb);
    ctx.proc = Some(pid);
    ctx.bb = Some(bbid);
    if let Some(xml) = attrs.opt_u32("id")? {
        rd.ids.insert(xml, Handle::Bb(pid, bbid));
    }
    Ok(())
}

fn add_to_bb(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let (Some(pid), Some(bbid)) = (ctx.proc, ctx.bb) else {
        return Ok(());
    };
    match name_of(child.tag) {
        "rtl" => {
            if rd.phase == 0 {
                if let Some(rtl) = child.rtl {
                    rd.bb_mut(pid, bbid)?.rtls.push(rtl);
                }
            }
        }
        "inedge" => {
            if rd.phase == 1 {
                if let Some(b) = child.ref_bb {
                    rd.bb_mut(pid, bbid)?.in_edges.push(b);
                }
            }
        }
        "outedge" => {
            if rd.phase == 1 {
                if let Some(b) = child.ref_bb {
                    rd.bb_mut(pid, bbid)?.out_edges.push(b);
                }
            }
        }
        "livein" => {
            if rd.phase == 1 {
                if let Some(e) = child.exp {
                    rd.bb_mut(pid, bbid)?.live_in.insert(e);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn start_rtl(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 0 {
        let addr = Addr(attrs.opt_u32("addr")?.unwrap_or(0));
        ctx.rtl = Some(Rtl::new(addr));
        return Ok(());
    }
    // Phase 1 walks positionally: this RTL is the parent block's next.
    if let Some(parent) = rd.stack.last_mut() {
        ctx.proc = parent.proc;
        ctx.bb = parent.bb;
        ctx.rtl_index = parent.rtl_index;
        parent.rtl_index += 1;
    }
    Ok(())
}

fn add_to_rtl(rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if name_of(child.tag) != "stmt" {
        return Ok(());
    }
    let Some(stmt) = child.stmt else { return Ok(()) };
    if rd.phase == 0 {
        if let Some(rtl) = ctx.rtl.as_mut() {
            rtl.stmts.push(stmt);
        }
        return Ok(());
    }
    let (Some(pid), Some(bbid)) = (ctx.proc, ctx.bb) else {
        return Ok(());
    };
    let rtl_index = ctx.rtl_index;
    let stmt_index = ctx.stmt_index;
    ctx.stmt_index += 1;
    let bb = rd.bb_mut(pid, bbid)?;
    if let Some(slot) = bb
        .rtls
        .get_mut(rtl_index)
        .and_then(|r| r.stmts.get_mut(stmt_index))
    {
        *slot = stmt;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

/// Shared header handling: identity in phase 0, resolution in phase 1.
fn stmt_start(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap, kind: StmtKind) -> R {
    let mut s = Statement::new(kind);
    if let Some(n) = attrs.opt_u32("number")? {
        s.number = n;
    }
    if rd.phase == 0 {
        let sid = rd.alloc_stmt_id()?;
        s.id = sid;
        if let Some(xml) = attrs.opt_u32("id")? {
            rd.ids.insert(xml, Handle::Stmt(sid));
        }
    } else {
        if let Some(xml) = attrs.opt_u32("id")? {
            s.id = rd.ids.resolve_stmt(xml)?;
        }
        s.parent = attrs
            .opt_u32("parent")?
            .map(|p| rd.ids.resolve_stmt(p))
            .transpose()?;
        s.proc = attrs
            .opt_u32("proc")?
            .map(|p| rd.ids.resolve_proc(p))
            .transpose()?;
    }
    ctx.stmt = Some(s);
    Ok(())
}

fn start_assign(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Assign(Assign::new(placeholder(), placeholder())),
    )
}

fn start_phiassign(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Phi(PhiAssign {
            lhs: placeholder(),
            defs: Vec::new(),
        }),
    )
}

fn start_boolasgn(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let jt = attrs
        .opt_i32("jtcond")?
        .and_then(BranchKind::from_int)
        .unwrap_or(BranchKind::Eq);
    let is_float = attrs.opt_i32("float")?.unwrap_or(0) != 0;
    let size = attrs.opt_u32("size")?.unwrap_or(0) as u16;
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Bool(BoolAssign {
            lhs: placeholder(),
            cond: placeholder(),
            jt,
            is_float,
            size,
        }),
    )
}

fn start_callstmt(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let is_computed = attrs.opt_i32("computed")?.unwrap_or(0) != 0;
    let return_after_call = attrs.opt_i32("returnAfterCall")?.unwrap_or(0) != 0;
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Call(CallStmt {
            dest: placeholder(),
            dest_proc: None,
            is_computed,
            return_after_call,
            arguments: Vec::new(),
            defines: Vec::new(),
        }),
    )
}

fn start_gotostmt(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let is_computed = attrs.opt_i32("computed")?.unwrap_or(0) != 0;
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Goto(GotoStmt {
            dest: placeholder(),
            is_computed,
        }),
    )
}

fn start_branchstmt(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let is_computed = attrs.opt_i32("computed")?.unwrap_or(0) != 0;
    let jt = attrs
        .opt_i32("jtcond")?
        .and_then(BranchKind::from_int)
        .unwrap_or(BranchKind::Eq);
    let is_float = attrs.opt_i32("float")?.unwrap_or(0) != 0;
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Branch(BranchStmt {
            dest: placeholder(),
            cond: None,
            jt,
            is_float,
            is_computed,
        }),
    )
}

fn start_casestmt(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let is_computed = attrs.opt_i32("computed")?.unwrap_or(0) != 0;
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Case(CaseStmt {
            dest: placeholder(),
            is_computed,
            switch_info: None,
        }),
    )
}

fn start_returnstmt(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let ret_addr = Addr(attrs.opt_u32("retAddr")?.unwrap_or(0));
    stmt_start(
        rd,
        ctx,
        attrs,
        StmtKind::Return(ReturnStmt {
            modifieds: Vec::new(),
            returns: Vec::new(),
            ret_addr,
        }),
    )
}

fn add_to_assign(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Assign(a),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "lhs" => {
            if let Some(e) = child.exp {
                a.lhs = e;
            }
        }
        "rhs" => {
            if let Some(e) = child.exp {
                a.rhs = e;
            }
        }
        "type" => a.ty = child.ty,
        "guard" => a.guard = child.exp,
        _ => {}
    }
    Ok(())
}

fn add_to_phiassign(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Phi(p),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "lhs" => {
            if let Some(e) = child.exp {
                p.lhs = e;
            }
        }
        "def" => p.defs.push(PhiDef {
            bb: child.ref_bb.unwrap_or(BbId(u32::MAX)),
            stmt: child.ref_stmt,
            exp: child.exp.unwrap_or_else(placeholder),
        }),
        _ => {}
    }
    Ok(())
}

fn start_def(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        if let Some(b) = attrs.opt_u32("bb")? {
            let (_, bbid) = rd.ids.resolve_bb(b)?;
            ctx.ref_bb = Some(bbid);
        }
        ctx.ref_stmt = attrs
            .opt_u32("stmt")?
            .map(|s| rd.ids.resolve_stmt(s))
            .transpose()?;
    }
    Ok(())
}

fn add_to_boolasgn(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Bool(b),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "lhs" => {
            if let Some(e) = child.exp {
                b.lhs = e;
            }
        }
        "cond" => {
            if let Some(e) = child.exp {
                b.cond = e;
            }
        }
        _ => {}
    }
    Ok(())
}

fn start_dest(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    if rd.phase == 1 {
        ctx.ref_proc = attrs
            .opt_u32("proc")?
            .map(|p| rd.ids.resolve_proc(p))
            .transpose()?;
    }
    Ok(())
}

fn add_to_callstmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Call(c),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "dest" => {
            if let Some(e) = child.exp {
                c.dest = e;
            }
            if child.ref_proc.is_some() {
                c.dest_proc = child.ref_proc;
            }
        }
        "argument" => {
            if let Some(s) = child.stmt {
                c.arguments.push(s);
            }
        }
        "defines" => {
            if let Some(s) = child.stmt {
                c.defines.push(s);
            }
        }
        _ => {}
    }
    Ok(())
}

fn add_to_gotostmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Goto(g),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    if name_of(child.tag) == "dest" {
        if let Some(e) = child.exp {
            g.dest = e;
        }
    }
    Ok(())
}

fn add_to_branchstmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Branch(b),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "dest" => {
            if let Some(e) = child.exp {
                b.dest = e;
            }
        }
        "cond" => b.cond = child.exp,
        _ => {}
    }
    Ok(())
}

fn add_to_casestmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Case(c),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    if name_of(child.tag) == "dest" {
        if let Some(e) = child.exp {
            c.dest = e;
        }
    }
    Ok(())
}

fn add_to_returnstmt(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(Statement {
        kind: StmtKind::Return(r),
        ..
    }) = ctx.stmt.as_mut()
    else {
        return Ok(());
    };
    match name_of(child.tag) {
        "modifieds" => {
            if let Some(s) = child.stmt {
                r.modifieds.push(s);
            }
        }
        "returns" => {
            if let Some(s) = child.stmt {
                r.returns.push(s);
            }
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

fn start_voidtype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Void);
    Ok(())
}

fn start_chartype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Char);
    Ok(())
}

fn start_booleantype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Boolean);
    Ok(())
}

fn start_integertype(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Integer {
        size: attrs.u16("size")?,
        signedness: Signedness::from_int(attrs.opt_i32("signedness")?.unwrap_or(0)),
    });
    Ok(())
}

fn start_floattype(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Float {
        size: attrs.u16("size")?,
    });
    Ok(())
}

fn start_sizetype(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Size {
        size: attrs.u16("size")?,
    });
    Ok(())
}

fn start_namedtype(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Named(
        attrs.get("name").unwrap_or_default().to_string(),
    ));
    Ok(())
}

fn start_pointertype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    // The pointee arrives as a child; Void stands in until then.
    ctx.ty = Some(Type::ptr(Type::Void));
    Ok(())
}

fn add_to_pointertype(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let (Some(Type::Pointer(to)), Some(t)) = (ctx.ty.as_mut(), child.ty) {
        **to = t;
    }
    Ok(())
}

fn start_arraytype(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Array {
        element: Box::new(Type::Void),
        length: attrs.opt_u32("length")?.unwrap_or(relift_core::ARRAY_LEN_UNKNOWN),
    });
    Ok(())
}

fn add_to_arraytype(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if name_of(child.tag) != "basetype" {
        return Ok(());
    }
    if let (Some(Type::Array { element, .. }), Some(t)) = (ctx.ty.as_mut(), child.ty) {
        **element = t;
    }
    Ok(())
}

fn start_compoundtype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Compound { fields: Vec::new() });
    Ok(())
}

fn add_to_compoundtype(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if name_of(child.tag) != "member" {
        return Ok(());
    }
    if let (Some(Type::Compound { fields }), Some(t)) = (ctx.ty.as_mut(), child.ty) {
        fields.push((child.name, t));
    }
    Ok(())
}

fn add_to_member(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let Some(t) = child.ty {
        ctx.ty = Some(t);
    }
    Ok(())
}

fn start_functype(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.ty = Some(Type::Func(Box::new(Signature::new(""))));
    Ok(())
}

fn add_to_functype(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    if let (Some(Type::Func(sig)), Some(s)) = (ctx.ty.as_mut(), child.sig) {
        **sig = s;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

fn start_terminal(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::Terminal(attrs.op("op")?));
    Ok(())
}

fn start_const(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let op = attrs.op("op")?;
    let raw = attrs.req("value")?;
    let kind = match op {
        Operator::IntConst => ConstKind::Int(raw.parse().map_err(|_| {
            PersistError::MalformedAttr {
                attr: "value".to_string(),
                value: raw.to_string(),
            }
        })?),
        Operator::FltConst => ConstKind::Flt(attrs.f64("value")?),
        Operator::StrConst => ConstKind::Str(raw.to_string()),
        Operator::FuncConst => ConstKind::Func(Addr(attrs.u32("value")?)),
        other => {
            return Err(PersistError::UnknownOperator(other.name().to_string()));
        }
    };
    ctx.exp = Some(Exp::Const {
        kind,
        conscript: attrs.opt_u32("conscript")?.unwrap_or(0),
    });
    Ok(())
}

fn start_location(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let proc = if rd.phase == 1 {
        attrs
            .opt_u32("proc")?
            .map(|p| rd.ids.resolve_proc(p))
            .transpose()?
    } else {
        None
    };
    ctx.exp = Some(Exp::Location {
        op: attrs.op("op")?,
        sub1: Box::new(placeholder()),
        proc,
    });
    Ok(())
}

fn start_unary(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::unary(attrs.op("op")?, placeholder()));
    Ok(())
}

fn start_binary(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::binary(attrs.op("op")?, placeholder(), placeholder()));
    Ok(())
}

fn start_ternary(_rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::ternary(
        attrs.op("op")?,
        placeholder(),
        placeholder(),
        placeholder(),
    ));
    Ok(())
}

fn start_typedexp(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::typed(Type::Void, placeholder()));
    Ok(())
}

fn start_refexp(rd: &mut Rd, ctx: &mut Context, attrs: &AttrMap) -> R {
    let def = if rd.phase == 1 {
        attrs
            .opt_u32("def")?
            .map(|d| rd.ids.resolve_stmt(d))
            .transpose()?
    } else {
        None
    };
    ctx.exp = Some(Exp::Ref {
        sub1: Box::new(placeholder()),
        def,
    });
    Ok(())
}

fn start_flagdef(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    // The semantics-RTL link is runtime-only and not reloaded.
    ctx.exp = Some(Exp::FlagDef {
        sub1: Box::new(placeholder()),
        rtl: None,
    });
    Ok(())
}

fn start_typeval(_rd: &mut Rd, ctx: &mut Context, _attrs: &AttrMap) -> R {
    ctx.exp = Some(Exp::TypeVal(Type::Void));
    Ok(())
}

/// Attaches subexpression and type children to an expression node.
fn add_to_exp_node(_rd: &mut Rd, ctx: &mut Context, child: Context) -> R {
    let Some(exp) = ctx.exp.as_mut() else {
        return Ok(());
    };
    match name_of(child.tag) {
        "subexp1" => {
            if let Some(e) = child.exp {
                set_sub(exp, 1, e);
            }
        }
        "subexp2" => {
            if let Some(e) = child.exp {
                set_sub(exp, 2, e);
            }
        }
        "subexp3" => {
            if let Some(e) = child.exp {
                set_sub(exp, 3, e);
            }
        }
        "type" => {
            if let Some(t) = child.ty {
                match exp {
                    Exp::Typed { ty, .. } => *ty = t,
                    Exp::TypeVal(ty) => *ty = t,
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn set_sub(exp: &mut Exp, which: u8, e: Exp) {
    match (exp, which) {
        (Exp::Unary { sub1, .. }, 1)
        | (Exp::Typed { sub1, .. }, 1)
        | (Exp::Location { sub1, .. }, 1)
        | (Exp::Ref { sub1, .. }, 1)
        | (Exp::FlagDef { sub1, .. }, 1)
        | (Exp::Binary { sub1, .. }, 1)
        | (Exp::Ternary { sub1, .. }, 1) => **sub1 = e,
        (Exp::Binary { sub2, .. }, 2) | (Exp::Ternary { sub2, .. }, 2) => **sub2 = e,
        (Exp::Ternary { sub3, .. }, 3) => **sub3 = e,
        _ => {}
    }
}
