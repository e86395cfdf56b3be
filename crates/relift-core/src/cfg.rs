//! The control flow graph and its basic blocks.
//!
//! A [`Cfg`] owns its blocks in an arena indexed by [`BbId`]; edges are
//! id lists on the blocks themselves, kept mirror-consistent by the edge
//! operations. Blocks can exist in an *incomplete* state: a jump target
//! that has not been decoded yet gets a placeholder block, and the later
//! `add_bb` at that address completes it in place so every edge to it
//! stays valid.
//!
//! Two generations of structuring annotations live side by side on each
//! block -- the pre-pass fields in [`SbbInfo`] and the HLL-pass fields in
//! [`HllInfo`] -- and both survive persistence.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::id::{Addr, BbId};
use crate::rtl::Rtl;
use crate::stmt::LocationSet;

/// Kind of a basic block, from its terminating control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BbType {
    /// Unconditional jump out.
    OneWay,
    /// Conditional branch: taken and fall-through successors.
    TwoWay,
    /// Computed multi-way (switch).
    NWay,
    Call,
    Ret,
    /// Falls through to the next address.
    Fall,
    /// Computed jump.
    CompJump,
    #[default]
    Invalid,
}

impl BbType {
    pub fn to_int(self) -> i32 {
        self as i32
    }

    pub fn from_int(i: i32) -> Option<BbType> {
        use BbType::*;
        [OneWay, TwoWay, NWay, Call, Ret, Fall, CompJump, Invalid]
            .get(i as usize)
            .copied()
    }
}

/// Which depth-first pass last visited the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TravKind {
    #[default]
    Untraversed,
    DfsTag,
    DfsLoopNum,
    DfsRevLoopNum,
    DfsCase,
    DfsPostDom,
    DfsCodegen,
}

impl TravKind {
    pub fn to_int(self) -> i32 {
        self as i32
    }

    pub fn from_int(i: i32) -> Option<TravKind> {
        use TravKind::*;
        [
            Untraversed,
            DfsTag,
            DfsLoopNum,
            DfsRevLoopNum,
            DfsCase,
            DfsPostDom,
            DfsCodegen,
        ]
        .get(i as usize)
        .copied()
    }
}

/// Structured-BB classification from the pre-pass structuring analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SbbType {
    #[default]
    None,
    PreTestLoop,
    PostTestLoop,
    EndlessLoop,
    JumpInOutLoop,
    JumpIntoCase,
    IfGoto,
    IfThen,
    IfThenElse,
    IfElse,
    Case,
}

impl SbbType {
    pub fn to_int(self) -> i32 {
        self as i32
    }

    pub fn from_int(i: i32) -> Option<SbbType> {
        use SbbType::*;
        [
            None,
            PreTestLoop,
            PostTestLoop,
            EndlessLoop,
            JumpInOutLoop,
            JumpIntoCase,
            IfGoto,
            IfThen,
            IfThenElse,
            IfElse,
            Case,
        ]
        .get(i as usize)
        .copied()
    }
}

/// HLL-pass structure class of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StructType {
    #[default]
    Seq,
    Cond,
    Loop,
    LoopCond,
}

/// Unstructured-edge class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnstructType {
    #[default]
    Structured,
    JumpInOutLoop,
    JumpIntoCase,
}

/// Loop class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoopType {
    #[default]
    PreTested,
    PostTested,
    Endless,
}

/// Conditional class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CondType {
    #[default]
    IfThen,
    IfThenElse,
    IfElse,
    Case,
}

macro_rules! int_enum {
    ($ty:ident, [$($v:ident),+ $(,)?]) => {
        impl $ty {
            pub fn to_int(self) -> i32 {
                self as i32
            }

            pub fn from_int(i: i32) -> Option<$ty> {
                [$($ty::$v),+].get(i as usize).copied()
            }
        }
    };
}

int_enum!(StructType, [Seq, Cond, Loop, LoopCond]);
int_enum!(UnstructType, [Structured, JumpInOutLoop, JumpIntoCase]);
int_enum!(LoopType, [PreTested, PostTested, Endless]);
int_enum!(CondType, [IfThen, IfThenElse, IfElse, Case]);

/// Structuring annotations from the pre-pass analysis. Never merged with
/// [`HllInfo`]; both families are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SbbInfo {
    pub struct_type: SbbType,
    pub loop_cond_type: SbbType,
    pub loop_head: Option<BbId>,
    pub case_head: Option<BbId>,
    pub cond_follow: Option<BbId>,
    pub loop_follow: Option<BbId>,
    pub latch_node: Option<BbId>,
}

/// Structuring annotations from the HLL code-generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HllInfo {
    pub imm_pdom: Option<BbId>,
    pub loop_head: Option<BbId>,
    pub case_head: Option<BbId>,
    pub cond_follow: Option<BbId>,
    pub loop_follow: Option<BbId>,
    pub latch_node: Option<BbId>,
    pub s_type: StructType,
    pub us_type: UnstructType,
    pub l_type: LoopType,
    pub c_type: CondType,
}

/// A basic block: RTLs plus edges and per-pass bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub node_type: BbType,
    pub incomplete: bool,
    pub jump_required: bool,
    pub label_needed: bool,
    pub hll_label: bool,
    pub label_num: i32,
    pub label_str: Option<String>,
    pub in_edges: SmallVec<[BbId; 2]>,
    pub out_edges: SmallVec<[BbId; 2]>,
    pub rtls: Vec<Rtl>,
    pub live_in: LocationSet,
    // Depth-first traversal stamps, forward and reverse.
    pub dft_first: i32,
    pub dft_last: i32,
    pub dft_rev_first: i32,
    pub dft_rev_last: i32,
    pub ord: i32,
    pub rev_ord: i32,
    pub in_edges_visited: i32,
    pub num_forward_in_edges: i32,
    pub loop_stamps: [i32; 2],
    pub rev_loop_stamps: [i32; 2],
    pub traversed: TravKind,
    pub indent_level: i32,
    pub sbb: SbbInfo,
    pub hll: HllInfo,
}

impl BasicBlock {
    /// An incomplete placeholder for a jump target not yet decoded.
    pub fn incomplete_at(addr: Addr) -> BasicBlock {
        let mut bb = BasicBlock::empty(BbType::Invalid);
        bb.incomplete = true;
        bb.rtls.push(Rtl::new(addr));
        bb
    }

    pub fn empty(node_type: BbType) -> BasicBlock {
        BasicBlock {
            node_type,
            incomplete: false,
            jump_required: false,
            label_needed: false,
            hll_label: false,
            label_num: 0,
            label_str: None,
            in_edges: SmallVec::new(),
            out_edges: SmallVec::new(),
            rtls: Vec::new(),
            live_in: LocationSet::new(),
            dft_first: 0,
            dft_last: 0,
            dft_rev_first: 0,
            dft_rev_last: 0,
            ord: -1,
            rev_ord: -1,
            in_edges_visited: 0,
            num_forward_in_edges: -1,
            loop_stamps: [0; 2],
            rev_loop_stamps: [0; 2],
            traversed: TravKind::Untraversed,
            indent_level: 0,
            sbb: SbbInfo::default(),
            hll: HllInfo::default(),
        }
    }

    pub fn new(rtls: Vec<Rtl>, node_type: BbType) -> BasicBlock {
        let mut bb = BasicBlock::empty(node_type);
        bb.rtls = rtls;
        bb
    }

    /// Address of the first RTL, the block's identity in the address map.
    pub fn head_addr(&self) -> Option<Addr> {
        self.rtls.first().map(|r| r.addr)
    }

    /// Address just past the last RTL's own address (the last RTL's
    /// address itself; blocks don't know instruction lengths).
    pub fn last_addr(&self) -> Option<Addr> {
        self.rtls.last().map(|r| r.addr)
    }
}

/// The control flow graph of one user procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    /// Head address to block, for target resolution and splitting.
    map: BTreeMap<Addr, BbId>,
    pub entry: Option<BbId>,
    pub exit: Option<BbId>,
    /// DFS pre-order of block ids, filled by `set_depth_first_order`.
    pub ordering: Vec<BbId>,
    /// Reverse-DFS order, filled by `set_rev_depth_first_order`.
    pub rev_ordering: Vec<BbId>,
    pub well_formed: bool,
    pub last_label: i32,
}

impl Cfg {
    pub fn new() -> Cfg {
        Cfg::default()
    }

    pub fn block(&self, id: BbId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn block_mut(&mut self, id: BbId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0 as usize)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Block ids in insertion order.
    pub fn block_ids(&self) -> impl Iterator<Item = BbId> + '_ {
        (0..self.blocks.len()).map(|i| BbId(i as u32))
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BbId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BbId(i as u32), b))
    }

    pub fn bb_at(&self, addr: Addr) -> Option<BbId> {
        self.map.get(&addr).copied()
    }

    /// Appends a raw block to the arena without touching the address map.
    /// The persistence reader uses this; `add_bb` is the decoder-facing
    /// entry point.
    pub fn push_block(&mut self, bb: BasicBlock) -> BbId {
        let id = BbId(self.blocks.len() as u32);
        if let Some(addr) = bb.head_addr() {
            self.map.insert(addr, id);
        }
        self.blocks.push(bb);
        id
    }

    /// Adds a basic block holding `rtls`.
    ///
    /// If an incomplete placeholder already sits at the head address it is
    /// completed in place and keeps its id, so existing edges to it stay
    /// valid. A complete block at the same head is a duplicate-head error.
    pub fn add_bb(&mut self, rtls: Vec<Rtl>, node_type: BbType) -> Result<BbId, CoreError> {
        let head = rtls.first().map(|r| r.addr);
        if let Some(addr) = head {
            if let Some(&existing) = self.map.get(&addr) {
                let bb = &mut self.blocks[existing.0 as usize];
                if !bb.incomplete {
                    return Err(CoreError::DuplicateBbHead(addr));
                }
                bb.incomplete = false;
                bb.node_type = node_type;
                bb.rtls = rtls;
                return Ok(existing);
            }
        }
        let mut bb = BasicBlock::new(rtls, node_type);
        bb.incomplete = false;
        let id = BbId(self.blocks.len() as u32);
        if let Some(addr) = head {
            self.map.insert(addr, id);
        }
        self.blocks.push(bb);
        Ok(id)
    }

    /// Adds an out-edge from `from` to the block at `dest`, creating an
    /// incomplete placeholder when the destination has not been decoded
    /// yet. The matching in-edge is created atomically.
    pub fn add_out_edge(&mut self, from: BbId, dest: Addr) -> Result<BbId, CoreError> {
        if self.block(from).is_none() {
            return Err(CoreError::BbNotFound { id: from });
        }
        let dest_id = match self.map.get(&dest) {
            Some(&id) => id,
            None => {
                let id = BbId(self.blocks.len() as u32);
                self.blocks.push(BasicBlock::incomplete_at(dest));
                self.map.insert(dest, id);
                id
            }
        };
        self.blocks[from.0 as usize].out_edges.push(dest_id);
        self.blocks[dest_id.0 as usize].in_edges.push(from);
        Ok(dest_id)
    }

    /// Adds a direct edge between two existing blocks.
    pub fn add_edge(&mut self, from: BbId, to: BbId) -> Result<(), CoreError> {
        if self.block(from).is_none() {
            return Err(CoreError::BbNotFound { id: from });
        }
        if self.block(to).is_none() {
            return Err(CoreError::BbNotFound { id: to });
        }
        self.blocks[from.0 as usize].out_edges.push(to);
        self.blocks[to.0 as usize].in_edges.push(from);
        Ok(())
    }

    /// Splits the block containing `addr` at that address.
    ///
    /// The upper half keeps the original id and all in-edges; the lower
    /// half takes the RTLs from `addr` on, the out-edges, and becomes the
    /// target of the address map entry for `addr`. The upper half falls
    /// through to the lower half.
    pub fn split_bb(&mut self, addr: Addr) -> Result<BbId, CoreError> {
        // Already a block head: nothing to do.
        if let Some(&id) = self.map.get(&addr) {
            return Ok(id);
        }
        // Find the block whose RTL range contains addr.
        let mut found: Option<(BbId, usize)> = None;
        for (i, bb) in self.blocks.iter().enumerate() {
            if let Some(pos) = bb.rtls.iter().position(|r| r.addr == addr) {
                if pos > 0 {
                    found = Some((BbId(i as u32), pos));
                    break;
                }
            }
        }
        let (upper_id, pos) = found.ok_or(CoreError::NoSplitPoint(addr))?;

        let lower_id = BbId(self.blocks.len() as u32);
        let upper = &mut self.blocks[upper_id.0 as usize];
        let lower_rtls = upper.rtls.split_off(pos);
        let out_edges = std::mem::take(&mut upper.out_edges);
        let node_type = upper.node_type;
        upper.node_type = BbType::Fall;
        upper.out_edges.push(lower_id);

        let mut lower = BasicBlock::new(lower_rtls, node_type);
        lower.in_edges.push(upper_id);
        lower.out_edges = out_edges.clone();
        self.blocks.push(lower);
        self.map.insert(addr, lower_id);

        // Successors now flow in from the lower half.
        for succ in out_edges {
            for ie in &mut self.blocks[succ.0 as usize].in_edges {
                if *ie == upper_id {
                    *ie = lower_id;
                }
            }
        }
        Ok(lower_id)
    }

    /// Checks the structural invariants and records the verdict in
    /// `well_formed`:
    /// every non-entry block has an in-edge, every edge is mirrored, no
    /// duplicate edges, no incomplete blocks remain.
    pub fn check_well_formed(&mut self) -> Result<(), CoreError> {
        self.well_formed = false;
        for (i, bb) in self.blocks.iter().enumerate() {
            let id = BbId(i as u32);
            if bb.incomplete {
                return Err(CoreError::NotWellFormed {
                    reason: format!("block {} is incomplete", id),
                });
            }
            if Some(id) != self.entry && bb.in_edges.is_empty() {
                return Err(CoreError::NotWellFormed {
                    reason: format!("non-entry block {} has no in-edges", id),
                });
            }
            for (j, out) in bb.out_edges.iter().enumerate() {
                if bb.out_edges[..j].contains(out) {
                    return Err(CoreError::NotWellFormed {
                        reason: format!("duplicate out-edge {} -> {}", id, out),
                    });
                }
                let dest = self.blocks.get(out.0 as usize).ok_or_else(|| {
                    CoreError::NotWellFormed {
                        reason: format!("out-edge {} -> {} dangles", id, out),
                    }
                })?;
                if !dest.in_edges.contains(&id) {
                    return Err(CoreError::NotWellFormed {
                        reason: format!("edge {} -> {} lacks the mirror in-edge", id, out),
                    });
                }
            }
            for inn in &bb.in_edges {
                let src = self.blocks.get(inn.0 as usize).ok_or_else(|| {
                    CoreError::NotWellFormed {
                        reason: format!("in-edge {} <- {} dangles", id, inn),
                    }
                })?;
                if !src.out_edges.contains(&id) {
                    return Err(CoreError::NotWellFormed {
                        reason: format!("edge {} <- {} lacks the mirror out-edge", id, inn),
                    });
                }
            }
        }
        self.well_formed = true;
        Ok(())
    }

    /// Fills `ordering` with a DFS pre-order from the entry and stamps
    /// each block's `dft_first`/`dft_last` and `ord`.
    pub fn set_depth_first_order(&mut self) {
        self.ordering.clear();
        let Some(entry) = self.entry else { return };
        let n = self.blocks.len();
        let mut visited = vec![false; n];
        let mut first = 1i32;
        let mut stack = vec![(entry, 0usize)];
        visited[entry.0 as usize] = true;
        self.blocks[entry.0 as usize].dft_first = first;
        self.ordering.push(entry);
        while let Some((id, next)) = stack.pop() {
            let succs: Vec<BbId> = self.blocks[id.0 as usize].out_edges.to_vec();
            if next < succs.len() {
                stack.push((id, next + 1));
                let s = succs[next];
                if !visited[s.0 as usize] {
                    visited[s.0 as usize] = true;
                    first += 1;
                    self.blocks[s.0 as usize].dft_first = first;
                    self.ordering.push(s);
                    stack.push((s, 0));
                }
            } else {
                first += 1;
                self.blocks[id.0 as usize].dft_last = first;
            }
        }
        for (ord, id) in self.ordering.iter().enumerate() {
            self.blocks[id.0 as usize].ord = ord as i32;
        }
    }

    /// Fills `rev_ordering` with a DFS pre-order over reversed edges from
    /// the exit and stamps `dft_rev_first`/`dft_rev_last` and `rev_ord`.
    pub fn set_rev_depth_first_order(&mut self) {
        self.rev_ordering.clear();
        let Some(exit) = self.exit else { return };
        let n = self.blocks.len();
        let mut visited = vec![false; n];
        let mut first = 1i32;
        let mut stack = vec![(exit, 0usize)];
        visited[exit.0 as usize] = true;
        self.blocks[exit.0 as usize].dft_rev_first = first;
        self.rev_ordering.push(exit);
        while let Some((id, next)) = stack.pop() {
            let preds: Vec<BbId> = self.blocks[id.0 as usize].in_edges.to_vec();
            if next < preds.len() {
                stack.push((id, next + 1));
                let p = preds[next];
                if !visited[p.0 as usize] {
                    visited[p.0 as usize] = true;
                    first += 1;
                    self.blocks[p.0 as usize].dft_rev_first = first;
                    self.rev_ordering.push(p);
                    stack.push((p, 0));
                }
            } else {
                first += 1;
                self.blocks[id.0 as usize].dft_rev_last = first;
            }
        }
        for (ord, id) in self.rev_ordering.iter().enumerate() {
            self.blocks[id.0 as usize].rev_ord = ord as i32;
        }
    }

    /// Rebuilds the head-address map from block contents; the persistence
    /// reader calls this after attaching RTLs to reloaded blocks.
    pub fn rebuild_addr_map(&mut self) {
        self.map.clear();
        for i in 0..self.blocks.len() {
            if let Some(addr) = self.blocks[i].head_addr() {
                self.map.entry(addr).or_insert(BbId(i as u32));
            }
        }
    }

    /// Allocates a fresh label number for code generation.
    pub fn next_label(&mut self) -> i32 {
        self.last_label += 1;
        self.last_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::Exp;
    use crate::stmt::Statement;

    fn rtl_at(addr: u32) -> Rtl {
        let mut r = Rtl::new(Addr(addr));
        r.append(Statement::assign(Exp::reg(0), Exp::int(addr as i64)));
        r
    }

    #[test]
    fn add_bb_then_duplicate_head_fails() {
        let mut cfg = Cfg::new();
        cfg.add_bb(vec![rtl_at(0x1000)], BbType::Fall).unwrap();
        let err = cfg.add_bb(vec![rtl_at(0x1000)], BbType::Fall);
        assert!(matches!(err, Err(CoreError::DuplicateBbHead(Addr(0x1000)))));
    }

    #[test]
    fn out_edge_creates_incomplete_placeholder_then_completes() {
        let mut cfg = Cfg::new();
        let a = cfg.add_bb(vec![rtl_at(0x1000)], BbType::OneWay).unwrap();
        let target = cfg.add_out_edge(a, Addr(0x2000)).unwrap();
        assert!(cfg.block(target).unwrap().incomplete);

        // Decoding reaches the target later; the id stays stable.
        let b = cfg.add_bb(vec![rtl_at(0x2000)], BbType::Ret).unwrap();
        assert_eq!(b, target);
        assert!(!cfg.block(b).unwrap().incomplete);
        assert_eq!(cfg.block(b).unwrap().node_type, BbType::Ret);
        assert_eq!(cfg.block(a).unwrap().out_edges.as_slice(), &[target]);
        assert_eq!(cfg.block(target).unwrap().in_edges.as_slice(), &[a]);
    }

    #[test]
    fn split_moves_out_edges_to_lower_half() {
        let mut cfg = Cfg::new();
        let a = cfg
            .add_bb(
                vec![rtl_at(0x1000), rtl_at(0x1004), rtl_at(0x1008)],
                BbType::OneWay,
            )
            .unwrap();
        let t = cfg.add_out_edge(a, Addr(0x2000)).unwrap();

        let lower = cfg.split_bb(Addr(0x1004)).unwrap();
        assert_ne!(lower, a);

        let upper_bb = cfg.block(a).unwrap();
        assert_eq!(upper_bb.rtls.len(), 1);
        assert_eq!(upper_bb.node_type, BbType::Fall);
        assert_eq!(upper_bb.out_edges.as_slice(), &[lower]);

        let lower_bb = cfg.block(lower).unwrap();
        assert_eq!(lower_bb.rtls.len(), 2);
        assert_eq!(lower_bb.node_type, BbType::OneWay);
        assert_eq!(lower_bb.in_edges.as_slice(), &[a]);
        assert_eq!(lower_bb.out_edges.as_slice(), &[t]);

        // The jump-in target's in-edge now names the lower half.
        assert_eq!(cfg.block(t).unwrap().in_edges.as_slice(), &[lower]);
        // Address map points at the lower half.
        assert_eq!(cfg.bb_at(Addr(0x1004)), Some(lower));
    }

    #[test]
    fn split_at_existing_head_is_a_no_op() {
        let mut cfg = Cfg::new();
        let a = cfg.add_bb(vec![rtl_at(0x1000)], BbType::Fall).unwrap();
        assert_eq!(cfg.split_bb(Addr(0x1000)).unwrap(), a);
    }

    #[test]
    fn split_off_boundary_fails() {
        let mut cfg = Cfg::new();
        cfg.add_bb(vec![rtl_at(0x1000)], BbType::Fall).unwrap();
        assert!(matches!(
            cfg.split_bb(Addr(0x1002)),
            Err(CoreError::NoSplitPoint(Addr(0x1002)))
        ));
    }

    #[test]
    fn well_formedness_catches_orphans() {
        let mut cfg = Cfg::new();
        let a = cfg.add_bb(vec![rtl_at(0)], BbType::Fall).unwrap();
        let b = cfg.add_bb(vec![rtl_at(4)], BbType::Ret).unwrap();
        cfg.entry = Some(a);
        // b has no in-edge yet.
        assert!(cfg.check_well_formed().is_err());
        assert!(!cfg.well_formed);
        cfg.add_edge(a, b).unwrap();
        cfg.check_well_formed().unwrap();
        assert!(cfg.well_formed);
    }

    #[test]
    fn dfs_ordering_is_preorder_from_entry() {
        // a -> b -> d, a -> c -> d
        let mut cfg = Cfg::new();
        let a = cfg.add_bb(vec![rtl_at(0)], BbType::TwoWay).unwrap();
        let b = cfg.add_bb(vec![rtl_at(4)], BbType::Fall).unwrap();
        let c = cfg.add_bb(vec![rtl_at(8)], BbType::Fall).unwrap();
        let d = cfg.add_bb(vec![rtl_at(12)], BbType::Ret).unwrap();
        cfg.add_edge(a, b).unwrap();
        cfg.add_edge(a, c).unwrap();
        cfg.add_edge(b, d).unwrap();
        cfg.add_edge(c, d).unwrap();
        cfg.entry = Some(a);
        cfg.exit = Some(d);

        cfg.set_depth_first_order();
        assert_eq!(cfg.ordering, vec![a, b, d, c]);
        assert_eq!(cfg.block(a).unwrap().ord, 0);
        assert_eq!(cfg.block(c).unwrap().ord, 3);

        cfg.set_rev_depth_first_order();
        assert_eq!(cfg.rev_ordering, vec![d, b, a, c]);
    }
}
