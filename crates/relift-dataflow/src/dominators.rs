//! Immediate dominators and dominance frontiers.
//!
//! The immediate-dominator computation mirrors the CFG into a petgraph
//! `DiGraph` (node index i is block id i) and runs
//! `petgraph::algo::dominators::simple_fast` from the entry. Dominance
//! frontiers come from the usual two-pointer walk up the dominator tree at
//! every join point.

use std::collections::BTreeSet;

use petgraph::graph::{DiGraph, NodeIndex};

use relift_core::{BbId, Cfg};

/// The dominator tree plus per-block dominance frontiers.
#[derive(Debug, Clone)]
pub struct DomTree {
    /// Immediate dominator per block; `None` for the entry and for
    /// unreachable blocks.
    pub idom: Vec<Option<BbId>>,
    /// Dominator-tree children per block, in block-id order.
    pub children: Vec<Vec<BbId>>,
    /// Dominance frontier per block.
    pub frontier: Vec<BTreeSet<BbId>>,
}

impl DomTree {
    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: BbId, b: BbId) -> bool {
        let mut cur = Some(b);
        while let Some(c) = cur {
            if c == a {
                return true;
            }
            cur = self.idom[c.0 as usize];
        }
        false
    }
}

/// Computes dominators for `cfg`. A CFG with no entry yields `None`; the
/// caller treats that as a no-op.
pub fn compute_dominators(cfg: &Cfg) -> Option<DomTree> {
    let entry = cfg.entry?;
    let n = cfg.num_blocks();

    let mut graph = DiGraph::<BbId, ()>::with_capacity(n, n * 2);
    for id in cfg.block_ids() {
        graph.add_node(id);
    }
    for (id, bb) in cfg.blocks() {
        for out in &bb.out_edges {
            graph.add_edge(
                NodeIndex::new(id.0 as usize),
                NodeIndex::new(out.0 as usize),
                (),
            );
        }
    }

    let doms = petgraph::algo::dominators::simple_fast(&graph, NodeIndex::new(entry.0 as usize));

    let mut idom: Vec<Option<BbId>> = vec![None; n];
    for id in cfg.block_ids() {
        if id == entry {
            continue;
        }
        if let Some(d) = doms.immediate_dominator(NodeIndex::new(id.0 as usize)) {
            idom[id.0 as usize] = Some(BbId(d.index() as u32));
        }
    }

    let mut children: Vec<Vec<BbId>> = vec![Vec::new(); n];
    for (i, d) in idom.iter().enumerate() {
        if let Some(d) = d {
            children[d.0 as usize].push(BbId(i as u32));
        }
    }

    // Dominance frontiers: at every join, walk each predecessor up the
    // dominator tree until the join's idom.
    let mut frontier: Vec<BTreeSet<BbId>> = vec![BTreeSet::new(); n];
    for (id, bb) in cfg.blocks() {
        if bb.in_edges.len() < 2 {
            continue;
        }
        let Some(b_idom) = idom[id.0 as usize] else {
            continue;
        };
        for pred in &bb.in_edges {
            // Skip predecessors unreachable from the entry.
            if *pred != entry && idom[pred.0 as usize].is_none() {
                continue;
            }
            let mut runner = *pred;
            while runner != b_idom {
                frontier[runner.0 as usize].insert(id);
                match idom[runner.0 as usize] {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }

    Some(DomTree {
        idom,
        children,
        frontier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relift_core::{Addr, BbType, Exp, Rtl, Statement};

    /// Builds the classic diamond: entry -> b, entry -> c, b -> join,
    /// c -> join.
    fn diamond() -> (Cfg, BbId, BbId, BbId, BbId) {
        let mut cfg = Cfg::new();
        let mk = |addr: u32| {
            let mut r = Rtl::new(Addr(addr));
            r.append(Statement::assign(Exp::reg(0), Exp::int(0)));
            vec![r]
        };
        let a = cfg.add_bb(mk(0), BbType::TwoWay).unwrap();
        let b = cfg.add_bb(mk(4), BbType::Fall).unwrap();
        let c = cfg.add_bb(mk(8), BbType::Fall).unwrap();
        let d = cfg.add_bb(mk(12), BbType::Ret).unwrap();
        cfg.add_edge(a, b).unwrap();
        cfg.add_edge(a, c).unwrap();
        cfg.add_edge(b, d).unwrap();
        cfg.add_edge(c, d).unwrap();
        cfg.entry = Some(a);
        cfg.exit = Some(d);
        (cfg, a, b, c, d)
    }

    #[test]
    fn no_entry_is_a_no_op() {
        let cfg = Cfg::new();
        assert!(compute_dominators(&cfg).is_none());
    }

    #[test]
    fn diamond_idoms() {
        let (cfg, a, b, c, d) = diamond();
        let dom = compute_dominators(&cfg).unwrap();
        assert_eq!(dom.idom[a.0 as usize], None);
        assert_eq!(dom.idom[b.0 as usize], Some(a));
        assert_eq!(dom.idom[c.0 as usize], Some(a));
        // The join is dominated by the branch head, not by either arm.
        assert_eq!(dom.idom[d.0 as usize], Some(a));
    }

    #[test]
    fn diamond_frontiers() {
        let (cfg, a, b, c, d) = diamond();
        let dom = compute_dominators(&cfg).unwrap();
        assert!(dom.frontier[b.0 as usize].contains(&d));
        assert!(dom.frontier[c.0 as usize].contains(&d));
        assert!(dom.frontier[a.0 as usize].is_empty());
        assert!(dom.frontier[d.0 as usize].is_empty());
    }

    #[test]
    fn dominates_is_reflexive_and_follows_tree() {
        let (cfg, a, b, _c, d) = diamond();
        let dom = compute_dominators(&cfg).unwrap();
        assert!(dom.dominates(a, d));
        assert!(dom.dominates(b, b));
        assert!(!dom.dominates(b, d));
        assert!(!dom.dominates(d, a));
    }

    proptest::proptest! {
        /// On a straight-line chain every block's immediate dominator is
        /// its predecessor, and all frontiers are empty.
        #[test]
        fn chain_idoms_follow_the_chain(len in 2usize..12) {
            let mut cfg = Cfg::new();
            let mut prev = None;
            for i in 0..len {
                let b = cfg
                    .add_bb(vec![Rtl::new(Addr((i * 4) as u32))], BbType::Fall)
                    .unwrap();
                if let Some(p) = prev {
                    cfg.add_edge(p, b).unwrap();
                }
                if i == 0 {
                    cfg.entry = Some(b);
                }
                prev = Some(b);
            }
            let dom = compute_dominators(&cfg).unwrap();
            for i in 1..len {
                proptest::prop_assert_eq!(dom.idom[i], Some(BbId((i - 1) as u32)));
                proptest::prop_assert!(dom.frontier[i].is_empty());
            }
        }
    }

    #[test]
    fn loop_frontier_includes_header() {
        // a -> b -> c -> b (back edge), c -> d
        let mut cfg = Cfg::new();
        let mk = |addr: u32| vec![Rtl::new(Addr(addr))];
        let a = cfg.add_bb(mk(0), BbType::Fall).unwrap();
        let b = cfg.add_bb(mk(4), BbType::Fall).unwrap();
        let c = cfg.add_bb(mk(8), BbType::TwoWay).unwrap();
        let d = cfg.add_bb(mk(12), BbType::Ret).unwrap();
        cfg.add_edge(a, b).unwrap();
        cfg.add_edge(b, c).unwrap();
        cfg.add_edge(c, b).unwrap();
        cfg.add_edge(c, d).unwrap();
        cfg.entry = Some(a);
        let dom = compute_dominators(&cfg).unwrap();
        // The back edge puts the header in its own body's frontier.
        assert!(dom.frontier[c.0 as usize].contains(&b));
    }
}
