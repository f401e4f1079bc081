//! The GLR chart parser.
//!
//! The parser runs the grammar's shift/reduce table over the terminal
//! matches, maintaining a graph-structured stack: a `Vertex` is one
//! (state, boundary) point, a `Znode` is an edge carrying a forest node into
//! a vertex from its predecessor vertices. Reductions attach to the state a
//! node was shifted into; applying one walks back over the predecessor
//! vertices (two levels for binary rules) and packs the resulting subnode
//! into the forest through the per-boundary node table.
//!
//! The pending-reduction queue is FIFO within a boundary and is fully
//! drained before the loop advances, so a reduction discovered late at a
//! boundary still sees every edge an earlier one created there.

use crate::forest::{Forest, NodeId, SubProps};
use crate::grammar::{Grammar, RuleProps, StateId, SymbolId};
use crate::tokenizer::TokenMatches;
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VertId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ZnodeId(usize);

/// A point of the graph-structured stack: one state at one token boundary.
#[derive(Debug)]
struct Vertex {
    state: StateId,
    znodes: Vec<ZnodeId>,
}

/// An edge into a vertex: the forest node that was shifted and the vertices
/// it was shifted from.
#[derive(Debug)]
struct Znode {
    node: NodeId,
    verts: Vec<VertId>,
}

/// A reduction waiting to run: the znode it applies to and which reduction
/// of which state it is.
#[derive(Debug, Clone, Copy)]
struct PendingRed {
    znode: ZnodeId,
    state: StateId,
    red: usize,
}

/// GLR parser over a loaded grammar. The vertex and znode tables survive the
/// run so the driver can render the `parseStack` dump.
#[derive(Debug)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    verts: Vec<Vertex>,
    znodes: Vec<Znode>,
    vert_tab: Vec<Vec<VertId>>,
    node_tab: Vec<HashMap<(SymbolId, usize), NodeId>>,
    reds: VecDeque<PendingRed>,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            verts: Vec::new(),
            znodes: Vec::new(),
            vert_tab: Vec::new(),
            node_tab: Vec::new(),
            reds: VecDeque::new(),
        }
    }

    /// Build the packed forest for the matched terminals and return its
    /// start node, or `None` when no derivation reaches the accept state.
    pub fn parse(&mut self, forest: &mut Forest, matches: &TokenMatches) -> Option<NodeId> {
        let n = matches.token_count();
        if n == 0 {
            return None;
        }
        self.verts.clear();
        self.znodes.clear();
        self.reds.clear();
        self.vert_tab = (0..=n).map(|_| Vec::new()).collect();
        self.node_tab = (0..=n).map(|_| HashMap::new()).collect();

        // seed with the initial state
        self.vertex_at(StateId(0), 0);

        for p in 1..=n {
            for tm in &matches.ends[p] {
                for &emitted in &tm.nodes {
                    let node = self.pack_terminal(forest, emitted, p);
                    let preds = self.vert_tab[tm.start].clone();
                    for pv in preds {
                        self.add_node(forest, node, pv, p);
                    }
                }
            }
            while let Some(pending) = self.reds.pop_front() {
                self.reduce(forest, pending);
            }
            trace!(
                "boundary {p}: {} vertices, {} nodes",
                self.vert_tab[p].len(),
                self.node_tab[p].len()
            );
        }

        // acceptance: a vertex in an accept state holding a node that spans
        // the whole input
        for &v in &self.vert_tab[n] {
            if !self.grammar.state(self.verts[v.0].state).is_accept {
                continue;
            }
            for &z in &self.verts[v.0].znodes {
                let node = self.znodes[z.0].node;
                let nd = forest.node(node);
                if nd.start == 0 && nd.size == n {
                    debug!("accepted: {} spanning 0..{n}", self.grammar.name(nd.symbol));
                    return Some(node);
                }
            }
        }
        debug!("no accept state reached at boundary {n}");
        None
    }

    /// Terminal nodes enter the same per-boundary packing table reductions
    /// use, so a reduced node with the same (symbol, span) merges with them
    /// instead of duplicating.
    fn pack_terminal(&mut self, forest: &mut Forest, emitted: NodeId, end: usize) -> NodeId {
        let (symbol, size) = {
            let nd = forest.node(emitted);
            (nd.symbol, nd.size)
        };
        match self.node_tab[end].get(&(symbol, size)) {
            Some(&existing) if existing != emitted => {
                let subs = forest.node(emitted).subs.clone();
                for sid in subs {
                    let (child, next, ssize) = {
                        let sd = forest.sub(sid);
                        (sd.node, sd.next, sd.size)
                    };
                    if !forest.has_equal_sub(existing, child, next, ssize) {
                        forest.push_sub(existing, sid);
                    }
                }
                existing
            }
            Some(_) => emitted,
            None => {
                self.node_tab[end].insert((symbol, size), emitted);
                emitted
            }
        }
    }

    /// Shift `node` from `old_vert`. Creates or extends the destination
    /// vertex and znode; a fresh znode queues every reduction of the state
    /// it lands in.
    fn add_node(&mut self, forest: &Forest, node: NodeId, old_vert: VertId, end: usize) {
        let g = self.grammar;
        let symbol = forest.node(node).symbol;
        let Some(next_state) = g.shift(self.verts[old_vert.0].state, symbol) else {
            return;
        };
        let v = self.vertex_at(next_state, end);

        if let Some(&z) = self.verts[v.0]
            .znodes
            .iter()
            .find(|&&z| self.znodes[z.0].node == node)
        {
            let preds = &mut self.znodes[z.0].verts;
            if !preds.contains(&old_vert) {
                preds.push(old_vert);
            }
            return;
        }

        let z = ZnodeId(self.znodes.len());
        self.znodes.push(Znode { node, verts: vec![old_vert] });
        self.verts[v.0].znodes.push(z);
        let red_count = g.state(next_state).reductions.len();
        for red in 0..red_count {
            self.reds.push_back(PendingRed { znode: z, state: next_state, red });
        }
        trace!(
            "shift {} -> state {:?} at boundary {end} ({red_count} reductions queued)",
            g.name(symbol),
            next_state
        );
    }

    fn reduce(&mut self, forest: &mut Forest, pending: PendingRed) {
        let g = self.grammar;
        let red = &g.state(pending.state).reductions[pending.red];
        let right = self.znodes[pending.znode.0].node;
        let (rstart, rsize) = {
            let nd = forest.node(right);
            (nd.start, nd.size)
        };

        if !red.is_binary {
            let node = self.add_sub(forest, red.lhs, right, None, rsize, rstart, &red.props);
            let preds = self.znodes[pending.znode.0].verts.clone();
            for v in preds {
                self.add_node(forest, node, v, rstart + rsize);
            }
            return;
        }

        // binary: each predecessor vertex holds the candidate left siblings
        let preds = self.znodes[pending.znode.0].verts.clone();
        for v1 in preds {
            let lefts = self.verts[v1.0].znodes.clone();
            for z2 in lefts {
                let left = self.znodes[z2.0].node;
                let (lstart, lsize) = {
                    let nd = forest.node(left);
                    (nd.start, nd.size)
                };
                let total = lsize + rsize;
                // a transposition swaps the display order of the children
                // while the observed span stays put
                let (first, second) = if red.is_transposition {
                    (right, left)
                } else {
                    (left, right)
                };
                let node = self.add_sub(
                    forest,
                    red.lhs,
                    first,
                    Some(second),
                    total,
                    lstart,
                    &red.props,
                );
                let grand_preds = self.znodes[z2.0].verts.clone();
                for v2 in grand_preds {
                    self.add_node(forest, node, v2, lstart + total);
                }
            }
        }
    }

    /// The packing step: find or create the node for (lhs, span) at the
    /// sub's end boundary and attach the sub unless an equal one is present.
    fn add_sub(
        &mut self,
        forest: &mut Forest,
        lhs: SymbolId,
        child: NodeId,
        next: Option<NodeId>,
        size: usize,
        start: usize,
        props: &[Rc<RuleProps>],
    ) -> NodeId {
        let end = start + size;
        let node = match self.node_tab[end].get(&(lhs, size)) {
            Some(&existing) => existing,
            None => {
                let nid = forest.new_node(lhs, start, size);
                self.node_tab[end].insert((lhs, size), nid);
                nid
            }
        };
        if !forest.has_equal_sub(node, child, next, size) {
            let sid = forest.new_sub(child, next, size, SubProps::Rules(props.to_vec()));
            forest.push_sub(node, sid);
            trace!(
                "reduce -> {} {}..{} (sub count {})",
                self.grammar.name(lhs),
                start,
                end,
                forest.node(node).subs.len()
            );
        }
        node
    }

    fn vertex_at(&mut self, state: StateId, boundary: usize) -> VertId {
        if let Some(&v) = self.vert_tab[boundary]
            .iter()
            .find(|&&v| self.verts[v.0].state == state)
        {
            return v;
        }
        let v = VertId(self.verts.len());
        self.verts.push(Vertex { state, znodes: Vec::new() });
        self.vert_tab[boundary].push(v);
        v
    }

    /// Render the graph-structured stack for the `parseStack` dump.
    pub fn format_stack(&self, forest: &Forest) -> String {
        let mut b = string_builder::Builder::default();
        for (boundary, vert_ids) in self.vert_tab.iter().enumerate() {
            if vert_ids.is_empty() {
                continue;
            }
            b.append(format!("boundary {boundary}\n"));
            for &v in vert_ids {
                let vertex = &self.verts[v.0];
                b.append(format!("  vertex state={}", vertex.state.0));
                if self.grammar.state(vertex.state).is_accept {
                    b.append(" (accept)");
                }
                b.append("\n");
                for &z in &vertex.znodes {
                    let zn = &self.znodes[z.0];
                    let nd = forest.node(zn.node);
                    b.append(format!(
                        "    <- {} {}..{} from {} vertex(es)\n",
                        self.grammar.name(nd.symbol),
                        nd.start,
                        nd.end(),
                        zn.verts.len()
                    ));
                }
            }
        }
        b.string().unwrap_or_default()
    }
}
