//! The packed parse forest.
//!
//! All nodes and subnodes of one parse live in a single arena and reference
//! each other by index, never by pointer. A `Node` is one (symbol, span)
//! equivalence class; its `Sub`s are the alternative ways that span can be
//! derived. Sharing is what makes the forest "packed": a node reached from
//! several parents is stored once and its id reused.
//!
//! A node with no subs is a leaf: the actual words matched from the input.
//! Everything above a leaf is an alternative-bearing packed node.

use crate::grammar::{RuleProps, SymbolId};
use crate::semantic::SemanticSpec;
use crate::text::{PersonNumber, Tense, TextSpec};
use std::rc::Rc;

/// Index of a node in the forest arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Index of a subnode in the forest arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubId(pub(crate) usize);

/// A terminal rule-props form: what the A* search consumes without
/// descending further. Produced by the tokenizer for placeholder matches and
/// by the annotator for everything it flattens.
#[derive(Debug, Clone, Default)]
pub struct FlatProps {
    pub cost: f64,
    pub text: Option<TextSpec>,
    pub tense: Option<Tense>,
    pub person_number: Option<PersonNumber>,
    pub semantic: Option<SemanticSpec>,
}

/// A sub's rule metadata: grammar rule props as attached by the parser, or
/// the flattened terminal form installed by the annotator. `Rules` holds
/// more than one record only between parsing and annotation (insertion
/// alternatives); the annotator materializes extras into sibling subs.
#[derive(Debug, Clone)]
pub enum SubProps {
    Rules(Vec<Rc<RuleProps>>),
    Flat(FlatProps),
}

/// One alternative derivation of a node: a first child, an optional second
/// child for binary rules, and the rule metadata that combined them.
#[derive(Debug)]
pub struct SubData {
    pub node: NodeId,
    pub next: Option<NodeId>,
    pub size: usize,
    pub props: SubProps,
    pub min_cost: Option<f64>,
}

/// One (symbol, span) class of the forest. `start`/`size` are in tokens.
#[derive(Debug)]
pub struct NodeData {
    pub symbol: SymbolId,
    pub start: usize,
    pub size: usize,
    pub subs: Vec<SubId>,
    pub min_cost: Option<f64>,
}

impl NodeData {
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// Leaves carry matched input words and have no alternatives.
    pub fn is_leaf(&self) -> bool {
        self.subs.is_empty()
    }
}

/// The arena owning every node and sub of one parse.
#[derive(Debug, Default)]
pub struct Forest {
    nodes: Vec<NodeData>,
    subs: Vec<SubData>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_leaf(&mut self, symbol: SymbolId, start: usize, size: usize) -> NodeId {
        self.new_node(symbol, start, size)
    }

    pub fn new_node(&mut self, symbol: SymbolId, start: usize, size: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { symbol, start, size, subs: Vec::new(), min_cost: None });
        id
    }

    pub fn new_sub(
        &mut self,
        node: NodeId,
        next: Option<NodeId>,
        size: usize,
        props: SubProps,
    ) -> SubId {
        debug_assert_eq!(
            size,
            self.node(node).size + next.map_or(0, |n| self.node(n).size),
            "sub size must equal the sum of its child spans"
        );
        let id = SubId(self.subs.len());
        self.subs.push(SubData { node, next, size, props, min_cost: None });
        id
    }

    pub fn push_sub(&mut self, node: NodeId, sub: SubId) {
        self.nodes[node.0].subs.push(sub);
    }

    /// The packing test: two subs are the same derivation shape if they
    /// agree on first child, second child, and span.
    pub fn has_equal_sub(&self, node: NodeId, child: NodeId, next: Option<NodeId>, size: usize) -> bool {
        self.nodes[node.0].subs.iter().any(|&s| {
            let sd = &self.subs[s.0];
            sd.node == child && sd.next == next && sd.size == size
        })
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn sub(&self, id: SubId) -> &SubData {
        &self.subs[id.0]
    }

    pub fn sub_mut(&mut self, id: SubId) -> &mut SubData {
        &mut self.subs[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn sub_count(&self) -> usize {
        self.subs.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}
