//! Tokenization and terminal matching.
//!
//! The query is lowercased and whitespace-split; a sliding n-gram is then
//! extended from every start index and matched three ways:
//!
//! - against the entity table (multi-token aliases resolving to a category
//!   placeholder with canonical display text and an entity-id argument)
//! - as an integer, against the integer placeholder ranges (single tokens
//!   only; the range list is sorted so the scan can stop early)
//! - against literal terminal rules of the word symbol named by the n-gram
//!
//! Matches are indexed by *end* position, which is how the parser wants
//! them: when its loop reaches boundary `p` it shifts every node ending
//! there from the vertices at the node's start.
//!
//! Deletable tokens expand matches. A maximal run of deletable positions
//! immediately before a match reattaches as enlarged copies of the match
//! (one per deletion depth, cost 1 each). A run reaching end-of-input
//! attaches forward: every node ending at or inside the run widens to cover
//! the rest of the input, since nothing else could ever cover those
//! trailing tokens. Nodes end inside the run when a run token doubles as a
//! matched terminal, and throughout the all-deletable retry.

use crate::forest::{FlatProps, Forest, NodeId, SubProps};
use crate::grammar::{Grammar, SymbolId};
use crate::semantic::{Semantic, SemanticSpec};
use crate::text::TextSpec;
use log::{debug, trace};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::rc::Rc;

/// All terminal nodes sharing one (start, end) span.
#[derive(Debug, Clone)]
pub struct TerminalMatch {
    pub start: usize,
    pub nodes: Vec<NodeId>,
}

/// The tokenizer's output: the token list and the matches grouped by end
/// position (`ends[p]` holds every match whose span ends at boundary `p`).
#[derive(Debug)]
pub struct TokenMatches {
    pub tokens: Vec<SmolStr>,
    pub ends: Vec<Vec<TerminalMatch>>,
}

impl TokenMatches {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Match every terminal of `query` against the grammar, creating the leaf
/// and terminal-category nodes of the forest. With `force_deletable` every
/// position is treated as deletable (the driver's no-parse retry).
pub fn match_terminals(
    grammar: &Grammar,
    forest: &mut Forest,
    query: &str,
    force_deletable: bool,
) -> TokenMatches {
    let tokens: Vec<SmolStr> =
        query.to_lowercase().split_whitespace().map(SmolStr::new).collect();
    let n = tokens.len();
    let deletable: Vec<bool> = tokens
        .iter()
        .map(|t| force_deletable || grammar.is_deletable(t))
        .collect();
    let mut ends: Vec<Vec<TerminalMatch>> = (0..=n).map(|_| Vec::new()).collect();

    // semantic arguments are memoized per name within one parse
    let mut arg_memo: HashMap<SmolStr, Semantic> = HashMap::new();
    let mut memo_arg = move |name: &SmolStr| -> Semantic {
        arg_memo.entry(name.clone()).or_insert_with(|| Semantic::Arg(name.clone())).clone()
    };

    for i in 0..n {
        let limit = n.min(i + grammar.max_ngram_len());
        let mut ngram = String::new();
        for j in i..limit {
            if j > i {
                ngram.push(' ');
            }
            ngram.push_str(&tokens[j]);
            let end = j + 1;
            let size = end - i;

            // nodes for this exact span, packed per category symbol
            let mut span_nodes = HashMap::new();
            let mut order: Vec<NodeId> = Vec::new();

            if let Some(entity_matches) = grammar.entities().get_vec(ngram.as_str()) {
                for ent in entity_matches {
                    trace!("entity '{}' -> {} @ {}..{}", ngram, ent.id, i, end);
                    let flat = FlatProps {
                        cost: 0.0,
                        text: Some(TextSpec::literal(&ent.text)),
                        semantic: Some(SemanticSpec::Reduced(memo_arg(&ent.id))),
                        ..Default::default()
                    };
                    emit_flat(forest, &mut span_nodes, &mut order, ent.category, i, size, flat);
                }
            }

            if j == i {
                if let Ok(value) = tokens[i].parse::<i64>() {
                    for entry in grammar.int_symbols() {
                        if value < entry.min {
                            break;
                        }
                        if value > entry.max {
                            continue;
                        }
                        trace!(
                            "integer {} in [{}..={}] @ {}",
                            value,
                            entry.min,
                            entry.max,
                            i
                        );
                        let name = SmolStr::new(value.to_string());
                        let flat = FlatProps {
                            cost: 0.0,
                            text: Some(TextSpec::literal(&name)),
                            semantic: Some(SemanticSpec::Reduced(memo_arg(&name))),
                            ..Default::default()
                        };
                        emit_flat(forest, &mut span_nodes, &mut order, entry.symbol, i, size, flat);
                    }
                }
            }

            if let Some(sym_id) = grammar.lookup(&ngram) {
                let sym = grammar.symbol(sym_id);
                if sym.is_terminal && !sym.is_placeholder && !sym.terminal_rules.is_empty() {
                    let rules = sym.terminal_rules.clone();
                    let leaf = forest.new_leaf(sym_id, i, size);
                    for tr in &rules {
                        let node = *span_nodes.entry(tr.lhs).or_insert_with(|| {
                            let nid = forest.new_node(tr.lhs, i, size);
                            order.push(nid);
                            nid
                        });
                        let sid = forest.new_sub(
                            leaf,
                            None,
                            size,
                            SubProps::Rules(vec![Rc::clone(&tr.props)]),
                        );
                        forest.push_sub(node, sid);
                    }
                }
            }

            if order.is_empty() {
                continue;
            }

            // backward deletion expansion over the run preceding the span
            let mut run = 0;
            while run < i && deletable[i - 1 - run] {
                run += 1;
            }
            let mut expanded: Vec<TerminalMatch> = Vec::new();
            for d in 1..=run {
                let nodes = order
                    .iter()
                    .map(|&nid| clone_with_deletions(forest, nid, d, i - d, size + d))
                    .collect();
                expanded.push(TerminalMatch { start: i - d, nodes });
            }
            ends[end].push(TerminalMatch { start: i, nodes: order });
            ends[end].extend(expanded);
        }
    }

    // a deletable run reaching end-of-input attaches forward: any node
    // ending at or inside the run widens to cover the rest of the input
    let mut t = n;
    while t > 0 && deletable[t - 1] {
        t -= 1;
    }
    if t < n {
        for q in t.max(1)..n {
            let extra = n - q;
            let at_boundary = ends[q].clone();
            for tm in at_boundary {
                let nodes = tm
                    .nodes
                    .iter()
                    .map(|&nid| {
                        let size = forest.node(nid).size;
                        clone_with_deletions(forest, nid, extra, tm.start, size + extra)
                    })
                    .collect();
                ends[n].push(TerminalMatch { start: tm.start, nodes });
            }
        }
    }

    debug!(
        "matched {} token(s), {} terminal node(s)",
        n,
        ends.iter().flatten().map(|tm| tm.nodes.len()).sum::<usize>()
    );
    TokenMatches { tokens, ends }
}

fn emit_flat(
    forest: &mut Forest,
    span_nodes: &mut HashMap<SymbolId, NodeId>,
    order: &mut Vec<NodeId>,
    category: SymbolId,
    start: usize,
    size: usize,
    flat: FlatProps,
) {
    let leaf = forest.new_leaf(category, start, size);
    let node = *span_nodes.entry(category).or_insert_with(|| {
        let nid = forest.new_node(category, start, size);
        order.push(nid);
        nid
    });
    let sid = forest.new_sub(leaf, None, size, SubProps::Flat(flat));
    forest.push_sub(node, sid);
}

/// Copy a terminal node with `extra` deleted tokens folded into its span and
/// cost. The copy shares nothing with the original; its subs are rebuilt
/// over a fresh leaf covering the widened span.
fn clone_with_deletions(
    forest: &mut Forest,
    nid: NodeId,
    extra: usize,
    new_start: usize,
    new_size: usize,
) -> NodeId {
    let (symbol, subs) = {
        let nd = forest.node(nid);
        (nd.symbol, nd.subs.clone())
    };
    let new_node = forest.new_node(symbol, new_start, new_size);
    for sid in subs {
        let (leaf_symbol, props) = {
            let sd = forest.sub(sid);
            (forest.node(sd.node).symbol, sd.props.clone())
        };
        let props = match props {
            SubProps::Flat(mut f) => {
                f.cost += extra as f64;
                SubProps::Flat(f)
            }
            SubProps::Rules(list) => SubProps::Rules(
                list.iter()
                    .map(|p| {
                        let mut widened = (**p).clone();
                        widened.cost += extra as f64;
                        Rc::new(widened)
                    })
                    .collect(),
            ),
        };
        let leaf = forest.new_leaf(leaf_symbol, new_start, new_size);
        let new_sid = forest.new_sub(leaf, None, new_size, props);
        forest.push_sub(new_node, new_sid);
    }
    new_node
}
