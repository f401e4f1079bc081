//! Heuristic-cost annotation and term-sequence flattening.
//!
//! A single post-order pass over the packed forest, memoized on
//! `Node::min_cost`. For every sub it resolves the children's minima first,
//! then rewrites the sub's rule props in place:
//!
//! - a sub over a bare word leaf becomes the terminal form of its one
//!   terminal rule
//! - `rhs_does_not_produce_text` subs (pass-through substitutions, stop
//!   words) become a terminal form carrying the rule's own text and
//!   semantics, hiding their descendants from the search
//! - term sequences collapse their purely lexical subtree into one terminal
//!   form: merged display text (or the rule's substitute text), the
//!   descendant tense, the cumulative cost
//! - insertion alternatives materialize into sibling subs, one per
//!   alternative, so the search only ever sees single-rule subs
//!
//! After a node's subs are resolved they are sorted by ascending `min_cost`
//! and the node records the minimum. Because no symbol derives itself
//! through unary non-insertion reductions (enforced at grammar load), the
//! recursion cannot revisit a node whose cost is still unresolved.

use crate::forest::{FlatProps, Forest, NodeId, SubId, SubProps};
use crate::grammar::{Grammar, RuleProps, SymbolId};
use crate::semantic::SemanticSpec;
use crate::text::{Tense, TextSpec};
use log::trace;
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;

/// A forest shape the grammar promises cannot occur. Indicates a grammar
/// bug; the parse fails with an internal error rather than a user message.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub symbol: SmolStr,
    pub detail: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invariant violation at {}: {}", self.symbol, self.detail)
    }
}

fn violation(grammar: &Grammar, symbol: SymbolId, detail: &str) -> InvariantViolation {
    InvariantViolation {
        symbol: SmolStr::new(grammar.name(symbol)),
        detail: detail.to_string(),
    }
}

/// Annotate the forest rooted at `start`. Idempotent: a second run finds the
/// root memoized and returns immediately.
pub fn annotate(
    forest: &mut Forest,
    grammar: &Grammar,
    start: NodeId,
) -> Result<(), InvariantViolation> {
    annotate_node(forest, grammar, start).map(|_| ())
}

fn annotate_node(
    forest: &mut Forest,
    grammar: &Grammar,
    nid: NodeId,
) -> Result<f64, InvariantViolation> {
    if let Some(mc) = forest.node(nid).min_cost {
        return Ok(mc);
    }
    if forest.node(nid).is_leaf() {
        forest.node_mut(nid).min_cost = Some(0.0);
        return Ok(0.0);
    }

    let symbol = forest.node(nid).symbol;
    let sub_ids = forest.node(nid).subs.clone();
    let mut resolved: Vec<SubId> = Vec::with_capacity(sub_ids.len());

    for sid in sub_ids {
        let (child, next, size) = {
            let s = forest.sub(sid);
            (s.node, s.next, s.size)
        };
        let mut base = annotate_node(forest, grammar, child)?;
        if let Some(second) = next {
            base += annotate_node(forest, grammar, second)?;
        }

        match forest.sub(sid).props.clone() {
            SubProps::Flat(f) => {
                // placeholder matches arrive pre-flattened from the tokenizer
                forest.sub_mut(sid).min_cost = Some(f.cost + base);
                resolved.push(sid);
            }
            SubProps::Rules(list) => {
                for (idx, props) in list.iter().enumerate() {
                    let target = if idx == 0 {
                        sid
                    } else {
                        // materialize each insertion alternative as its own sub
                        let alt = forest.new_sub(
                            child,
                            next,
                            size,
                            SubProps::Rules(vec![Rc::clone(props)]),
                        );
                        alt
                    };
                    resolve_sub(forest, grammar, symbol, target, props, base)?;
                    resolved.push(target);
                }
            }
        }
    }

    let mut min = f64::INFINITY;
    for &s in &resolved {
        min = min.min(forest.sub(s).min_cost.unwrap_or(f64::INFINITY));
    }
    resolved.sort_by(|a, b| {
        let ca = forest.sub(*a).min_cost.unwrap_or(f64::INFINITY);
        let cb = forest.sub(*b).min_cost.unwrap_or(f64::INFINITY);
        ca.total_cmp(&cb)
    });
    let node = forest.node_mut(nid);
    node.subs = resolved;
    node.min_cost = Some(min);
    trace!("annotated {} min={min}", grammar.name(symbol));
    Ok(min)
}

fn resolve_sub(
    forest: &mut Forest,
    grammar: &Grammar,
    parent: SymbolId,
    sid: SubId,
    props: &Rc<RuleProps>,
    base: f64,
) -> Result<(), InvariantViolation> {
    let (child, next) = {
        let s = forest.sub(sid);
        (s.node, s.next)
    };
    let total = props.cost + base;

    // a sub over a bare word leaf is a matched terminal rule
    if forest.node(child).is_leaf() && next.is_none() {
        install_flat(
            forest,
            sid,
            FlatProps {
                cost: total,
                text: props.text.clone(),
                tense: props.tense,
                person_number: props.person_number,
                semantic: props.semantic.clone(),
            },
        );
        return Ok(());
    }

    if props.rhs_does_not_produce_text {
        // pass-through: the rule's own text and semantics stand in for the
        // whole subtree; only the descendant tense leaks through so a parent
        // accepted_tense still works
        let tense = descendant_tense(forest, child)
            .or_else(|| next.and_then(|n| descendant_tense(forest, n)));
        install_flat(
            forest,
            sid,
            FlatProps {
                cost: total,
                text: props.text.clone(),
                tense,
                person_number: props.person_number,
                semantic: props.semantic.clone(),
            },
        );
        return Ok(());
    }

    if props.is_term_sequence {
        let flat = flatten_term_sequence(forest, grammar, parent, child, next, props, total)?;
        install_flat(forest, sid, flat);
        return Ok(());
    }

    forest.sub_mut(sid).props = SubProps::Rules(vec![Rc::clone(props)]);
    forest.sub_mut(sid).min_cost = Some(total);
    Ok(())
}

fn install_flat(forest: &mut Forest, sid: SubId, flat: FlatProps) {
    let cost = flat.cost;
    let sub = forest.sub_mut(sid);
    sub.props = SubProps::Flat(flat);
    sub.min_cost = Some(cost);
}

fn flatten_term_sequence(
    forest: &Forest,
    grammar: &Grammar,
    parent: SymbolId,
    child: NodeId,
    next: Option<NodeId>,
    props: &RuleProps,
    total: f64,
) -> Result<FlatProps, InvariantViolation> {
    if let Some(idx) = props.inserted_symbol_index {
        if next.is_some() {
            return Err(violation(grammar, parent, "binary insertion"));
        }
        let matched = child_flat(forest, grammar, parent, child)?;
        let text = if idx == 0 {
            TextSpec::concat(props.text.as_ref(), matched.text.as_ref())
        } else {
            TextSpec::concat(matched.text.as_ref(), props.text.as_ref())
        };
        let semantic =
            single_semantic(grammar, parent, [props.semantic.clone(), matched.semantic])?;
        return Ok(FlatProps {
            cost: total,
            text,
            tense: matched.tense,
            person_number: props.person_number.or(matched.person_number),
            semantic,
        });
    }

    let left = child_flat(forest, grammar, parent, child)?;
    let right = match next {
        Some(n) => Some(child_flat(forest, grammar, parent, n)?),
        None => None,
    };
    let right_tense = right.as_ref().and_then(|f| f.tense);
    let tense = match (left.tense, right_tense) {
        (Some(_), Some(_)) => {
            return Err(violation(grammar, parent, "term sequence with two verbs"))
        }
        (a, b) => a.or(b),
    };
    let right_text = right.as_ref().and_then(|f| f.text.clone());
    let text = if props.text.is_some() {
        // substitution: the rule's text replaces whatever was matched
        props.text.clone()
    } else {
        TextSpec::concat(left.text.as_ref(), right_text.as_ref())
    };
    let semantic = single_semantic(
        grammar,
        parent,
        [
            props.semantic.clone(),
            left.semantic.clone(),
            right.as_ref().and_then(|f| f.semantic.clone()),
        ],
    )?;
    let person_number = props
        .person_number
        .or(left.person_number)
        .or(right.as_ref().and_then(|f| f.person_number));
    Ok(FlatProps { cost: total, text, tense, person_number, semantic })
}

/// The terminal form of a term-sequence descendant. The descendant may pack
/// several alternatives only when every one of them pays for at least one
/// deleted token. Deletions cost 1 apiece and cannot fit in a single-token
/// span, so a span of 1 — or a cheapest alternative below the one-deletion
/// cost — means some alternative matched the span outright and the
/// ambiguity comes from near-duplicate rules, not from deletion.
fn child_flat(
    forest: &Forest,
    grammar: &Grammar,
    parent: SymbolId,
    node: NodeId,
) -> Result<FlatProps, InvariantViolation> {
    let nd = forest.node(node);
    if nd.is_leaf() {
        return Err(violation(grammar, parent, "bare word under a term sequence"));
    }
    if nd.subs.len() > 1 {
        // legal iff deletion-only: min >= 1 guarantees no alternative
        // matched the span without deleting
        let min = nd.min_cost.unwrap_or(0.0);
        if nd.size == 1 || min < 1.0 {
            return Err(violation(
                grammar,
                parent,
                "ambiguous term sequence not caused by deletion",
            ));
        }
    }
    // subs are sorted by min_cost by the time a parent looks down
    let cheapest = nd.subs[0];
    match &forest.sub(cheapest).props {
        SubProps::Flat(f) => Ok(f.clone()),
        SubProps::Rules(_) => Err(violation(
            grammar,
            parent,
            "term sequence over a non-terminal descendant",
        )),
    }
}

fn descendant_tense(forest: &Forest, node: NodeId) -> Option<Tense> {
    let nd = forest.node(node);
    let cheapest = nd.subs.first()?;
    match &forest.sub(*cheapest).props {
        SubProps::Flat(f) => f.tense,
        SubProps::Rules(_) => None,
    }
}

fn single_semantic<I>(
    grammar: &Grammar,
    parent: SymbolId,
    candidates: I,
) -> Result<Option<SemanticSpec>, InvariantViolation>
where
    I: IntoIterator<Item = Option<SemanticSpec>>,
{
    let mut found: Option<SemanticSpec> = None;
    for candidate in candidates.into_iter().flatten() {
        if found.is_some() {
            return Err(violation(grammar, parent, "term sequence with multiple semantics"));
        }
        found = Some(candidate);
    }
    Ok(found)
}
