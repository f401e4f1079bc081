//! A* k-best enumeration over the annotated forest (`pfsearch`).
//!
//! A partial parse is a `Path`: a frontier stack of work items, a stack of
//! conjugation contexts, a stack of open semantic scopes, the text rendered
//! so far, and the cost accumulated so far. Paths live in a min-priority
//! queue keyed by `cost + remaining`, where `remaining` sums the `min_cost`
//! of every node still on the frontier — the admissible heuristic the
//! annotator prepared. The first k unique completions popped off the queue
//! are therefore the k cheapest parses, in non-decreasing cost order.
//!
//! All four per-path stacks are cactus stacks: a successor shares its
//! parent's spine and only the changed top is new.
//!
//! Expanding the frontier's top node forks one successor per alternative
//! sub. A flattened sub renders its text through the current conjugation
//! contexts and merges its semantics immediately; a rule sub pushes its
//! children plus closing markers (`PopConj`, `Reduce`) and any insertion
//! text. Markers are processed eagerly; a `Reduce` whose scope closes into a
//! contradictory semantic kills the path on the spot.

use crate::forest::{FlatProps, Forest, NodeId, SubId, SubProps};
use crate::semantic::{self, Semantic, SemanticFunc, SemanticSpec};
use crate::text::{conjugate, ConjContext, PersonNumber, Tense, TextPart, TextSpec};
use cactus::Cactus;
use log::{debug, trace};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;
use std::time::Instant;

/// One emitted parse: rendered display text, the reduced semantic trees,
/// the exact cost, and the derivation trail (chosen subs in pre-order) for
/// tree rendering.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub text: String,
    pub semantics: Vec<Semantic>,
    pub cost: f64,
    pub trail: Vec<(NodeId, SubId)>,
}

/// Everything the enumeration produced, plus whether it was cut short by
/// the deadline.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
enum Frontier {
    /// Expand this node's alternatives.
    Node(NodeId),
    /// Insertion text rendered at its surface position.
    Append(TextSpec),
    /// Leave the innermost conjugation context.
    PopConj,
    /// Close the innermost semantic scope and reduce it.
    Reduce,
}

/// An open semantic scope: the function head awaiting arguments (`None` at
/// the root) and the arguments merged so far.
#[derive(Debug, Clone)]
struct SemScope {
    func: Option<Rc<SemanticFunc>>,
    args: Vec<Semantic>,
}

#[derive(Clone)]
struct Path {
    frontier: Cactus<Frontier>,
    conj: Cactus<ConjContext>,
    sem: Cactus<SemScope>,
    trail: Cactus<(NodeId, SubId)>,
    text: Vec<SmolStr>,
    subject_pn: Option<PersonNumber>,
    cost: f64,
    remaining: f64,
}

struct QueueEntry {
    priority: f64,
    seq: u64,
    path: Path,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: invert so the cheapest (and, on ties,
        // the earliest-queued) entry pops first
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Enumerate up to `k` unique parses of the annotated forest in
/// non-decreasing cost order. The deadline is checked between queue pops.
pub fn enumerate(
    forest: &Forest,
    start: NodeId,
    k: usize,
    deadline: Option<Instant>,
) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    if k == 0 {
        return outcome;
    }

    let start_min = forest.node(start).min_cost.unwrap_or(0.0);
    let root = Path {
        frontier: Cactus::new().child(Frontier::Node(start)),
        conj: Cactus::new(),
        sem: Cactus::new().child(SemScope { func: None, args: Vec::new() }),
        trail: Cactus::new(),
        text: Vec::new(),
        subject_pn: None,
        cost: 0.0,
        remaining: start_min,
    };

    let mut heap: BinaryHeap<QueueEntry> = BinaryHeap::new();
    let mut seq: u64 = 0;
    heap.push(QueueEntry { priority: start_min, seq, path: root });

    let mut seen: HashSet<String> = HashSet::new();
    let mut popped: u64 = 0;

    while let Some(entry) = heap.pop() {
        if let Some(limit) = deadline {
            if Instant::now() >= limit {
                debug!("deadline reached after {popped} pops, {} result(s)", outcome.results.len());
                outcome.timed_out = true;
                return outcome;
            }
        }
        popped += 1;
        let path = entry.path;

        let Some(top) = path.frontier.val().cloned() else {
            // complete path: deduplicate on the canonical semantic string
            let scope = path.sem.val().expect("root semantic scope");
            let canonical = semantic::canonical_string(&scope.args);
            if !seen.insert(canonical.clone()) {
                trace!("duplicate semantic dropped: {canonical}");
                continue;
            }
            let mut trail: Vec<(NodeId, SubId)> = path.trail.vals().cloned().collect();
            trail.reverse();
            outcome.results.push(SearchResult {
                text: join_text(&path.text),
                semantics: scope.args.clone(),
                cost: path.cost,
                trail,
            });
            if outcome.results.len() >= k {
                break;
            }
            continue;
        };

        let Frontier::Node(nid) = top else {
            unreachable!("markers are consumed before a path is queued");
        };
        let rest = path.frontier.parent().expect("frontier top exists");
        let node_min = forest.node(nid).min_cost.unwrap_or(0.0);

        for &sid in &forest.node(nid).subs {
            let mut successor = path.clone();
            successor.frontier = rest.clone();
            successor.remaining -= node_min;
            successor.trail = successor.trail.child((nid, sid));
            if expand_sub(forest, &mut successor, sid).is_err() {
                continue;
            }
            if process_markers(&mut successor).is_err() {
                continue;
            }
            seq += 1;
            heap.push(QueueEntry {
                priority: successor.cost + successor.remaining,
                seq,
                path: successor,
            });
        }
    }

    debug!("search finished: {} result(s) after {popped} pops", outcome.results.len());
    outcome
}

/// Apply one chosen sub to a successor path. Returns `Err` when a semantic
/// merge is contradictory.
fn expand_sub(forest: &Forest, path: &mut Path, sid: SubId) -> Result<(), ()> {
    let sub = forest.sub(sid);
    match &sub.props {
        SubProps::Flat(flat) => {
            path.cost += flat.cost;
            apply_flat(path, flat)
        }
        SubProps::Rules(list) => {
            debug_assert_eq!(list.len(), 1, "insertion alternatives are split during annotation");
            let props = &list[0];
            path.cost += props.cost;

            // semantics first: a reduced semantic merges now, an unreduced
            // one opens a scope the Reduce marker will close
            let mut needs_reduce = false;
            match &props.semantic {
                Some(SemanticSpec::Unreduced(func)) => {
                    path.sem = path.sem.child(SemScope { func: Some(Rc::clone(func)), args: Vec::new() });
                    needs_reduce = true;
                }
                Some(SemanticSpec::Reduced(sem)) => merge_semantic(path, sem.clone())?,
                None => {}
            }

            let ctx = ConjContext {
                form: props.grammatical_form,
                accepted_tense: props.accepted_tense,
                person_number: props.person_number,
            };
            let needs_pop_conj = !ctx.is_empty();
            if needs_pop_conj {
                path.conj = path.conj.child(ctx);
            }

            // build the frontier back-to-front so children pop in display
            // order, then the context pops, then the scope reduces
            if needs_reduce {
                path.frontier = path.frontier.child(Frontier::Reduce);
            }
            if needs_pop_conj {
                path.frontier = path.frontier.child(Frontier::PopConj);
            }
            if let Some(text) = &props.text {
                if props.inserted_symbol_index == Some(1) {
                    path.frontier = path.frontier.child(Frontier::Append(text.clone()));
                }
            }
            if let Some(second) = sub.next {
                path.frontier = path.frontier.child(Frontier::Node(second));
                path.remaining += forest.node(second).min_cost.unwrap_or(0.0);
            }
            path.frontier = path.frontier.child(Frontier::Node(sub.node));
            path.remaining += forest.node(sub.node).min_cost.unwrap_or(0.0);
            if let Some(text) = &props.text {
                if props.inserted_symbol_index != Some(1) {
                    path.frontier = path.frontier.child(Frontier::Append(text.clone()));
                }
            }
            Ok(())
        }
    }
}

fn apply_flat(path: &mut Path, flat: &FlatProps) -> Result<(), ()> {
    if let Some(text) = &flat.text {
        render_text(path, text, flat.tense);
    }
    if let Some(pn) = flat.person_number {
        path.subject_pn = Some(pn);
    }
    match &flat.semantic {
        Some(SemanticSpec::Reduced(sem)) => merge_semantic(path, sem.clone())?,
        Some(SemanticSpec::Unreduced(func)) => {
            let reduced = semantic::reduce(func, Vec::new()).map_err(|_| ())?;
            merge_semantic(path, reduced)?;
        }
        None => {}
    }
    Ok(())
}

/// Drain markers off the frontier until the next real expansion point.
fn process_markers(path: &mut Path) -> Result<(), ()> {
    loop {
        let top = match path.frontier.val() {
            None | Some(Frontier::Node(_)) => return Ok(()),
            Some(other) => other.clone(),
        };
        path.frontier = path.frontier.parent().expect("frontier top exists");
        match top {
            Frontier::Append(text) => render_text(path, &text, None),
            Frontier::PopConj => {
                path.conj = path.conj.parent().expect("conjugation context open");
            }
            Frontier::Reduce => {
                let scope = path.sem.val().cloned().expect("semantic scope open");
                path.sem = path.sem.parent().expect("semantic scope open");
                let func = scope.func.expect("non-root scope has a function head");
                let reduced = semantic::reduce(&func, scope.args).map_err(|_| ())?;
                merge_semantic(path, reduced)?;
            }
            Frontier::Node(_) => unreachable!(),
        }
    }
}

fn merge_semantic(path: &mut Path, sem: Semantic) -> Result<(), ()> {
    let mut scope = path.sem.val().cloned().expect("semantic scope open");
    semantic::merge_into(&mut scope.args, sem).map_err(|conflict| {
        trace!("path pruned: {conflict}");
    })?;
    path.sem = path.sem.parent().expect("semantic scope open").child(scope);
    Ok(())
}

fn render_text(path: &mut Path, spec: &TextSpec, matched_tense: Option<Tense>) {
    for part in &spec.0 {
        let fragment = match part {
            TextPart::Str(s) => s.clone(),
            TextPart::Inflected(inf) => {
                conjugate(inf, path.conj.vals(), path.subject_pn, matched_tense)
            }
        };
        if !fragment.is_empty() {
            path.text.push(fragment);
        }
    }
}

fn join_text(fragments: &[SmolStr]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(fragment);
    }
    out
}
