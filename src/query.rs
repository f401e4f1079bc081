//! The per-query driver.
//!
//! `Engine` owns a loaded grammar and runs the whole pipeline for one query:
//! terminal matching, GLR parsing, annotation, A* enumeration, and result
//! assembly. When the first pass finds no parse — or a forest whose every
//! candidate reduces to a contradictory semantic — it retries once with all
//! token positions marked deletable, then gives up with an empty result set.
//!
//! Per-path semantic conflicts are not errors; only an annotator
//! [`InvariantViolation`] (a grammar bug) surfaces as `Err`.

use crate::annotate::{annotate, InvariantViolation};
use crate::debug;
use crate::forest::Forest;
use crate::grammar::Grammar;
use crate::parser::Parser;
use crate::search::{enumerate, SearchResult};
use crate::semantic::{canonical_string, Semantic};
use crate::tokenizer::match_terminals;
use log::{debug as log_debug, info};
use std::time::{Duration, Instant};

/// Options for one `parse` call. Mirrors the CLI flags one-to-one.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum number of unique parses to emit.
    pub k: usize,
    /// Suppress result rendering (the CLI prints only the summary line).
    pub quiet: bool,
    /// Include the canonical semantic string per result.
    pub semantics: bool,
    /// Include the semantic tree as a structured JSON value per result.
    pub object_semantics: bool,
    /// Include the exact cost per result.
    pub costs: bool,
    /// Include a parse-tree outline per result.
    pub trees: bool,
    pub tree_node_costs: bool,
    pub tree_token_ranges: bool,
    /// Dump the graph-structured stack of the final attempt.
    pub parse_stack: bool,
    /// Dump the packed forest of the final attempt.
    pub parse_forest: bool,
    /// Dump the packed forest as a graphviz digraph.
    pub parse_forest_graph: bool,
    /// Wall-clock limit in milliseconds; exceeded searches return partial
    /// results.
    pub deadline_ms: Option<u64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            k: 7,
            quiet: false,
            semantics: false,
            object_semantics: false,
            costs: false,
            trees: false,
            tree_node_costs: false,
            tree_token_ranges: false,
            parse_stack: false,
            parse_forest: false,
            parse_forest_graph: false,
            deadline_ms: None,
        }
    }
}

/// One ranked parse, with the optional fields the options asked for.
#[derive(Debug, Clone)]
pub struct TreeResult {
    pub text: String,
    pub semantic: Option<String>,
    pub semantic_object: Option<serde_json::Value>,
    pub cost: Option<f64>,
    pub tree: Option<String>,
}

/// Everything one `parse` call produced.
#[derive(Debug, Default)]
pub struct QueryReply {
    pub results: Vec<TreeResult>,
    /// True when the deadline cut the enumeration short.
    pub partial: bool,
    pub parse_forest: Option<String>,
    pub parse_stack: Option<String>,
    pub parse_forest_graph: Option<String>,
}

/// A loaded grammar plus the query pipeline over it. Shareable read-only;
/// every `parse` call builds its own forest and search state.
#[derive(Debug)]
pub struct Engine {
    grammar: Grammar,
}

impl Engine {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn parse(&self, query: &str, opts: &ParseOptions) -> Result<QueryReply, InvariantViolation> {
        let deadline = opts.deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

        let first = self.attempt(query, opts, false, deadline)?;
        if !first.results.is_empty() || first.partial {
            return Ok(first);
        }

        // no parse, or no legal tree: one retry with everything deletable
        info!("retrying '{query}' with all tokens deletable");
        let second = self.attempt(query, opts, true, deadline)?;
        if !second.results.is_empty() {
            return Ok(second);
        }
        Ok(first)
    }

    fn attempt(
        &self,
        query: &str,
        opts: &ParseOptions,
        force_deletable: bool,
        deadline: Option<Instant>,
    ) -> Result<QueryReply, InvariantViolation> {
        let mut reply = QueryReply::default();
        let mut forest = Forest::new();
        let matches = match_terminals(&self.grammar, &mut forest, query, force_deletable);
        let mut parser = Parser::new(&self.grammar);
        let root = parser.parse(&mut forest, &matches);

        if opts.parse_stack {
            reply.parse_stack = Some(parser.format_stack(&forest));
        }

        let Some(root) = root else {
            log_debug!("no parse for '{query}' (force_deletable={force_deletable})");
            return Ok(reply);
        };

        annotate(&mut forest, &self.grammar, root)?;

        if opts.parse_forest {
            reply.parse_forest = Some(debug::format_forest(&forest, &self.grammar));
        }
        if opts.parse_forest_graph {
            reply.parse_forest_graph = Some(debug::format_forest_graph(&forest, &self.grammar));
        }

        let outcome = enumerate(&forest, root, opts.k, deadline);
        reply.partial = outcome.timed_out;
        reply.results = outcome
            .results
            .iter()
            .map(|r| self.render_result(&forest, r, opts))
            .collect();
        Ok(reply)
    }

    fn render_result(&self, forest: &Forest, result: &SearchResult, opts: &ParseOptions) -> TreeResult {
        TreeResult {
            text: result.text.clone(),
            semantic: opts.semantics.then(|| canonical_string(&result.semantics)),
            semantic_object: opts.object_semantics.then(|| semantic_value(&result.semantics)),
            cost: opts.costs.then_some(result.cost),
            tree: opts.trees.then(|| {
                debug::format_tree(
                    forest,
                    &self.grammar,
                    &result.trail,
                    opts.tree_node_costs,
                    opts.tree_token_ranges,
                )
            }),
        }
    }
}

/// A single semantic serializes bare; siblings serialize as a list.
fn semantic_value(sems: &[Semantic]) -> serde_json::Value {
    match sems {
        [single] => serde_json::to_value(single).unwrap_or(serde_json::Value::Null),
        many => serde_json::to_value(many).unwrap_or(serde_json::Value::Null),
    }
}
