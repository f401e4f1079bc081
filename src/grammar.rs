//! The compiled grammar: symbols, rule metadata, and the shift/reduce state
//! table the GLR parser runs over.
//!
//! A grammar is produced by an external generation pipeline and consumed
//! here as a JSON document (see [`Grammar::from_json_str`]). Loading interns
//! every symbol name into a `SymbolId` index, resolves all cross-references,
//! and validates the table:
//!
//! - every symbol a shift, reduction, terminal rule, entity, or integer
//!   entry mentions must exist in the symbol table
//! - shift targets must be in range, and `isBinary` must agree with
//!   `rhsArity`
//! - insertion alternatives must be ordered by ascending cost (they are
//!   sorted on load)
//! - no nonterminal may reach itself through a chain of unary non-insertion
//!   reductions; annotation termination depends on it, so such grammars are
//!   refused outright
//!
//! After load the grammar is immutable and may be shared read-only across
//! any number of parses.

use crate::semantic::{Semantic, SemanticFunc, SemanticSpec};
use crate::text::{GrammaticalForm, Inflection, PersonNumber, Tense, TextSpec};
use log::debug;
use multimap::MultiMap;
use serde::Deserialize;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Index of a symbol in the grammar's symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) usize);

/// Index of a state in the state table. State 0 is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

/// A terminal rule: matching this word symbol produces a node for `lhs`
/// carrying `props` (display text, tense, cost, semantics).
#[derive(Debug, Clone)]
pub struct TerminalRule {
    pub lhs: SymbolId,
    pub props: Rc<RuleProps>,
}

/// One entry in the symbol arena.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: SmolStr,
    pub is_terminal: bool,
    /// Placeholder symbols match anonymously (entity categories, integers)
    /// and are skipped by literal n-gram lookup.
    pub is_placeholder: bool,
    pub int_range: Option<(i64, i64)>,
    pub terminal_rules: Vec<TerminalRule>,
}

/// Everything a rule contributes besides its shape: cost, display text,
/// tense bookkeeping, semantics, insertion and flattening markers.
#[derive(Debug, Clone, Default)]
pub struct RuleProps {
    pub cost: f64,
    pub text: Option<TextSpec>,
    /// For terminal rules: the tense the matched surface form represents.
    pub tense: Option<Tense>,
    pub semantic: Option<SemanticSpec>,
    /// Present on insertion rules; which RHS position was inserted.
    pub inserted_symbol_index: Option<usize>,
    pub grammatical_form: Option<GrammaticalForm>,
    pub accepted_tense: Option<Tense>,
    pub person_number: Option<PersonNumber>,
    pub is_term_sequence: bool,
    pub rhs_does_not_produce_text: bool,
    pub is_transposition: bool,
    pub is_placeholder: bool,
}

/// A shift edge of the state table.
#[derive(Debug, Clone)]
pub struct Shift {
    pub symbol: SymbolId,
    pub next_state: StateId,
}

/// A reduction attached to the state reached after shifting the rule's last
/// RHS symbol. `props` holds one rule-props record, or several sorted by
/// ascending cost for insertion rules with alternatives.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub lhs: SymbolId,
    pub rhs_arity: usize,
    pub is_binary: bool,
    pub is_transposition: bool,
    pub props: Vec<Rc<RuleProps>>,
}

/// An entry in the state table.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub shifts: Vec<Shift>,
    pub reductions: Vec<Reduction>,
    pub is_accept: bool,
}

/// One resolution of an entity alias.
#[derive(Debug, Clone)]
pub struct EntityMatch {
    pub category: SymbolId,
    pub id: SmolStr,
    pub text: SmolStr,
}

/// An integer placeholder symbol and its accepted range.
#[derive(Debug, Clone)]
pub struct IntSymbolEntry {
    pub symbol: SymbolId,
    pub min: i64,
    pub max: i64,
}

/// The compiled grammar, immutable after load.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) start_symbol: SymbolId,
    pub(crate) states: Vec<State>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) names: HashMap<SmolStr, SymbolId>,
    pub(crate) entities: MultiMap<SmolStr, EntityMatch>,
    pub(crate) int_symbols: Vec<IntSymbolEntry>,
    pub(crate) deletables: HashSet<SmolStr>,
    pub(crate) max_ngram_len: usize,
}

#[derive(Debug)]
pub enum GrammarError {
    /// The JSON document failed schema validation.
    Schema(String),
    /// A symbol name was referenced but never defined.
    UnknownSymbol(String),
    /// A shift or reduction referenced a state outside the table.
    BadStateIndex(usize),
    /// A nonterminal reaches itself through unary non-insertion reductions.
    RecursiveRule(String),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(e) => write!(f, "grammar schema error: {e}"),
            Self::UnknownSymbol(name) => write!(f, "unknown symbol: {name}"),
            Self::BadStateIndex(i) => write!(f, "state index out of range: {i}"),
            Self::RecursiveRule(name) => {
                write!(f, "symbol {name} reaches itself via unary reductions")
            }
        }
    }
}

impl From<serde_json::Error> for GrammarError {
    fn from(e: serde_json::Error) -> Self {
        Self::Schema(e.to_string())
    }
}

impl Grammar {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GrammarError> {
        let raw = fs::read_to_string(path).map_err(|e| GrammarError::Schema(e.to_string()))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(json: &str) -> Result<Self, GrammarError> {
        let raw: RawGrammar = serde_json::from_str(json)?;
        let grammar = raw.intern()?;
        grammar.validate()?;
        debug!(
            "loaded grammar: {} symbols, {} states, {} entity aliases",
            grammar.symbols.len(),
            grammar.states.len(),
            grammar.entities.len()
        );
        Ok(grammar)
    }

    pub fn start_symbol(&self) -> SymbolId {
        self.start_symbol
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id.0].name
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The shift target for `symbol` out of `state`, if any.
    pub fn shift(&self, state: StateId, symbol: SymbolId) -> Option<StateId> {
        self.states[state.0]
            .shifts
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.next_state)
    }

    pub fn entities(&self) -> &MultiMap<SmolStr, EntityMatch> {
        &self.entities
    }

    pub fn int_symbols(&self) -> &[IntSymbolEntry] {
        &self.int_symbols
    }

    pub fn is_deletable(&self, token: &str) -> bool {
        self.deletables.contains(token)
    }

    /// Longest alias (in words) the terminal matcher can ever match; bounds
    /// the sliding n-gram extension.
    pub fn max_ngram_len(&self) -> usize {
        self.max_ngram_len
    }

    /// Table-level validation shared by the JSON loader and programmatic
    /// construction.
    pub(crate) fn validate(&self) -> Result<(), GrammarError> {
        for state in &self.states {
            for shift in &state.shifts {
                if shift.next_state.0 >= self.states.len() {
                    return Err(GrammarError::BadStateIndex(shift.next_state.0));
                }
            }
            for red in &state.reductions {
                if red.is_binary != (red.rhs_arity == 2) {
                    return Err(GrammarError::Schema(format!(
                        "reduction to {} has rhsArity {} but isBinary {}",
                        self.name(red.lhs),
                        red.rhs_arity,
                        red.is_binary
                    )));
                }
                if red.props.is_empty() {
                    return Err(GrammarError::Schema(format!(
                        "reduction to {} carries no rule props",
                        self.name(red.lhs)
                    )));
                }
            }
        }
        self.check_unary_recursion()
    }

    /// Refuse grammars where a symbol can derive itself through unary
    /// non-insertion reductions; the annotator's memoization would never
    /// terminate on such a forest.
    fn check_unary_recursion(&self) -> Result<(), GrammarError> {
        // edge rhs -> lhs for every unary non-insertion reduction, found by
        // pairing each shift with the reductions of its target state
        let mut edges: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for state in &self.states {
            for shift in &state.shifts {
                for red in &self.states[shift.next_state.0].reductions {
                    let is_insertion =
                        red.props.iter().any(|p| p.inserted_symbol_index.is_some());
                    if red.rhs_arity == 1 && !is_insertion {
                        let succs = edges.entry(shift.symbol).or_default();
                        if !succs.contains(&red.lhs) {
                            succs.push(red.lhs);
                        }
                    }
                }
            }
        }

        // iterative three-color DFS over the unary graph
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let mut color = vec![WHITE; self.symbols.len()];
        let mut roots: Vec<SymbolId> = edges.keys().copied().collect();
        roots.sort();
        for start in roots {
            if color[start.0] != WHITE {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            color[start.0] = GRAY;
            while let Some((sym, next)) = stack.last().copied() {
                let succs = edges.get(&sym).map(Vec::as_slice).unwrap_or(&[]);
                if next < succs.len() {
                    stack.last_mut().unwrap().1 += 1;
                    let succ = succs[next];
                    match color[succ.0] {
                        GRAY => {
                            return Err(GrammarError::RecursiveRule(
                                self.name(succ).to_string(),
                            ))
                        }
                        WHITE => {
                            color[succ.0] = GRAY;
                            stack.push((succ, 0));
                        }
                        _ => {}
                    }
                } else {
                    color[sym.0] = BLACK;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw JSON mirror layer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrammar {
    start_symbol: String,
    states: Vec<RawState>,
    symbol_table: HashMap<String, RawSymbol>,
    #[serde(default)]
    entities: HashMap<String, Vec<RawEntity>>,
    #[serde(default)]
    int_symbols: Vec<RawIntSymbol>,
    #[serde(default)]
    deletables: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    #[serde(default)]
    shifts: Vec<RawShift>,
    #[serde(default)]
    reductions: Vec<RawReduction>,
    #[serde(default)]
    is_accept: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShift {
    symbol: String,
    state_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReduction {
    lhs: String,
    rhs_arity: usize,
    #[serde(default)]
    is_binary: bool,
    #[serde(default)]
    is_transposition: bool,
    rule_props: RawPropsSet,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPropsSet {
    One(Box<RawRuleProps>),
    Many(Vec<RawRuleProps>),
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawRuleProps {
    #[serde(default)]
    cost: f64,
    text: Option<RawText>,
    tense: Option<String>,
    semantic: Option<RawSemantic>,
    inserted_symbol_index: Option<usize>,
    grammatical_form: Option<String>,
    accepted_tense: Option<String>,
    person_number: Option<String>,
    #[serde(default)]
    is_term_sequence: bool,
    #[serde(default)]
    rhs_does_not_produce_text: bool,
    #[serde(default)]
    is_transposition: bool,
    #[serde(default)]
    is_placeholder: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawText {
    Str(String),
    Obj(RawInflection),
    List(Vec<RawTextPart>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTextPart {
    Str(String),
    Obj(RawInflection),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInflection {
    other: String,
    one_sg: Option<String>,
    three_sg: Option<String>,
    pl: Option<String>,
    past: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSemantic {
    name: String,
    #[serde(default)]
    cost: f64,
    min_params: Option<usize>,
    max_params: Option<usize>,
    #[serde(default)]
    forbids_multiple: bool,
    #[serde(default)]
    is_argument: bool,
    args: Option<Vec<RawSemantic>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSymbol {
    #[serde(default)]
    is_terminal: bool,
    #[serde(default)]
    is_placeholder: bool,
    terminal_rules: Option<Vec<RawTerminalRule>>,
    int_min: Option<i64>,
    int_max: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTerminalRule {
    lhs: String,
    rule_props: RawRuleProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    category: String,
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntSymbol {
    name: String,
    min: i64,
    max: i64,
}

impl RawGrammar {
    fn intern(self) -> Result<Grammar, GrammarError> {
        let mut symbols: Vec<Symbol> = Vec::with_capacity(self.symbol_table.len());
        let mut names: HashMap<SmolStr, SymbolId> = HashMap::new();

        // deterministic interning order
        let mut table: Vec<(String, RawSymbol)> = self.symbol_table.into_iter().collect();
        table.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, raw) in &table {
            let id = SymbolId(symbols.len());
            names.insert(SmolStr::new(name), id);
            symbols.push(Symbol {
                name: SmolStr::new(name),
                is_terminal: raw.is_terminal,
                is_placeholder: raw.is_placeholder,
                int_range: match (raw.int_min, raw.int_max) {
                    (Some(min), Some(max)) => Some((min, max)),
                    _ => None,
                },
                terminal_rules: Vec::new(),
            });
        }

        let resolve = |name: &str| -> Result<SymbolId, GrammarError> {
            names
                .get(name)
                .copied()
                .ok_or_else(|| GrammarError::UnknownSymbol(name.to_string()))
        };

        // terminal rules, now that every symbol is interned
        for (name, raw) in &table {
            if let Some(rules) = &raw.terminal_rules {
                let id = resolve(name)?;
                let mut out = Vec::with_capacity(rules.len());
                for tr in rules {
                    out.push(TerminalRule {
                        lhs: resolve(&tr.lhs)?,
                        props: Rc::new(convert_props(&tr.rule_props)?),
                    });
                }
                symbols[id.0].terminal_rules = out;
            }
        }

        let start_symbol = resolve(&self.start_symbol)?;

        let mut states = Vec::with_capacity(self.states.len());
        for raw_state in &self.states {
            let mut shifts = Vec::with_capacity(raw_state.shifts.len());
            for s in &raw_state.shifts {
                shifts.push(Shift {
                    symbol: resolve(&s.symbol)?,
                    next_state: StateId(s.state_index),
                });
            }
            let mut reductions = Vec::with_capacity(raw_state.reductions.len());
            for r in &raw_state.reductions {
                let mut props = match &r.rule_props {
                    RawPropsSet::One(p) => vec![Rc::new(convert_props(p)?)],
                    RawPropsSet::Many(list) => {
                        let mut out = Vec::with_capacity(list.len());
                        for p in list {
                            out.push(Rc::new(convert_props(p)?));
                        }
                        out
                    }
                };
                props.sort_by(|a, b| a.cost.total_cmp(&b.cost));
                reductions.push(Reduction {
                    lhs: resolve(&r.lhs)?,
                    rhs_arity: r.rhs_arity,
                    is_binary: r.is_binary,
                    is_transposition: r.is_transposition,
                    props,
                });
            }
            states.push(State { shifts, reductions, is_accept: raw_state.is_accept });
        }

        let mut entities: MultiMap<SmolStr, EntityMatch> = MultiMap::new();
        let mut entity_keys: Vec<(&String, &Vec<RawEntity>)> = self.entities.iter().collect();
        entity_keys.sort_by(|a, b| a.0.cmp(b.0));
        for (alias, matches) in entity_keys {
            for m in matches {
                entities.insert(
                    SmolStr::new(alias.to_lowercase()),
                    EntityMatch {
                        category: resolve(&m.category)?,
                        id: SmolStr::new(&m.id),
                        text: SmolStr::new(&m.text),
                    },
                );
            }
        }

        let mut int_symbols = Vec::with_capacity(self.int_symbols.len());
        for raw in &self.int_symbols {
            int_symbols.push(IntSymbolEntry {
                symbol: resolve(&raw.name)?,
                min: raw.min,
                max: raw.max,
            });
        }
        int_symbols.sort_by_key(|e| (e.min, e.max));

        let deletables: HashSet<SmolStr> =
            self.deletables.iter().map(|d| SmolStr::new(d.to_lowercase())).collect();

        let max_ngram_len = max_ngram_len(&symbols, &entities);

        Ok(Grammar {
            start_symbol,
            states,
            symbols,
            names,
            entities,
            int_symbols,
            deletables,
            max_ngram_len,
        })
    }
}

pub(crate) fn max_ngram_len(
    symbols: &[Symbol],
    entities: &MultiMap<SmolStr, EntityMatch>,
) -> usize {
    let from_words = symbols
        .iter()
        .filter(|s| s.is_terminal)
        .map(|s| s.name.split_whitespace().count())
        .max()
        .unwrap_or(1);
    let from_entities = entities
        .keys()
        .map(|k| k.split_whitespace().count())
        .max()
        .unwrap_or(1);
    from_words.max(from_entities).max(1)
}

fn convert_props(raw: &RawRuleProps) -> Result<RuleProps, GrammarError> {
    Ok(RuleProps {
        cost: raw.cost,
        text: raw.text.as_ref().map(convert_text),
        tense: raw.tense.as_deref().map(parse_tense).transpose()?,
        semantic: raw.semantic.as_ref().map(convert_semantic).transpose()?,
        inserted_symbol_index: raw.inserted_symbol_index,
        grammatical_form: raw.grammatical_form.as_deref().map(parse_form).transpose()?,
        accepted_tense: raw.accepted_tense.as_deref().map(parse_tense).transpose()?,
        person_number: raw.person_number.as_deref().map(parse_person).transpose()?,
        is_term_sequence: raw.is_term_sequence,
        rhs_does_not_produce_text: raw.rhs_does_not_produce_text,
        is_transposition: raw.is_transposition,
        is_placeholder: raw.is_placeholder,
    })
}

fn convert_text(raw: &RawText) -> TextSpec {
    match raw {
        RawText::Str(s) => TextSpec::literal(s),
        RawText::Obj(inf) => TextSpec::inflected(convert_inflection(inf)),
        RawText::List(parts) => {
            let specs: Vec<TextSpec> = parts
                .iter()
                .map(|p| match p {
                    RawTextPart::Str(s) => TextSpec::literal(s),
                    RawTextPart::Obj(inf) => TextSpec::inflected(convert_inflection(inf)),
                })
                .collect();
            let mut acc: Option<TextSpec> = None;
            for spec in &specs {
                acc = TextSpec::concat(acc.as_ref(), Some(spec));
            }
            acc.unwrap_or_default()
        }
    }
}

fn convert_inflection(raw: &RawInflection) -> Inflection {
    Inflection {
        other: SmolStr::new(&raw.other),
        one_sg: raw.one_sg.as_deref().map(SmolStr::new),
        three_sg: raw.three_sg.as_deref().map(SmolStr::new),
        pl: raw.pl.as_deref().map(SmolStr::new),
        past: raw.past.as_deref().map(SmolStr::new),
    }
}

fn convert_semantic(raw: &RawSemantic) -> Result<SemanticSpec, GrammarError> {
    if raw.is_argument {
        return Ok(SemanticSpec::Reduced(Semantic::arg(&raw.name)));
    }
    let def = Rc::new(SemanticFunc {
        name: SmolStr::new(&raw.name),
        cost: raw.cost,
        min_params: raw.min_params.unwrap_or(1),
        max_params: raw.max_params.or(raw.min_params).unwrap_or(1),
        forbids_multiple: raw.forbids_multiple,
    });
    match &raw.args {
        Some(args) => {
            let mut converted = Vec::with_capacity(args.len());
            for a in args {
                converted.push(match convert_semantic(a)? {
                    SemanticSpec::Reduced(s) => s,
                    SemanticSpec::Unreduced(f) => {
                        return Err(GrammarError::Schema(format!(
                            "semantic argument {} is not reduced",
                            f.name
                        )))
                    }
                });
            }
            Ok(SemanticSpec::Reduced(Semantic::Func(def, converted)))
        }
        None => Ok(SemanticSpec::Unreduced(def)),
    }
}

fn parse_tense(s: &str) -> Result<Tense, GrammarError> {
    match s {
        "present" => Ok(Tense::Present),
        "past" => Ok(Tense::Past),
        _ => Err(GrammarError::Schema(format!("unknown tense: {s}"))),
    }
}

fn parse_form(s: &str) -> Result<GrammaticalForm, GrammarError> {
    match s {
        "infinitive" => Ok(GrammaticalForm::Infinitive),
        "past" => Ok(GrammaticalForm::Past),
        _ => Err(GrammarError::Schema(format!("unknown grammatical form: {s}"))),
    }
}

fn parse_person(s: &str) -> Result<PersonNumber, GrammarError> {
    match s {
        "oneSg" => Ok(PersonNumber::OneSg),
        "threeSg" => Ok(PersonNumber::ThreeSg),
        "pl" => Ok(PersonNumber::Pl),
        _ => Err(GrammarError::Schema(format!("unknown person-number: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const TINY: &str = indoc! {r#"
        {
          "startSymbol": "[start]",
          "states": [
            { "shifts": [ { "symbol": "[noun]", "stateIndex": 1 },
                          { "symbol": "[start]", "stateIndex": 2 } ] },
            { "reductions": [ { "lhs": "[start]", "rhsArity": 1,
                                "ruleProps": { "cost": 0.0 } } ] },
            { "isAccept": true }
          ],
          "symbolTable": {
            "[start]": {},
            "[noun]": {},
            "repos": { "isTerminal": true,
                       "terminalRules": [ { "lhs": "[noun]",
                                            "ruleProps": { "cost": 0.0, "text": "repos" } } ] }
          },
          "deletables": ["please"]
        }
    "#};

    #[test]
    fn loads_tiny_grammar() {
        let g = Grammar::from_json_str(TINY).unwrap();
        assert_eq!(g.state_count(), 3);
        let noun = g.lookup("[noun]").unwrap();
        assert_eq!(g.shift(StateId(0), noun), Some(StateId(1)));
        assert!(g.is_deletable("please"));
        let repos = g.lookup("repos").unwrap();
        assert_eq!(g.symbol(repos).terminal_rules.len(), 1);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let bad = TINY.replace("\"symbol\": \"[noun]\"", "\"symbol\": \"[nope]\"");
        match Grammar::from_json_str(&bad) {
            Err(GrammarError::UnknownSymbol(name)) => assert_eq!(name, "[nope]"),
            other => panic!("expected UnknownSymbol, got {other:?}"),
        }
    }

    #[test]
    fn bad_state_index_is_rejected() {
        let bad = TINY.replace("\"stateIndex\": 2", "\"stateIndex\": 9");
        assert!(matches!(Grammar::from_json_str(&bad), Err(GrammarError::BadStateIndex(9))));
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        assert!(matches!(
            Grammar::from_json_str("{ \"startSymbol\": 3 }"),
            Err(GrammarError::Schema(_))
        ));
    }

    #[test]
    fn unary_recursion_is_refused() {
        // [a] -> [b] and [b] -> [a], both unary, both non-insertion
        let json = indoc! {r#"
            {
              "startSymbol": "[a]",
              "states": [
                { "shifts": [ { "symbol": "[a]", "stateIndex": 1 },
                              { "symbol": "[b]", "stateIndex": 2 } ] },
                { "reductions": [ { "lhs": "[b]", "rhsArity": 1,
                                    "ruleProps": { "cost": 0.0 } } ] },
                { "reductions": [ { "lhs": "[a]", "rhsArity": 1,
                                    "ruleProps": { "cost": 0.0 } } ] }
              ],
              "symbolTable": { "[a]": {}, "[b]": {} }
            }
        "#};
        assert!(matches!(
            Grammar::from_json_str(json),
            Err(GrammarError::RecursiveRule(_))
        ));
    }

    #[test]
    fn insertion_alternatives_sorted_by_cost() {
        let json = indoc! {r#"
            {
              "startSymbol": "[start]",
              "states": [
                { "shifts": [ { "symbol": "[x]", "stateIndex": 1 } ] },
                { "reductions": [ { "lhs": "[start]", "rhsArity": 1,
                                    "ruleProps": [
                                      { "cost": 2.0, "text": "which", "insertedSymbolIndex": 0 },
                                      { "cost": 1.0, "text": "that", "insertedSymbolIndex": 0 } ] } ] }
              ],
              "symbolTable": { "[start]": {}, "[x]": {} }
            }
        "#};
        let g = Grammar::from_json_str(json).unwrap();
        let red = &g.state(StateId(1)).reductions[0];
        assert_eq!(red.props.len(), 2);
        assert!(red.props[0].cost < red.props[1].cost);
    }
}
