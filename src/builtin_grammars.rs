//! Built-in grammars and the table builder behind them.
//!
//! The real state table comes from an external grammar-generation pipeline
//! and is loaded from JSON. For the demo, the CLI suite, and the tests we
//! need an exercisable grammar without that artifact, so this module ships
//! two things:
//!
//! - [`TableBuilder`], a small LR(0) item-set construction that compiles
//!   binarized productions plus terminal-rule tables into the engine's
//!   `State` table. It is a stand-in, not the generator: no edit-rule
//!   synthesis, no ambiguity checking. GLR tolerates the conflicts LR(0)
//!   leaves in.
//! - [`demo_grammar`], a hand-written users / repositories / companies
//!   grammar covering the interesting rule shapes: corrective display text,
//!   a possessive substitution, relative clauses, insertion alternatives, a
//!   transposition, a pass-through, a plain term sequence, entities, an
//!   integer placeholder, and deletables.

use crate::grammar::{
    max_ngram_len, EntityMatch, Grammar, GrammarError, IntSymbolEntry, Reduction, RuleProps, Shift,
    State, StateId, Symbol, SymbolId, TerminalRule,
};
use crate::semantic::{Semantic, SemanticFunc, SemanticSpec};
use crate::text::{GrammaticalForm, Inflection, PersonNumber, Tense, TextSpec};
use indoc::indoc;
use multimap::MultiMap;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// A binarized production fed to the builder.
#[derive(Debug, Clone)]
struct Prod {
    lhs: SymbolId,
    rhs: Vec<SymbolId>,
    props: Vec<Rc<RuleProps>>,
    is_transposition: bool,
}

/// Compile binarized productions into a GLR-ready grammar. Productions may
/// have one or two RHS symbols; nonterminals without productions are the
/// automaton's leaves (terminal categories and placeholders).
pub struct TableBuilder {
    symbols: Vec<Symbol>,
    names: HashMap<SmolStr, SymbolId>,
    prods: Vec<Prod>,
    entities: MultiMap<SmolStr, EntityMatch>,
    int_symbols: Vec<IntSymbolEntry>,
    deletables: HashSet<SmolStr>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            names: HashMap::new(),
            prods: Vec::new(),
            entities: MultiMap::new(),
            int_symbols: Vec::new(),
            deletables: HashSet::new(),
        }
    }

    fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = SymbolId(self.symbols.len());
        self.names.insert(SmolStr::new(name), id);
        self.symbols.push(Symbol {
            name: SmolStr::new(name),
            is_terminal: false,
            is_placeholder: false,
            int_range: None,
            terminal_rules: Vec::new(),
        });
        id
    }

    /// A terminal rule: matching `surface` produces a node for `lhs`.
    pub fn word(&mut self, surface: &str, lhs: &str, props: RuleProps) -> &mut Self {
        let lhs = self.intern(lhs);
        let word = self.intern(surface);
        self.symbols[word.0].is_terminal = true;
        self.symbols[word.0].terminal_rules.push(TerminalRule { lhs, props: Rc::new(props) });
        self
    }

    /// An anonymous-matching placeholder symbol (entity category).
    pub fn placeholder(&mut self, name: &str) -> &mut Self {
        let id = self.intern(name);
        self.symbols[id.0].is_placeholder = true;
        self
    }

    pub fn entity(&mut self, alias: &str, category: &str, id: &str, text: &str) -> &mut Self {
        let category = self.intern(category);
        self.symbols[category.0].is_placeholder = true;
        self.entities.insert(
            SmolStr::new(alias.to_lowercase()),
            EntityMatch { category, id: SmolStr::new(id), text: SmolStr::new(text) },
        );
        self
    }

    pub fn int_symbol(&mut self, name: &str, min: i64, max: i64) -> &mut Self {
        let id = self.intern(name);
        self.symbols[id.0].is_placeholder = true;
        self.symbols[id.0].int_range = Some((min, max));
        self.int_symbols.push(IntSymbolEntry { symbol: id, min, max });
        self
    }

    pub fn deletable(&mut self, word: &str) -> &mut Self {
        self.deletables.insert(SmolStr::new(word.to_lowercase()));
        self
    }

    pub fn rule(&mut self, lhs: &str, rhs: &[&str], props: RuleProps) -> &mut Self {
        self.rule_alts(lhs, rhs, vec![props])
    }

    /// A production with insertion alternatives (sorted by cost on build).
    pub fn rule_alts(&mut self, lhs: &str, rhs: &[&str], props: Vec<RuleProps>) -> &mut Self {
        self.push_prod(lhs, rhs, props, false)
    }

    /// A binary production whose children swap display order.
    pub fn transposition(&mut self, lhs: &str, rhs: &[&str], props: RuleProps) -> &mut Self {
        self.push_prod(lhs, rhs, vec![props], true)
    }

    fn push_prod(
        &mut self,
        lhs: &str,
        rhs: &[&str],
        props: Vec<RuleProps>,
        is_transposition: bool,
    ) -> &mut Self {
        assert!(
            (1..=2).contains(&rhs.len()),
            "productions must be binarized (1 or 2 RHS symbols)"
        );
        let lhs = self.intern(lhs);
        let rhs: Vec<SymbolId> = rhs.iter().map(|r| self.intern(r)).collect();
        let mut props: Vec<Rc<RuleProps>> = props.into_iter().map(Rc::new).collect();
        props.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        self.prods.push(Prod { lhs, rhs, props, is_transposition });
        self
    }

    /// Run the LR(0) item-set construction and validate the result.
    pub fn build(mut self, start: &str) -> Result<Grammar, GrammarError> {
        let start_symbol = self.intern(start);
        let accept_symbol = self.intern("[=accept=]");
        let accept_prod = self.prods.len();
        self.prods.push(Prod {
            lhs: accept_symbol,
            rhs: vec![start_symbol],
            props: vec![Rc::new(RuleProps::default())],
            is_transposition: false,
        });

        let mut by_lhs: HashMap<SymbolId, Vec<usize>> = HashMap::new();
        for (i, prod) in self.prods.iter().enumerate() {
            by_lhs.entry(prod.lhs).or_default().push(i);
        }

        // an item is (production, dot); a state is its closed item set
        type ItemSet = BTreeSet<(usize, usize)>;
        let closure = |kernel: ItemSet| -> ItemSet {
            let mut set = kernel;
            let mut work: VecDeque<(usize, usize)> = set.iter().copied().collect();
            while let Some((p, d)) = work.pop_front() {
                if d >= self.prods[p].rhs.len() {
                    continue;
                }
                let next_sym = self.prods[p].rhs[d];
                for &q in by_lhs.get(&next_sym).map(Vec::as_slice).unwrap_or(&[]) {
                    if set.insert((q, 0)) {
                        work.push_back((q, 0));
                    }
                }
            }
            set
        };

        let initial = closure(BTreeSet::from([(accept_prod, 0)]));
        let mut item_sets: Vec<ItemSet> = vec![initial.clone()];
        let mut index: HashMap<ItemSet, usize> = HashMap::from([(initial, 0)]);
        let mut transitions: Vec<Vec<(SymbolId, usize)>> = vec![Vec::new()];
        let mut work: VecDeque<usize> = VecDeque::from([0]);

        while let Some(si) = work.pop_front() {
            let mut advances: BTreeMap<SymbolId, ItemSet> = BTreeMap::new();
            for &(p, d) in &item_sets[si] {
                if d < self.prods[p].rhs.len() {
                    advances.entry(self.prods[p].rhs[d]).or_default().insert((p, d + 1));
                }
            }
            for (sym, kernel) in advances {
                let target = closure(kernel);
                let ti = match index.get(&target) {
                    Some(&t) => t,
                    None => {
                        let t = item_sets.len();
                        item_sets.push(target.clone());
                        index.insert(target, t);
                        transitions.push(Vec::new());
                        work.push_back(t);
                        t
                    }
                };
                transitions[si].push((sym, ti));
            }
        }

        let mut states = Vec::with_capacity(item_sets.len());
        for (si, items) in item_sets.iter().enumerate() {
            let shifts = transitions[si]
                .iter()
                .map(|&(symbol, ti)| Shift { symbol, next_state: StateId(ti) })
                .collect();
            let mut reductions = Vec::new();
            let mut is_accept = false;
            for &(p, d) in items {
                let prod = &self.prods[p];
                if d < prod.rhs.len() {
                    continue;
                }
                if p == accept_prod {
                    is_accept = true;
                    continue;
                }
                reductions.push(Reduction {
                    lhs: prod.lhs,
                    rhs_arity: prod.rhs.len(),
                    is_binary: prod.rhs.len() == 2,
                    is_transposition: prod.is_transposition,
                    props: prod.props.clone(),
                });
            }
            states.push(State { shifts, reductions, is_accept });
        }

        let mut int_symbols = self.int_symbols;
        int_symbols.sort_by_key(|e| (e.min, e.max));
        let max_ngram = max_ngram_len(&self.symbols, &self.entities);
        let grammar = Grammar {
            start_symbol,
            states,
            symbols: self.symbols,
            names: self.names,
            entities: self.entities,
            int_symbols,
            deletables: self.deletables,
            max_ngram_len: max_ngram,
        };
        grammar.validate()?;
        Ok(grammar)
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Demo grammar
// ---------------------------------------------------------------------------

fn text(s: &str) -> Option<TextSpec> {
    Some(TextSpec::literal(s))
}

fn inflected(inf: Inflection) -> Option<TextSpec> {
    Some(TextSpec::inflected(inf))
}

fn unreduced(name: &str) -> Option<SemanticSpec> {
    Some(SemanticSpec::Unreduced(SemanticFunc::new(name, 1, 1)))
}

fn reduced(sem: Semantic) -> Option<SemanticSpec> {
    Some(SemanticSpec::Reduced(sem))
}

fn like_verb() -> Inflection {
    Inflection {
        other: SmolStr::new("like"),
        three_sg: Some(SmolStr::new("likes")),
        past: Some(SmolStr::new("liked")),
        ..Default::default()
    }
}

fn follow_verb() -> Inflection {
    Inflection {
        other: SmolStr::new("follow"),
        three_sg: Some(SmolStr::new("follows")),
        past: Some(SmolStr::new("followed")),
        ..Default::default()
    }
}

fn work_verb() -> Inflection {
    Inflection {
        other: SmolStr::new("work"),
        three_sg: Some(SmolStr::new("works")),
        past: Some(SmolStr::new("worked")),
        ..Default::default()
    }
}

fn assign_verb() -> Inflection {
    Inflection {
        other: SmolStr::new("assign"),
        three_sg: Some(SmolStr::new("assigns")),
        past: Some(SmolStr::new("assigned")),
        ..Default::default()
    }
}

/// The bundled users / repositories / companies grammar.
pub fn demo_grammar() -> Grammar {
    let mut b = TableBuilder::new();
    let me = Semantic::arg("me");

    // terminal rules; "repos" keeps its surface form while the possessive
    // substitution below corrects to "repositories"
    b.word("repos", "[repositories-noun]", RuleProps { text: text("repos"), ..Default::default() });
    b.word(
        "repositories",
        "[repositories-noun]",
        RuleProps { text: text("repositories"), ..Default::default() },
    );
    b.word(
        "i",
        "[1-sg]",
        RuleProps {
            text: text("I"),
            person_number: Some(PersonNumber::OneSg),
            semantic: reduced(me.clone()),
            ..Default::default()
        },
    );
    b.word(
        "like",
        "[like-verb]",
        RuleProps { text: inflected(like_verb()), tense: Some(Tense::Present), ..Default::default() },
    );
    b.word(
        "liked",
        "[like-verb]",
        RuleProps { text: inflected(like_verb()), tense: Some(Tense::Past), ..Default::default() },
    );
    b.word("that", "[rel-pron]", RuleProps { text: text("that"), ..Default::default() });
    b.word("my", "[poss-det]", RuleProps { text: text("my"), ..Default::default() });
    b.word("pull", "[pull-word]", RuleProps { text: text("pull"), ..Default::default() });
    b.word("requests", "[requests-word]", RuleProps { text: text("requests"), ..Default::default() });
    b.word("of", "[of-prep]", RuleProps { text: text("of"), ..Default::default() });
    b.word("mine", "[mine-word]", RuleProps { text: text("mine"), ..Default::default() });
    b.word("people", "[users-noun]", RuleProps { text: text("people"), ..Default::default() });
    b.word("followers", "[followers-noun]", RuleProps { text: text("followers"), ..Default::default() });
    b.word(
        "follow",
        "[follow-verb]",
        RuleProps { text: inflected(follow_verb()), tense: Some(Tense::Present), ..Default::default() },
    );
    b.word(
        "followed",
        "[follow-verb]",
        RuleProps { text: inflected(follow_verb()), tense: Some(Tense::Past), ..Default::default() },
    );
    b.word("companies", "[companies-noun]", RuleProps { text: text("companies"), ..Default::default() });
    b.word("with", "[with-prep]", RuleProps { text: text("with"), ..Default::default() });
    b.word("over", "[over-qual]", RuleProps { text: text("over"), ..Default::default() });
    b.word("employees", "[employees-noun]", RuleProps { text: text("employees"), ..Default::default() });
    b.word(
        "work",
        "[work-verb]",
        RuleProps { text: inflected(work_verb()), tense: Some(Tense::Present), ..Default::default() },
    );
    b.word(
        "worked",
        "[work-verb]",
        RuleProps { text: inflected(work_verb()), tense: Some(Tense::Past), ..Default::default() },
    );
    b.word("at", "[at-prep]", RuleProps { text: text("at"), ..Default::default() });
    b.word("issues", "[issues-noun]", RuleProps { text: text("issues"), ..Default::default() });
    b.word(
        "assign",
        "[assign-verb]",
        RuleProps { text: inflected(assign_verb()), tense: Some(Tense::Present), ..Default::default() },
    );
    b.word(
        "assigned",
        "[assign-verb]",
        RuleProps { text: inflected(assign_verb()), tense: Some(Tense::Past), ..Default::default() },
    );
    b.word("to", "[to-prep]", RuleProps { text: text("to"), ..Default::default() });
    b.word(
        "me",
        "[me-obj]",
        RuleProps { text: text("me"), semantic: reduced(me.clone()), ..Default::default() },
    );
    b.word("open", "[open-adj]", RuleProps { text: text("open"), ..Default::default() });

    b.entity("acme", "[company-cat]", "acme-corp", "Acme Corp");
    b.entity("acme corp", "[company-cat]", "acme-corp", "Acme Corp");
    b.int_symbol("[int]", 0, 9999);
    for word in ["please", "show", "the", "over"] {
        b.deletable(word);
    }

    // start alternatives
    for top in ["[repositories]", "[users]", "[companies]", "[pullrequests]", "[issues]"] {
        b.rule("[start]", &[top], RuleProps::default());
    }

    // repositories: "repos I like", "repos that I like"
    b.rule(
        "[repositories]",
        &["[repos-np]"],
        RuleProps { semantic: unreduced("repositories"), ..Default::default() },
    );
    b.rule("[repos-np]", &["[repositories-noun]", "[repos-relclause]"], RuleProps::default());
    b.rule("[repos-relclause]", &["[rel-pron]", "[like-clause]"], RuleProps::default());
    b.rule(
        "[like-clause]",
        &["[1-sg]", "[like-verb]"],
        RuleProps { semantic: unreduced("repositories-liked"), ..Default::default() },
    );
    // the relative pronoun is insertable: free when omitted verbatim, cost 1
    // when the display restores "that"
    b.rule_alts(
        "[repos-relclause]",
        &["[like-clause]"],
        vec![
            RuleProps { cost: 0.0, inserted_symbol_index: Some(0), ..Default::default() },
            RuleProps {
                cost: 1.0,
                inserted_symbol_index: Some(0),
                text: text("that"),
                ..Default::default()
            },
        ],
    );

    // possessive substitution: "my repos" displays as "my repositories"
    b.rule("[repos-np]", &["[repos-poss]"], RuleProps::default());
    b.rule(
        "[repos-poss]",
        &["[poss-det]", "[repositories-noun]"],
        RuleProps {
            is_term_sequence: true,
            text: text("my repositories"),
            semantic: reduced(Semantic::Func(
                SemanticFunc::new("repositories-created", 1, 1),
                vec![me.clone()],
            )),
            ..Default::default()
        },
    );

    // transposed possessive: "repos of mine" displays as "my repos"
    b.transposition(
        "[repos-np]",
        &["[repositories-noun]", "[poss-tail]"],
        RuleProps { semantic: unreduced("repositories-created"), ..Default::default() },
    );
    b.rule(
        "[poss-tail]",
        &["[of-prep]", "[mine-word]"],
        RuleProps {
            rhs_does_not_produce_text: true,
            text: text("my"),
            semantic: reduced(me.clone()),
            ..Default::default()
        },
    );

    // pull requests: a plain term sequence under a possessive
    b.rule(
        "[pullrequests]",
        &["[prs-np]"],
        RuleProps { semantic: unreduced("pull-requests"), ..Default::default() },
    );
    b.rule(
        "[prs-np]",
        &["[poss-det]", "[pull-requests-noun]"],
        RuleProps {
            semantic: reduced(Semantic::Func(
                SemanticFunc::new("pull-requests-created", 1, 1),
                vec![me.clone()],
            )),
            ..Default::default()
        },
    );
    b.rule(
        "[pull-requests-noun]",
        &["[pull-word]", "[requests-word]"],
        RuleProps { is_term_sequence: true, ..Default::default() },
    );

    // users: "people I follow", "people I follow followers"
    b.rule(
        "[users]",
        &["[users-np]"],
        RuleProps { semantic: unreduced("users"), ..Default::default() },
    );
    b.rule(
        "[users-np]",
        &["[users-followed-np]", "[followers-noun]"],
        RuleProps { semantic: unreduced("followers"), ..Default::default() },
    );
    b.rule("[users-np]", &["[users-followed-np]"], RuleProps::default());
    b.rule("[users-followed-np]", &["[users-noun]", "[follow-clause]"], RuleProps::default());
    b.rule(
        "[follow-clause]",
        &["[1-sg]", "[follow-verb]"],
        RuleProps { semantic: unreduced("users-followed"), ..Default::default() },
    );

    // companies: employee counts and past-tense work history
    b.rule(
        "[companies]",
        &["[comp-np]"],
        RuleProps { semantic: unreduced("companies"), ..Default::default() },
    );
    b.rule(
        "[companies]",
        &["[company-cat]"],
        RuleProps { semantic: unreduced("companies"), ..Default::default() },
    );
    b.rule("[comp-np]", &["[companies-noun]", "[comp-pp]"], RuleProps::default());
    b.rule("[comp-pp]", &["[with-prep]", "[emp-clause]"], RuleProps::default());
    b.rule("[emp-base]", &["[int]", "[employees-noun]"], RuleProps::default());
    b.rule(
        "[emp-clause]",
        &["[emp-base]"],
        RuleProps { semantic: unreduced("companies-employee-count"), ..Default::default() },
    );
    b.rule(
        "[emp-over-np]",
        &["[over-qual]", "[emp-base]"],
        RuleProps { semantic: unreduced("companies-employee-count-over"), ..Default::default() },
    );
    b.rule("[emp-clause]", &["[emp-over-np]"], RuleProps::default());
    b.rule("[comp-np]", &["[companies-noun]", "[worked-relclause]"], RuleProps::default());
    b.rule(
        "[worked-relclause]",
        &["[subj-work]", "[at-prep]"],
        RuleProps {
            semantic: unreduced("companies-worked-at"),
            accepted_tense: Some(Tense::Past),
            ..Default::default()
        },
    );
    b.rule("[subj-work]", &["[1-sg]", "[work-verb]"], RuleProps::default());

    // issues: the assignment clause always displays in the past form, no
    // matter which form was typed
    b.rule(
        "[issues]",
        &["[issues-np]"],
        RuleProps { semantic: unreduced("issues"), ..Default::default() },
    );
    b.rule("[issues-np]", &["[issues-noun]", "[assigned-clause]"], RuleProps::default());
    b.rule(
        "[assigned-clause]",
        &["[assign-verb]", "[to-me]"],
        RuleProps {
            semantic: unreduced("issues-assigned"),
            grammatical_form: Some(GrammaticalForm::Past),
            ..Default::default()
        },
    );
    b.rule("[to-me]", &["[to-prep]", "[me-obj]"], RuleProps::default());
    b.rule(
        "[issues-np]",
        &["[open-adj]", "[issues-noun]"],
        RuleProps {
            semantic: reduced(Semantic::Func(
                SemanticFunc::new("issues-state", 1, 1),
                vec![Semantic::arg("open")],
            )),
            ..Default::default()
        },
    );

    b.build("[start]").expect("demo grammar must compile")
}

/// A minimal compiled-grammar document for load tests and `tt parse -g`.
pub static DEMO_GRAMMAR_JSON: &str = indoc! {r#"
    {
      "startSymbol": "[start]",
      "states": [
        { "shifts": [ { "symbol": "[noun]", "stateIndex": 1 },
                      { "symbol": "[start]", "stateIndex": 2 } ] },
        { "reductions": [ { "lhs": "[start]", "rhsArity": 1,
                            "ruleProps": { "cost": 0.0,
                                           "semantic": { "name": "repositories",
                                                         "minParams": 0,
                                                         "maxParams": 1 } } } ] },
        { "isAccept": true }
      ],
      "symbolTable": {
        "[start]": {},
        "[noun]": {},
        "repos": { "isTerminal": true,
                   "terminalRules": [ { "lhs": "[noun]",
                                        "ruleProps": { "cost": 0.0,
                                                       "text": "repositories" } } ] }
      },
      "deletables": ["please"]
    }
"#};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_grammar_compiles() {
        let g = demo_grammar();
        assert!(g.state_count() > 10);
        // the initial state shifts every top-level category
        for sym in ["[repositories-noun]", "[poss-det]", "[users-noun]", "[companies-noun]"] {
            let id = g.lookup(sym).unwrap();
            assert!(g.shift(StateId(0), id).is_some(), "state 0 must shift {sym}");
        }
    }

    #[test]
    fn demo_grammar_has_placeholders() {
        let g = demo_grammar();
        let cat = g.lookup("[company-cat]").unwrap();
        assert!(g.symbol(cat).is_placeholder);
        let int = g.lookup("[int]").unwrap();
        assert_eq!(g.symbol(int).int_range, Some((0, 9999)));
        assert_eq!(g.entities().get_vec("acme corp").map(Vec::len), Some(1));
    }

    #[test]
    fn demo_json_fixture_loads() {
        let g = Grammar::from_json_str(DEMO_GRAMMAR_JSON).unwrap();
        assert_eq!(g.state_count(), 3);
        assert!(g.is_deletable("please"));
    }

    #[test]
    fn builder_rejects_unary_cycles() {
        let mut b = TableBuilder::new();
        b.word("x", "[x-cat]", RuleProps::default());
        b.rule("[a]", &["[b]"], RuleProps::default());
        b.rule("[b]", &["[a]"], RuleProps::default());
        b.rule("[a]", &["[x-cat]"], RuleProps::default());
        b.rule("[start]", &["[a]"], RuleProps::default());
        assert!(matches!(b.build("[start]"), Err(GrammarError::RecursiveRule(_))));
    }
}
