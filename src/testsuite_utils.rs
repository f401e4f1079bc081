//! The built-in query suite shared by `tt suite` and the integration tests.
//!
//! Each case runs one query through the engine and checks ranked results by
//! position: display text, canonical semantic, cost, result count, or the
//! absence of any result at all.

use crate::query::{Engine, ParseOptions, QueryReply};

/// One expectation against a reply's ranked results.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Display text of the result at `rank` (0 = top).
    Text { rank: usize, expected: &'static str },
    /// Canonical semantic string of the result at `rank`.
    Semantic { rank: usize, expected: &'static str },
    /// Exact cost of the result at `rank`.
    Cost { rank: usize, expected: f64 },
    /// Total number of results.
    Count(usize),
    /// The query must produce no results even after the deletable retry.
    NoResults,
}

/// A query test case.
#[derive(Debug, Clone)]
pub struct QueryCase {
    pub name: &'static str,
    pub query: &'static str,
    pub expect: Vec<Expectation>,
}

#[derive(Debug, Clone)]
pub enum CaseOutcome {
    Pass,
    Fail { expected: String, actual: String },
    EngineError(String),
}

/// Options every suite case runs with.
pub fn suite_options() -> ParseOptions {
    ParseOptions { semantics: true, costs: true, ..Default::default() }
}

pub fn run_case(engine: &Engine, case: &QueryCase) -> CaseOutcome {
    let reply = match engine.parse(case.query, &suite_options()) {
        Ok(reply) => reply,
        Err(e) => return CaseOutcome::EngineError(e.to_string()),
    };
    for expectation in &case.expect {
        if let Some(outcome) = check(&reply, expectation) {
            return outcome;
        }
    }
    CaseOutcome::Pass
}

fn check(reply: &QueryReply, expectation: &Expectation) -> Option<CaseOutcome> {
    let fail = |expected: String, actual: String| Some(CaseOutcome::Fail { expected, actual });
    match expectation {
        Expectation::Text { rank, expected } => match reply.results.get(*rank) {
            Some(r) if r.text == *expected => None,
            Some(r) => fail(format!("text[{rank}] = {expected:?}"), format!("{:?}", r.text)),
            None => fail(format!("text[{rank}] = {expected:?}"), "no such result".into()),
        },
        Expectation::Semantic { rank, expected } => match reply.results.get(*rank) {
            Some(r) if r.semantic.as_deref() == Some(*expected) => None,
            Some(r) => fail(
                format!("semantic[{rank}] = {expected}"),
                format!("{:?}", r.semantic),
            ),
            None => fail(format!("semantic[{rank}] = {expected}"), "no such result".into()),
        },
        Expectation::Cost { rank, expected } => match reply.results.get(*rank) {
            Some(r) if r.cost.map(|c| (c - expected).abs() < 1e-9) == Some(true) => None,
            Some(r) => fail(format!("cost[{rank}] = {expected}"), format!("{:?}", r.cost)),
            None => fail(format!("cost[{rank}] = {expected}"), "no such result".into()),
        },
        Expectation::Count(expected) => {
            if reply.results.len() == *expected {
                None
            } else {
                fail(format!("{expected} result(s)"), format!("{} result(s)", reply.results.len()))
            }
        }
        Expectation::NoResults => {
            if reply.results.is_empty() {
                None
            } else {
                fail("no results".into(), format!("{} result(s)", reply.results.len()))
            }
        }
    }
}

/// Every case the built-in suite runs against the demo grammar.
pub fn builtin_query_cases() -> Vec<QueryCase> {
    vec![
        QueryCase {
            name: "repos-liked",
            query: "repos I like",
            expect: vec![
                Expectation::Text { rank: 0, expected: "repos I like" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "repositories(repositories-liked(me))",
                },
                Expectation::Cost { rank: 0, expected: 0.0 },
                // the "that"-insertion variant reduces to the same semantic
                // and is deduplicated away
                Expectation::Count(1),
            ],
        },
        QueryCase {
            name: "possessive-substitution",
            query: "my repos",
            expect: vec![
                Expectation::Text { rank: 0, expected: "my repositories" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "repositories(repositories-created(me))",
                },
            ],
        },
        QueryCase {
            name: "relative-pronoun-verbatim",
            query: "repos that I like",
            expect: vec![
                Expectation::Text { rank: 0, expected: "repos that I like" },
                Expectation::Cost { rank: 0, expected: 0.0 },
            ],
        },
        QueryCase {
            name: "employee-count-over",
            query: "companies with over 5 employees",
            expect: vec![
                Expectation::Text { rank: 0, expected: "companies with over 5 employees" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "companies(companies-employee-count-over(5))",
                },
                Expectation::Cost { rank: 0, expected: 0.0 },
                // deleting "over" costs 1, so the bare count ranks second
                Expectation::Text { rank: 1, expected: "companies with 5 employees" },
                Expectation::Semantic {
                    rank: 1,
                    expected: "companies(companies-employee-count(5))",
                },
                Expectation::Cost { rank: 1, expected: 1.0 },
            ],
        },
        QueryCase {
            name: "followers-of-followed",
            query: "people I follow followers",
            expect: vec![Expectation::Semantic {
                rank: 0,
                expected: "users(followers(users-followed(me)))",
            }],
        },
        QueryCase {
            name: "unknown-token-fails",
            query: "ppl I follow",
            expect: vec![Expectation::NoResults],
        },
        QueryCase {
            name: "accepted-past-tense",
            query: "companies I worked at",
            expect: vec![
                Expectation::Text { rank: 0, expected: "companies I worked at" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "companies(companies-worked-at(me))",
                },
            ],
        },
        QueryCase {
            name: "present-tense-not-forced",
            query: "companies I work at",
            expect: vec![
                Expectation::Text { rank: 0, expected: "companies I work at" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "companies(companies-worked-at(me))",
                },
            ],
        },
        QueryCase {
            name: "transposed-possessive",
            query: "repos of mine",
            expect: vec![
                Expectation::Text { rank: 0, expected: "my repos" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "repositories(repositories-created(me))",
                },
            ],
        },
        QueryCase {
            name: "term-sequence-merge",
            query: "my pull requests",
            expect: vec![
                Expectation::Text { rank: 0, expected: "my pull requests" },
                Expectation::Semantic {
                    rank: 0,
                    expected: "pull-requests(pull-requests-created(me))",
                },
            ],
        },
        QueryCase {
            name: "entity-canonical-casing",
            query: "acme corp",
            expect: vec![
                Expectation::Text { rank: 0, expected: "Acme Corp" },
                Expectation::Semantic { rank: 0, expected: "companies(acme-corp)" },
            ],
        },
        QueryCase {
            name: "deletables-around-entity",
            query: "please show the acme",
            expect: vec![
                Expectation::Text { rank: 0, expected: "Acme Corp" },
                Expectation::Cost { rank: 0, expected: 3.0 },
            ],
        },
        QueryCase {
            name: "integer-out-of-range",
            query: "companies with over 99999 employees",
            expect: vec![Expectation::NoResults],
        },
        QueryCase {
            name: "forced-past-form",
            query: "issues assign to me",
            expect: vec![
                Expectation::Text { rank: 0, expected: "issues assigned to me" },
                Expectation::Semantic { rank: 0, expected: "issues(issues-assigned(me))" },
            ],
        },
        QueryCase {
            name: "forced-past-form-verbatim",
            query: "issues assigned to me",
            expect: vec![
                Expectation::Text { rank: 0, expected: "issues assigned to me" },
                Expectation::Semantic { rank: 0, expected: "issues(issues-assigned(me))" },
            ],
        },
        QueryCase {
            name: "adjective-state",
            query: "open issues",
            expect: vec![
                Expectation::Text { rank: 0, expected: "open issues" },
                Expectation::Semantic { rank: 0, expected: "issues(issues-state(open))" },
            ],
        },
    ]
}
