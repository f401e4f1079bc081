//! End-to-end scenarios through `Engine::parse` against the demo grammar.

use tomtit::builtin_grammars::{demo_grammar, DEMO_GRAMMAR_JSON};
use tomtit::grammar::Grammar;
use tomtit::query::{Engine, ParseOptions};
use tomtit::testsuite_utils::{builtin_query_cases, run_case, CaseOutcome};

fn options() -> ParseOptions {
    ParseOptions { semantics: true, costs: true, ..Default::default() }
}

#[test]
fn builtin_suite_passes() {
    let engine = Engine::new(demo_grammar());
    for case in builtin_query_cases() {
        match run_case(&engine, &case) {
            CaseOutcome::Pass => {}
            CaseOutcome::Fail { expected, actual } => {
                panic!("case {}: expected {expected}, got {actual}", case.name)
            }
            CaseOutcome::EngineError(e) => panic!("case {}: engine error {e}", case.name),
        }
    }
}

#[test]
fn top_result_text_reparses_to_the_same_semantic() {
    let engine = Engine::new(demo_grammar());
    for query in [
        "repos I like",
        "my repos",
        "repos of mine",
        "people I follow followers",
        "companies with over 5 employees",
        "companies I worked at",
        "my pull requests",
        "issues assign to me",
        "open issues",
    ] {
        let reply = engine.parse(query, &options()).unwrap();
        let top = &reply.results[0];
        let reparsed = engine.parse(&top.text, &options()).unwrap();
        assert_eq!(
            reparsed.results[0].semantic, top.semantic,
            "round-trip failed for {query:?} -> {:?}",
            top.text
        );
    }
}

#[test]
fn deletable_retry_recovers_nothing_for_unknown_words() {
    // "ppl" is neither a terminal nor deletable: the first pass and the
    // all-deletable retry both fail, and the result set is empty
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("ppl I follow", &options()).unwrap();
    assert!(reply.results.is_empty());
    assert!(!reply.partial);
}

#[test]
fn deletable_noise_costs_one_per_token() {
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("please show the acme", &options()).unwrap();
    assert_eq!(reply.results[0].text, "Acme Corp");
    assert_eq!(reply.results[0].cost, Some(3.0));

    // trailing noise attaches forward
    let reply = engine.parse("acme please", &options()).unwrap();
    assert_eq!(reply.results[0].text, "Acme Corp");
    assert_eq!(reply.results[0].cost, Some(1.0));
}

#[test]
fn transposition_swaps_display_order() {
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("repos of mine", &options()).unwrap();
    assert_eq!(reply.results[0].text, "my repos");
    assert_eq!(
        reply.results[0].semantic.as_deref(),
        Some("repositories(repositories-created(me))")
    );
}

#[test]
fn tense_is_normalized_without_an_accepting_rule() {
    // "liked" matches the like-verb in the past tense, but no enclosing rule
    // accepts past there, so the display falls back to the subject form
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("repos I liked", &options()).unwrap();
    assert_eq!(reply.results[0].text, "repos I like");
    assert_eq!(
        reply.results[0].semantic.as_deref(),
        Some("repositories(repositories-liked(me))")
    );
}

#[test]
fn object_semantics_serializes_nested_functions() {
    let engine = Engine::new(demo_grammar());
    let opts = ParseOptions { object_semantics: true, ..options() };
    let reply = engine.parse("repos I like", &opts).unwrap();
    let object = reply.results[0].semantic_object.as_ref().unwrap();
    assert_eq!(object["name"], "repositories");
    assert_eq!(object["args"][0]["name"], "repositories-liked");
    assert_eq!(object["args"][0]["args"][0], "me");
}

#[test]
fn debug_dumps_render_on_request() {
    let engine = Engine::new(demo_grammar());
    let opts = ParseOptions {
        parse_forest: true,
        parse_stack: true,
        parse_forest_graph: true,
        ..options()
    };
    let reply = engine.parse("repos I like", &opts).unwrap();
    assert!(reply.parse_forest.as_ref().unwrap().contains("[repos-np]"));
    assert!(reply.parse_stack.as_ref().unwrap().contains("boundary 3"));
    assert!(reply.parse_forest_graph.as_ref().unwrap().starts_with("digraph"));
}

#[test]
fn json_loaded_grammar_drives_the_engine() {
    let grammar = Grammar::from_json_str(DEMO_GRAMMAR_JSON).unwrap();
    let engine = Engine::new(grammar);
    let reply = engine.parse("repos", &options()).unwrap();
    assert_eq!(reply.results[0].text, "repositories");
    assert_eq!(reply.results[0].semantic.as_deref(), Some("repositories()"));

    // deletable noise around the one recognized terminal
    let reply = engine.parse("please repos please", &options()).unwrap();
    assert_eq!(reply.results[0].text, "repositories");
    assert_eq!(reply.results[0].cost, Some(2.0));
}

#[test]
fn default_k_is_seven() {
    let opts = ParseOptions::default();
    assert_eq!(opts.k, 7);
}
