use argh::FromArgs;
use std::ffi::OsString;
use std::process;
use tomtit::builtin_grammars::demo_grammar;
use tomtit::grammar::Grammar;
use tomtit::query::{Engine, ParseOptions};

#[derive(FromArgs)]
/// Parse one query and print the k-best results
#[argh(subcommand, name = "parse")]
pub struct Parse {
    /// the query to parse
    #[argh(positional)]
    query: String,

    /// compiled grammar JSON file (default: the bundled demo grammar)
    #[argh(option, short = 'g')]
    grammar: Option<OsString>,

    /// maximum number of results
    #[argh(option, short = 'k', default = "7")]
    k: usize,

    /// print the canonical semantic per result
    #[argh(switch, short = 's')]
    semantics: bool,

    /// print the semantic as a JSON object per result
    #[argh(switch)]
    object_semantics: bool,

    /// print the cost per result
    #[argh(switch, short = 'c')]
    costs: bool,

    /// print a parse-tree outline per result
    #[argh(switch, short = 't')]
    trees: bool,

    /// annotate trees with node costs
    #[argh(switch)]
    tree_node_costs: bool,

    /// annotate trees with token ranges
    #[argh(switch)]
    tree_token_ranges: bool,

    /// only print the summary line
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// dump the packed forest
    #[argh(switch)]
    parse_forest: bool,

    /// dump the packed forest as graphviz
    #[argh(switch)]
    parse_forest_graph: bool,

    /// dump the graph-structured stack
    #[argh(switch)]
    parse_stack: bool,

    /// wall-clock limit in milliseconds
    #[argh(option)]
    deadline_ms: Option<u64>,
}

impl Parse {
    pub fn run(self) {
        let grammar = match &self.grammar {
            Some(path) => match Grammar::from_json_file(path) {
                Ok(g) => g,
                Err(e) => {
                    eprintln!("🔥 failed to load grammar: {e}");
                    process::exit(1);
                }
            },
            None => demo_grammar(),
        };

        let opts = ParseOptions {
            k: self.k,
            quiet: self.quiet,
            semantics: self.semantics || self.object_semantics,
            object_semantics: self.object_semantics,
            costs: self.costs,
            trees: self.trees || self.tree_node_costs || self.tree_token_ranges,
            tree_node_costs: self.tree_node_costs,
            tree_token_ranges: self.tree_token_ranges,
            parse_stack: self.parse_stack,
            parse_forest: self.parse_forest,
            parse_forest_graph: self.parse_forest_graph,
            deadline_ms: self.deadline_ms,
        };

        let engine = Engine::new(grammar);
        let reply = match engine.parse(&self.query, &opts) {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("💥 internal error: {e}");
                process::exit(2);
            }
        };

        if let Some(dump) = &reply.parse_stack {
            println!("=== parse stack ===\n{dump}");
        }
        if let Some(dump) = &reply.parse_forest {
            println!("=== parse forest ===\n{dump}");
        }
        if let Some(dump) = &reply.parse_forest_graph {
            println!("=== forest graph ===\n{dump}");
        }

        if !opts.quiet {
            for (rank, result) in reply.results.iter().enumerate() {
                let mut line = format!("{}. {}", rank + 1, result.text);
                if let Some(cost) = result.cost {
                    line.push_str(&format!("  (cost {cost})"));
                }
                println!("{line}");
                if let Some(semantic) = &result.semantic {
                    println!("   {semantic}");
                }
                if let Some(object) = &result.semantic_object {
                    println!("   {object}");
                }
                if let Some(tree) = &result.tree {
                    print!("{tree}");
                }
            }
        }

        let partial = if reply.partial { " (partial: deadline reached)" } else { "" };
        println!("{} result(s){partial}", reply.results.len());
    }
}
