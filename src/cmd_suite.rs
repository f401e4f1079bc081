use argh::FromArgs;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::process;
use tomtit::builtin_grammars::demo_grammar;
use tomtit::query::Engine;
use tomtit::testsuite_utils::{builtin_query_cases, run_case, CaseOutcome};

#[derive(FromArgs)]
/// Run the built-in query suite against the demo grammar
#[argh(subcommand, name = "suite")]
pub struct RunSuite {
    /// only run cases whose name contains this string
    #[argh(positional)]
    filter: Option<String>,

    /// output file for results (default: suite-results.txt)
    #[argh(option, short = 'o', default = "String::from(\"suite-results.txt\")")]
    output: String,
}

impl RunSuite {
    pub fn run(self) {
        let engine = Engine::new(demo_grammar());
        let cases: Vec<_> = builtin_query_cases()
            .into_iter()
            .filter(|c| self.filter.as_deref().map_or(true, |f| c.name.contains(f)))
            .collect();
        println!("Running {} case(s)", cases.len());

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.output)
            .expect("could not create output file");
        writeln!(file, "=== tomtit query suite ===").unwrap();
        writeln!(file, "Filter: {:?}", self.filter).unwrap();
        writeln!(file).unwrap();

        let mut stats: HashMap<&str, usize> = HashMap::new();
        for case in &cases {
            print!("🧪 {} ... ", case.name);
            let outcome = run_case(&engine, case);
            let category = match &outcome {
                CaseOutcome::Pass => "pass",
                CaseOutcome::Fail { .. } => "fail",
                CaseOutcome::EngineError(_) => "engine_error",
            };
            *stats.entry(category).or_insert(0) += 1;

            match &outcome {
                CaseOutcome::Pass => {
                    println!("✅ PASS");
                    writeln!(file, "PASS {}", case.name).unwrap();
                }
                CaseOutcome::Fail { expected, actual } => {
                    println!("❌ FAIL");
                    writeln!(file, "FAIL {}", case.name).unwrap();
                    writeln!(file, "  Expected: {expected}").unwrap();
                    writeln!(file, "  Actual:   {actual}").unwrap();
                    writeln!(file).unwrap();
                }
                CaseOutcome::EngineError(e) => {
                    println!("💥 ERROR");
                    writeln!(file, "ERROR {}", case.name).unwrap();
                    writeln!(file, "  {e}").unwrap();
                    writeln!(file).unwrap();
                }
            }
        }

        writeln!(file).unwrap();
        writeln!(file, "=== SUMMARY ===").unwrap();
        println!();
        println!("=== SUMMARY ===");
        for (category, count) in &stats {
            writeln!(file, "{category}: {count}").unwrap();
            println!("{category}: {count}");
        }
        println!("Results written to: {}", self.output);

        let failures = cases.len() - stats.get("pass").copied().unwrap_or(0);
        if failures > 0 {
            process::exit(1);
        }
    }
}
