use argh::FromArgs;
mod cmd_parse;
mod cmd_suite;

#[derive(FromArgs)]
/// A GLR natural-language query engine
struct Args {
    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
/// parse a query or run the suite
#[argh(subcommand)]
enum Subcommand {
    Parse(cmd_parse::Parse),
    Suite(cmd_suite::RunSuite),
}

impl Subcommand {
    fn run(self) {
        match self {
            Subcommand::Parse(cmd) => cmd.run(),
            Subcommand::Suite(cmd) => cmd.run(),
        }
    }
}

fn main() {
    env_logger::init();
    argh::from_env::<Args>().subcommand.run();
}
