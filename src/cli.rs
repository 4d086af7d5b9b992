use crate::commands::{
    run_sample, run_score, run_strategy_check, run_strategy_list, SampleArgs, ScoreArgs,
    StrategyCheckArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use trait_affinity::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "vnxp",
    about = "Score VNDB character ratings into trait affinity profiles",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Re-score an exported report and print the projected profile
    Score(ScoreArgs),
    /// Inspect scoring strategies
    Strategy {
        #[command(subcommand)]
        command: StrategyCommand,
    },
    /// Filter and sample a character list the way a test session would
    Sample(SampleArgs),
}

#[derive(Subcommand, Debug)]
enum StrategyCommand {
    /// Load and validate a strategy by key or path, then summarize it
    Check(StrategyCheckArgs),
    /// List the strategy keys the configured directory provides
    List,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Strategy {
            command: StrategyCommand::Check(args),
        } => run_strategy_check(args),
        Command::Strategy {
            command: StrategyCommand::List,
        } => run_strategy_list(),
        Command::Sample(args) => run_sample(args).await,
    }
}
