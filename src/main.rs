use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphutil::config::{DEFAULT_GRAPH_ROOT, DRIVER_ENV, GraphConfig, UnmigratedPolicy};
use graphutil::error::Result;
use graphutil::logging::{LogLevel, init_logging};
use graphutil::output::Format;

#[derive(Parser)]
#[command(
    name = "graphutil",
    version,
    about = "Utility for operating on the docker graph",
    after_help = "Stop the docker daemon before running any command."
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Docker graph directory
    #[arg(short = 'g', long = "graph", global = true, default_value = DEFAULT_GRAPH_ROOT)]
    graph: PathBuf,
    /// Docker graph driver
    #[arg(short = 's', long, global = true, env = DRIVER_ENV)]
    driver: Option<String>,
    /// Output format for the final report
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    format: Format,
    /// Plan and count substitutions without renaming or writing anything
    #[arg(long, global = true)]
    dry_run: bool,
    /// Skip images that have no cache-id file instead of aborting
    #[arg(long, global = true)]
    skip_unmigrated: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrambles image IDs in the graph directory
    Scramble,
    /// Downgrades the graph to be compatible with older versions of Docker
    Downgrade,
}

impl Cli {
    fn config(&self) -> GraphConfig {
        let policy = if self.skip_unmigrated {
            UnmigratedPolicy::Skip
        } else {
            UnmigratedPolicy::Abort
        };
        GraphConfig::new(&self.graph, self.driver.clone()).with_unmigrated(policy)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    tracing::debug!(
        graph = %config.graph_root.display(),
        driver = config.driver.as_deref().unwrap_or("<unset>"),
        "Resolved configuration"
    );

    match cli.command {
        Commands::Scramble => graphutil::commands::scramble::run(&config, cli.dry_run, cli.format),
        Commands::Downgrade => {
            graphutil::commands::downgrade::run(&config, cli.dry_run, cli.format)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbose(cli.verbose));

    let format = cli.format;
    if let Err(e) = run(cli) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
