use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use codescout::{commands, diagnostics};

/// Exit code for any runtime error.
const EXIT_ERROR: u8 = 3;

#[derive(Parser)]
#[command(
    name = "codescout",
    version,
    about = "Identifier occurrences, dependency graphs, and impact analysis for Python code"
)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Silence everything below warnings.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Corpus to analyze: a local directory, a local git repository, or a `file://` URL.
    #[arg(long, global = true, default_value = ".")]
    root: String,
    /// Log debug detail.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show who last changed a committed line
    Blame {
        /// File path relative to the root.
        file: PathBuf,
        /// One-based line number.
        line: u32,
    },
    /// Inspect or empty the corpus cache
    Cache {
        /// Cache operation.
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List every occurrence of a symbol
    Find {
        /// Exact identifier name.
        symbol: String,
    },
    /// Print the symbol dependency graph
    Graph,
    /// Summarize what changing a symbol would affect
    Impact {
        /// Exact identifier name.
        symbol: String,
    },
    /// Scan the corpus and print the symbol index
    Scan {
        /// File-name glob selecting units (default from config, else `*.py`).
        #[arg(long)]
        glob: Option<String>,
    },
    /// Regex search over file lines
    Search {
        /// File-name glob selecting files (default: the unit glob).
        #[arg(long)]
        glob: Option<String>,
        /// Regular expression matched against each line.
        pattern: String,
    },
    /// Answer line-delimited JSON requests on stdin
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove cached copies
    Clear {
        /// Remove only this locator's copy.
        #[arg(long)]
        locator: Option<String>,
    },
    /// List cached copies and their sizes
    Info,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let root = cli.root.as_str();
    let result = match &cli.command {
        Commands::Blame { file, line } => commands::blame(root, file, *line),
        Commands::Cache {
            action: CacheAction::Clear { locator },
        } => commands::cache_clear(locator.as_deref()),
        Commands::Cache {
            action: CacheAction::Info,
        } => commands::cache_info(),
        Commands::Find { symbol } => commands::find(root, symbol),
        Commands::Graph => commands::graph(root),
        Commands::Impact { symbol } => commands::impact(root, symbol),
        Commands::Scan { glob } => commands::scan(root, glob.as_deref()),
        Commands::Search { glob, pattern } => commands::search(root, pattern, glob.as_deref()),
        Commands::Serve => commands::serve(),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_ERROR)
        },
    };
}

/// Route `log` output to stderr; `RUST_LOG` wins unless a flag overrides it.
fn init_logging(verbose: bool, quiet: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}
