use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use nucsearch::batch;
use nucsearch::cache::DiskCache;
use nucsearch::config::Config;
use nucsearch::error::NucError;
use nucsearch::fetch::{Fetcher, HttpRetriever, Retriever};
use nucsearch::progress::Progress;
use nucsearch::scan::{ScanOptions, Scanner};
use nucsearch::server::{self, AppState};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("NUCSEARCH_BUILD_COMMIT"),
    ")"
);

/// Download a nucleotide record and search it for a pattern.
/// The record is cached as <ID>.fasta and reused on later runs.
#[derive(Parser)]
#[command(
    name = "nucsearch",
    version = VERSION,
    about,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// The nucleotide ID (e.g. 224589800).
    nucleotide_id: Option<String>,

    /// The pattern to search for (e.g. AATCGA). Regular expression unless --literal.
    pattern: Option<String>,

    /// Directory holding cached <ID>.fasta files.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Case-insensitive matching.
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Treat the pattern as literal text, not a regular expression.
    #[arg(long)]
    literal: bool,

    /// Machine-readable JSON output.
    #[arg(long)]
    json: bool,

    /// Do not draw a download progress bar.
    #[arg(long)]
    no_progress: bool,

    /// TOML config file (also read from $NUCSEARCH_CONFIG).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print shell completions for the given shell.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve GET /search/?pattern=<PATTERN> over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Record searched when a request has no `id` parameter.
        #[arg(long, value_name = "ID")]
        record: Option<String>,

        /// Results per page.
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Shell completions
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "nucsearch", &mut io::stdout());
        return;
    }

    let serving = matches!(cli.command, Some(Command::Serve { .. }));
    init_tracing(cli.verbose.saturating_add(u8::from(serving)));

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            process::exit(e.exit_code());
        }
    };

    if let Some(Command::Serve {
        bind,
        record,
        page_size,
    }) = cli.command
    {
        if let Some(bind) = bind {
            config.service.bind = bind;
        }
        if let Some(record) = record {
            config.service.record_id = record;
        }
        if let Some(n) = page_size {
            config.service.page_size = n.max(1);
        }
        process::exit(serve(&config));
    }

    let (Some(id), Some(pattern)) = (cli.nucleotide_id, cli.pattern) else {
        eprintln!("usage: nucsearch <NUCLEOTIDE_ID> <PATTERN> [--cache-dir DIR] [--ignore-case] [--literal]");
        process::exit(3);
    };

    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }

    let options = ScanOptions {
        ignore_case: cli.ignore_case,
        literal: cli.literal,
    };
    let progress = Progress::new(!cli.no_progress && !cli.json);
    process::exit(search(&config, &id, &pattern, options, progress, cli.json));
}

/// Batch search. Returns the process exit code.
fn search(
    config: &Config,
    id: &str,
    pattern: &str,
    options: ScanOptions,
    progress: Progress,
    json: bool,
) -> i32 {
    let scanner = match Scanner::compile(pattern, options) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let retriever = match HttpRetriever::new(&config.eutils) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let fetcher = Fetcher::new(retriever, config.eutils.database.clone());
    let cache = DiskCache::new(&config.cache.dir);

    let result = batch::run(&fetcher, &cache, id, &scanner, &progress);
    let report = batch::report(result, id, pattern, &cache, &cache.path(id), json);
    for line in &report.stderr {
        eprintln!("{line}");
    }
    for line in &report.stdout {
        println!("{line}");
    }
    report.exit_code
}

fn serve(config: &Config) -> i32 {
    // The blocking HTTP client must be built, and finally dropped, outside
    // the async runtime; `retriever` outlives `runtime` for that reason.
    let retriever: Arc<dyn Retriever> = match HttpRetriever::new(&config.eutils) {
        Ok(r) => Arc::new(r),
        Err(e) => return fail(&e),
    };
    let state = AppState::new(Arc::clone(&retriever), config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("serve error: {e}");
            return 1;
        }
    };

    match runtime.block_on(server::serve(state, &config.service.bind)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("serve error: {}: {e}", config.service.bind);
            1
        }
    }
}

fn fail(e: &NucError) -> i32 {
    eprintln!("{e}");
    e.exit_code()
}

/// Logs go to stderr; stdout carries only results.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nucsearch={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
