//! CLI wrapper for the jsdeob techniques.
//!
//! Usage:
//!   jsdeob -t object-property -d table.js target.js
//!   jsdeob -t scope-literals < target.js
//!   jsdeob --beautify target.js

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use jsdeob::config::Config;
use jsdeob::deob::{beautify, Technique};
use tracing::debug;

/// Semi-automated JavaScript deobfuscation
#[derive(Parser, Debug)]
#[command(name = "jsdeob")]
#[command(about = "Rewrite obfuscated JavaScript using a description of the obfuscation", long_about = None)]
struct Args {
    /// Technique to apply (object-property, indexed-array, string-variables,
    /// scope-literals, call-pattern, eval-packer)
    #[arg(short, long)]
    technique: Option<Technique>,

    /// File holding the description script
    #[arg(short, long)]
    description: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Time limit in milliseconds for sandboxed techniques
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum inlining sweeps for scope-literals
    #[arg(long)]
    max_sweeps: Option<usize>,

    /// Only reformat the target
    #[arg(long)]
    beautify: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Target file (if not provided, reads from stdin)
    target: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail(&e.to_string())),
        None => Config::default(),
    };
    merge_args(&mut config, &args);

    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    debug!(?config, "configuration");

    let target = match &config.target {
        Some(path) => read_file(path),
        None => {
            let mut source = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut source) {
                fail(&format!("Error reading stdin: {}", e));
            }
            source
        }
    };

    let output = if args.beautify {
        beautify(&target).unwrap_or_else(|e| fail(&e.to_string()))
    } else {
        run_technique(&config, &target)
    };
    println!("{}", output);
}

fn merge_args(config: &mut Config, args: &Args) {
    if args.technique.is_some() {
        config.technique = args.technique;
    }
    if args.description.is_some() {
        config.description = args.description.clone();
    }
    if args.target.is_some() {
        config.target = args.target.clone();
    }
    if args.timeout_ms.is_some() {
        config.sandbox_timeout_ms = args.timeout_ms;
    }
    if let Some(max_sweeps) = args.max_sweeps {
        config.max_sweeps = max_sweeps;
    }
    match args.verbose {
        0 => {}
        1 => config.log_filter = "info".to_string(),
        _ => config.log_filter = "debug".to_string(),
    }
}

fn run_technique(config: &Config, target: &str) -> String {
    let technique = config
        .technique
        .unwrap_or_else(|| fail("No technique given; use --technique or --beautify"));
    let description = match &config.description {
        Some(path) => read_file(path),
        None if technique == Technique::ScopeLiterals => String::new(),
        None => fail(&format!("Technique '{}' needs a --description file", technique)),
    };
    let options = config.technique_options();

    if !technique.is_async() {
        return technique
            .deobfuscate_with(&description, target, &options)
            .unwrap_or_else(|e| fail(&e.to_string()));
    }

    let runtime = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| fail(&format!("Error starting runtime: {}", e)));
    let result = runtime.block_on(async {
        let work = technique.deobfuscate_async_with(&description, target, &options);
        match config.sandbox_timeout() {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or_else(|_| fail(&format!("Timed out after {:?}", limit))),
            None => work.await,
        }
    });
    // A runaway sandbox thread must not keep the process alive.
    runtime.shutdown_background();
    result.unwrap_or_else(|e| fail(&e.to_string()))
}

fn read_file(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Error reading file '{}': {}", path.display(), e)))
}

fn fail(message: &str) -> ! {
    eprintln!("jsdeob: {}", message);
    process::exit(1);
}
