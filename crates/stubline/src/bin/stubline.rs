//! Stubline rules CLI
//!
//! Checks declarative intercept rule files and shows which rule would answer
//! a given request.
//!
//! Usage:
//!   stubline check rules.yaml [--fixtures e2e/fixtures]
//!   stubline match rules.yaml GET https://api.example.com/api/tags

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stubline::fixtures::{DirectoryFixtureSource, FixtureSource};
use stubline::logging::init_tracing;
use stubline::registry::{MatchOutcome, RuleRegistry};
use stubline::{EngineConfig, InterceptedRequest, RuleFile};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Stubline - check intercept rule files
#[derive(Parser, Debug)]
#[command(name = "stubline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine config file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a rules file: patterns compile and referenced fixtures exist
    Check {
        /// Rules file
        rules: PathBuf,

        /// Fixtures directory (overrides the config's fixturesDir)
        #[arg(short, long)]
        fixtures: Option<PathBuf>,
    },
    /// Show which rule answers METHOD URL, or that it would pass through
    Match {
        /// Rules file
        rules: PathBuf,
        method: String,
        url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Command::Check { rules, fixtures } => {
            let dir = fixtures.unwrap_or_else(|| config.fixtures_dir.clone());
            check(&rules, dir)
        }
        Command::Match { rules, method, url } => match_request(&rules, &method, &url),
    }
}

fn check(path: &Path, fixtures_dir: PathBuf) -> anyhow::Result<()> {
    println!("{BOLD}{CYAN}Stubline rules check{RESET}");
    println!("{DIM}Rules:{RESET}    {}", path.display());
    println!("{DIM}Fixtures:{RESET} {}", fixtures_dir.display());
    println!();

    let file = RuleFile::from_file(path)?;
    for rule in &file.rules {
        let alias = rule
            .alias
            .as_deref()
            .map(|a| format!(" {DIM}as{RESET} @{a}"))
            .unwrap_or_default();
        println!("  {GREEN}✓{RESET} {}{alias}", rule.route);
    }

    let source = DirectoryFixtureSource::new(fixtures_dir);
    let mut missing = 0;
    for name in file.fixture_names() {
        match source.load(name) {
            Ok(_) => println!("  {GREEN}✓{RESET} fixture {name}"),
            Err(e) => {
                missing += 1;
                println!("  {RED}✗{RESET} fixture {name}: {e:#}");
            }
        }
    }

    println!();
    if missing > 0 {
        anyhow::bail!("{missing} referenced fixture(s) could not be loaded");
    }
    println!(
        "{GREEN}{BOLD}OK{RESET} {} rule(s), {} fixture(s)",
        file.rules.len(),
        file.fixture_names().len()
    );
    Ok(())
}

fn match_request(path: &Path, method: &str, url: &str) -> anyhow::Result<()> {
    let file = RuleFile::from_file(path)?;
    let registry = RuleRegistry::new();
    let handles = file.load_into(&registry)?;

    let request = InterceptedRequest::new(method, url);
    match registry.resolve_match(&request) {
        MatchOutcome::Matched(rule) => {
            let index = handles
                .iter()
                .position(|h| *h == rule.handle)
                .context("matched rule missing from rules file")?;
            let spec = &file.rules[index];
            println!(
                "{GREEN}{BOLD}matched{RESET} rules[{index}] {} -> {}",
                spec.route,
                rule.source.kind()
            );
            if let Some(ref alias) = spec.alias {
                println!("  {DIM}alias:{RESET} @{alias}");
            }
        }
        MatchOutcome::NoMatch => {
            println!("{YELLOW}{BOLD}pass-through{RESET} no rule matches {method} {url}");
        }
    }
    Ok(())
}
