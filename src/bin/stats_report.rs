//! Print aggregated session statistics as JSON
//!
//! Run with: cargo run --bin stats_report -- [--project NAME] [--from YYYY-MM-DD]
//!     [--to YYYY-MM-DD] [--model NAME] [--data-dir PATH]

use std::process::ExitCode;

use clap::Parser;
use codecenter_lib::usage::{format_cost, parse_claude_data, SessionStore, StatsFilters, StorePaths};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stats_report")]
#[command(about = "Print aggregated Claude Code session statistics as JSON")]
struct Args {
    /// Only sessions attributed to this project (case-insensitive)
    #[arg(long)]
    project: Option<String>,

    /// Earliest session start date, YYYY-MM-DD (inclusive)
    #[arg(long)]
    from: Option<String>,

    /// Latest session start date, YYYY-MM-DD (inclusive)
    #[arg(long)]
    to: Option<String>,

    /// Substring of the session's primary model
    #[arg(long)]
    model: Option<String>,

    /// Claude data directory (default: $CLAUDE_CONFIG_DIR or ~/.claude)
    #[arg(long)]
    data_dir: Option<String>,
}

impl Args {
    fn filters(&self) -> StatsFilters {
        StatsFilters::new()
            .with_date_range(self.from.clone(), self.to.clone())
            .with_project(self.project.clone())
            .with_model(self.model.clone())
            .without_blanks()
    }
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Bad usage exits with status 2
    let args = Args::parse();

    let store = SessionStore::new(StorePaths::from_env(args.data_dir.as_deref()));
    let filters = args.filters();
    let filters = (!filters.is_empty()).then_some(&filters);
    let stats = parse_claude_data(&store, filters);

    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize stats: {e}");
            return ExitCode::FAILURE;
        }
    }

    eprintln!(
        "{} sessions, {} messages, {} estimated across {} projects",
        stats.total_sessions,
        stats.total_messages,
        format_cost(stats.estimated_cost),
        stats.project_stats.len()
    );
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let args = Args::try_parse_from([
            "stats_report", "--project", "web", "--from", "2026-03-01", "--model", "opus",
        ])
        .unwrap();
        let filters = args.filters();
        assert_eq!(filters.project.as_deref(), Some("web"));
        assert_eq!(filters.from.as_deref(), Some("2026-03-01"));
        assert_eq!(filters.to, None);
        assert_eq!(filters.model.as_deref(), Some("opus"));
        assert_eq!(args.data_dir, None);

        let bare = Args::try_parse_from(["stats_report"]).unwrap();
        assert!(bare.filters().is_empty());
        let blank = Args::try_parse_from(["stats_report", "--project", ""]).unwrap();
        assert!(blank.filters().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let missing = Args::try_parse_from(["stats_report", "--project"]).unwrap_err();
        assert_eq!(missing.exit_code(), 2);
        assert!(Args::try_parse_from(["stats_report", "--verbose"]).is_err());
    }
}
