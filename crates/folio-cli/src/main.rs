//! Folio CLI - drive the analytics core from the command line
//!
//! Simulates visits against a file-backed store and reads the stored data
//! back as dashboard metrics or recent activity.

mod commands;

use clap::{Parser, Subcommand};
use commands::{DashboardCommand, RecentCommand, SimulateCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FOLIO_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "FOLIO_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted visit through the tracking core
    Simulate(SimulateCommand),
    /// Print dashboard metrics for a date range
    Dashboard(DashboardCommand),
    /// List the most recent sessions or events
    Recent(RecentCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "folio_cli={level},\
             folio_core={level},\
             folio_entities={level},\
             folio_geo={level},\
             folio_store={level},\
             folio_analytics={level},\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Simulate(cmd) => cmd.execute(),
        Commands::Dashboard(cmd) => cmd.execute(),
        Commands::Recent(cmd) => cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use folio_store::{AnalyticsStore, FileDocumentStore};

    fn run(args: &[&str]) -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("folio").chain(args.iter().copied()))?;
        match cli.command {
            Commands::Simulate(cmd) => cmd.execute(),
            Commands::Dashboard(cmd) => cmd.execute(),
            Commands::Recent(cmd) => cmd.execute(),
        }
    }

    fn simulate(store: &str, visitor: &str) -> anyhow::Result<()> {
        run(&[
            "simulate",
            "--store",
            store,
            "--visitor-state",
            visitor,
            "--pages",
            "/,/blog",
            "--referrer",
            "https://www.google.com/",
            "--convert",
        ])
    }

    fn open_store(path: &Path) -> (tokio::runtime::Runtime, AnalyticsStore) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let documents = rt.block_on(FileDocumentStore::open(path)).unwrap();
        (rt, AnalyticsStore::new(Arc::new(documents)))
    }

    #[test]
    fn test_simulated_visits_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("analytics.json");
        let visitor_path = dir.path().join("visitor.json");
        let store = store_path.to_str().unwrap();
        let visitor = visitor_path.to_str().unwrap();

        simulate(store, visitor).unwrap();
        // same visitor state, new tab: a returning visitor with a second session
        simulate(store, visitor).unwrap();

        run(&["dashboard", "--store", store, "--json"]).unwrap();
        run(&["recent", "--store", store, "sessions"]).unwrap();

        let (rt, analytics) = open_store(&store_path);
        let sessions = rt.block_on(analytics.get_recent_sessions(10));
        assert_eq!(sessions.len(), 2);
        assert_ne!(sessions[0].id, sessions[1].id);
        assert_eq!(sessions[0].visitor_id, sessions[1].visitor_id);
        for session in &sessions {
            assert_eq!(session.pageviews, 2);
            assert!(!session.is_bounce);
            assert_eq!(session.referrer.domain, "google.com");
        }

        let visitor = rt
            .block_on(analytics.get_visitor(&sessions[0].visitor_id))
            .unwrap();
        assert_eq!(visitor.total_sessions, 2);
        let signups = rt.block_on(analytics.get_recent_events(10, Some("newsletter_success")));
        assert_eq!(signups.len(), 2);
    }

    #[test]
    fn test_dashboard_rejects_inverted_period() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("analytics.json");
        let result = run(&[
            "dashboard",
            "--store",
            store_path.to_str().unwrap(),
            "--from",
            "2024-06-10",
            "--to",
            "2024-06-01",
        ]);
        assert!(result.is_err());
    }
}
