use clap::{Args, Subcommand};
use colored::Colorize;
use folio_core::format_duration;
use folio_store::{DEFAULT_RECENT_EVENTS, DEFAULT_RECENT_SESSIONS};

use super::StoreArgs;

#[derive(Args)]
pub struct RecentCommand {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: RecentCommands,
}

#[derive(Subcommand)]
enum RecentCommands {
    /// Most recently started sessions
    Sessions {
        #[arg(long, default_value_t = DEFAULT_RECENT_SESSIONS)]
        limit: usize,
    },
    /// Most recent events, optionally of one name
    Events {
        #[arg(long, default_value_t = DEFAULT_RECENT_EVENTS)]
        limit: usize,
        /// Only events with this name, e.g. scroll_depth
        #[arg(long)]
        name: Option<String>,
    },
}

impl RecentCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let store = self.store.open().await?;
            match &self.command {
                RecentCommands::Sessions { limit } => {
                    let sessions = store.get_recent_sessions(*limit).await;
                    if sessions.is_empty() {
                        println!("{}", "No sessions recorded.".bright_yellow());
                    }
                    for session in sessions {
                        println!(
                            "{} {}  {} pv  {} ev  {}  {}{}",
                            session.started_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                            session.id.bright_white(),
                            session.pageviews,
                            session.events,
                            format_duration(session.duration),
                            session.referrer.referrer_type,
                            if session.is_bounce { "  bounce" } else { "" }
                        );
                    }
                }
                RecentCommands::Events { limit, name } => {
                    let events = store.get_recent_events(*limit, name.as_deref()).await;
                    if events.is_empty() {
                        println!("{}", "No events recorded.".bright_yellow());
                    }
                    for event in events {
                        println!(
                            "{} {:<24} {:<11} {}  {}",
                            event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                            event.name.bright_white(),
                            event.category.as_str(),
                            event.label.as_deref().unwrap_or("-"),
                            event.path
                        );
                    }
                }
            }
            anyhow::Ok(())
        })
    }
}
