use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use folio_analytics::{
    AnalyticsProvider, BrowserEnvironment, ClientStorages, EventCatalog, PageTracker,
    ProviderState, TrackingContext,
};
use folio_core::{format_duration, AnalyticsConfig, FileStorage, ManualClock, MemoryStorage};
use folio_geo::{GeolocationService, MockGeolocationService};
use tracing::{debug, info};

use super::StoreArgs;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DOCUMENT_HEIGHT: f64 = 3200.0;
const VIEWPORT: (u32, u32) = (1280, 800);

#[derive(Args)]
pub struct SimulateCommand {
    #[command(flatten)]
    store: StoreArgs,

    /// Site origin the visit happens on
    #[arg(long, default_value = "https://folio.dev")]
    site: String,

    /// Paths visited in order, comma separated
    #[arg(long, value_delimiter = ',', default_value = "/,/blog")]
    pages: Vec<String>,

    /// Referrer of the landing page, e.g. https://www.google.com/
    #[arg(long)]
    referrer: Option<String>,

    /// User agent of the simulated browser
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Time spent on each page, in milliseconds of simulated time
    #[arg(long, default_value_t = 15_000)]
    dwell_ms: u64,

    /// File holding the persistent visitor storage; reuse it to simulate a returning visitor
    #[arg(long, env = "FOLIO_VISITOR_STATE", default_value = "folio-visitor.json")]
    visitor_state: PathBuf,

    /// Resolve a location with the mock geolocation service
    #[arg(long)]
    mock_geo: bool,

    /// Finish the visit with a newsletter signup
    #[arg(long)]
    convert: bool,
}

impl SimulateCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.site.trim_end_matches('/'), path)
    }

    async fn run(self) -> anyhow::Result<()> {
        let config = AnalyticsConfig::from_env()?;
        let store = self.store.open().await?;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let storages = ClientStorages::new(
            Arc::new(FileStorage::open(&self.visitor_state)?),
            Arc::new(MemoryStorage::new()),
        );

        let landing = self.pages.first().cloned().unwrap_or_else(|| "/".to_string());
        let mut env = BrowserEnvironment::at(&self.url(&landing))
            .with_user_agent(self.user_agent.clone())
            .with_screen(1920, 1080, 24)
            .with_viewport(VIEWPORT.0, VIEWPORT.1)
            .with_document_height(DOCUMENT_HEIGHT);
        if let Some(referrer) = &self.referrer {
            env = env.with_referrer(referrer.clone());
        }

        let throttle = config.scroll_throttle();
        let mut builder = TrackingContext::builder(config, env)
            .clock(clock.clone())
            .storages(storages)
            .store(store);
        if self.mock_geo {
            builder = builder.geolocation(GeolocationService::Mock(MockGeolocationService::new()));
        }
        let provider = AnalyticsProvider::new(builder.build()?);

        let state = provider.mount().await?;
        if let ProviderState::Gated(reason) = state {
            println!("{} {}", "Visit not tracked:".bright_yellow().bold(), reason);
            provider.unload().await?;
            return Ok(());
        }
        let analytics = provider.analytics()?;
        let session_id = analytics.session_id().unwrap_or_default();
        let visitor_id = analytics.visitor_id().unwrap_or_default();
        info!("Simulating visit of {} pages", self.pages.len());

        let pages = PageTracker::new(analytics.clone());
        let scrollable = DOCUMENT_HEIGHT - VIEWPORT.1 as f64;
        for (index, path) in self.pages.iter().enumerate() {
            if index > 0 {
                provider.context().navigate(&self.url(path));
            }
            if pages.track(path).await.is_none() {
                debug!("No pageview recorded for {}", path);
                continue;
            }
            for step in 1..=4 {
                // let the throttle window pass between samples
                tokio::time::sleep(throttle + Duration::from_millis(10)).await;
                analytics.scroll(scrollable * step as f64 / 4.0).await;
            }
            clock.advance_millis(self.dwell_ms as i64);
        }

        if self.convert {
            analytics.track_newsletter(true, None).await;
        }
        provider.unload().await?;

        let session = provider.context().store().get_session(&session_id).await;
        println!();
        println!("{}", "Visit recorded".bright_green().bold());
        println!("  {} {}", "Visitor:".bright_white(), visitor_id);
        println!("  {} {}", "Session:".bright_white(), session_id);
        if let Some(session) = session {
            println!("  {} {}", "Pageviews:".bright_white(), session.pageviews);
            println!("  {} {}", "Events:".bright_white(), session.events);
            println!(
                "  {} {}",
                "Duration:".bright_white(),
                format_duration(session.duration)
            );
            println!(
                "  {} {} ({})",
                "Referrer:".bright_white(),
                if session.referrer.domain.is_empty() { "direct" } else { session.referrer.domain.as_str() },
                session.referrer.referrer_type
            );
            if !session.geo.is_unknown() {
                println!(
                    "  {} {}, {}",
                    "Location:".bright_white(),
                    session.geo.city,
                    session.geo.country
                );
            }
        }
        println!(
            "  {} {}",
            "Store:".bright_white(),
            self.store.path.display().to_string().dimmed()
        );
        println!();
        Ok(())
    }
}
