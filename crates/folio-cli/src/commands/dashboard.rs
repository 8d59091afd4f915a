use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use colored::Colorize;
use folio_core::{format_duration, UtcDateTime};
use folio_entities::DashboardMetrics;

use super::StoreArgs;

#[derive(Args)]
pub struct DashboardCommand {
    #[command(flatten)]
    store: StoreArgs,

    /// First day of the period (YYYY-MM-DD), defaults to six days before --to
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the period (YYYY-MM-DD), defaults to today
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Print the metrics as JSON
    #[arg(long)]
    json: bool,
}

/// Whole UTC days `from..=to` as a timestamp range
fn period(from: NaiveDate, to: NaiveDate) -> (UtcDateTime, UtcDateTime) {
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

fn trend(change: f64) -> String {
    let text = format!("{:+.1}%", change);
    if change > 0.0 {
        text.bright_green().to_string()
    } else if change < 0.0 {
        text.bright_red().to_string()
    } else {
        text.dimmed().to_string()
    }
}

impl DashboardCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let to = self.to.unwrap_or_else(|| Utc::now().date_naive());
        let from = self.from.unwrap_or(to - Duration::days(6));
        if from > to {
            anyhow::bail!("--from ({}) must not be after --to ({})", from, to);
        }

        let rt = tokio::runtime::Runtime::new()?;
        let (metrics, daily) = rt.block_on(async {
            let store = self.store.open().await?;
            let (start, end) = period(from, to);
            let metrics = store
                .get_dashboard_metrics(start, end)
                .await
                .ok_or_else(|| anyhow::anyhow!("Failed to compute dashboard metrics"))?;
            let daily = store.get_daily_stats(&from.to_string(), &to.to_string()).await;
            anyhow::Ok((metrics, daily))
        })?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            return Ok(());
        }

        print_metrics(&metrics, from, to);
        if !daily.is_empty() {
            println!("{}", "Daily".bright_white().bold());
            for (date, stats) in &daily {
                println!(
                    "  {}  {:>6} pageviews  {:>6} events",
                    date,
                    stats.pageviews(),
                    stats.events()
                );
            }
            println!();
        }
        Ok(())
    }
}

fn print_metrics(metrics: &DashboardMetrics, from: NaiveDate, to: NaiveDate) {
    let overview = &metrics.overview;
    let trends = &metrics.trends;

    println!();
    println!("{} {} → {}", "Dashboard".bright_green().bold(), from, to);
    println!();
    println!(
        "  {} {} ({})",
        "Visitors:".bright_white(),
        overview.unique_visitors,
        trend(trends.visitors_change)
    );
    println!("  {} {}", "Returning:".bright_white(), overview.returning_visitors);
    println!("  {} {}", "Sessions:".bright_white(), overview.total_sessions);
    println!(
        "  {} {} ({})",
        "Pageviews:".bright_white(),
        overview.total_pageviews,
        trend(trends.pageviews_change)
    );
    println!("  {} {}", "Events:".bright_white(), overview.total_events);
    println!(
        "  {} {} ({})",
        "Avg session:".bright_white(),
        format_duration(overview.avg_session_duration.round() as u64),
        trend(trends.session_duration_change)
    );
    println!(
        "  {} {:.1}% ({})",
        "Bounce rate:".bright_white(),
        overview.bounce_rate,
        trend(trends.bounce_rate_change)
    );
    println!();

    if !metrics.top_pages.is_empty() {
        println!("{}", "Top pages".bright_white().bold());
        for page in &metrics.top_pages {
            println!(
                "  {:<32} {:>6} views  {:>6} unique  {:>5.1}% bounce",
                page.path, page.views, page.unique_views, page.bounce_rate
            );
        }
        println!();
    }

    if !metrics.top_referrers.is_empty() {
        println!("{}", "Top referrers".bright_white().bold());
        for referrer in &metrics.top_referrers {
            println!(
                "  {:<32} {:<9} {:>6} sessions  {:>4} conversions",
                referrer.domain,
                referrer.referrer_type.to_string(),
                referrer.sessions,
                referrer.conversions
            );
        }
        println!();
    }

    let devices = &metrics.devices;
    println!(
        "{} desktop {}  mobile {}  tablet {}",
        "Devices".bright_white().bold(),
        devices.desktop,
        devices.mobile,
        devices.tablet
    );
    for browser in &metrics.browsers {
        println!("  {:<20} {:>5.1}%", browser.name, browser.percentage);
    }
    println!();

    if !metrics.countries.is_empty() {
        println!("{}", "Countries".bright_white().bold());
        for country in &metrics.countries {
            let name = if country.name.is_empty() { "Unknown" } else { country.name.as_str() };
            println!("  {:<20} {:>5.1}%", name, country.percentage);
        }
        println!();
    }

    if !metrics.events.is_empty() {
        println!("{}", "Events".bright_white().bold());
        for event in &metrics.events {
            println!(
                "  {:<28} {:<11} {:>6} times  {:>5} users",
                event.name,
                event.category.as_str(),
                event.count,
                event.unique_users
            );
        }
        println!();
    }
}
