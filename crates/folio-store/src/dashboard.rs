//! Client-side aggregation of fetched record sets into dashboard metrics

use std::collections::{HashMap, HashSet};

use folio_core::UtcDateTime;
use folio_entities::{
    AnalyticsEvent, BrowserStat, CountryStat, DashboardMetrics, DeviceBreakdown, DeviceType,
    EventCategory, EventStat, Overview, PageStat, Pageview, Period, ReferrerStat, Session, Trends,
};

const TOP_N: usize = 10;

/// Records of one period, as fetched from the store
#[derive(Debug, Default, Clone)]
pub struct PeriodRecords {
    pub sessions: Vec<Session>,
    pub pageviews: Vec<Pageview>,
    pub events: Vec<AnalyticsEvent>,
}

pub fn compute_dashboard(
    start: UtcDateTime,
    end: UtcDateTime,
    current: &PeriodRecords,
    previous: &PeriodRecords,
) -> DashboardMetrics {
    let current_overview = overview(current);
    let previous_overview = overview(previous);

    DashboardMetrics {
        period: Period { start, end },
        trends: Trends {
            visitors_change: percent_change(
                previous_overview.unique_visitors as f64,
                current_overview.unique_visitors as f64,
            ),
            pageviews_change: percent_change(
                previous_overview.total_pageviews as f64,
                current_overview.total_pageviews as f64,
            ),
            session_duration_change: percent_change(
                previous_overview.avg_session_duration,
                current_overview.avg_session_duration,
            ),
            bounce_rate_change: percent_change(
                previous_overview.bounce_rate,
                current_overview.bounce_rate,
            ),
        },
        overview: current_overview,
        top_pages: top_pages(current),
        top_referrers: top_referrers(current),
        devices: devices(&current.sessions),
        browsers: browsers(&current.sessions),
        countries: countries(&current.sessions),
        events: top_events(&current.events),
    }
}

fn overview(records: &PeriodRecords) -> Overview {
    let sessions = &records.sessions;
    let mut sessions_per_visitor: HashMap<&str, u64> = HashMap::new();
    for session in sessions {
        *sessions_per_visitor.entry(session.visitor_id.as_str()).or_default() += 1;
    }

    let unique_visitors = sessions_per_visitor.len() as u64;
    let returning_visitors = sessions_per_visitor.values().filter(|n| **n > 1).count() as u64;
    let total_sessions = sessions.len() as u64;
    let bounces = sessions.iter().filter(|s| s.is_bounce).count() as f64;

    Overview {
        total_visitors: unique_visitors,
        unique_visitors,
        total_sessions,
        total_pageviews: records.pageviews.len() as u64,
        total_events: records.events.len() as u64,
        avg_session_duration: average(sessions.iter().map(|s| s.duration as f64)),
        bounce_rate: ratio_percent(bounces, total_sessions as f64),
        returning_visitors,
    }
}

fn top_pages(records: &PeriodRecords) -> Vec<PageStat> {
    struct PageAccumulator<'a> {
        title: &'a str,
        views: u64,
        visitors: HashSet<&'a str>,
        total_time: f64,
    }

    let mut pages: HashMap<&str, PageAccumulator> = HashMap::new();
    for pv in &records.pageviews {
        let entry = pages.entry(pv.path.as_str()).or_insert_with(|| PageAccumulator {
            title: pv.title.as_str(),
            views: 0,
            visitors: HashSet::new(),
            total_time: 0.0,
        });
        entry.views += 1;
        entry.visitors.insert(pv.visitor_id.as_str());
        entry.total_time += pv.time_on_page as f64;
    }

    // Entry page of each session: its earliest pageview
    let mut entry_pages: HashMap<&str, &Pageview> = HashMap::new();
    for pv in &records.pageviews {
        entry_pages
            .entry(pv.session_id.as_str())
            .and_modify(|current| {
                if pv.timestamp < current.timestamp {
                    *current = pv;
                }
            })
            .or_insert(pv);
    }
    let bounced: HashMap<&str, bool> = records
        .sessions
        .iter()
        .map(|s| (s.id.as_str(), s.is_bounce))
        .collect();
    let mut entries_by_path: HashMap<&str, (u64, u64)> = HashMap::new();
    for (session_id, pv) in &entry_pages {
        if let Some(is_bounce) = bounced.get(session_id) {
            let counts = entries_by_path.entry(pv.path.as_str()).or_default();
            counts.0 += 1;
            if *is_bounce {
                counts.1 += 1;
            }
        }
    }

    let mut stats: Vec<PageStat> = pages
        .into_iter()
        .map(|(path, acc)| {
            let (entries, bounces) = entries_by_path.get(path).copied().unwrap_or((0, 0));
            PageStat {
                path: path.to_string(),
                title: acc.title.to_string(),
                views: acc.views,
                unique_views: acc.visitors.len() as u64,
                avg_time_on_page: acc.total_time / acc.views as f64,
                bounce_rate: ratio_percent(bounces as f64, entries as f64),
            }
        })
        .collect();
    stats.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));
    stats.truncate(TOP_N);
    stats
}

fn top_referrers(records: &PeriodRecords) -> Vec<ReferrerStat> {
    let converted: HashSet<&str> = records
        .events
        .iter()
        .filter(|e| e.category == EventCategory::Conversion)
        .map(|e| e.session_id.as_str())
        .collect();

    let mut referrers: HashMap<&str, ReferrerStat> = HashMap::new();
    for session in &records.sessions {
        let domain = session.referrer.domain.as_str();
        if domain.is_empty() {
            continue;
        }
        let stat = referrers.entry(domain).or_insert_with(|| ReferrerStat {
            domain: domain.to_string(),
            referrer_type: session.referrer.referrer_type,
            sessions: 0,
            conversions: 0,
        });
        stat.sessions += 1;
        if converted.contains(session.id.as_str()) {
            stat.conversions += 1;
        }
    }

    let mut stats: Vec<ReferrerStat> = referrers.into_values().collect();
    stats.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.domain.cmp(&b.domain)));
    stats.truncate(TOP_N);
    stats
}

fn devices(sessions: &[Session]) -> DeviceBreakdown {
    let mut breakdown = DeviceBreakdown::default();
    for session in sessions {
        match session.device.device_type {
            DeviceType::Desktop => breakdown.desktop += 1,
            DeviceType::Mobile => breakdown.mobile += 1,
            DeviceType::Tablet => breakdown.tablet += 1,
            DeviceType::Unknown => {}
        }
    }
    breakdown
}

fn browsers(sessions: &[Session]) -> Vec<BrowserStat> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for session in sessions {
        *counts.entry(session.device.browser.as_str()).or_default() += 1;
    }
    let total = sessions.len() as f64;

    let mut stats: Vec<BrowserStat> = counts
        .into_iter()
        .map(|(name, sessions)| BrowserStat {
            name: name.to_string(),
            sessions,
            percentage: ratio_percent(sessions as f64, total),
        })
        .collect();
    stats.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.name.cmp(&b.name)));
    stats
}

fn countries(sessions: &[Session]) -> Vec<CountryStat> {
    let mut counts: HashMap<&str, (&str, u64)> = HashMap::new();
    for session in sessions {
        let entry = counts
            .entry(session.geo.country_code.as_str())
            .or_insert((session.geo.country.as_str(), 0));
        entry.1 += 1;
    }
    let total = sessions.len() as f64;

    let mut stats: Vec<CountryStat> = counts
        .into_iter()
        .map(|(code, (name, sessions))| CountryStat {
            code: code.to_string(),
            name: name.to_string(),
            sessions,
            percentage: ratio_percent(sessions as f64, total),
        })
        .collect();
    stats.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.code.cmp(&b.code)));
    stats
}

fn top_events(events: &[AnalyticsEvent]) -> Vec<EventStat> {
    let mut grouped: HashMap<&str, (EventCategory, u64, HashSet<&str>)> = HashMap::new();
    for event in events {
        let entry = grouped
            .entry(event.name.as_str())
            .or_insert_with(|| (event.category, 0, HashSet::new()));
        entry.1 += 1;
        entry.2.insert(event.visitor_id.as_str());
    }

    let mut stats: Vec<EventStat> = grouped
        .into_iter()
        .map(|(name, (category, count, users))| EventStat {
            name: name.to_string(),
            category,
            count,
            unique_users: users.len() as u64,
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(TOP_N);
    stats
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn ratio_percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

/// Relative change from `previous` to `current`, in percent.
/// Growth from nothing counts as +100%.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(0.0, 0.0), 0.0);
        assert_eq!(percent_change(0.0, 5.0), 100.0);
        assert_eq!(percent_change(10.0, 15.0), 50.0);
        assert_eq!(percent_change(10.0, 5.0), -50.0);
    }

    #[test]
    fn test_empty_period() {
        let now = chrono::Utc::now();
        let metrics = compute_dashboard(now, now, &PeriodRecords::default(), &PeriodRecords::default());
        assert_eq!(metrics.overview, Overview::default());
        assert!(metrics.top_pages.is_empty());
        assert_eq!(metrics.trends, Trends::default());
    }
}
