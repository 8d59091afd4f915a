use serde::{Deserialize, Serialize};

/// Page load and Core Web Vitals measurements, all zero when unavailable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    pub ttfb: f64,
    pub fcp: f64,
    pub lcp: f64,
    pub cls: f64,
    pub fid: f64,
    pub inp: f64,
    pub page_load_time: f64,
    pub dom_content_loaded: f64,
    pub resource_count: u32,
    pub resource_size: u64,
}

/// Metrics reported after the initial snapshot, as the browser observes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebVital {
    Lcp,
    Cls,
    Fid,
    Inp,
}

impl PerformanceMetrics {
    pub fn set_vital(&mut self, vital: WebVital, value: f64) {
        match vital {
            WebVital::Lcp => self.lcp = value,
            WebVital::Cls => self.cls = value,
            WebVital::Fid => self.fid = value,
            WebVital::Inp => self.inp = value,
        }
    }
}
