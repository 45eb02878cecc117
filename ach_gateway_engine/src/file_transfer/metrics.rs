use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex},
};

use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MissingConfig,
    MergeFailure,
    BookkeepingFailure,
    FileUploaded,
    UploadFailure,
    FileDownloaded,
    DownloadFailure,
    ReturnReconciled,
    ReturnFailure,
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Metric::MissingConfig => "missing_file_transfer_config",
            Metric::MergeFailure => "merge_failure",
            Metric::BookkeepingFailure => "bookkeeping_failure",
            Metric::FileUploaded => "file_uploaded",
            Metric::UploadFailure => "upload_failure",
            Metric::FileDownloaded => "file_downloaded",
            Metric::DownloadFailure => "download_failure",
            Metric::ReturnReconciled => "return_reconciled",
            Metric::ReturnFailure => "return_failure",
        };
        f.write_str(s)
    }
}

impl Metric {
    fn is_failure(&self) -> bool {
        !matches!(self, Metric::FileUploaded | Metric::FileDownloaded | Metric::ReturnReconciled)
    }
}

/// Receives counter increments from the file transfer controller. Each increment is labelled with the routing number
/// it applies to.
pub trait MetricsReporter: Send + Sync {
    fn increment(&self, metric: Metric, routing_number: &str);
}

impl<T: MetricsReporter + ?Sized> MetricsReporter for Arc<T> {
    fn increment(&self, metric: Metric, routing_number: &str) {
        (**self).increment(metric, routing_number)
    }
}

/// Writes every increment to the log. Failures are logged at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetrics;

impl MetricsReporter for LogMetrics {
    fn increment(&self, metric: Metric, routing_number: &str) {
        if metric.is_failure() {
            warn!("📊️ {metric} [{routing_number}] +1");
        } else {
            debug!("📊️ {metric} [{routing_number}] +1");
        }
    }
}

/// Keeps counts in memory. Used in tests.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    counts: Mutex<HashMap<(Metric, String), u64>>,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The total for the metric across all routing numbers.
    pub fn count(&self, metric: Metric) -> u64 {
        match self.counts.lock() {
            Ok(counts) => counts.iter().filter(|((m, _), _)| *m == metric).map(|(_, v)| *v).sum(),
            Err(_) => 0,
        }
    }

    pub fn count_for(&self, metric: Metric, routing_number: &str) -> u64 {
        match self.counts.lock() {
            Ok(counts) => counts.get(&(metric, routing_number.to_string())).copied().unwrap_or_default(),
            Err(_) => 0,
        }
    }
}

impl MetricsReporter for CountingMetrics {
    fn increment(&self, metric: Metric, routing_number: &str) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry((metric, routing_number.to_string())).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_by_metric_and_routing_number() {
        let metrics = Arc::new(CountingMetrics::new());
        let reporter: Arc<dyn MetricsReporter> = metrics.clone();
        reporter.increment(Metric::MissingConfig, "121042882");
        reporter.increment(Metric::MissingConfig, "121042882");
        reporter.increment(Metric::MissingConfig, "231380104");
        reporter.increment(Metric::FileUploaded, "231380104");
        assert_eq!(metrics.count(Metric::MissingConfig), 3);
        assert_eq!(metrics.count_for(Metric::MissingConfig, "121042882"), 2);
        assert_eq!(metrics.count_for(Metric::FileUploaded, "121042882"), 0);
        assert_eq!(metrics.count(Metric::UploadFailure), 0);
        LogMetrics.increment(Metric::UploadFailure, "121042882");
    }
}
