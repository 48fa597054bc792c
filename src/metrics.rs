use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct VideoMetrics {
    acquisitions: AtomicU64,
    acquisition_failures: AtomicU64,
    discarded_acquisitions: AtomicU64,
    publishes: AtomicU64,
    unpublishes: AtomicU64,
    announcements_sent: AtomicU64,
    announcements_received: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoMetricsSnapshot {
    pub acquisitions: u64,
    pub acquisition_failures: u64,
    pub discarded_acquisitions: u64,
    pub publishes: u64,
    pub unpublishes: u64,
    pub announcements_sent: u64,
    pub announcements_received: u64,
    pub evictions: u64,
}

impl VideoMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_acquisitions_total");
    }

    pub fn record_acquisition_failure(&self) {
        self.acquisition_failures.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_acquisition_failures_total");
    }

    pub fn record_discarded_acquisition(&self) {
        self.discarded_acquisitions.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_discarded_acquisitions_total");
    }

    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_publishes_total");
    }

    pub fn record_unpublish(&self) {
        self.unpublishes.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_unpublishes_total");
    }

    pub fn record_announcement_sent(&self) {
        self.announcements_sent.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_announcements_sent_total");
    }

    pub fn record_announcement_received(&self) {
        self.announcements_received.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_announcements_received_total");
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        ::metrics::increment_counter!("mesh_video_evictions_total");
    }

    pub fn snapshot(&self) -> VideoMetricsSnapshot {
        VideoMetricsSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            acquisition_failures: self.acquisition_failures.load(Ordering::Relaxed),
            discarded_acquisitions: self.discarded_acquisitions.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            unpublishes: self.unpublishes.load(Ordering::Relaxed),
            announcements_sent: self.announcements_sent.load(Ordering::Relaxed),
            announcements_received: self.announcements_received.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
