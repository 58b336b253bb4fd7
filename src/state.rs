use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{sync::Arc, time::Instant};
use tokio::sync::RwLock;

use crate::utils::monitor::Reading;

/* ------------ 直播狀態（監控 + 人數） ------------ */
#[derive(Debug, Clone, Default)]
pub struct StreamStatus {
    pub is_live:           bool,
    pub uptime:            i64,
    pub viewer_count:      usize,
    pub last_check:        Option<DateTime<Utc>>,
    pub stream_started_at: Option<DateTime<Utc>>,
    pub media_sequence:    Option<u64>,
}

/* ------------ 管理員可改的文字 -------------- */
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub title:        String,
    #[serde(default)]
    pub description:  String,
    #[serde(default)]
    pub announcement: String,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            title:        "Live Stream".into(),
            description:  "The stream has not started yet...".into(),
            announcement: String::new(),
        }
    }
}

#[derive(Default)]
struct Board {
    status:     StreamStatus,
    info:       StreamInfo,
    viewer_seq: u64,
}

/// Shared status record. Monitor and presence write disjoint fields; readers
/// always get a full copy. Liveness and viewer count are not updated together,
/// so a snapshot may pair a fresh count with the previous tick's liveness.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Board>>,
}

impl StatusBoard {
    pub async fn snapshot(&self) -> StreamStatus {
        self.inner.read().await.status.clone()
    }

    pub async fn info(&self) -> (StreamInfo, StreamStatus) {
        let b = self.inner.read().await;
        (b.info.clone(), b.status.clone())
    }

    pub async fn update_info(&self, info: StreamInfo) {
        self.inner.write().await.info = info;
    }

    pub async fn record(&self, r: Reading) {
        let mut b = self.inner.write().await;
        let s = &mut b.status;
        s.is_live           = r.is_live;
        s.uptime            = r.uptime;
        s.last_check        = Some(r.checked_at);
        s.stream_started_at = r.started_at;
        s.media_sequence    = r.media_sequence;
    }

    /// Pings race between the presence lock and this one; a count from an
    /// older ping than the last applied is ignored.
    pub async fn set_viewer_count(&self, n: usize, seq: u64) -> bool {
        let mut b = self.inner.write().await;
        if seq < b.viewer_seq {
            return false;
        }
        b.viewer_seq = seq;
        b.status.viewer_count = n;
        true
    }
}

/* ------------ 行程資訊（health 用） ------------ */
#[derive(Clone)]
pub struct AppMeta {
    pub version: &'static str,
    pub started: Instant,
}

impl Default for AppMeta {
    fn default() -> Self {
        Self { version: env!("CARGO_PKG_VERSION"), started: Instant::now() }
    }
}
