use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    state::StatusBoard,
    utils::probe::{Probe, ProbeOutcome},
};

/// What one tick writes into the status board.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub is_live:        bool,
    pub uptime:         i64,
    pub checked_at:     DateTime<Utc>,
    pub started_at:     Option<DateTime<Utc>>,
    pub media_sequence: Option<u64>,
}

/* ------------ OFFLINE / LIVE 狀態機 ------------ */
#[derive(Debug, Default)]
pub struct Monitor {
    started_at: Option<DateTime<Utc>>,
    uptime:     i64,
    last_seq:   Option<u64>,
    frozen:     bool,
}

impl Monitor {
    pub fn is_live(&self) -> bool { self.started_at.is_some() }

    pub fn observe(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> Reading {
        let body = match outcome {
            ProbeOutcome::Playlist(body) => body,
            other => {
                self.go_offline(other);
                return Reading {
                    is_live:        false,
                    uptime:         0,
                    checked_at:     now,
                    started_at:     None,
                    media_sequence: None,
                };
            }
        };

        let started = match self.started_at {
            Some(t) => t,
            None => {
                info!("🟢 LIVE | stream started");
                self.uptime = 0;
                *self.started_at.insert(now)
            }
        };
        self.uptime = (now - started).num_seconds().max(self.uptime);

        let seq = media_sequence(body);
        self.track_sequence(seq);

        Reading {
            is_live:        true,
            uptime:         self.uptime,
            checked_at:     now,
            started_at:     Some(started),
            media_sequence: seq,
        }
    }

    fn go_offline(&mut self, why: &ProbeOutcome) {
        if self.started_at.take().is_some() {
            match why {
                ProbeOutcome::Unreachable(e) => warn!(error = %e, "⚫ OFFLINE | connection error"),
                ProbeOutcome::Status(code)   => warn!(status = code, "⚫ OFFLINE | bad status"),
                _                            => warn!("⚫ OFFLINE | empty response"),
            }
        }
        self.uptime = 0;
        self.last_seq = None;
        self.frozen = false;
    }

    // 只做診斷：sequence 卡住不影響 LIVE 判定
    fn track_sequence(&mut self, seq: Option<u64>) {
        let Some(seq) = seq else { return };
        let stuck = self.last_seq == Some(seq);
        if stuck && !self.frozen {
            warn!(sequence = seq, "⚠️ playlist sequence not advancing, stream may be frozen");
        } else if !stuck && self.frozen {
            info!(sequence = seq, "playlist sequence advancing again");
        }
        self.frozen = stuck;
        self.last_seq = Some(seq);
    }
}

/// `#EXT-X-MEDIA-SEQUENCE:<n>` from an HLS playlist.
pub fn media_sequence(playlist: &str) -> Option<u64> {
    playlist
        .lines()
        .find_map(|l| l.trim().strip_prefix("#EXT-X-MEDIA-SEQUENCE:"))
        .and_then(|n| n.trim().parse().ok())
}

/// Polls until `stop` fires. Cancellation is only checked between ticks; an
/// in-flight probe runs to completion (bounded by its own timeout).
pub async fn run<P: Probe>(
    probe: P,
    board: StatusBoard,
    every: Duration,
    stop:  CancellationToken,
) {
    let mut tick = time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut monitor = Monitor::default();

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = tick.tick() => {}
        }
        let outcome = probe.check().await;
        let reading = monitor.observe(&outcome, Utc::now());
        board.record(reading).await;
    }
    info!(live = monitor.is_live(), "stream monitor stopped");
}
