use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use rand::{rngs::OsRng, RngCore};
use tracing::warn;

/// Result of one viewer ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub viewer_id: String,
    pub count:     usize,
    /// Increases with every ping; lets the status board drop stale counts.
    pub seq:       u64,
}

#[derive(Default)]
struct Sessions {
    seen: HashMap<String, Instant>,
    seq:  u64,
}

/// Viewer presence by heartbeat: a session counts while its last ping is
/// within `ttl`. Every ping prunes expired sessions before touching the map.
#[derive(Clone)]
pub struct Presence {
    sessions: Arc<Mutex<Sessions>>,
    ttl:      Duration,
}

impl Presence {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::default(), ttl }
    }

    pub fn ping(&self, viewer_id: Option<String>, offline: bool) -> Ping {
        self.ping_at(viewer_id, offline, Instant::now())
    }

    pub fn ping_at(&self, viewer_id: Option<String>, offline: bool, now: Instant) -> Ping {
        let id = viewer_id.filter(|v| !v.is_empty());

        // prune 與更新同一段臨界區
        let mut s = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        s.seq += 1;
        let seq = s.seq;
        let m = &mut s.seen;
        m.retain(|_, seen| now.saturating_duration_since(*seen) <= self.ttl);

        let viewer_id = match (offline, id) {
            (true, Some(id)) => {
                m.remove(&id);
                id
            }
            (true, None) => String::new(),
            (false, id) => {
                let id = id.unwrap_or_else(new_viewer_id);
                m.insert(id.clone(), now);
                id
            }
        };
        Ping { viewer_id, count: m.len(), seq }
    }
}

/// 32 hex chars from the OS RNG; timestamp fallback only if that fails.
pub fn new_viewer_id() -> String {
    let mut buf = [0u8; 16];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => hex::encode(buf),
        Err(e) => {
            warn!(error = %e, "secure random unavailable, using timestamp viewer id");
            let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
            format!("fallback-{nanos}")
        }
    }
}
