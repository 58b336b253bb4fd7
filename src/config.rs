use std::{str::FromStr, time::Duration};
use tracing::warn;

/// 執行期設定，全部來自環境變數（可放在 `.env`）。
#[derive(Debug, Clone)]
pub struct Config {
    pub port:           u16,
    pub engine_url:     String,
    pub probe_path:     String,
    pub check_interval: Duration,
    pub probe_timeout:  Duration,
    pub chat_history:   usize,
    pub chat_queue:     usize,
    pub viewer_ttl:     Duration,
    pub shutdown_grace: Duration,
    pub body_limit:     usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port:           8080,
            engine_url:     "http://engine:3333".into(),
            probe_path:     "/app/stream/llhls.m3u8".into(),
            check_interval: Duration::from_secs(2),
            probe_timeout:  Duration::from_secs(5),
            chat_history:   50,
            chat_queue:     10,
            viewer_ttl:     Duration::from_secs(35),
            shutdown_grace: Duration::from_secs(10),
            body_limit:     16 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// 解析失敗或 <= 0 的值一律退回預設值。
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let secs = |key: &str, def: Duration| {
            Duration::from_secs(positive(&get, key, def.as_secs()))
        };

        Self {
            port:           positive(&get, "API_PORT", d.port),
            engine_url:     text(&get, "ENGINE_URL", d.engine_url),
            probe_path:     text(&get, "PROBE_PATH", d.probe_path),
            check_interval: secs("CHECK_INTERVAL", d.check_interval),
            probe_timeout:  secs("PROBE_TIMEOUT", d.probe_timeout),
            chat_history:   positive(&get, "CHAT_HISTORY", d.chat_history),
            chat_queue:     positive(&get, "CHAT_QUEUE", d.chat_queue),
            viewer_ttl:     secs("VIEWER_TTL", d.viewer_ttl),
            shutdown_grace: secs("SHUTDOWN_GRACE", d.shutdown_grace),
            body_limit:     positive(&get, "BODY_LIMIT", d.body_limit),
        }
    }

    pub fn probe_url(&self) -> String {
        format!(
            "{}/{}",
            self.engine_url.trim_end_matches('/'),
            self.probe_path.trim_start_matches('/')
        )
    }
}

fn text<F>(get: &F, key: &str, def: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get(key).filter(|v| !v.trim().is_empty()).unwrap_or(def)
}

fn positive<F, T>(get: &F, key: &str, def: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = get(key).filter(|v| !v.is_empty()) else { return def };
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => v,
        _ => {
            warn!(key, value = %raw, default = %def, "invalid config value, using default");
            def
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_env_empty() {
        let c = cfg(&[]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.check_interval, Duration::from_secs(2));
        assert_eq!(c.probe_timeout, Duration::from_secs(5));
        assert_eq!(c.chat_history, 50);
        assert_eq!(c.viewer_ttl, Duration::from_secs(35));
        assert_eq!(c.probe_url(), "http://engine:3333/app/stream/llhls.m3u8");
    }

    #[test]
    fn overrides_are_applied() {
        let c = cfg(&[
            ("API_PORT", "9000"),
            ("ENGINE_URL", "http://localhost:3333/"),
            ("CHECK_INTERVAL", "7"),
            ("CHAT_HISTORY", "5"),
        ]);
        assert_eq!(c.port, 9000);
        assert_eq!(c.check_interval, Duration::from_secs(7));
        assert_eq!(c.chat_history, 5);
        assert_eq!(c.probe_url(), "http://localhost:3333/app/stream/llhls.m3u8");
    }

    #[test]
    fn garbage_and_non_positive_fall_back() {
        let c = cfg(&[("CHECK_INTERVAL", "0"), ("API_PORT", "abc"), ("CHAT_QUEUE", "-3")]);
        assert_eq!(c.check_interval, Duration::from_secs(2));
        assert_eq!(c.port, 8080);
        assert_eq!(c.chat_queue, 10);
    }
}
