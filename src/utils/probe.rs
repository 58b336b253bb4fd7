use std::{future::Future, time::Duration};
use reqwest::{Client, StatusCode};

use crate::error::AppResult;

/// What one probe of the media engine saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Connect error, timeout or broken body.
    Unreachable(String),
    /// Anything other than 200.
    Status(u16),
    /// 200 with nothing in it.
    Empty,
    /// 200 with a playlist body.
    Playlist(String),
}

pub trait Probe: Send + Sync + 'static {
    fn check(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/* ------------ 打引擎的 llhls playlist ------------ */
pub struct HttpProbe {
    client: Client,
    url:    String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str { &self.url }
}

impl Probe for HttpProbe {
    async fn check(&self) -> ProbeOutcome {
        let resp = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
        };
        if resp.status() != StatusCode::OK {
            return ProbeOutcome::Status(resp.status().as_u16());
        }
        match resp.text().await {
            Ok(body) if body.is_empty() => ProbeOutcome::Empty,
            Ok(body)                    => ProbeOutcome::Playlist(body),
            Err(e)                      => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as Code, routing::get, Router};

    async fn fake_engine() -> String {
        let app = Router::new()
            .route("/live.m3u8", get(|| async { "#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:42\n" }))
            .route("/empty.m3u8", get(|| async { "" }))
            .route("/slow.m3u8", get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "#EXTM3U"
            }))
            .route("/gone.m3u8", get(|| async { (Code::NOT_FOUND, "no stream") }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn probe(url: String) -> ProbeOutcome {
        HttpProbe::new(url, Duration::from_millis(300)).unwrap().check().await
    }

    #[tokio::test]
    async fn classifies_engine_responses() {
        let base = fake_engine().await;
        assert!(matches!(
            probe(format!("{base}/live.m3u8")).await,
            ProbeOutcome::Playlist(body) if body.contains("MEDIA-SEQUENCE:42")
        ));
        assert_eq!(probe(format!("{base}/empty.m3u8")).await, ProbeOutcome::Empty);
        assert_eq!(probe(format!("{base}/gone.m3u8")).await, ProbeOutcome::Status(404));
    }

    #[tokio::test]
    async fn timeout_counts_as_unreachable() {
        let base = fake_engine().await;
        assert!(matches!(
            probe(format!("{base}/slow.m3u8")).await,
            ProbeOutcome::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // 綁一個 port 再放掉，確保沒人在聽
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(matches!(
            probe(format!("http://{addr}/live.m3u8")).await,
            ProbeOutcome::Unreachable(_)
        ));
    }
}
