//! Production DataSource speaking the timetable server's JSON API.

use crate::error::EnvError;
use crate::source::DataSource;
use crate::types::{
    decode_snapshot_batch, CongestionUpdate, LineOrders, SnapshotBatch, SnapshotQuery, StationRecord,
};
use async_trait::async_trait;
use std::time::Duration;

/// HTTP client for `/api/stations`, `/api/lines`, `/api/simulation_data`
/// and `/api/update_congestion`.
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    /// Per-request timeout, when this source built the client
    timeout: Option<Duration>,
}

impl HttpDataSource {
    /// Creates a source with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EnvError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnvError::Network(e.to_string()))?;
        let mut source = Self::with_client(client, base_url);
        source.timeout = Some(timeout);
        Ok(source)
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: None,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EnvError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(EnvError::Status(status.as_u16()))
        }
    }

    /// Maps a client error, reporting the configured timeout (0 if unknown).
    fn classify(&self, err: reqwest::Error) -> EnvError {
        if err.is_timeout() {
            EnvError::Timeout(self.timeout.map_or(0, |t| t.as_millis() as u64))
        } else if err.is_decode() {
            EnvError::Decode(err.to_string())
        } else {
            EnvError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn stations(&self) -> Result<Vec<StationRecord>, EnvError> {
        let response = self
            .client
            .get(self.endpoint("stations"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::check_status(response)?.json().await.map_err(|e| self.classify(e))
    }

    async fn lines(&self) -> Result<LineOrders, EnvError> {
        let response = self
            .client
            .get(self.endpoint("lines"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::check_status(response)?.json().await.map_err(|e| self.classify(e))
    }

    async fn simulation_data(&self, query: &SnapshotQuery) -> Result<SnapshotBatch, EnvError> {
        let response = self
            .client
            .get(self.endpoint("simulation_data"))
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body = Self::check_status(response)?
            .text()
            .await
            .map_err(|e| self.classify(e))?;
        decode_snapshot_batch(&body)
    }

    async fn update_congestion(&self, update: &CongestionUpdate) -> Result<(), EnvError> {
        let response = self
            .client
            .post(self.endpoint("update_congestion"))
            .json(update)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::check_status(response).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let source = HttpDataSource::with_client(reqwest::Client::new(), "http://localhost:10000/");
        assert_eq!(source.endpoint("stations"), "http://localhost:10000/api/stations");
    }

    #[tokio::test]
    async fn test_timeout_reports_configured_duration() {
        // Accepted by the kernel backlog, never answered
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let source = HttpDataSource::new(base, Duration::from_millis(50)).unwrap();

        let err = source.stations().await.unwrap_err();
        assert!(matches!(err, EnvError::Timeout(50)), "{err:?}");
    }
}
