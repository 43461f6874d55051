use super::wire::{FormBody, MAX_BEACON_BYTES};
use crate::error::{Result, TrackerError};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::debug;

pub type TransportFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// How the tracker reaches the collector.
pub trait Transport: Send + Sync {
    /// Queue a fire-and-forget POST that survives page teardown. Returns
    /// `false` when the transport is unavailable or refuses the payload.
    fn beacon(&self, url: &str, body: &FormBody) -> bool;

    /// Keep-alive POST resolving to the response body.
    fn post(&self, url: &str, body: FormBody) -> TransportFuture<Result<String>>;

    /// Wait up to `grace` for queued beacons to leave.
    fn settle(&self, grace: Duration) -> TransportFuture<()> {
        let _ = grace;
        Box::pin(async {})
    }
}

/// reqwest-backed transport. Beacons are detached tasks tracked so unload
/// can give them a moment to finish.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    in_flight: TaskTracker,
    beacons_enabled: bool,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            in_flight: TaskTracker::new(),
            beacons_enabled: true,
        }
    }

    /// Behave like a browser without `navigator.sendBeacon`.
    pub fn without_beacon(mut self) -> Self {
        self.beacons_enabled = false;
        self
    }

    async fn send(client: Client, url: String, body: FormBody) -> Result<String> {
        let response = client.post(&url).form(&body.0).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status { endpoint: url, status: status.as_u16() });
        }
        Ok(response.text().await?)
    }
}

impl Transport for HttpTransport {
    fn beacon(&self, url: &str, body: &FormBody) -> bool {
        if !self.beacons_enabled || body.encoded_len_bound() > MAX_BEACON_BYTES {
            return false;
        }
        // No runtime, no beacon; the caller falls back.
        if tokio::runtime::Handle::try_current().is_err() {
            return false;
        }
        let fut = Self::send(self.client.clone(), url.to_string(), body.clone());
        self.in_flight.spawn(async move {
            if let Err(e) = fut.await {
                debug!("Beacon delivery failed: {}", e);
            }
        });
        true
    }

    fn post(&self, url: &str, body: FormBody) -> TransportFuture<Result<String>> {
        Box::pin(Self::send(self.client.clone(), url.to_string(), body))
    }

    fn settle(&self, grace: Duration) -> TransportFuture<()> {
        let in_flight = self.in_flight.clone();
        Box::pin(async move {
            in_flight.close();
            if tokio::time::timeout(grace, in_flight.wait()).await.is_err() {
                debug!("{} beacons still in flight at teardown", in_flight.len());
            }
        })
    }
}
