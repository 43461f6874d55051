use crate::config::TrackerConfig;
use crate::host::{IndicatorElement, Page, INDICATOR_ID};
use crate::kernel::event::{Event, SessionEpoch};
use crate::kernel::scheduler::SideEffect;
use crate::services::collector::wire::{decode_session_token, FormBody, RegisterRequest};
use crate::services::collector::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub pageview: String,
    pub heartbeat: String,
    pub delete: String,
}

impl From<&TrackerConfig> for Endpoints {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            pageview: config.pageview_endpoint.clone(),
            heartbeat: config.heartbeat_endpoint.clone(),
            delete: config.delete_endpoint.clone(),
        }
    }
}

/// Executes kernel side effects. Every call returns immediately; network
/// work runs on tracked tasks and registration results come back as events.
pub struct EffectDispatcher {
    transport: Arc<dyn Transport>,
    page: Arc<dyn Page>,
    endpoints: Endpoints,
    tx: mpsc::Sender<Event>,
    in_flight: TaskTracker,
}

impl EffectDispatcher {
    pub fn new(
        endpoints: Endpoints,
        transport: Arc<dyn Transport>,
        page: Arc<dyn Page>,
        tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            transport,
            page,
            endpoints,
            tx,
            in_flight: TaskTracker::new(),
        }
    }

    pub fn execute(&self, effect: SideEffect) {
        match effect {
            SideEffect::Register { epoch, request } => self.register(epoch, request),
            SideEffect::Heartbeat(request) => self.deliver(&self.endpoints.heartbeat, request.form()),
            SideEffect::Retract(request) => self.deliver(&self.endpoints.delete, request.form()),
            SideEffect::InstallIndicator => self.install_indicator(),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            debug!("No runtime; dropping network task");
            return;
        }
        self.in_flight.spawn(task);
    }

    fn register(&self, epoch: SessionEpoch, request: RegisterRequest) {
        let pending = self.transport.post(&self.endpoints.pageview, request.form());
        let tx = self.tx.clone();
        self.spawn(async move {
            let token = match pending.await.and_then(|body| decode_session_token(&body)) {
                Ok(token) => Some(token),
                Err(e) => {
                    debug!("Registration failed: {}", e);
                    None
                }
            };
            // The reactor may already be gone (page unloaded).
            let _ = tx.send(Event::Registered { epoch, token }).await;
        });
    }

    /// Beacon first, keep-alive POST second. Failures are dropped; the next
    /// heartbeat carries the cumulative value anyway.
    fn deliver(&self, url: &str, body: FormBody) {
        if self.transport.beacon(url, &body) {
            return;
        }
        let pending = self.transport.post(url, body);
        self.spawn(async move {
            if let Err(e) = pending.await {
                debug!("Delivery failed: {}", e);
            }
        });
    }

    fn install_indicator(&self) {
        if self.page.has_element(INDICATOR_ID) {
            return;
        }
        self.page.append_element(IndicatorElement::default());
        info!("Opt-out indicator installed");
    }

    /// Give in-flight work up to `grace` to finish.
    pub async fn settle(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        self.in_flight.close();
        let _ = tokio::time::timeout_at(deadline, self.in_flight.wait()).await;
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        self.transport.settle(remaining).await;
    }
}
