#![allow(dead_code)]

use modest::error::{Result, TrackerError};
use modest::host::page::SimulatedPage;
use modest::host::ScriptElement;
use modest::kernel::consent::{MemoryPreferenceStore, PreferenceStore};
use modest::kernel::event::{Event, SessionEpoch};
use modest::kernel::reactor::{self, Reactor};
use modest::kernel::scheduler::SideEffect;
use modest::kernel::time::Millis;
use modest::services::collector::wire::MAX_BEACON_BYTES;
use modest::services::collector::{FormBody, Transport, TransportFuture};
use modest::TrackerConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const EMBED_SRC: &str = "https://modestanalytics.com/embed.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    Beacon,
    Post,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub body: FormBody,
    pub via: Via,
}

/// Transport that records every call. Beacons refuse oversized payloads
/// like a browser does. Pageview posts answer with scripted bodies in
/// order; an exhausted script answers 503.
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    pageview_bodies: Mutex<VecDeque<String>>,
    beacon_enabled: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            pageview_bodies: Mutex::new(VecDeque::new()),
            beacon_enabled: AtomicBool::new(true),
        })
    }

    pub fn respond(&self, body: &str) -> &Self {
        self.pageview_bodies.lock().unwrap().push_back(body.to_string());
        self
    }

    pub fn disable_beacon(&self) {
        self.beacon_enabled.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.url.ends_with(endpoint)).collect()
    }

    pub fn heartbeat_values(&self) -> Vec<u64> {
        self.calls_to("/heartbeat")
            .iter()
            .map(|c| c.body.get("time_spent_on_page").unwrap().parse().unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn beacon(&self, url: &str, body: &FormBody) -> bool {
        if !self.beacon_enabled.load(Ordering::SeqCst) || body.encoded_len_bound() > MAX_BEACON_BYTES {
            return false;
        }
        self.calls.lock().unwrap().push(Call { url: url.to_string(), body: body.clone(), via: Via::Beacon });
        true
    }

    fn post(&self, url: &str, body: FormBody) -> TransportFuture<Result<String>> {
        self.calls.lock().unwrap().push(Call { url: url.to_string(), body, via: Via::Post });
        let result = if url.ends_with("/pageview") {
            self.pageview_bodies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(TrackerError::Status { endpoint: url.to_string(), status: 503 })
        } else {
            Ok(String::new())
        };
        Box::pin(async move { result })
    }
}

pub fn embedded_page(href: &str, token: &str) -> SimulatedPage {
    SimulatedPage::new(href).with_script(ScriptElement::new(EMBED_SRC).with_data("token", token))
}

pub fn memory_store() -> Arc<MemoryPreferenceStore> {
    Arc::new(MemoryPreferenceStore::new())
}

/// Boot against `page`, returning the reactor and a sender for its queue.
pub fn boot(page: &SimulatedPage, store: Arc<dyn PreferenceStore>) -> (Reactor, mpsc::Sender<Event>) {
    let (tx, rx) = reactor::channel();
    let reactor = Reactor::boot(rx, TrackerConfig::default(), page, store).expect("boot");
    (reactor, tx)
}

/// Boot, start at t=0 and accept `session_token`.
pub fn active_reactor(href: &str, session_token: &str) -> Reactor {
    let page = embedded_page(href, "abc");
    let (mut reactor, _tx) = boot(&page, memory_store());
    let effects = reactor.start_at(Millis::ZERO);
    let epoch = registration_epoch(&effects).expect("registration");
    reactor.tick_step(Millis::ZERO, vec![Event::Registered { epoch, token: Some(session_token.to_string()) }]);
    reactor
}

pub fn registration_epoch(effects: &[SideEffect]) -> Option<SessionEpoch> {
    effects.iter().find_map(|e| match e {
        SideEffect::Register { epoch, .. } => Some(*epoch),
        _ => None,
    })
}

pub fn heartbeats(effects: &[SideEffect]) -> Vec<(String, u64)> {
    effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::Heartbeat(h) => Some((h.token.clone(), h.time_spent_on_page)),
            _ => None,
        })
        .collect()
}

pub fn retractions(effects: &[SideEffect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::Retract(r) => Some(r.token.clone()),
            _ => None,
        })
        .collect()
}
