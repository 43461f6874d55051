use std::future::poll_fn;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::consent::{ConsentGate, PreferenceStore};
use super::event::{Event, NavigationSource, PageSignal, SessionEpoch};
use super::navigation::{Location, NavigationKey};
use super::presence::TrackingPhase;
use super::scheduler::{Scheduler, SideEffect};
use super::state::{StateDelta, VisitSession};
use super::telemetry::event::{HeartbeatKind, SkipReason, TelemetryEvent};
use super::telemetry::recorder::TelemetryRecorder;
use super::time::{Clock, Millis};
use crate::config::TrackerConfig;
use crate::host::embed::{resolve_site_token, DisabledReason};
use crate::host::Page;
use crate::services::collector::RetractRequest;
use crate::services::dispatch::EffectDispatcher;

pub const EVENT_QUEUE: usize = 256;

pub fn channel() -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    mpsc::channel(EVENT_QUEUE)
}

pub struct Reactor {
    pub receiver: mpsc::Receiver<Event>,
    pub state: VisitSession,
    pub consent: ConsentGate,
    pub scheduler: Scheduler,
    pub telemetry: TelemetryRecorder,
    pub clock: Clock,
    config: TrackerConfig,
}

impl Reactor {
    /// Guard checks. On `Err` the tracker must not touch the network or the
    /// DOM. An opted-out visitor still gets a reactor, one that only
    /// installs the indicator once the document is ready.
    pub fn boot(
        receiver: mpsc::Receiver<Event>,
        config: TrackerConfig,
        page: &dyn Page,
        store: Arc<dyn PreferenceStore>,
    ) -> Result<Self, DisabledReason> {
        let user_token = resolve_site_token(page, &config)?;
        if let Err(e) = config.validate() {
            warn!("Tracking disabled: {}", e);
            return Err(DisabledReason::InvalidConfig);
        }
        let consent = ConsentGate::new(store, config.opt_out_key.clone());
        let location = page.location();
        let clock = Clock::start();

        let mut state = VisitSession::new(user_token, &location, page.referrer(), Millis::ZERO);
        if consent.is_opted_out() {
            info!("Visitor opted out; tracking disabled");
            state.reduce(StateDelta::OptedOut);
        } else if location.hostname.is_empty() {
            return Err(DisabledReason::NoHostname);
        }

        Ok(Self {
            receiver,
            state,
            consent,
            scheduler: Scheduler::new(config.heartbeat_interval(), config.activity_window()),
            telemetry: TelemetryRecorder::new(),
            clock,
            config,
        })
    }

    pub fn start(&mut self) -> Vec<SideEffect> {
        let now = self.clock.now();
        self.start_at(now)
    }

    /// Issue the initial registration. No-op unless freshly booted.
    pub fn start_at(&mut self, now: Millis) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if self.state.phase == TrackingPhase::Booting {
            let key = NavigationKey {
                domain: self.state.domain.clone(),
                path: self.state.current_path.clone(),
            };
            self.issue_pageview(key, now, &mut effects);
        }
        effects
    }

    /// Pure step: applies `events` in order at time `now` and returns the
    /// side effects for the driver. MUST NOT await I/O or timers.
    pub fn tick_step(&mut self, now: Millis, events: Vec<Event>) -> Vec<SideEffect> {
        let mut effects = Vec::new();

        for event in events {
            if self.state.phase.is_terminal() {
                if matches!(event, Event::HeartbeatTick) {
                    self.telemetry.record(TelemetryEvent::TickSkipped { reason: SkipReason::Unloaded });
                }
                continue;
            }

            match event {
                Event::Signal(PageSignal::Activity(_)) => {
                    self.state.reduce(StateDelta::ActivityObserved(now));
                }
                Event::Signal(PageSignal::Navigated { source, location }) => {
                    self.on_navigation(now, source, location, &mut effects);
                }
                Event::Signal(PageSignal::DocumentReady) => {
                    if self.state.is_opted_out() {
                        effects.push(SideEffect::InstallIndicator);
                    }
                }
                Event::Signal(PageSignal::OptOut) => {
                    self.consent.persist_opt_out();
                    self.opt_out(&mut effects);
                }
                Event::Signal(PageSignal::Unload) => {
                    if !self.state.is_opted_out() {
                        self.flush(now, HeartbeatKind::Unload, &mut effects);
                    }
                    self.state.reduce(StateDelta::Unloaded);
                }
                Event::Registered { epoch, token } => {
                    self.on_registered(epoch, token, &mut effects);
                }
                Event::HeartbeatTick => {
                    self.on_heartbeat(now, &mut effects);
                }
            }
        }

        effects
    }

    fn issue_pageview(&mut self, key: NavigationKey, now: Millis, effects: &mut Vec<SideEffect>) {
        let epoch = self.state.epoch.next();
        self.state.reduce(StateDelta::PageviewIssued { epoch, key, at: now });
        self.telemetry.record(TelemetryEvent::RegistrationIssued { epoch, at: now });
        effects.push(self.scheduler.registration(&self.state));
    }

    fn on_registered(&mut self, epoch: SessionEpoch, token: Option<String>, effects: &mut Vec<SideEffect>) {
        // STALE REJECTION: a newer pageview has replaced this session
        if epoch != self.state.epoch {
            debug!("Discarded stale registration {:?} (current {:?})", epoch, self.state.epoch);
            self.telemetry.record(TelemetryEvent::StaleRegistration { epoch, current: self.state.epoch });
            return;
        }

        if self.state.is_opted_out() {
            if let Some(token) = token {
                effects.push(SideEffect::Retract(RetractRequest { token }));
                self.telemetry.record(TelemetryEvent::LateRetraction { epoch });
            }
            return;
        }

        if self.state.phase != TrackingPhase::Registering {
            return;
        }

        let accepted = token.is_some();
        match token {
            Some(token) => self.state.reduce(StateDelta::TokenAssigned(token)),
            None => {
                info!("Registration failed; session stays silent");
                self.state.reduce(StateDelta::RegistrationFailed);
            }
        }
        self.telemetry.record(TelemetryEvent::RegistrationSettled { epoch, accepted });
    }

    fn on_heartbeat(&mut self, now: Millis, effects: &mut Vec<SideEffect>) {
        if self.state.is_opted_out() {
            self.telemetry.record(TelemetryEvent::TickSkipped { reason: SkipReason::OptedOut });
            return;
        }
        // Set from another tab since boot
        if self.consent.is_opted_out() {
            info!("Opt-out flag observed at heartbeat");
            self.opt_out(effects);
            self.telemetry.record(TelemetryEvent::TickSkipped { reason: SkipReason::OptedOut });
            return;
        }
        if self.state.session_token().is_none() {
            self.telemetry.record(TelemetryEvent::TickSkipped { reason: SkipReason::NoSessionToken });
            return;
        }

        let delta = self.scheduler.accrue_tick(&self.state, now);
        self.state.reduce(delta);

        if let Some(effect) = self.scheduler.heartbeat(&self.state) {
            self.telemetry.record(TelemetryEvent::HeartbeatQueued {
                epoch: self.state.epoch,
                dwell_seconds: self.state.dwell_seconds(),
                kind: HeartbeatKind::Periodic,
            });
            effects.push(effect);
        }
    }

    fn on_navigation(
        &mut self,
        now: Millis,
        source: NavigationSource,
        location: Location,
        effects: &mut Vec<SideEffect>,
    ) {
        if self.state.is_opted_out() {
            return;
        }
        let key = location.key();
        if key.domain.is_empty() {
            return;
        }
        if self.state.last_sent.as_ref() == Some(&key) {
            self.telemetry.record(TelemetryEvent::NavigationSuppressed { source });
            return;
        }

        info!("Navigation via {:?} starts a new pageview", source);
        self.flush(now, HeartbeatKind::Handover, effects);
        self.issue_pageview(key, now, effects);
    }

    /// Last report for the current session: partial accrual, then a
    /// heartbeat if a token exists.
    fn flush(&mut self, now: Millis, kind: HeartbeatKind, effects: &mut Vec<SideEffect>) {
        if self.state.session_token().is_none() {
            return;
        }
        if let Some(delta) = self.scheduler.accrue_partial(&self.state, now) {
            self.state.reduce(delta);
        }
        if let Some(effect) = self.scheduler.heartbeat(&self.state) {
            self.telemetry.record(TelemetryEvent::HeartbeatQueued {
                epoch: self.state.epoch,
                dwell_seconds: self.state.dwell_seconds(),
                kind,
            });
            effects.push(effect);
        }
    }

    /// Halt tracking, retract the current session once, show the indicator.
    fn opt_out(&mut self, effects: &mut Vec<SideEffect>) {
        let first = !self.state.is_opted_out();
        let token = self.state.session_token().map(str::to_string);
        self.state.reduce(StateDelta::OptedOut);

        let retracted = match token {
            Some(token) => {
                self.state.reduce(StateDelta::TokenRetracted);
                effects.push(SideEffect::Retract(RetractRequest { token }));
                true
            }
            None => false,
        };
        effects.push(SideEffect::InstallIndicator);

        if first {
            self.telemetry.record(TelemetryEvent::OptedOut { retracted });
        }
    }

    /// Async Driver Loop. Returns after unload, once in-flight deliveries
    /// have had their grace period.
    pub async fn run(&mut self, dispatcher: &EffectDispatcher) {
        let interval = self.config.heartbeat_interval();
        info!("Tracker started. Heartbeat: {}ms", interval.as_millis());

        for effect in self.start() {
            dispatcher.execute(effect);
        }

        let mut cadence = interval_at(Instant::now() + interval, interval);
        // A throttled background timer must not burst; each tick credits a fixed increment
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let first = tokio::select! {
                biased;
                maybe = self.receiver.recv() => match maybe {
                    Some(event) => event,
                    None => break,
                },
                _ = cadence.tick() => Event::HeartbeatTick,
            };

            let mut events = vec![first];
            if !matches!(events[0], Event::HeartbeatTick) {
                // Queued page signals apply before the tick reads them.
                // Bounded drain, then at most one due tick per batch.
                while events.len() < EVENT_QUEUE {
                    match self.receiver.try_recv() {
                        Ok(event) => events.push(event),
                        Err(_) => break,
                    }
                }
                if tick_ready(&mut cadence).await {
                    events.push(Event::HeartbeatTick);
                }
            }

            let now = self.clock.now();
            for effect in self.tick_step(now, events) {
                dispatcher.execute(effect);
            }

            if self.state.phase.is_terminal() {
                break;
            }
        }

        dispatcher.settle(self.config.unload_grace()).await;
        info!("Tracker stopped: {:?}", self.telemetry.snapshot());
    }
}

/// Consume the next tick if it is already due, without waiting for it.
async fn tick_ready(cadence: &mut Interval) -> bool {
    poll_fn(|cx| Poll::Ready(cadence.poll_tick(cx).is_ready())).await
}
