use super::{IndicatorElement, Page, ScriptElement};
use crate::kernel::event::{ActivityKind, Event, NavigationSource, PageSignal};
use crate::kernel::navigation::Location;
use reqwest::Url;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
struct Dom {
    href: String,
    referrer: String,
    scripts: Vec<ScriptElement>,
    current_script: Option<ScriptElement>,
    elements: Vec<IndicatorElement>,
    hidden: bool,
    listener: Option<mpsc::Sender<Event>>,
}

/// In-memory page. History calls and input helpers behave like the browser
/// hooks the tracker installs: they update the page and raise a signal on
/// the attached channel.
#[derive(Debug, Default)]
pub struct SimulatedPage {
    dom: Mutex<Dom>,
}

impl SimulatedPage {
    pub fn new(href: &str) -> Self {
        Self {
            dom: Mutex::new(Dom {
                href: href.to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_referrer(self, referrer: &str) -> Self {
        self.dom().referrer = referrer.to_string();
        self
    }

    pub fn with_script(self, script: ScriptElement) -> Self {
        self.dom().scripts.push(script);
        self
    }

    pub fn with_current_script(self, script: ScriptElement) -> Self {
        self.dom().current_script = Some(script);
        self
    }

    fn dom(&self) -> MutexGuard<'_, Dom> {
        // A poisoned DOM is still a DOM
        self.dom.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Route page signals to the tracker.
    pub fn attach(&self, tx: mpsc::Sender<Event>) {
        self.dom().listener = Some(tx);
    }

    fn emit(&self, signal: PageSignal) {
        let listener = self.dom().listener.clone();
        if let Some(tx) = listener {
            if let Err(e) = tx.try_send(Event::Signal(signal)) {
                debug!("Page signal dropped: {}", e);
            }
        }
    }

    pub fn href(&self) -> String {
        self.dom().href.clone()
    }

    fn navigate(&self, target: &str, source: NavigationSource) {
        let location = {
            let mut dom = self.dom();
            let resolved = Url::parse(&dom.href)
                .and_then(|base| base.join(target))
                .map(|u| u.to_string())
                .unwrap_or_else(|_| target.to_string());
            dom.href = resolved;
            Location::parse(&dom.href)
        };
        // Hidden tabs queue nothing; the visibility hook catches up.
        if !self.dom().hidden {
            self.emit(PageSignal::Navigated { source, location });
        }
    }

    pub fn push_state(&self, target: &str) {
        self.navigate(target, NavigationSource::PushState);
    }

    pub fn replace_state(&self, target: &str) {
        self.navigate(target, NavigationSource::ReplaceState);
    }

    /// Back/forward to `target`.
    pub fn pop_state(&self, target: &str) {
        self.navigate(target, NavigationSource::PopState);
    }

    pub fn hide(&self) {
        self.dom().hidden = true;
    }

    pub fn show(&self) {
        let location = {
            let mut dom = self.dom();
            dom.hidden = false;
            Location::parse(&dom.href)
        };
        self.emit(PageSignal::Navigated {
            source: NavigationSource::VisibilityRegained,
            location,
        });
    }

    pub fn input(&self, kind: ActivityKind) {
        self.emit(PageSignal::Activity(kind));
    }

    pub fn document_ready(&self) {
        self.emit(PageSignal::DocumentReady);
    }

    /// The visitor clicked "opt out".
    pub fn opt_out(&self) {
        self.emit(PageSignal::OptOut);
    }

    pub fn unload(&self) {
        self.emit(PageSignal::Unload);
    }

    pub fn element_count(&self, id: &str) -> usize {
        self.dom().elements.iter().filter(|e| e.id == id).count()
    }

    /// Nodes the tracker added.
    pub fn elements(&self) -> Vec<IndicatorElement> {
        self.dom().elements.clone()
    }
}

impl Page for SimulatedPage {
    fn location(&self) -> Location {
        Location::parse(&self.dom().href)
    }

    fn referrer(&self) -> String {
        self.dom().referrer.clone()
    }

    fn current_script(&self) -> Option<ScriptElement> {
        self.dom().current_script.clone()
    }

    fn scripts(&self) -> Vec<ScriptElement> {
        self.dom().scripts.clone()
    }

    fn has_element(&self, id: &str) -> bool {
        self.dom().elements.iter().any(|e| e.id == id)
    }

    fn append_element(&self, element: IndicatorElement) {
        self.dom().elements.push(element);
    }
}
