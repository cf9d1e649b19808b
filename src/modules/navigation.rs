use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::errors::CustomResult;
use crate::modules::robis_api::{RaceSummary, RobisApi};

/// The embedded browser, reduced to the two calls this crate needs. The
/// widget itself (cookies, local storage, layout) belongs to the host.
pub trait BrowserSurface {
    fn current_url(&self) -> String;
    fn navigate_to(&self, url: &str);
}

/// One observed navigation, already classified out of the URL string so the
/// state machine never re-parses text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavEvent {
    pub on_site: bool,
    pub event_id: Option<i64>,
    pub race_id: Option<i64>,
}

/// Turns URLs into [`NavEvent`]s. Event pages look like
/// `<base>/event/<id>`, race pages like `<base>/event/<id>/race/<id>`.
pub struct UrlClassifier {
    base_url: String,
    event_re: Regex,
}

impl UrlClassifier {
    pub fn new(base_url: impl Into<String>) -> UrlClassifier {
        UrlClassifier {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            event_re: Regex::new(r"^/event/(\d+)(?:/race/(\d+))?")
                .expect("static event url pattern"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn classify(&self, url: &str) -> NavEvent {
        let Some(path) = url.strip_prefix(&self.base_url) else {
            return NavEvent::default();
        };
        // "<base>.evil.example" also strips; only a real path separator
        // (or the bare root) counts as on-site
        if !path.is_empty() && !path.starts_with('/') && !path.starts_with('?') {
            return NavEvent::default();
        }
        let captures = self.event_re.captures(path);
        NavEvent {
            on_site: true,
            event_id: captures
                .as_ref()
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok()),
            race_id: captures
                .as_ref()
                .and_then(|c| c.get(2))
                .and_then(|m| m.as_str().parse().ok()),
        }
    }
}

/// Where the organizer currently is on the remote site, and whether the
/// download action is valid there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavState {
    /// Off-site; the observer gets told to go back to the site root.
    Outside,
    /// On-site but not on an event or race page.
    Browsing,
    /// On an event page, race not (yet) resolved.
    EventSelected { event_id: i64 },
    /// Race resolved to a usable api key; download is enabled.
    RaceImportable {
        event_id: i64,
        race_id: i64,
        api_key: String,
    },
    /// Race resolved, but its api key is null.
    RaceLocked { event_id: i64, race_id: i64 },
    /// The race-list fetch for this event failed; terminal until the
    /// organizer moves to another event.
    NotAdministrator { event_id: i64 },
}

impl NavState {
    /// Status line for the host UI.
    pub fn message(&self) -> &'static str {
        match self {
            NavState::Outside => "returning to the site",
            NavState::Browsing => "select a competition",
            NavState::EventSelected { .. } => "select a race",
            NavState::RaceImportable { .. } => "race ready to download",
            NavState::RaceLocked { .. } => "race is locked",
            NavState::NotAdministrator { .. } => "not an administrator of this event",
        }
    }
}

/// What the caller must do after feeding the tracker an observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavAction {
    None,
    /// The URL left the site; send the browser back to the root.
    RedirectToRoot,
    /// A new event was entered; fetch its race list and feed the outcome
    /// back through [`NavigationTracker::apply_races`] with this token.
    FetchRaces { event_id: i64, generation: u64 },
}

/// Finite state machine over navigation events. Race lists are cached per
/// event and only re-fetched when the event changes; each fetch carries a
/// generation token so a result that was superseded mid-flight can never
/// authorize a download for the wrong event.
pub struct NavigationTracker {
    state: NavState,
    cached_event: Option<i64>,
    /// race id -> api key; `None` key means the race exists but is locked.
    races: HashMap<i64, Option<String>>,
    generation: u64,
    last_seen: NavEvent,
}

impl Default for NavigationTracker {
    fn default() -> Self {
        NavigationTracker {
            state: NavState::Outside,
            cached_event: None,
            races: HashMap::new(),
            generation: 0,
            last_seen: NavEvent::default(),
        }
    }
}

impl NavigationTracker {
    pub fn new() -> NavigationTracker {
        NavigationTracker::default()
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// The api key of the importable race under the cursor, if any.
    pub fn download_key(&self) -> Option<&str> {
        match &self.state {
            NavState::RaceImportable { api_key, .. } => Some(api_key),
            _ => None,
        }
    }

    /// Classifies the browser's current location and applies any redirect
    /// side effect directly. Returns the remaining action for the caller.
    pub fn observe_browser(
        &mut self,
        classifier: &UrlClassifier,
        browser: &dyn BrowserSurface,
    ) -> NavAction {
        let action = self.observe(classifier.classify(&browser.current_url()));
        if action == NavAction::RedirectToRoot {
            browser.navigate_to(classifier.base_url());
        }
        action
    }

    pub fn observe(&mut self, event: NavEvent) -> NavAction {
        self.last_seen = event.clone();

        if !event.on_site {
            self.state = NavState::Outside;
            return NavAction::RedirectToRoot;
        }
        let Some(event_id) = event.event_id else {
            self.state = NavState::Browsing;
            return NavAction::None;
        };

        if self.cached_event != Some(event_id) {
            // entering a new event invalidates everything cached for the
            // old one, including a fetch still in flight
            self.cached_event = Some(event_id);
            self.races.clear();
            self.generation += 1;
            self.state = NavState::EventSelected { event_id };
            return NavAction::FetchRaces {
                event_id,
                generation: self.generation,
            };
        }

        self.resolve(event_id, event.race_id);
        NavAction::None
    }

    /// Feeds back the outcome of a race-list fetch. Results from a stale
    /// generation or a no-longer-selected event are dropped.
    pub fn apply_races(
        &mut self,
        generation: u64,
        event_id: i64,
        outcome: CustomResult<Vec<RaceSummary>>,
    ) {
        if generation != self.generation || self.cached_event != Some(event_id) {
            return;
        }
        match outcome {
            Ok(races) => {
                self.races = races.into_iter().map(|r| (r.id, r.api_key)).collect();
                self.resolve(event_id, self.last_seen.race_id);
            }
            Err(_) => {
                self.races.clear();
                self.state = NavState::NotAdministrator { event_id };
            }
        }
    }

    fn resolve(&mut self, event_id: i64, race_id: Option<i64>) {
        if matches!(self.state, NavState::NotAdministrator { event_id: e } if e == event_id) {
            return;
        }
        // an event with a single candidate race resolves it even without a
        // race segment in the URL
        let race_id = race_id.or_else(|| {
            if self.races.len() == 1 {
                self.races.keys().next().copied()
            } else {
                None
            }
        });
        self.state = match race_id.map(|rid| (rid, self.races.get(&rid))) {
            Some((rid, Some(Some(key)))) => NavState::RaceImportable {
                event_id,
                race_id: rid,
                api_key: key.clone(),
            },
            Some((rid, Some(None))) => NavState::RaceLocked {
                event_id,
                race_id: rid,
            },
            _ => NavState::EventSelected { event_id },
        };
    }
}

/// Message carrying a finished race-list fetch back to the tracker's owner.
#[derive(Debug)]
pub struct RaceListUpdate {
    pub generation: u64,
    pub event_id: i64,
    pub outcome: CustomResult<Vec<RaceSummary>>,
}

/// Owns the in-flight race-list fetch so a newer navigation, or closing the
/// window, can abort it. Dropping the fetcher aborts too.
#[derive(Default)]
pub struct RaceListFetcher {
    handle: Option<JoinHandle<()>>,
}

impl RaceListFetcher {
    pub fn new() -> RaceListFetcher {
        RaceListFetcher::default()
    }

    pub fn spawn(
        &mut self,
        api: Arc<RobisApi>,
        token: String,
        event_id: i64,
        generation: u64,
        updates: UnboundedSender<RaceListUpdate>,
    ) {
        self.abort();
        self.handle = Some(tokio::spawn(async move {
            let outcome = api.list_races(&token, event_id).await;
            let _ = updates.send(RaceListUpdate {
                generation,
                event_id,
                outcome,
            });
        }));
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RaceListFetcher {
    fn drop(&mut self) {
        self.abort();
    }
}
