#![allow(dead_code)]

use async_trait::async_trait;
use courtside_engine::backend::{Backend, BackendError, NavigationResult};
use courtside_engine::capture::{Artifact, ArtifactSink, CaptureError};
use courtside_engine::config::TimingConfig;
use courtside_engine::protocol::{
    ElementInfo, Locator, PageState, ProbeAction, ProbeData, ProbeResponse,
};
use courtside_engine::selectors::{Role, SelectorTable};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub const BASE: &str = "https://club.test";
pub const LOGIN_URL: &str = "https://club.test/login";
pub const APP_URL: &str = "https://club.test/app";
pub const GRID_URL: &str = "https://club.test/app/bookings/grid";

// ============================================================
// Scripted page model
// ============================================================

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub key: String,
    pub locators: Vec<Locator>,
    pub text: String,
    pub value: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub present: bool,
    /// Only shows up once this many queries have run on the page.
    pub appear_after: usize,
}

pub fn el(key: &str, locator: Locator) -> FakeElement {
    FakeElement {
        key: key.to_string(),
        locators: vec![locator],
        text: String::new(),
        value: None,
        visible: true,
        enabled: true,
        present: true,
        appear_after: 0,
    }
}

impl FakeElement {
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn also(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    pub fn appear_after(mut self, queries: usize) -> Self {
        self.appear_after = queries;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub text: String,
    pub elements: Vec<FakeElement>,
}

impl FakePage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn body(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

/// What an interaction does to the page.
#[derive(Debug, Clone)]
pub enum Effect {
    Show(String),
    Hide(String),
    Remove(String),
    Add(FakeElement),
    SetText(String, String),
    SetValue(String, String),
    /// Full page load (old element ids become stale).
    GoTo(String),
    /// Client-side URL change, same document.
    SetUrl(String),
    /// Applies the effects once this many further queries have run.
    Later(usize, Vec<Effect>),
}

pub fn show(key: &str) -> Effect {
    Effect::Show(key.to_string())
}

pub fn hide(key: &str) -> Effect {
    Effect::Hide(key.to_string())
}

pub fn remove(key: &str) -> Effect {
    Effect::Remove(key.to_string())
}

pub fn goto(url: &str) -> Effect {
    Effect::GoTo(url.to_string())
}

/// Effects per trigger; each trigger consumes one entry, the last one repeats.
#[derive(Debug, Default)]
struct Script {
    steps: HashMap<String, VecDeque<Vec<Effect>>>,
}

impl Script {
    fn push(&mut self, trigger: &str, effects: Vec<Effect>) {
        self.steps
            .entry(trigger.to_string())
            .or_default()
            .push_back(effects);
    }

    fn next(&mut self, trigger: &str) -> Vec<Effect> {
        match self.steps.get_mut(trigger) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    site: HashMap<String, FakePage>,
    url: String,
    page: FakePage,
    generation: u64,
    ids: Vec<(u64, String)>,
    page_queries: usize,
    pending: Vec<(usize, Vec<Effect>)>,

    clicks: Script,
    typing: Script,
    keys: Script,
    stale_once: HashSet<String>,
    crash_on_click: HashSet<String>,
    /// URLs whose next text read fails with a soft script error.
    text_read_errors: HashSet<String>,
    fail_launch: bool,

    // Observations
    launched: bool,
    closed: bool,
    navigations: Vec<String>,
    clicked: Vec<String>,
    typed: Vec<(String, String)>,
    pressed: Vec<String>,
    queries: Vec<Locator>,
}

impl State {
    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        self.page = self
            .site
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakePage::new("404 Not Found").body("Page not found"));
        self.generation += 1;
        self.page_queries = 0;
    }

    fn register(&mut self, key: &str) -> u32 {
        if let Some(pos) = self
            .ids
            .iter()
            .position(|(g, k)| *g == self.generation && k == key)
        {
            return pos as u32 + 1;
        }
        self.ids.push((self.generation, key.to_string()));
        self.ids.len() as u32
    }

    /// Resolves an id to a live element key, or the probe's stale error.
    fn lookup(&mut self, id: u32) -> Result<String, ProbeResponse> {
        let stale = || ProbeResponse::Error {
            code: "ELEMENT_STALE".into(),
            message: format!("Element {id} is no longer attached"),
            details: Some(serde_json::json!({ "id": id })),
        };
        let entry = id
            .checked_sub(1)
            .and_then(|i| self.ids.get(i as usize))
            .cloned();
        let Some((generation, key)) = entry else {
            return Err(stale());
        };
        if generation != self.generation {
            return Err(stale());
        }
        if self.stale_once.remove(&key) {
            return Err(stale());
        }
        match self.page.elements.iter().find(|e| e.key == key) {
            Some(e) if e.present => Ok(key),
            _ => Err(stale()),
        }
    }

    fn element_mut(&mut self, key: &str) -> Option<&mut FakeElement> {
        self.page.elements.iter_mut().find(|e| e.key == key)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Show(k) => {
                    if let Some(e) = self.element_mut(&k) {
                        e.visible = true;
                        e.present = true;
                    }
                }
                Effect::Hide(k) => {
                    if let Some(e) = self.element_mut(&k) {
                        e.visible = false;
                    }
                }
                Effect::Remove(k) => {
                    if let Some(e) = self.element_mut(&k) {
                        e.present = false;
                    }
                }
                Effect::Add(e) => self.page.elements.push(e),
                Effect::SetText(k, text) => {
                    if let Some(e) = self.element_mut(&k) {
                        e.text = text;
                    }
                }
                Effect::SetValue(k, value) => {
                    if let Some(e) = self.element_mut(&k) {
                        e.value = Some(value);
                    }
                }
                Effect::GoTo(url) => self.load(&url),
                Effect::SetUrl(url) => self.url = url,
                Effect::Later(n, effects) => self.pending.push((n, effects)),
            }
        }
    }

    fn tick_pending(&mut self) {
        let mut due = Vec::new();
        for (remaining, effects) in self.pending.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                due.push(std::mem::take(effects));
            }
        }
        self.pending.retain(|(remaining, _)| *remaining > 0);
        for effects in due {
            self.apply(effects);
        }
    }

    fn visible_text(&self) -> String {
        let mut parts = vec![self.page.text.clone()];
        parts.extend(
            self.page
                .elements
                .iter()
                .filter(|e| e.present && e.visible && !e.text.is_empty())
                .map(|e| e.text.clone()),
        );
        parts.join(" ")
    }
}

/// In-memory `Backend` that plays a scripted site.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.state
            .lock()
            .unwrap()
            .site
            .insert(url.to_string(), page);
        self
    }

    pub fn on_click(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state.lock().unwrap().clicks.push(key, effects);
        self
    }

    pub fn on_type(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state.lock().unwrap().typing.push(key, effects);
        self
    }

    pub fn on_key(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state.lock().unwrap().keys.push(key, effects);
        self
    }

    pub fn stale_once(self, key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .stale_once
            .insert(key.to_string());
        self
    }

    pub fn crash_on_click(self, key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .crash_on_click
            .insert(key.to_string());
        self
    }

    /// The first page-text read on `url` fails as if the document were swapped.
    pub fn script_error_on_text_read(self, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .text_read_errors
            .insert(url.to_string());
        self
    }

    pub fn failing_launch(self) -> Self {
        self.state.lock().unwrap().fail_launch = true;
        self
    }

    /// Starts on `url` as if the browser were already there.
    pub fn at(self, url: &str) -> Self {
        self.state.lock().unwrap().load(url);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        self.navigations().iter().filter(|u| *u == url).count()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    pub fn clicks_on(&self, key: &str) -> usize {
        self.clicked().iter().filter(|k| *k == key).count()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn pressed(&self) -> Vec<String> {
        self.state.lock().unwrap().pressed.clone()
    }

    pub fn queries(&self) -> Vec<Locator> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn current_url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn value_of(&self, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .page
            .elements
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.value.clone())
    }
}

fn ok(data: ProbeData) -> Result<ProbeResponse, BackendError> {
    Ok(ProbeResponse::ok(data))
}

fn done(message: &str) -> Result<ProbeResponse, BackendError> {
    ok(ProbeData::Action {
        message: Some(message.to_string()),
    })
}

#[async_trait]
impl Backend for FakeBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_launch {
            return Err(BackendError::Other("chrome not reachable".into()));
        }
        state.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.launched && !state.closed
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.load(url);
        Ok(NavigationResult {
            url: url.to_string(),
            title: state.page.title.clone(),
            status: 200,
        })
    }

    async fn execute_probe(&mut self, action: ProbeAction) -> Result<ProbeResponse, BackendError> {
        let mut state = self.state.lock().unwrap();
        match action {
            ProbeAction::Query(req) => {
                state.queries.push(req.locator.clone());
                state.page_queries += 1;
                state.tick_pending();
                let seen = state.page_queries;
                let matches: Vec<(String, String, Option<String>, bool, bool)> = state
                    .page
                    .elements
                    .iter()
                    .filter(|e| e.present && seen > e.appear_after)
                    .filter(|e| e.locators.contains(&req.locator))
                    .map(|e| (e.key.clone(), e.text.clone(), e.value.clone(), e.visible, e.enabled))
                    .collect();
                let elements = matches
                    .into_iter()
                    .map(|(key, text, value, visible, enabled)| ElementInfo {
                        id: state.register(&key),
                        tag: "div".into(),
                        text,
                        visible,
                        enabled,
                        value,
                    })
                    .collect();
                ok(ProbeData::Query { elements })
            }
            ProbeAction::Click(req) => {
                let key = match state.lookup(req.id) {
                    Ok(key) => key,
                    Err(resp) => return Ok(resp),
                };
                if state.crash_on_click.contains(&key) {
                    return Err(BackendError::ConnectionLost("target closed".into()));
                }
                let visible = state.element_mut(&key).is_some_and(|e| e.visible);
                if !visible {
                    return Ok(ProbeResponse::Error {
                        code: "ELEMENT_NOT_INTERACTABLE".into(),
                        message: "Element is hidden".into(),
                        details: Some(serde_json::json!({ "id": req.id })),
                    });
                }
                state.clicked.push(key.clone());
                let effects = state.clicks.next(&key);
                state.apply(effects);
                done("clicked")
            }
            ProbeAction::Type(req) => {
                let key = match state.lookup(req.id) {
                    Ok(key) => key,
                    Err(resp) => return Ok(resp),
                };
                state.typed.push((key.clone(), req.text.clone()));
                if let Some(e) = state.element_mut(&key) {
                    let base = if req.clear {
                        String::new()
                    } else {
                        e.value.clone().unwrap_or_default()
                    };
                    e.value = Some(base + &req.text);
                }
                let effects = state.typing.next(&key);
                state.apply(effects);
                done("typed")
            }
            ProbeAction::SetValue(req) => {
                let key = match state.lookup(req.id) {
                    Ok(key) => key,
                    Err(resp) => return Ok(resp),
                };
                if let Some(e) = state.element_mut(&key) {
                    e.value = Some(req.value.clone());
                }
                let effects = state.typing.next(&key);
                state.apply(effects);
                done("value set")
            }
            ProbeAction::ScrollIntoView(req) | ProbeAction::Mark(req) => {
                match state.lookup(req.id) {
                    Ok(_) => done("ok"),
                    Err(resp) => Ok(resp),
                }
            }
            ProbeAction::Read(req) => {
                let key = match state.lookup(req.id) {
                    Ok(key) => key,
                    Err(resp) => return Ok(resp),
                };
                let (text, value) = state
                    .element_mut(&key)
                    .map(|e| (e.text.clone(), e.value.clone()))
                    .unwrap_or_default();
                ok(ProbeData::Read { text, value })
            }
            ProbeAction::Page(req) => {
                let url = state.url.clone();
                if req.include_text && state.text_read_errors.remove(&url) {
                    return Err(BackendError::ScriptError(
                        "Execution context was destroyed".into(),
                    ));
                }
                let text = if req.include_text {
                    state.visible_text()
                } else {
                    String::new()
                };
                ok(ProbeData::Page(PageState {
                    url: state.url.clone(),
                    title: state.page.title.clone(),
                    text,
                    ready_state: "complete".into(),
                }))
            }
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn page_source(&mut self) -> Result<String, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(format!("<html><title>{}</title></html>", state.page.title))
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.pressed.push(key.to_string());
        let effects = state.keys.next(key);
        state.apply(effects);
        Ok(())
    }
}

// ============================================================
// Capture sink that remembers tags
// ============================================================

#[derive(Default)]
pub struct RecordingSink {
    tags: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().unwrap().clone()
    }

    pub fn has_tag(&self, prefix: &str) -> bool {
        self.tags().iter().any(|t| t.starts_with(prefix))
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn store(&self, tag: &str, _artifact: Artifact) -> Result<(), CaptureError> {
        self.tags.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

// ============================================================
// Fixtures
// ============================================================

pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        element_timeout_ms: 60,
        poll_interval_ms: 5,
        settle_ms: 0,
        login_attempts: 3,
        login_backoff_ms: 1,
        login_verify_ms: 30,
        date_attempts: 2,
        dialog_timeout_ms: 30,
        confirm_timeout_ms: 30,
        post_confirm_ms: 15,
    }
}

/// One plain locator per role, matched by the fake backend.
pub fn test_table() -> SelectorTable {
    use Locator as L;
    SelectorTable::empty()
        .with(Role::Username, [L::css("#user")])
        .with(Role::Password, [L::css("#pass")])
        .with(Role::LoginSubmit, [L::css("#login-btn")])
        .with(Role::LoginLink, [L::css("a.login")])
        .with(Role::LoginError, [L::css(".login-error")])
        .with(Role::AuthMarker, [L::css("a.logout")])
        .with(Role::DashboardLink, [L::css("a.dashboard")])
        .with(Role::BookingNav, [L::css("a.book-nav")])
        .with(Role::BookingGrid, [L::css(".grid")])
        .with(Role::DayTab, [L::text("{day_label}")])
        .with(Role::DateInput, [L::css("input.date")])
        .with(Role::DateTextInput, [L::css("input.date-text")])
        .with(Role::DatePickerOpener, [L::css("button.picker")])
        .with(Role::DateCell, [L::css("td[data-date='{date}']")])
        .with(Role::NextDay, [L::css("button.next")])
        .with(Role::SelectedDate, [L::css(".selected-date")])
        .with(Role::TimeLabel, [L::text("{time}")])
        .with(
            Role::SlotCell,
            [L::css("[data-court='{court}'][data-time='{time_24h}']")],
        )
        .with(Role::BookingDialog, [L::css(".dialog")])
        .with(Role::PlayerField, [L::css("input[aria-label='{player_label}']")])
        .with(Role::AddPlayer, [L::css("button.add-player")])
        .with(Role::AutocompleteOption, [L::css(".option")])
        .with(Role::DurationOption, [L::text("{duration}")])
        .with(Role::ConfirmButton, [L::css("button.confirm")])
        .with(Role::BookingSuccess, [L::css(".success")])
        .with(Role::BookingAlert, [L::css(".alert")])
        .with(Role::DialogClose, [L::css("button.close")])
}

pub fn slot_locator(court: u32, time_24h: &str) -> Locator {
    Locator::css(format!("[data-court='{court}'][data-time='{time_24h}']"))
}

/// Login form whose submit leads to the app page.
pub fn login_page() -> FakePage {
    FakePage::new("Sign in")
        .with(el("user", Locator::css("#user")))
        .with(el("pass", Locator::css("#pass")))
        .with(el("submit", Locator::css("#login-btn")).text("Log in"))
}

pub fn app_page() -> FakePage {
    FakePage::new("Dashboard").with(el("logout", Locator::css("a.logout")).text("Logout"))
}

/// How a court's 18:00 slot looks on the grid.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    Open,
    Disabled,
    Booked,
    Missing,
}

/// Booking grid with one 18:00 slot per court, a dialog, and a confirm button.
pub fn grid_page(day_label: &str, courts: &[(u32, Slot)]) -> FakePage {
    let mut page = FakePage::new("Court Bookings")
        .with(el("grid", Locator::css(".grid")))
        .with(el("selected", Locator::css(".selected-date")).text(day_label))
        .with(el("dialog", Locator::css(".dialog")).hidden())
        .with(el("confirm", Locator::css("button.confirm")).text("Book").hidden())
        .with(el("success", Locator::css(".success")).text("Booking confirmed").hidden())
        .with(el("alert", Locator::css(".alert")).hidden());
    for (court, slot) in courts {
        let key = format!("slot-{court}");
        let element = el(&key, slot_locator(*court, "18:00")).text("Book 6:00 pm");
        page = match slot {
            Slot::Open => page.with(element),
            Slot::Disabled => page.with(element.disabled()),
            Slot::Booked => page.with(element.text("Booked")),
            Slot::Missing => page,
        };
    }
    page
}

/// Clicking any open slot opens the dialog; confirm succeeds.
pub fn with_booking_flow(mut backend: FakeBackend, courts: &[u32]) -> FakeBackend {
    for court in courts {
        backend = backend.on_click(&format!("slot-{court}"), vec![show("dialog"), show("confirm")]);
    }
    backend
        .on_click("confirm", vec![hide("confirm"), hide("dialog"), show("success")])
        .on_key("Escape", vec![hide("dialog"), hide("confirm")])
}
