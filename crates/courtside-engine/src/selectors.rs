//! Selector strategy table.
//!
//! Each logical role maps to an ordered list of locator candidates; earlier
//! candidates win. Queries may contain `{placeholder}`s that are filled from
//! per-call [`RoleParams`]. The table is assembled once at startup (defaults
//! plus configured extras) and only read afterwards.

use courtside_common::protocol::{Locator, Strategy};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z0-9_]+)\}").unwrap());

static XPATH_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'[^']*'").unwrap());

/// What an element is for, independent of its markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Username,
    Password,
    LoginSubmit,
    LoginLink,
    LoginError,
    AuthMarker,
    DashboardLink,
    BookingNav,
    BookingGrid,
    DayTab,
    DateInput,
    DateTextInput,
    DatePickerOpener,
    DateCell,
    NextDay,
    SelectedDate,
    TimeLabel,
    SlotCell,
    BookingDialog,
    PlayerField,
    AddPlayer,
    AutocompleteOption,
    DurationOption,
    ConfirmButton,
    BookingSuccess,
    BookingAlert,
    DialogClose,
}

impl Role {
    pub const ALL: [Role; 27] = [
        Role::Username,
        Role::Password,
        Role::LoginSubmit,
        Role::LoginLink,
        Role::LoginError,
        Role::AuthMarker,
        Role::DashboardLink,
        Role::BookingNav,
        Role::BookingGrid,
        Role::DayTab,
        Role::DateInput,
        Role::DateTextInput,
        Role::DatePickerOpener,
        Role::DateCell,
        Role::NextDay,
        Role::SelectedDate,
        Role::TimeLabel,
        Role::SlotCell,
        Role::BookingDialog,
        Role::PlayerField,
        Role::AddPlayer,
        Role::AutocompleteOption,
        Role::DurationOption,
        Role::ConfirmButton,
        Role::BookingSuccess,
        Role::BookingAlert,
        Role::DialogClose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Username => "username",
            Role::Password => "password",
            Role::LoginSubmit => "login_submit",
            Role::LoginLink => "login_link",
            Role::LoginError => "login_error",
            Role::AuthMarker => "auth_marker",
            Role::DashboardLink => "dashboard_link",
            Role::BookingNav => "booking_nav",
            Role::BookingGrid => "booking_grid",
            Role::DayTab => "day_tab",
            Role::DateInput => "date_input",
            Role::DateTextInput => "date_text_input",
            Role::DatePickerOpener => "date_picker_opener",
            Role::DateCell => "date_cell",
            Role::NextDay => "next_day",
            Role::SelectedDate => "selected_date",
            Role::TimeLabel => "time_label",
            Role::SlotCell => "slot_cell",
            Role::BookingDialog => "booking_dialog",
            Role::PlayerField => "player_field",
            Role::AddPlayer => "add_player",
            Role::AutocompleteOption => "autocomplete_option",
            Role::DurationOption => "duration_option",
            Role::ConfirmButton => "confirm_button",
            Role::BookingSuccess => "booking_success",
            Role::BookingAlert => "booking_alert",
            Role::DialogClose => "dialog_close",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of finding an element for a role. The query may be a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCandidate {
    pub role: Role,
    pub locator: Locator,
}

/// Values for the placeholders of a role's templates.
///
/// A placeholder bound to several values expands into several locators.
#[derive(Debug, Clone, Default)]
pub struct RoleParams {
    bindings: Vec<(String, Vec<String>)>,
}

impl RoleParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, value: impl Into<String>) -> Self {
        self.with_all(name, [value.into()])
    }

    pub fn with_all<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.bindings.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.bindings.push((name.to_string(), values)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    entries: HashMap<Role, Vec<SelectorCandidate>>,
}

impl SelectorTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends candidates to a role, after the ones already present.
    pub fn with<I>(mut self, role: Role, locators: I) -> Self
    where
        I: IntoIterator<Item = Locator>,
    {
        let list = self.entries.entry(role).or_default();
        list.extend(
            locators
                .into_iter()
                .map(|locator| SelectorCandidate { role, locator }),
        );
        self
    }

    /// Appends configured extras; they rank below the built-in candidates.
    pub fn extend(mut self, extra: &HashMap<Role, Vec<Locator>>) -> Self {
        for role in Role::ALL {
            if let Some(locators) = extra.get(&role) {
                self = self.with(role, locators.iter().cloned());
            }
        }
        self
    }

    pub fn candidates(&self, role: Role) -> &[SelectorCandidate] {
        self.entries.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Concrete locators for a role, in priority order.
    ///
    /// Candidate order is outermost; for a multi-valued placeholder, value
    /// order is inner. Candidates with an unbound placeholder are skipped.
    pub fn expand(&self, role: Role, params: &RoleParams) -> Vec<Locator> {
        let mut out: Vec<Locator> = Vec::new();
        for candidate in self.candidates(role) {
            match fill(&candidate.locator.query, candidate.locator.strategy, params) {
                Some(queries) => {
                    for query in queries {
                        let locator = Locator::new(candidate.locator.strategy, query);
                        if !out.contains(&locator) {
                            out.push(locator);
                        }
                    }
                }
                None => debug!(%role, query = %candidate.locator.query, "skipping template with unbound placeholder"),
            }
        }
        out
    }

    /// The built-in candidate lists.
    pub fn defaults() -> Self {
        use Locator as L;
        Self::empty()
            .with(
                Role::Username,
                [
                    L::css(r#"input[name="username"]"#),
                    L::css(r#"input[name="email"]"#),
                    L::css("#username"),
                    L::css("#email"),
                    L::css(r#"input[type="email"]"#),
                    L::css(r#"input[autocomplete*="username"]"#),
                    L::css(r#"input[autocomplete*="email"]"#),
                    L::css(r#"input[placeholder*="email" i]"#),
                    L::css(r#"input[placeholder*="username" i]"#),
                ],
            )
            .with(
                Role::Password,
                [
                    L::css(r#"input[type="password"]"#),
                    L::css(r#"input[name="password"]"#),
                    L::css(r#"input[autocomplete*="current-password"]"#),
                    L::css(r#"input[placeholder*="password" i]"#),
                ],
            )
            .with(
                Role::LoginSubmit,
                [
                    L::css(r#"button[type="submit"]"#),
                    L::css(r#"input[type="submit"]"#),
                    L::xpath("//button[contains(translate(., 'LOGIN', 'login'), 'login')]"),
                    L::xpath("//input[contains(translate(@value, 'LOGIN', 'login'), 'login')]"),
                    L::xpath("//button[contains(translate(., 'SIGN IN', 'sign in'), 'sign in')]"),
                    L::xpath("//input[contains(translate(@value, 'SIGN IN', 'sign in'), 'sign in')]"),
                ],
            )
            .with(
                Role::LoginLink,
                [L::xpath(
                    "//a[contains(translate(., 'LOGIN', 'login'), 'login') or contains(translate(., 'SIGN IN', 'sign in'), 'sign in')]",
                )],
            )
            .with(
                Role::LoginError,
                [
                    L::css(".alert-danger, .alert-error, .error-message, .login-error, .validation-error"),
                    L::css(".MuiAlert-standardError, .MuiAlert-filledError"),
                    L::xpath(
                        "//*[@role='alert'][contains(translate(., 'INVALID', 'invalid'), 'invalid') or contains(translate(., 'INCORRECT', 'incorrect'), 'incorrect') or contains(translate(., 'FAILED', 'failed'), 'failed')]",
                    ),
                ],
            )
            .with(
                Role::AuthMarker,
                [
                    L::xpath(
                        "//a[contains(translate(., 'LOGOUT', 'logout'), 'logout') or contains(translate(., 'SIGN OUT', 'sign out'), 'sign out')]",
                    ),
                    L::css("[href*='logout'], button.logout, a.logout"),
                    L::xpath("//a[contains(., 'My Account') or contains(., 'Profile')]"),
                ],
            )
            .with(
                Role::DashboardLink,
                [L::xpath(
                    "//a[contains(normalize-space(.), 'To Dashboard')] | //button[contains(normalize-space(.), 'To Dashboard')]",
                )],
            )
            .with(
                Role::BookingNav,
                [
                    L::xpath("//a[contains(translate(., 'BOOKING GRID', 'booking grid'), 'booking grid')]"),
                    L::xpath("//button[contains(translate(., 'BOOKING GRID', 'booking grid'), 'booking grid')]"),
                    L::xpath("//a[contains(translate(., 'COURT BOOKING', 'court booking'), 'court booking')]"),
                    L::xpath("//a[contains(translate(., 'RESERVE', 'reserve'), 'reserve')]"),
                    L::xpath("//a[contains(translate(., 'BOOK', 'book'), 'book')]"),
                ],
            )
            .with(
                Role::BookingGrid,
                [
                    L::xpath("//h1[contains(translate(., 'COURT BOOKINGS', 'court bookings'), 'court bookings')]"),
                    L::css(".booking-calendar, .booking-grid"),
                    L::xpath("//div[contains(@class, 'MuiBox-root')]//p[starts-with(normalize-space(.), 'Court')]"),
                    L::css("table"),
                ],
            )
            .with(
                Role::DayTab,
                [
                    L::xpath("//span[contains(@class, 'MuiChip-label')][normalize-space()='{day_label}']"),
                    L::xpath("//button[normalize-space()='{day_label}'] | //a[normalize-space()='{day_label}']"),
                    L::text("{day_label}"),
                ],
            )
            .with(Role::DateInput, [L::css("input[type='date']")])
            .with(
                Role::DateTextInput,
                [
                    L::css("input[name*='date' i]:not([type='date'])"),
                    L::css("input[placeholder*='date' i]:not([type='date'])"),
                    L::xpath("//input[@type!='date' and contains(translate(@aria-label, 'DATE', 'date'), 'date')]"),
                ],
            )
            .with(
                Role::DatePickerOpener,
                [L::xpath(
                    "//button[contains(@class, 'date') or contains(@aria-label, 'date') or contains(., 'Date')]",
                )],
            )
            .with(
                Role::DateCell,
                [
                    L::xpath("//td[@data-date='{date}'] | //button[@data-date='{date}']"),
                    L::css("[aria-label='{long_date}']"),
                    L::xpath("//td//button[normalize-space()='{day}']"),
                ],
            )
            .with(
                Role::NextDay,
                [
                    L::css("button[aria-label*='next day' i]"),
                    L::xpath("//button[contains(translate(., 'NEXT', 'next'), 'next') or contains(@aria-label, 'Next')]"),
                ],
            )
            .with(
                Role::SelectedDate,
                [
                    L::css(".MuiChip-filled .MuiChip-label, .MuiChip-colorPrimary .MuiChip-label"),
                    L::css("[aria-selected='true'], [aria-current='date']"),
                    L::css(".current-date, .selected-date"),
                    L::css("input[type='date']"),
                ],
            )
            .with(
                Role::TimeLabel,
                [
                    L::xpath("//p[normalize-space()='{time}']"),
                    L::text("{time}"),
                ],
            )
            .with(
                Role::SlotCell,
                [
                    L::xpath(
                        "//div[contains(@class, 'MuiBox-root')][p[normalize-space()='Court {court}']]//button[.//p[normalize-space()='Book {time}']]",
                    ),
                    L::css("[data-court='{court}'][data-time='{time_24h}']"),
                    L::xpath("//*[@data-court='{court}' and @data-time='{time_24h}']//*[self::button or self::a]"),
                    L::xpath(
                        "//table//tr[th[contains(normalize-space(.), '{time}')]]/td[{court}]//*[self::button or self::a]",
                    ),
                    L::xpath(
                        "//table//tr[td[1][contains(normalize-space(.), '{time}')]]/td[{court} + 1]//*[self::button or self::a]",
                    ),
                    L::xpath(
                        "//*[normalize-space()='Court {court}']/following::button[contains(., 'Book') and contains(., '{time}')][1]",
                    ),
                ],
            )
            .with(
                Role::BookingDialog,
                [L::css("div[role='dialog'], .MuiDialog-root, .booking-dialog")],
            )
            .with(
                Role::PlayerField,
                [
                    L::xpath("//*[@role='dialog']//*[normalize-space(text())='{player_label}']/following::input[1]"),
                    L::xpath("//label[contains(normalize-space(.), '{player_label}')]/following::input[1]"),
                    L::css("input[placeholder*='{player_label}' i], input[aria-label*='{player_label}' i]"),
                ],
            )
            .with(
                Role::AddPlayer,
                [
                    L::xpath("//button[contains(., 'Add Player')]"),
                    L::text("Add Player"),
                ],
            )
            .with(
                Role::AutocompleteOption,
                [
                    L::css("[role='listbox'] [role='option']"),
                    L::css("li.MuiAutocomplete-option"),
                    L::css("[role='option']"),
                ],
            )
            .with(
                Role::DurationOption,
                [
                    L::xpath("//button[contains(normalize-space(.), '{duration}')]"),
                    L::xpath("//label[contains(., '{duration}')]//input | //label[contains(., '{duration}')]/preceding::input[1]"),
                    L::xpath("//input[@type='radio' and @value='{duration_minutes}']"),
                ],
            )
            .with(
                Role::ConfirmButton,
                [
                    L::xpath("//div[@role='dialog']//button[normalize-space(.)='Book']"),
                    L::css("button.confirm-booking"),
                    L::xpath("//div[@role='dialog']//button[@type='submit']"),
                    L::xpath(
                        "//button[contains(., 'Confirm') or contains(., 'Book Now') or contains(., 'Complete Booking')]",
                    ),
                    L::xpath("//button[normalize-space(.)='Book']"),
                ],
            )
            .with(
                Role::BookingSuccess,
                [
                    L::css(".alert-success, .success-message, .confirmation-message"),
                    L::css(".MuiAlert-standardSuccess, .MuiAlert-filledSuccess"),
                    L::text("Booking Confirmed"),
                    L::text("Booking Complete"),
                    L::text("Booking Confirmation"),
                ],
            )
            .with(
                Role::BookingAlert,
                [
                    L::css(".MuiAlert-standardError .MuiAlert-message, .MuiAlert-filledError .MuiAlert-message"),
                    L::css(".MuiAlert-standardWarning .MuiAlert-message"),
                    L::css(".alert-danger, .alert-error, .error-message, .validation-error"),
                ],
            )
            .with(
                Role::DialogClose,
                [
                    L::css("[role='dialog'] button[aria-label*='close' i]"),
                    L::xpath("//div[@role='dialog']//button[contains(., 'Cancel') or contains(., 'Close')]"),
                ],
            )
    }
}

type Binding<'a> = Vec<(&'a str, &'a str)>;

/// Fills a template; `None` when a placeholder has no binding.
///
/// Values are quoted for the locator's query language. A binding that cannot
/// be expressed safely (a non-numeric value in an XPath expression position)
/// is dropped.
fn fill(template: &str, strategy: Strategy, params: &RoleParams) -> Option<Vec<String>> {
    let mut names: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps.get(1)?.as_str();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut bindings: Vec<Binding> = vec![Vec::new()];
    for name in names {
        let values = params.get(name)?;
        bindings = bindings
            .iter()
            .flat_map(|bound| {
                values.iter().map(move |v| {
                    let mut next = bound.clone();
                    next.push((name, v.as_str()));
                    next
                })
            })
            .collect();
    }

    Some(
        bindings
            .iter()
            .filter_map(|binding| match strategy {
                Strategy::Xpath => render_xpath(template, binding),
                Strategy::Css => Some(substitute(template, binding, css_escape)),
                Strategy::Text | Strategy::Attribute => {
                    Some(substitute(template, binding, str::to_string))
                }
            })
            .collect(),
    )
}

fn bound<'a>(binding: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    binding.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

fn substitute(text: &str, binding: &[(&str, &str)], escape: impl Fn(&str) -> String) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match bound(binding, &caps[1]) {
            Some(value) => escape(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Backslash-escapes a value for a quoted CSS string.
fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Renders an XPath template. Placeholders inside `'...'` literals are
/// re-quoted with [`xpath_literal`]; outside a literal only numbers fit.
fn render_xpath(template: &str, binding: &[(&str, &str)]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for literal in XPATH_LITERAL.find_iter(template) {
        out.push_str(&render_xpath_expr(&template[last..literal.start()], binding)?);
        let inner = &template[literal.start() + 1..literal.end() - 1];
        if PLACEHOLDER.is_match(inner) {
            out.push_str(&xpath_literal(&substitute(inner, binding, str::to_string)));
        } else {
            out.push_str(literal.as_str());
        }
        last = literal.end();
    }
    out.push_str(&render_xpath_expr(&template[last..], binding)?);
    Some(out)
}

fn render_xpath_expr(text: &str, binding: &[(&str, &str)]) -> Option<String> {
    for caps in PLACEHOLDER.captures_iter(text) {
        let value = bound(binding, &caps[1])?;
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
            debug!(value, "value cannot stand in an XPath expression");
            return None;
        }
    }
    Some(substitute(text, binding, str::to_string))
}

/// XPath 1.0 string literal for any text; `concat()` when it holds both quote kinds.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}
