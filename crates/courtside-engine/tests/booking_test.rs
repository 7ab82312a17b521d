mod common;

use chrono::NaiveDate;
use common::*;
use courtside_engine::booking::{AttemptErrorKind, BookingReport, BookingResolver};
use courtside_engine::config::schema::BookingConfig;
use courtside_engine::outcome::TerminalState;
use courtside_engine::page::Page;
use courtside_engine::protocol::Locator;
use courtside_engine::request::{BookingRequest, ResourceId};
use courtside_engine::resolution::ElementResolver;
use courtside_engine::schedule::SlotTime;

fn request(courts: &[u32]) -> BookingRequest {
    BookingRequest {
        date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
        days_ahead: 7,
        resources: courts.iter().copied().map(ResourceId::from).collect(),
        time: SlotTime::new(18, 0).unwrap(),
        duration_minutes: 60,
        players: Vec::new(),
    }
}

async fn run(backend: &mut FakeBackend, sink: &RecordingSink, request: &BookingRequest) -> BookingReport {
    let table = test_table();
    let timing = fast_timing();
    let settings = BookingConfig::default();
    let resolver = ElementResolver::new(&table, timing.poll_interval());
    let booker = BookingResolver::new(&resolver, &timing, &settings);
    let mut page = Page::new(backend, sink);
    booker.book(&mut page, request).await
}

#[tokio::test]
async fn test_first_available_court_is_booked() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open), (2, Slot::Open), (3, Slot::Open)]);
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[1, 2, 3],
    );
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2, 3])).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(report.outcome.resource, Some(ResourceId::from(1)));
    assert_eq!(report.outcome.message, "Booked court 1 at 6:00 pm on Mon 5th");
    assert_eq!(report.attempts.len(), 1);
    assert!(report.attempts[0].confirmed);
    assert_eq!(backend.clicks_on("slot-2"), 0);
    assert!(sink.has_tag("pre_confirmation"));
    assert!(sink.has_tag("post_confirmation"));
}

#[tokio::test]
async fn test_unavailable_courts_are_skipped_in_order() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Disabled), (2, Slot::Booked), (3, Slot::Open)]);
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[3],
    );
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2, 3])).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(report.outcome.resource, Some(ResourceId::from(3)));
    let seen: Vec<(bool, bool)> = report
        .attempts
        .iter()
        .map(|a| (a.found, a.slot_available))
        .collect();
    assert_eq!(seen, vec![(true, false), (true, false), (true, true)]);
    assert_eq!(backend.clicks_on("slot-1"), 0);
    assert_eq!(backend.clicks_on("slot-2"), 0);
}

#[tokio::test]
async fn test_first_fit_stops_at_the_second_preference() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Booked), (2, Slot::Open), (3, Slot::Open)]);
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[2, 3],
    );
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2, 3])).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(report.outcome.resource, Some(ResourceId::from(2)));
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].resource, ResourceId::from(1));
    assert!(report.attempts[0].found);
    assert!(!report.attempts[0].slot_available);
    assert!(!report.attempts[0].confirmed);
    assert!(report.attempts[1].confirmed);
    assert_eq!(backend.clicks_on("slot-1"), 0);
    assert_eq!(backend.clicks_on("slot-2"), 1);
    assert_eq!(backend.clicks_on("slot-3"), 0);
    assert!(!backend.queries().contains(&slot_locator(3, "18:00")));
}

#[tokio::test]
async fn test_nothing_free_is_no_availability_with_one_attempt_per_court() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Disabled), (2, Slot::Booked), (3, Slot::Missing)]);
    let mut backend = FakeBackend::new().page(GRID_URL, grid).at(GRID_URL);
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2, 3])).await;

    assert_eq!(report.outcome.state, TerminalState::NoAvailability);
    assert_eq!(report.outcome.message, "No court available at 6:00 pm on Mon 5th (tried 1, 2, 3)");
    assert_eq!(report.attempts.len(), 3);
    let resources: Vec<&str> = report.attempts.iter().map(|a| a.resource.as_str()).collect();
    assert_eq!(resources, vec!["1", "2", "3"]);
    assert!(!report.attempts[2].found);
    assert!(report.attempts.iter().all(|a| !a.is_hard_error()));
    assert!(backend.clicked().is_empty());
}

#[tokio::test]
async fn test_dialog_that_never_opens_moves_to_next_court() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open), (2, Slot::Open)]);
    // Court 1's slot click does nothing.
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[2],
    );
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2])).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(report.outcome.resource, Some(ResourceId::from(2)));
    let first = &report.attempts[0];
    assert!(first.slot_available);
    assert!(!first.committed);
    assert_eq!(
        first.error.as_ref().map(|e| e.kind),
        Some(AttemptErrorKind::Transient)
    );
    assert!(sink.has_tag("attempt_failed_court_1"));
}

#[tokio::test]
async fn test_alert_after_confirm_is_failure_and_stops() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open), (2, Slot::Open)]);
    let mut backend = FakeBackend::new()
        .page(GRID_URL, grid)
        .at(GRID_URL)
        .on_click("slot-1", vec![show("dialog"), show("confirm")])
        .on_click("slot-2", vec![show("dialog"), show("confirm")])
        .on_click(
            "confirm",
            vec![
                Effect::SetText("alert".into(), "This court is already booked".into()),
                show("alert"),
            ],
        );
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2])).await;

    assert_eq!(report.outcome.state, TerminalState::Failure);
    assert!(report.outcome.message.contains("already booked"), "{}", report.outcome.message);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(
        report.attempts[0].error.as_ref().map(|e| e.kind),
        Some(AttemptErrorKind::Rejected)
    );
    assert_eq!(backend.clicks_on("slot-2"), 0);
}

#[tokio::test]
async fn test_unverifiable_confirm_is_error_and_stops() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open), (2, Slot::Open)]);
    let mut backend = FakeBackend::new()
        .page(GRID_URL, grid)
        .at(GRID_URL)
        .on_click("slot-1", vec![show("dialog"), show("confirm")])
        .on_click("slot-2", vec![show("dialog"), show("confirm")]);
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2])).await;

    assert_eq!(report.outcome.state, TerminalState::Error);
    assert_eq!(report.attempts.len(), 1);
    assert!(report.attempts[0].committed);
    assert_eq!(
        report.attempts[0].error.as_ref().map(|e| e.kind),
        Some(AttemptErrorKind::Unverified)
    );
    assert_eq!(backend.clicks_on("confirm"), 1);
    assert_eq!(backend.clicks_on("slot-2"), 0);
}

#[tokio::test]
async fn test_browser_crash_is_error_and_stops() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open), (2, Slot::Open)]);
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[2],
    )
    .crash_on_click("slot-1");
    let sink = RecordingSink::default();

    let report = run(&mut backend, &sink, &request(&[1, 2])).await;

    assert_eq!(report.outcome.state, TerminalState::Error);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(
        report.attempts[0].error.as_ref().map(|e| e.kind),
        Some(AttemptErrorKind::Fatal)
    );
    assert_eq!(backend.clicks_on("slot-2"), 0);
}

#[tokio::test]
async fn test_players_are_filled_with_autocomplete_or_keyboard() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open)])
        .with(el("p2", Locator::css("input[aria-label='Player 2']")))
        .with(el("p3", Locator::css("input[aria-label='Player 3']")).hidden())
        .with(el("add", Locator::css("button.add-player")).text("Add Player"))
        .with(el("opt", Locator::css(".option")).text("Blair Smith").hidden());
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[1],
    )
    .on_type("p2", vec![show("opt")])
    .on_click("opt", vec![hide("opt")])
    .on_click("add", vec![show("p3")]);
    let sink = RecordingSink::default();
    let mut req = request(&[1]);
    req.players = vec!["Blair".into(), "Casey".into()];

    let report = run(&mut backend, &sink, &req).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(
        backend.typed(),
        vec![
            ("p2".to_string(), "Blair".to_string()),
            ("p3".to_string(), "Casey".to_string()),
        ]
    );
    assert_eq!(backend.clicks_on("opt"), 1);
    assert_eq!(backend.clicks_on("add"), 1);
    assert_eq!(backend.pressed(), vec!["ArrowDown".to_string(), "Enter".to_string()]);
}

#[tokio::test]
async fn test_duration_option_matches_any_label_form() {
    let grid = grid_page("Mon 5th", &[(1, Slot::Open)])
        .with(el("dur", Locator::text("2 hr")).text("2 hr"));
    let mut backend = with_booking_flow(
        FakeBackend::new().page(GRID_URL, grid).at(GRID_URL),
        &[1],
    );
    let sink = RecordingSink::default();
    let mut req = request(&[1]);
    req.duration_minutes = 120;

    let report = run(&mut backend, &sink, &req).await;

    assert_eq!(report.outcome.state, TerminalState::Success);
    assert_eq!(backend.clicks_on("dur"), 1);
}
