use std::time::Duration;

use beatle_core::{ProjectConfig, SignatureScheme};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;

use crate::catalog::cron::normalize_cron;
use crate::catalog::{parse_cron, resolve_timezone, time_until_next, TaskCatalog};
use crate::client::RemotePayload;
use crate::error::CatalogError;

const TICK: Duration = Duration::from_secs(10);

fn project() -> ProjectConfig {
    ProjectConfig {
        name: "alpha".into(),
        key: "secret".into(),
        url: "http://alpha.local/cron".parse().unwrap(),
        timezone: "UTC".into(),
        update_every: Duration::from_secs(600),
        timeout: Duration::from_secs(5),
        loop_timeout: TICK,
        signature_scheme: SignatureScheme::Values,
        strict_cron: false,
    }
}

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn payload(tasks: &[(&str, &str)]) -> RemotePayload {
    RemotePayload {
        tasks: Some(
            tasks
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
        ),
        ..RemotePayload::default()
    }
}

fn catalog_with(tasks: &[(&str, &str)], now: DateTime<Utc>) -> TaskCatalog {
    TaskCatalog::empty(&project())
        .refreshed(payload(tasks), now, false)
        .unwrap()
}

// ── normalize_cron / parse_cron ─────────────────────────────────────

#[test]
fn normalize_cron_5_to_6_fields() {
    assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
    assert_eq!(normalize_cron("0 6 * * *"), "0 0 6 * * *");
}

#[test]
fn normalize_cron_shifts_numeric_day_of_week() {
    assert_eq!(normalize_cron("0 9 * * 1"), "0 0 9 * * 2");
    assert_eq!(normalize_cron("0 9 * * 0"), "0 0 9 * * 1");
    assert_eq!(normalize_cron("0 9 * * 7"), "0 0 9 * * 1");
    assert_eq!(normalize_cron("0 9 * * 1-5"), "0 0 9 * * 2,3,4,5,6");
    assert_eq!(normalize_cron("0 9 * * 5-7"), "0 0 9 * * 1,6,7");
    assert_eq!(normalize_cron("0 9 * * 0,3"), "0 0 9 * * 1,4");
    assert_eq!(normalize_cron("0 9 * * */2"), "0 0 9 * * 1,3,5,7");
}

#[test]
fn normalize_cron_keeps_named_days() {
    assert_eq!(normalize_cron("0 9 * * MON-FRI"), "0 0 9 * * MON-FRI");
    assert_eq!(normalize_cron("0 9 * * SUN,3"), "0 0 9 * * SUN,4");
}

#[test]
fn normalize_cron_leaves_six_field_day_of_week_alone() {
    assert_eq!(normalize_cron("0 0 9 * * 2"), "0 0 9 * * 2");
}

fn next_after(expr: &str, now: &str) -> DateTime<Utc> {
    let schedule = parse_cron("x", expr).unwrap();
    time_until_next(&schedule, &at(now)).unwrap().1
}

#[test]
fn crontab_weekdays_fire_on_the_right_day() {
    // 2026-01-17 is a Saturday.
    let saturday = "2026-01-17T12:00:00Z";
    assert_eq!(next_after("0 9 * * 1", saturday), at("2026-01-19T09:00:00Z"));
    assert_eq!(next_after("0 9 * * 1-5", saturday), at("2026-01-19T09:00:00Z"));
    assert_eq!(next_after("0 9 * * 0", saturday), at("2026-01-18T09:00:00Z"));
    assert_eq!(next_after("0 9 * * 7", saturday), at("2026-01-18T09:00:00Z"));
    assert_eq!(next_after("0 9 * * 6", "2026-01-16T12:00:00Z"), at("2026-01-17T09:00:00Z"));
}

#[test]
fn out_of_range_day_of_week_is_rejected() {
    assert!(parse_cron("x", "0 9 * * 9").is_err());
}

#[test]
fn normalize_cron_already_6_fields() {
    assert_eq!(normalize_cron("0 */15 * * * *"), "0 */15 * * * *");
}

#[test]
fn normalize_cron_trims_whitespace() {
    assert_eq!(normalize_cron("  */5 * * * *  "), "0 */5 * * * *");
}

#[test]
fn parse_cron_reports_task_and_expression() {
    match parse_cron("broken", "not a cron").unwrap_err() {
        CatalogError::CronParse {
            task, expression, ..
        } => {
            assert_eq!(task, "broken");
            assert_eq!(expression, "not a cron");
        }
        other => panic!("expected CronParse, got: {other:?}"),
    }
}

#[test]
fn time_until_next_is_strictly_after_now() {
    let schedule = parse_cron("x", "*/5 * * * *").unwrap();
    let now = at("2026-01-15T10:05:00Z");
    let (remaining, occurrence) = time_until_next(&schedule, &now).unwrap();
    assert_eq!(occurrence, at("2026-01-15T10:10:00Z"));
    assert_eq!(remaining, chrono::Duration::minutes(5));
}

// ── staleness ───────────────────────────────────────────────────────

#[test]
fn empty_catalog_is_stale() {
    let catalog = TaskCatalog::empty(&project());
    assert!(catalog.last_update().is_none());
    assert!(catalog.is_stale(Utc::now()));
}

#[test]
fn refreshed_catalog_is_fresh_until_update_every_elapses() {
    let now = at("2026-01-15T10:00:00Z");
    let catalog = catalog_with(&[], now);

    assert_eq!(catalog.last_update(), Some(now));
    assert!(!catalog.is_stale(now));
    assert!(!catalog.is_stale(now + chrono::Duration::seconds(599)));
    assert!(catalog.is_stale(now + chrono::Duration::seconds(600)));
    assert!(catalog.is_stale(now + chrono::Duration::hours(1)));
}

#[test]
fn clock_moving_backwards_does_not_force_refresh() {
    let now = at("2026-01-15T10:00:00Z");
    let catalog = catalog_with(&[], now);
    assert!(!catalog.is_stale(now - chrono::Duration::seconds(30)));
}

// ── refresh ─────────────────────────────────────────────────────────

#[test]
fn refresh_replaces_tasks_wholesale() {
    let now = at("2026-01-15T10:00:00Z");
    let first = catalog_with(&[("a", "* * * * *"), ("b", "* * * * *")], now);
    let second = first
        .refreshed(payload(&[("c", "*/5 * * * *")]), now, false)
        .unwrap();

    assert_eq!(second.task_names().collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(second.get("c").unwrap().expression, "*/5 * * * *");
    // The source catalog is untouched.
    assert_eq!(first.len(), 2);
}

#[test]
fn refresh_overrides_settings_when_present() {
    let now = at("2026-01-15T10:00:00Z");
    let remote = RemotePayload {
        time_zone: Some("Asia/Tokyo".into()),
        timeout: Some(2.0),
        update_every: Some(30.0),
        ..payload(&[])
    };
    let catalog = TaskCatalog::empty(&project())
        .refreshed(remote, now, false)
        .unwrap();

    assert_eq!(catalog.timezone, "Asia/Tokyo");
    assert_eq!(catalog.timeout, Duration::from_secs(2));
    assert_eq!(catalog.update_every, Duration::from_secs(30));
}

#[test]
fn refresh_keeps_previous_settings_when_absent() {
    let now = at("2026-01-15T10:00:00Z");
    let remote = RemotePayload {
        time_zone: Some("Asia/Tokyo".into()),
        timeout: Some(2.0),
        ..payload(&[])
    };
    let first = TaskCatalog::empty(&project())
        .refreshed(remote, now, false)
        .unwrap();
    let second = first.refreshed(payload(&[]), now, false).unwrap();

    assert_eq!(second.timezone, "Asia/Tokyo");
    assert_eq!(second.timeout, Duration::from_secs(2));
    assert_eq!(second.update_every, Duration::from_secs(600));
}

#[test]
fn zero_overrides_count_as_absent() {
    let remote = RemotePayload {
        timeout: Some(0.0),
        update_every: Some(0.0),
        time_zone: Some(String::new()),
        ..payload(&[])
    };
    let catalog = TaskCatalog::empty(&project())
        .refreshed(remote, Utc::now(), false)
        .unwrap();

    assert_eq!(catalog.timeout, Duration::from_secs(5));
    assert_eq!(catalog.update_every, Duration::from_secs(600));
    assert_eq!(catalog.timezone, "UTC");
}

#[test]
fn fractional_overrides_are_honoured() {
    let remote = RemotePayload {
        timeout: Some(2.5),
        update_every: Some(-30.0),
        ..payload(&[("x", "*/5 * * * *")])
    };
    let catalog = TaskCatalog::empty(&project())
        .refreshed(remote, Utc::now(), false)
        .unwrap();

    assert_eq!(catalog.timeout, Duration::from_millis(2500));
    assert_eq!(catalog.update_every, Duration::from_secs(600));
    assert_eq!(catalog.len(), 1);
}

#[test]
fn missing_tasks_field_means_no_tasks() {
    let catalog = TaskCatalog::empty(&project())
        .refreshed(RemotePayload::default(), Utc::now(), false)
        .unwrap();
    assert!(catalog.is_empty());
    assert!(catalog.last_update().is_some());
}

#[test]
fn lenient_refresh_drops_invalid_cron() {
    let catalog = catalog_with(&[("good", "*/5 * * * *"), ("bad", "every tuesday")], Utc::now());
    assert_eq!(catalog.task_names().collect::<Vec<_>>(), vec!["good"]);
}

#[test]
fn strict_refresh_rejects_whole_payload() {
    let now = at("2026-01-15T10:00:00Z");
    let current = catalog_with(&[("keep", "* * * * *")], now);

    let result = current.refreshed(
        payload(&[("good", "*/5 * * * *"), ("bad", "every tuesday")]),
        now + chrono::Duration::minutes(20),
        true,
    );

    assert!(matches!(result, Err(CatalogError::CronParse { .. })));
    assert_eq!(current.task_names().collect::<Vec<_>>(), vec!["keep"]);
    assert_eq!(current.last_update(), Some(now));
}

// ── timezone ────────────────────────────────────────────────────────

#[test]
fn resolve_timezone_accepts_iana_names() {
    assert!(resolve_timezone("Europe/Moscow").is_ok());
    assert!(resolve_timezone("UTC").is_ok());
}

#[test]
fn invalid_timezone_is_reported() {
    let remote = RemotePayload {
        time_zone: Some("Mars/Olympus_Mons".into()),
        ..payload(&[])
    };
    let catalog = TaskCatalog::empty(&project())
        .refreshed(remote, Utc::now(), false)
        .unwrap();

    match catalog.local_now(Utc::now()).unwrap_err() {
        CatalogError::Timezone(name) => assert_eq!(name, "Mars/Olympus_Mons"),
        other => panic!("expected Timezone error, got: {other:?}"),
    }
}

// ── due_tasks ───────────────────────────────────────────────────────

#[test]
fn task_inside_window_is_due_and_outside_is_not() {
    // backup fires at 10:05:00 (3s away), report at 10:05:37 (40s away).
    let now = at("2026-01-15T10:04:57Z");
    let catalog = catalog_with(&[("backup", "*/5 * * * *"), ("report", "37 5 10 * * *")], now);

    let due = catalog.due_tasks(&now, TICK);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].name, "backup");
    assert_eq!(due[0].remaining, chrono::Duration::seconds(3));
    assert_eq!(due[0].occurrence, at("2026-01-15T10:05:00Z"));
}

#[test]
fn window_boundary_is_exclusive() {
    // Next occurrence exactly one tick away is left for the next tick.
    let now = at("2026-01-15T10:04:50Z");
    let catalog = catalog_with(&[("backup", "*/5 * * * *")], now);
    assert!(catalog.due_tasks(&now, TICK).is_empty());

    let just_inside = at("2026-01-15T10:04:51Z");
    assert_eq!(catalog.due_tasks(&just_inside, TICK).len(), 1);
}

#[test]
fn due_tasks_are_sorted_by_name() {
    let now = at("2026-01-15T10:04:57Z");
    let catalog = catalog_with(
        &[("zeta", "*/5 * * * *"), ("alpha", "*/5 * * * *"), ("mid", "*/5 * * * *")],
        now,
    );
    let names: Vec<String> = catalog.due_tasks(&now, TICK).into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn due_tasks_respect_catalog_timezone() {
    // 09:00 in Tokyo is 00:00 UTC.
    let remote = RemotePayload {
        time_zone: Some("Asia/Tokyo".into()),
        ..payload(&[("morning", "0 9 * * *")])
    };
    let now = at("2026-01-15T23:59:57Z");
    let catalog = TaskCatalog::empty(&project())
        .refreshed(remote, now, false)
        .unwrap();

    let local = catalog.local_now(now).unwrap();
    let due = catalog.due_tasks(&local, TICK);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].occurrence, at("2026-01-16T00:00:00Z"));

    // Evaluated in UTC the same task is nine hours away.
    assert!(catalog.due_tasks(&now, TICK).is_empty());
}

#[test]
fn six_field_expressions_fire_at_second_resolution() {
    let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let catalog = catalog_with(&[("fast", "*/2 * * * * *")], now);
    let due = catalog.due_tasks(&now, TICK);
    assert_eq!(due[0].remaining, chrono::Duration::seconds(2));
}
