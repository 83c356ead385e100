use crate::db::connection::Database;
use crate::db::{changes, periods, price_history, properties, rooms, trends};
use crate::domain::parser::parse_room_description;
use crate::domain::room::{RoomStatus, TrackedRoom};
use crate::tests::utils::{descriptions, make_db, new_analysis, seed_property, ts};
use chrono::{Duration, Utc};

fn all_rooms(db: &Database, property_id: i64) -> Vec<TrackedRoom> {
    db.with_conn(|conn| rooms::get_rooms_for_property(conn, property_id))
        .expect("Failed to load rooms")
}

fn room_by_label(rooms: &[TrackedRoom], label: &str) -> TrackedRoom {
    rooms
        .iter()
        .find(|r| r.room_label == label)
        .unwrap_or_else(|| panic!("No room labelled '{label}'"))
        .clone()
}

fn get_property(db: &Database, id: i64) -> properties::Property {
    db.with_conn(|conn| properties::get_property(conn, id))
        .expect("Failed to load property")
        .expect("Property missing")
}

#[test]
fn full_lifecycle_discover_reprice_disappear() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/1");

    // Scrape 1: one available room, one already let.
    let a1 = new_analysis(&db, pid, ts(0));
    let s1 = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £500 pcm (En-suite)",
            "Room 2 - £600 pcm (NOW LET)",
        ]),
        a1,
        false,
        ts(0),
    )
    .unwrap();

    assert_eq!(s1.rooms_seen, 2);
    assert_eq!(s1.new_rooms, 2);
    assert_eq!(s1.available_rooms, 1);
    assert_eq!(s1.taken_rooms, 1);

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot.len(), 2);
    let room1 = room_by_label(&snapshot, "Room 1");
    let room2 = room_by_label(&snapshot, "Room 2");
    assert_eq!(room1.current_status, RoomStatus::Available);
    assert_eq!(room1.current_price, Some(500.0));
    assert!(room1.current_period_id.is_some());
    assert_eq!(room2.current_status, RoomStatus::Taken);
    assert!(room2.current_period_id.is_none());

    let prop = get_property(&db, pid);
    assert_eq!(prop.estimated_monthly_income, Some(500.0));
    assert_eq!(prop.estimated_annual_income, Some(6000.0));

    // Scrape 2, one day later: Room 1 repriced. The stable key changes with
    // the price, so this exercises the label fallback and must land as a
    // price change on the same room, not a disappear + discover.
    let a2 = new_analysis(&db, pid, ts(1));
    let s2 = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £520 pcm (En-suite)",
            "Room 2 - £600 pcm (NOW LET)",
        ]),
        a2,
        false,
        ts(1),
    )
    .unwrap();

    assert_eq!(s2.new_rooms, 0);
    assert_eq!(s2.updated_rooms, 2);
    assert_eq!(s2.disappeared_rooms, 0);

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot.len(), 2, "Reprice must not create a new room");
    let room1 = room_by_label(&snapshot, "Room 1");
    assert_eq!(room1.current_price, Some(520.0));
    assert_eq!(room1.original_price, Some(500.0));
    assert_eq!(room1.times_seen, 2);
    assert_eq!(room1.times_changed, 1);

    let history = db
        .with_conn(|conn| price_history::get_history_in_window(conn, pid, ts(-1)))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_price, Some(500.0));
    assert_eq!(history[0].new_price, 520.0);
    assert!((history[0].change_amount.unwrap() - 20.0).abs() < 1e-9);
    assert!((history[0].change_percentage.unwrap() - 4.0).abs() < 1e-9);

    // The period opened at scrape 1 survives the reprice.
    let open = db
        .with_conn(|conn| periods::find_open_period(conn, room1.id))
        .unwrap();
    let open = open.expect("Period should still be open after a reprice");
    assert_eq!(open.period_start_date, ts(0));

    // Scrape 3, another day later: Room 1 gone from the listing entirely.
    let a3 = new_analysis(&db, pid, ts(2));
    let s3 = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 2 - £600 pcm (NOW LET)"]),
        a3,
        false,
        ts(2),
    )
    .unwrap();

    assert_eq!(s3.disappeared_rooms, 1);

    let snapshot = all_rooms(&db, pid);
    let room1 = room_by_label(&snapshot, "Room 1");
    assert_eq!(room1.current_status, RoomStatus::Offline);
    assert!(!room1.is_currently_listed);
    assert_eq!(room1.date_gone, Some(ts(2)));
    assert!(room1.current_period_id.is_none());

    let room1_periods = db
        .with_conn(|conn| periods::get_periods(conn, room1.id, 10))
        .unwrap();
    assert_eq!(room1_periods.len(), 1);
    assert_eq!(room1_periods[0].period_end_date, Some(ts(2)));
    assert_eq!(room1_periods[0].duration_days, Some(2));
    assert!(!room1_periods[0].is_current_period);

    // Income survives the room going offline.
    let prop = get_property(&db, pid);
    assert_eq!(prop.estimated_monthly_income, Some(520.0));

    // The audit log for Room 1 tells the whole story.
    let log = db
        .with_conn(|conn| changes::get_changes_for_room(conn, room1.id, 10))
        .unwrap();
    let kinds: Vec<&str> = log.iter().map(|c| c.change_type.as_str()).collect();
    assert!(kinds.contains(&"discovered"));
    assert!(kinds.contains(&"price_change"));
    assert!(kinds.contains(&"disappeared"));

    // Property-level availability: nothing available, gone since scrape 3.
    let summary = periods::get_property_period_summary(&db, pid).unwrap();
    assert_eq!(summary.current_available_rooms, 0);
    assert_eq!(summary.property_date_gone, Some(ts(2)));
}

#[test]
fn expired_listing_forces_taken_and_preserves_income() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/2");

    let a1 = new_analysis(&db, pid, ts(0));
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £500 pcm (Double)",
            "Room 2 - £600 pcm (Single)",
        ]),
        a1,
        false,
        ts(0),
    )
    .unwrap();

    let prop = get_property(&db, pid);
    assert_eq!(prop.estimated_monthly_income, Some(1100.0));
    assert_eq!(prop.estimated_annual_income, Some(13200.0));

    let a2 = new_analysis(&db, pid, ts(3));
    let s2 = rooms::analyze_property_at(&db, pid, &[], a2, true, ts(3)).unwrap();

    assert!(s2.expired_listing);
    assert_eq!(s2.updated_rooms, 2);

    for room in all_rooms(&db, pid) {
        assert_eq!(room.current_status, RoomStatus::Taken);
        assert!(room.current_period_id.is_none());
        let open = db
            .with_conn(|conn| periods::find_open_period(conn, room.id))
            .unwrap();
        assert!(open.is_none(), "Expiry must close every open period");

        let log = db
            .with_conn(|conn| changes::get_changes_for_room(conn, room.id, 10))
            .unwrap();
        assert!(log.iter().any(|c| c.summary.contains("Listing expired")));
    }

    // The pre-expiry estimates are the point of the feature.
    let prop = get_property(&db, pid);
    assert_eq!(prop.estimated_monthly_income, Some(1100.0));
    assert_eq!(prop.estimated_annual_income, Some(13200.0));
}

#[test]
fn availability_periods_never_overlap() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/3");

    // Status flaps over five scrapes: available, taken, available, taken,
    // available again.
    let states = [
        (0, "Room 1 - £500 pcm (Double)"),
        (4, "Room 1 - £500 pcm (NOW LET)"),
        (10, "Room 1 - £500 pcm (Double)"),
        (17, "Room 1 - £500 pcm (TAKEN)"),
        (20, "Room 1 - £500 pcm (Double)"),
    ];
    for (day, desc) in states {
        let aid = new_analysis(&db, pid, ts(day));
        rooms::analyze_property_at(&db, pid, &descriptions(&[desc]), aid, false, ts(day))
            .unwrap();
    }

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot.len(), 1);
    let room = &snapshot[0];
    assert_eq!(room.total_availability_periods, 3);

    let mut room_periods = db
        .with_conn(|conn| periods::get_periods(conn, room.id, 10))
        .unwrap();
    room_periods.sort_by_key(|p| p.period_start_date);
    assert_eq!(room_periods.len(), 3);

    let open_count = room_periods.iter().filter(|p| p.is_current_period).count();
    assert_eq!(open_count, 1, "At most one open period per room");

    for pair in room_periods.windows(2) {
        let end = pair[0]
            .period_end_date
            .expect("Every period but the last must be closed");
        assert!(end <= pair[1].period_start_date, "Periods must not overlap");
    }

    assert_eq!(room_periods[0].duration_days, Some(4));
    assert_eq!(room_periods[1].duration_days, Some(7));
    assert_eq!(room_periods[2].duration_days, None);

    // Mean of the closed durations: (4 + 7) / 2.
    assert!((room.average_availability_duration.unwrap() - 5.5).abs() < 1e-9);
    assert_eq!(room.date_returned, Some(ts(20)));
}

#[test]
fn uncertain_status_is_stored_as_taken_but_tallied_apart() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/4");

    let aid = new_analysis(&db, pid, ts(0));
    let summary = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 3 - £450 pcm (ask agent)"]),
        aid,
        false,
        ts(0),
    )
    .unwrap();

    assert_eq!(summary.uncertain_rooms, 1);
    assert_eq!(summary.taken_rooms, 0);

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot[0].current_status, RoomStatus::Taken);
    assert!(snapshot[0].current_period_id.is_none());
}

#[test]
fn unparseable_description_is_skipped_not_fatal() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/5");

    let aid = new_analysis(&db, pid, ts(0));
    let summary = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["   ", "Room 1 - £500 pcm (Double)"]),
        aid,
        false,
        ts(0),
    )
    .unwrap();

    assert_eq!(summary.skipped_descriptions, 1);
    assert_eq!(summary.rooms_seen, 1);
    assert_eq!(summary.new_rooms, 1);
    assert_eq!(all_rooms(&db, pid).len(), 1);
}

#[test]
fn duplicate_description_in_one_scrape_updates_one_room() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/6");

    let aid = new_analysis(&db, pid, ts(0));
    let summary = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £500 pcm (Double)",
            "Room 1 - £500 pcm (Double)",
        ]),
        aid,
        false,
        ts(0),
    )
    .unwrap();

    // The second line must see the room the first one just created.
    assert_eq!(summary.new_rooms, 1);
    assert_eq!(summary.updated_rooms, 1);

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].times_seen, 2);
}

#[test]
fn weekly_price_is_tracked_as_monthly() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/7");

    let aid = new_analysis(&db, pid, ts(0));
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £100 pw (Double)"]),
        aid,
        false,
        ts(0),
    )
    .unwrap();

    let snapshot = all_rooms(&db, pid);
    assert!((snapshot[0].current_price.unwrap() - 433.0).abs() < 0.01);
    assert_eq!(snapshot[0].price_text.as_deref(), Some("£433 pcm"));
}

#[test]
fn close_period_clamps_negative_duration_to_zero() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/8");

    let aid = new_analysis(&db, pid, ts(5));
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £500 pcm (Double)"]),
        aid,
        false,
        ts(5),
    )
    .unwrap();
    let room_id = all_rooms(&db, pid)[0].id;

    // A clock that went backwards must not produce a negative duration.
    let closed = db
        .with_conn(|conn| periods::close_period(conn, room_id, ts(3), aid))
        .unwrap();
    assert!(closed.is_some());

    let room_periods = db
        .with_conn(|conn| periods::get_periods(conn, room_id, 10))
        .unwrap();
    assert_eq!(room_periods[0].duration_days, Some(0));

    // Closing again is a no-op.
    let again = db
        .with_conn(|conn| periods::close_period(conn, room_id, ts(6), aid))
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn reopening_closes_a_stale_open_period_first() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/9");

    let aid = new_analysis(&db, pid, ts(0));
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £500 pcm (Double)"]),
        aid,
        false,
        ts(0),
    )
    .unwrap();
    let room_id = all_rooms(&db, pid)[0].id;

    let parsed = parse_room_description("Room 1 - £500 pcm (Double)").unwrap();
    db.with_conn(|conn| {
        periods::open_period(conn, room_id, ts(2), "Room 1 - £500 pcm (Double)", &parsed, aid)
    })
    .unwrap();

    let room_periods = db
        .with_conn(|conn| periods::get_periods(conn, room_id, 10))
        .unwrap();
    assert_eq!(room_periods.len(), 2);
    let open_count = room_periods.iter().filter(|p| p.is_current_period).count();
    assert_eq!(open_count, 1);
}

#[test]
fn trend_snapshot_rolls_up_window_activity() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/10");

    // Snapshot windows are anchored to the wall clock, so the scrapes are too.
    let now = Utc::now().naive_utc();
    let t0 = now - Duration::days(20);
    let t1 = now - Duration::days(18);
    let t2 = now - Duration::days(15);

    let a1 = new_analysis(&db, pid, t0);
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £500 pcm (Double)"]),
        a1,
        false,
        t0,
    )
    .unwrap();

    let a2 = new_analysis(&db, pid, t1);
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £520 pcm (Double)"]),
        a2,
        false,
        t1,
    )
    .unwrap();

    let a3 = new_analysis(&db, pid, t2);
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&["Room 1 - £520 pcm (NOW LET)"]),
        a3,
        false,
        t2,
    )
    .unwrap();

    let snapshot =
        trends::calculate_and_store_trends(&db, pid, trends::PeriodType::Monthly).unwrap();

    assert_eq!(snapshot.period_type, "monthly");
    assert_eq!(snapshot.availability_period_count, 1);
    // One closed period in a 30-day window is one turnover per month.
    assert!((snapshot.turnover_rate - 1.0).abs() < 1e-9);
    assert_eq!(snapshot.avg_availability_duration, Some(5.0));
    assert_eq!(snapshot.price_trend_direction, "increasing");
    assert!((snapshot.price_change_percentage.unwrap() - 4.0).abs() < 1e-9);
    assert_eq!(snapshot.confidence, 0.5);
    assert_eq!(snapshot.income_stability, 0.0);

    let stored = db
        .with_conn(|conn| trends::get_latest_trend(conn, pid, trends::PeriodType::Monthly))
        .unwrap();
    assert_eq!(stored.unwrap().id, snapshot.id);
}

#[test]
fn room_conservation_across_a_diff() {
    let db = make_db();
    let pid = seed_property(&db, "https://www.spareroom.co.uk/flatshare/11");

    let a1 = new_analysis(&db, pid, ts(0));
    rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £500 pcm (Double)",
            "Room 2 - £550 pcm (Single)",
            "Room 3 - £600 pcm (En-suite)",
        ]),
        a1,
        false,
        ts(0),
    )
    .unwrap();

    let a2 = new_analysis(&db, pid, ts(1));
    let s2 = rooms::analyze_property_at(
        &db,
        pid,
        &descriptions(&[
            "Room 1 - £500 pcm (Double)",
            "Room 4 - £700 pcm (Double)",
        ]),
        a2,
        false,
        ts(1),
    )
    .unwrap();

    // Every old room is matched or disappeared, every description is matched
    // or a new room. Nothing is lost, nothing is double-counted.
    assert_eq!(s2.rooms_seen, 2);
    assert_eq!(s2.updated_rooms, 1);
    assert_eq!(s2.new_rooms, 1);
    assert_eq!(s2.disappeared_rooms, 2);

    let snapshot = all_rooms(&db, pid);
    assert_eq!(snapshot.len(), 4);
    assert_eq!(
        snapshot.iter().filter(|r| r.is_currently_listed).count(),
        2
    );
    assert_eq!(
        snapshot
            .iter()
            .filter(|r| r.current_status == RoomStatus::Offline)
            .count(),
        2
    );
}
