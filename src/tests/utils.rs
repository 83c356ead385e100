use crate::db::connection::{init_db, Database};
use crate::db::{analyses, properties};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns a fresh test database using the production schema.
pub fn make_db() -> Database {
    let path = std::env::temp_dir().join(format!(
        "roomscout_test_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().to_string());
    init_db(&db, "sql/schema.sql").expect("Failed to initialize DB");
    db
}

/// A fixed base timestamp plus a day offset, for replaying scrapes.
pub fn ts(days: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + Duration::days(days)
}

pub fn seed_property(db: &Database, url: &str) -> i64 {
    db.with_conn(|conn| properties::upsert_property(conn, url, Some("Test property"), None, ts(0)))
        .expect("Failed to seed property")
}

pub fn new_analysis(db: &Database, property_id: i64, at: NaiveDateTime) -> i64 {
    db.with_conn(|conn| analyses::start_analysis(conn, property_id, at))
        .expect("Failed to start analysis")
}

pub fn descriptions(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
