// src/domain/room.rs

use crate::domain::parser::ParsedStatus;
use chrono::NaiveDateTime;

/// Persisted room status. Note there is no `Uncertain` here: an uncertain
/// parse is stored as `Taken` (conservative: unknown means not rentable) and
/// only the transient per-scrape summary keeps the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Available,
    Taken,
    Offline,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Taken => "taken",
            RoomStatus::Offline => "offline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(RoomStatus::Available),
            "taken" => Some(RoomStatus::Taken),
            "offline" => Some(RoomStatus::Offline),
            _ => None,
        }
    }

    pub fn from_parsed(status: ParsedStatus) -> Self {
        match status {
            ParsedStatus::Available => RoomStatus::Available,
            ParsedStatus::Taken | ParsedStatus::Uncertain => RoomStatus::Taken,
        }
    }
}

/// The kinds of transition the lifecycle engine records in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Discovered,
    StatusChange,
    PriceChange,
    Disappeared,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Discovered => "discovered",
            ChangeType::StatusChange => "status_change",
            ChangeType::PriceChange => "price_change",
            ChangeType::Disappeared => "disappeared",
        }
    }
}

/// Represents the current state of a room as stored in our `rooms` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRoom {
    pub id: i64,
    pub property_id: i64,
    /// Latest raw description text for this room; the stable key is derived
    /// from this on every match.
    pub raw_identifier: String,
    pub room_label: String,
    pub price_text: Option<String>,
    pub room_type: Option<String>,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub current_status: RoomStatus,
    pub is_currently_listed: bool,
    pub first_seen_date: NaiveDateTime,
    pub last_seen_date: NaiveDateTime,
    pub times_seen: i64,
    pub times_changed: i64,
    pub current_period_id: Option<i64>,
    pub date_gone: Option<NaiveDateTime>,
    pub date_returned: Option<NaiveDateTime>,
    pub total_availability_periods: i64,
    pub average_availability_duration: Option<f64>,
}

/// Transient per-scrape tally returned by one lifecycle pass. This is where
/// the uncertain count lives; it is never written to a room row.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub rooms_seen: usize,
    pub new_rooms: usize,
    pub updated_rooms: usize,
    pub disappeared_rooms: usize,
    pub available_rooms: usize,
    pub taken_rooms: usize,
    pub uncertain_rooms: usize,
    pub skipped_descriptions: usize,
    pub expired_listing: bool,
}
