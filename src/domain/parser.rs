// src/domain/parser.rs

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// UK rental convention: weekly prices normalize to monthly at 4.33 weeks/month.
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Explicit "this room is gone" vocabulary. Checked before the available
/// vocabulary so that "NOT AVAILABLE" / "UNAVAILABLE" never match "AVAILABLE".
const TAKEN_MARKERS: &[&str] = &[
    "NOW LET",
    "TAKEN",
    "RESERVED",
    "PENDING",
    "UNAVAILABLE",
    "NOT AVAILABLE",
    "OCCUPIED",
    "LET AGREED",
    "EXPIRED",
];

const AVAILABLE_MARKERS: &[&str] = &[
    "AVAILABLE NOW",
    "ROOM AVAILABLE",
    "AVAILABLE",
    "TO LET",
    "FOR RENT",
];

/// A recognizable room type implies the room is being advertised, i.e. available.
const ROOM_TYPE_TOKENS: &[&str] = &[
    "SINGLE", "DOUBLE", "ENSUITE", "MASTER", "TWIN", "STUDIO", "BEDSIT",
];

const PLACEHOLDER_VALUES: &[&str] = &["-", "--", "N/A", "TBC", "TBA"];

/// Classification of one scraped room description.
///
/// `Uncertain` is a transient, per-scrape classification only: it is never
/// persisted on a room row (storage collapses it to taken, the conservative
/// reading), but aggregate summaries must keep it distinct from confirmed
/// taken for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedStatus {
    Available,
    Taken,
    Uncertain,
}

impl ParsedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsedStatus::Available => "available",
            ParsedStatus::Taken => "taken",
            ParsedStatus::Uncertain => "uncertain",
        }
    }
}

/// One room description ("Room 1 - £500 pcm (En-suite)") broken into the
/// fields the tracking engine works with.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoom {
    pub room_label: String,
    /// Numeric price normalized to monthly (pw converted at 4.33 weeks/month).
    pub price_monthly: Option<f64>,
    /// Price text, rewritten to the monthly equivalent when a pw conversion
    /// occurred.
    pub price_text: Option<String>,
    pub room_type: Option<String>,
    pub status: ParsedStatus,
}

#[derive(Debug)]
pub struct ParseError {
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room description parse error: {}", self.reason)
    }
}

impl std::error::Error for ParseError {}

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(room|bedroom)\s*([A-Za-z0-9]+)").unwrap())
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)£\s*([0-9]+(?:\.[0-9]+)?)\s*(pw|pcm)?").unwrap())
}

fn parens_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]*)\)").unwrap())
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z]+|[0-9]+)\b").unwrap())
}

/// Parses one raw room description string into structured fields.
///
/// Parsing is deliberately forgiving: only an empty/blank description is an
/// error. Everything else degrades field by field (label "Unknown", no price,
/// status `Uncertain`) so that one odd listing row never aborts a scrape.
pub fn parse_room_description(raw: &str) -> Result<ParsedRoom, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError {
            reason: "empty description".to_string(),
        });
    }

    let (price_monthly, price_text) = extract_price(trimmed);

    Ok(ParsedRoom {
        room_label: extract_label(trimmed),
        price_monthly,
        price_text,
        room_type: extract_room_type(trimmed),
        status: classify_status(trimmed),
    })
}

fn extract_label(raw: &str) -> String {
    if let Some(caps) = label_regex().captures(raw) {
        let keyword = match caps[1].to_lowercase().as_str() {
            "bedroom" => "Bedroom",
            _ => "Room",
        };
        return format!("{} {}", keyword, &caps[2]);
    }

    // Fall back to the first bare word or number, skipping price-period noise.
    for caps in word_regex().captures_iter(raw) {
        let token = &caps[1];
        let lower = token.to_lowercase();
        if matches!(lower.as_str(), "pw" | "pcm" | "per" | "week" | "month") {
            continue;
        }
        // A number directly preceded by £ is a price, not a label.
        let start = caps.get(1).map(|m| m.start()).unwrap_or(0);
        if raw[..start].trim_end().ends_with('£') {
            continue;
        }
        return token.to_string();
    }

    "Unknown".to_string()
}

/// Extracts the price and normalizes it to monthly. Returns the monthly
/// amount plus the price text (rewritten when a pw → pcm conversion happened).
fn extract_price(raw: &str) -> (Option<f64>, Option<String>) {
    let caps = match price_regex().captures(raw) {
        Some(c) => c,
        None => return (None, None),
    };

    let amount: f64 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let suffix = caps.get(2).map(|m| m.as_str().to_lowercase());
    // A listing like "£100 - pw (Double)" carries the period away from the
    // amount; treat a stray pw token as a weekly price too.
    let is_weekly = match suffix.as_deref() {
        Some("pw") => true,
        Some("pcm") => false,
        _ => raw
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|t| t == "pw"),
    };

    if is_weekly {
        let monthly = amount * WEEKS_PER_MONTH;
        (Some(monthly), Some(format!("£{:.0} pcm", monthly)))
    } else {
        (Some(amount), Some(format!("£{:.0} pcm", amount)))
    }
}

/// The room type is the first parenthesised group that is not a status marker.
fn extract_room_type(raw: &str) -> Option<String> {
    for caps in parens_regex().captures_iter(raw) {
        let inner = caps[1].trim();
        if inner.is_empty() {
            continue;
        }
        if !is_status_marker(inner) {
            return Some(inner.to_string());
        }
    }
    None
}

fn is_status_marker(text: &str) -> bool {
    let upper = compact_upper(text);
    TAKEN_MARKERS.iter().any(|m| upper.contains(&compact_upper(m)))
        || AVAILABLE_MARKERS.iter().any(|m| upper.contains(&compact_upper(m)))
}

/// Hyphen-insensitive uppercase form, so "En-suite" matches ENSUITE.
fn compact_upper(text: &str) -> String {
    text.to_uppercase().replace('-', "")
}

/// The single canonical status classification. Nothing else in the codebase
/// re-implements these keyword lists.
pub fn classify_status(raw: &str) -> ParsedStatus {
    let trimmed = raw.trim();
    if trimmed.is_empty() || PLACEHOLDER_VALUES.iter().any(|p| p.eq_ignore_ascii_case(trimmed)) {
        return ParsedStatus::Available;
    }

    let haystack = compact_upper(trimmed);

    if TAKEN_MARKERS.iter().any(|m| haystack.contains(&compact_upper(m))) {
        return ParsedStatus::Taken;
    }

    let looks_available = AVAILABLE_MARKERS
        .iter()
        .any(|m| haystack.contains(&compact_upper(m)))
        || ROOM_TYPE_TOKENS.iter().any(|t| haystack.contains(t));

    if looks_available {
        ParsedStatus::Available
    } else {
        ParsedStatus::Uncertain
    }
}
