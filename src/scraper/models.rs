use serde::Serialize;

/// What one fetch of a listing page boils down to for the tracking engine:
/// listing-level metadata plus the free-text room description lines. The
/// engine never sees HTML.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedListing {
    pub url: String,
    pub title: Option<String>,
    pub location: Option<String>,
    pub room_descriptions: Vec<String>,
    /// True when the page says the listing is no longer accepting
    /// applications. The engine then skips the per-room diff and forces
    /// available rooms to taken instead.
    pub is_expired: bool,
}

/// Outcome tally for a bulk re-check; one entry per failed property.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<(i64, String)>,
}
