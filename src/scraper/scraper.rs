// scraper.rs
use crate::db::connection::Database;
use crate::db::{analyses, properties, rooms};
use crate::scraper::models::{BulkReport, ScrapedListing};
use crate::scraper::ScraperError;
use chrono::Utc;
use rand::Rng;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Phrases on a listing page meaning the whole listing has stopped taking
/// applications.
const EXPIRED_PHRASES: &[&str] = &[
    "no longer accepting applications",
    "this listing has expired",
    "advert has been removed",
];

/// Default number of properties re-checked concurrently in a bulk run; keeps
/// outbound load on the listing site within informal rate limits.
const DEFAULT_BATCH_SIZE: usize = 5;

pub struct SpareRoomScraper {
    client: Client,
}

impl SpareRoomScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetches one listing page and reduces it to the engine's input:
    /// metadata, room description lines, expired flag.
    pub fn fetch_listing(&self, url: &str) -> Result<ScrapedListing, ScraperError> {
        let html = self.fetch_html(url)?;
        parse_listing_page(url, &html)
    }

    fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        const MAX_ATTEMPTS: u64 = 3;
        const MAX_BACKOFF_SECS: u64 = 8;
        const JITTER_MAX_SECS: u64 = 2;

        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch_html(url) {
                Ok(html) => return Ok(html),
                Err(e) => {
                    eprintln!("⚠️ Fetch attempt {attempt} failed for {url}: {e}");
                    last_err = Some(e);

                    let base = std::cmp::min(2 * attempt, MAX_BACKOFF_SECS);
                    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                    std::thread::sleep(Duration::from_secs(base + jitter));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScraperError::Network("retry loop failed".into())))
    }

    fn try_fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(ScraperError::Blocked(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ScraperError::Network(format!("HTTP {status}")));
        }

        Ok(text)
    }
}

/// Extracts the room description lines and listing metadata from a listing
/// page. Selector details live only here; the tracking engine gets strings.
pub fn parse_listing_page(url: &str, html: &str) -> Result<ScrapedListing, ScraperError> {
    let document = Html::parse_document(html);

    let title_sel = Selector::parse("h1").map_err(|e| ScraperError::HtmlParse(e.to_string()))?;
    let title = document
        .select(&title_sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()));

    let location_sel = Selector::parse(".listing-location, .property-location")
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;
    let location = document
        .select(&location_sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()));

    let rooms_sel = Selector::parse("ul.room-list li, .feature--price-room .room-list li")
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;
    let room_descriptions: Vec<String> = document
        .select(&rooms_sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect();

    let page_text = collapse_whitespace(&document.root_element().text().collect::<String>())
        .to_lowercase();
    let is_expired = EXPIRED_PHRASES.iter().any(|p| page_text.contains(p));

    if room_descriptions.is_empty() && !is_expired {
        return Err(ScraperError::MissingRoomList);
    }

    Ok(ScrapedListing {
        url: url.to_string(),
        title,
        location,
        room_descriptions,
        is_expired,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fetches and analyzes one property end to end: records an analysis run,
/// fetches the page, and applies the lifecycle pass in one transaction.
/// Called from worker threads; all failures are reported via the analysis row.
pub fn analyze_one_property(db: &Database, property_id: i64, url: &str) -> Result<(), String> {
    let started = Utc::now().naive_utc();
    let analysis_id = db
        .with_conn(|conn| analyses::start_analysis(conn, property_id, started))
        .map_err(|e| e.to_string())?;

    let result = SpareRoomScraper::new()
        .and_then(|scraper| scraper.fetch_listing(url))
        .map_err(|e| e.to_string())
        .and_then(|listing| {
            if listing.is_expired {
                eprintln!("📭 Listing expired for property {property_id}");
            }
            db.with_conn(|conn| {
                properties::upsert_property(
                    conn,
                    url,
                    listing.title.as_deref(),
                    listing.location.as_deref(),
                    started,
                )
            })
            .map_err(|e| e.to_string())?;

            rooms::analyze_property(
                db,
                property_id,
                &listing.room_descriptions,
                analysis_id,
                listing.is_expired,
            )
            .map_err(|e| e.to_string())
        });

    let finished = Utc::now().naive_utc();
    match result {
        Ok(summary) => {
            let _ = db.with_conn(|conn| {
                analyses::end_analysis(conn, analysis_id, finished, summary.rooms_seen, true, None)
            });
            eprintln!(
                "✅ Property {property_id}: {} rooms ({} new, {} disappeared, {} uncertain)",
                summary.rooms_seen,
                summary.new_rooms,
                summary.disappeared_rooms,
                summary.uncertain_rooms
            );
            Ok(())
        }
        Err(e) => {
            let _ = db.with_conn(|conn| {
                analyses::end_analysis(conn, analysis_id, finished, 0, false, Some(e.clone()))
            });
            eprintln!("❌ Property {property_id} analysis failed: {e}");
            Err(e)
        }
    }
}

/// Fire-and-forget single-property analysis from the web UI.
pub fn run_property_analysis(db: &Database, property_id: i64, url: String) {
    let db = db.clone(); // cheap clone (path only)
    std::thread::spawn(move || {
        eprintln!("🧵 Analysis thread started for property {property_id}");
        let _ = analyze_one_property(&db, property_id, &url);
    });
}

/// Re-checks every tracked property in fixed-size batches of worker threads.
/// Failures are isolated per property: one fetch failing never aborts its
/// siblings, and the tally reports each outcome.
pub fn bulk_recheck_blocking(db: &Database, batch_size: usize) -> Result<BulkReport, String> {
    let targets = properties::get_tracked_property_urls(db).map_err(|e| e.to_string())?;
    let mut report = BulkReport::default();

    for batch in targets.chunks(batch_size.max(1)) {
        let mut handles = Vec::with_capacity(batch.len());

        for (property_id, url) in batch.iter().cloned() {
            let db = db.clone();
            handles.push(std::thread::spawn(move || {
                (property_id, analyze_one_property(&db, property_id, &url))
            }));
        }

        for handle in handles {
            match handle.join() {
                Ok((property_id, Ok(()))) => {
                    report.attempted += 1;
                    report.succeeded += 1;
                    let _ = property_id;
                }
                Ok((property_id, Err(e))) => {
                    report.attempted += 1;
                    report.failures.push((property_id, e));
                }
                Err(_) => {
                    report.attempted += 1;
                    report
                        .failures
                        .push((-1, "worker thread panicked".to_string()));
                }
            }
        }
    }

    eprintln!(
        "✅ Bulk re-check complete: {}/{} succeeded",
        report.succeeded, report.attempted
    );
    Ok(report)
}

/// Kicks off a bulk re-check in the background. Batch size comes from the
/// RECHECK_BATCH_SIZE env var, default 5.
pub fn run_bulk_recheck(db: &Database) {
    let batch_size = std::env::var("RECHECK_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_BATCH_SIZE);

    let db = db.clone();
    std::thread::spawn(move || {
        eprintln!("🧵 Bulk re-check thread started (batch size {batch_size})");
        if let Err(e) = bulk_recheck_blocking(&db, batch_size) {
            eprintln!("❌ Bulk re-check failed: {e}");
        }
    });
}
