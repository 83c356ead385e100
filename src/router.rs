use crate::db::{analyses, changes, periods, price_history, properties, rooms, trends, Database};
use crate::errors::ServerError;
use crate::responses::{html_response, ResultResp};
use crate::scraper;
use crate::templates;
use astra::Request;
use chrono::Utc;
use maud::html;

pub fn handle(req: Request, db: &Database) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path();
    let query = parse_query(&req);

    match (method, path) {
        ("GET", "/") => {
            let props = properties::list_properties(db)?;
            let recent = analyses::get_recent_analyses(db, 50)?;
            html_response(templates::pages::home_page(&props, &recent))
        }

        ("GET", "/property") => {
            let id = required_id(&query)?;
            let property = db
                .with_conn(|conn| properties::get_property(conn, id))?
                .ok_or(ServerError::NotFound)?;

            let room_histories = rooms::get_property_rooms_with_history(db, id, 20)?;
            let summary = periods::get_property_period_summary(db, id)?;
            let recent_changes = changes::get_recent_changes_for_property(db, id, 25)?;

            html_response(templates::pages::property_page(
                &property,
                &room_histories,
                &summary,
                &recent_changes,
            ))
        }

        ("GET", "/property/trends") => {
            let id = required_id(&query)?;
            let days: i64 = query
                .get("days")
                .and_then(|d| d.parse().ok())
                .unwrap_or(90);

            let property = db
                .with_conn(|conn| properties::get_property(conn, id))?
                .ok_or(ServerError::NotFound)?;
            let price_trends = price_history::get_property_price_trends(db, id, days)?;
            let snapshots = trends::get_trends_for_property(db, id, 20)?;

            html_response(templates::pages::trends_page(
                &property,
                &price_trends,
                &snapshots,
            ))
        }

        ("GET", "/trends/run") => {
            let id = required_id(&query)?;
            let period_type = query
                .get("period")
                .and_then(|p| trends::PeriodType::from_str(p))
                .ok_or_else(|| {
                    ServerError::BadRequest("period must be weekly, monthly or quarterly".into())
                })?;

            let snapshot = trends::calculate_and_store_trends(db, id, period_type)?;
            message_page(
                "Trend snapshot stored",
                &format!(
                    "{} snapshot for property {}: turnover {:.2}, direction {}, confidence {:.1}",
                    snapshot.period_type,
                    id,
                    snapshot.turnover_rate,
                    snapshot.price_trend_direction,
                    snapshot.confidence
                ),
                Some(id),
            )
        }

        ("GET", "/analyze") => {
            let id = required_id(&query)?;
            let property = db
                .with_conn(|conn| properties::get_property(conn, id))?
                .ok_or(ServerError::NotFound)?;

            scraper::run_property_analysis(db, id, property.url.clone());
            message_page(
                "Analysis started",
                &format!("Re-scraping {} in the background.", property.url),
                Some(id),
            )
        }

        ("GET", "/track") => {
            let url = query
                .get("url")
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ServerError::BadRequest("url parameter required".into()))?;

            // Sanity-check before storing anything.
            url::Url::parse(url)
                .map_err(|e| ServerError::BadRequest(format!("invalid url: {e}")))?;

            let now = Utc::now().naive_utc();
            let id =
                db.with_conn(|conn| properties::upsert_property(conn, url, None, None, now))?;
            scraper::run_property_analysis(db, id, url.clone());

            message_page(
                "Tracking started",
                &format!("Now tracking {url}; first analysis is running."),
                Some(id),
            )
        }

        ("GET", "/recheck") => {
            scraper::run_bulk_recheck(db);
            message_page(
                "Bulk re-check started",
                "All tracked properties will be re-scraped in batches.",
                None,
            )
        }

        _ => Err(ServerError::NotFound),
    }
}

fn required_id(query: &std::collections::HashMap<String, String>) -> Result<i64, ServerError> {
    query
        .get("id")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ServerError::BadRequest("id parameter required".into()))
}

fn message_page(title: &str, body: &str, property_id: Option<i64>) -> ResultResp {
    html_response(templates::desktop_layout(
        title,
        html! {
            main class="container" {
                h1 { (title) }
                p { (body) }
                @if let Some(id) = property_id {
                    p { a href=(format!("/property?id={id}")) { "Back to property" } }
                }
                p { a href="/" { "Back to home" } }
            }
        },
    ))
}

fn parse_query(req: &astra::Request) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();

    if let Some(q) = req.uri().query() {
        for pair in q.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                map.insert(k.to_string(), percent_decode(v));
            }
        }
    }

    map
}

/// Minimal percent-decoding for query values (enough for URLs in params).
fn percent_decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 3 <= bytes.len() => {
                let hex = &value[i + 1..i + 3];
                if let Ok(b) = u8::from_str_radix(hex, 16) {
                    out.push(b as char);
                    i += 3;
                } else {
                    out.push('%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(' ');
                i += 1;
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}
