pub mod models;
mod scraper;
mod scraper_error;

pub use scraper::{
    analyze_one_property, bulk_recheck_blocking, parse_listing_page, run_bulk_recheck,
    run_property_analysis, SpareRoomScraper,
};
pub use scraper_error::ScraperError;
