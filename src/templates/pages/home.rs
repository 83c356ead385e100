use crate::db::analyses::AnalysisRun;
use crate::db::properties::Property;
use crate::templates::desktop_layout;
use maud::{html, Markup};

pub fn home_page(properties: &[Property], recent_analyses: &[AnalysisRun]) -> Markup {
    desktop_layout(
        "Tracked Properties",
        html! {
            main class="container" {
                h1 { "Tracked Properties" }

                form method="get" action="/track" {
                    label for="url" { "Track a listing URL" }
                    input type="url" id="url" name="url" required placeholder="https://www.spareroom.co.uk/...";
                    button type="submit" { "Track" }
                }

                @if properties.is_empty() {
                    p { "No properties tracked yet." }
                } @else {
                    table style="width: 100%; border-collapse: collapse; margin-top: 1rem;" {
                        thead {
                            tr {
                                th style="text-align: left; padding: 8px;" { "Property" }
                                th style="text-align: left; padding: 8px;" { "Location" }
                                th style="text-align: right; padding: 8px;" { "Est. monthly income" }
                                th style="text-align: left; padding: 8px;" { "Last seen" }
                                th {}
                            }
                        }
                        tbody {
                            @for prop in properties {
                                tr {
                                    td style="padding: 8px;" {
                                        a href=(format!("/property?id={}", prop.id)) {
                                            (prop.name.as_deref().unwrap_or(&prop.url))
                                        }
                                    }
                                    td style="padding: 8px;" { (prop.location.as_deref().unwrap_or("—")) }
                                    td style="padding: 8px; text-align: right;" {
                                        @match prop.estimated_monthly_income {
                                            Some(income) => { (format!("£{income:.0}")) }
                                            None => { "—" }
                                        }
                                    }
                                    td style="padding: 8px;" { (prop.last_seen_at.format("%Y-%m-%d %H:%M")) }
                                    td style="padding: 8px;" {
                                        a href=(format!("/analyze?id={}", prop.id)) { "Re-scrape" }
                                    }
                                }
                            }
                        }
                    }
                }

                h2 { "Recent analyses" }
                @if recent_analyses.is_empty() {
                    p { "No analyses yet." }
                } @else {
                    table style="width: 100%; border-collapse: collapse;" {
                        thead {
                            tr {
                                th style="text-align: left; padding: 8px;" { "Started" }
                                th style="text-align: left; padding: 8px;" { "Property" }
                                th style="text-align: right; padding: 8px;" { "Rooms" }
                                th style="text-align: left; padding: 8px;" { "Outcome" }
                            }
                        }
                        tbody {
                            @for run in recent_analyses {
                                tr {
                                    td style="padding: 8px;" { (run.started_at.format("%Y-%m-%d %H:%M")) }
                                    td style="padding: 8px;" {
                                        a href=(format!("/property?id={}", run.property_id)) { "#" (run.property_id) }
                                    }
                                    td style="padding: 8px; text-align: right;" {
                                        @match run.rooms_seen {
                                            Some(n) => { (n) }
                                            None => { "—" }
                                        }
                                    }
                                    td style="padding: 8px;" {
                                        @if run.success { "✅ ok" }
                                        @else {
                                            "❌ " (run.error_message.as_deref().unwrap_or("in progress"))
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}
