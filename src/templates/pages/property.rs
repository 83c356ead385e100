use crate::db::changes::RoomChange;
use crate::db::periods::PropertyPeriodSummary;
use crate::db::properties::Property;
use crate::db::rooms::RoomWithHistory;
use crate::templates::desktop_layout;
use maud::{html, Markup};

pub fn property_page(
    property: &Property,
    rooms: &[RoomWithHistory],
    summary: &PropertyPeriodSummary,
    changes: &[RoomChange],
) -> Markup {
    desktop_layout(
        property.name.as_deref().unwrap_or("Property"),
        html! {
            main class="container" {
                h1 { (property.name.as_deref().unwrap_or(&property.url)) }
                p {
                    a href=(property.url) { "Listing" }
                    " · "
                    (property.location.as_deref().unwrap_or(""))
                }
                p {
                    "Estimated income: "
                    @match (property.estimated_monthly_income, property.estimated_annual_income) {
                        (Some(m), Some(a)) => { (format!("£{m:.0} pcm / £{a:.0} per year")) }
                        _ => { "unknown" }
                    }
                }
                p {
                    (summary.current_available_rooms) " room(s) currently available"
                    @if let Some(gone) = summary.property_date_gone {
                        "; fully let since " (gone.format("%Y-%m-%d"))
                    }
                }
                p {
                    a href=(format!("/property/trends?id={}&days=90", property.id)) { "Price trends" }
                    " · "
                    a href=(format!("/trends/run?id={}&period=monthly", property.id)) { "Snapshot monthly trend" }
                    " · "
                    a href=(format!("/analyze?id={}", property.id)) { "Re-scrape now" }
                }

                h2 { "Rooms" }
                table style="width: 100%; border-collapse: collapse;" {
                    thead {
                        tr {
                            th style="text-align: left; padding: 8px;" { "Room" }
                            th style="text-align: left; padding: 8px;" { "Status" }
                            th style="text-align: right; padding: 8px;" { "Price" }
                            th style="text-align: left; padding: 8px;" { "Type" }
                            th style="text-align: right; padding: 8px;" { "Seen" }
                            th style="text-align: right; padding: 8px;" { "Periods" }
                            th style="text-align: right; padding: 8px;" { "Avg days" }
                            th style="text-align: left; padding: 8px;" { "Listed?" }
                        }
                    }
                    tbody {
                        @for entry in rooms {
                            tr {
                                td style="padding: 8px;" { (entry.room.room_label) }
                                td style="padding: 8px;" { (entry.room.current_status.as_str()) }
                                td style="padding: 8px; text-align: right;" {
                                    @match entry.room.current_price {
                                        Some(p) => { (format!("£{p:.0}")) }
                                        None => { "—" }
                                    }
                                }
                                td style="padding: 8px;" { (entry.room.room_type.as_deref().unwrap_or("—")) }
                                td style="padding: 8px; text-align: right;" { (entry.room.times_seen) }
                                td style="padding: 8px; text-align: right;" { (entry.room.total_availability_periods) }
                                td style="padding: 8px; text-align: right;" {
                                    @match entry.room.average_availability_duration {
                                        Some(d) => { (format!("{d:.1}")) }
                                        None => { "—" }
                                    }
                                }
                                td style="padding: 8px;" {
                                    @if entry.room.is_currently_listed { "yes" } @else { "no" }
                                }
                            }
                            @for period in &entry.periods {
                                tr {
                                    td style="padding: 4px 8px 4px 24px; color: #6b7280;" colspan="8" {
                                        "available " (period.period_start_date.format("%Y-%m-%d"))
                                        @match (period.period_end_date, period.duration_days) {
                                            (Some(end), Some(days)) => {
                                                " to " (end.format("%Y-%m-%d")) " (" (days) " days)"
                                            }
                                            _ => { " (ongoing)" }
                                        }
                                        @if let Some(text) = &period.price_text_at_start {
                                            " at " (text)
                                        }
                                    }
                                }
                            }
                        }
                    }
                }

                h2 { "Recent changes" }
                @if changes.is_empty() {
                    p { "No changes recorded yet." }
                } @else {
                    ul {
                        @for change in changes {
                            li {
                                (change.observed_at.format("%Y-%m-%d %H:%M"))
                                " · " (change.change_type)
                                " · " (change.summary)
                            }
                        }
                    }
                }
            }
        },
    )
}
