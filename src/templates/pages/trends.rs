use crate::db::price_history::PriceTrendSummary;
use crate::db::properties::Property;
use crate::db::trends::PropertyTrend;
use crate::templates::desktop_layout;
use maud::{html, Markup};

pub fn trends_page(
    property: &Property,
    price_trends: &PriceTrendSummary,
    snapshots: &[PropertyTrend],
) -> Markup {
    desktop_layout(
        "Price trends",
        html! {
            main class="container" {
                h1 {
                    "Price trends: "
                    a href=(format!("/property?id={}", property.id)) {
                        (property.name.as_deref().unwrap_or(&property.url))
                    }
                }
                p { "Window: last " (price_trends.window_days) " days" }

                ul {
                    li { "Total price changes: " (price_trends.total_changes) }
                    li {
                        "Average change: "
                        @match price_trends.avg_change_amount {
                            Some(a) => { (format!("£{a:+.0}")) }
                            None => { "—" }
                        }
                        @if let Some(pct) = price_trends.avg_change_percentage {
                            " (" (format!("{pct:+.1}%")) ")"
                        }
                    }
                    li { "Direction: " (price_trends.trend_direction.as_str()) }
                    li { "Volatility: " (format!("{:.2}", price_trends.volatility)) }
                }

                @for room in &price_trends.rooms {
                    h3 { (room.room_label) " (latest £" (format!("{:.0}", room.latest_price)) ")" }
                    ul {
                        @for change in &room.changes {
                            li {
                                (change.effective_date.format("%Y-%m-%d"))
                                ": "
                                @match change.previous_price {
                                    Some(prev) => { (format!("£{prev:.0}")) }
                                    None => { "?" }
                                }
                                " to £" (format!("{:.0}", change.new_price))
                                @if let Some(pct) = change.change_percentage {
                                    " (" (format!("{pct:+.1}%")) ")"
                                }
                            }
                        }
                    }
                }

                h2 { "Stored snapshots" }
                @if snapshots.is_empty() {
                    p { "No trend snapshots yet." }
                } @else {
                    table style="width: 100%; border-collapse: collapse;" {
                        thead {
                            tr {
                                th style="text-align: left; padding: 8px;" { "Window" }
                                th style="text-align: left; padding: 8px;" { "From" }
                                th style="text-align: right; padding: 8px;" { "Avg days" }
                                th style="text-align: right; padding: 8px;" { "Turnover" }
                                th style="text-align: left; padding: 8px;" { "Direction" }
                                th style="text-align: right; padding: 8px;" { "Stability" }
                                th style="text-align: right; padding: 8px;" { "Confidence" }
                            }
                        }
                        tbody {
                            @for snap in snapshots {
                                tr {
                                    td style="padding: 8px;" { (snap.period_type) }
                                    td style="padding: 8px;" { (snap.period_start.format("%Y-%m-%d")) }
                                    td style="padding: 8px; text-align: right;" {
                                        @match snap.avg_availability_duration {
                                            Some(d) => { (format!("{d:.1}")) }
                                            None => { "—" }
                                        }
                                    }
                                    td style="padding: 8px; text-align: right;" { (format!("{:.2}", snap.turnover_rate)) }
                                    td style="padding: 8px;" { (snap.price_trend_direction) }
                                    td style="padding: 8px; text-align: right;" { (format!("{:.2}", snap.income_stability)) }
                                    td style="padding: 8px; text-align: right;" { (format!("{:.1}", snap.confidence)) }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}
