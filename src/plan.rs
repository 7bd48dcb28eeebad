//! Trip-itinerary pipeline.
//!
//! search → assemble → generate → validate. The query is embedded and
//! matched against the place index; the retrieved candidates ground a
//! JSON-mode generation that must come back in the declared itinerary
//! shape. A payload that parses but does not fit the shape is a
//! `SchemaViolation`, surfaced as-is — never coerced into place.

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::app::AppContext;
use crate::error::{CoreError, CoreResult};
use crate::models::{Itinerary, PlanRequest};
use crate::prompt::itinerary_messages;

/// Run the itinerary pipeline end to end.
pub async fn plan_trip(ctx: &Arc<AppContext>, request: PlanRequest) -> CoreResult<Itinerary> {
    request.validate()?;

    let places = ctx
        .index
        .search(&request.query, ctx.config.index.top_k)
        .await?;

    let messages = itinerary_messages(&request, &places)?;
    let payload = ctx.generator.complete_json(&messages).await?;

    let itinerary: Itinerary = serde_json::from_value(payload).map_err(|e| {
        CoreError::SchemaViolation(format!("payload does not match the itinerary shape: {}", e))
    })?;
    itinerary.validate(request.days)?;

    Ok(itinerary)
}

/// CLI entry point: plan a trip and print the day-by-day schedule.
pub async fn run_plan(
    ctx: &Arc<AppContext>,
    query: &str,
    start: &str,
    days: u32,
    budget: &str,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid start date '{}': {}", start, e))?;

    let itinerary = plan_trip(
        ctx,
        PlanRequest {
            query: query.to_string(),
            start,
            days,
            budget: budget.to_string(),
        },
    )
    .await?;

    println!("{} — {} day(s)", itinerary.city, itinerary.days);
    for day in &itinerary.plan {
        println!();
        println!("Day {} ({})", day.day, day.date);
        for entry in &day.entries {
            println!("  {}  {} — {}", entry.time, entry.place_name, entry.activity);
            if let Some(notes) = &entry.notes {
                println!("         {}", notes);
            }
        }
    }
    Ok(())
}
