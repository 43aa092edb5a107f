//! Upcoming organization events and per-section relevance ranking.

use std::collections::HashSet;

use chrono::Utc;
use letterpress_shared::Event;
use letterpress_storage::Storage;
use tracing::warn;

/// Events promoted in any one section prompt.
pub const EVENTS_PER_SECTION: usize = 3;

/// Load upcoming events. Failure is non-fatal and yields an empty list.
pub async fn load_events(storage: &Storage, organization_id: &str, limit: u32) -> Vec<Event> {
    match storage.upcoming_events(organization_id, Utc::now(), limit).await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "could not load events, continuing without them");
            Vec::new()
        }
    }
}

/// Up to `cap` events ordered by keyword overlap with `section_title`, then by
/// start time.
pub fn relevant_events<'a>(events: &'a [Event], section_title: &str, cap: usize) -> Vec<&'a Event> {
    let wanted = keywords(section_title);
    let mut scored: Vec<(usize, &Event)> = events
        .iter()
        .map(|event| {
            let text = format!("{} {}", event.title, event.description);
            let overlap = keywords(&text).intersection(&wanted).count();
            (overlap, event)
        })
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score.cmp(a_score).then_with(|| a.starts_at.cmp(&b.starts_at))
    });
    scored.into_iter().take(cap).map(|(_, e)| e).collect()
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .collect()
}
