//! Sidebar filtering.
//!
//! `FilterEngine::filter` is pure: it never mutates its input and applying it
//! twice with the same query yields the same list.

use super::model::Session;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Calendar-day range, interpreted in UTC.
///
/// - only `start`: on or after the start day
/// - only `end`: strictly before the end day
/// - both: every instant of the days from `start` through `end`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn contains(&self, timestamp_ms: i64) -> bool {
        match (self.start, self.end) {
            (None, None) => true,
            (Some(start), None) => timestamp_ms >= start_of_day(start),
            (None, Some(end)) => timestamp_ms < start_of_day(end),
            (Some(start), Some(end)) => {
                let upper = end.succ_opt().map(start_of_day).unwrap_or(i64::MAX);
                timestamp_ms >= start_of_day(start) && timestamp_ms < upper
            }
        }
    }
}

fn start_of_day(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Sidebar query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionQuery {
    /// Case-insensitive substring matched against title, description, url and tags.
    pub search_text: String,
    pub tag_selection: Vec<String>,
    /// Inverts the tag selection to "carries none of the selected tags".
    pub reverse_mode: bool,
    /// Admits sessions without tags regardless of the tag selection.
    pub no_tags_only: bool,
    pub date_range: DateRange,
}

/// Derives the visible session list from the store contents.
pub struct FilterEngine;

impl FilterEngine {
    /// Returns matching favorites followed by matching non-favorites.
    ///
    /// Relative order inside each partition is preserved; sorting is left to
    /// the caller (see [`FilterEngine::sort_by_recent`]).
    pub fn filter(sessions: &[Session], query: &SessionQuery) -> Vec<Session> {
        let needle = query.search_text.trim().to_lowercase();
        let (favorites, others): (Vec<&Session>, Vec<&Session>) =
            sessions.iter().partition(|s| s.is_favorite);

        favorites
            .into_iter()
            .chain(others)
            .filter(|s| matches_search(s, &needle))
            .filter(|s| matches_tags(s, query))
            .filter(|s| query.date_range.contains(s.effective_timestamp()))
            .cloned()
            .collect()
    }

    /// Sorts by `updated_at` descending, keeping favorites first.
    pub fn sort_by_recent(sessions: &mut [Session]) {
        sessions.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| b.effective_timestamp().cmp(&a.effective_timestamp()))
        });
    }
}

fn matches_search(session: &Session, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {} {}",
        session.title,
        session.description,
        session.url,
        session.tags.join(" ")
    )
    .to_lowercase();
    haystack.contains(needle)
}

fn matches_tags(session: &Session, query: &SessionQuery) -> bool {
    let selection: Vec<&str> = query
        .tag_selection
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if !query.no_tags_only && selection.is_empty() {
        return true;
    }
    if query.no_tags_only && !session.has_tags() {
        return true;
    }
    if selection.is_empty() {
        return false;
    }

    let has_selected = session
        .tags
        .iter()
        .any(|tag| selection.contains(&tag.trim()));
    if query.reverse_mode {
        !has_selected
    } else {
        has_selected
    }
}
