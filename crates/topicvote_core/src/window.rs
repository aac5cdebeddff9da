//! Date-window classification for topic listings.
//!
//! # Responsibility
//! - Decide whether a topic is active, recently finished or coming soon
//!   relative to a reference day.
//! - Apply a listing filter to an already-loaded topic set.
//!
//! # Invariants
//! - Comparisons use calendar days only; time of day is discarded.
//! - Pure: the reference day is always passed in, never read from the clock.
//! - Windows may overlap; a topic can match several or none.

use crate::model::topic::Topic;
use chrono::{Days, NaiveDate};
use std::cmp::Reverse;

/// Look-back/look-ahead span for the finished and upcoming windows.
pub const WINDOW_SPAN_DAYS: u64 = 7;

/// One named listing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicWindow {
    /// `start <= today <= end`.
    Active,
    /// `today - 7d <= end <= today`.
    RecentlyFinished,
    /// `today <= start <= today + 7d`.
    ComingSoon,
}

impl TopicWindow {
    pub const ALL: [TopicWindow; 3] = [Self::Active, Self::RecentlyFinished, Self::ComingSoon];

    /// Parses a filter key; unknown keys yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "active" => Some(Self::Active),
            "recently-finished" => Some(Self::RecentlyFinished),
            "coming-soon" => Some(Self::ComingSoon),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::RecentlyFinished => "recently-finished",
            Self::ComingSoon => "coming-soon",
        }
    }
}

/// Listing filter requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicFilter {
    /// Every topic, newest `start_date` first.
    All,
    /// Topics matching one window.
    Window(TopicWindow),
}

impl TopicFilter {
    /// Maps an optional filter key; absent or unrecognized keys become `All`.
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(TopicWindow::parse)
            .map_or(Self::All, Self::Window)
    }
}

/// Returns whether the `[start, end]` day range falls in `window` for `today`.
pub fn window_matches(
    window: TopicWindow,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> bool {
    match window {
        TopicWindow::Active => start <= today && today <= end,
        TopicWindow::RecentlyFinished => end <= today && end >= days_before(today),
        TopicWindow::ComingSoon => start >= today && start <= days_after(today),
    }
}

/// Returns every window `topic` belongs to on `today`.
pub fn classify(topic: &Topic, today: NaiveDate) -> Vec<TopicWindow> {
    let (start, end) = (topic.start_day(), topic.end_day());
    TopicWindow::ALL
        .into_iter()
        .filter(|window| window_matches(*window, start, end, today))
        .collect()
}

/// Applies `filter` to `topics`.
///
/// Window filters keep the input order; `All` sorts by `start_date` descending.
pub fn apply_filter(
    mut topics: Vec<Topic>,
    filter: TopicFilter,
    today: NaiveDate,
) -> Vec<Topic> {
    match filter {
        TopicFilter::All => {
            topics.sort_by_key(|topic| Reverse(topic.start_date));
            topics
        }
        TopicFilter::Window(window) => topics
            .into_iter()
            .filter(|topic| window_matches(window, topic.start_day(), topic.end_day(), today))
            .collect(),
    }
}

fn days_before(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(WINDOW_SPAN_DAYS))
        .unwrap_or(NaiveDate::MIN)
}

fn days_after(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(WINDOW_SPAN_DAYS))
        .unwrap_or(NaiveDate::MAX)
}
