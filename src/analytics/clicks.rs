use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::db::{ClickFilter, EventStore};
use crate::error::Result;
use crate::models::{ButtonCount, ClickEvent, ClickStatistics, DailyClicks, FunnelStage, QuestionKey, UserEngagement};

pub const DEFAULT_TIMELINE_DAYS: i64 = 7;
pub const STATISTICS_TOP_BUTTONS: usize = 5;

pub fn total_clicks(clicks: &[ClickEvent]) -> u64 {
    clicks.len() as u64
}

/// Per-button counts, most clicked first. Equal counts are ordered by label.
pub fn clicks_by_button(clicks: &[ClickEvent]) -> Vec<ButtonCount> {
    // Count clicks per label
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for click in clicks {
        *counts.entry(click.button.as_str()).or_insert(0) += 1;
    }

    let mut sorted: Vec<ButtonCount> = counts
        .into_iter()
        .map(|(button, clicks)| ButtonCount {
            button: button.to_string(),
            clicks,
        })
        .collect();

    // Most clicked first, label breaks ties
    sorted.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.button.cmp(&b.button)));
    sorted
}

/// Clicks per question for clicks tagged with a question index.
pub fn clicks_by_question(clicks: &[ClickEvent]) -> BTreeMap<QuestionKey, u64> {
    let mut counts = BTreeMap::new();
    for idx in clicks.iter().filter_map(|click| click.question_idx) {
        *counts.entry(QuestionKey(idx)).or_insert(0) += 1;
    }
    counts
}

/// Daily click counts from the start of the day `days` before `now`.
/// Days without clicks are left out. A window reaching past the earliest
/// representable date covers all clicks.
pub fn clicks_timeline(clicks: &[ClickEvent], now: DateTime<Utc>, days: i64) -> Vec<DailyClicks> {
    let from_date = Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .map(|start| start.date_naive());

    let mut per_day = BTreeMap::new();
    for click in clicks {
        let date = click.clicked_at.date_naive();
        if from_date.is_none_or(|from| date >= from) {
            *per_day.entry(date).or_insert(0) += 1;
        }
    }

    per_day
        .into_iter()
        .map(|(date, clicks)| DailyClicks { date, clicks })
        .collect()
}

pub fn user_clicks(clicks: &[ClickEvent], user_id: i64) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for click in clicks.iter().filter(|c| c.user_id == user_id) {
        *counts.entry(click.button.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn most_clicked_buttons(clicks: &[ClickEvent], limit: usize) -> Vec<ButtonCount> {
    let mut buttons = clicks_by_button(clicks);
    buttons.truncate(limit);
    buttons
}

/// Distinct users reaching each question, ascending by question.
///
/// This is reach per stage, not a strict funnel: a user may appear at a later
/// stage without appearing at an earlier one.
pub fn click_funnel(clicks: &[ClickEvent]) -> Vec<FunnelStage> {
    // Collect the distinct users seen at each question
    let mut users: BTreeMap<usize, HashSet<i64>> = BTreeMap::new();
    for click in clicks {
        if let Some(idx) = click.question_idx {
            users.entry(idx).or_default().insert(click.user_id);
        }
    }

    users
        .into_iter()
        .map(|(question_idx, users)| FunnelStage {
            question_idx,
            users: users.len() as u64,
        })
        .collect()
}

pub fn distinct_users(clicks: &[ClickEvent]) -> usize {
    clicks.iter().map(|c| c.user_id).collect::<BTreeSet<_>>().len()
}

/// Mean clicks per distinct user, rounded to two decimals. Zero users gives 0.
pub fn average_clicks_per_user(clicks: &[ClickEvent]) -> f64 {
    let users = distinct_users(clicks);
    // No users means nothing to average
    if users == 0 {
        return 0.0;
    }
    round2(clicks.len() as f64 / users as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Engagement summary for one user. `clicks` must already be that user's.
pub fn user_engagement(user_id: i64, clicks: &[ClickEvent], polls_completed: u64) -> UserEngagement {
    let total_clicks = clicks.len() as u64;
    UserEngagement {
        user_id,
        total_clicks,
        total_polls_completed: polls_completed,
        first_click: clicks.iter().map(|c| c.clicked_at).min(),
        last_click: clicks.iter().map(|c| c.clicked_at).max(),
        is_active: total_clicks > 0,
    }
}

/// Click queries backed by an event store.
///
/// Each method does its own read. `click_statistics` is therefore assembled
/// from several reads and is not a point-in-time snapshot.
pub struct ClickAnalytics<'a, S: EventStore + ?Sized> {
    store: &'a S,
    timeline_days: i64,
}

impl<'a, S: EventStore + ?Sized> ClickAnalytics<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            timeline_days: DEFAULT_TIMELINE_DAYS,
        }
    }

    /// Window used by `click_statistics` for its timeline.
    pub fn with_timeline_days(mut self, days: i64) -> Self {
        self.timeline_days = days;
        self
    }

    async fn load(&self, filter: ClickFilter) -> Result<Vec<ClickEvent>> {
        let clicks = self.store.get_clicks(&filter).await?;
        debug!("Loaded {} clicks for {:?}", clicks.len(), filter);
        Ok(clicks)
    }

    pub async fn total_clicks(&self, poll_id: Option<&str>) -> Result<u64> {
        Ok(total_clicks(&self.load(ClickFilter::for_poll(poll_id)).await?))
    }

    pub async fn clicks_by_button(&self, poll_id: Option<&str>) -> Result<Vec<ButtonCount>> {
        Ok(clicks_by_button(&self.load(ClickFilter::for_poll(poll_id)).await?))
    }

    pub async fn clicks_by_question(&self, poll_id: &str) -> Result<BTreeMap<QuestionKey, u64>> {
        Ok(clicks_by_question(&self.load(ClickFilter::for_poll(Some(poll_id))).await?))
    }

    pub async fn clicks_timeline(&self, poll_id: Option<&str>, days: i64) -> Result<Vec<DailyClicks>> {
        let clicks = self.load(ClickFilter::for_poll(poll_id)).await?;
        Ok(clicks_timeline(&clicks, Utc::now(), days))
    }

    pub async fn user_clicks(&self, user_id: i64) -> Result<BTreeMap<String, u64>> {
        Ok(user_clicks(&self.load(ClickFilter::for_user(user_id)).await?, user_id))
    }

    /// Top buttons across every poll.
    pub async fn most_clicked_buttons(&self, limit: usize) -> Result<Vec<ButtonCount>> {
        Ok(most_clicked_buttons(&self.load(ClickFilter::all()).await?, limit))
    }

    pub async fn click_funnel(&self, poll_id: &str) -> Result<Vec<FunnelStage>> {
        Ok(click_funnel(&self.load(ClickFilter::for_poll(Some(poll_id))).await?))
    }

    pub async fn average_clicks_per_user(&self, poll_id: Option<&str>) -> Result<f64> {
        Ok(average_clicks_per_user(&self.load(ClickFilter::for_poll(poll_id)).await?))
    }

    /// Totals, buttons, timeline and average follow `poll_id`; the top
    /// buttons are always counted over all clicks.
    pub async fn click_statistics(&self, poll_id: Option<&str>) -> Result<ClickStatistics> {
        Ok(ClickStatistics {
            total_clicks: self.total_clicks(poll_id).await?,
            clicks_by_button: self.clicks_by_button(poll_id).await?,
            timeline: self.clicks_timeline(poll_id, self.timeline_days).await?,
            most_clicked: self.most_clicked_buttons(STATISTICS_TOP_BUTTONS).await?,
            avg_clicks_per_user: self.average_clicks_per_user(poll_id).await?,
        })
    }

    pub async fn user_engagement(&self, user_id: i64) -> Result<UserEngagement> {
        let clicks = self.load(ClickFilter::for_user(user_id)).await?;
        // Completed polls come from the responses table
        let polls_completed = self.store.count_user_responses(user_id).await?;
        Ok(user_engagement(user_id, &clicks, polls_completed))
    }
}
