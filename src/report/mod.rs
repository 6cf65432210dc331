//! Plain-text rendering of analytics results for the chat front end.

use std::collections::BTreeMap;

use crate::analytics::StressAssessment;
use crate::models::{AnswerDistribution, ClickStatistics, FunnelStage, UserEngagement};

pub const BAR_WIDTH: usize = 20;
const FILLED: char = '█';
const EMPTY: char = '░';

/// Longest text a single chat message may carry.
pub const MESSAGE_LIMIT: usize = 4096;

const REPORT_BUTTON_ROWS: usize = 10;

/// Share of `count` in `total` as a percentage; 0 when `total` is 0.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// A fixed-width bar with one filled cell per 5%.
pub fn render_bar(percentage: f64) -> String {
    let filled = ((percentage / 5.0).floor() as usize).min(BAR_WIDTH);
    let mut bar = String::with_capacity(BAR_WIDTH * FILLED.len_utf8());
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(BAR_WIDTH - filled));
    bar
}

/// Average as shown to admins: whole averages keep one decimal (`3.0`),
/// the empty case stays a bare `0`.
pub fn format_average(average: f64) -> String {
    if average == 0.0 {
        "0".to_string()
    } else if average.fract() == 0.0 {
        format!("{:.1}", average)
    } else {
        average.to_string()
    }
}

fn bar_row(label: &str, count: u64, total: u64) -> String {
    let pct = percentage(count, total);
    format!("{:20} {} {:5.1}% ({})\n", label, render_bar(pct), pct, count)
}

pub fn format_poll_report(analysis: &BTreeMap<usize, AnswerDistribution>) -> String {
    let mut report = String::from("📋 ПОДРОБНЫЙ ОТЧЕТ\n");
    report.push_str(&"=".repeat(40));
    report.push_str("\n\n");

    for (idx, data) in analysis {
        report.push_str(&format!("Вопрос {}: {}\n", idx + 1, data.question_text));
        report.push_str(&format!("Всего ответов: {}\n", data.total_answered));

        // Stable sort keeps first-seen order for equal counts
        let mut rows: Vec<&(String, u64)> = data.answer_counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        for (answer, count) in rows {
            report.push_str(&bar_row(answer, *count, data.total_answered));
        }

        report.push('\n');
    }

    report
}

pub fn format_click_report(stats: &ClickStatistics) -> String {
    let mut report = String::from("📊 АНАЛИТИКА КЛИКОВ\n\n");
    report.push_str(&format!("Всего кликов: {}\n", stats.total_clicks));
    report.push_str(&format!(
        "Среднее кликов на пользователя: {}\n\n",
        format_average(stats.avg_clicks_per_user)
    ));

    // Top buttons with their share of all clicks
    report.push_str("🔘 Топ кнопок:\n");
    for entry in stats.clicks_by_button.iter().take(REPORT_BUTTON_ROWS) {
        let pct = percentage(entry.clicks, stats.total_clicks);
        report.push_str(&format!("  {}: {} ({:.1}%)\n", entry.button, entry.clicks, pct));
    }

    report
}

/// The long-form export: buttons with bars, the daily timeline and, for a
/// single poll, the per-question funnel.
pub fn format_full_click_report(stats: &ClickStatistics, funnel: Option<&[FunnelStage]>) -> String {
    let mut report = String::from("📊 ПОЛНАЯ АНАЛИТИКА КЛИКОВ\n");
    report.push_str(&"=".repeat(50));
    report.push_str("\n\n");

    report.push_str(&format!("Всего кликов: {}\n", stats.total_clicks));
    report.push_str(&format!(
        "Среднее кликов на пользователя: {}\n\n",
        format_average(stats.avg_clicks_per_user)
    ));

    report.push_str("🔘 КЛИКИ ПО КНОПКАМ\n");
    for entry in stats.clicks_by_button.iter().take(REPORT_BUTTON_ROWS) {
        report.push_str(&bar_row(&entry.button, entry.clicks, stats.total_clicks));
    }

    report.push_str("\n📅 КЛИКИ ПО ДНЯМ\n");
    for day in &stats.timeline {
        report.push_str(&format!("  {}: {}\n", day.date.format("%Y-%m-%d"), day.clicks));
    }

    // Funnel only makes sense for a single poll
    report.push_str("\n🔀 ВОРОНКА (FUNNEL)\n");
    if let Some(stages) = funnel {
        for stage in stages {
            report.push_str(&format!("  {}: {} пользователей\n", stage.label(), stage.users));
        }
    }

    report
}

pub fn format_stress(assessment: &StressAssessment) -> String {
    match assessment {
        StressAssessment::NoData => "Недостаточно данных для оценки уровня стресса".to_string(),
        StressAssessment::Scored { level, mean } => format!("{} (средний балл {:.2})", level, mean),
    }
}

pub fn format_engagement(engagement: &UserEngagement) -> String {
    let stamp = |ts: Option<chrono::DateTime<chrono::Utc>>| {
        ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "—".to_string())
    };

    let mut card = format!("👤 Пользователь {}\n", engagement.user_id);
    card.push_str(&format!("Всего кликов: {}\n", engagement.total_clicks));
    card.push_str(&format!("Пройдено опросов: {}\n", engagement.total_polls_completed));
    card.push_str(&format!("Первый клик: {}\n", stamp(engagement.first_click)));
    card.push_str(&format!("Последний клик: {}\n", stamp(engagement.last_click)));
    card.push_str(if engagement.is_active { "Статус: активен\n" } else { "Статус: неактивен\n" });
    card
}

/// Splits `text` into pieces of at most `limit` characters, never inside a
/// character. Empty text produces no pieces.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut len = 0;

    // Count chars, not bytes; Cyrillic is two bytes each
    for ch in text.chars() {
        if len == limit {
            chunks.push(std::mem::take(&mut current));
            len = 0;
        }
        current.push(ch);
        len += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
