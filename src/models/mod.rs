use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
}

/// Identifies a question by its position within a poll.
///
/// Persisted answer maps spell this as `q_<index>`; everything else works
/// with the index directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionKey(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseQuestionKeyError(String);

impl fmt::Display for ParseQuestionKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid question key '{}', expected q_<index>", self.0)
    }
}

impl std::error::Error for ParseQuestionKeyError {}

impl QuestionKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q_{}", self.0)
    }
}

impl FromStr for QuestionKey {
    type Err = ParseQuestionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseQuestionKeyError(s.to_string());
        let digits = s.strip_prefix("q_").ok_or_else(err)?;

        // Canonical form only, so a key always prints back as it was read
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if !canonical {
            return Err(err());
        }

        digits.parse().map(QuestionKey).map_err(|_| err())
    }
}

impl TryFrom<String> for QuestionKey {
    type Error = ParseQuestionKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuestionKey> for String {
    fn from(key: QuestionKey) -> Self {
        key.to_string()
    }
}

/// One user's answer set for a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: i64,
    pub poll_id: String,
    pub answers: BTreeMap<QuestionKey, String>,
    pub completed_at: DateTime<Utc>,
}

impl Response {
    pub fn new(user_id: i64, poll_id: impl Into<String>, answers: BTreeMap<QuestionKey, String>) -> Self {
        Self {
            user_id,
            poll_id: poll_id.into(),
            answers,
            completed_at: Utc::now(),
        }
    }

    pub fn answer(&self, question: usize) -> Option<&str> {
        self.answers.get(&QuestionKey(question)).map(String::as_str)
    }
}

/// A single recorded press of a bot button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub user_id: i64,
    pub button: String,
    pub callback_data: Option<String>,
    pub poll_id: Option<String>,
    pub question_idx: Option<usize>,
    pub clicked_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(user_id: i64, button: impl Into<String>) -> Self {
        Self {
            user_id,
            button: button.into(),
            callback_data: None,
            poll_id: None,
            question_idx: None,
            clicked_at: Utc::now(),
        }
    }

    pub fn with_callback_data(mut self, data: impl Into<String>) -> Self {
        self.callback_data = Some(data.into());
        self
    }

    pub fn with_poll(mut self, poll_id: impl Into<String>) -> Self {
        self.poll_id = Some(poll_id.into());
        self
    }

    pub fn with_question(mut self, question_idx: usize) -> Self {
        self.question_idx = Some(question_idx);
        self
    }

    pub fn at(mut self, clicked_at: DateTime<Utc>) -> Self {
        self.clicked_at = clicked_at;
        self
    }
}

/// Answer counts for one question, in the order answers were first seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerDistribution {
    pub question_idx: usize,
    pub question_text: String,
    pub answer_counts: Vec<(String, u64)>,
    pub total_answered: u64,
}

impl AnswerDistribution {
    pub fn count_of(&self, answer: &str) -> u64 {
        self.answer_counts
            .iter()
            .find(|(a, _)| a == answer)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonCount {
    pub button: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyClicks {
    pub date: NaiveDate,
    pub clicks: u64,
}

/// Distinct users who clicked anything tagged with one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelStage {
    pub question_idx: usize,
    pub users: u64,
}

impl FunnelStage {
    pub fn label(&self) -> String {
        format!("Question {}", self.question_idx + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickStatistics {
    pub total_clicks: u64,
    pub clicks_by_button: Vec<ButtonCount>,
    pub timeline: Vec<DailyClicks>,
    pub most_clicked: Vec<ButtonCount>,
    pub avg_clicks_per_user: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEngagement {
    pub user_id: i64,
    pub total_clicks: u64,
    pub total_polls_completed: u64,
    pub first_click: Option<DateTime<Utc>>,
    pub last_click: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_key_parses_and_displays() {
        let key: QuestionKey = "q_12".parse().unwrap();
        assert_eq!(key, QuestionKey(12));
        assert_eq!(key.to_string(), "q_12");
        assert!("q12".parse::<QuestionKey>().is_err());
        assert!("q_x".parse::<QuestionKey>().is_err());
        assert_eq!("q_0".parse::<QuestionKey>(), Ok(QuestionKey(0)));
    }

    #[test]
    fn non_canonical_keys_are_rejected() {
        for raw in ["q_01", "q_+1", "q_-1", "q_", "q_ 1", "q_00"] {
            assert!(raw.parse::<QuestionKey>().is_err(), "{} should not parse", raw);
        }
        assert!(serde_json::from_str::<BTreeMap<QuestionKey, String>>(r#"{"q_01":"Да"}"#).is_err());
    }

    #[test]
    fn answers_use_string_keys_in_json() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionKey(0), "Часто".to_string());
        answers.insert(QuestionKey(2), "Легкой".to_string());

        let json = serde_json::to_string(&answers).unwrap();
        assert_eq!(json, r#"{"q_0":"Часто","q_2":"Легкой"}"#);

        let back: BTreeMap<QuestionKey, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answers);
    }

    #[test]
    fn malformed_answer_key_is_rejected() {
        let parsed = serde_json::from_str::<BTreeMap<QuestionKey, String>>(r#"{"first":"Да"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn funnel_stage_label_is_one_based() {
        let stage = FunnelStage { question_idx: 2, users: 4 };
        assert_eq!(stage.label(), "Question 3");
    }
}
