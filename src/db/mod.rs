use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

use crate::config::Config;
use crate::error::{Result, StatsError};
use crate::models::{ClickEvent, Poll, Question, Response};

/// Narrows a click query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickFilter {
    pub poll_id: Option<String>,
    pub user_id: Option<i64>,
}

impl ClickFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_poll(poll_id: Option<&str>) -> Self {
        Self {
            poll_id: poll_id.map(str::to_string),
            user_id: None,
        }
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            poll_id: None,
            user_id: Some(user_id),
        }
    }
}

/// Read side of the event store, as seen by the analytics code.
///
/// Every call is an independent read. Two calls made back to back may observe
/// different data if a writer is active in between.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>>;

    async fn get_responses(&self, poll_id: &str) -> Result<Vec<Response>>;

    async fn count_user_responses(&self, user_id: i64) -> Result<u64>;

    async fn user_already_responded(&self, user_id: i64, poll_id: &str) -> Result<bool>;

    /// Clicks matching `filter`, oldest first.
    async fn get_clicks(&self, filter: &ClickFilter) -> Result<Vec<ClickEvent>>;

    async fn require_poll(&self, poll_id: &str) -> Result<Poll> {
        self.get_poll(poll_id)
            .await?
            .ok_or_else(|| StatsError::PollNotFound(poll_id.to_string()))
    }

    async fn ensure_not_responded(&self, user_id: i64, poll_id: &str) -> Result<()> {
        if self.user_already_responded(user_id, poll_id).await? {
            return Err(StatsError::UserAlreadyResponded {
                user_id,
                poll_id: poll_id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;
        info!("Connected to {}", db_url);

        Ok(Self { pool })
    }

    /// A private in-memory database. A single connection that never expires,
    /// since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                poll_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                questions TEXT NOT NULL,
                image_url TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                poll_id TEXT NOT NULL,
                answers TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                button_name TEXT NOT NULL,
                callback_data TEXT,
                poll_id TEXT,
                question_idx INTEGER,
                clicked_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn save_poll(&self, poll: &Poll) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (poll_id, title, description, questions, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(serde_json::to_string(&poll.questions)?)
        .bind(&poll.image_url)
        .bind(poll.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_response(&self, response: &Response) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO responses (user_id, poll_id, answers, completed_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(response.user_id)
        .bind(&response.poll_id)
        .bind(serde_json::to_string(&response.answers)?)
        .bind(response.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores a response after checking the poll exists and the user has not
    /// answered it yet.
    pub async fn submit_response(&self, response: &Response) -> Result<()> {
        self.require_poll(&response.poll_id).await?;
        self.ensure_not_responded(response.user_id, &response.poll_id).await?;
        self.save_response(response).await?;

        info!(
            "User {} - completed_poll - poll_id={}, answers={}",
            response.user_id,
            response.poll_id,
            response.answers.len()
        );
        Ok(())
    }

    pub async fn log_click(&self, click: &ClickEvent) -> Result<()> {
        // SQLite integers are signed 64-bit
        let question_idx = click
            .question_idx
            .map(|idx| i64::try_from(idx).map_err(|_| StatsError::InvalidQuestionIndex(idx.to_string())))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO clicks (user_id, button_name, callback_data, poll_id, question_idx, clicked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(click.user_id)
        .bind(&click.button)
        .bind(&click.callback_data)
        .bind(&click.poll_id)
        .bind(question_idx)
        .bind(click.clicked_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("Click logged - User: {}, Button: {}", click.user_id, click.button);
        Ok(())
    }
}

#[async_trait]
impl EventStore for Database {
    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>> {
        let row = sqlx::query(
            r#"
            SELECT poll_id, title, description, questions, image_url, created_at
            FROM polls
            WHERE poll_id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("Poll {} not found", poll_id);
            return Ok(None);
        };

        let questions: Vec<Question> = serde_json::from_str(&row.get::<String, _>("questions"))?;

        Ok(Some(Poll {
            id: row.get("poll_id"),
            title: row.get("title"),
            description: row.get::<Option<String>, _>("description").unwrap_or_default(),
            questions,
            image_url: row.get("image_url"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        }))
    }

    async fn get_responses(&self, poll_id: &str) -> Result<Vec<Response>> {
        sqlx::query(
            r#"
            SELECT user_id, poll_id, answers, completed_at
            FROM responses
            WHERE poll_id = ?
            ORDER BY id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(response_from_row)
        .collect()
    }

    async fn count_user_responses(&self, user_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM responses WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?
            .get(0);

        Ok(count.max(0) as u64)
    }

    async fn user_already_responded(&self, user_id: i64, poll_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM responses WHERE user_id = ? AND poll_id = ?")
            .bind(user_id)
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?
            .get(0);

        Ok(count > 0)
    }

    async fn get_clicks(&self, filter: &ClickFilter) -> Result<Vec<ClickEvent>> {
        // NULL parameters disable the corresponding condition
        sqlx::query(
            r#"
            SELECT user_id, button_name, callback_data, poll_id, question_idx, clicked_at
            FROM clicks
            WHERE (?1 IS NULL OR poll_id = ?1)
              AND (?2 IS NULL OR user_id = ?2)
            ORDER BY id
            "#,
        )
        .bind(&filter.poll_id)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(click_from_row)
        .collect()
    }
}

fn response_from_row(row: &SqliteRow) -> Result<Response> {
    Ok(Response {
        user_id: row.get("user_id"),
        poll_id: row.get("poll_id"),
        answers: serde_json::from_str(&row.get::<String, _>("answers"))?,
        completed_at: parse_timestamp(&row.get::<String, _>("completed_at"))?,
    })
}

fn click_from_row(row: &SqliteRow) -> Result<ClickEvent> {
    let question_idx = row
        .get::<Option<i64>, _>("question_idx")
        .map(|idx| usize::try_from(idx).map_err(|_| StatsError::InvalidQuestionIndex(idx.to_string())))
        .transpose()?;

    Ok(ClickEvent {
        user_id: row.get("user_id"),
        button: row.get("button_name"),
        callback_data: row.get("callback_data"),
        poll_id: row.get("poll_id"),
        question_idx,
        clicked_at: parse_timestamp(&row.get::<String, _>("clicked_at"))?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| StatsError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKey;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn sample_poll() -> Poll {
        Poll {
            id: "poll_1".to_string(),
            title: "Стресс на работе".to_string(),
            description: "Оцените уровень стресса на работе".to_string(),
            questions: vec![Question {
                text: "Как часто вы чувствуете стресс на работе?".to_string(),
                options: vec!["Никогда".to_string(), "Всегда".to_string()],
            }],
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
        }
    }

    fn answers(pairs: &[(usize, &str)]) -> BTreeMap<QuestionKey, String> {
        pairs
            .iter()
            .map(|(idx, answer)| (QuestionKey(*idx), answer.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn poll_round_trips_through_store() {
        let db = Database::in_memory().await.unwrap();
        let poll = sample_poll();
        db.save_poll(&poll).await.unwrap();

        assert_eq!(db.get_poll("poll_1").await.unwrap(), Some(poll));
        assert_eq!(db.get_poll("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn require_poll_reports_missing_poll() {
        let db = Database::in_memory().await.unwrap();
        let err = db.require_poll("poll_9").await.unwrap_err();
        assert!(matches!(err, StatsError::PollNotFound(id) if id == "poll_9"));
    }

    #[tokio::test]
    async fn submit_response_rejects_second_answer_set() {
        let db = Database::in_memory().await.unwrap();
        db.save_poll(&sample_poll()).await.unwrap();

        let response = Response::new(7, "poll_1", answers(&[(0, "Всегда")]));
        db.submit_response(&response).await.unwrap();
        assert!(db.user_already_responded(7, "poll_1").await.unwrap());

        let err = db.submit_response(&response).await.unwrap_err();
        assert!(matches!(err, StatsError::UserAlreadyResponded { user_id: 7, .. }));
        assert_eq!(db.get_responses("poll_1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_response_requires_existing_poll() {
        let db = Database::in_memory().await.unwrap();
        let response = Response::new(7, "poll_x", answers(&[(0, "Всегда")]));
        assert!(matches!(
            db.submit_response(&response).await,
            Err(StatsError::PollNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unchecked_save_allows_duplicates() {
        let db = Database::in_memory().await.unwrap();
        db.save_poll(&sample_poll()).await.unwrap();

        let response = Response::new(3, "poll_1", answers(&[(0, "Никогда")]));
        db.save_response(&response).await.unwrap();
        db.save_response(&response).await.unwrap();

        assert_eq!(db.get_responses("poll_1").await.unwrap().len(), 2);
        assert_eq!(db.count_user_responses(3).await.unwrap(), 2);
        assert_eq!(db.count_user_responses(4).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn click_filters_narrow_results() {
        let db = Database::in_memory().await.unwrap();
        db.log_click(&ClickEvent::new(1, "start_command")).await.unwrap();
        db.log_click(&ClickEvent::new(1, "answer_q0").with_poll("poll_1").with_question(0))
            .await
            .unwrap();
        db.log_click(&ClickEvent::new(2, "answer_q0").with_poll("poll_1").with_question(0))
            .await
            .unwrap();

        assert_eq!(db.get_clicks(&ClickFilter::all()).await.unwrap().len(), 3);
        assert_eq!(db.get_clicks(&ClickFilter::for_poll(Some("poll_1"))).await.unwrap().len(), 2);
        assert_eq!(db.get_clicks(&ClickFilter::for_user(1)).await.unwrap().len(), 2);

        let clicks = db.get_clicks(&ClickFilter::for_user(2)).await.unwrap();
        assert_eq!(clicks[0].question_idx, Some(0));
        assert_eq!(clicks[0].poll_id.as_deref(), Some("poll_1"));
    }

    #[tokio::test]
    async fn malformed_answers_fail_loudly() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO responses (user_id, poll_id, answers, completed_at) VALUES (1, 'poll_1', 'not json', ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();

        assert!(matches!(
            db.get_responses("poll_1").await,
            Err(StatsError::MalformedData(_))
        ));
    }

    #[tokio::test]
    async fn negative_question_index_fails_loudly() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO clicks (user_id, button_name, question_idx, clicked_at) VALUES (1, 'answer_q0', -1, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.get_clicks(&ClickFilter::all()).await.unwrap_err();
        assert!(matches!(err, StatsError::InvalidQuestionIndex(idx) if idx == "-1"));
    }

    #[tokio::test]
    async fn oversized_question_index_is_not_written() {
        let db = Database::in_memory().await.unwrap();
        let click = ClickEvent::new(1, "answer").with_question(usize::MAX);

        assert!(matches!(
            db.log_click(&click).await,
            Err(StatsError::InvalidQuestionIndex(_))
        ));
        assert!(db.get_clicks(&ClickFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_timestamp_fails_loudly() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("INSERT INTO clicks (user_id, button_name, clicked_at) VALUES (1, 'start', 'yesterday')")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(matches!(
            db.get_clicks(&ClickFilter::all()).await,
            Err(StatsError::InvalidTimestamp { .. })
        ));
    }
}
