use chrono::Utc;
use log::{info, warn};

use crate::db::{Database, EventStore};
use crate::error::Result;
use crate::models::{Poll, Question};

fn question(text: &str, options: &[&str]) -> Question {
    Question {
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

/// The polls shipped with the bot.
pub fn sample_polls() -> Vec<Poll> {
    let now = Utc::now();
    vec![
        Poll {
            id: "poll_1".to_string(),
            title: "Стресс на работе".to_string(),
            description: "Оцените уровень стресса на работе".to_string(),
            questions: vec![
                question(
                    "Как часто вы чувствуете стресс на работе?",
                    &["Никогда", "Редко", "Иногда", "Часто", "Всегда"],
                ),
                question(
                    "Влияет ли работа на ваше здоровье?",
                    &["Не влияет", "Слабо влияет", "Умеренно влияет", "Сильно влияет"],
                ),
                question(
                    "Вы считаете рабочую нагрузку?",
                    &["Легкой", "Нормальной", "Высокой", "Очень высокой"],
                ),
                question(
                    "Вам хватает времени на отдых?",
                    &["Да, полностью", "В основном да", "Иногда", "Нет, никогда"],
                ),
            ],
            image_url: Some("https://via.placeholder.com/400x300?text=Work+Stress".to_string()),
            created_at: now,
        },
        Poll {
            id: "poll_2".to_string(),
            title: "Здоровье и образ жизни".to_string(),
            description: "Расскажите о вашем образе жизни".to_string(),
            questions: vec![
                question(
                    "Сколько часов вы спите в сутки?",
                    &["< 5 часов", "5-6 часов", "7-8 часов", "> 8 часов"],
                ),
                question(
                    "Занимаетесь ли вы спортом?",
                    &["Не занимаюсь", "Редко", "2-3 раза в неделю", "Ежедневно"],
                ),
                question(
                    "Как вы оцениваете свое здоровье?",
                    &["Плохое", "Среднее", "Хорошее", "Отличное"],
                ),
            ],
            image_url: Some("https://via.placeholder.com/400x300?text=Health".to_string()),
            created_at: now,
        },
    ]
}

/// Stores any sample poll that is not there yet. Returns how many were added.
pub async fn seed(database: &Database) -> Result<usize> {
    let mut created = 0;
    for poll in sample_polls() {
        if database.get_poll(&poll.id).await?.is_some() {
            warn!("Poll {} already exists, skipping", poll.id);
            continue;
        }
        database.save_poll(&poll).await?;
        info!("Poll {} created: {}", poll.id, poll.title);
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_ids_are_unique() {
        let polls = sample_polls();
        assert_eq!(polls.len(), 2);
        assert_ne!(polls[0].id, polls[1].id);
        assert_eq!(polls[0].questions.len(), 4);
        assert_eq!(polls[1].questions.len(), 3);
    }

    #[tokio::test]
    async fn seeding_twice_adds_nothing_new() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(seed(&db).await.unwrap(), 2);
        assert_eq!(seed(&db).await.unwrap(), 0);

        let poll = db.get_poll("poll_1").await.unwrap().unwrap();
        assert_eq!(poll.questions[0].options[4], "Всегда");
    }
}
