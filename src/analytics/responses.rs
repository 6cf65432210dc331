use std::collections::BTreeMap;

use crate::db::EventStore;
use crate::error::Result;
use crate::models::{AnswerDistribution, Poll, Response};

/// Resolves `poll_id` and tallies `responses` against it.
///
/// An unknown poll yields an empty map rather than an error.
pub async fn analyze<S>(store: &S, poll_id: &str, responses: &[Response]) -> Result<BTreeMap<usize, AnswerDistribution>>
where
    S: EventStore + ?Sized,
{
    let poll = store.get_poll(poll_id).await?;
    Ok(poll
        .map(|poll| calculate_distributions(&poll, responses))
        .unwrap_or_default())
}

/// Convenience wrapper that also loads the poll's stored responses.
pub async fn analyze_poll<S>(store: &S, poll_id: &str) -> Result<BTreeMap<usize, AnswerDistribution>>
where
    S: EventStore + ?Sized,
{
    let responses = store.get_responses(poll_id).await?;
    analyze(store, poll_id, &responses).await
}

pub fn calculate_distributions(poll: &Poll, responses: &[Response]) -> BTreeMap<usize, AnswerDistribution> {
    poll.questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let mut answer_counts: Vec<(String, u64)> = Vec::new();

            for answer in responses.iter().filter_map(|r| r.answer(idx)) {
                if answer.is_empty() {
                    continue;
                }
                match answer_counts.iter_mut().find(|(seen, _)| seen == answer) {
                    Some((_, count)) => *count += 1,
                    None => answer_counts.push((answer.to_string(), 1)),
                }
            }

            let total_answered = answer_counts.iter().map(|(_, count)| count).sum();
            let distribution = AnswerDistribution {
                question_idx: idx,
                question_text: question.text.clone(),
                answer_counts,
                total_answered,
            };
            (idx, distribution)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Question, QuestionKey};
    use chrono::Utc;

    fn poll() -> Poll {
        Poll {
            id: "poll_2".to_string(),
            title: "Здоровье и образ жизни".to_string(),
            description: String::new(),
            questions: vec![
                Question {
                    text: "Сколько часов вы спите в сутки?".to_string(),
                    options: vec!["5-6 часов".to_string(), "7-8 часов".to_string()],
                },
                Question {
                    text: "Занимаетесь ли вы спортом?".to_string(),
                    options: vec!["Редко".to_string(), "Ежедневно".to_string()],
                },
                Question {
                    text: "Как вы оцениваете свое здоровье?".to_string(),
                    options: vec!["Хорошее".to_string()],
                },
            ],
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn response(user_id: i64, pairs: &[(usize, &str)]) -> Response {
        let answers = pairs
            .iter()
            .map(|(idx, answer)| (QuestionKey(*idx), answer.to_string()))
            .collect();
        Response::new(user_id, "poll_2", answers)
    }

    #[test]
    fn one_entry_per_question_even_without_answers() {
        let analysis = calculate_distributions(&poll(), &[]);
        assert_eq!(analysis.len(), 3);
        assert!(analysis.values().all(|d| d.total_answered == 0 && d.answer_counts.is_empty()));
    }

    #[test]
    fn counts_answers_in_first_seen_order() {
        let responses = vec![
            response(1, &[(0, "7-8 часов"), (1, "Редко")]),
            response(2, &[(0, "5-6 часов"), (1, "Ежедневно")]),
            response(3, &[(0, "7-8 часов")]),
        ];

        let analysis = calculate_distributions(&poll(), &responses);
        let sleep = &analysis[&0];
        assert_eq!(sleep.question_text, "Сколько часов вы спите в сутки?");
        assert_eq!(
            sleep.answer_counts,
            vec![("7-8 часов".to_string(), 2), ("5-6 часов".to_string(), 1)]
        );
        assert_eq!(sleep.total_answered, 3);
        assert_eq!(analysis[&1].total_answered, 2);
        assert_eq!(analysis[&2].total_answered, 0);
    }

    #[test]
    fn empty_and_missing_answers_are_skipped() {
        let responses = vec![
            response(1, &[(0, ""), (1, "Редко")]),
            response(2, &[(1, "Редко")]),
            response(3, &[(5, "Хорошее")]),
        ];

        let analysis = calculate_distributions(&poll(), &responses);
        assert_eq!(analysis[&0].total_answered, 0);
        assert_eq!(analysis[&1].count_of("Редко"), 2);
        assert_eq!(analysis.len(), 3);
    }

    #[test]
    fn total_matches_responses_with_an_answer() {
        let responses = vec![
            response(1, &[(0, "7-8 часов"), (2, "Хорошее")]),
            response(1, &[(0, "7-8 часов")]),
            response(2, &[(2, "")]),
        ];

        let analysis = calculate_distributions(&poll(), &responses);
        for (idx, dist) in &analysis {
            let expected = responses
                .iter()
                .filter(|r| r.answer(*idx).is_some_and(|a| !a.is_empty()))
                .count() as u64;
            assert_eq!(dist.total_answered, expected);
            assert_eq!(dist.answer_counts.iter().map(|(_, c)| c).sum::<u64>(), expected);
        }
    }

    #[tokio::test]
    async fn unknown_poll_analyzes_to_nothing() {
        let db = Database::in_memory().await.unwrap();
        let responses = vec![response(1, &[(0, "7-8 часов")])];
        assert!(analyze(&db, "poll_2", &responses).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn analyze_poll_reads_stored_responses() {
        let db = Database::in_memory().await.unwrap();
        db.save_poll(&poll()).await.unwrap();
        db.save_response(&response(1, &[(1, "Ежедневно")])).await.unwrap();
        db.save_response(&response(2, &[(1, "Ежедневно")])).await.unwrap();

        let analysis = analyze_poll(&db, "poll_2").await.unwrap();
        assert_eq!(analysis[&1].count_of("Ежедневно"), 2);
    }
}
