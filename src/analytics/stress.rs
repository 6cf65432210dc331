use serde::Serialize;
use std::fmt;

/// Frequency answers understood by the scorer, from least to most severe.
const SEVERITY: [(&str, u32); 5] = [
    ("Никогда", 0),
    ("Редко", 1),
    ("Иногда", 2),
    ("Часто", 3),
    ("Всегда", 4),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StressLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

impl StressLevel {
    fn from_mean(mean: f64) -> Self {
        if mean < 1.0 {
            StressLevel::Low
        } else if mean < 2.0 {
            StressLevel::Moderate
        } else if mean < 3.0 {
            StressLevel::Elevated
        } else {
            StressLevel::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StressLevel::Low => "Низкий уровень стресса 😊",
            StressLevel::Moderate => "Умеренный уровень стресса 😐",
            StressLevel::Elevated => "Выше среднего уровень стресса 😟",
            StressLevel::High => "Высокий уровень стресса 😰",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StressAssessment {
    /// None of the answers used the frequency vocabulary.
    NoData,
    Scored { level: StressLevel, mean: f64 },
}

impl StressAssessment {
    pub fn level(&self) -> Option<StressLevel> {
        match self {
            StressAssessment::NoData => None,
            StressAssessment::Scored { level, .. } => Some(*level),
        }
    }
}

pub fn severity(answer: &str) -> Option<u32> {
    SEVERITY
        .iter()
        .find(|(label, _)| *label == answer)
        .map(|(_, score)| *score)
}

/// Averages the severity of recognised answers. Anything outside the
/// vocabulary is ignored entirely.
pub fn assess_stress<'a, I>(answers: I) -> StressAssessment
where
    I: IntoIterator<Item = &'a str>,
{
    let (total, count) = answers
        .into_iter()
        .filter_map(severity)
        .fold((0u32, 0u32), |(total, count), score| (total + score, count + 1));

    if count == 0 {
        return StressAssessment::NoData;
    }

    let mean = f64::from(total) / f64::from(count);
    StressAssessment::Scored {
        level: StressLevel::from_mean(mean),
        mean,
    }
}
