use std::collections::HashMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::activity::{ActivityRecord, DateCountMap, count_records};
use crate::codeforces::{RatingChange, Submission, User};
use crate::datetime::date_in_timezone;

pub const CONTEST_LABEL_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub handle: String,
    pub current_rating: String,
    pub max_rating: String,
    pub contribution: String,
    pub rank: String,
}

impl ProfileSummary {
    pub fn from_user(user: &User) -> Self {
        let rating_text = |rating: Option<i64>| {
            rating
                .filter(|value| *value != 0)
                .map(|value| value.to_string())
                .unwrap_or_else(|| "unrated".to_string())
        };

        Self {
            handle: user.handle.clone(),
            current_rating: rating_text(user.rating),
            max_rating: rating_text(user.max_rating),
            contribution: user.contribution.to_string(),
            rank: user
                .rank
                .clone()
                .filter(|rank| !rank.is_empty())
                .unwrap_or_else(|| "unranked".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingPoint {
    pub label: String,
    pub contest_id: i64,
    pub date: Option<NaiveDate>,
    pub rating: i64,
    pub change: i64,
    pub trend: Trend,
}

/// Contest names longer than the chart axis allows are cut to
/// [`CONTEST_LABEL_LIMIT`] characters plus `...`.
pub fn contest_label(name: &str) -> String {
    if name.chars().count() > CONTEST_LABEL_LIMIT {
        let head: String = name.chars().take(CONTEST_LABEL_LIMIT).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

pub fn rating_series(history: &[RatingChange], tz: &Tz) -> Vec<RatingPoint> {
    history
        .iter()
        .map(|entry| {
            let change = entry.new_rating - entry.old_rating;
            RatingPoint {
                label: contest_label(&entry.contest_name),
                contest_id: entry.contest_id,
                date: date_in_timezone(entry.rating_update_time_seconds, tz),
                rating: entry.new_rating,
                change,
                trend: if change >= 0 { Trend::Up } else { Trend::Down },
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Occurrences of each problem tag across all submissions, most frequent
/// first.
pub fn tag_distribution(submissions: &[Submission]) -> Vec<TagCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for problem in submissions.iter().filter_map(|s| s.problem.as_ref()) {
        for tag in &problem.tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}

pub fn submission_activity(submissions: &[Submission], tz: &Tz) -> DateCountMap {
    let records: Vec<ActivityRecord> = submissions.iter().map(Submission::activity).collect();
    count_records(&records, tz)
}

/// `count` years ending at `current`, newest first.
pub fn recent_years(current: i32, count: u32) -> Vec<i32> {
    (0..count.max(1) as i32).map(|back| current - back).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        ProfileSummary, Trend, contest_label, rating_series, recent_years, submission_activity,
        tag_distribution,
    };
    use crate::codeforces::{Problem, RatingChange, Submission, User};

    fn submission(id: i64, ts: i64, tags: &[&str]) -> Submission {
        Submission {
            id,
            creation_time_seconds: ts,
            problem: Some(Problem {
                contest_id: Some(1),
                index: "A".to_string(),
                name: "Problem".to_string(),
                rating: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }),
            verdict: Some("OK".to_string()),
        }
    }

    #[test]
    fn profile_falls_back_for_unrated_users() {
        let user = User {
            handle: "newbie".to_string(),
            rating: None,
            max_rating: None,
            rank: None,
            max_rank: None,
            contribution: 0,
        };
        let summary = ProfileSummary::from_user(&user);
        assert_eq!(summary.current_rating, "unrated");
        assert_eq!(summary.max_rating, "unrated");
        assert_eq!(summary.rank, "unranked");
        assert_eq!(summary.contribution, "0");
    }

    #[test]
    fn long_contest_names_are_truncated() {
        assert_eq!(contest_label("Short Round"), "Short Round");
        assert_eq!(contest_label("123456789012345"), "123456789012345");
        assert_eq!(
            contest_label("Codeforces Round 911 (Div. 2)"),
            "Codeforces Roun..."
        );
    }

    #[test]
    fn rating_points_track_direction() {
        let history = vec![
            RatingChange {
                contest_id: 1,
                contest_name: "Round 1".to_string(),
                rank: 100,
                rating_update_time_seconds: 1_700_000_000,
                old_rating: 0,
                new_rating: 1400,
            },
            RatingChange {
                contest_id: 2,
                contest_name: "Round 2".to_string(),
                rank: 900,
                rating_update_time_seconds: 1_700_600_000,
                old_rating: 1400,
                new_rating: 1380,
            },
            RatingChange {
                contest_id: 3,
                contest_name: "Round 3".to_string(),
                rank: 500,
                rating_update_time_seconds: 1_701_200_000,
                old_rating: 1380,
                new_rating: 1380,
            },
        ];
        let points = rating_series(&history, &chrono_tz::UTC);
        let trends: Vec<Trend> = points.iter().map(|p| p.trend).collect();
        assert_eq!(trends, vec![Trend::Up, Trend::Down, Trend::Up]);
        assert_eq!(points[1].change, -20);
        assert_eq!(points[0].rating, 1400);
        assert!(points.iter().all(|p| p.date.is_some()));
    }

    #[test]
    fn tags_count_every_occurrence() {
        let mut no_problem = submission(4, 0, &[]);
        no_problem.problem = None;
        let submissions = vec![
            submission(1, 0, &["greedy", "math"]),
            submission(2, 0, &["greedy"]),
            submission(3, 0, &["dp", "math"]),
            no_problem,
        ];
        let tags = tag_distribution(&submissions);
        let flat: Vec<(&str, u64)> = tags.iter().map(|t| (t.tag.as_str(), t.count)).collect();
        assert_eq!(flat, vec![("greedy", 2), ("math", 2), ("dp", 1)]);
    }

    #[test]
    fn submissions_aggregate_by_day() {
        let submissions = vec![
            submission(1, 1_710_446_400, &[]),
            submission(2, 1_710_446_500, &[]),
            submission(3, 1_700_000_000, &[]),
        ];
        let counts = submission_activity(&submissions, &chrono_tz::UTC);
        assert_eq!(counts.values().sum::<u64>(), 3);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn recent_years_are_newest_first() {
        assert_eq!(recent_years(2026, 5), vec![2026, 2025, 2024, 2023, 2022]);
        assert_eq!(recent_years(2026, 0), vec![2026]);
    }
}
