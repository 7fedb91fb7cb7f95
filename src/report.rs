/*!
The analysis Report Engine.

A pure function over the full student roster: summary statistics,
fixed-threshold distribution buckets, per-class breakdown, a top-ten
ranking, and a short list of canned suggestions picked by threshold
rules. Nothing here touches the store.
*/
use std::collections::BTreeMap;

use serde::Serialize;

use crate::student::Student;

const EXCELLENT_MIN: f64 = 90.0;
const GOOD_MIN: f64 = 80.0;
const PASS_MIN: f64 = 60.0;

const TOP_STUDENTS: usize = 10;

/// Mean thresholds for the overall-performance suggestion.
const STRONG_AVG: f64 = 85.0;
const FAIR_AVG: f64 = 70.0;

/// Share of excellent students above which harder material is suggested.
const EXCELLENT_SHARE: f64 = 0.3;

/// Max-minus-min spread above which tiered teaching is suggested.
const WIDE_GAP: f64 = 50.0;

pub const MSG_STRONG: &str =
    "Overall performance is excellent. Keep up the current momentum.";
pub const MSG_FAIR: &str =
    "Overall performance is good, but there is room to improve; consider extra coaching on weak areas.";
pub const MSG_PASSING: &str =
    "Overall scores are passing; focus attention on the weakest students with targeted tutoring.";
pub const MSG_POOR: &str =
    "Overall scores are low; review the teaching approach and reinforce the fundamentals.";
pub const MSG_RAISE_CHALLENGE: &str =
    "A high share of students are excelling; consider adding more challenging material.";
pub const MSG_TIERED: &str =
    "Scores are widely spread; consider tiered teaching to meet each level where it is.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_students: usize,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub score_gap: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub excellent: usize,
    pub good: usize,
    pub pass: usize,
    pub fail: usize,
    pub excellent_rate: String,
    pub pass_rate: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStat {
    pub class: String,
    pub student_count: usize,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub rank: usize,
    pub name: String,
    pub student_id: String,
    pub class: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: Summary,
    pub distribution: Distribution,
    pub class_analysis: Vec<ClassStat>,
    pub top_students: Vec<RankedStudent>,
    pub suggestions: Vec<String>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn percentage(part: usize, whole: usize) -> String {
    format!("{:.2}%", 100.0 * part as f64 / whole as f64)
}

fn score_spread(scores: &[f64]) -> (f64, f64) {
    // Caller guarantees at least one score.
    let mut max = f64::MIN;
    let mut min = f64::MAX;
    for &s in scores {
        if s > max { max = s; }
        if s < min { min = s; }
    }
    (max, min)
}

/**
Produce the analysis report for the given roster.

Returns `None` for an empty roster; the handler renders that as the
"no data yet" payload.
*/
pub fn analyze(students: &[Student]) -> Option<Report> {
    log::trace!("analyze( [ {} students ] ) called.", students.len());

    if students.is_empty() {
        return None;
    }

    let total_students = students.len();
    let scores: Vec<f64> = students.iter().map(|s| s.score).collect();
    let total: f64 = scores.iter().sum();
    let avg_score = total / total_students as f64;
    let (max_score, min_score) = score_spread(&scores);
    let score_gap = max_score - min_score;

    let excellent = scores.iter().filter(|&&s| s >= EXCELLENT_MIN).count();
    let good = scores.iter()
        .filter(|&&s| s >= GOOD_MIN && s < EXCELLENT_MIN).count();
    let pass = scores.iter()
        .filter(|&&s| s >= PASS_MIN && s < GOOD_MIN).count();
    let fail = scores.iter().filter(|&&s| s < PASS_MIN).count();

    // Class labels are free-form; a BTreeMap keeps the breakdown in a
    // reproducible (ascending-label) order.
    let mut by_class: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for s in students.iter() {
        by_class.entry(s.class.as_str()).or_default().push(s.score);
    }

    let class_analysis: Vec<ClassStat> = by_class.iter()
        .map(|(class, scores)| {
            let sum: f64 = scores.iter().sum();
            let (max, min) = score_spread(scores);
            ClassStat {
                class: (*class).to_owned(),
                student_count: scores.len(),
                avg_score: round2(sum / scores.len() as f64),
                max_score: max,
                min_score: min,
            }
        }).collect();

    // Rank by score descending; ties break on studentId ascending so the
    // ordering is reproducible for a given roster.
    let mut ranked: Vec<&Student> = students.iter().collect();
    ranked.sort_by(|a, b| {
        b.score.total_cmp(&a.score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    let top_students: Vec<RankedStudent> = ranked.iter()
        .take(TOP_STUDENTS)
        .enumerate()
        .map(|(n, s)| RankedStudent {
            rank: n + 1,
            name: s.name.clone(),
            student_id: s.student_id.clone(),
            class: s.class.clone(),
            score: s.score,
        }).collect();

    let mut suggestions: Vec<String> = Vec::new();
    if avg_score >= STRONG_AVG {
        suggestions.push(MSG_STRONG.to_owned());
    } else if avg_score >= FAIR_AVG {
        suggestions.push(MSG_FAIR.to_owned());
    } else if avg_score >= PASS_MIN {
        suggestions.push(MSG_PASSING.to_owned());
    } else {
        suggestions.push(MSG_POOR.to_owned());
    }
    if fail > 0 {
        suggestions.push(format!(
            "{} student(s) are failing; consider remedial sessions or one-on-one tutoring.",
            fail
        ));
    }
    if (excellent as f64) > (total_students as f64) * EXCELLENT_SHARE {
        suggestions.push(MSG_RAISE_CHALLENGE.to_owned());
    }
    if score_gap > WIDE_GAP {
        suggestions.push(MSG_TIERED.to_owned());
    }

    Some(Report {
        summary: Summary {
            total_students,
            avg_score: round2(avg_score),
            max_score,
            min_score,
            score_gap,
        },
        distribution: Distribution {
            excellent,
            good,
            pass,
            fail,
            excellent_rate: percentage(excellent, total_students),
            pass_rate: percentage(total_students - fail, total_students),
        },
        class_analysis,
        top_students,
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::approx_eq;
    use mongodb::bson::DateTime;

    fn student(name: &str, student_id: &str, class: &str, score: f64) -> Student {
        Student {
            id: None,
            name: name.to_owned(),
            student_id: student_id.to_owned(),
            class: class.to_owned(),
            score,
            created: DateTime::now(),
        }
    }

    fn roster(scores: &[f64]) -> Vec<Student> {
        scores.iter()
            .enumerate()
            .map(|(n, &score)| student(
                &format!("Student {}", n),
                &format!("2025{:04}", n),
                "3A",
                score,
            )).collect()
    }

    #[test]
    fn empty_roster_has_no_report() {
        assert!(analyze(&[]).is_none());
    }

    #[test]
    fn four_bucket_roster() {
        let students = roster(&[95.0, 85.0, 70.0, 55.0]);
        let report = analyze(&students).unwrap();

        assert_eq!(report.summary.total_students, 4);
        assert!(approx_eq!(f64, report.summary.avg_score, 76.25));
        assert!(approx_eq!(f64, report.summary.max_score, 95.0));
        assert!(approx_eq!(f64, report.summary.min_score, 55.0));
        assert!(approx_eq!(f64, report.summary.score_gap, 40.0));

        let d = &report.distribution;
        assert_eq!(
            (d.excellent, d.good, d.pass, d.fail),
            (1, 1, 1, 1)
        );
        assert_eq!(d.excellent_rate, "25.00%");
        assert_eq!(d.pass_rate, "75.00%");
    }

    #[test]
    fn bucket_boundaries_are_inclusive_below() {
        let students = roster(&[90.0, 80.0, 60.0, 59.99]);
        let d = analyze(&students).unwrap().distribution;
        assert_eq!(
            (d.excellent, d.good, d.pass, d.fail),
            (1, 1, 1, 1)
        );
    }

    #[test]
    fn mean_is_rounded_to_two_decimals() {
        let students = roster(&[70.0, 70.0, 71.0]);
        let report = analyze(&students).unwrap();
        // 211/3 = 70.333...
        assert!(approx_eq!(f64, report.summary.avg_score, 70.33));
    }

    #[test]
    fn ranking_breaks_ties_on_student_id() {
        let students = vec![
            student("Beth", "2025-0002", "3A", 88.0),
            student("Abel", "2025-0003", "3B", 88.0),
            student("Cora", "2025-0001", "3A", 99.0),
        ];
        let top = analyze(&students).unwrap().top_students;

        assert_eq!(top.len(), 3);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].student_id, "2025-0001");
        // Tied at 88.0: lower studentId first.
        assert_eq!(top[1].student_id, "2025-0002");
        assert_eq!(top[2].student_id, "2025-0003");
        assert_eq!(top[2].rank, 3);
    }

    #[test]
    fn ranking_keeps_only_ten() {
        let scores: Vec<f64> = (0..14).map(|n| 60.0 + n as f64).collect();
        let students = roster(&scores);
        let top = analyze(&students).unwrap().top_students;
        assert_eq!(top.len(), 10);
        assert!(approx_eq!(f64, top[0].score, 73.0));
        assert!(approx_eq!(f64, top[9].score, 64.0));
    }

    #[test]
    fn per_class_breakdown() {
        let students = vec![
            student("Abel", "01", "3B", 80.0),
            student("Beth", "02", "3A", 90.0),
            student("Cora", "03", "3A", 70.0),
        ];
        let classes = analyze(&students).unwrap().class_analysis;

        // Ascending class label order.
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].class, "3A");
        assert_eq!(classes[0].student_count, 2);
        assert!(approx_eq!(f64, classes[0].avg_score, 80.0));
        assert!(approx_eq!(f64, classes[0].max_score, 90.0));
        assert!(approx_eq!(f64, classes[0].min_score, 70.0));
        assert_eq!(classes[1].class, "3B");
        assert_eq!(classes[1].student_count, 1);
    }

    #[test]
    fn suggestion_mean_bands() {
        for (scores, expected) in [
            (vec![90.0, 80.0], MSG_STRONG),
            (vec![80.0, 70.0], MSG_FAIR),
            (vec![65.0, 65.0], MSG_PASSING),
            (vec![50.0, 50.0], MSG_POOR),
        ] {
            let students = roster(&scores);
            let suggestions = analyze(&students).unwrap().suggestions;
            assert_eq!(suggestions[0], expected, "scores {:?}", scores);
        }
    }

    #[test]
    fn suggestion_ordering_and_extras() {
        // Mean 62.5, one failing, one excellent (50% > 30%), gap 65 > 50.
        let students = roster(&[95.0, 30.0]);
        let suggestions = analyze(&students).unwrap().suggestions;

        assert_eq!(suggestions.len(), 4);
        assert_eq!(suggestions[0], MSG_PASSING);
        assert!(suggestions[1].contains("1 student(s)"));
        assert_eq!(suggestions[2], MSG_RAISE_CHALLENGE);
        assert_eq!(suggestions[3], MSG_TIERED);
    }

    #[test]
    fn only_the_mean_band_message_when_nothing_else_fires() {
        // Mean 85 exactly; nobody failing or excellent; zero gap.
        let students = roster(&[85.0, 85.0]);
        let suggestions = analyze(&students).unwrap().suggestions;
        assert_eq!(suggestions, vec![MSG_STRONG.to_owned()]);
    }

    #[test]
    fn excellent_share_is_strictly_greater() {
        // Exactly 30%: 3 of 10. The rule must not fire.
        let mut scores = vec![95.0, 95.0, 95.0];
        scores.extend(std::iter::repeat(85.0).take(7));
        let students = roster(&scores);
        let suggestions = analyze(&students).unwrap().suggestions;
        assert!(!suggestions.contains(&MSG_RAISE_CHALLENGE.to_owned()));
    }

    #[test]
    fn rate_formatting_carries_two_decimals() {
        let students = roster(&[95.0, 85.0, 75.0]);
        let d = analyze(&students).unwrap().distribution;
        assert_eq!(d.excellent_rate, "33.33%");
        assert_eq!(d.pass_rate, "100.00%");
    }
}
