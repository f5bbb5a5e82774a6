//! Display figures for a committed result.
//!
//! Pure functions over the server's committed breakdown; nothing here
//! mutates session state or talks to the network.

use crate::backend::SubmitReceipt;
use crate::types::{Contest, ScoreSummary};

/// Compute the participant-facing summary from a committed result.
///
/// With negative marking, each incorrect attempted answer deducts
/// `negative_marking_value` from the raw correct count. Unattempted
/// questions deduct nothing.
pub fn summarize(contest: &Contest, receipt: &SubmitReceipt) -> ScoreSummary {
    let total_questions = receipt.details.len();
    let attempted = receipt
        .details
        .iter()
        .filter(|d| !d.selected.is_empty())
        .count();
    let correct = receipt.details.iter().filter(|d| d.is_correct).count();
    let incorrect = attempted.saturating_sub(correct);

    let negative_marks = if contest.has_negative_marking {
        incorrect as f64 * contest.negative_marking_value
    } else {
        0.0
    };
    let final_score = correct as f64 - negative_marks;

    let percentage = if total_questions == 0 {
        0.0
    } else {
        round2(final_score / total_questions as f64 * 100.0)
    };

    ScoreSummary {
        total_questions,
        attempted,
        correct,
        incorrect,
        negative_marks,
        final_score,
        percentage,
        time_taken_seconds: receipt.time_taken_seconds,
        violation_count: receipt.violation_count,
        auto_submitted: receipt.auto_submitted,
    }
}

/// Rank of a participant scoring `own` among `scores`.
///
/// Sort all scores descending; the rank is the 1-indexed position of the
/// first score ≤ `own`. Participants with equal scores share the same rank
/// value under this rule.
pub fn rank_of(scores: &[f64], own: f64) -> usize {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    match sorted.iter().position(|s| *s <= own) {
        Some(index) => index + 1,
        None => sorted.len() + 1,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionOutcome;
    use chrono::Utc;

    fn contest(has_negative_marking: bool, negative_marking_value: f64) -> Contest {
        Contest {
            id: "c1".to_string(),
            title: "Mock Test".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            questions: vec![],
            requires_code: false,
            has_negative_marking,
            negative_marking_value,
        }
    }

    fn receipt(correct: usize, incorrect: usize, unattempted: usize) -> SubmitReceipt {
        let mut details = Vec::new();
        for i in 0..correct {
            details.push(QuestionOutcome {
                question_id: format!("c{}", i),
                selected: "right".to_string(),
                correct_answers: vec!["right".to_string()],
                is_correct: true,
            });
        }
        for i in 0..incorrect {
            details.push(QuestionOutcome {
                question_id: format!("i{}", i),
                selected: "wrong".to_string(),
                correct_answers: vec!["right".to_string()],
                is_correct: false,
            });
        }
        for i in 0..unattempted {
            details.push(QuestionOutcome {
                question_id: format!("u{}", i),
                selected: String::new(),
                correct_answers: vec!["right".to_string()],
                is_correct: false,
            });
        }
        SubmitReceipt {
            participation_id: "p1".to_string(),
            details,
            time_taken_seconds: 120,
            violation_count: 0,
            auto_submitted: false,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_negative_marking_example() {
        // 10 questions, 6 correct, 2 incorrect, 2 unattempted, 0.25 penalty.
        let summary = summarize(&contest(true, 0.25), &receipt(6, 2, 2));

        assert_eq!(summary.total_questions, 10);
        assert_eq!(summary.attempted, 8);
        assert_eq!(summary.correct, 6);
        assert_eq!(summary.incorrect, 2);
        assert_eq!(summary.negative_marks, 0.5);
        assert_eq!(summary.final_score, 5.5);
        assert_eq!(summary.percentage, 55.0);
    }

    #[test]
    fn test_no_negative_marking() {
        let summary = summarize(&contest(false, 0.25), &receipt(6, 2, 2));

        assert_eq!(summary.negative_marks, 0.0);
        assert_eq!(summary.final_score, 6.0);
        assert_eq!(summary.percentage, 60.0);
    }

    #[test]
    fn test_unattempted_deduct_nothing() {
        let with_unattempted = summarize(&contest(true, 0.5), &receipt(3, 0, 7));
        assert_eq!(with_unattempted.negative_marks, 0.0);
        assert_eq!(with_unattempted.final_score, 3.0);
    }

    #[test]
    fn test_empty_result() {
        let summary = summarize(&contest(true, 0.25), &receipt(0, 0, 0));
        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn test_rank_with_ties() {
        let scores = [90.0, 80.0, 80.0, 60.0];

        assert_eq!(rank_of(&scores, 90.0), 1);
        // Both 80-scorers share rank 2.
        assert_eq!(rank_of(&scores, 80.0), 2);
        // The next distinct score lands at rank 4, not 3.
        assert_eq!(rank_of(&scores, 60.0), 4);
    }

    #[test]
    fn test_rank_order_of_input_irrelevant() {
        let scores = [60.0, 80.0, 90.0, 80.0];
        assert_eq!(rank_of(&scores, 80.0), 2);
    }

    #[test]
    fn test_rank_of_top_and_absent_scores() {
        let scores = [50.0, 40.0];
        assert_eq!(rank_of(&scores, 70.0), 1);
        // A score below every entry ranks last.
        assert_eq!(rank_of(&scores, 10.0), 3);
        assert_eq!(rank_of(&[], 10.0), 1);
    }

    #[test]
    fn test_fractional_scores_rank() {
        let scores = [5.5, 5.5, 4.75];
        assert_eq!(rank_of(&scores, 5.5), 1);
        assert_eq!(rank_of(&scores, 4.75), 3);
    }
}
