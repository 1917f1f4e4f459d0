//! Deterministic scoring of execution outcomes.
//!
//! A pure function of the outcome, the adapter's error markers, and the
//! supplied test cases: identical inputs always produce an identical
//! result. All classification heuristics live here (or on the adapter),
//! never in the isolation backend.

use serde::Serialize;

use crate::language::LanguageAdapter;
use crate::sandbox::ExecutionOutcome;

/// Score awarded to a submission that runs without detected errors.
const BASELINE_SCORE: u8 = 80;

/// Bonus when every supplied test case is satisfied.
const TEST_CASE_BONUS: u8 = 20;

/// Maximum achievable score.
const MAX_SCORE: u8 = 100;

/// Final grade derived from one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradingResult {
    /// Numeric score in `[0, 100]`.
    pub score: u8,
    /// Human-readable feedback for the submitter.
    pub feedback: String,
    /// Diagnostic notes, including flags for human review.
    pub details: Vec<String>,
}

/// Grades a raw execution outcome.
///
/// Policy: a timeout or an error marker in the output scores 0 with an
/// instruction to fix the errors. Output that cannot be classified
/// (process failed, no marker matched) conservatively scores 0 and is
/// flagged in `details` for review. A clean run earns the baseline,
/// plus a capped bonus when every supplied test case's expected text
/// appears in the output.
pub fn score(
    outcome: &ExecutionOutcome,
    adapter: &LanguageAdapter,
    test_cases: &[String],
) -> GradingResult {
    if outcome.timed_out {
        return GradingResult {
            score: 0,
            feedback: format!(
                "{} Your code did not finish within the time limit. Fix your errors and resubmit.",
                tier_text(0)
            ),
            details: vec!["execution was terminated at the timeout".to_string()],
        };
    }

    if adapter.output_indicates_error(&outcome.combined_output) {
        return GradingResult {
            score: 0,
            feedback: format!(
                "{} Your code produced errors when it ran. Fix the errors and try again.",
                tier_text(0)
            ),
            details: vec!["error marker detected in program output".to_string()],
        };
    }

    if !outcome.exited_cleanly {
        // Process failed but no marker matched; do not guess success.
        return GradingResult {
            score: 0,
            feedback: format!(
                "{} Your code exited abnormally. Fix the errors and try again.",
                tier_text(0)
            ),
            details: vec![
                "output could not be classified as success or failure; flagged for review"
                    .to_string(),
            ],
        };
    }

    let mut score = BASELINE_SCORE;
    let mut details = Vec::new();

    let unsatisfied: Vec<&String> = test_cases
        .iter()
        .filter(|case| !outcome.combined_output.contains(case.as_str()))
        .collect();

    let mut explanation = "Your code runs successfully.".to_string();
    if !test_cases.is_empty() {
        if unsatisfied.is_empty() {
            score = (score + TEST_CASE_BONUS).min(MAX_SCORE);
            explanation.push_str(&format!(" All {} test cases passed.", test_cases.len()));
        } else {
            explanation.push_str(&format!(
                " {} of {} test cases passed.",
                test_cases.len() - unsatisfied.len(),
                test_cases.len()
            ));
            for case in unsatisfied {
                details.push(format!("expected output not found: '{case}'"));
            }
        }
    }

    GradingResult {
        score,
        feedback: format!("{} {explanation}", tier_text(score)),
        details,
    }
}

/// Feedback opener for a score range.
fn tier_text(score: u8) -> &'static str {
    match score {
        90..=100 => "Excellent work!",
        80..=89 => "Great job!",
        70..=79 => "Good effort, but there is room for improvement.",
        50..=69 => "Your code needs work.",
        _ => "Your code has significant issues.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Registry;

    fn python_adapter() -> LanguageAdapter {
        Registry::with_defaults().resolve("python").unwrap().clone()
    }

    #[test]
    fn test_clean_run_scores_baseline() {
        let outcome = ExecutionOutcome::completed(0, "hello world\n".to_string());
        let result = score(&outcome, &python_adapter(), &[]);
        assert_eq!(result.score, 80);
        assert!(result.feedback.contains("runs successfully"));
        assert!(result.feedback.starts_with("Great job!"));
        assert!(result.details.is_empty());
    }

    #[test]
    fn test_error_marker_scores_zero() {
        let outcome = ExecutionOutcome::completed(
            1,
            "  File \"main.py\", line 1\nSyntaxError: invalid syntax\n".to_string(),
        );
        let result = score(&outcome, &python_adapter(), &[]);
        assert_eq!(result.score, 0);
        assert!(result.feedback.contains("Fix the errors"));
        assert!(result.feedback.contains("significant issues"));
    }

    #[test]
    fn test_timeout_scores_zero() {
        let outcome = ExecutionOutcome::timed_out("partial output".to_string());
        let result = score(&outcome, &python_adapter(), &[]);
        assert_eq!(result.score, 0);
        assert!(result.feedback.contains("time limit"));
        assert!(result.details[0].contains("timeout"));
    }

    #[test]
    fn test_all_test_cases_satisfied_earns_capped_bonus() {
        let outcome = ExecutionOutcome::completed(0, "sum=42\nproduct=6\n".to_string());
        let cases = vec!["sum=42".to_string(), "product=6".to_string()];
        let result = score(&outcome, &python_adapter(), &cases);
        assert_eq!(result.score, 100);
        assert!(result.feedback.contains("All 2 test cases passed"));
        assert!(result.feedback.starts_with("Excellent work!"));
    }

    #[test]
    fn test_unsatisfied_test_cases_forfeit_bonus() {
        let outcome = ExecutionOutcome::completed(0, "sum=42\n".to_string());
        let cases = vec!["sum=42".to_string(), "product=6".to_string()];
        let result = score(&outcome, &python_adapter(), &cases);
        assert_eq!(result.score, 80);
        assert!(result.feedback.contains("1 of 2 test cases passed"));
        assert_eq!(result.details.len(), 1);
        assert!(result.details[0].contains("product=6"));
    }

    #[test]
    fn test_unclassifiable_outcome_is_flagged_for_review() {
        // Non-zero exit with output that matches no marker.
        let outcome = ExecutionOutcome::completed(137, "killed\n".to_string());
        let result = score(&outcome, &python_adapter(), &[]);
        assert_eq!(result.score, 0);
        assert!(result.details[0].contains("flagged for review"));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let outcome = ExecutionOutcome::completed(0, "ok\n".to_string());
        let adapter = python_adapter();
        let cases = vec!["ok".to_string()];
        let first = score(&outcome, &adapter, &cases);
        let second = score(&outcome, &adapter, &cases);
        assert_eq!(first, second);
    }

    #[test]
    fn test_legitimate_output_containing_marker_scores_zero() {
        // The streams are not separated before classification, so
        // printing the word "Error" is misread as a failure. Pinned
        // behavior of the marker heuristic.
        let outcome = ExecutionOutcome::completed(0, "Error rates: 0.0%\n".to_string());
        let result = score(&outcome, &python_adapter(), &[]);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_tier_text_ranges() {
        assert_eq!(tier_text(100), "Excellent work!");
        assert_eq!(tier_text(90), "Excellent work!");
        assert_eq!(tier_text(80), "Great job!");
        assert_eq!(tier_text(70), "Good effort, but there is room for improvement.");
        assert_eq!(tier_text(50), "Your code needs work.");
        assert_eq!(tier_text(0), "Your code has significant issues.");
    }
}
