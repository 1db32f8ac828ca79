/// Normalize text for comparison (trim + case-fold)
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Points for one submitted answer.
///
/// Exact match after normalization wins `points_exact`. Otherwise, if fuzzy
/// scoring is enabled, either string containing the other wins `points_fuzzy`.
pub fn score_answer(submitted: &str, correct: &str, points_exact: u32, points_fuzzy: u32) -> u32 {
    let submitted = normalize(submitted);
    if submitted.is_empty() {
        return 0;
    }
    let correct = normalize(correct);
    if submitted == correct {
        return points_exact;
    }
    if points_fuzzy > 0
        && !correct.is_empty()
        && (submitted.contains(&correct) || correct.contains(&submitted))
    {
        return points_fuzzy;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_ignores_case_and_whitespace() {
        assert_eq!(score_answer("  tower OF god ", "Tower of God", 100, 50), 100);
        assert_eq!(score_answer("Tower of God", "  TOWER OF GOD", 100, 50), 100);
    }

    #[test]
    fn test_empty_answer_scores_zero() {
        assert_eq!(score_answer("", "Tower of God", 100, 50), 0);
        assert_eq!(score_answer("   ", "Tower of God", 100, 50), 0);
    }

    #[test]
    fn test_substring_either_direction_is_fuzzy() {
        assert_eq!(score_answer("tower of god season 2", "Tower of God", 100, 50), 50);
        assert_eq!(score_answer("tower", "Tower of God", 100, 50), 50);
    }

    #[test]
    fn test_fuzzy_disabled() {
        assert_eq!(score_answer("tower", "Tower of God", 100, 0), 0);
        assert_eq!(score_answer("tower of god", "Tower of God", 100, 0), 100);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(score_answer("One Piece", "Tower of God", 100, 50), 0);
    }

    #[test]
    fn test_empty_correct_title_never_fuzzy() {
        assert_eq!(score_answer("anything", "", 100, 50), 0);
    }
}
