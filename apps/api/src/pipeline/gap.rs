//! Skill gap: goal skills the user does not have yet.

use std::collections::BTreeSet;

/// Returns `goal_skills − skills`, case-sensitive, sorted and without duplicates.
///
/// No normalization happens here; the generative resume and conversation steps
/// own any canonicalisation of skill names.
pub fn compute_skills_gap(skills: &[String], goal_skills: &[String]) -> Vec<String> {
    let have: BTreeSet<&str> = skills.iter().map(String::as_str).collect();
    goal_skills
        .iter()
        .map(String::as_str)
        .filter(|goal| !have.contains(goal))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_gap_is_goal_minus_current() {
        let gap = compute_skills_gap(&set(&["python", "sql"]), &set(&["cloud", "python"]));
        assert_eq!(gap, set(&["cloud"]));
    }

    #[test]
    fn test_identical_sets_have_no_gap() {
        let skills = set(&["rust", "sql", "docker"]);
        assert!(compute_skills_gap(&skills, &skills).is_empty());
    }

    #[test]
    fn test_empty_skills_gap_is_all_goals() {
        let goals = set(&["ml", "cloud"]);
        assert_eq!(compute_skills_gap(&[], &goals), set(&["cloud", "ml"]));
    }

    #[test]
    fn test_empty_goals_gives_empty_gap() {
        assert!(compute_skills_gap(&set(&["python"]), &[]).is_empty());
    }

    #[test]
    fn test_gap_is_case_sensitive() {
        let gap = compute_skills_gap(&set(&["Python"]), &set(&["python"]));
        assert_eq!(gap, set(&["python"]));
    }

    #[test]
    fn test_duplicate_goals_collapse() {
        let gap = compute_skills_gap(&[], &set(&["cloud", "cloud", "ml"]));
        assert_eq!(gap, set(&["cloud", "ml"]));
    }
}
