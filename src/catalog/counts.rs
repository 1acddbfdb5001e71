use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

// A course-number-like word: digits, optionally followed by letters ("8", "108", "31AH").
static COURSE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\w*").unwrap());

/// Fan-out: how many course-number-like words a prerequisite list holds.
/// `"MATH 20C  31BH"` counts twice.
pub fn count_prereq(prereqs: &[String]) -> usize {
    prereqs
        .iter()
        .map(|p| COURSE_NUMBER_RE.find_iter(p).count())
        .sum()
}

/// Fan-in: how many times `target` appears verbatim across all lists.
pub fn count_prereqed(prereq_lists: &[&[String]], target: &str) -> usize {
    prereq_lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|p| p.as_str() == target)
        .count()
}

/// Fan-in for every course of a columnar view (`courses[i]` owns `prereq_lists[i]`).
///
/// Counting is advisory. If the two columns disagree in length the view is
/// inconsistent and every course gets 0 instead of an error.
pub fn prereqed_counts(courses: &[&str], prereq_lists: &[&[String]]) -> Vec<usize> {
    if courses.len() != prereq_lists.len() {
        warn!(
            courses = courses.len(),
            prereq_lists = prereq_lists.len(),
            "Ragged course collection, fan-in counts set to 0"
        );
        return vec![0; courses.len()];
    }

    let index = ReverseIndex::build(prereq_lists);
    courses.iter().map(|c| index.count(c)).collect()
}

/// Identifier → number of listings. Same counts as `count_prereqed`
/// without rescanning every list per course.
struct ReverseIndex<'a> {
    occurrences: HashMap<&'a str, usize>,
}

impl<'a> ReverseIndex<'a> {
    fn build(prereq_lists: &[&'a [String]]) -> Self {
        let mut occurrences = HashMap::new();
        for p in prereq_lists.iter().flat_map(|list| list.iter()) {
            *occurrences.entry(p.as_str()).or_insert(0) += 1;
        }
        ReverseIndex { occurrences }
    }

    fn count(&self, target: &str) -> usize {
        self.occurrences.get(target).copied().unwrap_or(0)
    }
}
