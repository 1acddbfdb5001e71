use std::sync::LazyLock;

use regex::Regex;

use super::error::CatalogError;

const PREREQ_MARKER: &str = "Prerequisites";

// Text after the colon up to the next sentence boundary or the end of the description.
static PREREQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Prerequisites:(.+?)(?:\.\s|\.$|$)").unwrap());

/// Removed before anything else, in this order.
const ADMIN_PHRASES: &[&str] = &[
    "PNP",
    "P/NP",
    "GPA",
    "May",
    "Recommend",
    "Cognitive Science Honors Program",
];

const PUNCTUATION: &str = r#"!()-[]{};:'"\,<>./?@#$%^&*_~"#;

const MIN_TOKEN_CHARS: usize = 4;

/// Pull the prerequisites sentence out of a normalized description.
///
/// `Ok(None)` when the description never mentions prerequisites. A mention
/// that doesn't resolve to exactly one `Prerequisites: ...` sentence is an
/// error: the one-sentence assumption no longer holds for this catalog.
pub fn extract_prereq_sentence(
    title: &str,
    description: &str,
) -> Result<Option<String>, CatalogError> {
    if !description.contains(PREREQ_MARKER) {
        return Ok(None);
    }

    let mut sentences: Vec<&str> = PREREQ_RE
        .captures_iter(description)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if sentences.len() != 1 {
        return Err(CatalogError::AmbiguousPrerequisites {
            title: title.to_string(),
            description: description.to_string(),
            matches: sentences.len(),
        });
    }

    Ok(sentences.pop().map(str::to_string))
}

/// Split a prerequisites sentence into course identifiers like `"CSE 12"`.
///
/// Best effort: identifiers are uppercase department codes followed by a
/// number, so dropping punctuation and every lowercase letter leaves mostly
/// identifiers and whitespace. A new token starts wherever a letter follows
/// a space. Leftovers shorter than four chars are discarded.
pub fn tokenize_prereqs(sentence: &str) -> Vec<String> {
    let mut text = sentence.to_string();
    for phrase in ADMIN_PHRASES {
        text = text.replace(phrase, "");
    }

    let chars: Vec<char> = text
        .chars()
        .filter(|c| !PUNCTUATION.contains(*c) && !c.is_lowercase())
        .collect();

    let mut starts = vec![0];
    starts.extend((1..chars.len()).filter(|&i| chars[i].is_alphabetic() && chars[i - 1] == ' '));

    starts
        .iter()
        .enumerate()
        .filter_map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(chars.len());
            let token: String = chars[start..end].iter().collect();
            let token = token.trim_end();
            (token.chars().count() >= MIN_TOKEN_CHARS).then(|| token.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        tokenize_prereqs(s)
    }

    #[test]
    fn sentence_stops_at_boundary() {
        let desc = "Prerequisites: CSE 8B or CSE 11. Credit not offered for CSE 12 if taken after CSE 100.";
        let s = extract_prereq_sentence("CSE 12. Basic Data Structures (4)", desc).unwrap();
        assert_eq!(s.as_deref(), Some(" CSE 8B or CSE 11"));
    }

    #[test]
    fn sentence_runs_to_end_without_period() {
        let s = extract_prereq_sentence("t", "Intro. Prerequisites: MATH 20C").unwrap();
        assert_eq!(s.as_deref(), Some(" MATH 20C"));
    }

    #[test]
    fn decimal_is_not_a_boundary() {
        let s = extract_prereq_sentence("t", "Prerequisites: GPA of 3.0 or higher. Restricted.").unwrap();
        assert_eq!(s.as_deref(), Some(" GPA of 3.0 or higher"));
    }

    #[test]
    fn no_marker() {
        let s = extract_prereq_sentence("t", "An introduction to programming.").unwrap();
        assert!(s.is_none());
    }

    #[test]
    fn marker_without_colon_is_fatal() {
        let err = extract_prereq_sentence("t", "Prerequisites vary by quarter.").unwrap_err();
        assert!(matches!(err, CatalogError::AmbiguousPrerequisites { matches: 0, .. }));
    }

    #[test]
    fn two_sentences_are_fatal() {
        let desc = "Prerequisites: CSE 11. Prerequisites: CSE 12.";
        let err = extract_prereq_sentence("t", desc).unwrap_err();
        assert!(matches!(err, CatalogError::AmbiguousPrerequisites { matches: 2, .. }));
    }

    #[test]
    fn simple_disjunction() {
        assert_eq!(tokens(" CSE 8B or CSE 11"), vec!["CSE 8B", "CSE 11"]);
    }

    #[test]
    fn connective_prose_removed() {
        let t = tokens(" COGS 18 or CSE 11 or CSE 8B or DSC 10, and COGS 14B or MATH 11; restricted to majors");
        assert_eq!(t, vec!["COGS 18", "CSE 11", "CSE 8B", "DSC 10", "COGS 14B", "MATH 11"]);
    }

    #[test]
    fn bare_number_stays_with_previous_course() {
        // "31BH" follows a space but starts with a digit, so no new token.
        assert_eq!(tokens(" MATH 20C or 31BH, or consent of instructor"), vec!["MATH 20C  31BH"]);
    }

    #[test]
    fn admin_phrases_removed() {
        let t = tokens(" CSE 100 and GPA of 3.0");
        assert_eq!(t.len(), 1);
        assert!(t[0].starts_with("CSE 100"));
        assert!(!t.iter().any(|x| x.contains("GPA")));

        let t = tokens(" admission to the Cognitive Science Honors Program and COGS 107A");
        assert_eq!(t, vec!["COGS 107A"]);

        assert_eq!(tokens(" P/NP grading only; CSE 11"), vec!["CSE 11"]);
    }

    #[test]
    fn short_leftovers_dropped() {
        assert_eq!(tokens(" department approval (A or B)"), Vec::<String>::new());
    }

    #[test]
    fn empty_input() {
        assert!(tokens("").is_empty());
        assert!(tokens("   ").is_empty());
        assert!(tokens(" none").is_empty());
    }

    #[test]
    fn honors_suffix_kept_whole() {
        assert_eq!(tokens(" MATH 31AH"), vec!["MATH 31AH"]);
    }

    #[test]
    fn compound_listing_is_not_split() {
        // COGS 14AB reads as one course although it names 14A and 14B.
        // Known limitation of the heuristic, kept as-is.
        assert_eq!(tokens(" COGS 14AB"), vec!["COGS 14AB"]);
    }

    #[test]
    fn retokenizing_output_is_stable() {
        let inputs = [
            " CSE 8B or CSE 11",
            " COGS 18 or CSE 11 or CSE 8B or DSC 10, and COGS 14B or MATH 11",
            " MATH 20C or 31BH, or consent of instructor",
            " 100 level standing and CSE 21",
            " ECE 35 and ECE 45; MATH 20D; graduate students may enroll",
        ];
        for input in inputs {
            let first = tokens(input);
            let again = tokens(&first.join(" "));
            assert_eq!(again, first, "unstable for {input:?}");
        }
    }
}
