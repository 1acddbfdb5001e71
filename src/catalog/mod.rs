pub mod counts;
pub mod error;
pub mod html;
pub mod join;
pub mod normalize;
pub mod prereq;
pub mod title;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use error::CatalogError;
pub use html::FragmentPair;

use normalize::normalize_text;

/// One parsed catalog entry. Field names are the output column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub dept: String,
    pub num: String,
    pub desc: String,
    pub cred: String,
    /// Identifiers of other courses, e.g. `"CSE 12"`. They may point outside the batch.
    pub prereq: Vec<String>,
    pub course: String,
    pub prereq_count: usize,
    pub prereqed_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub courses: Vec<CourseRecord>,
    /// Normalized titles that didn't parse. Diagnostics only.
    pub unparsed: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum CatalogOutcome {
    Parsed(Catalog),
    /// The page could not be fetched; nothing was parsed for this department.
    Unavailable { status: Option<u16> },
}

#[derive(Debug, Clone)]
pub struct DepartmentCatalog {
    pub dept: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub outcome: CatalogOutcome,
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Courses whose number (letters stripped) is above this are dropped.
    pub max_course_number: u32,
    /// Log unparsed titles at warn instead of debug.
    pub verbose: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        AssembleOptions {
            max_course_number: 189,
            verbose: false,
        }
    }
}

enum FragmentOutcome {
    Course(CourseRecord),
    Unparsed(String),
}

/// Extract and assemble the courses of one catalog page.
pub fn from_html(html: &str, opts: &AssembleOptions) -> Result<Catalog, CatalogError> {
    let pairs = html::extract_fragments(html);
    assemble(&pairs, opts)
}

/// Turn raw fragment pairs into course records.
///
/// Pass 1 parses every pair independently (in parallel, order preserved).
/// Out-of-range course numbers are then dropped, and pass 2 computes fan-in
/// over what is left.
pub fn assemble(pairs: &[FragmentPair], opts: &AssembleOptions) -> Result<Catalog, CatalogError> {
    let outcomes: Vec<Result<FragmentOutcome, CatalogError>> =
        pairs.par_iter().map(|p| parse_fragment(p, opts)).collect();

    let mut catalog = Catalog::default();
    for outcome in outcomes {
        match outcome? {
            FragmentOutcome::Course(record) => catalog.courses.push(record),
            FragmentOutcome::Unparsed(title) => catalog.unparsed.push(title),
        }
    }

    let parsed = catalog.courses.len();
    catalog
        .courses
        .retain(|c| within_range(&c.num, opts.max_course_number));
    debug!(
        parsed,
        kept = catalog.courses.len(),
        unparsed = catalog.unparsed.len(),
        "Assembled catalog page"
    );

    fill_prereqed_counts(&mut catalog.courses);
    Ok(catalog)
}

fn parse_fragment(pair: &FragmentPair, opts: &AssembleOptions) -> Result<FragmentOutcome, CatalogError> {
    let title = normalize_text(&pair.title);
    let parsed = match title::parse_title(&title) {
        Ok(t) => t,
        Err(e) => {
            if opts.verbose {
                warn!("Ignored unparsable title: {}", e);
            } else {
                debug!("Ignored unparsable title: {}", e);
            }
            return Ok(FragmentOutcome::Unparsed(title));
        }
    };

    let description = normalize_text(&pair.description);
    let prereq = match prereq::extract_prereq_sentence(&title, &description)? {
        Some(sentence) => prereq::tokenize_prereqs(&sentence),
        None => Vec::new(),
    };

    let course = format!("{} {}", parsed.dept, parsed.num);
    let prereq_count = counts::count_prereq(&prereq);

    Ok(FragmentOutcome::Course(CourseRecord {
        dept: parsed.dept,
        num: parsed.num,
        desc: parsed.desc,
        cred: parsed.cred,
        prereq,
        course,
        prereq_count,
        prereqed_count: 0,
    }))
}

/// `"189L"` → 189. Numbers without digits never pass.
fn within_range(num: &str, max: u32) -> bool {
    let digits: String = num.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().is_ok_and(|n| n <= max)
}

fn fill_prereqed_counts(courses: &mut [CourseRecord]) {
    let fan_in = {
        let ids: Vec<&str> = courses.iter().map(|c| c.course.as_str()).collect();
        let lists: Vec<&[String]> = courses.iter().map(|c| c.prereq.as_slice()).collect();
        counts::prereqed_counts(&ids, &lists)
    };
    for (course, n) in courses.iter_mut().zip(fan_in) {
        course.prereqed_count = n;
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> AssembleOptions {
        AssembleOptions::default()
    }

    fn pair(title: &str, desc: &str) -> FragmentPair {
        FragmentPair::new(title, desc)
    }

    #[test]
    fn cse_12_end_to_end() {
        let pairs = [pair(
            "CSE 12. Basic Data Structures (4)",
            "Prerequisites: CSE 8B or CSE 11. Credit not offered...",
        )];
        let catalog = assemble(&pairs, &opts()).unwrap();
        assert_eq!(catalog.courses.len(), 1);
        let c = &catalog.courses[0];
        assert_eq!(c.dept, "CSE");
        assert_eq!(c.num, "12");
        assert_eq!(c.desc, "Basic Data Structures");
        assert_eq!(c.cred, "4");
        assert_eq!(c.course, "CSE 12");
        assert_eq!(c.prereq, vec!["CSE 8B", "CSE 11"]);
        assert_eq!(c.prereq_count, 2);
        assert_eq!(c.prereqed_count, 0);
    }

    #[test]
    fn number_filter() {
        let pairs = [
            pair("COGS 189. Brain Computer Interfaces (4)", "Topics."),
            pair("COGS 189L. Lab (2)", "Lab."),
            pair("COGS 191. Honors Thesis (4)", "Thesis."),
        ];
        let catalog = assemble(&pairs, &opts()).unwrap();
        let kept: Vec<&str> = catalog.courses.iter().map(|c| c.num.as_str()).collect();
        assert_eq!(kept, vec!["189", "189L"]);
    }

    #[test]
    fn range_check() {
        assert!(within_range("1", 189));
        assert!(within_range("8GS", 189));
        assert!(within_range("189L", 189));
        assert!(!within_range("191", 189));
        assert!(!within_range("ABC", 189));
        assert!(!within_range("99999999999999999999", 189));
    }

    #[test]
    fn unparsed_titles_recorded_not_fatal() {
        let pairs = [
            pair("CSE 198. Directed Group Study (2 or 4)", "Study."),
            pair("\tCSE 3. Fluency\u{a0}in Information Technology (4)\n", "Intro."),
        ];
        let catalog = assemble(&pairs, &opts()).unwrap();
        assert_eq!(catalog.unparsed, vec!["CSE 198. Directed Group Study (2 or 4)"]);
        assert_eq!(catalog.courses.len(), 1);
        assert_eq!(catalog.courses[0].desc, "Fluency in Information Technology");
    }

    #[test]
    fn ambiguous_prerequisites_abort() {
        let pairs = [
            pair("CSE 12. Basic Data Structures (4)", "Prerequisites: CSE 11."),
            pair("CSE 30. Systems Programming (4)", "Prerequisites vary."),
        ];
        let err = assemble(&pairs, &opts()).unwrap_err();
        match err {
            CatalogError::AmbiguousPrerequisites { title, matches, .. } => {
                assert_eq!(title, "CSE 30. Systems Programming (4)");
                assert_eq!(matches, 0);
            }
        }
    }

    #[test]
    fn fan_in_over_filtered_collection() {
        let pairs = [
            pair("COGS 108. Data Science in Practice (4)", "Prerequisites: COGS 18 or CSE 11."),
            pair("COGS 118A. Supervised Machine Learning (4)", "Prerequisites: COGS 108 and MATH 18."),
            pair("COGS 118C. Neural Signal Processing (4)", "Prerequisites: COGS 108."),
            pair("COGS 180. Decision Making (4)", "Prerequisites: COGS 108."),
            pair("COGS 189. Brain Computer Interfaces (4)", "Prerequisites: COGS 108 or COGS 118A."),
            pair("COGS 190A. Honors Studies (4)", "Prerequisites: COGS 108."),
        ];
        let catalog = assemble(&pairs, &opts()).unwrap();
        assert_eq!(catalog.courses.len(), 5);
        let cogs108 = &catalog.courses[0];
        assert_eq!(cogs108.course, "COGS 108");
        assert_eq!(cogs108.prereqed_count, 4);
        assert_eq!(catalog.courses[1].prereqed_count, 1);
        assert_eq!(catalog.courses[1].prereq_count, 2);
    }

    #[test]
    fn duplicate_courses_pass_through() {
        let pairs = [
            pair("CSE 12. Basic Data Structures (4)", "Prerequisites: CSE 11."),
            pair("CSE 12. Basic Data Structures (4)", "Prerequisites: CSE 8B."),
        ];
        let catalog = assemble(&pairs, &opts()).unwrap();
        assert_eq!(catalog.courses.len(), 2);
        assert!(catalog.courses.iter().all(|c| c.course == "CSE 12"));
        assert_eq!(catalog.courses[1].prereq, vec!["CSE 8B"]);
    }

    #[test]
    fn cse_fixture_page() {
        let html = std::fs::read_to_string("tests/fixtures/cse.html").unwrap();
        let catalog = from_html(&html, &opts()).unwrap();

        assert_eq!(catalog.unparsed, vec!["CSE 198. Directed Group Study (2 or 4)"]);
        let rows: Vec<(&str, usize, usize)> = catalog
            .courses
            .iter()
            .map(|c| (c.course.as_str(), c.prereq_count, c.prereqed_count))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("CSE 8A", 0, 1),
                ("CSE 8B", 1, 2),
                ("CSE 11", 0, 2),
                ("CSE 12", 2, 0),
                ("CSE 15L", 2, 0),
            ]
        );
        assert_eq!(catalog.courses[3].desc, "Basic Data Structures and Object-Oriented Design");
        assert_eq!(catalog.courses[4].prereq, vec!["CSE 8B", "CSE 11"]);
    }

    #[test]
    fn columns_serialize_with_fixed_names() {
        let catalog = assemble(&[pair("CSE 12. Basic Data Structures (4)", "None.")], &opts()).unwrap();
        let value = serde_json::to_value(&catalog.courses[0]).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for col in ["dept", "num", "desc", "cred", "prereq", "course", "prereq_count", "prereqed_count"] {
            assert!(keys.contains(&col), "missing column {col}");
        }
        assert_eq!(keys.len(), 8);
    }
}
