use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p.course-name").unwrap());
static DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.course-descriptions").unwrap());

/// Raw title/description text of one course block, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPair {
    pub title: String,
    pub description: String,
}

impl FragmentPair {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        FragmentPair {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Find every `p.course-name` and its next `p.course-descriptions` sibling.
///
/// Keyed by raw title: a title seen twice keeps its first position and
/// takes the later description.
pub fn extract_fragments(html: &str) -> Vec<FragmentPair> {
    let document = Html::parse_document(html);
    let mut pairs: Vec<FragmentPair> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for title_el in document.select(&TITLE_SEL) {
        let Some(desc_el) = title_el
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| DESC_SEL.matches(el))
        else {
            continue;
        };

        let title = element_text(title_el);
        let description = element_text(desc_el);

        match seen.get(&title) {
            Some(&idx) => pairs[idx].description = description,
            None => {
                seen.insert(title.clone(), pairs.len());
                pairs.push(FragmentPair::new(title, description));
            }
        }
    }

    pairs
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}
