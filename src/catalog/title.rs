use std::sync::LazyLock;

use regex::Regex;

use super::error::TitleParseError;

// Variable credit options ("(2-4)", "(2 or 4)") don't match.
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+) (\d+[A-Z]*)\. (\S.+) \((\d+)\)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub dept: String,
    pub num: String,
    pub desc: String,
    pub cred: String,
}

/// Parse a normalized title line. The whole line must be one match; anything
/// else is an error and the course is left out rather than half-parsed.
pub fn parse_title(title: &str) -> Result<ParsedTitle, TitleParseError> {
    let line = title.trim();
    let caps = TITLE_RE.captures(line).ok_or_else(|| TitleParseError::NoMatch {
        title: title.to_string(),
    })?;

    Ok(ParsedTitle {
        dept: caps[1].to_string(),
        num: caps[2].to_string(),
        desc: caps[3].trim().to_string(),
        cred: caps[4].to_string(),
    })
}
