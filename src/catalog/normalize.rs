/// Strip layout characters left over from HTML text extraction.
/// Newlines and tabs are dropped, non-breaking spaces become plain spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\n' | '\t'))
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_layout_chars() {
        let raw = "\n\t\tCSE 12.\u{a0}Basic Data Structures (4)\n";
        assert_eq!(normalize_text(raw), "CSE 12. Basic Data Structures (4)");
    }

    #[test]
    fn keeps_ordinary_text() {
        assert_eq!(normalize_text("MATH 20A. Calculus (4)"), "MATH 20A. Calculus (4)");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn idempotent() {
        let raw = "a\u{a0}\u{a0}b\n\tc  d";
        let once = normalize_text(raw);
        assert_eq!(normalize_text(&once), once);
        assert_eq!(once, "a  bc  d");
    }
}
