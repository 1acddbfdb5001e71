use thiserror::Error;

/// A title line that is not exactly `DEPT NUM. Description (CREDITS)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleParseError {
    #[error("title does not match `DEPT NUM. Description (N)`: {title:?}")]
    NoMatch { title: String },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The description mentions prerequisites but not as exactly one
    /// `Prerequisites: ...` sentence. Aborts the run.
    #[error("expected one prerequisites sentence for {title:?}, found {matches} in {description:?}")]
    AmbiguousPrerequisites {
        title: String,
        description: String,
        matches: usize,
    },
}
