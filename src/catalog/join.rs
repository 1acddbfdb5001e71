use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CourseRecord;

/// One row of an external course evaluation dataset. Only `course` is
/// required; every other column is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRow {
    pub course: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    pub course: &'a CourseRecord,
    pub rating: &'a RatingRow,
}

impl JoinedRow<'_> {
    /// Catalog columns followed by the rating columns, one flat object.
    pub fn to_json(&self) -> Result<Value> {
        let mut merged = match serde_json::to_value(self.course)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.rating.fields {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(Value::Object(merged))
    }
}

/// Inner join on `course`. Catalog order first, then rating order when a
/// course is rated more than once.
pub fn join_ratings<'a>(courses: &'a [CourseRecord], ratings: &'a [RatingRow]) -> Vec<JoinedRow<'a>> {
    let mut by_course: HashMap<&str, Vec<&RatingRow>> = HashMap::new();
    for r in ratings {
        by_course.entry(r.course.as_str()).or_default().push(r);
    }

    courses
        .iter()
        .flat_map(|c| {
            by_course
                .get(c.course.as_str())
                .into_iter()
                .flatten()
                .copied()
                .map(move |r| JoinedRow { course: c, rating: r })
        })
        .collect()
}

/// Load a ratings dataset: a JSON array of objects with a `course` key.
pub fn load_ratings(path: &Path) -> Result<Vec<RatingRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ratings file {}", path.display()))?;
    let rows: Vec<RatingRow> = serde_json::from_str(&raw)
        .with_context(|| format!("Ratings file {} is not a JSON array of course rows", path.display()))?;
    Ok(rows)
}
