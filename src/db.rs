use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::catalog::{CatalogOutcome, CourseRecord, DepartmentCatalog};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS departments (
            dept           TEXT PRIMARY KEY,
            url            TEXT NOT NULL,
            available      BOOLEAN NOT NULL,
            status         INTEGER,
            course_count   INTEGER NOT NULL DEFAULT 0,
            unparsed_count INTEGER NOT NULL DEFAULT 0,
            fetched_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS courses (
            source_dept    TEXT NOT NULL REFERENCES departments(dept),
            position       INTEGER NOT NULL,
            course         TEXT NOT NULL,
            dept           TEXT NOT NULL,
            num            TEXT NOT NULL,
            \"desc\"         TEXT NOT NULL,
            cred           TEXT NOT NULL,
            prereq         TEXT NOT NULL,
            prereq_count   INTEGER NOT NULL,
            prereqed_count INTEGER NOT NULL,
            PRIMARY KEY (source_dept, position)
        );
        CREATE INDEX IF NOT EXISTS idx_courses_course ON courses(course);

        CREATE TABLE IF NOT EXISTS unparsed_titles (
            id          INTEGER PRIMARY KEY,
            source_dept TEXT NOT NULL REFERENCES departments(dept),
            title       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_unparsed_source ON unparsed_titles(source_dept);
        ",
    )?;
    Ok(())
}

/// Record one department's outcome. A parsed catalog replaces the
/// department's previous courses; an unavailable page only updates its status.
///
/// Rows are keyed by page and position, so a course listed by two departments
/// (or twice on one page) is stored once per listing.
pub fn save_department(conn: &Connection, catalog: &DepartmentCatalog) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let (available, status, courses, unparsed) = match &catalog.outcome {
            CatalogOutcome::Parsed(c) => (true, None, c.courses.len(), c.unparsed.len()),
            CatalogOutcome::Unavailable { status } => (false, *status, 0, 0),
        };

        // Existing course/unparsed counts stay as they were when the page is unavailable.
        tx.execute(
            "INSERT INTO departments (dept, url, available, status, course_count, unparsed_count, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(dept) DO UPDATE SET
                url = excluded.url,
                available = excluded.available,
                status = excluded.status,
                fetched_at = excluded.fetched_at,
                course_count = CASE WHEN excluded.available THEN excluded.course_count ELSE course_count END,
                unparsed_count = CASE WHEN excluded.available THEN excluded.unparsed_count ELSE unparsed_count END",
            rusqlite::params![
                catalog.dept,
                catalog.url,
                available,
                status,
                courses as i64,
                unparsed as i64,
                catalog.fetched_at.to_rfc3339(),
            ],
        )?;

        if let CatalogOutcome::Parsed(parsed) = &catalog.outcome {
            tx.execute("DELETE FROM courses WHERE source_dept = ?1", [&catalog.dept])?;
            tx.execute("DELETE FROM unparsed_titles WHERE source_dept = ?1", [&catalog.dept])?;

            let mut c_stmt = tx.prepare(
                "INSERT INTO courses
                 (course, source_dept, position, dept, num, \"desc\", cred, prereq, prereq_count, prereqed_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (position, c) in parsed.courses.iter().enumerate() {
                c_stmt.execute(rusqlite::params![
                    c.course,
                    catalog.dept,
                    position as i64,
                    c.dept,
                    c.num,
                    c.desc,
                    c.cred,
                    serde_json::to_string(&c.prereq)?,
                    c.prereq_count as i64,
                    c.prereqed_count as i64,
                ])?;
            }

            let mut u_stmt =
                tx.prepare("INSERT INTO unparsed_titles (source_dept, title) VALUES (?1, ?2)")?;
            for title in &parsed.unparsed {
                u_stmt.execute(rusqlite::params![catalog.dept, title])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

const COURSE_COLUMNS: &str =
    "dept, num, \"desc\", cred, prereq, course, prereq_count, prereqed_count";

/// Stored courses in page order, optionally limited to one department page.
pub fn load_courses(conn: &Connection, dept: Option<&str>) -> Result<Vec<CourseRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_COLUMNS}
         FROM courses
         WHERE ?1 IS NULL OR source_dept = ?1
         ORDER BY source_dept, position"
    ))?;
    let rows = stmt
        .query_map([dept], read_course)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(decode_prereq).collect()
}

/// First listing of a course, by department then page position.
pub fn load_course(conn: &Connection, course: &str) -> Result<Option<CourseRecord>> {
    conn.query_row(
        &format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE course = ?1
             ORDER BY source_dept, position LIMIT 1"
        ),
        [course],
        read_course,
    )
    .optional()?
    .map(decode_prereq)
    .transpose()
}

// prereq is a JSON column, decoded outside the row closure so the error keeps context.
fn read_course(row: &rusqlite::Row) -> rusqlite::Result<(CourseRecord, String)> {
    Ok((
        CourseRecord {
            dept: row.get(0)?,
            num: row.get(1)?,
            desc: row.get(2)?,
            cred: row.get(3)?,
            prereq: Vec::new(),
            course: row.get(5)?,
            prereq_count: row.get::<_, i64>(6)? as usize,
            prereqed_count: row.get::<_, i64>(7)? as usize,
        },
        row.get(4)?,
    ))
}

fn decode_prereq((mut course, prereq): (CourseRecord, String)) -> Result<CourseRecord> {
    course.prereq = serde_json::from_str(&prereq)
        .with_context(|| format!("Bad prereq column for {}", course.course))?;
    Ok(course)
}

pub fn load_unparsed(conn: &Connection, dept: Option<&str>) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT source_dept, title FROM unparsed_titles
         WHERE ?1 IS NULL OR source_dept = ?1
         ORDER BY source_dept, id",
    )?;
    let rows = stmt
        .query_map([dept], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct DepartmentStats {
    pub dept: String,
    pub available: bool,
    pub status: Option<u16>,
    pub course_count: i64,
    pub unparsed_count: i64,
    pub fetched_at: String,
}

pub fn get_stats(conn: &Connection) -> Result<Vec<DepartmentStats>> {
    let mut stmt = conn.prepare(
        "SELECT dept, available, status, course_count, unparsed_count, fetched_at
         FROM departments ORDER BY dept",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DepartmentStats {
                dept: row.get(0)?,
                available: row.get(1)?,
                status: row.get(2)?,
                course_count: row.get(3)?,
                unparsed_count: row.get(4)?,
                fetched_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
