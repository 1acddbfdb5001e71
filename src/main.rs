mod catalog;
mod db;
mod fetch;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use catalog::{AssembleOptions, CatalogOutcome, DepartmentCatalog};
use settings::{Settings, DEFAULT_DEPTS};

#[derive(Parser)]
#[command(name = "course_catalog", about = "Course catalog scraper and prerequisite graph")]
struct Cli {
    /// SQLite database path (default: CATALOG_DB_PATH or data/catalog.sqlite)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch department catalog pages, parse them and store the courses
    Run {
        /// Department codes (default: MATH COGS ECE CSE)
        depts: Vec<String>,
        /// Log every unparsable title
        #[arg(short, long)]
        verbose: bool,
    },
    /// Parse a saved catalog page instead of fetching it
    Parse {
        file: PathBuf,
        /// Department the page belongs to
        #[arg(short, long)]
        dept: String,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Stored courses with prerequisite fan-out / fan-in
    Overview {
        #[arg(short, long)]
        dept: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// One course, its prerequisites and the courses that require it
    Show { course: String },
    /// Titles that could not be parsed
    Unparsed {
        #[arg(short, long)]
        dept: Option<String>,
    },
    /// Stored courses as JSON on stdout
    Export {
        #[arg(short, long)]
        dept: Option<String>,
    },
    /// Inner join of stored courses with a ratings JSON file keyed by `course`
    Join {
        ratings: PathBuf,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Per-department fetch status and counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let db_path = cli.db.clone().unwrap_or_else(|| settings.db_path.clone());

    let conn = db::connect(&db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Run { depts, verbose } => {
            let depts: Vec<String> = if depts.is_empty() {
                DEFAULT_DEPTS.iter().map(|d| d.to_string()).collect()
            } else {
                depts
            };
            let opts = AssembleOptions {
                max_course_number: settings.max_course_number,
                verbose,
            };
            println!("Fetching {} department catalogs...", depts.len());

            let fetch_opts = fetch::FetchOptions::from(&settings);
            let mut summaries = Vec::new();
            let stats = fetch::fetch_departments(&depts, &fetch_opts, |page| {
                let dc = page.into_catalog(&opts)?;
                db::save_department(&conn, &dc)?;
                summaries.push(summarize(&dc));
                Ok(())
            })
            .await?;

            summaries.sort();
            for line in &summaries {
                println!("{}", line);
            }
            println!(
                "Done: {} pages ({} ok, {} unavailable).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Parse { file, dept, verbose } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let opts = AssembleOptions {
                max_course_number: settings.max_course_number,
                verbose,
            };
            let parsed = catalog::from_html(&html, &opts)
                .with_context(|| format!("Failed to assemble {}", file.display()))?;
            let dc = DepartmentCatalog {
                dept: dept.to_uppercase(),
                url: file.display().to_string(),
                fetched_at: Utc::now(),
                outcome: CatalogOutcome::Parsed(parsed),
            };
            db::save_department(&conn, &dc)?;
            println!("{}", summarize(&dc));
            Ok(())
        }
        Commands::Overview { dept, limit } => {
            let dept = dept.map(|d| d.to_uppercase());
            let rows = db::load_courses(&conn, dept.as_deref())?;
            if rows.is_empty() {
                println!("No courses found. Run 'run' or 'parse' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:<40} | {:>4} | {:>6} | {:>6} | {:<30}",
                "#", "Course", "Title", "Cred", "Prereq", "Req'd", "Prerequisites"
            );
            println!("{}", "-".repeat(122));
            for (i, c) in rows.iter().take(limit).enumerate() {
                println!(
                    "{:>3} | {:<10} | {:<40} | {:>4} | {:>6} | {:>6} | {:<30}",
                    i + 1,
                    c.course,
                    truncate(&c.desc, 40),
                    c.cred,
                    c.prereq_count,
                    c.prereqed_count,
                    truncate(&c.prereq.join(", "), 30),
                );
            }

            println!("\n{} of {} courses", rows.len().min(limit), rows.len());
            Ok(())
        }
        Commands::Show { course } => {
            let course = course.to_uppercase();
            let Some(record) = db::load_course(&conn, &course)? else {
                println!("{} is not in the catalog.", course);
                return Ok(());
            };
            // Fan-in across every stored department, not just the course's own page.
            let all = db::load_courses(&conn, None)?;
            let lists: Vec<&[String]> = all.iter().map(|c| c.prereq.as_slice()).collect();
            let fan_in = catalog::counts::count_prereqed(&lists, &record.course);
            let required_by: Vec<&str> = all
                .iter()
                .filter(|c| c.prereq.iter().any(|p| p == &record.course))
                .map(|c| c.course.as_str())
                .collect();

            println!("{}. {} ({})", record.course, record.desc, record.cred);
            println!("Prerequisites ({}): {}", record.prereq_count, or_dash(&record.prereq.join(", ")));
            println!("Required by  ({}): {}", fan_in, or_dash(&required_by.join(", ")));
            Ok(())
        }
        Commands::Unparsed { dept } => {
            let dept = dept.map(|d| d.to_uppercase());
            let rows = db::load_unparsed(&conn, dept.as_deref())?;
            for (source, title) in &rows {
                println!("{:<6} {}", source, title);
            }
            println!("\n{} unparsed titles", rows.len());
            Ok(())
        }
        Commands::Export { dept } => {
            let dept = dept.map(|d| d.to_uppercase());
            let rows = db::load_courses(&conn, dept.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(())
        }
        Commands::Join { ratings, limit } => {
            let ratings = catalog::join::load_ratings(&ratings)?;
            let courses = db::load_courses(&conn, None)?;
            let joined = catalog::join::join_ratings(&courses, &ratings);
            info!(
                courses = courses.len(),
                ratings = ratings.len(),
                joined = joined.len(),
                "Joined catalog with ratings"
            );
            if joined.is_empty() {
                warn!("No course appears in both the catalog and the ratings file");
            }

            let out = joined
                .iter()
                .take(limit)
                .map(|j| j.to_json())
                .collect::<anyhow::Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&out)?);
            println!("\n{} joined rows", joined.len());
            Ok(())
        }
        Commands::Stats => {
            let stats = db::get_stats(&conn)?;
            if stats.is_empty() {
                println!("No departments fetched yet.");
                return Ok(());
            }
            println!(
                "{:<6} | {:<11} | {:>7} | {:>8} | {:<25}",
                "Dept", "Status", "Courses", "Unparsed", "Fetched"
            );
            println!("{}", "-".repeat(68));
            for s in &stats {
                let status = match (s.available, s.status) {
                    (true, _) => "ok".to_string(),
                    (false, Some(code)) => format!("HTTP {}", code),
                    (false, None) => "unreachable".to_string(),
                };
                println!(
                    "{:<6} | {:<11} | {:>7} | {:>8} | {:<25}",
                    s.dept, status, s.course_count, s.unparsed_count, s.fetched_at
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn summarize(dc: &DepartmentCatalog) -> String {
    match &dc.outcome {
        CatalogOutcome::Parsed(c) => format!(
            "{:<6} {} courses, {} unparsed titles",
            dc.dept,
            c.courses.len(),
            c.unparsed.len()
        ),
        CatalogOutcome::Unavailable { status: Some(code) } => {
            format!("{:<6} no catalog available (HTTP {})", dc.dept, code)
        }
        CatalogOutcome::Unavailable { status: None } => {
            format!("{:<6} no catalog available (unreachable)", dc.dept)
        }
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
