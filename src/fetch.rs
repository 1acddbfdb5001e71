use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::{self, AssembleOptions, CatalogOutcome, DepartmentCatalog};
use crate::settings::Settings;

/// Raw result of fetching one department's catalog page.
pub struct DepartmentPage {
    pub dept: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub latency_ms: i64,
    pub body: Result<String, FetchFailure>,
}

#[derive(Debug, Clone)]
pub struct FetchFailure {
    /// HTTP status when the server answered, `None` for transport errors.
    pub status: Option<u16>,
    pub error: String,
}

pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub base_url: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl From<&Settings> for FetchOptions {
    fn from(s: &Settings) -> Self {
        FetchOptions {
            base_url: s.base_url.clone(),
            concurrency: s.concurrency.max(1),
            max_retries: s.max_retries,
            backoff_ms: s.backoff_ms,
        }
    }
}

impl DepartmentPage {
    /// Parse the page body into a catalog. A failed fetch becomes
    /// `CatalogOutcome::Unavailable` without touching the parser.
    pub fn into_catalog(self, opts: &AssembleOptions) -> Result<DepartmentCatalog> {
        let outcome = match self.body {
            Ok(html) => CatalogOutcome::Parsed(
                catalog::from_html(&html, opts)
                    .with_context(|| format!("Failed to assemble {} catalog", self.dept))?,
            ),
            Err(f) => CatalogOutcome::Unavailable { status: f.status },
        };
        Ok(DepartmentCatalog {
            dept: self.dept,
            url: self.url,
            fetched_at: self.fetched_at,
            outcome,
        })
    }
}

pub fn catalog_url(base: &str, dept: &str) -> String {
    format!("{}/{}.html", base.trim_end_matches('/'), dept.to_uppercase())
}

/// Fetch department pages concurrently and hand each one to `on_page` as it arrives.
/// A failed page is still delivered, with `body` set to the failure.
pub async fn fetch_departments<F>(
    depts: &[String],
    opts: &FetchOptions,
    mut on_page: F,
) -> Result<FetchStats>
where
    F: FnMut(DepartmentPage) -> Result<()>,
{
    let client = Client::builder()
        .user_agent(concat!("course_catalog/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;
    let semaphore = Arc::new(Semaphore::new(opts.concurrency));
    let total = depts.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<DepartmentPage>(opts.concurrency * 2);

    for dept in depts {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let url = catalog_url(&opts.base_url, dept);
        let dept = dept.to_uppercase();
        let opts = opts.clone();

        tokio::spawn(async move {
            let page = match sem.acquire().await {
                Ok(_permit) => fetch_with_retry(&client, &dept, &url, &opts).await,
                Err(e) => DepartmentPage {
                    dept,
                    url,
                    fetched_at: Utc::now(),
                    latency_ms: 0,
                    body: Err(FetchFailure { status: None, error: e.to_string() }),
                },
            };
            let _ = tx.send(page).await;
        });
    }

    // rx closes once every task has sent
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some(page) = rx.recv().await {
        if page.body.is_ok() {
            ok += 1;
        } else {
            errors += 1;
        }
        debug!(dept = %page.dept, latency_ms = page.latency_ms, "Received catalog page");
        pb.set_message(page.dept.clone());
        on_page(page)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} catalog pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

async fn fetch_with_retry(client: &Client, dept: &str, url: &str, opts: &FetchOptions) -> DepartmentPage {
    let mut attempt = 0;
    loop {
        let start = Instant::now();
        let body = fetch_one(client, url).await;
        let latency_ms = start.elapsed().as_millis() as i64;

        let retry = matches!(&body, Err(f) if should_retry(f.status));
        if !retry || attempt == opts.max_retries {
            if let Err(f) = &body {
                warn!(dept, url, status = ?f.status, "Catalog page unavailable: {}", f.error);
            }
            return DepartmentPage {
                dept: dept.to_string(),
                url: url.to_string(),
                fetched_at: Utc::now(),
                latency_ms,
                body,
            };
        }

        let backoff = backoff_delay(opts.backoff_ms, attempt);
        warn!(
            "Fetch failed for {} (attempt {}/{}), backing off {:.1}s",
            dept,
            attempt + 1,
            opts.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

/// `base_ms * 2^attempt`, saturating instead of overflowing for large retry counts.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

async fn fetch_one(client: &Client, url: &str) -> Result<String, FetchFailure> {
    let response = client.get(url).send().await.map_err(|e| FetchFailure {
        status: None,
        error: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure {
            status: Some(status.as_u16()),
            error: format!("HTTP {}", status),
        });
    }

    response.text().await.map_err(|e| FetchFailure {
        status: Some(status.as_u16()),
        error: e.to_string(),
    })
}

/// Rate limits, gateway errors and dropped connections are worth another try.
fn should_retry(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(code) => matches!(
            StatusCode::from_u16(code),
            Ok(StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT)
        ),
    }
}
