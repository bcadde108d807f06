use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::batch::BatchWriter;
use crate::graph::{PageOutcome, PageSource};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_RECORDS: usize = 18000;
pub const DEFAULT_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub batch_size: usize,
    pub max_records: usize,
    /// Pause between consecutive page requests.
    pub delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl FetchOptions {
    /// Upper bound on requested pages: ceil(max_records / batch_size).
    pub fn page_budget(&self) -> usize {
        self.max_records.div_ceil(self.batch_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub run_dir: PathBuf,
    pub pages_written: usize,
    pub records_written: usize,
    pub files: Vec<PathBuf>,
    /// Status code that stopped the loop early, if any.
    pub halted: Option<u16>,
}

/// Follow continuation links from `first_url`, persisting each page before
/// requesting the next one.
pub async fn fetch_all<S>(
    source: &S,
    first_url: &str,
    options: &FetchOptions,
    writer: &mut BatchWriter,
) -> Result<FetchReport>
where
    S: PageSource + ?Sized,
{
    if options.batch_size == 0 {
        bail!("batch size must be at least 1");
    }

    let mut report = FetchReport {
        run_dir: writer.run_dir().to_path_buf(),
        ..FetchReport::default()
    };
    let page_budget = options.page_budget();
    let mut next_url = Some(first_url.to_string());
    let mut requested = 0usize;

    while let Some(url) = next_url.take() {
        if requested >= page_budget || report.records_written >= options.max_records {
            break;
        }
        if requested > 0 && !options.delay.is_zero() {
            sleep(options.delay).await;
        }

        requested += 1;
        println!("Fetching batch {requested}...");

        let page = match source.fetch_page(&url).await? {
            PageOutcome::Fetched(page) => page,
            PageOutcome::Rejected(status) => {
                warn!("failed to fetch emails: status={}", status);
                report.halted = Some(status.as_u16());
                break;
            }
        };

        let remaining = options.max_records - report.records_written;
        let mut records = page.value;
        if records.len() > remaining {
            debug!(
                "dropping {} records beyond the max_records budget",
                records.len() - remaining
            );
            records.truncate(remaining);
        }

        let path = writer.write_batch(&records)?;
        report.pages_written += 1;
        report.records_written += records.len();
        report.files.push(path);

        next_url = page.next_link.filter(|link| !link.trim().is_empty());
    }

    Ok(report)
}
