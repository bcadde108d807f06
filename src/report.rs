use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCount {
    pub address: String,
    pub count: usize,
}

/// Sender counts accumulated over a directory of batch files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderTally {
    counts: HashMap<String, usize>,
    pub files_processed: usize,
    pub total_records: usize,
    pub records_without_sender: usize,
}

impl SenderTally {
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut tally = Self::default();
        for file_path in collect_json_files(dir)? {
            tally.add_file(&file_path)?;
        }
        Ok(tally)
    }

    pub fn add_file(&mut self, file_path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(file_path)
            .with_context(|| format!("read batch file {}", file_path.display()))?;
        let payload: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse batch file {}", file_path.display()))?;
        let Value::Array(records) = payload else {
            return Err(anyhow!(
                "expected a JSON array of records in {}",
                file_path.display()
            ));
        };

        debug!("{}: {} records", file_path.display(), records.len());
        self.add_records(&records);
        self.files_processed += 1;
        Ok(())
    }

    pub fn add_records(&mut self, records: &[Value]) {
        for record in records {
            self.total_records += 1;
            match sender_address(record) {
                Some(address) => *self.counts.entry(address.to_string()).or_insert(0) += 1,
                None => self.records_without_sender += 1,
            }
        }
    }

    /// Highest counts first; equal counts ordered by address.
    pub fn top(&self, n: usize) -> Vec<SenderCount> {
        let mut ranked: Vec<SenderCount> = self
            .counts
            .iter()
            .map(|(address, count)| SenderCount {
                address: address.clone(),
                count: *count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.address.cmp(&b.address)));
        ranked.truncate(n);
        ranked
    }

    pub fn summarize(&self, top_n: usize) -> SenderReport {
        let top = self.top(top_n);
        SenderReport {
            top_n,
            top_total: top.iter().map(|sender| sender.count).sum(),
            top,
            total_records: self.total_records,
            files_processed: self.files_processed,
            records_without_sender: self.records_without_sender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub top_n: usize,
    pub top: Vec<SenderCount>,
    pub top_total: usize,
    pub total_records: usize,
    pub files_processed: usize,
    pub records_without_sender: usize,
}

/// `sender.emailAddress.address` exactly as the server sent it. Blank or
/// non-string values do not count as a sender.
pub fn sender_address(record: &Value) -> Option<&str> {
    record
        .pointer("/sender/emailAddress/address")
        .and_then(Value::as_str)
        .filter(|address| !address.is_empty())
}

pub fn build_report(dir: &Path, top_n: usize) -> Result<SenderReport> {
    Ok(SenderTally::from_dir(dir)?.summarize(top_n))
}

fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!(
            "input directory does not exist or is not a directory: {}",
            dir.display()
        ));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("read input directory {}", dir.display()))?
    {
        let entry_path = entry?.path();
        if entry_path.is_file()
            && entry_path.extension().and_then(|ext| ext.to_str()) == Some("json")
        {
            files.push(entry_path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::{build_report, sender_address, SenderCount, SenderTally};

    fn temp_dir() -> PathBuf {
        let root = std::env::temp_dir().join(format!("mailtally-report-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    fn from(address: &str) -> Value {
        json!({ "sender": { "emailAddress": { "name": "x", "address": address } } })
    }

    #[test]
    fn ties_break_by_address() {
        let mut tally = SenderTally::default();
        tally.add_records(&[from("zed@x.com"), from("amy@x.com"), from("bob@x.com"), from("bob@x.com")]);

        let top = tally.top(3);
        assert_eq!(
            top,
            vec![
                SenderCount { address: "bob@x.com".into(), count: 2 },
                SenderCount { address: "amy@x.com".into(), count: 1 },
                SenderCount { address: "zed@x.com".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn records_without_sender_still_count_toward_total() {
        let mut tally = SenderTally::default();
        tally.add_records(&[from("a@x.com"), json!({ "id": "no-sender" }), json!(42)]);

        assert_eq!(tally.total_records, 3);
        assert_eq!(tally.records_without_sender, 2);
        let summed: usize = tally.top(usize::MAX).iter().map(|s| s.count).sum();
        assert_eq!(summed + tally.records_without_sender, tally.total_records);
    }

    #[test]
    fn addresses_are_counted_verbatim() {
        let mut tally = SenderTally::default();
        tally.add_records(&[from("Alice@Example.com"), from("alice@example.com")]);

        assert_eq!(
            tally.top(10),
            vec![
                SenderCount { address: "Alice@Example.com".into(), count: 1 },
                SenderCount { address: "alice@example.com".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn address_survives_unexpected_sibling_fields() {
        let record = json!({
            "id": 7,
            "sender": { "emailAddress": { "name": 5, "address": "bob@x.com" } }
        });
        assert_eq!(sender_address(&record), Some("bob@x.com"));

        let mut tally = SenderTally::default();
        tally.add_records(&[record]);
        assert_eq!(tally.records_without_sender, 0);
        assert_eq!(tally.top(1)[0].address, "bob@x.com");
    }

    #[test]
    fn blank_or_missing_sender_has_no_address() {
        assert_eq!(sender_address(&json!({ "id": "m1" })), None);
        assert_eq!(sender_address(&json!({ "sender": null })), None);
        assert_eq!(sender_address(&json!({ "sender": { "emailAddress": { "address": "" } } })), None);
        assert_eq!(sender_address(&json!({ "sender": { "emailAddress": { "address": 3 } } })), None);
        assert_eq!(sender_address(&json!("not an object")), None);
    }

    #[test]
    fn reads_only_json_files_without_recursing() {
        let dir = temp_dir();
        std::fs::write(dir.join("b_1.json"), json!([from("a@x.com")]).to_string()).unwrap();
        std::fs::write(dir.join("notes.txt"), "not json").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested").join("b_2.json"), json!([from("a@x.com")]).to_string())
            .unwrap();

        let report = build_report(&dir, 10).expect("build report");
        assert_eq!(report.files_processed, 1);
        assert_eq!(report.total_records, 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn non_array_file_is_an_error() {
        let dir = temp_dir();
        std::fs::write(dir.join("bad.json"), r#"{"value": []}"#).unwrap();

        let err = build_report(&dir, 10).unwrap_err();
        assert!(err.to_string().contains("bad.json"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("mailtally-absent-{}", Uuid::new_v4()));
        assert!(build_report(&dir, 5).is_err());
    }

    #[test]
    fn summary_totals_top_senders() {
        let mut tally = SenderTally::default();
        tally.add_records(&[from("a@x.com"), from("a@x.com"), from("b@x.com"), from("c@x.com")]);

        let report = tally.summarize(2);
        assert_eq!(report.top.len(), 2);
        assert_eq!(report.top_total, 3);
        assert_eq!(report.total_records, 4);
    }
}
