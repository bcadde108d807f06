use crate::fetch::FetchReport;
use crate::permissions::PermissionCheck;
use crate::report::SenderReport;

pub fn format_report(report: &SenderReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Top {} Email Senders:\n", report.top_n));
    for sender in &report.top {
        out.push_str(&format!("{}: {} emails\n", sender.address, sender.count));
    }
    out.push('\n');
    out.push_str(&format!(
        "Total Emails by Top {} Senders: {}\n",
        report.top_n, report.top_total
    ));
    out.push_str(&format!(
        "Total Email Records Processed: {}\n",
        report.total_records
    ));
    if report.records_without_sender > 0 {
        out.push_str(&format!(
            "Records Without Sender: {}\n",
            report.records_without_sender
        ));
    }
    out
}

pub fn format_fetch_summary(report: &FetchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Output directory: {}\n", report.run_dir.display()));
    out.push_str(&format!("Batches written: {}\n", report.pages_written));
    out.push_str(&format!("Records written: {}\n", report.records_written));
    if let Some(status) = report.halted {
        out.push_str(&format!(
            "Stopped early: request failed with status {status}; earlier batches were kept\n"
        ));
    }
    out
}

pub fn format_permission_check(target_user: &str, check: &PermissionCheck) -> String {
    if check.authorized {
        format!("Permission check passed for {target_user} (status {})", check.status)
    } else {
        format!("Permission check failed for {target_user} (status {})", check.status)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{format_fetch_summary, format_permission_check, format_report};
    use crate::fetch::FetchReport;
    use crate::permissions::PermissionCheck;
    use crate::report::{SenderCount, SenderReport};

    #[test]
    fn report_lists_senders_and_totals() {
        let report = SenderReport {
            top_n: 2,
            top: vec![
                SenderCount { address: "b@x.com".into(), count: 6 },
                SenderCount { address: "a@x.com".into(), count: 4 },
            ],
            top_total: 10,
            total_records: 10,
            files_processed: 2,
            records_without_sender: 0,
        };

        assert_eq!(
            format_report(&report),
            "Top 2 Email Senders:\nb@x.com: 6 emails\na@x.com: 4 emails\n\n\
             Total Emails by Top 2 Senders: 10\nTotal Email Records Processed: 10\n"
        );
    }

    #[test]
    fn fetch_summary_flags_early_stop() {
        let report = FetchReport {
            run_dir: PathBuf::from("out/20260101-000000"),
            pages_written: 1,
            records_written: 10,
            files: vec![],
            halted: Some(429),
        };
        let rendered = format_fetch_summary(&report);
        assert!(rendered.contains("Batches written: 1"));
        assert!(rendered.contains("status 429"));
    }

    #[test]
    fn permission_check_wording() {
        let check = PermissionCheck { status: 401, authorized: false };
        assert_eq!(
            format_permission_check("owner@example.com", &check),
            "Permission check failed for owner@example.com (status 401)"
        );
    }
}
