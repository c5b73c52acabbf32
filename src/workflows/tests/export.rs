use std::sync::Arc;

use super::common::*;
use crate::engine::{QualityPolicy, RejectReason, RunState};
use crate::report::{PromptOption, RecordingSink};
use crate::store::{FieldValue, MemoryStore, Record, RecordId};
use crate::workflows::export::{ExportConfig, IssueKind, WebsiteExport};

fn clean_bills() -> Vec<Record> {
    vec![
        bill("b1", "TX", 1)
            .with_field("Current Bill Status", FieldValue::choice("Enacted"))
            .with_field("Website Blurb", FieldValue::text("Expands\n  postpartum coverage"))
            .with_field("Enacted Date", FieldValue::date(day(2025, 5, 20)))
            .with_field("Intent", FieldValue::choices(["Positive"])),
        bill("b2", "OH", 2)
            .with_field("Current Bill Status", FieldValue::choice("Introduced"))
            .with_field("Intent", FieldValue::choices(["Restrictive"])),
    ]
}

fn problem_bills() -> Vec<Record> {
    let mut bills = clean_bills();
    bills.push(
        bill("b3", "TX", 3).with_field("Date Validation", FieldValue::text("🚫 Future date")),
    );
    bills.push(bill("b4", "OH", 2));
    let mut incomplete = bill("b5", "TX", 5);
    incomplete.set("BillType", FieldValue::text(""));
    bills.push(incomplete);
    bills
}

fn store_with(bills: Vec<Record>) -> MemoryStore {
    MemoryStore::new()
        .with_table("Bills", bills)
        .with_table(
            "Website Exports",
            vec![Record::new(RecordId::from("old1"))
                .with_field("State", FieldValue::text("NV"))],
        )
        .with_table("Export Quality Reports", Vec::new())
}

fn export(store: Arc<MemoryStore>) -> WebsiteExport<MemoryStore> {
    WebsiteExport::new(
        store,
        ExportConfig::default(),
        write_config(50),
        QualityPolicy::default(),
    )
}

#[tokio::test]
async fn declining_the_gate_cancels_without_writes() {
    let store = Arc::new(store_with(problem_bills()));
    let sink = RecordingSink::new();

    let outcome = export(store.clone())
        .run(&decline, &sink, now())
        .await
        .expect("run completes");

    assert_eq!(outcome.state, RunState::Cancelled);
    let kinds: Vec<IssueKind> = outcome.preflight.critical().map(|issue| issue.kind).collect();
    assert_eq!(
        kinds,
        vec![
            IssueKind::FutureDates,
            IssueKind::MissingRequiredFields,
            IssueKind::DuplicateIds
        ]
    );
    assert!(sink.contains("❌ Export cancelled by user due to validation issues."));
    assert_eq!(store.records("Website Exports").len(), 1);
    assert!(store.records("Export Quality Reports").is_empty());
}

#[tokio::test]
async fn accepted_override_exports_valid_bills_and_records_it() {
    let store = Arc::new(store_with(problem_bills()));
    let sink = RecordingSink::new();

    let outcome = export(store.clone())
        .run(&accept, &sink, now())
        .await
        .expect("run completes");

    assert_eq!(outcome.state, RunState::Done);
    assert!(outcome.critical_issues_ignored);
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.metrics.date_errors, 1);
    assert_eq!(outcome.metrics.duplicates, 1);
    assert_eq!(outcome.metrics.failed, 3);

    let refs: Vec<&str> = outcome
        .errors
        .iter()
        .map(|error| error.record_ref.as_str())
        .collect();
    assert_eq!(refs, vec!["TX2025HB3", "OH2025HB2", "TX2025HB5"]);
    match &outcome.errors[0].reason {
        RejectReason::Invalid { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].detail, "Date validation: 🚫 Future date");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(
        outcome.errors[1].reason.summary(),
        "Duplicate BillID (duplicate of b2); only the first instance is exported"
    );

    let exported = store.records("Website Exports");
    assert_eq!(exported.len(), 2);
    assert!(exported.iter().all(|row| row.id != RecordId::from("old1")));
    assert_eq!(
        exported[0].get("WebsiteBlurb"),
        Some(&FieldValue::text("Expands postpartum coverage"))
    );

    assert!(outcome.report_saved);
    let reports = store.records("Export Quality Reports");
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].get("Critical Issues Ignored"),
        Some(&FieldValue::text("YES"))
    );
    assert_eq!(
        reports[0].get("Critical Issues Count"),
        Some(&FieldValue::number(3.0))
    );
    assert!(sink.contains("📊 Website Export Summary"));
}

#[tokio::test]
async fn rejected_bills_still_count_as_complete_when_identified() {
    let mut bills = clean_bills();
    bills[1].set("Date Validation", FieldValue::text("🚫 Future date"));
    let store = Arc::new(store_with(bills));
    let sink = RecordingSink::new();

    let outcome = export(store)
        .run(&accept, &sink, now())
        .await
        .expect("run completes");

    assert_eq!(outcome.metrics.failed, 1);
    assert_eq!(outcome.metrics.complete_records, 2);
    let quality = outcome.quality.expect("quality scored");
    assert!((quality.components.completeness - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn clean_tables_skip_the_confirmation_gate() {
    let store = Arc::new(store_with(clean_bills()));
    let sink = RecordingSink::new();
    let unexpected = |_: &str, _: &[PromptOption]| -> bool {
        panic!("no critical issues should mean no prompt")
    };

    let outcome = export(store.clone())
        .run(&unexpected, &sink, now())
        .await
        .expect("run completes");

    assert_eq!(outcome.state, RunState::Done);
    assert!(!outcome.preflight.has_critical());
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.metrics.exported_blurbs, 1);
    assert!(sink.contains("No critical issues found. Ready to export!"));

    let reports = store.records("Export Quality Reports");
    assert_eq!(
        reports[0].get("Critical Issues Ignored"),
        Some(&FieldValue::text("NO"))
    );
    assert_eq!(reports[0].get("States Count"), Some(&FieldValue::number(2.0)));
}

#[tokio::test]
async fn failed_destination_write_skips_the_quality_record() {
    let store = FlakyStore::new(store_with(clean_bills()), "Website Exports", 0);
    let sink = RecordingSink::new();
    let export = WebsiteExport::new(
        Arc::clone(&store),
        ExportConfig::default(),
        write_config(50),
        QualityPolicy::default(),
    );

    let outcome = export
        .run(&accept, &sink, now())
        .await
        .expect("write failures are reported, not raised");

    let write = outcome.write.expect("a write was attempted");
    assert!(!write.is_complete());
    assert!(!outcome.report_saved);
    assert!(store.inner.records("Export Quality Reports").is_empty());
    assert!(sink.contains("❌ Error creating export records"));
    assert!(sink.contains("📊 Website Export Summary"));
}
