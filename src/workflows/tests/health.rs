use std::sync::Arc;

use super::common::*;
use crate::engine::QualityPolicy;
use crate::report::RecordingSink;
use crate::store::{FieldValue, MemoryStore, Record, RecordId};
use crate::workflows::health::{HealthCheckRequest, HealthConfig, HealthMonitor, POST_IMPORT_CHECK};

fn bills() -> Vec<Record> {
    vec![
        bill("b1", "TX", 1)
            .with_field("Current Bill Status", FieldValue::choice("Enacted"))
            .with_field("Enacted Date", FieldValue::date(day(2025, 6, 1)))
            .with_field("Website Blurb", FieldValue::text("Protects clinic access"))
            .with_field("Policy Categories", FieldValue::choices(["Abortion"]))
            .with_field("Import Date", FieldValue::date(day(2025, 6, 10))),
        bill("b2", "OH", 2)
            .with_field("Current Bill Status", FieldValue::choice("Vetoed"))
            .with_field("Last Action", FieldValue::date(day(2025, 6, 12)))
            .with_field("Policy Categories", FieldValue::choices(["Contraception"])),
        bill("b3", "OH", 3)
            .with_field("Current Bill Status", FieldValue::choice("Introduced"))
            .with_field("Import Date", FieldValue::date(day(2025, 5, 1))),
    ]
}

fn previous_check(date: chrono::NaiveDate) -> Record {
    Record::new(RecordId::from("mon1"))
        .with_field("Check Date", FieldValue::date(date))
        .with_field("Last Export Date", FieldValue::date(day(2025, 6, 1)))
}

fn monitor(store: Arc<MemoryStore>) -> HealthMonitor<MemoryStore> {
    HealthMonitor::new(store, HealthConfig::default(), QualityPolicy::default())
}

#[tokio::test]
async fn weekly_check_compares_against_the_previous_run() {
    let store = Arc::new(
        MemoryStore::new()
            .with_table("Bills", bills())
            .with_table("System Monitor", vec![previous_check(day(2025, 6, 5))])
            .with_table("Website Exports", vec![Record::new(RecordId::from("x1"))])
            .with_table("StateNet Raw Import", Vec::new()),
    );
    let sink = RecordingSink::new();

    let outcome = monitor(store.clone())
        .run(&HealthCheckRequest::default(), &sink, now())
        .await
        .expect("health check runs");

    assert_eq!(outcome.trend.days_since_last_check, 10);
    assert_eq!(outcome.metrics.total, 3);
    assert_eq!(outcome.metrics.new_bills, 1);
    assert_eq!(outcome.metrics.status_changes, 1);
    assert_eq!(outcome.metrics.missing_blurbs.len(), 1);
    assert_eq!(outcome.metrics.missing_categories, 1);
    assert_eq!(outcome.last_export_date, Some(day(2025, 6, 15)));
    assert_eq!(outcome.import_records, None);

    let checks = store.records("System Monitor");
    assert_eq!(checks.len(), 2);
    let created = &checks[1];
    assert_eq!(Some(&created.id), outcome.record_id.as_ref());
    assert_eq!(
        created.get("Days Since Last Check"),
        Some(&FieldValue::number(10.0))
    );
    assert_eq!(created.get("Check Type"), Some(&FieldValue::text("Weekly")));
    assert_eq!(
        created.get("Grade"),
        Some(&FieldValue::text(outcome.quality.grade.clone()))
    );

    assert!(outcome.report.contains("DATABASE OVERVIEW:"));
    assert!(outcome.report.contains("• OH-HB2 (Last action: 2025-06-12)"));
    assert!(sink.contains("RECOMMENDED ACTIONS:"));
}

#[tokio::test]
async fn first_post_import_check_uses_the_default_window() {
    let import_rows = vec![
        Record::new(RecordId::from("i1")).with_field("Import Batch", FieldValue::text("batch-7")),
        Record::new(RecordId::from("i2")).with_field("Import Batch", FieldValue::text("batch-7")),
        Record::new(RecordId::from("i3")).with_field("Import Batch", FieldValue::text("batch-6")),
    ];
    let store = Arc::new(
        MemoryStore::new()
            .with_table("Bills", bills())
            .with_table("System Monitor", Vec::new())
            .with_table("Website Exports", Vec::new())
            .with_table("StateNet Raw Import", import_rows),
    );
    let request = HealthCheckRequest {
        check_type: POST_IMPORT_CHECK.to_string(),
        related_import: Some("batch-7".to_string()),
    };

    let outcome = monitor(store.clone())
        .run(&request, &RecordingSink::new(), now())
        .await
        .expect("health check runs");

    assert_eq!(outcome.trend.days_since_last_check, 7);
    assert_eq!(outcome.trend.window_start(), day(2025, 6, 8));
    assert_eq!(outcome.import_records, Some(2));
    assert_eq!(outcome.last_export_date, None);
    assert!(outcome.report.contains("Import Batch Records: 2"));

    let created = &store.records("System Monitor")[0];
    assert_eq!(
        created.get("Related Import"),
        Some(&FieldValue::text("batch-7"))
    );
    assert!(!created.is_present("Last Export Date"));
}

#[tokio::test]
async fn last_export_date_carries_over_without_new_exports() {
    let store = Arc::new(
        MemoryStore::new()
            .with_table("Bills", bills())
            .with_table("System Monitor", vec![previous_check(day(2025, 6, 8))])
            .with_table("Website Exports", Vec::new())
            .with_table("StateNet Raw Import", Vec::new()),
    );

    let outcome = monitor(store)
        .run(&HealthCheckRequest::default(), &RecordingSink::new(), now())
        .await
        .expect("health check runs");

    assert_eq!(outcome.last_export_date, Some(day(2025, 6, 1)));
    assert_eq!(outcome.export_count, 0);
}
