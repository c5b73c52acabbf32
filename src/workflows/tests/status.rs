use std::sync::Arc;

use super::common::*;
use crate::report::RecordingSink;
use crate::store::{FieldValue, MemoryStore, Record};
use crate::workflows::status::{ChangeKind, StatusConfig, StatusDetector};

fn bills() -> Vec<Record> {
    vec![
        bill("b1", "TX", 1)
            .with_field("Current Bill Status", FieldValue::choice("Enacted"))
            .with_field("History", FieldValue::text("Chapter No. 45\nPassed Senate"))
            .with_field(
                "Bill Status History",
                FieldValue::text("Introduced, Passed First Chamber, Enacted"),
            ),
        bill("b2", "OH", 2).with_field("Current Bill Status", FieldValue::choice("Introduced")),
        bill("b3", "OH", 3)
            .with_field("Current Bill Status", FieldValue::choice("Vetoed"))
            .with_field("Ready for Website", FieldValue::flag(true)),
    ]
}

#[tokio::test]
async fn flagged_bills_get_one_merged_review_update() {
    let store = Arc::new(MemoryStore::new().with_table("Bills", bills()));
    let sink = RecordingSink::new();
    let detector = StatusDetector::new(store.clone(), StatusConfig::default(), write_config(50));

    let run = detector.run(&sink, now()).await.expect("detection runs");

    assert_eq!(run.scanned, 3);
    assert_eq!(run.flagged(), 1);
    assert_eq!(run.changes.len(), 3);
    assert_eq!(run.of_kind(ChangeKind::Critical).count(), 1);
    assert_eq!(run.write.written, 1);

    let stored = store.records("Bills");
    assert_eq!(
        stored[0].get("Review Status"),
        Some(&FieldValue::choice("Needs Review"))
    );
    assert_eq!(
        stored[0].display("Review Notes").as_deref(),
        Some(
            "[2025-06-15 09:30:00] Enacted: Needs website blurb\n\
             [2025-06-15 09:30:00] Action: Chapter No. 45\n\
             [2025-06-15 09:30:00] Movement: Enacted"
        )
    );
    assert!(!stored[1].is_present("Review Status"));
    assert!(!stored[2].is_present("Review Status"));

    let messages = sink.messages();
    assert_eq!(messages[0], "**Starting Status Change Detection**");
    assert!(messages[1].contains("📝 **Significant Actions**\n- TX HB1: Chapter No. 45"));
}

#[tokio::test]
async fn quiet_tables_report_no_changes() {
    let store = Arc::new(MemoryStore::new().with_table(
        "Bills",
        vec![bill("b2", "OH", 2).with_field("Current Bill Status", FieldValue::choice("Dead"))],
    ));
    let sink = RecordingSink::new();

    let run = StatusDetector::new(store, StatusConfig::default(), write_config(50))
        .run(&sink, now())
        .await
        .expect("detection runs");

    assert!(run.changes.is_empty());
    assert_eq!(run.write.requested, 0);
    assert!(sink.contains("**No significant changes detected**"));
}

#[tokio::test]
async fn failed_updates_are_reported_not_raised() {
    let store = FlakyStore::new(MemoryStore::new().with_table("Bills", bills()), "Bills", 0);
    let sink = RecordingSink::new();

    let run = StatusDetector::new(store, StatusConfig::default(), write_config(50))
        .run(&sink, now())
        .await
        .expect("detection runs");

    assert!(run.write.failure.is_some());
    assert!(sink.contains("⚠️ **Error updating records:** 1 of 1 updates were not written"));
    assert!(sink.contains("🚨 **Critical Updates Needed**"));
}
