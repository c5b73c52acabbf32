use std::sync::Arc;

use super::common::*;
use crate::store::{FieldValue, MemoryStore};
use crate::workflows::digest::{DigestConfig, Milestone, PartnerDigest};
use crate::workflows::WorkflowError;

#[tokio::test]
async fn digest_groups_recent_milestones_by_intent() {
    let bills = vec![
        bill("b1", "TX", 1)
            .with_field("Intent", FieldValue::choices(["Positive"]))
            .with_field("Passed Legislature Date", FieldValue::date(day(2025, 6, 9)))
            .with_field("Website Blurb", FieldValue::text("Funds doula care")),
        bill("b2", "OH", 2)
            .with_field("Intent", FieldValue::choices(["Restrictive"]))
            .with_field("Passed 1 Chamber Date", FieldValue::date(day(2025, 6, 2))),
        bill("b3", "GA", 3)
            .with_field("Intent", FieldValue::choices(["Protective"]))
            .with_field("Passed 1 Chamber Date", FieldValue::date(day(2025, 4, 2))),
    ];
    let store = Arc::new(MemoryStore::new().with_table("Bills", bills));

    let digest = PartnerDigest::new(store, DigestConfig::default())
        .run(day(2025, 6, 15))
        .await
        .expect("digest compiles");

    assert_eq!(digest.positive.len(), 1);
    assert_eq!(digest.positive[0].milestone, Milestone::PassedLegislature);
    assert_eq!(
        digest.text(),
        "Bi-Weekly Legislative Update\n\n\
         *Positive*\n\nTX HB 1 passed the legislature on 06/09.\nFunds doula care\n\n\
         *Restrictive*\n\nOH HB 2 passed the first chamber on 06/02.\nNo description available"
    );
    assert!(digest
        .html()
        .contains("<p><u>OH HB 2 passed the first chamber on 06/02.</u><br>No description available</p>"));
}

#[tokio::test]
async fn missing_bills_table_is_a_store_error() {
    let store = Arc::new(MemoryStore::new());

    match PartnerDigest::new(store, DigestConfig::default())
        .run(day(2025, 6, 15))
        .await
    {
        Err(WorkflowError::Store(_)) => {}
        other => panic!("expected store error, got {other:?}"),
    }
}
