use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Exact-match grouping key. Records without a complete key never compare.
pub type GroupKey = Vec<String>;

/// State plus linked issuing-entity identity. The entity is compared by its
/// linked-record id, never by display name, so two agencies that share a
/// name stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionKey {
    pub region_field: String,
    pub entity_field: String,
}

impl JurisdictionKey {
    pub fn new(region_field: impl Into<String>, entity_field: impl Into<String>) -> Self {
        Self {
            region_field: region_field.into(),
            entity_field: entity_field.into(),
        }
    }

    pub fn key(&self, record: &Record) -> Option<GroupKey> {
        let region = record.present_text(&self.region_field)?;
        let entity = record
            .get(&self.entity_field)?
            .first_choice()?
            .id
            .clone()?;
        Some(vec![region, entity])
    }
}

/// Integer time key read from a field (years in practice).
pub fn integer_key(field: &str) -> impl Fn(&Record) -> Option<i64> + '_ {
    move |record| record.integer(field)
}

/// Records from `pool` comparable with `source`: a different id, an equal
/// group key, and a time key strictly earlier than the source's but no more
/// than `max_backward` units earlier. Missing or non-numeric values make a
/// record ineligible.
pub fn select_candidates<'a, G, T>(
    source: &Record,
    pool: &'a [Record],
    group_key: G,
    time_key: T,
    max_backward: i64,
) -> Vec<&'a Record>
where
    G: Fn(&Record) -> Option<GroupKey>,
    T: Fn(&Record) -> Option<i64>,
{
    let (Some(source_group), Some(source_time)) = (group_key(source), time_key(source)) else {
        return Vec::new();
    };
    let earliest = source_time.saturating_sub(max_backward);

    pool.iter()
        .filter(|candidate| candidate.id != source.id)
        .filter(|candidate| group_key(candidate).as_ref() == Some(&source_group))
        .filter(|candidate| {
            time_key(candidate)
                .map(|time| time < source_time && time >= earliest)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, RecordId};

    fn regulation(id: &str, state: &str, agency_id: &str, year: Option<f64>) -> Record {
        let mut record = Record::new(RecordId::from(id))
            .with_field("State", FieldValue::choice(state))
            .with_field("Issuing Agency Link", FieldValue::link(agency_id, "Dept. of Health"));
        if let Some(year) = year {
            record = record.with_field("Year", FieldValue::number(year));
        }
        record
    }

    fn select<'a>(source: &Record, pool: &'a [Record], window: i64) -> Vec<&'a Record> {
        let key = JurisdictionKey::new("State", "Issuing Agency Link");
        select_candidates(
            source,
            pool,
            |record| key.key(record),
            integer_key("Year"),
            window,
        )
    }

    #[test]
    fn keeps_only_earlier_records_inside_the_window() {
        let source = regulation("src", "TX", "agy1", Some(2024.0));
        let pool = vec![
            source.clone(),
            regulation("same-year", "TX", "agy1", Some(2024.0)),
            regulation("in-window", "TX", "agy1", Some(2019.0)),
            regulation("too-old", "TX", "agy1", Some(2018.0)),
            regulation("newer", "TX", "agy1", Some(2025.0)),
        ];

        let ids: Vec<&str> = select(&source, &pool, 5)
            .into_iter()
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(ids, vec!["in-window"]);
    }

    #[test]
    fn agencies_sharing_a_name_are_not_merged() {
        let source = regulation("src", "TX", "agy1", Some(2024.0));
        let pool = vec![regulation("other-agency", "TX", "agy2", Some(2022.0))];
        assert!(select(&source, &pool, 5).is_empty());
    }

    #[test]
    fn missing_time_values_are_excluded_not_wildcards() {
        let source = regulation("src", "TX", "agy1", Some(2024.0));
        let pool = vec![
            regulation("no-year", "TX", "agy1", None),
            regulation("text-year", "TX", "agy1", None).with_field("Year", FieldValue::text("TBD")),
        ];
        assert!(select(&source, &pool, 5).is_empty());

        let yearless_source = regulation("src2", "TX", "agy1", None);
        let pool = vec![regulation("a", "TX", "agy1", Some(2020.0))];
        assert!(select(&yearless_source, &pool, 5).is_empty());
    }

    #[test]
    fn different_region_is_ineligible() {
        let source = regulation("src", "TX", "agy1", Some(2024.0));
        let pool = vec![regulation("ia", "IA", "agy1", Some(2022.0))];
        assert!(select(&source, &pool, 5).is_empty());
    }
}
