use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::RegulationFields;
use crate::report::{Report, Section};
use crate::store::Record;

/// Regulations from one state and agency spread over several years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyGroup {
    pub state: String,
    pub agency: String,
    pub years: BTreeSet<i64>,
    pub count: usize,
}

/// One display name used by more than one linked agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedAgencyName {
    pub name: String,
    pub agency_ids: BTreeSet<String>,
}

/// Shape of the regulations table, reported alongside bulk detection so an
/// operator can see why few candidates exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetOverview {
    pub states: BTreeMap<String, usize>,
    pub years: BTreeMap<i64, usize>,
    pub agencies: BTreeMap<String, usize>,
    pub multi_year_groups: Vec<AgencyGroup>,
    pub shared_agency_names: Vec<SharedAgencyName>,
}

impl DatasetOverview {
    pub fn from_records(records: &[Record], fields: &RegulationFields) -> Self {
        let mut overview = Self::default();
        let mut groups: BTreeMap<(String, String), AgencyGroup> = BTreeMap::new();
        let mut names: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for record in records {
            let state = record.present_text(&fields.state);
            let year = record.integer(&fields.year);
            let agency = record
                .get(&fields.agency)
                .and_then(|value| value.first_choice())
                .cloned();

            if let Some(state) = &state {
                *overview.states.entry(state.clone()).or_default() += 1;
            }
            if let Some(year) = year {
                *overview.years.entry(year).or_default() += 1;
            }
            let Some(agency) = agency else {
                continue;
            };
            *overview.agencies.entry(agency.name.clone()).or_default() += 1;

            let Some(agency_id) = agency.id else {
                continue;
            };
            names
                .entry(agency.name.clone())
                .or_default()
                .insert(agency_id.clone());

            if let (Some(state), Some(year)) = (state, year) {
                let group = groups
                    .entry((state.clone(), agency_id))
                    .or_insert_with(|| AgencyGroup {
                        state,
                        agency: agency.name.clone(),
                        years: BTreeSet::new(),
                        count: 0,
                    });
                group.years.insert(year);
                group.count += 1;
            }
        }

        overview.multi_year_groups = groups
            .into_values()
            .filter(|group| group.years.len() > 1)
            .collect();
        overview
            .multi_year_groups
            .sort_by(|left, right| right.count.cmp(&left.count));
        overview.shared_agency_names = names
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, agency_ids)| SharedAgencyName { name, agency_ids })
            .collect();
        overview
    }

    /// Agencies with at least two regulations, most prolific first.
    pub fn busy_agencies(&self) -> Vec<(&str, usize)> {
        let mut busy: Vec<(&str, usize)> = self
            .agencies
            .iter()
            .filter(|(_, count)| **count >= 2)
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        busy.sort_by(|left, right| right.1.cmp(&left.1));
        busy
    }

    pub fn to_report(&self) -> Report {
        let mut report = Report::new("Dataset Overview");

        let mut distribution = Section::new("Data Distribution")
            .entry("States", self.states.len())
            .entry("Agencies", self.agencies.len());
        if let (Some(first), Some(last)) = (self.years.keys().next(), self.years.keys().last()) {
            distribution = distribution.entry("Years", format!("{first}-{last}"));
        }
        report.push(distribution);

        report.push(
            Section::new("Agencies with Multiple Regulations").bullets(
                self.busy_agencies()
                    .into_iter()
                    .take(10)
                    .map(|(name, count)| format!("{name}: {count} regulations")),
            ),
        );

        report.push(
            Section::new("Multi-Year Groups").bullets(self.multi_year_groups.iter().take(10).map(
                |group| {
                    let years: Vec<String> = group.years.iter().map(i64::to_string).collect();
                    format!(
                        "{} - {}: {} regulations across years {}",
                        group.state,
                        group.agency,
                        group.count,
                        years.join(", ")
                    )
                },
            )),
        );

        report.push(
            Section::new("Agency Names Shared by Different Agencies").bullets(
                self.shared_agency_names.iter().map(|shared| {
                    format!("{} ({} linked agencies)", shared.name, shared.agency_ids.len())
                }),
            ),
        );
        report
    }
}
