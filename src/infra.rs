use chrono::NaiveDate;
use policy_tracker::error::AppError;
use policy_tracker::report::{ConfirmationPrompt, PromptOption, ReportSink};
use policy_tracker::store::{FieldMap, FieldValue, MemoryStore, Record, RecordId};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A file-backed view of the tables: JSON snapshots round-trip every table,
/// CSV snapshots hold a single table of scalar cells.
pub(crate) struct SnapshotStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl SnapshotStore {
    /// `csv_table` names the table a CSV file is loaded into.
    pub(crate) fn load(path: &Path, csv_table: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Snapshot(format!("unable to read {} ({err})", path.display()))
        })?;
        let memory = if is_csv(path) {
            MemoryStore::new().with_table(csv_table, records_from_csv(&raw)?)
        } else {
            tables_from_json(&raw)?
        };
        info!(path = %path.display(), tables = memory.table_names().len(), "snapshot loaded");
        Ok(Self {
            path: path.to_path_buf(),
            memory,
        })
    }

    /// Shared handle; writes made through it land in this snapshot.
    pub(crate) fn store(&self) -> MemoryStore {
        self.memory.clone()
    }

    pub(crate) fn ensure_tables<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.memory.ensure_table(name);
        }
    }

    /// CSV sources are written back beside the CSV file as JSON.
    pub(crate) fn save_path(&self) -> PathBuf {
        if is_csv(&self.path) {
            self.path.with_extension("json")
        } else {
            self.path.clone()
        }
    }

    pub(crate) fn save(&self) -> Result<PathBuf, AppError> {
        let path = self.save_path();
        let tables: Map<String, Value> = self
            .memory
            .table_names()
            .into_iter()
            .map(|name| {
                let records = self
                    .memory
                    .records(&name)
                    .iter()
                    .map(Record::to_json)
                    .collect();
                (name, Value::Array(records))
            })
            .collect();
        fs::write(&path, serde_json::to_string_pretty(&Value::Object(tables))?)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(path)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn tables_from_json(raw: &str) -> Result<MemoryStore, AppError> {
    let parsed: Value = serde_json::from_str(raw)?;
    let tables = parsed.as_object().ok_or_else(|| {
        AppError::Snapshot("snapshot must be an object keyed by table name".to_string())
    })?;

    let mut memory = MemoryStore::new();
    for (name, rows) in tables {
        let rows = rows.as_array().ok_or_else(|| {
            AppError::Snapshot(format!("table '{name}' must be an array of records"))
        })?;
        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match Record::from_json(row) {
                Some(record) => records.push(record),
                None => {
                    return Err(AppError::Snapshot(format!(
                        "table '{name}' row {index} has no string id"
                    )))
                }
            }
        }
        memory = memory.with_table(name.clone(), records);
    }
    Ok(memory)
}

/// An `id` column is kept as the record id; rows without one are numbered.
fn records_from_csv(raw: &str) -> Result<Vec<Record>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(raw.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let mut id = None;
        let mut fields = FieldMap::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header == "id" {
                id = Some(cell.trim().to_string()).filter(|value| !value.is_empty());
                continue;
            }
            if let Some(value) = FieldValue::from_cell(cell) {
                fields.insert(header.to_string(), value);
            }
        }
        let id = id.unwrap_or_else(|| format!("row{:06}", index + 1));
        records.push(Record::from_fields(RecordId::from(id.as_str()), fields));
    }
    Ok(records)
}

/// Writes rows with the union of their field names as the header.
pub(crate) fn write_csv(path: &Path, rows: &[FieldMap]) -> Result<(), AppError> {
    let headers: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(headers.iter().map(|header| {
            row.get(*header)
                .map(FieldValue::display)
                .unwrap_or_default()
        }))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StdoutSink;

impl ReportSink for StdoutSink {
    fn emit(&self, text: &str) {
        println!("{text}\n");
    }
}

/// Asks on the terminal. `assume_yes` picks the first option without asking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StdinPrompt {
    pub(crate) assume_yes: bool,
}

#[async_trait::async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, message: &str, options: &[PromptOption]) -> bool {
        let Some(first) = options.first() else {
            return false;
        };
        if self.assume_yes {
            return first.value;
        }

        println!("{message}");
        for (index, option) in options.iter().enumerate() {
            println!("  [{}] {}", index + 1, option.label);
        }
        print!("Choose an option: ");
        std::io::stdout().flush().ok();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => choose(options, &line),
            Ok(Err(err)) => {
                warn!(error = %err, "could not read confirmation; treating as the last option");
                options.last().map(|option| option.value).unwrap_or(false)
            }
            Err(err) => {
                warn!(error = %err, "confirmation task failed; treating as the last option");
                options.last().map(|option| option.value).unwrap_or(false)
            }
        }
    }
}

/// Accepts an option number or a label prefix; anything else picks the last
/// (most conservative) option.
fn choose(options: &[PromptOption], answer: &str) -> bool {
    let answer = answer.trim();
    let picked = answer
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| options.get(index))
        .or_else(|| {
            let lowered = answer.to_ascii_lowercase();
            if lowered.is_empty() {
                return None;
            }
            options
                .iter()
                .find(|option| option.label.to_ascii_lowercase().starts_with(&lowered))
        })
        .or_else(|| options.last());
    picked.map(|option| option.value).unwrap_or(false)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("policy-tracker-{}-{name}", std::process::id()))
    }

    #[test]
    fn json_snapshot_round_trips_tables() {
        let path = temp_path("snapshot.json");
        fs::write(
            &path,
            r#"{"Regulations": [{"id": "rec1", "fields": {"Title": "Clinic Licensing", "Year": 2024}}],
                "Bills": []}"#,
        )
        .expect("write snapshot");

        let snapshot = SnapshotStore::load(&path, "Bills").expect("snapshot loads");
        snapshot.ensure_tables(["System Monitor"]);
        let saved = snapshot.save().expect("snapshot saves");
        let reloaded = SnapshotStore::load(&saved, "Bills").expect("saved snapshot loads");
        fs::remove_file(&path).ok();

        let store = reloaded.store();
        assert_eq!(
            store.table_names(),
            vec!["Bills", "Regulations", "System Monitor"]
        );
        let regulation = &store.records("Regulations")[0];
        assert_eq!(regulation.id, RecordId::from("rec1"));
        assert_eq!(regulation.integer("Year"), Some(2024));
    }

    #[test]
    fn csv_snapshot_loads_bills_and_saves_as_json() {
        let path = temp_path("bills.csv");
        fs::write(&path, "id,BillID,State\nrec9,TX2025HB1,TX\n,OH2025SB4,OH\n").expect("write csv");

        let snapshot = SnapshotStore::load(&path, "Bills").expect("csv loads");
        fs::remove_file(&path).ok();

        let bills = snapshot.store().records("Bills");
        assert_eq!(bills.len(), 2);
        assert_eq!(bills[0].id, RecordId::from("rec9"));
        assert_eq!(bills[1].id, RecordId::from("row000002"));
        assert_eq!(bills[1].display("State").as_deref(), Some("OH"));
        assert_eq!(snapshot.save_path(), path.with_extension("json"));
    }

    #[test]
    fn rejects_rows_without_ids() {
        match tables_from_json(r#"{"Bills": [{"fields": {}}]}"#) {
            Err(AppError::Snapshot(message)) => assert!(message.contains("row 0")),
            other => panic!("expected snapshot error, got {other:?}"),
        }
    }

    #[test]
    fn answers_map_to_options() {
        let options = [
            PromptOption::new("Continue Anyway", true),
            PromptOption::new("Cancel Export", false),
        ];
        assert!(choose(&options, "1\n"));
        assert!(choose(&options, "cont"));
        assert!(!choose(&options, "2"));
        assert!(!choose(&options, "maybe"));
        assert!(!choose(&options, ""));
    }

    #[test]
    fn parse_date_reports_the_bad_input() {
        assert_eq!(
            parse_date("2025-06-15"),
            Ok(NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date"))
        );
        let err = parse_date("06/15/2025").expect_err("slash dates rejected");
        assert!(err.contains("'06/15/2025'"));
    }
}
