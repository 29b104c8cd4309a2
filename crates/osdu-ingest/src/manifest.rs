//! Manifest generation
//!
//! Builds one manifest envelope per ready classified record. The section a
//! record lands in depends on its category:
//!
//! | Category | Section |
//! |---|---|
//! | Well Logs | `MasterData` with `WellID` |
//! | Seismic Data | `Data.Datasets` with `SurveyName` |
//! | Documents | `Data.WorkProduct` + `Data.WorkProductComponents` |
//! | everything else | `Data.Datasets` with all extracted metadata |
//!
//! Every section record carries `FileName` and `FilePath`, which is how a
//! manifest is matched back to the object it describes at ingestion time.

use std::collections::BTreeMap;
use std::path::Path;

use osdu_common::types::{Category, ClassifiedRecord, SchemaKind, SURVEY_NAME, WELL_ID};
use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Manifest envelope kind
pub const MANIFEST_KIND: &str = "osdu:wks:Manifest:1.0.0";

/// One record inside a manifest section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "FilePath")]
    pub file_path: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl SectionRecord {
    fn for_record(record: &ClassifiedRecord) -> Self {
        Self {
            file_name: record.file_name().to_string(),
            file_path: record.path().to_string(),
            fields: BTreeMap::new(),
        }
    }

    fn with_field(mut self, record: &ClassifiedRecord, field: &str) -> Self {
        if let Some(value) = record.metadata_value(field) {
            self.fields.insert(field.to_string(), value.to_string());
        }
        self
    }

    fn with_all_metadata(mut self, record: &ClassifiedRecord) -> Self {
        self.fields.extend(record.metadata.clone());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestData {
    #[serde(rename = "WorkProduct", default)]
    pub work_product: BTreeMap<String, String>,
    #[serde(rename = "WorkProductComponents", default)]
    pub work_product_components: Vec<SectionRecord>,
    #[serde(rename = "Datasets", default)]
    pub datasets: Vec<SectionRecord>,
}

/// A manifest envelope ready for ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: String,
    #[serde(rename = "OSDUSchema")]
    pub schema: SchemaKind,
    #[serde(rename = "ReferenceData", default)]
    pub reference_data: Vec<SectionRecord>,
    #[serde(rename = "MasterData", default)]
    pub master_data: Vec<SectionRecord>,
    #[serde(rename = "Data", default)]
    pub data: ManifestData,
}

impl ManifestEntry {
    pub fn new(schema: SchemaKind) -> Self {
        Self {
            kind: MANIFEST_KIND.to_string(),
            schema,
            reference_data: Vec::new(),
            master_data: Vec::new(),
            data: ManifestData::default(),
        }
    }

    fn sections(&self) -> impl Iterator<Item = &SectionRecord> {
        self.master_data
            .iter()
            .chain(self.data.datasets.iter())
            .chain(self.data.work_product_components.iter())
            .chain(self.reference_data.iter())
    }

    /// Path of the object this manifest describes: the first section's `FilePath`.
    pub fn source_path(&self) -> Option<&str> {
        self.sections().next().map(|s| s.file_path.as_str())
    }

    /// Every object path referenced by this manifest, in section order
    pub fn file_paths(&self) -> Vec<&str> {
        self.sections().map(|s| s.file_path.as_str()).collect()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// How ready records map onto manifest entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grouping {
    /// One entry per record
    #[default]
    PerRecord,
    /// Records sharing a WellID or SurveyName join the first entry for that entity
    ByEntity,
}

impl std::str::FromStr for Grouping {
    type Err = OsduError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-record" | "record" => Ok(Grouping::PerRecord),
            "by-entity" | "entity" => Ok(Grouping::ByEntity),
            other => Err(OsduError::Parse(format!("unknown grouping '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    grouping: Grouping,
}

impl ManifestBuilder {
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping }
    }

    /// Manifest for a single record, or `None` when the record is not ready.
    pub fn build_one(&self, record: &ClassifiedRecord) -> Option<ManifestEntry> {
        if !record.ready {
            return None;
        }

        let mut entry = ManifestEntry::new(record.schema.clone());
        let section = SectionRecord::for_record(record);

        match record.category {
            Category::WellLogs => {
                entry.master_data.push(section.with_field(record, WELL_ID));
            },
            Category::SeismicData => {
                entry.data.datasets.push(section.with_field(record, SURVEY_NAME));
            },
            Category::Documents => {
                entry
                    .data
                    .work_product
                    .insert("Name".to_string(), record.file_name().to_string());
                entry
                    .data
                    .work_product_components
                    .push(section.with_all_metadata(record));
            },
            _ => {
                entry.data.datasets.push(section.with_all_metadata(record));
            },
        }

        Some(entry)
    }

    /// Manifests for all ready records, in input order.
    pub fn build(&self, records: &[ClassifiedRecord]) -> Vec<ManifestEntry> {
        let manifests = match self.grouping {
            Grouping::PerRecord => records.iter().filter_map(|r| self.build_one(r)).collect(),
            Grouping::ByEntity => self.build_grouped(records),
        };

        info!(
            records = records.len(),
            manifests = manifests.len(),
            grouping = ?self.grouping,
            "Generated manifests"
        );
        manifests
    }

    fn build_grouped(&self, records: &[ClassifiedRecord]) -> Vec<ManifestEntry> {
        let mut manifests: Vec<ManifestEntry> = Vec::new();
        let mut by_entity: BTreeMap<(Category, String), usize> = BTreeMap::new();

        for record in records {
            let Some(entry) = self.build_one(record) else {
                continue;
            };

            let Some(key) = entity_key(record) else {
                manifests.push(entry);
                continue;
            };

            match by_entity.get(&key) {
                Some(&idx) => {
                    debug!(entity = %key.1, path = record.path(), "Merging into existing manifest");
                    let target = &mut manifests[idx];
                    target.master_data.extend(entry.master_data);
                    target.data.datasets.extend(entry.data.datasets);
                },
                None => {
                    by_entity.insert(key, manifests.len());
                    manifests.push(entry);
                },
            }
        }

        manifests
    }
}

fn entity_key(record: &ClassifiedRecord) -> Option<(Category, String)> {
    let field = match record.category {
        Category::WellLogs => WELL_ID,
        Category::SeismicData => SURVEY_NAME,
        _ => return None,
    };
    record
        .metadata_value(field)
        .map(|value| (record.category, value.to_string()))
}

/// Write manifests as a pretty-printed JSON array.
pub fn write_manifests(path: &Path, manifests: &[ManifestEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(manifests)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), count = manifests.len(), "Saved manifests");
    Ok(())
}

/// Manifests keyed by the object path they describe. An entity manifest
/// covering several files appears once per file.
pub type ManifestMap = Vec<(String, Value)>;

/// One `(path, manifest)` pair per file each entry references, in entry order.
pub fn manifest_map(entries: &[ManifestEntry]) -> Result<ManifestMap> {
    let mut map = Vec::new();
    for entry in entries {
        let value = entry.to_value()?;
        for path in entry.file_paths() {
            map.push((path.to_string(), value.clone()));
        }
    }
    Ok(map)
}

/// Load manifests for ingestion.
///
/// Accepts either an object mapping object path to manifest payload, or the
/// array written by [`write_manifests`], where every section's `FilePath`
/// gets the entry it belongs to.
pub fn load_manifest_map(path: &Path) -> Result<ManifestMap> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    parse_manifest_map(value)
}

/// Object input comes back sorted by path; array input keeps file order.
pub fn parse_manifest_map(value: Value) -> Result<ManifestMap> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Array(items) => {
            let mut map = Vec::new();
            for (idx, item) in items.into_iter().enumerate() {
                let entry: ManifestEntry = serde_json::from_value(item.clone())?;
                let paths = entry.file_paths();
                if paths.is_empty() {
                    return Err(OsduError::invalid_input(format!(
                        "manifest entry {} has no FilePath",
                        idx
                    )));
                }
                for path in paths {
                    map.push((path.to_string(), item.clone()));
                }
            }
            Ok(map)
        },
        _ => Err(OsduError::invalid_input(
            "manifest file must contain a JSON object or array",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use osdu_common::types::ObjectRecord;
    use serde_json::json;

    fn classify(paths: &[&str]) -> Vec<ClassifiedRecord> {
        let classifier = Classifier::with_default_policy().unwrap();
        classifier.classify_all(paths.iter().map(|p| ObjectRecord::new(*p, "corpus", 10)))
    }

    #[test]
    fn test_well_log_goes_to_master_data() {
        let records = classify(&["files/volve/well_logs/WELL-42_2021-03-01.las"]);
        let manifests = ManifestBuilder::default().build(&records);

        assert_eq!(manifests.len(), 1);
        let value = manifests[0].to_value().unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "osdu:wks:Manifest:1.0.0",
                "OSDUSchema": "Well Log",
                "ReferenceData": [],
                "MasterData": [{
                    "FileName": "WELL-42_2021-03-01.las",
                    "FilePath": "files/volve/well_logs/WELL-42_2021-03-01.las",
                    "WellID": "WELL-42"
                }],
                "Data": {"WorkProduct": {}, "WorkProductComponents": [], "Datasets": []}
            })
        );
    }

    #[test]
    fn test_seismic_goes_to_datasets() {
        let records = classify(&["files/seismic/ST0202_survey.segy"]);
        let manifests = ManifestBuilder::default().build(&records);

        let datasets = &manifests[0].data.datasets;
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].fields.get(SURVEY_NAME).unwrap(), "ST0202");
        assert!(manifests[0].master_data.is_empty());
    }

    #[test]
    fn test_documents_populate_work_product() {
        let records = classify(&["files/reports/summary_2020-05-05.pdf"]);
        let manifest = &ManifestBuilder::default().build(&records)[0];

        assert_eq!(manifest.data.work_product.get("Name").unwrap(), "summary_2020-05-05.pdf");
        assert_eq!(manifest.data.work_product_components.len(), 1);
        assert_eq!(
            manifest.data.work_product_components[0].fields.get("Date").unwrap(),
            "2020-05-05"
        );
    }

    #[test]
    fn test_other_categories_carry_all_metadata() {
        let records = classify(&["files/prod/rates_2019-01-01.csv", "files/random/data.xyz"]);
        let manifests = ManifestBuilder::default().build(&records);

        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].data.datasets[0].fields.get("Date").unwrap(), "2019-01-01");
        assert_eq!(manifests[1].schema, SchemaKind::unknown());
        assert_eq!(manifests[1].source_path(), Some("files/random/data.xyz"));
    }

    #[test]
    fn test_not_ready_records_are_skipped() {
        let records = classify(&[
            "files/seismic/stack.segy",
            "files/volve/well_logs/WELL-1.las",
        ]);
        let manifests = ManifestBuilder::default().build(&records);
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].source_path(), Some("files/volve/well_logs/WELL-1.las"));
    }

    #[test]
    fn test_by_entity_grouping() {
        let records = classify(&[
            "files/well_logs/W-1_gr.las",
            "files/report.pdf",
            "files/well_logs/W-1_res.las",
            "files/well_logs/W-2_gr.las",
        ]);
        let manifests = ManifestBuilder::new(Grouping::ByEntity).build(&records);

        assert_eq!(manifests.len(), 3);
        assert_eq!(
            manifests[0].file_paths(),
            vec!["files/well_logs/W-1_gr.las", "files/well_logs/W-1_res.las"]
        );
        assert_eq!(manifests[1].schema.as_str(), "Work Product");
    }

    #[test]
    fn test_grouping_from_str() {
        assert_eq!("by_entity".parse::<Grouping>().unwrap(), Grouping::ByEntity);
        assert_eq!("Per-Record".parse::<Grouping>().unwrap(), Grouping::PerRecord);
        assert!("clustered".parse::<Grouping>().is_err());
    }

    #[test]
    fn test_manifest_map_from_object() {
        let map = parse_manifest_map(json!({
            "a/b.las": {"kind": "x"},
            "a/c.las": {"kind": "y"}
        }))
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0, "a/b.las");
    }

    #[test]
    fn test_manifest_map_from_generated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifests.json");
        let records = classify(&["files/well_logs/W-1.las", "files/random/notes.bin"]);
        write_manifests(&path, &ManifestBuilder::default().build(&records)).unwrap();

        let map = load_manifest_map(&path).unwrap();
        let paths: Vec<_> = map.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["files/well_logs/W-1.las", "files/random/notes.bin"]);
        assert_eq!(map[0].1["MasterData"][0]["WellID"], "W-1");
    }

    #[test]
    fn test_manifest_map_covers_every_grouped_file() {
        let records = classify(&[
            "files/well_logs/W-1_gr.las",
            "files/well_logs/W-1_res.las",
            "files/well_logs/W-2_gr.las",
        ]);
        let manifests = ManifestBuilder::new(Grouping::ByEntity).build(&records);
        assert_eq!(manifests.len(), 2);

        let map = manifest_map(&manifests).unwrap();
        let paths: Vec<_> = map.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "files/well_logs/W-1_gr.las",
                "files/well_logs/W-1_res.las",
                "files/well_logs/W-2_gr.las"
            ]
        );
        assert_eq!(map[0].1, map[1].1);
    }

    #[test]
    fn test_grouped_manifest_file_maps_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifests.json");
        let records = classify(&["files/well_logs/W-1_gr.las", "files/well_logs/W-1_res.las"]);
        write_manifests(&path, &ManifestBuilder::new(Grouping::ByEntity).build(&records)).unwrap();

        let map = load_manifest_map(&path).unwrap();
        let paths: Vec<_> = map.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["files/well_logs/W-1_gr.las", "files/well_logs/W-1_res.las"]);
    }

    #[test]
    fn test_manifest_map_object_input_is_sorted() {
        let map = parse_manifest_map(json!({
            "z/last.las": {"kind": "x"},
            "a/first.las": {"kind": "y"}
        }))
        .unwrap();
        assert_eq!(map[0].0, "a/first.las");
    }

    #[test]
    fn test_manifest_map_rejects_entry_without_path() {
        let result = parse_manifest_map(json!([{"kind": MANIFEST_KIND, "OSDUSchema": "Seismic"}]));
        assert!(matches!(result, Err(OsduError::InvalidInput(_))));
        assert!(parse_manifest_map(json!("nope")).is_err());
    }
}
