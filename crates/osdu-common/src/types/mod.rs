//! Domain types shared across the OSDU ingest workspace

use crate::error::{OsduError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Metadata field holding a well identifier
pub const WELL_ID: &str = "WellID";
/// Metadata field holding a seismic survey name
pub const SURVEY_NAME: &str = "SurveyName";
/// Metadata field holding an ISO date found in the file name
pub const DATE: &str = "Date";

/// Metadata extracted from an object's name, keyed by field name.
///
/// Ordered so that serialized output is stable between runs.
pub type ExtractedMetadata = BTreeMap<String, String>;

// ============================================================================
// Category
// ============================================================================

/// Domain classification of a stored file.
///
/// Variant order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Well Logs")]
    WellLogs,
    #[serde(rename = "Seismic Data")]
    SeismicData,
    #[serde(rename = "Real-Time Drilling Data")]
    RealTimeDrillingData,
    #[serde(rename = "Production Data")]
    ProductionData,
    #[serde(rename = "Reservoir Models")]
    ReservoirModels,
    #[serde(rename = "Documents")]
    Documents,
    #[serde(rename = "Geophysical Interpretation")]
    GeophysicalInterpretation,
    #[serde(rename = "Wellbore Data")]
    WellboreData,
    #[serde(rename = "Markers and Horizons")]
    MarkersAndHorizons,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::WellLogs,
        Category::SeismicData,
        Category::RealTimeDrillingData,
        Category::ProductionData,
        Category::ReservoirModels,
        Category::Documents,
        Category::GeophysicalInterpretation,
        Category::WellboreData,
        Category::MarkersAndHorizons,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WellLogs => "Well Logs",
            Category::SeismicData => "Seismic Data",
            Category::RealTimeDrillingData => "Real-Time Drilling Data",
            Category::ProductionData => "Production Data",
            Category::ReservoirModels => "Reservoir Models",
            Category::Documents => "Documents",
            Category::GeophysicalInterpretation => "Geophysical Interpretation",
            Category::WellboreData => "Wellbore Data",
            Category::MarkersAndHorizons => "Markers and Horizons",
            Category::Unknown => "Unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Category::Unknown)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = OsduError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OsduError::Parse(format!("Unknown category: {}", s)))
    }
}

// ============================================================================
// Schema kind
// ============================================================================

/// Identifier of the target schema a file should conform to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaKind(String);

impl SchemaKind {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

// ============================================================================
// Object records
// ============================================================================

/// One stored file as reported by the object store listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Full object path, unique within the container
    pub path: String,
    pub container: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub blob_type: Option<String>,
    pub blob_tier: Option<String>,
    pub etag: Option<String>,
    /// Raw property bag as listed
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl ObjectRecord {
    pub fn new(path: impl Into<String>, container: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            container: container.into(),
            size,
            last_modified: None,
            creation_time: None,
            content_type: None,
            blob_type: None,
            blob_tier: None,
            etag: None,
            properties: serde_json::Value::Null,
        }
    }

    /// Build a record from one entry of a raw blob inventory.
    ///
    /// Expects `name`, `container` and a `properties` object carrying
    /// `contentLength`, `lastModified`, `creationTime`, `etag`, `blobType`,
    /// `blobTier` and `contentSettings.contentType`.
    pub fn from_blob_json(blob: &serde_json::Value) -> Result<Self> {
        let path = blob
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OsduError::invalid_input("blob entry is missing 'name'"))?;
        let container = blob
            .get("container")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let properties = blob
            .get("properties")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let text = |key: &str| -> Option<String> {
            properties
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty() && *s != "None")
                .map(str::to_string)
        };
        let timestamp = |key: &str| text(key).and_then(|s| parse_timestamp(&s));

        // contentLength arrives as a number or, from some exporters, a string
        let size = match properties.get("contentLength") {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };

        let content_type = properties
            .get("contentSettings")
            .and_then(|cs| cs.get("contentType"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty() && *s != "None")
            .map(str::to_string);

        let last_modified = timestamp("lastModified");
        let creation_time = timestamp("creationTime");
        let blob_type = text("blobType");
        let blob_tier = text("blobTier");
        let etag = text("etag");

        Ok(Self {
            path: path.to_string(),
            container: container.to_string(),
            size,
            last_modified,
            creation_time,
            content_type,
            blob_type,
            blob_tier,
            etag,
            properties,
        })
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }

    /// Everything before the final path component, without the trailing slash
    pub fn folder(&self) -> &str {
        folder_of(&self.path)
    }

    /// Lower-cased extension including the leading dot, or "" when absent
    pub fn extension(&self) -> String {
        extension_of(self.file_name())
    }
}

/// Final component of a `/`-separated object path
pub fn file_name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Parent folder of a `/`-separated object path
pub fn folder_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
}

/// Lower-cased extension of a file name including the dot.
///
/// Leading dots do not start an extension, so `.bashrc` has none.
pub fn extension_of(file_name: &str) -> String {
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[stem_start..].rfind('.') {
        Some(idx) => file_name[stem_start + idx..].to_lowercase(),
        None => String::new(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            // isoformat() output without offset, e.g. "2021-03-01T12:00:00"
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// An object record together with its classification.
///
/// Values are never mutated once built; classifying again yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub record: ObjectRecord,
    pub category: Category,
    pub schema: SchemaKind,
    pub metadata: ExtractedMetadata,
    pub ready: bool,
}

impl ClassifiedRecord {
    pub fn file_name(&self) -> &str {
        self.record.file_name()
    }

    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn metadata_value(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).map(String::as_str)
    }
}

// ============================================================================
// Inventory row (CSV shape)
// ============================================================================

/// One row of the categorized inventory CSV.
///
/// Column names are part of the interchange format and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryRow {
    pub file_name: String,
    pub file_path: String,
    pub file_extension: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub blob_type: String,
    #[serde(default)]
    pub blob_tier: String,
    #[serde(default)]
    pub creation_time: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(default)]
    pub container: String,
    pub category: Category,
    #[serde(rename = "OSDUSchema")]
    pub osdu_schema: SchemaKind,
    #[serde(rename = "WellID", default)]
    pub well_id: String,
    #[serde(default)]
    pub survey_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub ready_for_manifest: bool,
}

impl From<&ClassifiedRecord> for InventoryRow {
    fn from(classified: &ClassifiedRecord) -> Self {
        let record = &classified.record;
        let field = |name: &str| classified.metadata_value(name).unwrap_or_default().to_string();
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let stamp = |value: &Option<DateTime<Utc>>| {
            value.map(|dt| dt.to_rfc3339()).unwrap_or_default()
        };

        Self {
            file_name: record.file_name().to_string(),
            file_path: record.path.clone(),
            file_extension: record.extension(),
            file_size: record.size,
            last_modified: stamp(&record.last_modified),
            file_type: opt(&record.content_type),
            blob_type: opt(&record.blob_type),
            blob_tier: opt(&record.blob_tier),
            creation_time: stamp(&record.creation_time),
            etag: opt(&record.etag),
            container: record.container.clone(),
            category: classified.category,
            osdu_schema: classified.schema.clone(),
            well_id: field(WELL_ID),
            survey_name: field(SURVEY_NAME),
            date: field(DATE),
            ready_for_manifest: classified.ready,
        }
    }
}

impl InventoryRow {
    /// Rebuild the classified record this row was written from.
    ///
    /// Empty metadata columns are not carried over.
    pub fn into_classified(self) -> ClassifiedRecord {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let mut metadata = ExtractedMetadata::new();
        for (key, value) in [
            (WELL_ID, &self.well_id),
            (SURVEY_NAME, &self.survey_name),
            (DATE, &self.date),
        ] {
            if !value.is_empty() {
                metadata.insert(key.to_string(), value.clone());
            }
        }

        let record = ObjectRecord {
            path: self.file_path,
            container: self.container,
            size: self.file_size,
            last_modified: parse_timestamp(&self.last_modified),
            creation_time: parse_timestamp(&self.creation_time),
            content_type: non_empty(&self.file_type),
            blob_type: non_empty(&self.blob_type),
            blob_tier: non_empty(&self.blob_tier),
            etag: non_empty(&self.etag),
            properties: serde_json::Value::Null,
        };

        ClassifiedRecord {
            record,
            category: self.category,
            schema: self.osdu_schema,
            metadata,
            ready: self.ready_for_manifest,
        }
    }
}

/// Accepts booleans, `true`/`false` in any case, and `1`/`0`.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid ReadyForManifest value: {}",
                other
            ))),
        },
    }
}
