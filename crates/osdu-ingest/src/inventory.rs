//! Object inventory
//!
//! Lists the container through an [`ObjectLister`], writes the raw blob
//! inventory JSON, and turns it into the categorized inventory CSV plus a
//! kinds summary.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use async_trait::async_trait;
use osdu_common::types::{ClassifiedRecord, InventoryRow, ObjectRecord};
use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::classify::Classifier;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub objects: Vec<ObjectRecord>,
    /// Continuation token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Source of object records, one page at a time.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Container (bucket) the listing describes
    fn container(&self) -> &str;

    /// Objects whose path starts with `prefix`, at any depth.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage>;

    /// Immediate sub-prefixes of `prefix`, each ending in `/`.
    async fn sub_prefixes(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Every object under `prefix`, following continuation tokens.
///
/// Folder placeholder keys (ending in `/`) are skipped.
pub async fn list_all(lister: &dyn ObjectLister, prefix: &str) -> Result<Vec<ObjectRecord>> {
    let mut objects = Vec::new();
    let mut token = None;
    let mut pages = 0usize;

    loop {
        let page = lister.list_page(prefix, token).await?;
        pages += 1;
        objects.extend(page.objects.into_iter().filter(|o| !o.path.ends_with('/')));

        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(prefix, pages, objects = objects.len(), "Listed prefix");
    Ok(objects)
}

/// Inventory the root prefix and each of its immediate sub-prefixes.
///
/// Objects reached through more than one prefix are kept once, at their
/// first position.
pub async fn collect_inventory(lister: &dyn ObjectLister, root_prefix: &str) -> Result<Vec<ObjectRecord>> {
    let subfolders = lister.sub_prefixes(root_prefix).await?;
    info!(
        container = lister.container(),
        root = root_prefix,
        subfolders = subfolders.len(),
        "Starting inventory"
    );

    let mut seen = HashSet::new();
    let mut inventory = Vec::new();

    for prefix in std::iter::once(root_prefix.to_string()).chain(subfolders) {
        info!(prefix = %prefix, "Processing folder");
        for object in list_all(lister, &prefix).await? {
            if seen.insert(object.path.clone()) {
                inventory.push(object);
            }
        }
    }

    info!(objects = inventory.len(), "Inventory complete");
    Ok(inventory)
}

// ============================================================================
// Raw blob inventory JSON
// ============================================================================

/// Raw blob inventory entry for one object
pub fn to_blob_json(record: &ObjectRecord) -> Value {
    let stamp = |t: &Option<chrono::DateTime<chrono::Utc>>| t.map(|t| t.to_rfc3339());
    json!({
        "name": record.path,
        "container": record.container,
        "content": "",
        "properties": {
            "contentLength": record.size,
            "lastModified": stamp(&record.last_modified),
            "creationTime": stamp(&record.creation_time),
            "etag": record.etag,
            "blobType": record.blob_type,
            "blobTier": record.blob_tier,
            "contentSettings": { "contentType": record.content_type },
        },
    })
}

pub fn write_raw_inventory(path: &Path, records: &[ObjectRecord]) -> Result<()> {
    let blobs: Vec<Value> = records.iter().map(to_blob_json).collect();
    std::fs::write(path, serde_json::to_string_pretty(&blobs)?)?;
    info!(path = %path.display(), count = blobs.len(), "Saved raw inventory");
    Ok(())
}

pub fn load_raw_inventory(path: &Path) -> Result<Vec<ObjectRecord>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let blobs = value
        .as_array()
        .ok_or_else(|| OsduError::invalid_input("raw inventory must be a JSON array"))?;
    blobs.iter().map(ObjectRecord::from_blob_json).collect()
}

// ============================================================================
// Categorized inventory CSV
// ============================================================================

pub fn write_inventory_csv(path: &Path, records: &[ClassifiedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for record in records {
        writer.serialize(InventoryRow::from(record)).map_err(csv_error)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "Saved categorized inventory");
    Ok(())
}

pub fn read_inventory_csv(path: &Path) -> Result<Vec<ClassifiedRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let records = reader
        .deserialize::<InventoryRow>()
        .map(|row| row.map(InventoryRow::into_classified).map_err(csv_error))
        .collect::<Result<Vec<_>>>()?;
    debug!(path = %path.display(), rows = records.len(), "Loaded categorized inventory");
    Ok(records)
}

fn csv_error(err: csv::Error) -> OsduError {
    OsduError::Parse(format!("CSV: {}", err))
}

// ============================================================================
// Kinds summary
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    pub count: usize,
    pub folders: BTreeSet<String>,
    pub filetypes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindsSummary {
    pub kinds: BTreeMap<String, KindSummary>,
    pub unknown_count: usize,
    pub total_files: usize,
}

impl KindsSummary {
    pub fn from_records(records: &[ClassifiedRecord]) -> Self {
        let mut summary = Self {
            total_files: records.len(),
            ..Default::default()
        };

        for record in records {
            if record.category.is_unknown() {
                summary.unknown_count += 1;
                continue;
            }
            let kind = summary.kinds.entry(record.category.to_string()).or_default();
            kind.count += 1;
            kind.folders.insert(record.record.folder().to_string());
            kind.filetypes.insert(record.record.extension());
        }

        summary
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved kinds summary");
        Ok(())
    }
}

/// Classify a raw inventory and write the CSV and kinds summary.
pub fn process_inventory(
    classifier: &Classifier,
    raw_inventory: &Path,
    csv_out: &Path,
    summary_out: &Path,
) -> Result<(Vec<ClassifiedRecord>, KindsSummary)> {
    let records = classifier.classify_all(load_raw_inventory(raw_inventory)?);
    let summary = KindsSummary::from_records(&records);

    write_inventory_csv(csv_out, &records)?;
    summary.write_json(summary_out)?;

    info!(
        total = summary.total_files,
        unknown = summary.unknown_count,
        ready = records.iter().filter(|r| r.ready).count(),
        "Processed inventory"
    );
    Ok((records, summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use osdu_common::types::Category;
    use std::sync::Mutex;

    /// In-memory lister returning `page_size` objects per page.
    struct MemoryLister {
        paths: Vec<String>,
        page_size: usize,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MemoryLister {
        fn new(paths: &[&str], page_size: usize) -> Self {
            Self {
                paths: paths.iter().map(|p| p.to_string()).collect(),
                page_size,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectLister for MemoryLister {
        fn container(&self) -> &str {
            "corpus"
        }

        async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage> {
            self.calls.lock().unwrap().push((prefix.to_string(), token.clone()));
            let matching: Vec<&String> = self.paths.iter().filter(|p| p.starts_with(prefix)).collect();
            let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let end = (start + self.page_size).min(matching.len());
            Ok(ListPage {
                objects: matching[start..end]
                    .iter()
                    .map(|p| ObjectRecord::new(p.as_str(), "corpus", 1))
                    .collect(),
                next_token: (end < matching.len()).then(|| end.to_string()),
            })
        }

        async fn sub_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
            let subs: BTreeSet<String> = self
                .paths
                .iter()
                .filter_map(|p| p.strip_prefix(prefix))
                .filter_map(|rest| rest.split_once('/').map(|(dir, _)| format!("{}{}/", prefix, dir)))
                .collect();
            Ok(subs.into_iter().collect())
        }
    }

    const PATHS: &[&str] = &[
        "files/Volve/readme.pdf",
        "files/Volve/well_logs/",
        "files/Volve/well_logs/W-1.las",
        "files/Volve/well_logs/W-2.las",
        "files/Volve/seismic/ST1_survey.segy",
        "files/Other/x.las",
    ];

    #[tokio::test]
    async fn test_list_all_follows_pages_and_skips_folders() {
        let lister = MemoryLister::new(PATHS, 2);
        let objects = list_all(&lister, "files/Volve/").await.unwrap();

        let paths: Vec<_> = objects.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "files/Volve/readme.pdf",
                "files/Volve/well_logs/W-1.las",
                "files/Volve/well_logs/W-2.las",
                "files/Volve/seismic/ST1_survey.segy",
            ]
        );
        assert_eq!(lister.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_inventory_walks_subfolders_once() {
        let lister = MemoryLister::new(PATHS, 10);
        let inventory = collect_inventory(&lister, "files/Volve/").await.unwrap();

        assert_eq!(inventory.len(), 4);
        let prefixes: Vec<String> = lister
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect();
        assert_eq!(
            prefixes,
            vec!["files/Volve/", "files/Volve/seismic/", "files/Volve/well_logs/"]
        );
    }

    #[test]
    fn test_raw_inventory_and_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("blob_inventory.json");
        let csv_path = dir.path().join("categorized_inventory.csv");
        let summary_path = dir.path().join("kinds_summary.json");

        let mut log = ObjectRecord::new("files/Volve/well_logs/WELL-42_2021-03-01.las", "corpus", 2048);
        log.content_type = Some("application/octet-stream".to_string());
        log.etag = Some("0x8D9".to_string());
        let records = vec![
            log,
            ObjectRecord::new("files/Volve/random/data.xyz", "corpus", 10),
            ObjectRecord::new("files/Volve/seismic/stack.segy", "corpus", 10),
        ];
        write_raw_inventory(&raw, &records).unwrap();

        let classifier = Classifier::with_default_policy().unwrap();
        let (classified, summary) =
            process_inventory(&classifier, &raw, &csv_path, &summary_path).unwrap();

        assert_eq!(classified.len(), 3);
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.unknown_count, 1);
        assert_eq!(summary.kinds["Well Logs"].count, 1);
        assert!(summary.kinds["Well Logs"].folders.contains("files/Volve/well_logs"));

        let header = std::fs::read_to_string(&csv_path).unwrap();
        assert!(header.starts_with(
            "FileName,FilePath,FileExtension,FileSize,LastModified,FileType,BlobType,BlobTier,\
             CreationTime,ETag,Container,Category,OSDUSchema,WellID,SurveyName,Date,ReadyForManifest\n"
        ));

        let reread = read_inventory_csv(&csv_path).unwrap();
        assert_eq!(reread[0].category, Category::WellLogs);
        assert_eq!(reread[0].metadata_value("WellID"), Some("WELL-42"));
        assert_eq!(reread[0].record.etag.as_deref(), Some("0x8D9"));
        assert!(reread[0].ready);
        assert!(!reread[2].ready);

        let summary_json: Value =
            serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(summary_json["total_files"], 3);
    }

    #[test]
    fn test_csv_with_python_booleans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.csv");
        std::fs::write(
            &path,
            "FileName,FilePath,FileExtension,FileSize,LastModified,FileType,BlobType,BlobTier,\
             CreationTime,ETag,Container,Category,OSDUSchema,WellID,SurveyName,Date,ReadyForManifest\n\
             a.las,f/a.las,.las,1,,,,,,,corpus,Well Logs,Well Log,A,,,True\n\
             b.segy,f/b.segy,.segy,1,,,,,,,corpus,Seismic Data,Seismic,,,,False\n",
        )
        .unwrap();

        let records = read_inventory_csv(&path).unwrap();
        assert!(records[0].ready);
        assert!(!records[1].ready);
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        std::fs::write(&raw, r#"{"name": "not an array"}"#).unwrap();
        assert!(load_raw_inventory(&raw).is_err());
        assert!(load_raw_inventory(&dir.path().join("missing.json")).is_err());

        let csv_path = dir.path().join("bad.csv");
        std::fs::write(&csv_path, "FileName,FilePath\nx,y\n").unwrap();
        assert!(matches!(read_inventory_csv(&csv_path), Err(OsduError::Parse(_))));
    }
}
