//! Bulk dataset registration and record deletion
//!
//! Both operations walk their input strictly in order, one request at a time.
//! Every input item produces exactly one [`BulkItemResult`]; an item missing
//! its key field or a request that never got an answer is recorded as a
//! failure and the loop moves on. The written result file ends with one
//! `{"summary": ...}` record.

use std::path::Path;

use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::client::{AdmeClient, RawResponse};

pub const DATASET_KIND: &str = "osdu:wks:dataset--File.Generic:1.0.0";
pub const SECURITY_CLASSIFICATION: &str =
    "osdu:reference-data--ResourceSecurityClassification:RESTRICTED:";
pub const SCHEMA_FORMAT_TYPE: &str =
    "osdu:reference-data--SchemaFormatType:TabSeparatedColumnarText:";

/// Status code the dataset service answers a registration with
pub const REGISTER_SUCCESS: u16 = 201;
/// Status code the storage service answers a deletion with
pub const DELETE_SUCCESS: u16 = 204;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub status: BulkStatus,
    /// `None` when no response was received
    pub response_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub original_data: Value,
}

impl BulkItemResult {
    fn answered(response: RawResponse, success_code: u16, original_data: Value) -> Self {
        let status = if response.status == success_code {
            BulkStatus::Success
        } else {
            BulkStatus::Failure
        };
        Self {
            status,
            response_code: Some(response.status),
            response_body: response.body,
            error: None,
            original_data,
        }
    }

    fn failed(error: impl Into<String>, original_data: Value) -> Self {
        Self {
            status: BulkStatus::Failure,
            response_code: None,
            response_body: None,
            error: Some(error.into()),
            original_data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BulkStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_datasets_processed: usize,
    pub total_successes: usize,
    pub total_failures: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub items: Vec<BulkItemResult>,
    pub summary: BulkSummary,
}

impl BulkReport {
    fn from_items(items: Vec<BulkItemResult>) -> Self {
        let total_successes = items.iter().filter(|i| i.is_success()).count();
        let summary = BulkSummary {
            total_datasets_processed: items.len(),
            total_successes,
            total_failures: items.len() - total_successes,
        };
        Self { items, summary }
    }

    /// Item records followed by the trailing summary record
    pub fn to_json(&self) -> Result<Value> {
        let mut records = self
            .items
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.push(json!({ "summary": self.summary }));
        Ok(Value::Array(records))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.to_json()?)?)?;
        info!(path = %path.display(), "Saved bulk results");
        Ok(())
    }
}

/// Read a bulk input file: a JSON array of items.
///
/// A trailing `{"summary": ...}` record, as written by a previous bulk run,
/// is dropped so result files can be fed straight back in.
pub fn load_items(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Array(mut items) = value else {
        return Err(OsduError::invalid_input(format!(
            "{} must contain a JSON array",
            path.display()
        )));
    };
    if items
        .last()
        .and_then(Value::as_object)
        .is_some_and(|last| last.len() == 1 && last.contains_key("summary"))
    {
        items.pop();
    }
    Ok(items)
}

/// Registration payload for one uploaded file
pub fn dataset_registration(file_source: &str, legal_tag: &str, partition: &str) -> Value {
    json!({
        "datasetRegistries": [{
            "kind": DATASET_KIND,
            "acl": {
                "viewers": [format!("data.default.viewers@{}.dataservices.energy", partition)],
                "owners": [format!("data.default.owners@{}.dataservices.energy", partition)],
            },
            "legal": {
                "legaltags": [legal_tag],
                "otherRelevantDataCountries": ["US"],
                "status": "compliant",
            },
            "data": {
                "DatasetProperties": {
                    "FileSourceInfo": { "FileSource": file_source },
                },
                "ResourceSecurityClassification": SECURITY_CLASSIFICATION,
                "SchemaFormatTypeID": SCHEMA_FORMAT_TYPE,
            },
            "meta": [],
            "tags": {},
        }]
    })
}

fn file_source_of(item: &Value) -> Option<&str> {
    item.pointer("/original_data/response/storageLocation/fileSource")
        .and_then(Value::as_str)
}

fn record_id_of(item: &Value) -> Option<&str> {
    item.pointer("/response_body/datasetRegistries/0/id")
        .and_then(Value::as_str)
}

/// Register one dataset per uploaded file.
pub async fn register_datasets(client: &AdmeClient, items: Vec<Value>, legal_tag: &str) -> BulkReport {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let Some(file_source) = file_source_of(&item).map(str::to_string) else {
            warn!("Item has no original_data.response.storageLocation.fileSource");
            results.push(BulkItemResult::failed("missing fileSource", item));
            continue;
        };

        let payload = dataset_registration(&file_source, legal_tag, client.data_partition_id());
        let result = match client.register_dataset(&payload).await {
            Ok(response) => BulkItemResult::answered(response, REGISTER_SUCCESS, item),
            Err(e) => {
                error!(file_source = %file_source, error = %e, "Registration request failed");
                BulkItemResult::failed(e.to_string(), item)
            },
        };

        if result.is_success() {
            let id = result.response_body.as_ref().and_then(|b| {
                b.pointer("/datasetRegistries/0/id").and_then(Value::as_str)
            });
            info!(file_source = %file_source, id = id.unwrap_or("?"), "Dataset registered");
        } else if result.response_code.is_some() {
            warn!(file_source = %file_source, code = ?result.response_code, "Failed to register dataset");
        }
        results.push(result);
    }

    finish("register", results)
}

/// Delete the records created by a previous registration run.
pub async fn delete_records(client: &AdmeClient, items: Vec<Value>) -> BulkReport {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let Some(record_id) = record_id_of(&item).map(str::to_string) else {
            warn!("Item has no response_body.datasetRegistries[0].id");
            results.push(BulkItemResult::failed("missing dataset id", item));
            continue;
        };

        let result = match client.delete_record(&record_id).await {
            Ok(response) => BulkItemResult::answered(response, DELETE_SUCCESS, item),
            Err(e) => {
                error!(id = %record_id, error = %e, "Delete request failed");
                BulkItemResult::failed(e.to_string(), item)
            },
        };

        if result.is_success() {
            info!(id = %record_id, "Dataset deleted");
        } else if result.response_code.is_some() {
            warn!(id = %record_id, code = ?result.response_code, "Failed to delete dataset");
        }
        results.push(result);
    }

    finish("delete", results)
}

fn finish(operation: &str, results: Vec<BulkItemResult>) -> BulkReport {
    let report = BulkReport::from_items(results);
    info!(
        operation,
        total = report.summary.total_datasets_processed,
        successes = report.summary.total_successes,
        failures = report.summary.total_failures,
        "Bulk operation finished"
    );
    report
}
