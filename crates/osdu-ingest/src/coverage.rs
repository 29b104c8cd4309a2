//! Manifest coverage assessment
//!
//! Cross-references the classified inventory with the catalog of known schema
//! kinds and reports, per category, how many files a known kind covers.
//! `Unknown` files are counted in their own slot and never contribute to a
//! category percentage.
//!
//! Everything is kept in ordered maps and sets, so the same inventory and
//! catalog always render to the same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use osdu_common::types::{Category, ClassifiedRecord, SchemaKind};
use osdu_common::{OsduError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Number of missing file names shown per category in the text report
pub const MISSING_PREVIEW: usize = 5;

// ============================================================================
// Schema catalog
// ============================================================================

/// The set of schema kinds manifests exist for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaCatalog {
    kinds: BTreeSet<SchemaKind>,
}

impl SchemaCatalog {
    pub fn from_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for kind in kinds {
            catalog.insert(SchemaKind::new(kind), "inline");
        }
        catalog
    }

    /// Load every `*.json` manifest in a directory and collect its `kind`.
    ///
    /// Files that are not valid JSON or carry no `kind` are skipped with a
    /// warning. An unreadable directory is an error.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut catalog = Self::default();
        for path in files {
            let source = path.display().to_string();
            let content = std::fs::read_to_string(&path)?;
            let manifest: Value = match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(e) => {
                    warn!(file = %source, error = %e, "Skipping manifest that is not valid JSON");
                    continue;
                },
            };

            match manifest.get("kind").and_then(Value::as_str) {
                Some(kind) if !kind.trim().is_empty() => {
                    catalog.insert(SchemaKind::new(kind), &source);
                },
                _ => warn!(file = %source, "Manifest does not have a 'kind' field"),
            }
        }

        info!(dir = %dir.display(), kinds = catalog.len(), "Loaded schema catalog from manifests");
        Ok(catalog)
    }

    /// Load a schemas file.
    ///
    /// Accepted shapes: an array of kind strings, an array of objects with a
    /// `kind` or `schema` field, or groups of the form
    /// `{"category": ..., "schemas": [...]}` holding either of the former.
    pub fn from_schemas_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let catalog = Self::from_json(&value)?;
        info!(path = %path.display(), kinds = catalog.len(), "Loaded schema catalog");
        Ok(catalog)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| OsduError::invalid_input("schemas file must contain a JSON array"))?;

        let mut catalog = Self::default();
        for item in items {
            match item.get("schemas").and_then(Value::as_array) {
                Some(group) => {
                    let source = item
                        .get("category")
                        .and_then(Value::as_str)
                        .unwrap_or("ungrouped");
                    for schema in group {
                        catalog.insert_entry(schema, source);
                    }
                },
                None => catalog.insert_entry(item, "schemas"),
            }
        }
        Ok(catalog)
    }

    fn insert_entry(&mut self, entry: &Value, source: &str) {
        let kind = match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("kind")
                .or_else(|| obj.get("schema"))
                .and_then(Value::as_str),
            _ => None,
        };

        match kind.map(str::trim).filter(|k| !k.is_empty()) {
            Some(kind) => self.insert(SchemaKind::new(kind), source),
            None => warn!(source, entry = %entry, "Ignoring schema entry without a kind"),
        }
    }

    fn insert(&mut self, kind: SchemaKind, source: &str) {
        if self.kinds.contains(&kind) {
            warn!(kind = %kind, source, "Duplicate schema kind");
            return;
        }
        debug!(kind = %kind, source, "Registered schema kind");
        self.kinds.insert(kind);
    }

    pub fn contains(&self, kind: &SchemaKind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &SchemaKind> {
        self.kinds.iter()
    }
}

// ============================================================================
// Coverage report
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCoverage {
    pub total: usize,
    pub covered: usize,
    /// File names whose schema kind is not in the catalog, in inventory order
    pub missing: Vec<String>,
    pub file_types: BTreeSet<String>,
}

impl CategoryCoverage {
    fn record(&mut self, record: &ClassifiedRecord, covered: bool) {
        self.total += 1;
        self.file_types.insert(record.record.extension());
        if covered {
            self.covered += 1;
        } else {
            self.missing.push(record.file_name().to_string());
        }
    }

    /// covered / total * 100, or 0 for an empty category
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.covered as f64 / self.total as f64 * 100.0
        }
    }

    fn render(&self, name: &str, with_percentage: bool) -> String {
        let file_types = self
            .file_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let preview = self
            .missing
            .iter()
            .take(MISSING_PREVIEW)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let more = if self.missing.len() > MISSING_PREVIEW { " ..." } else { "" };

        let mut out = format!("{}:\n  Total files: {}\n", name, self.total);
        if with_percentage {
            out.push_str(&format!(
                "  Covered by manifests: {}\n  Coverage percentage: {:.2}%\n",
                self.covered,
                self.percentage()
            ));
        }
        out.push_str(&format!(
            "  File types: {}\n  Missing manifests for: {}{}\n",
            file_types, preview, more
        ));
        out
    }

    fn to_json(&self) -> Value {
        json!({
            "total": self.total,
            "covered": self.covered,
            "percentage": (self.percentage() * 100.0).round() / 100.0,
            "file_types": self.file_types,
            "missing": self.missing,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport {
    /// Classified categories present in the inventory
    pub categories: BTreeMap<Category, CategoryCoverage>,
    /// Files no rule classified
    pub unknown: Option<CategoryCoverage>,
}

impl CoverageReport {
    pub fn assess(inventory: &[ClassifiedRecord], catalog: &SchemaCatalog) -> Self {
        let mut report = Self::default();

        for record in inventory {
            let covered = catalog.contains(&record.schema);
            let slot = if record.category.is_unknown() {
                report.unknown.get_or_insert_with(CategoryCoverage::default)
            } else {
                report.categories.entry(record.category).or_default()
            };
            slot.record(record, covered);
        }

        info!(
            records = inventory.len(),
            categories = report.categories.len(),
            unknown = report.unknown.as_ref().map_or(0, |u| u.total),
            "Assessed manifest coverage"
        );
        report
    }

    pub fn category(&self, category: Category) -> Option<&CategoryCoverage> {
        if category.is_unknown() {
            self.unknown.as_ref()
        } else {
            self.categories.get(&category)
        }
    }

    /// Plain-text report, one block per category, blocks separated by a blank line.
    ///
    /// Unclassified files come last and carry no percentage.
    pub fn render_text(&self) -> String {
        let mut blocks: Vec<String> = self
            .categories
            .iter()
            .map(|(category, coverage)| coverage.render(category.as_str(), true))
            .collect();

        if let Some(unknown) = &self.unknown {
            blocks.push(unknown.render(Category::Unknown.as_str(), false));
        }

        blocks.join("\n")
    }

    pub fn to_json(&self) -> Value {
        let categories: serde_json::Map<String, Value> = self
            .categories
            .iter()
            .map(|(category, coverage)| (category.to_string(), coverage.to_json()))
            .collect();

        json!({
            "categories": categories,
            "unknown": self.unknown.as_ref().map(|u| json!({
                "total": u.total,
                "file_types": u.file_types,
                "missing": u.missing,
            })),
        })
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render_text())?;
        info!(path = %path.display(), "Saved coverage report");
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.to_json())?)?;
        info!(path = %path.display(), "Saved coverage summary");
        Ok(())
    }
}
