//! Rule-based classification of stored objects
//!
//! Every object is mapped to a [`Category`] and a target [`SchemaKind`] by one
//! ordered rule table. Extension rules come first; folder keyword rules are
//! the fallback. The first matching rule wins, so the table order is the
//! tie-break when a path contains several keywords.
//!
//! Classification never fails: anything no rule matches is `Unknown`/`Unknown`.

use osdu_common::types::{
    file_name_of, folder_of, extension_of, Category, ClassifiedRecord, ExtractedMetadata,
    ObjectRecord, SchemaKind, DATE, SURVEY_NAME, WELL_ID,
};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::readiness::ReadinessPolicy;

/// What a rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    /// Exact lower-case file extension, including the dot
    Extension(&'static str),
    /// Any of these substrings in the lower-cased containing folder
    FolderKeyword(&'static [&'static str]),
}

/// One entry of the classification table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRule {
    pub matcher: RuleMatch,
    pub category: Category,
    pub schema: &'static str,
}

impl ClassificationRule {
    const fn ext(extension: &'static str, category: Category, schema: &'static str) -> Self {
        Self {
            matcher: RuleMatch::Extension(extension),
            category,
            schema,
        }
    }

    const fn folder(
        keywords: &'static [&'static str],
        category: Category,
        schema: &'static str,
    ) -> Self {
        Self {
            matcher: RuleMatch::FolderKeyword(keywords),
            category,
            schema,
        }
    }

    /// `extension` and `folder` must already be lower-cased.
    fn matches(&self, extension: &str, folder: &str) -> bool {
        match self.matcher {
            RuleMatch::Extension(ext) => ext == extension,
            RuleMatch::FolderKeyword(keywords) => keywords.iter().any(|k| folder.contains(k)),
        }
    }
}

/// The classification table, evaluated top to bottom.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule::ext(".las", Category::WellLogs, "Well Log"),
    ClassificationRule::ext(".dlis", Category::WellLogs, "Well Log"),
    ClassificationRule::ext(".segy", Category::SeismicData, "Seismic"),
    ClassificationRule::ext(".sgy", Category::SeismicData, "Seismic"),
    ClassificationRule::ext(".xml", Category::RealTimeDrillingData, "Wellbore Trajectory"),
    ClassificationRule::ext(".witsml", Category::RealTimeDrillingData, "Wellbore Trajectory"),
    ClassificationRule::ext(".csv", Category::ProductionData, "Production Data"),
    ClassificationRule::ext(".json", Category::ProductionData, "Production Data"),
    ClassificationRule::ext(".grdecl", Category::ReservoirModels, "Reservoir"),
    ClassificationRule::ext(".rms", Category::ReservoirModels, "Reservoir"),
    ClassificationRule::ext(".pdf", Category::Documents, "Work Product"),
    ClassificationRule::ext(".docx", Category::Documents, "Work Product"),
    ClassificationRule::ext(".xlsx", Category::Documents, "Work Product"),
    ClassificationRule::ext(".p1", Category::SeismicData, "SeismicLineGeometry"),
    ClassificationRule::ext(".p11", Category::SeismicData, "SeismicLineGeometry"),
    ClassificationRule::ext(".p6", Category::SeismicData, "SeismicBinGrid"),
    ClassificationRule::ext(".resqml", Category::GeophysicalInterpretation, "SeismicHorizon"),
    ClassificationRule::folder(&["well_logs"], Category::WellLogs, "Well Log"),
    ClassificationRule::folder(&["seismic"], Category::SeismicData, "Seismic"),
    ClassificationRule::folder(&["production"], Category::ProductionData, "Production Data"),
    ClassificationRule::folder(&["reservoir"], Category::ReservoirModels, "Reservoir"),
    ClassificationRule::folder(
        &["witsml", "drilling"],
        Category::RealTimeDrillingData,
        "Wellbore Trajectory",
    ),
    ClassificationRule::folder(&["wellbore"], Category::WellboreData, "Wellbore"),
    ClassificationRule::folder(
        &["marker", "horizon"],
        Category::MarkersAndHorizons,
        "Markers and Horizons",
    ),
];

/// Classify a file by extension, falling back to keywords in its folder.
///
/// The extension may be given with or without its leading dot, in any case.
pub fn classify(extension: &str, folder: &str) -> (Category, SchemaKind) {
    let extension = normalize_extension(extension);
    let folder = folder.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.matches(&extension, &folder))
        .map(|rule| (rule.category, SchemaKind::new(rule.schema)))
        .unwrap_or((Category::Unknown, SchemaKind::unknown()))
}

/// Classify an object path directly.
pub fn classify_path(path: &str) -> (Category, SchemaKind) {
    classify(&extension_of(file_name_of(path)), folder_of(path))
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed.to_lowercase()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

/// Pulls well identifiers, survey names and dates out of file names.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    well_id: Regex,
    survey_name: Regex,
    date: Regex,
}

impl MetadataExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            well_id: Regex::new(r"([A-Z0-9-]+)")?,
            survey_name: RegexBuilder::new(r"([A-Z0-9-]+)_survey")
                .case_insensitive(true)
                .build()?,
            date: Regex::new(r"(\d{4}-\d{2}-\d{2})")?,
        })
    }

    /// Best-effort extraction; a pattern that does not match leaves its field out.
    pub fn extract(&self, file_name: &str, category: Category) -> ExtractedMetadata {
        let mut metadata = ExtractedMetadata::new();
        let first = |re: &Regex| {
            re.captures(file_name)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        match category {
            Category::WellLogs => {
                if let Some(well_id) = first(&self.well_id) {
                    metadata.insert(WELL_ID.to_string(), well_id);
                }
            },
            Category::SeismicData => {
                if let Some(survey) = first(&self.survey_name) {
                    metadata.insert(SURVEY_NAME.to_string(), survey);
                }
            },
            _ => {},
        }

        if let Some(date) = first(&self.date) {
            metadata.insert(DATE.to_string(), date);
        }

        metadata
    }
}

/// Full classification step: rules, metadata extraction, readiness.
#[derive(Debug, Clone)]
pub struct Classifier {
    extractor: MetadataExtractor,
    readiness: ReadinessPolicy,
}

impl Classifier {
    pub fn new(readiness: ReadinessPolicy) -> Result<Self, regex::Error> {
        Ok(Self {
            extractor: MetadataExtractor::new()?,
            readiness,
        })
    }

    pub fn with_default_policy() -> Result<Self, regex::Error> {
        Self::new(ReadinessPolicy::default())
    }

    pub fn classify_record(&self, record: ObjectRecord) -> ClassifiedRecord {
        let (category, schema) = classify(&record.extension(), record.folder());
        let metadata = self.extractor.extract(record.file_name(), category);
        let ready = self.readiness.is_ready(category, &metadata);

        debug!(
            path = %record.path,
            category = %category,
            schema = %schema,
            ready,
            "Classified object"
        );

        ClassifiedRecord {
            record,
            category,
            schema,
            metadata,
            ready,
        }
    }

    pub fn classify_all(&self, records: impl IntoIterator<Item = ObjectRecord>) -> Vec<ClassifiedRecord> {
        records
            .into_iter()
            .map(|record| self.classify_record(record))
            .collect()
    }
}
