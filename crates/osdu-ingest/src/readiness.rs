//! Manifest readiness
//!
//! A record is ready when every metadata field its category requires is
//! present and non-empty. Categories without an entry need nothing, which
//! includes `Unknown`: unclassified files are ready unless a caller registers
//! requirements for them.

use std::collections::BTreeMap;

use osdu_common::types::{Category, ExtractedMetadata, DATE, SURVEY_NAME, WELL_ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    required: BTreeMap<Category, Vec<String>>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::empty()
            .require(Category::WellLogs, [WELL_ID])
            .require(Category::SeismicData, [SURVEY_NAME])
            .require(Category::ProductionData, [DATE])
    }
}

impl ReadinessPolicy {
    /// Policy that considers every record ready
    pub fn empty() -> Self {
        Self {
            required: BTreeMap::new(),
        }
    }

    /// Add required fields for a category, keeping any already registered.
    pub fn require<I, S>(mut self, category: Category, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.required.entry(category).or_default();
        for field in fields {
            let field = field.into();
            if !entry.contains(&field) {
                entry.push(field);
            }
        }
        self
    }

    pub fn required_fields(&self, category: Category) -> &[String] {
        self.required
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_ready(&self, category: Category, metadata: &ExtractedMetadata) -> bool {
        self.required_fields(category).iter().all(|field| {
            metadata
                .get(field)
                .is_some_and(|value| !value.trim().is_empty())
        })
    }
}

/// Readiness under the default policy
pub fn is_ready(category: Category, metadata: &ExtractedMetadata) -> bool {
    ReadinessPolicy::default().is_ready(category, metadata)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metadata(pairs: &[(&str, &str)]) -> ExtractedMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_required_fields() {
        assert!(is_ready(Category::WellLogs, &metadata(&[(WELL_ID, "W-1")])));
        assert!(!is_ready(Category::WellLogs, &metadata(&[])));
        assert!(!is_ready(Category::WellLogs, &metadata(&[(WELL_ID, "")])));
        assert!(!is_ready(Category::SeismicData, &metadata(&[(DATE, "2020-01-01")])));
        assert!(is_ready(Category::ProductionData, &metadata(&[(DATE, "2020-01-01")])));
    }

    #[test]
    fn test_categories_without_requirements_are_ready() {
        for category in [Category::Documents, Category::ReservoirModels, Category::Unknown] {
            assert!(is_ready(category, &metadata(&[])), "{category} should be ready");
        }
    }

    #[test]
    fn test_custom_policy() {
        let policy = ReadinessPolicy::default().require(Category::Unknown, [DATE]);
        assert!(!policy.is_ready(Category::Unknown, &metadata(&[])));
        assert!(policy.is_ready(Category::Unknown, &metadata(&[(DATE, "2020-01-01")])));
        assert_eq!(policy.required_fields(Category::WellLogs), [WELL_ID.to_string()]);
    }

    #[test]
    fn test_require_does_not_duplicate() {
        let policy = ReadinessPolicy::default().require(Category::WellLogs, [WELL_ID, DATE]);
        assert_eq!(policy.required_fields(Category::WellLogs).len(), 2);
    }

    proptest! {
        // Adding fields never turns a ready record into a not-ready one
        #[test]
        fn prop_readiness_is_monotonic(
            category_idx in 0usize..Category::ALL.len(),
            base in proptest::collection::btree_map("[A-Za-z]{1,8}", "[a-z0-9]{1,5}", 0..4),
            extra in proptest::collection::btree_map("[A-Za-z]{1,8}", "[a-z0-9]{1,5}", 0..4),
        ) {
            let category = Category::ALL[category_idx];
            let mut required = base.clone();
            required.insert(WELL_ID.to_string(), "W".to_string());
            required.insert(SURVEY_NAME.to_string(), "S".to_string());
            required.insert(DATE.to_string(), "2020-01-01".to_string());

            prop_assert!(is_ready(category, &required));

            let mut superset = required.clone();
            for (key, value) in extra {
                superset.entry(key).or_insert(value);
            }
            prop_assert!(is_ready(category, &superset));

            if is_ready(category, &base) {
                let mut grown = base.clone();
                grown.insert("Extra".to_string(), "x".to_string());
                prop_assert!(is_ready(category, &grown));
            }
        }
    }
}
