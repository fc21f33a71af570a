//! Class code to human label

use once_cell::sync::Lazy;
use serde::Serialize;

const BUILTIN_LEGEND: &str = include_str!("../data/legend.json");

// Checked by test_builtin_table_parses
static BUILTIN: Lazy<Vec<String>> = Lazy::new(|| serde_json::from_str(BUILTIN_LEGEND).unwrap_or_default());

/// Legend table indexed by class code
///
/// Blank entries are reserved codes. Lookups never fail: blank, negative
/// and out-of-table codes render as `Class <n>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    labels: Vec<String>,
}

/// A labelled legend entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub code: i32,
    pub label: String,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            labels: BUILTIN.clone(),
        }
    }
}

impl Legend {
    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Configured table if present, built-in otherwise
    pub fn from_override(labels: Option<&[String]>) -> Self {
        match labels {
            Some(labels) => Self::from_labels(labels.to_vec()),
            None => Self::default(),
        }
    }

    pub fn label(&self, code: i32) -> String {
        usize::try_from(code)
            .ok()
            .and_then(|index| self.labels.get(index))
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Class {}", code))
    }

    /// Non-blank entries in code order
    pub fn entries(&self) -> Vec<LegendEntry> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| !label.trim().is_empty())
            .map(|(code, label)| LegendEntry {
                code: code as i32,
                label: label.trim().to_string(),
            })
            .collect()
    }

    /// Table size including reserved codes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_parses() {
        let parsed: Vec<String> = serde_json::from_str(BUILTIN_LEGEND).unwrap();
        assert_eq!(parsed.len(), 50);
        assert_eq!(Legend::default().len(), 50);
    }

    #[test]
    fn test_known_labels() {
        let legend = Legend::default();
        assert_eq!(legend.label(3), "Forest Formation");
        assert_eq!(legend.label(15), "Pasture");
        assert_eq!(legend.label(24), "Urban Area");
        assert_eq!(legend.label(33), "River, Lake and Ocean");
        assert_eq!(legend.label(49), "Wooded Restinga");
    }

    #[test]
    fn test_fallback_labels() {
        let legend = Legend::default();
        assert_eq!(legend.label(0), "Class 0");
        assert_eq!(legend.label(2), "Class 2");
        assert_eq!(legend.label(50), "Class 50");
        assert_eq!(legend.label(62), "Class 62");
        assert_eq!(legend.label(-1), "Class -1");
    }

    #[test]
    fn test_entries_skip_reserved() {
        let entries = Legend::default().entries();
        assert_eq!(entries.len(), 34);
        assert_eq!(entries[0], LegendEntry { code: 1, label: "Forest".into() });
        assert!(entries.windows(2).all(|w| w[0].code < w[1].code));
    }

    #[test]
    fn test_override() {
        let labels = vec!["".to_string(), "Floresta".to_string()];
        let legend = Legend::from_override(Some(&labels));
        assert_eq!(legend.label(1), "Floresta");
        assert_eq!(legend.label(3), "Class 3");
        assert_eq!(Legend::from_override(None), Legend::default());
    }
}
