//! Declarative partitioning rules
//!
//! A [`SyncRule`] selects directories below the sync root with a glob,
//! orders them, and takes a window of them for one sync instance.

use serde::{Deserialize, Serialize};

/// Count substituted when `sort_count` cannot be read as a positive integer
pub const DEFAULT_SORT_COUNT: usize = 3;

/// How a rule orders its candidate directories
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortMethod {
    /// Descending by path string
    #[default]
    NameHighFirst,
    /// Ascending by path string
    NameLowFirst,
    /// Anything else; partitioning refuses to run with it
    Unrecognized(String),
}

impl SortMethod {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NameHighFirst => "name_highfirst",
            Self::NameLowFirst => "name_lowfirst",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for SortMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "name_highfirst" => Self::NameHighFirst,
            "name_lowfirst" => Self::NameLowFirst,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<SortMethod> for String {
    fn from(value: SortMethod) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SortMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `sort_count` value as written in the rule file.
///
/// Kept loose on purpose: a malformed count degrades that single rule to
/// [`DEFAULT_SORT_COUNT`] instead of failing the config load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortCount {
    Integer(i64),
    Other(serde_json::Value),
}

impl SortCount {
    /// The count as a positive integer, if it can be read as one.
    ///
    /// Integral floats and numeric strings are accepted.
    pub fn as_positive(&self) -> Option<usize> {
        let n = match self {
            Self::Integer(n) => *n,
            Self::Other(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok()?,
            Self::Other(serde_json::Value::Number(n)) => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
            Self::Other(_) => return None,
        };
        usize::try_from(n).ok().filter(|n| *n > 0)
    }
}

/// One partitioning rule.
///
/// Rules are evaluated in file order; a directory taken by an earlier rule
/// is unavailable to later rules unless they set `overlap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncRule {
    /// Instance name; also the record key and the unison label
    pub syncname: String,
    /// Glob relative to the sync root, e.g. `"Art Department/11*"`
    pub dir_selector: String,
    #[serde(default)]
    pub sort_method: SortMethod,
    /// Maximum directories taken; all when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_count: Option<SortCount>,
    /// Directories skipped before counting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_offset: Option<usize>,
    #[serde(default)]
    pub overlap: bool,
}

impl SyncRule {
    /// Rule with defaults for everything but name and selector
    pub fn new(syncname: impl Into<String>, dir_selector: impl Into<String>) -> Self {
        Self {
            syncname: syncname.into(),
            dir_selector: dir_selector.into(),
            sort_method: SortMethod::default(),
            sort_count: None,
            sort_offset: None,
            overlap: false,
        }
    }

    pub fn with_sort(mut self, sort_method: SortMethod) -> Self {
        self.sort_method = sort_method;
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.sort_count = Some(SortCount::Integer(count));
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.sort_offset = Some(offset);
        self
    }

    pub fn with_overlap(mut self) -> Self {
        self.overlap = true;
        self
    }

    /// Number of directories to take, `None` meaning "all".
    ///
    /// Logs and substitutes [`DEFAULT_SORT_COUNT`] for unusable values.
    pub fn effective_count(&self) -> Option<usize> {
        let raw = self.sort_count.as_ref()?;
        match raw.as_positive() {
            Some(n) => Some(n),
            None => {
                tracing::warn!(
                    syncname = %self.syncname,
                    sort_count = ?raw,
                    default = DEFAULT_SORT_COUNT,
                    "sort_count is not a positive integer, using default"
                );
                Some(DEFAULT_SORT_COUNT)
            }
        }
    }
}
