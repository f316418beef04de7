//! Human-readable cluster labels

use crate::error::{AggregationError, Result};

/// Joins member ids into a display label.
///
/// If any leaf id contains the separator or a backslash, every id is
/// backslash-escaped first so that distinct member lists never share a label.
#[derive(Debug, Clone)]
pub struct ClusterLabeler {
    separator: String,
    escape: bool,
}

impl ClusterLabeler {
    pub fn new(separator: &str, leaf_ids: &[String]) -> Result<Self> {
        if separator.is_empty() {
            return Err(AggregationError::EmptySeparator);
        }
        let escape = leaf_ids
            .iter()
            .any(|id| id.contains(separator) || id.contains('\\'));
        if escape {
            log::warn!("region ids contain `{}`; cluster labels will be escaped", separator);
        }
        Ok(Self {
            separator: separator.to_string(),
            escape,
        })
    }

    fn escape_id(&self, id: &str) -> String {
        if !self.escape {
            return id.to_string();
        }
        id.replace('\\', "\\\\")
            .replace(&self.separator, &format!("\\{}", self.separator))
    }

    pub fn label<S: AsRef<str>>(&self, members: &[S]) -> String {
        members
            .iter()
            .map(|id| self.escape_id(id.as_ref()))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}
