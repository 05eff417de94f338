//! Listing queries and their filter expressions.

use canopy_core::FOLDER_MIME_TYPE;
use chrono::{DateTime, SecondsFormat, Utc};

/// One folder listing request, independent of paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Folder whose direct children are listed.
    pub parent: String,

    /// Only children modified strictly after this instant.
    pub modified_after: Option<DateTime<Utc>>,

    /// Only children that are folders.
    pub folders_only: bool,
}

impl ListQuery {
    /// All non-trashed direct children of `parent`.
    pub fn children(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            modified_after: None,
            folders_only: false,
        }
    }

    /// Builder pattern: restrict to children modified after `cutoff`.
    pub fn modified_after(mut self, cutoff: DateTime<Utc>) -> Self {
        self.modified_after = Some(cutoff);
        self
    }

    /// Builder pattern: restrict to subfolders.
    pub fn folders_only(mut self) -> Self {
        self.folders_only = true;
        self
    }

    /// Renders the Drive `q` parameter.
    ///
    /// ```
    /// use canopy_drive::ListQuery;
    ///
    /// let q = ListQuery::children("abc").folders_only();
    /// assert_eq!(
    ///     q.filter_expression(),
    ///     "'abc' in parents and trashed=false and mimeType = 'application/vnd.google-apps.folder'"
    /// );
    /// ```
    pub fn filter_expression(&self) -> String {
        let mut expr = format!("'{}' in parents and trashed=false", escape(&self.parent));
        if let Some(cutoff) = self.modified_after {
            expr.push_str(&format!(
                " and modifiedTime > '{}'",
                cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if self.folders_only {
            expr.push_str(&format!(" and mimeType = '{}'", FOLDER_MIME_TYPE));
        }
        expr
    }
}

/// Escapes a value for use inside a single-quoted query literal.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_children() {
        assert_eq!(
            ListQuery::children("1xYz").filter_expression(),
            "'1xYz' in parents and trashed=false"
        );
    }

    #[test]
    fn test_modified_after() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            ListQuery::children("p").modified_after(cutoff).filter_expression(),
            "'p' in parents and trashed=false and modifiedTime > '2024-01-02T03:04:05Z'"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(
            ListQuery::children("it's").filter_expression(),
            "'it\\'s' in parents and trashed=false"
        );
    }
}
