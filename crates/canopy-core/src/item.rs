//! Remote items and the records derived from them.
//!
//! An [`Item`] is what the remote listing hands us: a file or a folder
//! with a stable id. A [`Record`] is the durable unit we write into a
//! ledger the first time an item is seen under a topic.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// The mime type the remote listing uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Builds the viewer URL stored with every record.
///
/// Existing records were written with exactly this shape, so it must not
/// change.
pub fn viewer_link(id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view?usp=sharing", id)
}

/// Whether an item is a folder (expanded during enumeration) or a file
/// (the thing we actually record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Folder,
    File,
}

impl ItemKind {
    /// Classifies a listing entry by its mime type.
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            Self::Folder
        } else {
            Self::File
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Folder => "folder",
            Self::File => "file",
        };
        write!(f, "{}", s)
    }
}

/// An entry in a remote folder listing.
///
/// Items are produced by the listing service and never mutated here.
/// Equality and hashing go by id only, since ids are globally unique
/// on the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Opaque remote identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// File or folder.
    pub kind: ItemKind,

    /// Mime type as reported by the remote listing.
    pub mime_type: String,

    /// Size in bytes. Folders and native documents have none.
    pub size: Option<u64>,

    /// Absent when the listing didn't report it.
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Creates a file item without timestamps.
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ItemKind::File, "application/octet-stream")
    }

    /// Creates a folder item without timestamps.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ItemKind::Folder, FOLDER_MIME_TYPE)
    }

    /// Creates an item from its raw listing fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ItemKind,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            mime_type: mime_type.into(),
            size: None,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// Builder pattern: set the modification time.
    pub fn with_modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }

    /// Builder pattern: set the creation time.
    pub fn with_created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Builder pattern: set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Builder pattern: set the mime type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The durable unit written to a ledger for a (topic, item) pair.
///
/// Serialized with camelCase field names, the shape stored documents use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub link: String,
    pub topic: String,
    pub description: String,
    pub id: String,
    pub mime_type: String,

    /// Byte count as a decimal string, empty when unknown.
    pub size: String,

    /// RFC 3339, millisecond precision, `Z` suffix.
    pub created_time: String,
    pub modified_time: String,

    /// Unix seconds at which this record was written.
    pub timestamp: i64,
}

impl Record {
    /// Builds the record for `item` under `topic`, stamped with `written_at`.
    pub fn new(topic: &str, item: &Item, written_at: DateTime<Utc>) -> Self {
        Self {
            name: item.name.clone(),
            link: viewer_link(&item.id),
            topic: topic.to_string(),
            description: String::new(),
            id: item.id.clone(),
            mime_type: item.mime_type.clone(),
            size: item.size.map(|s| s.to_string()).unwrap_or_default(),
            created_time: listing_time(item.created_at),
            modified_time: listing_time(item.modified_at),
            timestamp: written_at.timestamp(),
        }
    }
}

/// RFC 3339 with milliseconds and `Z`, or empty when unknown.
fn listing_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Marker asserting a topic was checked and found empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub topic: String,
    pub placeholder: bool,
    pub timestamp: i64,
}

impl Placeholder {
    pub fn new(topic: &str, written_at: DateTime<Utc>) -> Self {
        Self {
            topic: topic.to_string(),
            placeholder: true,
            timestamp: written_at.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_from_mime_type() {
        assert_eq!(ItemKind::from_mime_type(FOLDER_MIME_TYPE), ItemKind::Folder);
        assert_eq!(ItemKind::from_mime_type("application/pdf"), ItemKind::File);
    }

    #[test]
    fn test_items_compare_by_id() {
        let a = Item::file("x", "one.pdf");
        let b = Item::file("x", "renamed.pdf").with_size(10);
        assert_eq!(a, b);
        assert_ne!(a, Item::file("y", "one.pdf"));
    }

    #[test]
    fn test_record_fields() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let modified = Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap();
        let item = Item::file("1AbC", "notes.pdf")
            .with_mime_type("application/pdf")
            .with_size(2048)
            .with_created(created)
            .with_modified(modified);

        let written = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let record = Record::new("Physics_S1", &item, written);

        assert_eq!(
            record.link,
            "https://drive.google.com/file/d/1AbC/view?usp=sharing"
        );
        assert_eq!(record.size, "2048");
        assert_eq!(record.created_time, "2024-03-01T08:00:00.000Z");
        assert_eq!(record.modified_time, "2024-03-02T09:30:00.000Z");
        assert_eq!(record.timestamp, written.timestamp());
        assert!(record.description.is_empty());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = Record::new("t", &Item::file("id1", "a.txt"), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("mimeType").is_some());
        assert!(json.get("createdTime").is_some());
        assert_eq!(json["size"], "");
    }

    #[test]
    fn test_missing_times_are_written_empty() {
        let modified = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let item = Item::file("id1", "a.txt").with_modified(modified);
        let record = Record::new("t", &item, Utc::now());

        assert_eq!(record.created_time, "");
        assert_eq!(record.modified_time, "2024-05-01T00:00:00.000Z");
    }
}
