//! On-disk naming for the record store.
//!
//! ```text
//! <root>/requests/<id>.json           request record
//! <root>/requests/<id>.json.lock      lock marker
//! <root>/responses/<id>.json          response record
//! <root>/responses/<id>.json.done     completion marker
//! <root>/responses/<id>.json.lock     lock marker
//! <root>/*/.<name>.tmp-<uuid>         write in progress
//! ```

use std::path::{Path, PathBuf};

use crate::store::id::RequestId;
use crate::store::lock::LOCK_SUFFIX;

pub const REQUESTS_DIR: &str = "requests";
pub const RESPONSES_DIR: &str = "responses";
pub const RECORD_EXTENSION: &str = ".json";
pub const COMPLETION_SUFFIX: &str = ".done";
const TEMP_MARKER: &str = ".tmp-";

/// What a directory entry in one of the namespaces represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Record(RequestId),
    CompletionMarker(RequestId),
    Lock(RequestId),
    Temp,
    Unknown,
}

impl EntryKind {
    /// Classify a file name found in either namespace.
    pub fn classify(file_name: &str) -> Self {
        if file_name.starts_with('.') {
            return if file_name.contains(TEMP_MARKER) {
                Self::Temp
            } else {
                Self::Unknown
            };
        }
        if let Some(record) = file_name.strip_suffix(LOCK_SUFFIX) {
            return record_id(record).map_or(Self::Unknown, Self::Lock);
        }
        if let Some(record) = file_name.strip_suffix(COMPLETION_SUFFIX) {
            return record_id(record).map_or(Self::Unknown, Self::CompletionMarker);
        }
        record_id(file_name).map_or(Self::Unknown, Self::Record)
    }
}

fn record_id(file_name: &str) -> Option<RequestId> {
    let stem = file_name.strip_suffix(RECORD_EXTENSION)?;
    RequestId::parse(stem).ok()
}

/// Path computations for one store root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.root.join(REQUESTS_DIR)
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.root.join(RESPONSES_DIR)
    }

    pub fn request_path(&self, id: &RequestId) -> PathBuf {
        self.requests_dir().join(record_file_name(id))
    }

    pub fn response_path(&self, id: &RequestId) -> PathBuf {
        self.responses_dir().join(record_file_name(id))
    }

    pub fn completion_marker_path(&self, id: &RequestId) -> PathBuf {
        self.responses_dir()
            .join(format!("{}{}{}", id, RECORD_EXTENSION, COMPLETION_SUFFIX))
    }
}

fn record_file_name(id: &RequestId) -> String {
    format!("{}{}", id, RECORD_EXTENSION)
}

/// Sibling path a record is staged at before being renamed into place.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = format!(".{}{}{}", name, TEMP_MARKER, uuid::Uuid::new_v4().simple());
    path.with_file_name(temp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> RequestId {
        RequestId::parse(raw).unwrap()
    }

    #[test]
    fn test_paths() {
        let layout = StoreLayout::new("/store");
        let a = id("a1");
        assert_eq!(layout.request_path(&a), PathBuf::from("/store/requests/a1.json"));
        assert_eq!(layout.response_path(&a), PathBuf::from("/store/responses/a1.json"));
        assert_eq!(
            layout.completion_marker_path(&a),
            PathBuf::from("/store/responses/a1.json.done")
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(EntryKind::classify("a1.json"), EntryKind::Record(id("a1")));
        assert_eq!(EntryKind::classify("a1.json.done"), EntryKind::CompletionMarker(id("a1")));
        assert_eq!(EntryKind::classify("a1.json.lock"), EntryKind::Lock(id("a1")));
        assert_eq!(EntryKind::classify(".a1.json.tmp-0af3"), EntryKind::Temp);
        assert_eq!(EntryKind::classify("notes.txt"), EntryKind::Unknown);
        assert_eq!(EntryKind::classify("bad id.json"), EntryKind::Unknown);
        assert_eq!(EntryKind::classify(".hidden"), EntryKind::Unknown);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/store/requests/a1.json"));
        assert_eq!(temp.parent(), Some(Path::new("/store/requests")));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".a1.json.tmp-"));
        assert_eq!(EntryKind::classify(name), EntryKind::Temp);
    }
}
