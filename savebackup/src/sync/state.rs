use std::collections::HashMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use gdrive_core::DriveClient;

use super::engine::EngineError;

/// Comparison baseline for one remote folder, captured once per sync pass.
/// `baseline` is the newest modification instant among the folder's direct
/// children, or the Unix epoch when the folder is empty — which makes every
/// local candidate classify as a create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderState {
    pub baseline: OffsetDateTime,
    names: HashMap<String, String>,
}

impl FolderState {
    pub fn new(baseline: OffsetDateTime, names: HashMap<String, String>) -> Self {
        Self { baseline, names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn child_count(&self) -> usize {
        self.names.len()
    }
}

/// Reads the remote folder's direct children once: the aggregate baseline
/// timestamp plus a name-to-id index for existence checks. Never downloads
/// content.
pub async fn read_folder_state(
    client: &DriveClient,
    folder_id: &str,
) -> Result<FolderState, EngineError> {
    let children = client
        .list_children(folder_id, Some("modifiedTime desc"))
        .await?;

    let mut baseline = OffsetDateTime::UNIX_EPOCH;
    let mut names = HashMap::with_capacity(children.len());
    for child in children {
        if let Some(modified) = parse_modified(child.modified_time.as_deref())? {
            if modified > baseline {
                baseline = modified;
            }
        }
        names.insert(child.name, child.id);
    }
    Ok(FolderState::new(baseline, names))
}

pub(crate) fn parse_modified(
    value: Option<&str>,
) -> Result<Option<OffsetDateTime>, time::error::Parse> {
    let Some(value) = value else {
        return Ok(None);
    };
    Ok(Some(OffsetDateTime::parse(value, &Rfc3339)?))
}
