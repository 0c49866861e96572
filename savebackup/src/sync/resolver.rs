use gdrive_core::{DriveClient, ObjectKind};

use super::engine::EngineError;

/// Returns the id of the folder `name` under `parent_id` (or at the Drive
/// root when `parent_id` is `None`), creating it when absent. Trashed
/// folders are excluded from the lookup, so a trashed namesake never counts
/// as a collision. Calling this twice with the same parent and name in one
/// run yields the same id.
pub async fn resolve_folder(
    client: &DriveClient,
    parent_id: Option<&str>,
    name: &str,
) -> Result<String, EngineError> {
    let mut matches = client
        .find_by_name(parent_id, name, Some(ObjectKind::Folder))
        .await?;
    match matches.len() {
        0 => {
            let folder = client.create_folder(parent_id, name).await?;
            Ok(folder.id)
        }
        1 => Ok(matches.remove(0).id),
        count => Err(EngineError::FolderCollision {
            name: name.to_string(),
            count,
        }),
    }
}
