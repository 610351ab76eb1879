use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const POLICY_DOCUMENT_FILE_NAME: &str = "policy.json";

#[derive(Debug, Error)]
#[error("failed to read policy document at '{}': {source}", .path.display())]
pub struct PolicyDocumentError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Picks the bundled policy document location: an explicit override first,
/// then the Lambda task root, then the working directory.
pub fn resolve_policy_document_path(
    explicit_path: Option<&str>,
    task_root: Option<&str>,
) -> PathBuf {
    match (explicit_path, task_root) {
        (Some(path), _) if !path.trim().is_empty() => PathBuf::from(path),
        (_, Some(root)) if !root.trim().is_empty() => {
            Path::new(root).join(POLICY_DOCUMENT_FILE_NAME)
        }
        _ => PathBuf::from(POLICY_DOCUMENT_FILE_NAME),
    }
}

/// Reads the document verbatim. Its content is opaque here and is handed to
/// IAM unmodified.
pub fn load_policy_document(path: &Path) -> Result<String, PolicyDocumentError> {
    fs::read_to_string(path).map_err(|source| PolicyDocumentError {
        path: path.to_path_buf(),
        source,
    })
}
