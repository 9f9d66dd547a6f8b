use crate::error::JobError;
use std::path::Path;
use walkdir::WalkDir;

/// One file produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    /// Path relative to the workspace, `/`-separated.
    pub relative_path: String,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            mime: mime_for(&name),
            relative_path: name.clone(),
            name,
            data,
        }
    }
}

pub fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Reads every regular file under `root`, ordered by file name.
pub fn collect(root: &Path) -> Result<Vec<Artifact>, JobError> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| JobError::packaging(format!("failed to walk workspace: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = entry.file_name().to_string_lossy().into_owned();
        let data = std::fs::read(entry.path())
            .map_err(|e| JobError::packaging(format!("failed to read {relative_path}: {e}")))?;

        artifacts.push(Artifact {
            mime: mime_for(&name),
            name,
            relative_path,
            data,
        });
    }

    if artifacts.is_empty() {
        return Err(JobError::EmptyResult("no files were downloaded"));
    }

    artifacts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.relative_path.cmp(&b.relative_path)));
    tracing::debug!(count = artifacts.len(), "collected artifacts");
    Ok(artifacts)
}
