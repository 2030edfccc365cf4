use std::path::Path;

use crate::error::AppError;

/// Suffixes recognised as audio files. Matching is case-sensitive.
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav"];

/// List the audio files directly inside `dir`, sorted by name.
pub async fn list_audio_files(dir: &Path) -> Result<Vec<String>, AppError> {
    let unreadable = |e: std::io::Error| {
        AppError::DirectoryUnreadable(format!("{}: {}", dir.display(), e))
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        // Skip anything that is not a plain file, e.g. a directory called "old.mp3"
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };

        if is_audio_file(&name) {
            files.push(name);
        }
    }

    files.sort();
    Ok(files)
}

pub fn is_audio_file(name: &str) -> bool {
    AUDIO_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// A single path segment naming a visible audio file.
pub fn is_servable_name(name: &str) -> bool {
    is_audio_file(name)
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

pub fn content_type(name: &str) -> &'static str {
    if name.ends_with(".wav") {
        "audio/wav"
    } else {
        "audio/mpeg"
    }
}
