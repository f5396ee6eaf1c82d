use std::path::Path;

use super::formats;

/// Check if a file is an audio file based on its extension
pub fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "mp3" | "flac" | "wav" | "ogg" | "m4a" | "aac" | "aiff" | "opus" | "wma"
        )
    } else {
        false
    }
}

/// Check if a file has the extension of the given format
pub fn has_format(path: &Path, format: &formats::FormatDescriptor) -> bool {
    formats::for_path(path).is_some_and(|f| f == format)
}
