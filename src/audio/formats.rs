//! Supported output formats
//!
//! Static table mapping each logical format to its file extension, the
//! ffmpeg encoder that produces it, and the quality arguments passed along
//! with the encoder.

use std::ffi::OsString;
use std::path::Path;

/// Describes one target audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Logical name (e.g. "MP3")
    pub name: &'static str,
    /// File extension without the leading dot
    pub extension: &'static str,
    /// ffmpeg encoder passed to `-c:a`
    pub codec: &'static str,
    /// Extra encoder arguments (VBR quality etc.)
    pub quality: &'static [&'static str],
}

impl FormatDescriptor {
    /// `-c:a <codec> [quality...]` as an argument vector
    pub fn codec_args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-c:a"), OsString::from(self.codec)];
        args.extend(self.quality.iter().map(OsString::from));
        args
    }

    /// File name for a derived file with this format's extension
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }
}

pub const FORMATS: &[FormatDescriptor] = &[
    FormatDescriptor {
        name: "MP3",
        extension: "mp3",
        codec: "libmp3lame",
        quality: &["-q:a", "0"],
    },
    FormatDescriptor {
        name: "OGG",
        extension: "ogg",
        codec: "libvorbis",
        quality: &["-q:a", "10"],
    },
    FormatDescriptor {
        name: "WAV",
        extension: "wav",
        codec: "pcm_s16le",
        quality: &[],
    },
    FormatDescriptor {
        name: "FLAC",
        extension: "flac",
        codec: "flac",
        quality: &[],
    },
    FormatDescriptor {
        name: "AAC",
        extension: "aac",
        codec: "aac",
        quality: &["-q:a", "2"],
    },
];

/// Look up a format by extension (case-insensitive, leading dot optional)
pub fn by_extension(ext: &str) -> Option<&'static FormatDescriptor> {
    let ext = ext.trim_start_matches('.');
    FORMATS
        .iter()
        .find(|f| f.extension.eq_ignore_ascii_case(ext))
}

/// Look up a format by logical name (case-insensitive)
pub fn by_name(name: &str) -> Option<&'static FormatDescriptor> {
    FORMATS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Look up a format by name or extension, whichever matches
pub fn lookup(key: &str) -> Option<&'static FormatDescriptor> {
    by_name(key).or_else(|| by_extension(key))
}

/// Look up the format a path's extension denotes
pub fn for_path(path: &Path) -> Option<&'static FormatDescriptor> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(by_extension)
}
