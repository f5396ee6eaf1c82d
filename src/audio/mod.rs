// Audio module - format registry, file detection, and duration probing

pub mod detection;
pub mod formats;
pub mod probe;

pub use detection::{has_format, is_audio_file};
pub use formats::FormatDescriptor;
