//! Data types for the send flow.

use std::time::Duration;

use serde::Serialize;

use romhoard_transfer::DEFAULT_KEEPALIVE_INTERVAL;

/// One ROM in a send batch.
///
/// `file_size` is the catalog's recorded size, not a filesystem stat;
/// the file may live inside an archive until the source extracts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomFile {
    pub game_id: i64,
    pub game_name: String,
    pub system_slug: String,
    pub file_name: String,
    pub file_size: u64,
}

/// Live counters for one send batch, passed to the progress sink.
///
/// `files_total` counts ROMs plus the companion images the device
/// configuration will produce, so consumers can render one denominator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SendProgress {
    pub files_total: usize,
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub current_file: String,
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
    pub images_uploaded: usize,
    pub images_skipped: usize,
    pub images_failed: usize,
}

/// Callback invoked with a progress snapshot after every meaningful
/// state change. No fixed cadence is guaranteed.
pub type ProgressSink<'a> = &'a mut dyn FnMut(&SendProgress);

/// Outcome of one ROM file in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub game_id: i64,
    pub file_name: String,
    /// Empty when the local source could not be opened at all.
    pub remote_path: String,
    pub success: bool,
    pub skipped: bool,
    pub error: Option<String>,
    pub bytes: u64,
}

/// Outcome of one companion image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageResult {
    pub game_id: i64,
    pub rom_file_name: String,
    pub remote_path: String,
    pub success: bool,
    pub skipped: bool,
    pub error: Option<String>,
    pub bytes: u64,
}

/// Everything a send batch produced, split by outcome.
///
/// Skipped files count as successes: the remote already has them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SendReport {
    pub uploaded: Vec<FileResult>,
    pub skipped: Vec<FileResult>,
    pub failed: Vec<FileResult>,
    pub images: Vec<ImageResult>,
}

/// Tunables for a send batch.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Upload attempts per file before recording a failure.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_pause: Duration,
    /// Spacing of background keepalive probes.
    pub keepalive_interval: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_pause: Duration::from_secs(1),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}
