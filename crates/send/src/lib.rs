//! Batch send flow: pushing ROMs and companion images to a gaming device.
//!
//! This crate implements the **business logic** of a send batch. It is a
//! library with no transport or catalog dependencies: the surrounding
//! application supplies a [`Device`](romhoard_device::Device) record, the
//! list of [`RomFile`]s to send, a [`RomSource`] that materializes each
//! file locally (extracting from archives as needed), and optionally an
//! [`ImageRenderer`] for companion artwork.
//!
//! # Pipeline
//!
//! 1. **Connect** — open one authenticated connection for the batch
//! 2. **Validate** — write-test the transfer root, failing fast
//! 3. **Transfer** — per file: skip-if-unchanged, upload with
//!    retry/reconnect, send the companion image
//! 4. **Close** — always, on every path out

pub mod error;
pub mod send;
pub mod source;
pub mod types;

pub use error::SendError;
pub use send::{WRITE_TEST_FILE, send_to_device, send_with_client};
pub use source::{
    DirectorySource, ImageRenderer, LocalRom, LooseRom, RenderedImage, RomSource,
};
pub use types::{
    FileResult, ImageResult, ProgressSink, RomFile, SendOptions, SendProgress, SendReport,
};
