//! Gaming device configuration and remote path construction.
//!
//! A [`Device`] describes how one handheld organizes its ROM library:
//! where the ROM root lives, which folder each system maps to, how the
//! device is reached over FTP/FTPS/SFTP, and where companion images go.
//! All path construction here is pure string work with no I/O, so the
//! transfer engine and the catalog application share one source of truth
//! for device-side layout.

mod device;

pub use device::{
    Device, ImageKind, SystemPathConfig, TransferProtocol, sanitize_filename,
};
