//! The transfer capability trait, shared-client wrapper, and factory.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use romhoard_device::{Device, TransferProtocol};

use crate::TransferError;
use crate::ftp::FtpClient;
use crate::sftp::SftpClient;

/// Deadline for establishing a connection, every variant.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Payload used by `test_write` probes.
pub(crate) const WRITE_TEST_PAYLOAD: &[u8] = b"RomHoard test";

/// Per-chunk progress callback: `(bytes_sent_so_far, total_bytes)`.
///
/// Invoked at protocol-native block boundaries; the cadence depends on
/// the variant, not on any fixed interval.
pub type ChunkProgress<'a> = &'a mut dyn FnMut(u64, u64);

/// Capability contract over one remote-device connection.
///
/// Implementations report ordinary network and auth failures through
/// `Result`/`bool` return values; they never panic on them. All paths are
/// device-side paths using `/` separators.
pub trait TransferClient: Send {
    /// Opens the connection and authenticates, within [`CONNECT_TIMEOUT`].
    fn connect(&mut self) -> Result<(), TransferError>;

    /// Writes a small probe file at `test_path` and best-effort deletes it.
    ///
    /// Parent directories are created first, so a probe against a
    /// not-yet-existing transfer root exercises directory creation too.
    fn test_write(&mut self, test_path: &str) -> Result<(), TransferError>;

    /// Size of the remote file in bytes, or `None` if it does not exist.
    ///
    /// Permission and not-found responses both map to `None`; this probe
    /// never fails.
    fn remote_size(&mut self, remote_path: &str) -> Option<u64>;

    /// Creates the directory chain component by component, best effort.
    ///
    /// Failures are swallowed: device firmwares commonly misreport
    /// "already exists" as a permission error, and a genuinely broken
    /// connection surfaces at the next upload anyway.
    fn ensure_directory(&mut self, remote_path: &str);

    /// Streams a local file to `remote_path`.
    fn upload_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<ChunkProgress<'_>>,
    ) -> Result<(), TransferError>;

    /// Streams an in-memory buffer to `remote_path`.
    fn upload_data(&mut self, data: &[u8], remote_path: &str) -> Result<(), TransferError>;

    /// Cheap liveness probe, used before retry attempts.
    fn is_connected(&mut self) -> bool;

    /// Liveness probe for the background keepalive loop.
    fn send_keepalive(&mut self) -> bool;

    /// Tears down any live resources and connects again.
    fn reconnect(&mut self) -> Result<(), TransferError>;

    /// Releases all resources. Safe to call repeatedly.
    fn close(&mut self);
}

/// A client shared between the upload loop and the keepalive thread.
///
/// The mutex is the serialization point: protocol operations from the
/// two threads must never overlap on the underlying connection.
pub type SharedClient = Arc<Mutex<Box<dyn TransferClient>>>;

/// Builds the client variant for the device's configured protocol.
pub fn make_client(device: &Device) -> Result<Box<dyn TransferClient>, TransferError> {
    match device.transfer_protocol {
        TransferProtocol::Sftp => Ok(Box::new(SftpClient::new(
            device.transfer_host.clone(),
            device.effective_port(),
            device.transfer_user.clone(),
            device.transfer_password.clone(),
        ))),
        TransferProtocol::Ftp | TransferProtocol::Ftps => {
            // Anonymous login is signalled by empty credentials.
            let (user, password) = if device.transfer_anonymous {
                (String::new(), String::new())
            } else {
                (
                    device.transfer_user.clone(),
                    device.transfer_password.clone(),
                )
            };
            Ok(Box::new(FtpClient::new(
                device.transfer_host.clone(),
                device.effective_port(),
                user,
                password,
                device.transfer_protocol == TransferProtocol::Ftps,
            )))
        }
        TransferProtocol::None => Err(TransferError::NotConfigured),
    }
}

/// Everything before the last `/` of a remote path, or `None` for
/// root-level names.
pub fn parent_directory(remote_path: &str) -> Option<&str> {
    let trimmed = remote_path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let parent = &trimmed[..idx];
    if parent.is_empty() { None } else { Some(parent) }
}

/// Non-empty `/`-separated components of a remote path.
pub(crate) fn path_components(remote_path: &str) -> impl Iterator<Item = &str> {
    remote_path.split('/').filter(|part| !part.is_empty())
}

/// Final component of a remote path.
pub(crate) fn file_name_of(remote_path: &str) -> &str {
    remote_path.rsplit('/').next().unwrap_or(remote_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_directory_of_nested_path() {
        assert_eq!(
            parent_directory("/mnt/SDCARD/Roms/GBA/mario.gba"),
            Some("/mnt/SDCARD/Roms/GBA")
        );
        assert_eq!(parent_directory("Roms/GBA/mario.gba"), Some("Roms/GBA"));
    }

    #[test]
    fn parent_directory_of_root_level_name() {
        assert_eq!(parent_directory(".romhoard_test"), None);
        // Absolute root-level files have no usable parent either.
        assert_eq!(parent_directory("/.romhoard_test"), None);
    }

    #[test]
    fn path_components_skip_empty_segments() {
        let parts: Vec<&str> = path_components("/mnt//SDCARD/Roms/").collect();
        assert_eq!(parts, vec!["mnt", "SDCARD", "Roms"]);
    }

    #[test]
    fn file_name_of_takes_last_segment() {
        assert_eq!(file_name_of("Roms/GBA/mario.gba"), "mario.gba");
        assert_eq!(file_name_of("mario.gba"), "mario.gba");
    }

    #[test]
    fn factory_rejects_unconfigured_device() {
        let device = Device::default();
        assert!(matches!(
            make_client(&device),
            Err(TransferError::NotConfigured)
        ));
    }

    #[test]
    fn factory_builds_clients_for_each_protocol() {
        for protocol in [
            TransferProtocol::Ftp,
            TransferProtocol::Ftps,
            TransferProtocol::Sftp,
        ] {
            let device = Device {
                transfer_protocol: protocol,
                transfer_host: "10.0.0.5".into(),
                ..Device::default()
            };
            assert!(make_client(&device).is_ok(), "protocol {protocol}");
        }
    }
}
