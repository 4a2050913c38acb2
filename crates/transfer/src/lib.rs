//! FTP/FTPS/SFTP clients for pushing ROM files to gaming devices.
//!
//! One [`TransferClient`] owns exactly one live connection for the
//! duration of one send batch. [`make_client`] picks the variant for a
//! device's configured protocol, and [`KeepaliveGuard`] keeps the
//! connection warm while a long batch is in flight.
//!
//! The targets are low-power embedded handhelds with quirky FTP daemons:
//! directory creation failures are treated as "already exists", existence
//! checks must never error, and reconnecting mid-batch is a first-class
//! operation.

mod client;
mod ftp;
mod keepalive;
mod sftp;

pub use client::{
    CONNECT_TIMEOUT, ChunkProgress, SharedClient, TransferClient, make_client,
    parent_directory,
};
pub use ftp::FtpClient;
pub use keepalive::{DEFAULT_KEEPALIVE_INTERVAL, KeepaliveGuard};
pub use sftp::SftpClient;

/// Errors produced by transfer clients.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("could not resolve host {0}")]
    Resolve(String),

    #[error("not connected")]
    NotConnected,

    #[error("device has no transfer protocol configured")]
    NotConfigured,
}
