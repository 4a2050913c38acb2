//! FTP/FTPS client backed by suppaftp.
//!
//! The embedded FTP daemons this talks to (BusyBox tcpsvd, uftpd and
//! friends) are picky about absolute paths in STOR/SIZE commands, so
//! every operation navigates with CWD from the root first and then works
//! on bare filenames, the same way a human would drive an `ftp` prompt.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::net::ToSocketAddrs;
use std::path::Path;

use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};
use tracing::debug;

use crate::TransferError;
use crate::client::{
    CONNECT_TIMEOUT, ChunkProgress, TransferClient, WRITE_TEST_PAYLOAD, file_name_of,
    parent_directory, path_components,
};

const UPLOAD_BLOCK_SIZE: usize = 32 * 1024;

/// FTP/FTPS transfer client. Empty username means anonymous login.
pub struct FtpClient {
    host: String,
    port: u16,
    user: String,
    password: String,
    use_tls: bool,
    stream: Option<NativeTlsFtpStream>,
}

impl FtpClient {
    pub fn new(host: String, port: u16, user: String, password: String, use_tls: bool) -> Self {
        Self {
            host,
            port,
            user,
            password,
            use_tls,
            stream: None,
        }
    }

    fn protocol(&self) -> &'static str {
        if self.use_tls { "FTPS" } else { "FTP" }
    }

    /// CWDs from the root into the parent directory of `remote_path`.
    ///
    /// The parent chain must already exist (see `ensure_directory`).
    fn enter_parent(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let ftp = self.stream.as_mut().ok_or(TransferError::NotConnected)?;
        if let Err(e) = ftp.cwd("/") {
            debug!(error = %e, "server rejected CWD /");
        }
        if let Some(parent) = parent_directory(remote_path) {
            for part in path_components(parent) {
                ftp.cwd(part)?;
            }
        }
        Ok(())
    }
}

impl TransferClient for FtpClient {
    fn connect(&mut self) -> Result<(), TransferError> {
        let user_desc = if self.user.is_empty() {
            "anonymous"
        } else {
            self.user.as_str()
        };
        debug!(
            protocol = self.protocol(),
            host = %self.host,
            port = self.port,
            user = %user_desc,
            "connecting"
        );

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransferError::Resolve(self.host.clone()))?;
        let mut ftp = NativeTlsFtpStream::connect_timeout(addr, CONNECT_TIMEOUT)?;

        if self.use_tls {
            // Upgrading the control channel also switches the data
            // channel to private mode for subsequent transfers.
            let tls = TlsConnector::new().map_err(|e| TransferError::Tls(e.to_string()))?;
            ftp = ftp.into_secure(NativeTlsConnector::from(tls), &self.host)?;
        }

        if self.user.is_empty() {
            ftp.login("anonymous", "anonymous")?;
        } else {
            ftp.login(&self.user, &self.password)?;
        }
        ftp.transfer_type(FileType::Binary)?;

        self.stream = Some(ftp);
        debug!(protocol = self.protocol(), host = %self.host, "connected");
        Ok(())
    }

    fn test_write(&mut self, test_path: &str) -> Result<(), TransferError> {
        debug!(protocol = self.protocol(), path = %test_path, "testing write permissions");

        // Parent directories first; the transfer root may not exist yet.
        if let Some(parent) = parent_directory(test_path) {
            self.ensure_directory(parent);
        } else {
            self.enter_parent(test_path)?;
        }

        let ftp = self.stream.as_mut().ok_or(TransferError::NotConnected)?;
        let name = file_name_of(test_path);
        let mut payload = Cursor::new(WRITE_TEST_PAYLOAD);
        ftp.put_file(name, &mut payload)?;

        if let Err(e) = ftp.rm(name) {
            debug!(error = %e, "could not remove write-test artifact");
        }
        Ok(())
    }

    fn remote_size(&mut self, remote_path: &str) -> Option<u64> {
        self.enter_parent(remote_path).ok()?;
        let ftp = self.stream.as_mut()?;
        ftp.size(file_name_of(remote_path)).ok().map(|s| s as u64)
    }

    fn ensure_directory(&mut self, remote_path: &str) {
        let Some(ftp) = self.stream.as_mut() else {
            return;
        };

        // Always walk from the root so the result does not depend on
        // whatever directory a previous operation left us in.
        if let Err(e) = ftp.cwd("/") {
            debug!(error = %e, "server rejected CWD /");
        }

        for part in path_components(remote_path) {
            if ftp.cwd(part).is_ok() {
                continue;
            }
            match ftp.mkdir(part) {
                Ok(()) => {
                    if let Err(e) = ftp.cwd(part) {
                        debug!(dir = part, error = %e, "cannot enter created directory");
                    }
                }
                // Likely already exists; some firmwares answer 550 here.
                Err(e) => debug!(dir = part, error = %e, "mkdir refused"),
            }
        }
    }

    fn upload_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        mut progress: Option<ChunkProgress<'_>>,
    ) -> Result<(), TransferError> {
        let total = std::fs::metadata(local_path)?.len();
        let mut local = File::open(local_path)?;

        self.enter_parent(remote_path)?;
        let ftp = self.stream.as_mut().ok_or(TransferError::NotConnected)?;

        let mut data_stream = ftp.put_with_stream(file_name_of(remote_path))?;
        let mut buf = [0u8; UPLOAD_BLOCK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = local.read(&mut buf)?;
            if n == 0 {
                break;
            }
            data_stream.write_all(&buf[..n])?;
            sent += n as u64;
            if let Some(cb) = progress.as_deref_mut() {
                cb(sent, total);
            }
        }
        ftp.finalize_put_stream(data_stream)?;
        Ok(())
    }

    fn upload_data(&mut self, data: &[u8], remote_path: &str) -> Result<(), TransferError> {
        self.enter_parent(remote_path)?;
        let ftp = self.stream.as_mut().ok_or(TransferError::NotConnected)?;
        let mut reader = Cursor::new(data);
        ftp.put_file(file_name_of(remote_path), &mut reader)?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        match self.stream.as_mut() {
            Some(ftp) => ftp.noop().is_ok(),
            None => false,
        }
    }

    fn send_keepalive(&mut self) -> bool {
        self.is_connected()
    }

    fn reconnect(&mut self) -> Result<(), TransferError> {
        debug!(protocol = self.protocol(), host = %self.host, "reconnecting");
        self.close();
        self.connect()
    }

    fn close(&mut self) {
        if let Some(mut ftp) = self.stream.take() {
            let _ = ftp.quit();
        }
    }
}
