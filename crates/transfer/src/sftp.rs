//! SFTP client backed by ssh2.
//!
//! Host keys are not verified and no agent or key files are consulted:
//! the targets are closed embedded handhelds reached by password on a
//! local network, with no channel to distribute known-hosts entries.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use ssh2::{Session, Sftp};
use tracing::debug;

use crate::TransferError;
use crate::client::{
    CONNECT_TIMEOUT, ChunkProgress, TransferClient, WRITE_TEST_PAYLOAD, parent_directory,
    path_components,
};

const UPLOAD_BLOCK_SIZE: usize = 32 * 1024;

/// SFTP transfer client, password authentication only.
pub struct SftpClient {
    host: String,
    port: u16,
    user: String,
    password: String,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl SftpClient {
    pub fn new(host: String, port: u16, user: String, password: String) -> Self {
        Self {
            host,
            port,
            user,
            password,
            session: None,
            sftp: None,
        }
    }
}

impl TransferClient for SftpClient {
    fn connect(&mut self) -> Result<(), TransferError> {
        debug!(host = %self.host, port = self.port, user = %self.user, "SFTP connecting");

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransferError::Resolve(self.host.clone()))?;
        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
        session.handshake()?;
        session.userauth_password(&self.user, &self.password)?;

        let sftp = session.sftp()?;
        // The timeout only bounds connection establishment; transfers
        // rely on the socket's own blocking behavior.
        session.set_timeout(0);

        self.session = Some(session);
        self.sftp = Some(sftp);
        debug!(host = %self.host, port = self.port, "SFTP connected");
        Ok(())
    }

    fn test_write(&mut self, test_path: &str) -> Result<(), TransferError> {
        debug!(path = %test_path, "SFTP testing write permissions");

        if let Some(parent) = parent_directory(test_path) {
            self.ensure_directory(parent);
        }

        let sftp = self.sftp.as_ref().ok_or(TransferError::NotConnected)?;
        let mut remote = sftp.create(Path::new(test_path))?;
        remote.write_all(WRITE_TEST_PAYLOAD)?;
        drop(remote);

        if let Err(e) = sftp.unlink(Path::new(test_path)) {
            debug!(error = %e, "could not remove write-test artifact");
        }
        Ok(())
    }

    fn remote_size(&mut self, remote_path: &str) -> Option<u64> {
        let sftp = self.sftp.as_ref()?;
        sftp.stat(Path::new(remote_path)).ok().and_then(|st| st.size)
    }

    fn ensure_directory(&mut self, remote_path: &str) {
        let Some(sftp) = self.sftp.as_ref() else {
            return;
        };

        let mut current = if remote_path.starts_with('/') {
            String::from("/")
        } else {
            String::new()
        };

        for part in path_components(remote_path) {
            if current.is_empty() || current == "/" {
                current.push_str(part);
            } else {
                current = format!("{current}/{part}");
            }
            // Refusals usually mean the directory exists.
            if let Err(e) = sftp.mkdir(Path::new(&current), 0o755) {
                debug!(dir = %current, error = %e, "mkdir refused");
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

        let sftp = self.sftp.as_ref().ok_or(TransferError::NotConnected)?;
        let mut remote = sftp.create(Path::new(remote_path))?;

        let mut buf = [0u8; UPLOAD_BLOCK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = local.read(&mut buf)?;
            if n == 0 {
                break;
            }
            remote.write_all(&buf[..n])?;
            sent += n as u64;
            if let Some(cb) = progress.as_deref_mut() {
                cb(sent, total);
            }
        }
        Ok(())
    }

    fn upload_data(&mut self, data: &[u8], remote_path: &str) -> Result<(), TransferError> {
        let sftp = self.sftp.as_ref().ok_or(TransferError::NotConnected)?;
        let mut remote = sftp.create(Path::new(remote_path))?;
        remote.write_all(data)?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        match self.sftp.as_ref() {
            Some(sftp) => sftp.stat(Path::new(".")).is_ok(),
            None => false,
        }
    }

    fn send_keepalive(&mut self) -> bool {
        self.is_connected()
    }

    fn reconnect(&mut self) -> Result<(), TransferError> {
        debug!(host = %self.host, "SFTP reconnecting");
        self.close();
        self.connect()
    }

    fn close(&mut self) {
        self.sftp.take();
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "closing", None);
        }
    }
}
