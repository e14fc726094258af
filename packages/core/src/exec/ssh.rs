//! Remote command execution over SSH
//!
//! Commands run through an exec channel; files move over SFTP on the same
//! session. The session is opened lazily on first use and reused until
//! `close()` is called or the executor is dropped.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{Session, Sftp};

use super::{CommandExecutor, CommandResult, ExecError, report_failure, shell_join};

/// Timeout for the TCP connect and SSH handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between polls when neither output stream has data
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Permissions for directories created during `push_file`
const REMOTE_DIR_MODE: i32 = 0o755;

/// Executor for a remote host reached over SSH
///
/// The lazily created session lives in a `RefCell`, which keeps the type
/// `!Sync`: one executor serves one caller at a time.
pub struct SshExecutor {
    host: String,
    user: String,
    port: u16,
    key_path: Option<PathBuf>,
    session: RefCell<Option<Session>>,
}

impl SshExecutor {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        port: u16,
        key_path: Option<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
            key_path,
            session: RefCell::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }

    /// Whether a session is currently open
    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_some()
    }

    fn connection_error(&self, reason: impl ToString) -> ExecError {
        ExecError::Connection {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }

    /// Open, handshake and authenticate a new session
    fn connect(&self) -> Result<Session, ExecError> {
        let address = format!("{}:{}", self.host, self.port);
        tracing::debug!("Connecting to {}@{}", self.user, address);

        let socket = address
            .to_socket_addrs()
            .map_err(|e| self.connection_error(format!("cannot resolve {address}: {e}")))?
            .next()
            .ok_or_else(|| self.connection_error(format!("no address for {address}")))?;

        let tcp = TcpStream::connect_timeout(&socket, CONNECT_TIMEOUT)
            .map_err(|e| self.connection_error(e))?;

        let mut session = Session::new().map_err(|e| self.connection_error(e))?;
        session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| self.connection_error(format!("handshake failed: {e}")))?;
        // Commands may run for a long time once connected
        session.set_timeout(0);

        let auth = match &self.key_path {
            Some(key) => session.userauth_pubkey_file(&self.user, None, key, None),
            None => session.userauth_agent(&self.user),
        };

        if let Err(e) = auth {
            tracing::debug!("SSH authentication error: {}", e);
        }
        if !session.authenticated() {
            return Err(ExecError::Authentication {
                host: self.host.clone(),
                user: self.user.clone(),
            });
        }

        tracing::info!("Connected to {}@{}", self.user, address);
        Ok(session)
    }

    /// Run `f` with the live session, connecting first if needed
    fn with_session<T>(
        &self,
        f: impl FnOnce(&Session) -> Result<T, ExecError>,
    ) -> Result<T, ExecError> {
        let mut slot = self.session.borrow_mut();
        let session = match &mut *slot {
            Some(session) => session,
            empty => empty.insert(self.connect()?),
        };
        f(&*session)
    }

    fn exec_channel(&self, session: &Session, command_line: &str) -> Result<CommandResult, ExecError> {
        let mut channel = session
            .channel_session()
            .map_err(|e| self.connection_error(e))?;
        channel
            .exec(command_line)
            .map_err(|e| self.connection_error(e))?;

        // Alternate between the streams so neither fills the channel window
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        session.set_blocking(false);
        let drained = loop {
            let read = read_available(&mut channel, &mut stdout)
                .and_then(|n| Ok(n + read_available(&mut channel.stderr(), &mut stderr)?));
            match read {
                Err(e) => break Err(e),
                Ok(_) if channel.eof() => {
                    break read_available(&mut channel, &mut stdout)
                        .and_then(|_| read_available(&mut channel.stderr(), &mut stderr));
                }
                Ok(0) => std::thread::sleep(POLL_INTERVAL),
                Ok(_) => {}
            }
        };
        session.set_blocking(true);
        drained.map_err(|e| self.connection_error(e))?;

        channel.wait_close().map_err(|e| self.connection_error(e))?;
        let exit_code = channel.exit_status().map_err(|e| self.connection_error(e))?;

        Ok(CommandResult::new(
            exit_code,
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
        ))
    }
}

impl CommandExecutor for SshExecutor {
    fn run(&self, cmd: &[String], check: bool) -> Result<CommandResult, ExecError> {
        if cmd.is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let command_line = shell_join(cmd);
        tracing::debug!("Running on {}: {}", self.host, command_line);

        let result = self.with_session(|session| self.exec_channel(session, &command_line))?;
        report_failure(&self.host, cmd, &result, check);
        Ok(result)
    }

    fn push_file(&self, local_path: &Path, remote_path: &Path) -> Result<bool, ExecError> {
        self.with_session(|session| match upload(session, local_path, remote_path) {
            Ok(()) => {
                tracing::debug!(
                    "Uploaded {} to {}:{}",
                    local_path.display(),
                    self.host,
                    remote_path.display()
                );
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to upload {} to {}:{}: {}",
                    local_path.display(),
                    self.host,
                    remote_path.display(),
                    e
                );
                Ok(false)
            }
        })
    }

    fn read_file(&self, remote_path: &Path) -> Result<String, ExecError> {
        self.with_session(|session| {
            let sftp = session
                .sftp()
                .map_err(|e| ExecError::io(remote_path, e.into()))?;
            let mut file = sftp
                .open(remote_path)
                .map_err(|e| ExecError::io(remote_path, e.into()))?;
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| ExecError::io(remote_path, e))?;
            Ok(String::from_utf8_lossy(&content).into_owned())
        })
    }

    fn close(&self) {
        if let Some(session) = self.session.borrow_mut().take() {
            if let Err(e) = session.disconnect(None, "pve-lxc closing session", None) {
                tracing::debug!("SSH disconnect from {}: {}", self.host, e);
            }
            tracing::debug!("Closed SSH session to {}", self.host);
        }
    }

    fn is_local(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl Drop for SshExecutor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Append whatever `reader` has ready without blocking
///
/// Stops at end of stream or `WouldBlock` and returns the bytes read.
fn read_available(reader: &mut impl Read, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut chunk = [0u8; 8192];
    let mut total = 0;
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Copy a local file to the remote path over SFTP
fn upload(session: &Session, local_path: &Path, remote_path: &Path) -> io::Result<()> {
    let sftp = session.sftp()?;

    if let Some(parent) = remote_path.parent() {
        create_remote_dirs(&sftp, parent)?;
    }

    let mut source = File::open(local_path)?;
    let mut target = sftp.create(remote_path)?;
    io::copy(&mut source, &mut target)?;
    Ok(())
}

/// Create missing directories top-down, one level at a time
fn create_remote_dirs(sftp: &Sftp, dir: &Path) -> io::Result<()> {
    for level in missing_candidates(dir) {
        if sftp.stat(&level).is_err() {
            tracing::debug!("Creating remote directory {}", level.display());
            sftp.mkdir(&level, REMOTE_DIR_MODE)?;
        }
    }
    Ok(())
}

/// Every ancestor of `dir` (inclusive), root-most first, excluding `/`
fn missing_candidates(dir: &Path) -> Vec<PathBuf> {
    let mut levels: Vec<PathBuf> = dir
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty() && p.parent().is_some())
        .map(Path::to_path_buf)
        .collect();
    levels.reverse();
    levels
}
