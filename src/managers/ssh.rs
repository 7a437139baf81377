use crate::config::ConnectionConfig;
use crate::constants::{auth as auth_constants, buffers, network as network_constants};
use crate::errors::{ErrorKind, PipelineError};
use crate::services::logger::Logger;
use crate::utils::cancel::{CancelFlag, CancellableReader};
use crate::utils::fs_atomic::{ensure_dir_for_file, remove_quietly, temp_sibling_path};
use crate::utils::user_paths::{expand_home_path, home_dir};
use base64::Engine;
use ssh2::{Channel, Session, Sftp};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// What the pipeline needs from the far side: one command or one download at a time.
pub trait RemoteHost {
    fn run(&self, command: &str) -> Result<ExecOutput, PipelineError>;
    fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<u64, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Agent,
    KeyFile(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Agent => write!(f, "ssh-agent"),
            CredentialSource::KeyFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An explicit key is the only candidate; otherwise the agent, then existing default keys.
pub fn credential_candidates(key_file: Option<&Path>, home: Option<&Path>) -> Vec<CredentialSource> {
    if let Some(path) = key_file {
        return vec![CredentialSource::KeyFile(expand_home_path(path))];
    }
    let mut candidates = vec![CredentialSource::Agent];
    if let Some(home) = home {
        for relative in auth_constants::DEFAULT_KEY_FILES {
            let path = home.join(relative);
            if path.is_file() {
                candidates.push(CredentialSource::KeyFile(path));
            }
        }
    }
    candidates
}

pub struct RemoteSession {
    logger: Logger,
    command_timeout_ms: u64,
    cancel: CancelFlag,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl RemoteSession {
    pub fn connect(connection: &ConnectionConfig, logger: &Logger) -> Result<Self, PipelineError> {
        let logger = logger.child("ssh");
        let target = connection.target();
        logger.info(
            "Connecting",
            Some(&serde_json::json!({
                "target": target,
                "credentials": match connection.key_file.as_ref() {
                    Some(path) => path.display().to_string(),
                    None => "default keys".to_string(),
                },
            })),
        );

        let session = open_session(connection)?;
        if let Some(fingerprint) = fingerprint_host_key_sha256(&session) {
            logger.debug(
                "Host key",
                Some(&serde_json::json!({ "sha256": fingerprint })),
            );
        }

        let home = home_dir();
        let candidates = credential_candidates(connection.key_file.as_deref(), home.as_deref());
        let credential = authenticate(&session, connection, &candidates, &logger)?;

        let interval = std::cmp::max(1, (connection.keepalive_interval_ms / 1000) as u32);
        session.set_keepalive(true, interval);
        session.set_timeout(clamp_timeout_ms(connection.command_timeout_ms));

        let sftp = session
            .sftp()
            .map_err(|err| map_ssh_error(err, "Failed to open SFTP channel", ErrorKind::Connection))?;

        logger.info(
            "SSH connection established",
            Some(&serde_json::json!({ "target": target, "credential": credential.to_string() })),
        );

        Ok(Self {
            logger,
            command_timeout_ms: connection.command_timeout_ms,
            cancel: CancelFlag::new(),
            session: Some(session),
            sftp: Some(sftp),
        })
    }

    /// Remote commands and downloads stop early once `cancel` is raised.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Safe to call more than once; `Drop` calls it as well.
    pub fn close(&mut self) {
        self.sftp.take();
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "transferlog finished", None);
            self.logger.info("SSH connection closed", None);
        }
    }

    fn session(&self) -> Result<&Session, PipelineError> {
        self.session
            .as_ref()
            .ok_or_else(|| PipelineError::connection("SSH session is closed"))
    }

    fn sftp(&self) -> Result<&Sftp, PipelineError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| PipelineError::connection("SFTP channel is closed"))
    }

    fn drain(&self, channel: &mut Channel, command: &str) -> Result<(Vec<u8>, Vec<u8>), PipelineError> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut stderr_stream = channel.stderr();
        let mut buf = vec![0u8; buffers::EXEC_READ_CHUNK_SIZE];
        let started = Instant::now();
        let timeout = Duration::from_millis(self.command_timeout_ms);

        loop {
            let mut progressed = pump(channel, &mut buf, &mut stdout, "stdout")?;
            progressed |= pump(&mut stderr_stream, &mut buf, &mut stderr, "stderr")?;

            if channel.eof() {
                break;
            }
            if self.cancel.is_cancelled() {
                let _ = channel.close();
                return Err(PipelineError::cancelled(format!(
                    "Interrupted while running: {}",
                    command
                )));
            }
            if started.elapsed() > timeout {
                let _ = channel.close();
                return Err(PipelineError::timeout(format!(
                    "Remote command exceeded {} ms: {}",
                    self.command_timeout_ms, command
                ))
                .with_hint("Raise --command-timeout-ms for very large log directories."));
            }
            if !progressed {
                std::thread::sleep(Duration::from_millis(network_constants::POLL_INTERVAL_MS));
            }
        }
        Ok((stdout, stderr))
    }
}

impl RemoteHost for RemoteSession {
    fn run(&self, command: &str) -> Result<ExecOutput, PipelineError> {
        let session = self.session()?;
        self.logger
            .debug("exec", Some(&serde_json::json!({ "command": command })));

        let mut channel = session
            .channel_session()
            .map_err(|err| map_ssh_error(err, "Failed to open SSH channel", ErrorKind::Transfer))?;
        channel
            .exec(command)
            .map_err(|err| map_ssh_error(err, "Failed to start remote command", ErrorKind::Transfer))?;

        session.set_blocking(false);
        let drained = self.drain(&mut channel, command);
        session.set_blocking(true);
        let (stdout, stderr) = drained?;

        let _ = channel.wait_close();
        let exit_code = channel.exit_status().unwrap_or(-1);
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<u64, PipelineError> {
        let sftp = self.sftp()?;
        ensure_dir_for_file(local_path).map_err(|err| {
            PipelineError::internal(format!(
                "Failed to create {}: {}",
                local_path.display(),
                err
            ))
        })?;

        let tmp_path = temp_sibling_path(local_path);
        let copied = (|| {
            self.cancel.check()?;
            let mut remote = sftp
                .open(Path::new(remote_path))
                .map_err(|err| map_ssh_error(err, remote_path, ErrorKind::Transfer))?;
            let stat = remote.stat().ok();
            let mut remote = CancellableReader::new(remote, self.cancel.clone());
            let mut local = fs::File::create(&tmp_path).map_err(|err| {
                PipelineError::transfer(format!("Failed to create temp file: {}", err))
            })?;
            let bytes = io::copy(&mut remote, &mut local).map_err(|err| {
                if self.cancel.is_cancelled() {
                    PipelineError::cancelled(format!("Interrupted while downloading {}", remote_path))
                } else {
                    PipelineError::transfer(format!("Download of {} failed: {}", remote_path, err))
                }
            })?;
            local
                .sync_all()
                .map_err(|err| PipelineError::transfer(err.to_string()))?;
            Ok::<_, PipelineError>((bytes, stat))
        })();
        let (bytes, stat) = match copied {
            Ok(result) => result,
            Err(err) => {
                remove_quietly(&tmp_path);
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, local_path) {
            remove_quietly(&tmp_path);
            return Err(PipelineError::transfer(format!(
                "Failed to finalize download: {}",
                err
            )));
        }

        if let Some(stat) = stat {
            if let (Some(atime), Some(mtime)) = (stat.atime, stat.mtime) {
                let atime = filetime::FileTime::from_unix_time(atime as i64, 0);
                let mtime = filetime::FileTime::from_unix_time(mtime as i64, 0);
                let _ = filetime::set_file_times(local_path, atime, mtime);
            }
        }

        self.logger.debug(
            "Downloaded",
            Some(&serde_json::json!({
                "remote_path": remote_path,
                "local_path": local_path.display().to_string(),
                "bytes": bytes,
            })),
        );
        Ok(bytes)
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_session(connection: &ConnectionConfig) -> Result<Session, PipelineError> {
    let addr = (connection.host.as_str(), connection.port)
        .to_socket_addrs()
        .map_err(|err| {
            PipelineError::connection(format!("Failed to resolve {}: {}", connection.host, err))
        })?
        .next()
        .ok_or_else(|| {
            PipelineError::connection(format!("No address found for {}", connection.host))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, Duration::from_millis(connection.connect_timeout_ms))
        .map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut => PipelineError::timeout(format!(
                "Timed out connecting to {} after {} ms",
                addr, connection.connect_timeout_ms
            )),
            _ => PipelineError::connection(format!("Failed to connect to {}: {}", addr, err)),
        })?;

    let mut session =
        Session::new().map_err(|_| PipelineError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(clamp_timeout_ms(connection.connect_timeout_ms));
    session
        .handshake()
        .map_err(|err| map_ssh_error(err, "SSH handshake failed", ErrorKind::Connection))?;
    Ok(session)
}

fn authenticate(
    session: &Session,
    connection: &ConnectionConfig,
    candidates: &[CredentialSource],
    logger: &Logger,
) -> Result<CredentialSource, PipelineError> {
    let mut attempted = Vec::new();
    for candidate in candidates {
        let outcome = match candidate {
            CredentialSource::Agent => session.userauth_agent(&connection.username),
            CredentialSource::KeyFile(path) => session.userauth_pubkey_file(
                &connection.username,
                None,
                path,
                connection.passphrase.as_deref(),
            ),
        };
        match outcome {
            Ok(()) if session.authenticated() => return Ok(candidate.clone()),
            Ok(()) => attempted.push(format!("{} (rejected)", candidate)),
            Err(err) => {
                logger.debug(
                    "Credential rejected",
                    Some(&serde_json::json!({
                        "credential": candidate.to_string(),
                        "reason": err.message(),
                    })),
                );
                attempted.push(format!("{} ({})", candidate, err.message()));
            }
        }
    }

    let tried = if attempted.is_empty() {
        "no credentials available".to_string()
    } else {
        attempted.join(", ")
    };
    let hint = if connection.key_file.is_some() && connection.passphrase.is_none() {
        "If the key is encrypted, export TRANSFERLOG_KEY_PASSPHRASE."
    } else {
        "Pass --key-file, or load a key into ssh-agent."
    };
    Err(PipelineError::auth(format!(
        "SSH authentication failed for {}; tried: {}",
        connection.target(),
        tried
    ))
    .with_hint(hint))
}

fn pump<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
    label: &str,
) -> Result<bool, PipelineError> {
    match reader.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(PipelineError::transfer(format!(
            "SSH {} read failed: {}",
            label, err
        ))),
    }
}

fn fingerprint_host_key_sha256(session: &Session) -> Option<String> {
    let hash = session.host_key_hash(ssh2::HashType::Sha256)?;
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{}", encoded))
}

fn clamp_timeout_ms(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

pub(crate) fn map_ssh_error(err: ssh2::Error, context: &str, kind: ErrorKind) -> PipelineError {
    let io_err: io::Error = err.into();
    match io_err.kind() {
        io::ErrorKind::TimedOut => {
            PipelineError::timeout(format!("{}: SSH operation timed out", context))
        }
        _ => PipelineError::new(kind, format!("{}: {}", context, io_err)),
    }
}
