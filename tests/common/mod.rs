#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use transferlog::errors::PipelineError;
use transferlog::managers::ssh::{ExecOutput, RemoteHost};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const REMOTE_LOG_DIR: &str = "/var/www/bipro-transfer/current/logs";

pub fn tmp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create tmp dir");
    dir
}

pub fn restore_env(key: &str, previous: Option<String>) {
    match previous {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

pub fn gzip_bytes(text: &str) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(text.as_bytes()).expect("gzip encode");
    encoder.finish().expect("gzip finish")
}

pub fn zstd_bytes(text: &str) -> Vec<u8> {
    zstd::stream::encode_all(text.as_bytes(), 3).expect("zstd encode")
}

pub fn envelope(id: &str) -> String {
    format!(
        concat!(
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:t="urn:bipro:transfer">"#,
            r#"<soap:Body><t:getShipmentResponse><t:Status code="OK"/><t:Id>{}</t:Id>"#,
            "</t:getShipmentResponse></soap:Body></soap:Envelope>"
        ),
        id
    )
}

/// Serves a local directory as if it were the remote log directory.
pub struct LocalDirHost {
    pub root: PathBuf,
    pub remote_dir: String,
    pub commands: RefCell<Vec<String>>,
    pub transfers: RefCell<Vec<String>>,
}

impl LocalDirHost {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            remote_dir: REMOTE_LOG_DIR.to_string(),
            commands: RefCell::new(Vec::new()),
            transfers: RefCell::new(Vec::new()),
        }
    }

    pub fn put(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.root.join(name), bytes).expect("write remote fixture");
    }

    fn local_for(&self, remote_path: &str) -> Option<PathBuf> {
        let name = remote_path.strip_prefix(&format!("{}/", self.remote_dir))?;
        Some(self.root.join(name))
    }
}

impl RemoteHost for LocalDirHost {
    fn run(&self, command: &str) -> Result<ExecOutput, PipelineError> {
        self.commands.borrow_mut().push(command.to_string());
        if let Some(quoted) = command.strip_prefix("ls -1p -- ") {
            let dir = quoted.trim_matches('\'');
            if dir != self.remote_dir {
                return Ok(ExecOutput {
                    stdout: String::new(),
                    stderr: format!("ls: cannot access '{}': No such file or directory", dir),
                    exit_code: 2,
                });
            }
            let mut names: Vec<String> = std::fs::read_dir(&self.root)
                .expect("list fixture dir")
                .filter_map(|entry| entry.ok())
                .map(|entry| {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if entry.path().is_dir() {
                        format!("{}/", name)
                    } else {
                        name
                    }
                })
                .collect();
            names.sort();
            let mut stdout = names.join("\n");
            stdout.push('\n');
            return Ok(ExecOutput {
                stdout,
                stderr: String::new(),
                exit_code: 0,
            });
        }
        // Every search fails its `command -v` lookup, like a host without the decoder.
        Ok(ExecOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 127,
        })
    }

    fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<u64, PipelineError> {
        self.transfers.borrow_mut().push(remote_path.to_string());
        let source = self
            .local_for(remote_path)
            .ok_or_else(|| PipelineError::transfer(format!("no such file: {}", remote_path)))?;
        std::fs::copy(&source, local_path)
            .map_err(|err| PipelineError::transfer(format!("{}: {}", remote_path, err)))
    }
}

/// Runs commands through `/bin/sh -c` with PATH holding only the given tools.
/// Fixtures live at their real local paths, so `log_dir()` is the remote directory.
#[cfg(unix)]
pub struct ShellHost {
    root: PathBuf,
    bin_dir: PathBuf,
    pub commands: RefCell<Vec<String>>,
    pub transfers: RefCell<Vec<String>>,
}

#[cfg(unix)]
impl ShellHost {
    /// `None` when one of `tools` is not installed on this machine.
    pub fn new(root: &Path, tools: &[&str]) -> Option<Self> {
        let logs = root.join("logs");
        let bin_dir = root.join("bin");
        std::fs::create_dir_all(&logs).expect("create logs dir");
        std::fs::create_dir_all(&bin_dir).expect("create bin dir");
        for tool in tools {
            let installed = find_tool(tool)?;
            std::os::unix::fs::symlink(installed, bin_dir.join(tool)).expect("link tool");
        }
        Some(Self {
            root: logs,
            bin_dir,
            commands: RefCell::new(Vec::new()),
            transfers: RefCell::new(Vec::new()),
        })
    }

    pub fn log_dir(&self) -> String {
        self.root.display().to_string()
    }

    pub fn put(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.root.join(name), bytes).expect("write remote fixture");
    }
}

#[cfg(unix)]
fn find_tool(tool: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
impl RemoteHost for ShellHost {
    fn run(&self, command: &str) -> Result<ExecOutput, PipelineError> {
        self.commands.borrow_mut().push(command.to_string());
        let output = std::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .env_clear()
            .env("PATH", &self.bin_dir)
            .output()
            .map_err(|err| PipelineError::connection(format!("sh failed to start: {}", err)))?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<u64, PipelineError> {
        self.transfers.borrow_mut().push(remote_path.to_string());
        std::fs::copy(remote_path, local_path)
            .map_err(|err| PipelineError::transfer(format!("{}: {}", remote_path, err)))
    }
}
