use crate::errors::PipelineError;
use crate::managers::ssh::RemoteHost;
use crate::utils::compression::Compression;
use crate::utils::shell::shell_quote;
use crate::utils::user_paths::join_remote;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFileRef {
    pub name: String,
    pub remote_path: String,
    pub compression: Compression,
}

impl RemoteFileRef {
    pub fn new(directory: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_path: join_remote(directory, name),
            compression: Compression::from_file_name(name),
        }
    }

    /// File name once decompressed locally.
    pub fn local_name(&self) -> &str {
        self.compression.strip_extension(&self.name)
    }

    /// Name minus its last extension: `jan.log.1.zst` -> `jan.log.1`.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// `<alias>.log` at the start of the name, followed by a `.` or nothing.
pub fn alias_pattern(alias: &str) -> Result<Regex, PipelineError> {
    Regex::new(&format!(r"^{}\.log(?:\..*)?$", regex::escape(alias)))
        .map_err(|err| PipelineError::invalid_params(format!("Invalid alias pattern: {}", err)))
}

/// `-p` marks directories with a trailing `/` so they can be dropped.
pub fn list_command(directory: &str) -> String {
    format!("ls -1p -- {}", shell_quote(directory))
}

pub fn filter_names<'a, I>(names: I, pattern: &Regex) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|name| !name.is_empty() && !name.ends_with('/') && pattern.is_match(name))
        .map(str::to_string)
        .collect()
}

/// One non-recursive listing of `directory`, filtered locally, in listing order.
pub fn list(
    host: &dyn RemoteHost,
    directory: &str,
    alias: &str,
) -> Result<Vec<RemoteFileRef>, PipelineError> {
    let pattern = alias_pattern(alias)?;
    let output = host.run(&list_command(directory))?;
    if !output.success() {
        return Err(PipelineError::not_found(format!(
            "Cannot list remote directory {}: {}",
            directory,
            output.stderr.trim()
        ))
        .with_hint("Check --log-dir on the target host."));
    }
    Ok(filter_names(output.stdout.lines(), &pattern)
        .into_iter()
        .map(|name| RemoteFileRef::new(directory, &name))
        .collect())
}
