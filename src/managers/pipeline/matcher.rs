use super::locate::RemoteFileRef;
use crate::config::MatchStrategy;
use crate::errors::PipelineError;
use crate::managers::ssh::{ExecOutput, RemoteHost};
use crate::services::logger::Logger;
use crate::utils::compression::NeedleSink;
use crate::utils::shell::shell_quote;
use std::path::PathBuf;

const EXIT_COMMAND_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub file: RemoteFileRef,
    pub found: bool,
    /// Filled in once the file has been downloaded and decompressed.
    pub local_path: Option<PathBuf>,
}

pub struct ContentMatcher {
    logger: Logger,
    strategy: MatchStrategy,
}

impl ContentMatcher {
    pub fn new(logger: &Logger, strategy: MatchStrategy) -> Self {
        Self {
            logger: logger.child("match"),
            strategy,
        }
    }

    /// One verdict for `file`; `local_path` stays empty until the download step.
    pub fn check(
        &self,
        host: &dyn RemoteHost,
        file: &RemoteFileRef,
        identity: &str,
    ) -> Result<MatchResult, PipelineError> {
        let found = self.matches(host, file, identity)?;
        Ok(MatchResult {
            file: file.clone(),
            found,
            local_path: None,
        })
    }

    pub fn matches(
        &self,
        host: &dyn RemoteHost,
        file: &RemoteFileRef,
        identity: &str,
    ) -> Result<bool, PipelineError> {
        match self.strategy {
            MatchStrategy::Local => matches_locally(host, file, identity),
            MatchStrategy::Remote => match matches_remotely(host, file, identity)? {
                Some(found) => Ok(found),
                None => {
                    self.logger.debug(
                        "Remote tool missing, searching a local copy",
                        Some(&serde_json::json!({
                            "file": file.name,
                            "codec": file.compression.label(),
                        })),
                    );
                    matches_locally(host, file, identity)
                }
            },
        }
    }
}

/// A pipeline reports grep's status only, so the tools are looked up first and
/// a missing one exits 127 before anything runs.
pub fn remote_search_command(file: &RemoteFileRef, identity: &str) -> String {
    format!(
        "command -v {} >/dev/null 2>&1 && command -v grep >/dev/null 2>&1 || exit {}; {} -- {} | grep -F -q -e {}",
        file.compression.remote_tool(),
        EXIT_COMMAND_NOT_FOUND,
        file.compression.remote_reader_command(),
        shell_quote(&file.remote_path),
        shell_quote(identity)
    )
}

/// `None` means the remote side lacks the decoder or grep.
pub fn interpret_search_exit(
    file: &RemoteFileRef,
    output: &ExecOutput,
) -> Result<Option<bool>, PipelineError> {
    match output.exit_code {
        0 => Ok(Some(true)),
        1 if output.stderr.trim().is_empty() => Ok(Some(false)),
        EXIT_COMMAND_NOT_FOUND => Ok(None),
        code => Err(PipelineError::decode(format!(
            "Cannot read {} as {} (exit {}): {}",
            file.name,
            file.compression.label(),
            code,
            output.stderr.trim()
        ))),
    }
}

fn matches_remotely(
    host: &dyn RemoteHost,
    file: &RemoteFileRef,
    identity: &str,
) -> Result<Option<bool>, PipelineError> {
    let output = host.run(&remote_search_command(file, identity))?;
    interpret_search_exit(file, &output)
}

/// Pulls into a temp file that is removed on every path, then decodes and scans it.
fn matches_locally(
    host: &dyn RemoteHost,
    file: &RemoteFileRef,
    identity: &str,
) -> Result<bool, PipelineError> {
    let scratch = tempfile::Builder::new()
        .prefix("transferlog-")
        .suffix(&format!("-{}", file.name))
        .tempfile()
        .map_err(|err| PipelineError::internal(format!("Failed to create temp file: {}", err)))?;
    host.transfer(&file.remote_path, scratch.path())?;

    let reader = std::fs::File::open(scratch.path())
        .map_err(|err| PipelineError::transfer(format!("Failed to reopen download: {}", err)))?;
    let mut sink = NeedleSink::new(identity);
    file.compression
        .decompress_to(std::io::BufReader::new(reader), &mut sink)
        .map_err(|err| {
            PipelineError::decode(format!(
                "Cannot decode {} as {}: {}",
                file.name,
                file.compression.label(),
                err
            ))
        })?;
    Ok(sink.found())
}

#[cfg(test)]
mod tests {
    use super::{interpret_search_exit, remote_search_command, ContentMatcher};
    use crate::config::MatchStrategy;
    use crate::errors::{ErrorKind, PipelineError};
    use crate::managers::pipeline::locate::RemoteFileRef;
    use crate::managers::ssh::{ExecOutput, RemoteHost};
    use crate::services::logger::Logger;
    use std::io::Write;
    use std::path::Path;

    struct ScriptedHost {
        exit_code: i32,
        stderr: &'static str,
        payload: Vec<u8>,
    }

    impl RemoteHost for ScriptedHost {
        fn run(&self, _command: &str) -> Result<ExecOutput, PipelineError> {
            Ok(ExecOutput {
                stdout: String::new(),
                stderr: self.stderr.to_string(),
                exit_code: self.exit_code,
            })
        }

        fn transfer(&self, _remote_path: &str, local_path: &Path) -> Result<u64, PipelineError> {
            std::fs::write(local_path, &self.payload)?;
            Ok(self.payload.len() as u64)
        }
    }

    fn output(exit_code: i32, stderr: &str) -> ExecOutput {
        ExecOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).expect("encode");
        encoder.finish().expect("finish")
    }

    #[test]
    fn remote_command_quotes_path_and_identity() {
        let file = RemoteFileRef::new("/var/logs", "jan.log.1.zst");
        assert_eq!(
            remote_search_command(&file, "115'70"),
            concat!(
                "command -v zstd >/dev/null 2>&1 && command -v grep >/dev/null 2>&1 || exit 127; ",
                "zstd -dcq -- '/var/logs/jan.log.1.zst' | grep -F -q -e '115'\\''70'"
            )
        );
        let plain = RemoteFileRef::new("/var/logs", "jan.log");
        assert!(remote_search_command(&plain, "x").contains("; cat -- '/var/logs/jan.log' | grep"));
    }

    #[test]
    fn exit_codes_map_to_verdicts() {
        let file = RemoteFileRef::new("/logs", "jan.log.2.gz");
        assert_eq!(interpret_search_exit(&file, &output(0, "")).ok(), Some(Some(true)));
        assert_eq!(interpret_search_exit(&file, &output(1, "")).ok(), Some(Some(false)));
        assert_eq!(interpret_search_exit(&file, &output(127, "sh: zstd: not found")).ok(), Some(None));

        let err = interpret_search_exit(&file, &output(1, "gzip: stdin: not in gzip format"))
            .expect_err("decode failure");
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[test]
    fn missing_remote_tool_falls_back_to_local_search() {
        let host = ScriptedHost {
            exit_code: 127,
            stderr: "zstd: command not found",
            payload: gzip("header\nidentity 11570475 here\n"),
        };
        let matcher = ContentMatcher::new(&Logger::new("test"), MatchStrategy::Remote);
        let file = RemoteFileRef::new("/logs", "jan.log.2.gz");
        assert!(matcher.matches(&host, &file, "11570475").expect("match"));
        assert!(!matcher.matches(&host, &file, "99999999").expect("match"));
    }

    #[test]
    fn check_reports_verdict_without_local_path() {
        let host = ScriptedHost {
            exit_code: 0,
            stderr: "",
            payload: Vec::new(),
        };
        let matcher = ContentMatcher::new(&Logger::new("test"), MatchStrategy::Remote);
        let file = RemoteFileRef::new("/logs", "jan.log.1.zst");
        let result = matcher.check(&host, &file, "11570475").expect("check");
        assert!(result.found);
        assert_eq!(result.file, file);
        assert_eq!(result.local_path, None);
    }

    #[test]
    fn local_decode_errors_are_classified_as_decode() {
        let host = ScriptedHost {
            exit_code: 0,
            stderr: "",
            payload: b"plain text pretending to be gzip".to_vec(),
        };
        let matcher = ContentMatcher::new(&Logger::new("test"), MatchStrategy::Local);

        let err = matcher
            .matches(&host, &RemoteFileRef::new("/logs", "jan.log.2.gz"), "pretending")
            .expect_err("not gzip");
        assert_eq!(err.kind, ErrorKind::Decode);
        assert!(!err.is_fatal());

        let found = matcher
            .matches(&host, &RemoteFileRef::new("/logs", "jan.log"), "pretending")
            .expect("plain search");
        assert!(found);
    }

    #[test]
    fn local_search_leaves_no_scratch_files_behind() {
        let host = ScriptedHost {
            exit_code: 0,
            stderr: "",
            payload: b"nothing to see".to_vec(),
        };
        let matcher = ContentMatcher::new(&Logger::new("test"), MatchStrategy::Local);
        let file = RemoteFileRef::new("/logs", "jan.log.scratchcheck");
        assert!(!matcher.matches(&host, &file, "11570475").expect("search"));

        let leftovers = std::fs::read_dir(std::env::temp_dir())
            .expect("list temp dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .contains("jan.log.scratchcheck")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
