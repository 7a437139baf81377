pub mod fetch;
pub mod locate;
pub mod matcher;

use crate::config::Config;
use crate::errors::PipelineError;
use crate::managers::ssh::RemoteHost;
use crate::services::extractor;
use crate::services::logger::Logger;
use crate::services::xml_format;
use crate::utils::cancel::CancelFlag;
use crate::utils::compression::decode_text;
use serde::Serialize;
use std::path::PathBuf;

pub use locate::RemoteFileRef;
pub use matcher::{ContentMatcher, MatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Match,
    Fetch,
    Read,
    Extract,
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedDocument {
    pub origin: String,
    pub line_number: usize,
    pub occurrence: usize,
    pub root: String,
    pub raw: bool,
    /// Decompressed download the fragment was read from.
    pub local_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum FileOutcome {
    NotMatched {
        file: String,
    },
    Written(ExtractedDocument),
    Failed {
        file: String,
        stage: Stage,
        error: PipelineError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub located: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn matched(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| match outcome {
                FileOutcome::NotMatched { .. } => false,
                FileOutcome::Failed { stage, .. } => *stage != Stage::Match,
                FileOutcome::Written(_) => true,
            })
            .count()
    }

    pub fn written(&self) -> Vec<&ExtractedDocument> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FileOutcome::Written(doc) => Some(doc),
                _ => None,
            })
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, FileOutcome::Failed { .. }))
            .count()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "located": self.located,
            "matched": self.matched(),
            "written": self.written().len(),
            "raw": self.written().iter().filter(|doc| doc.raw).count(),
            "failed": self.failed(),
        })
    }
}

pub struct PipelineManager {
    logger: Logger,
    config: Config,
    matcher: ContentMatcher,
    cancel: CancelFlag,
}

impl PipelineManager {
    pub fn new(logger: &Logger, config: &Config) -> Self {
        let logger = logger.child("pipeline");
        let matcher = ContentMatcher::new(&logger, config.match_strategy);
        Self {
            logger,
            config: config.clone(),
            matcher,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Locates candidates, then takes each one from match to saved document before the next.
    pub fn run(&self, host: &dyn RemoteHost) -> Result<RunSummary, PipelineError> {
        let files = locate::list(host, &self.config.log_dir, &self.config.alias)?;
        let mut summary = RunSummary {
            located: files.len(),
            outcomes: Vec::with_capacity(files.len()),
        };
        if files.is_empty() {
            self.logger.info(
                "No files found matching pattern",
                Some(&serde_json::json!({
                    "log_dir": self.config.log_dir,
                    "alias": self.config.alias,
                })),
            );
            return Ok(summary);
        }
        self.logger.info(
            &format!("Found {} file(s) matching pattern", files.len()),
            Some(&serde_json::json!({
                "files": files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            })),
        );

        for file in &files {
            self.cancel.check()?;
            let outcome = match self.process_file(host, file) {
                Ok(outcome) => outcome,
                Err((_, err)) if err.is_fatal() => return Err(err),
                Err((stage, err)) => {
                    self.logger.warn(
                        &format!("Skipping {}: {}", file.name, err.message),
                        Some(&serde_json::json!({
                            "stage": stage,
                            "kind": err.kind.as_str(),
                        })),
                    );
                    FileOutcome::Failed {
                        file: file.name.clone(),
                        stage,
                        error: err,
                    }
                }
            };
            summary.outcomes.push(outcome);
        }
        Ok(summary)
    }

    fn process_file(
        &self,
        host: &dyn RemoteHost,
        file: &RemoteFileRef,
    ) -> Result<FileOutcome, (Stage, PipelineError)> {
        let matched = self
            .matcher
            .check(host, file, &self.config.identity)
            .map_err(|err| (Stage::Match, err))?;
        if !matched.found {
            self.logger.info(
                &format!("Identity not found in {}", file.name),
                None,
            );
            return Ok(FileOutcome::NotMatched {
                file: file.name.clone(),
            });
        }
        self.logger
            .info(&format!("Identity found in {}", file.name), None);

        let matched = fetch::download(host, matched, &self.config.output_dir)
            .map_err(|err| (Stage::Fetch, err))?;
        let local_path = matched.local_path.clone().ok_or_else(|| {
            (
                Stage::Fetch,
                PipelineError::internal(format!("No local copy of {}", file.name)),
            )
        })?;
        self.logger.info(
            &format!(
                "Downloaded {} ({})",
                local_path.display(),
                file.compression.label()
            ),
            None,
        );

        let bytes = std::fs::read(&local_path).map_err(|err| {
            (
                Stage::Read,
                PipelineError::transfer(format!("Failed to read {}: {}", local_path.display(), err)),
            )
        })?;
        let fragment =
            extractor::extract(&decode_text(bytes)).map_err(|err| (Stage::Extract, err))?;
        self.logger.debug(
            "Extracted fragment",
            Some(&serde_json::json!({
                "file": file.name,
                "line": fragment.line_number,
                "marker_lines": fragment.occurrences_total,
                "root": fragment.root,
                "closed": fragment.closed,
                "chars": fragment.text.len(),
            })),
        );

        let formatted = xml_format::format(&fragment.text);
        if let Some(reason) = formatted.parse_error.as_deref() {
            self.logger.warn(
                &format!("XML from {} did not parse; keeping it raw", file.name),
                Some(&serde_json::json!({ "reason": reason })),
            );
        }
        let base = format!("{}_{}", file.stem(), self.config.xml_output);
        let output_path = xml_format::save(&self.config.extracted_dir(), &base, &formatted)
            .map_err(|err| (Stage::Save, err))?;
        self.logger
            .info(&format!("Saved {}", output_path.display()), None);

        Ok(FileOutcome::Written(ExtractedDocument {
            origin: matched.file.name,
            line_number: fragment.line_number,
            occurrence: fragment.occurrence,
            root: fragment.root,
            raw: formatted.raw,
            local_path,
            output_path,
        }))
    }
}
