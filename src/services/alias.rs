use crate::errors::PipelineError;
use crate::services::logger::Logger;
use crate::utils::paths::resolve_aliases_path;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read-only alias -> insurer name table. Purely informational for status output.
#[derive(Debug, Clone, Default)]
pub struct AliasDirectory {
    source: Option<PathBuf>,
    companies: BTreeMap<String, String>,
}

impl AliasDirectory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(explicit: Option<&Path>, logger: &Logger) -> Result<Self, PipelineError> {
        let Some(path) = resolve_aliases_path(explicit) else {
            return Ok(Self::empty());
        };
        if !path.is_file() {
            if explicit.is_some() {
                return Err(PipelineError::invalid_params(format!(
                    "alias map not found: {}",
                    path.display()
                )));
            }
            logger.debug(
                "No alias map found",
                Some(&serde_json::json!({ "path": path.display().to_string() })),
            );
            return Ok(Self::empty());
        }
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            PipelineError::invalid_params(format!(
                "Failed to read alias map {}: {}",
                path.display(),
                err
            ))
        })?;
        let mut directory = Self::parse(&raw).map_err(|err| {
            PipelineError::invalid_params(format!("{} ({})", err.message, path.display()))
        })?;
        directory.source = Some(path);
        Ok(directory)
    }

    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let parsed: Value = serde_json::from_str(raw).map_err(|err| {
            PipelineError::invalid_params(format!("Failed to parse alias map: {}", err))
        })?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| PipelineError::invalid_params("alias map must be a JSON object"))?;
        let mut companies = BTreeMap::new();
        for (alias, company) in obj {
            let name = match company {
                Value::String(name) => name.clone(),
                Value::Object(map) => map
                    .get("company")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                _ => String::new(),
            };
            if name.trim().is_empty() {
                continue;
            }
            companies.insert(alias.clone(), name);
        }
        Ok(Self {
            source: None,
            companies,
        })
    }

    pub fn company(&self, alias: &str) -> Option<&str> {
        self.companies.get(alias).map(String::as_str)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}
