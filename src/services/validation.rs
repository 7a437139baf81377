use crate::config::Config;
use crate::errors::PipelineError;

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_non_empty(&self, value: &str, label: &str) -> Result<(), PipelineError> {
        if value.trim().is_empty() {
            return Err(PipelineError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(())
    }

    /// Aliases become a file-name prefix, so they must not address other directories.
    pub fn ensure_alias(&self, alias: &str) -> Result<(), PipelineError> {
        self.ensure_non_empty(alias, "alias")?;
        if alias.contains('/') || alias.contains('\0') {
            return Err(PipelineError::invalid_params(format!(
                "alias must be a plain file-name prefix, got {:?}",
                alias
            ))
            .with_hint("Pass only the prefix, e.g. --alias zurich for zurich.log.*"));
        }
        Ok(())
    }

    pub fn ensure_identity(&self, identity: &str) -> Result<(), PipelineError> {
        self.ensure_non_empty(identity, "identity")?;
        if identity.contains('\n') {
            return Err(PipelineError::invalid_params(
                "identity must fit on a single log line",
            ));
        }
        Ok(())
    }

    pub fn ensure_output_name(&self, name: &str) -> Result<(), PipelineError> {
        self.ensure_non_empty(name, "xml-output")?;
        if name.contains('/') || name.contains('\\') {
            return Err(PipelineError::invalid_params(
                "xml-output must be a file name, not a path",
            ));
        }
        Ok(())
    }

    pub fn ensure_config(&self, config: &Config) -> Result<(), PipelineError> {
        self.ensure_non_empty(&config.connection.host, "hostname")?;
        self.ensure_non_empty(&config.connection.username, "username")?;
        self.ensure_non_empty(&config.log_dir, "log-dir")?;
        self.ensure_alias(&config.alias)?;
        self.ensure_identity(&config.identity)?;
        self.ensure_output_name(&config.xml_output)?;
        if config.connection.port == 0 {
            return Err(PipelineError::invalid_params("port must be between 1 and 65535"));
        }
        if let Some(key_file) = config.connection.key_file.as_ref() {
            if !key_file.is_file() {
                return Err(PipelineError::invalid_params(format!(
                    "key file does not exist: {}",
                    key_file.display()
                ))
                .with_hint("Omit --key-file to try the ssh-agent and default keys in ~/.ssh."));
            }
        }
        Ok(())
    }
}
