use crate::constants::{defaults, network};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Decompress and grep on the server; fall back to `Local` when the tool is missing.
    Remote,
    /// Pull each candidate into a temporary file and search it locally.
    Local,
}

impl MatchStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "remote" => Some(MatchStrategy::Remote),
            "local" => Some(MatchStrategy::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_file: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: network::SSH_DEFAULT_PORT,
            username: username.into(),
            key_file: None,
            passphrase: None,
            connect_timeout_ms: network::TIMEOUT_SSH_CONNECT_MS,
            command_timeout_ms: network::TIMEOUT_SSH_EXEC_DEFAULT_MS,
            keepalive_interval_ms: network::KEEPALIVE_INTERVAL_MS,
        }
    }

    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub log_dir: String,
    pub alias: String,
    pub identity: String,
    pub output_dir: PathBuf,
    pub xml_output: String,
    pub match_strategy: MatchStrategy,
    pub alias_map: Option<PathBuf>,
    pub verbose: bool,
}

impl Config {
    pub fn new(alias: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::new(defaults::HOSTNAME, defaults::USERNAME),
            log_dir: defaults::LOG_DIR.to_string(),
            alias: alias.into(),
            identity: identity.into(),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            xml_output: defaults::XML_OUTPUT.to_string(),
            match_strategy: MatchStrategy::Remote,
            alias_map: None,
            verbose: false,
        }
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.output_dir.join(defaults::EXTRACTED_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, MatchStrategy};

    #[test]
    fn defaults_follow_the_operational_setup() {
        let config = Config::new("jan", "11570475");
        assert_eq!(config.connection.host, "transfer01.live.bipro.demv.systems");
        assert_eq!(config.connection.username, "developer");
        assert_eq!(config.connection.port, 22);
        assert_eq!(config.log_dir, "/var/www/bipro-transfer/current/logs");
        assert_eq!(config.xml_output, "extracted_response.xml");
        assert_eq!(
            config.extracted_dir(),
            std::path::PathBuf::from("./downloads").join("extracted")
        );
        assert_eq!(config.match_strategy, MatchStrategy::Remote);
    }

    #[test]
    fn parses_match_strategy_names() {
        assert_eq!(MatchStrategy::from_name("LOCAL"), Some(MatchStrategy::Local));
        assert_eq!(MatchStrategy::from_name("remote"), Some(MatchStrategy::Remote));
        assert_eq!(MatchStrategy::from_name("sftp"), None);
    }
}
