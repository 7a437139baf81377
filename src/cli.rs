use crate::config::{Config, ConnectionConfig, MatchStrategy};
use crate::constants::{defaults, env as env_keys, network};
use crate::utils::paths::env_u64;
use crate::utils::user_paths::expand_home_path;
use clap::Parser;
use std::path::PathBuf;

/// Find a transfer log entry over SSH and save its SOAP response as formatted XML.
///
/// Example: transferlog --alias zurich --identity 1235435zvcxvsdf
#[derive(Parser, Debug)]
#[command(name = "transferlog", version)]
pub struct Cli {
    /// SSH server hostname
    #[arg(long, default_value = defaults::HOSTNAME)]
    pub hostname: String,

    /// SSH server port
    #[arg(long, default_value_t = network::SSH_DEFAULT_PORT)]
    pub port: u16,

    /// SSH username
    #[arg(long, default_value = defaults::USERNAME)]
    pub username: String,

    /// Private key file; without it the ssh-agent and ~/.ssh default keys are tried
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Remote log directory
    #[arg(long, default_value = defaults::LOG_DIR)]
    pub log_dir: String,

    /// File name prefix, e.g. "zurich" for zurich.log.*
    #[arg(long)]
    pub alias: String,

    /// Literal string to search for in the log files
    #[arg(long)]
    pub identity: String,

    /// Local directory for downloaded files
    #[arg(long, default_value = defaults::OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Output name for extracted XML, prefixed with the log file stem
    #[arg(long, default_value = defaults::XML_OUTPUT)]
    pub xml_output: String,

    /// Where to search file contents: remote (grep on the server) or local (download first)
    #[arg(long, default_value = "remote", value_parser = parse_match_strategy)]
    pub match_strategy: MatchStrategy,

    /// JSON file mapping aliases to insurer names
    #[arg(long)]
    pub alias_map: Option<PathBuf>,

    /// TCP connect and handshake timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Timeout for each remote command in milliseconds
    #[arg(long)]
    pub command_timeout_ms: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_match_strategy(value: &str) -> Result<MatchStrategy, String> {
    MatchStrategy::from_name(value)
        .ok_or_else(|| format!("unknown match strategy {:?} (use remote or local)", value))
}

impl Cli {
    pub fn into_config(self) -> Config {
        let mut connection = ConnectionConfig::new(self.hostname, self.username);
        connection.port = self.port;
        connection.key_file = self.key_file.map(expand_home_path);
        connection.passphrase = std::env::var(env_keys::KEY_PASSPHRASE)
            .ok()
            .filter(|value| !value.is_empty());
        connection.connect_timeout_ms = self
            .connect_timeout_ms
            .or_else(|| env_u64(env_keys::CONNECT_TIMEOUT_MS))
            .unwrap_or(network::TIMEOUT_SSH_CONNECT_MS);
        connection.command_timeout_ms = self
            .command_timeout_ms
            .or_else(|| env_u64(env_keys::EXEC_TIMEOUT_MS))
            .unwrap_or(network::TIMEOUT_SSH_EXEC_DEFAULT_MS);

        let mut config = Config::new(self.alias, self.identity);
        config.connection = connection;
        config.log_dir = self.log_dir;
        config.output_dir = self.output_dir;
        config.xml_output = self.xml_output;
        config.match_strategy = self.match_strategy;
        config.alias_map = self.alias_map;
        config.verbose = self.verbose;
        config
    }
}
