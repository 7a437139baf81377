pub mod defaults {
    pub const HOSTNAME: &str = "transfer01.live.bipro.demv.systems";
    pub const USERNAME: &str = "developer";
    pub const LOG_DIR: &str = "/var/www/bipro-transfer/current/logs";
    pub const OUTPUT_DIR: &str = "./downloads";
    pub const XML_OUTPUT: &str = "extracted_response.xml";
    pub const EXTRACTED_DIR: &str = "extracted";
    pub const RAW_PREFIX: &str = "raw_";
}

pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_CONNECT_MS: u64 = 10_000;
    pub const TIMEOUT_SSH_EXEC_DEFAULT_MS: u64 = 45_000;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
    pub const POLL_INTERVAL_MS: u64 = 20;
}

pub mod auth {
    /// Relative to the home directory; tried in order after the ssh-agent.
    pub const DEFAULT_KEY_FILES: &[&str] = &[
        ".ssh/id_rsa",
        ".ssh/id_ecdsa",
        ".ssh/id_ed25519",
        ".ssh/id_dsa",
    ];
}

pub mod env {
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const KEY_PASSPHRASE: &str = "TRANSFERLOG_KEY_PASSPHRASE";
    pub const ALIASES_PATH: &str = "TRANSFERLOG_ALIASES_PATH";
    pub const CONNECT_TIMEOUT_MS: &str = "TRANSFERLOG_SSH_CONNECT_TIMEOUT_MS";
    pub const EXEC_TIMEOUT_MS: &str = "TRANSFERLOG_SSH_EXEC_TIMEOUT_MS";
}

pub mod extraction {
    pub const MARKER: &str = "Response:";
    /// The payload of interest sits on the second marker line of a transfer log.
    pub const MARKER_OCCURRENCE: usize = 2;
}

pub mod buffers {
    pub const EXEC_READ_CHUNK_SIZE: usize = 8 * 1024;
}
