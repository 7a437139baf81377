use crate::config::Config;
use crate::errors::PipelineError;
use crate::managers::pipeline::locate::alias_pattern;
use crate::managers::pipeline::{PipelineManager, RunSummary};
use crate::managers::ssh::RemoteSession;
use crate::services::alias::AliasDirectory;
use crate::services::logger::{LogLevel, Logger};
use crate::services::validation::Validation;
use crate::utils::cancel::CancelFlag;

pub struct App {
    pub logger: Logger,
    pub config: Config,
    pub aliases: AliasDirectory,
    cancel: CancelFlag,
}

impl App {
    pub fn initialize(config: Config, logger: Logger) -> Result<Self, PipelineError> {
        Validation::new().ensure_config(&config)?;
        let aliases = AliasDirectory::load(config.alias_map.as_deref(), &logger)?;
        Ok(Self {
            logger,
            config,
            aliases,
            cancel: CancelFlag::new(),
        })
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn announce(&self) {
        let pattern = alias_pattern(&self.config.alias)
            .map(|re| re.as_str().to_string())
            .unwrap_or_default();
        self.logger.info(
            "Starting transfer log processor",
            Some(&serde_json::json!({
                "target": self.config.connection.target(),
                "log_dir": self.config.log_dir,
                "alias": self.config.alias,
                "company": self.aliases.company(&self.config.alias),
                "alias_map": self.aliases.source().map(|path| path.display().to_string()),
                "aliases_loaded": self.aliases.len(),
                "pattern": pattern,
                "identity": self.config.identity,
            })),
        );
    }

    /// Connect, run, and close the session on every path out.
    pub fn run_blocking(&self) -> Result<RunSummary, PipelineError> {
        self.announce();
        self.cancel.check()?;
        let mut session = RemoteSession::connect(&self.config.connection, &self.logger)?
            .with_cancel(self.cancel.clone());
        let result = self.cancel.check().and_then(|_| {
            PipelineManager::new(&self.logger, &self.config)
                .with_cancel(self.cancel.clone())
                .run(&session)
        });
        session.close();
        result
    }

    fn summary_meta(&self, summary: &RunSummary) -> serde_json::Value {
        let mut meta = summary.to_json();
        meta["log"] = self.logger.stats();
        meta
    }

    fn report(&self, summary: &RunSummary) {
        let meta = self.summary_meta(summary);
        if summary.located == 0 || summary.matched() == 0 {
            self.logger
                .info("No matching files found; nothing extracted", Some(&meta));
        } else {
            self.logger.info("Processing completed", Some(&meta));
        }
    }
}

/// Returns the process exit code.
pub async fn run(config: Config) -> i32 {
    let mut logger = Logger::new("transferlog");
    if config.verbose {
        logger.set_level(LogLevel::Debug);
    }

    let app = match App::initialize(config, logger.clone()) {
        Ok(app) => app,
        Err(err) => return fail(&logger, &err),
    };
    let cancel = app.cancel_flag();

    let mut task = tokio::task::spawn_blocking(move || {
        let result = app.run_blocking();
        (app, result)
    });

    tokio::select! {
        joined = &mut task => finish(&logger, joined),
        _ = tokio::signal::ctrl_c() => {
            logger.warn("Process interrupted by user; closing the SSH session", None);
            cancel.cancel();
            // The worker notices the flag, closes its session and returns.
            let _ = task.await;
            1
        }
    }
}

fn finish(
    logger: &Logger,
    joined: Result<(App, Result<RunSummary, PipelineError>), tokio::task::JoinError>,
) -> i32 {
    match joined {
        Ok((app, Ok(summary))) => {
            app.report(&summary);
            for doc in summary.written() {
                println!("{}", doc.output_path.display());
            }
            0
        }
        Ok((_, Err(err))) => fail(logger, &err),
        Err(_) => fail(logger, &PipelineError::internal("Pipeline task failed")),
    }
}

fn fail(logger: &Logger, err: &PipelineError) -> i32 {
    logger.error(
        &err.message,
        Some(&serde_json::json!({
            "kind": err.kind.as_str(),
            "hint": err.hint,
        })),
    );
    err.exit_code()
}
