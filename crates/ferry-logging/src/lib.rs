//! Structured logging for Ferry nodes
//!
//! Console output (pretty or JSONL), optional JSONL log files with rotation,
//! and per-node context so that interleaved output from many simulated
//! nodes can be told apart.
//!
//! # Quick Start
//!
//! ```ignore
//! use ferry_logging::{FerrySubscriberBuilder, LogConfig};
//!
//! let _guard = FerrySubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```
//!
//! # Node Context
//!
//! ```ignore
//! use ferry_logging::PeerContextGuard;
//!
//! let _ctx = PeerContextGuard::new(&node);
//! tracing::info!("Forwarding");
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{PeerContextData, PeerContextGuard};
pub use layers::{PeerContextExtension, PeerContextLayer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling appender: {0}")]
    Appender(#[from] InitError),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

type BaseSubscriber = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync>;

/// Builder for configuring and installing the Ferry subscriber
pub struct FerrySubscriberBuilder {
    config: LogConfig,
}

impl FerrySubscriberBuilder {
    /// Create a builder with the default configuration (JSONL to console)
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Add a filter directive such as `"ferry_dtn=trace"`
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.config.directives.push(directive.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration that will be installed
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// RUST_LOG takes precedence over the configured level. When file output
    /// is enabled, the returned guard must be kept alive until exit so
    /// buffered lines are flushed.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter_string()));

        let mut layers: Vec<BoxedLayer> = vec![PeerContextLayer::new().boxed()];

        if self.config.console.enabled {
            if self.config.console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                layers.push(layers::jsonl_layer(std::io::stdout, &self.config.jsonl));
            }
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, worker) = file_writer(file_config)?;
            layers.push(layers::jsonl_layer(writer, &self.config.jsonl));
            guard = Some(worker);
        }

        Registry::default().with(env_filter).with(layers).try_init()?;
        Ok(guard)
    }
}

impl Default for FerrySubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single file; the rotating strategies append.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl")
        .build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the development preset (pretty console, debug level)
pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    FerrySubscriberBuilder::new()
        .with_config(LogConfig::development())
        .try_init()
}

/// Install the testing preset, ignoring an already-installed subscriber
pub fn init_testing() {
    let _ = FerrySubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
