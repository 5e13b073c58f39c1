use clap::Args;
use std::path::{Path, PathBuf};
use wscope::settings::{Settings, SettingsError};

#[derive(Args, Debug, Clone)]
pub struct WsOpts {
    /// Socket address (e.g., ws://localhost:8080, wss://example.com/feed)
    pub url: String,

    /// Settings file (YAML); missing keys take their defaults
    #[arg(short = 's', long = "settings", default_value = "wscope.yaml")]
    pub settings: PathBuf,

    /// Write log output to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    #[arg(long = "log-level", value_enum, default_value_t = logging::LogLevel::Warn)]
    pub log_level: logging::LogLevel,

    /// Do not log pings, pongs and handshake responses
    #[arg(long = "no-high-detail")]
    pub no_high_detail: bool,
}

impl WsOpts {
    pub fn log_config(&self) -> logging::LogConfig {
        logging::LogConfig {
            level: self.log_level,
            file: self.log_file.clone(),
        }
    }

    /// Settings from the settings file, with the command line applied.
    pub fn load_settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::load(Path::new(&self.settings))?;
        if self.no_high_detail {
            settings.high_detail = false;
        }
        Ok(settings)
    }
}

pub mod logging {
    use clap::ValueEnum;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing::level_filters::LevelFilter;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn to_filter(self) -> LevelFilter {
            match self {
                LogLevel::Error => LevelFilter::ERROR,
                LogLevel::Warn => LevelFilter::WARN,
                LogLevel::Info => LevelFilter::INFO,
                LogLevel::Debug => LevelFilter::DEBUG,
                LogLevel::Trace => LevelFilter::TRACE,
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum LogInitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Environment variable holding a filter directive that replaces the
    /// level from the command line.
    pub const FILTER_ENV: &str = "WSCOPE_LOG";

    /// Installs the global subscriber. Without a log file, output goes to
    /// stderr.
    pub fn init(config: &LogConfig) -> Result<(), LogInitError> {
        if GUARD.get().is_some() {
            return Ok(());
        }

        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LogInitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter(config.level))
            .with_target(config.level >= LogLevel::Debug)
            .with_thread_names(config.level >= LogLevel::Trace)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| LogInitError::Configure(err.to_string()))?;
        let _ = GUARD.set(guard);
        Ok(())
    }

    fn env_filter(level: LogLevel) -> EnvFilter {
        if let Ok(filter) = std::env::var(FILTER_ENV) {
            return EnvFilter::new(filter);
        }
        if level > LogLevel::Info {
            // tungstenite is chatty below info
            EnvFilter::new(format!("{},tungstenite=info", level.to_filter()))
        } else {
            EnvFilter::new(level.to_filter().to_string())
        }
    }
}
