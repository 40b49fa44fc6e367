//! Logging setup shared by the library's consumers.
//!
//! ```ignore
//! let config = LogConfig::from_env("info").with_stderr();
//! let _guards = init_logging(&config)?;
//! ```
//!
//! The returned guards flush the non-blocking file writer on drop and must be
//! held for as long as logging is wanted.

use crate::config::EnvParser;
use std::io::IsTerminal;
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directives}': {reason}")]
    Filter { directives: String, reason: String },

    #[error("Failed to prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub stderr: bool,
    pub file: Option<PathBuf>,
    /// Problems found while reading the environment, reported once logging is up.
    pub warnings: Vec<String>,
}

impl LogConfig {
    /// Read AZPS_LOG_LEVEL, AZPS_LOG_FORMAT and AZPS_LOG_FILE.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("LOG_LEVEL", default_level).value;
        let format = LogFormat::parse(
            parser
                .get_choice("LOG_FORMAT", "pretty", &["pretty", "json"])
                .value,
        );
        let file = parser.get_optional_path("LOG_FILE").value;
        let warnings = parser
            .take_errors()
            .iter()
            .map(ToString::to_string)
            .collect();

        Self {
            level,
            format,
            stderr: false,
            file,
            warnings,
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Filter directives: dependencies stay at warn, our crates use `level`.
    pub fn directives(&self) -> String {
        format!(
            "warn,azps={level},azps_common={level}",
            level = self.level
        )
    }
}

/// Keeps background log writers alive.
#[must_use = "dropping the guards stops file logging"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Colour only when a person is watching; redirected output stays plain.
fn use_ansi(stream: &impl IsTerminal) -> bool {
    stream.is_terminal()
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global tracing subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let directives = config.directives();
    let filter = EnvFilter::try_new(&directives).map_err(|e| LoggingError::Filter {
        directives: directives.clone(),
        reason: e.to_string(),
    })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    if config.stderr {
        let ansi = use_ansi(&std::io::stderr());
        layers.push(fmt_layer(config.format, std::io::stderr, ansi));
    }

    if let Some(path) = &config.file {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| LoggingError::LogFile {
            path: path.clone(),
            source,
        })?;
        let file_name = path.file_name().unwrap_or_else(|| "azps.log".as_ref());
        let appender = tracing_appender::rolling::never(&dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config.format, writer, false));
        guards.push(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    Ok(LoggingGuards { _guards: guards })
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;

    fn set_env(key: &str, value: &str) {
        // SAFETY: env mutation is serialized by env_test_lock
        unsafe { std::env::set_var(key, value) };
    }

    fn cleanup_env() {
        for var in ["AZPS_LOG_LEVEL", "AZPS_LOG_FORMAT", "AZPS_LOG_FILE"] {
            // SAFETY: env mutation is serialized by env_test_lock
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn test_from_env_defaults() {
        let _guard = env_test_lock();
        cleanup_env();

        let config = LogConfig::from_env("info");
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.stderr);
        assert!(config.file.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_from_env_reads_variables_and_collects_warnings() {
        let _guard = env_test_lock();
        cleanup_env();
        set_env("AZPS_LOG_LEVEL", "chatty");
        set_env("AZPS_LOG_FORMAT", "json");
        set_env("AZPS_LOG_FILE", "/tmp/azps-test.log");

        let config = LogConfig::from_env("warn");
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/azps-test.log")));
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("AZPS_LOG_LEVEL"));

        cleanup_env();
    }

    #[test]
    fn test_builders_and_directives() {
        let config = LogConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            stderr: false,
            file: None,
            warnings: Vec::new(),
        }
        .with_stderr()
        .with_level("debug")
        .with_format(LogFormat::Json);

        assert!(config.stderr);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directives(), "warn,azps=debug,azps_common=debug");
    }

    #[derive(Clone, Default)]
    struct Buffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_redirected_output_has_no_colour() {
        let file = tempfile::tempfile().unwrap();
        assert!(!use_ansi(&file));

        let buffer = Buffer::default();
        let layer = fmt_layer(LogFormat::Pretty, buffer.clone(), use_ansi(&file));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("plain text please");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("plain text please"));
        assert!(!output.contains('\u{1b}'), "escape codes in {output:?}");
    }

    #[test]
    fn test_init_logging_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("azps.log");
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            stderr: false,
            file: None,
            warnings: Vec::new(),
        }
        .with_file(&path);

        let guards = init_logging(&config).unwrap();
        tracing::info!(target: "azps_common", attempt = 1, "written to the log file");
        drop(guards);

        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().expect("one log line");
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "written to the log file");
        assert_eq!(value["fields"]["attempt"], 1);

        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
