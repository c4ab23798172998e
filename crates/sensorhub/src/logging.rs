use clap::ValueEnum;

/// Overrides `--log-level` when set to a level name.
pub const LOG_ENV: &str = "SENSORHUB_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }

    /// `value` as a level name, case-insensitive.
    pub fn parse_override(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value.trim(), true).ok()
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| LogLevel::parse_override(&value))
        .unwrap_or(level);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_accepts_level_names() {
        assert_eq!(LogLevel::parse_override("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse_override(" warn "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse_override("loud"), None);
    }
}
