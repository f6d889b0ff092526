use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{InsightsError, Result};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// `json` selects JSON lines; anything else is compact text.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Sets up the logging subscriber for the process.
///
/// `RUST_LOG` wins when set; otherwise each of `components` logs at INFO.
pub fn init_logger(components: &[&str], format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_directives(components))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init(),
    };

    result.map_err(|e| InsightsError::Config(format!("failed to initialize logger: {}", e)))
}

fn default_directives(components: &[&str]) -> String {
    components
        .iter()
        .map(|component| format!("{}={}", component, Level::INFO))
        .collect::<Vec<_>>()
        .join(",")
}
