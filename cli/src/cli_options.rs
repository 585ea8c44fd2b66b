use clap::{Parser, ValueEnum};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "toggle", version, about = "Feature toggle test client", long_about = None)]
pub struct CliOptions {
    /// URL base for the feature toggle service
    #[arg(short = 'u', long = "url", default_value = "http://localhost:4242")]
    pub url: String,
    /// Path to a YAML client configuration file; takes precedence over --url
    #[arg(short='f', long="config", default_value = None)]
    pub config: Option<String>,
    /// The logging level. Case-insensitive.
    #[arg(
        value_enum,
        long = "log-level",
        ignore_case = true,
        default_value = "info"
    )]
    pub log_level: LogLevel,
    /// Loop thrashing demo mode instead of a single lookup
    #[arg(short = 'd', long = "demo", default_value_t = false)]
    pub demo: bool,
    /// Time for the demo to sleep between checks, in seconds
    #[arg(short = 's', long = "sleep", default_value_t = 0.1)]
    pub sleep: f64,
    /// Feature to test
    pub feature: String,
    /// Context attributes of the form key=val; in demo mode a value of '%' is
    /// replaced with a fresh random string on every check
    pub attrs: Vec<String>,
}
