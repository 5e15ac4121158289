use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFilterLevel::Trace => f.write_str("trace"),
            LogFilterLevel::Debug => f.write_str("debug"),
            LogFilterLevel::Info => f.write_str("info"),
            LogFilterLevel::Warn => f.write_str("warn"),
            LogFilterLevel::Error => f.write_str("error"),
        }
    }
}

/// Per-crate override appended to the default directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFilter {
    pub crate_name: String,
    pub filter_level: LogFilterLevel,
}

// Underscored because the compiler rewrites hyphens in crate names.
const DEFAULT_CRATE_NAMES: &[&str] = &[
    "tessera_config",
    "tessera_error",
    "tessera_indexer",
    "tessera_tracing",
    "tessera_types",
];

pub(crate) fn global_filter_directives(custom_filters: &[LogFilter]) -> String {
    let defaults = DEFAULT_CRATE_NAMES
        .iter()
        .map(|s| format!("{s}=debug"))
        .collect::<Vec<_>>()
        .join(",");
    let custom = custom_filters
        .iter()
        .map(|custom_filter| format!("{}={}", custom_filter.crate_name, custom_filter.filter_level))
        .collect::<Vec<String>>()
        .join(",");
    if custom.is_empty() {
        format!("warn,{defaults}")
    } else {
        format!("warn,{defaults},{custom}")
    }
}

/// `RUST_LOG` replaces the computed directives entirely when set.
pub fn init_global_filter_layer(
    custom_filters: &[LogFilter],
) -> Box<dyn Layer<Registry> + Send + Sync> {
    EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| global_filter_directives(custom_filters)),
    )
    .boxed()
}

pub fn init_stdout_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer().pretty().with_target(false).boxed()
}

pub fn init_tracing(
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>,
) -> Result<(), TryInitError> {
    let Some(layers) = layers.into_iter().reduce(|a, b| Box::new(a.and_then(b))) else {
        return Ok(());
    };
    tracing_subscriber::registry().with(layers).try_init()?;
    tracing::info!("Global tracing subscriber set");
    Ok(())
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();

        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            panic.backtrace = tracing::field::display(std::backtrace::Backtrace::capture()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

/// Filter layer followed by a pretty stdout layer, plus the panic hook.
pub fn init_stdout_tracing(custom_filters: &[LogFilter]) -> Result<(), TryInitError> {
    // The global filter applies to all subsequent layers
    let layers = vec![init_global_filter_layer(custom_filters), init_stdout_layer()];
    init_tracing(layers)?;
    init_panic_tracing_hook();
    Ok(())
}
