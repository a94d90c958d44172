// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the binary.
///
/// `RUST_LOG` wins over `default_level`. `LOG_FORMAT=json` switches to JSON lines,
/// anything else gives the compact human format.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
