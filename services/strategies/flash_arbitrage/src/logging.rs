//! Standardized emoji logging for flash arbitrage modules
//!
//! Provides consistent emoji usage across all flash arbitrage components
//! and the subscriber setup used by the binary.

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Standard emoji set for flash arbitrage logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅";
    pub const ERROR: &'static str = "❌";
    pub const WARNING: &'static str = "⚠️";

    // Module-specific
    pub const SEARCH: &'static str = "🔍"; // Route search / decoding
    pub const CHART: &'static str = "📊"; // Reports and counters
    pub const EXECUTE: &'static str = "⚡"; // Pipeline stages
    pub const MONEY: &'static str = "💰"; // Profit
    pub const NETWORK: &'static str = "🌐";
    pub const GAS: &'static str = "⛽";
    pub const MEMPOOL: &'static str = "🔄"; // Pending swaps
}

// Convenience macros for standardized logging
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_search {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SEARCH, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_metrics {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::CHART, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_execution {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::EXECUTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_profit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::MONEY, format!($($arg)*))
    };
}

/// Module overrides applied when the level is a bare level name
const QUIET_MODULES: &str = "h2=info,hyper=info,reqwest=info,tokio_tungstenite=info,tungstenite=info";

/// Expand a bare level (`debug`) with quiet overrides for chatty transport
/// crates; full directive strings are used as given
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains(',') || level.contains('=') {
        level.to_string()
    } else {
        format!("{},{}", level, QUIET_MODULES)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::from_str(&filter_directives(level))
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).compact())
            .try_init()?;
    }
    Ok(())
}
