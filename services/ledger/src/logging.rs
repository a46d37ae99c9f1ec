//! Standardized emoji logging for ledger and attack-run output
//!
//! Keeps commit/abort/flash lines recognisable when several scenarios run
//! back to back in one log.

/// Standard emoji set for ledger logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Unit committed
    pub const ERROR: &'static str = "❌"; // Unit aborted
    pub const WARNING: &'static str = "⚠️"; // Invariant broken

    // Ledger activity
    pub const EXECUTE: &'static str = "⚡"; // Flash loan lent / settled
    pub const MONEY: &'static str = "💰"; // Balance movement worth reporting
    pub const POOL: &'static str = "🏊"; // Pool reserves moved
    pub const CLOCK: &'static str = "⏱️"; // Ledger time advanced
}

#[macro_export]
macro_rules! log_commit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_abort {
    ($($arg:tt)*) => {
        tracing::warn!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_flash {
    ($($arg:tt)*) => {
        tracing::debug!("{} {}", $crate::logging::LogEmoji::EXECUTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_profit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::MONEY, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_invariant {
    ($($arg:tt)*) => {
        tracing::warn!("{} {}", $crate::logging::LogEmoji::WARNING, format!($($arg)*))
    };
}
