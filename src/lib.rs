pub mod error;
pub mod config;
pub mod model;
pub mod store;
pub mod system_paths;
pub mod identity;
pub mod collaborators;
pub mod validation;
pub mod permissions;
pub mod service;
pub mod integrity;
pub mod expiry;
pub mod bootstrap;
pub mod server;

pub use error::{AppError, AppResult};

// Debug printing helper: writes to stderr in test/debug builds when MEMBERSHIP_DEBUG is set.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if std::env::var_os("MEMBERSHIP_DEBUG").is_some() { eprintln!($($arg)*); }
    });
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
