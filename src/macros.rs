//! Formatting macros over the sugared logger.
//!
//! These forward through [`SugaredLogger`](crate::SugaredLogger) so the
//! format string is only rendered when the record passes the level gate.
//!
//! # Examples
//!
//! ```
//! use shiplog::{infof, kv, Logger};
//!
//! let sugar = Logger::nop().sugar();
//!
//! let port = 8080;
//! infof!(sugar, "server listening on port {}", port);
//!
//! sugar.info("request done", kv!["status", 200i64, "cached", false]);
//! ```

/// Build the alternating key/value list the sugared API consumes.
#[macro_export]
macro_rules! kv {
    () => {
        ::std::vec::Vec::<$crate::SugarValue>::new()
    };
    ($($item:expr),+ $(,)?) => {
        vec![$($crate::SugarValue::from($item)),+]
    };
}

/// Log a formatted message at an arbitrary level.
#[macro_export]
macro_rules! logf {
    ($sugar:expr, $level:expr, $($arg:tt)+) => {
        $sugar.logf($level, format_args!($($arg)+))
    };
}

/// Log a formatted debug-level message.
#[macro_export]
macro_rules! debugf {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.debugf(format_args!($($arg)+))
    };
}

/// Log a formatted info-level message.
#[macro_export]
macro_rules! infof {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.infof(format_args!($($arg)+))
    };
}

/// Log a formatted warn-level message.
#[macro_export]
macro_rules! warnf {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.warnf(format_args!($($arg)+))
    };
}

/// Log a formatted error-level message.
#[macro_export]
macro_rules! errorf {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.errorf(format_args!($($arg)+))
    };
}

/// Log a formatted critical-level message.
#[macro_export]
macro_rules! criticalf {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.criticalf(format_args!($($arg)+))
    };
}

/// Log a formatted fixed-level message.
#[macro_export]
macro_rules! fixedf {
    ($sugar:expr, $($arg:tt)+) => {
        $sugar.fixedf(format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::Logger;

    #[test]
    fn test_format_macros() {
        let sugar = Logger::nop().sugar();
        debugf!(sugar, "value: {}", 42);
        infof!(sugar, "plain message");
        warnf!(sugar, "retry {} of {}", 1, 3);
        errorf!(sugar, "code: {}", 500);
        fixedf!(sugar, "service {} up", "api");
        logf!(sugar, crate::core::Level::Warn, "generic {}", "path");
    }

    #[test]
    fn test_kv_macro() {
        let pairs = kv!["k", 1i64, "ok", true];
        assert_eq!(pairs.len(), 4);
        let empty = kv![];
        assert!(empty.is_empty());
    }
}
