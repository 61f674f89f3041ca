// Category-based logging infrastructure
//
// This will be used from the render worker and the thread
// driving it, so it needs to be stateless apart from the
// level, which is read once from the environment.
use std::env;

/// The environment variable used to pick the maximum level printed.
///
/// This accepts either the name of a level ("error", "info", ...)
/// or its numeric value.
pub const LOG_LEVEL_ENV: &str = "VAPOR_LOG_LEVEL";

#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    // in order of highest priority
    critical, // Urgent and must always be displayed
    error,
    debug,     // debugging related, not verbose
    info,      // more verbose
    profiling, // profiling related timing
}

impl LogLevel {
    pub fn get_name(&self) -> &'static str {
        match self {
            LogLevel::critical => "critical",
            LogLevel::error => "error",
            LogLevel::debug => "debug",
            LogLevel::info => "info",
            LogLevel::profiling => "profiling",
        }
    }

    pub fn get_level(&self) -> u32 {
        match self {
            LogLevel::critical => 0,
            LogLevel::error => 1,
            LogLevel::debug => 2,
            LogLevel::info => 3,
            LogLevel::profiling => 4,
        }
    }

    /// Parse a level from its name or its number
    pub fn parse(name: &str) -> Option<LogLevel> {
        let level = match name.trim().to_ascii_lowercase().as_str() {
            "critical" | "0" => LogLevel::critical,
            "error" | "1" => LogLevel::error,
            "debug" | "2" => LogLevel::debug,
            "info" | "3" => LogLevel::info,
            "profiling" | "4" => LogLevel::profiling,
            _ => return None,
        };

        Some(level)
    }
}

lazy_static! {
    // Currently defaults to the debug level (2)
    static ref MAX_LOG_LEVEL: u32 = env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|name| LogLevel::parse(&name))
        .unwrap_or(LogLevel::debug)
        .get_level();
}

/// The highest level that will be printed
pub fn max_level() -> u32 {
    *MAX_LOG_LEVEL
}

#[macro_export]
macro_rules! log_internal {
    ($loglevel:expr, $($format_args:tt)+) => ({
        let level = $loglevel;
        if level.get_level() <= $crate::logging::max_level() {
            println!("[{:?}]<{}> {}:{} - {}",
                     $crate::timing::get_current_millis(),
                     level.get_name(),
                     file!(),
                     line!(),
                     format!($($format_args)+)
            );
        }
    })
}

#[macro_export]
macro_rules! critical {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::critical, $($format_args)+)
    })
}

#[macro_export]
macro_rules! error {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::error, $($format_args)+)
    })
}

#[macro_export]
macro_rules! debug {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::debug, $($format_args)+)
    })
}

#[macro_export]
macro_rules! info {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::info, $($format_args)+)
    })
}

#[macro_export]
macro_rules! profiling {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::profiling, $($format_args)+)
    })
}

#[cfg(test)]
mod tests {
    use super::LogLevel;

    #[test]
    fn parse_names_and_numbers() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::error));
        assert_eq!(LogLevel::parse(" Info "), Some(LogLevel::info));
        assert_eq!(LogLevel::parse("4"), Some(LogLevel::profiling));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::critical.get_level() < LogLevel::error.get_level());
        assert!(LogLevel::debug.get_level() < LogLevel::profiling.get_level());
    }
}
