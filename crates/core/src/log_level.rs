//! Device-client log verbosity.
//!
//! Viewers can read and set how chattily the device link logs; the value
//! round-trips through the link so the reported level always reflects what
//! the client actually applied.

use serde::{Deserialize, Serialize};

/// Verbosity of the device link's logging, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Information,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Information => "Information",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_name_strings() {
        assert_eq!(
            serde_json::to_value(LogLevel::Information).unwrap(),
            "Information"
        );
        let parsed: LogLevel = serde_json::from_str("\"Trace\"").unwrap();
        assert_eq!(parsed, LogLevel::Trace);
    }

    #[test]
    fn default_is_information() {
        assert_eq!(LogLevel::default(), LogLevel::Information);
    }
}
