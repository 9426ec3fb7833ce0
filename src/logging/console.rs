//! Console Output Module

use std::io::Write;

use async_trait::async_trait;
use chrono::SecondsFormat;

use crate::error::LogResult;
use crate::logging::level::ANSI_RESET;
use crate::logging::{LogEntry, LogOutput};

// == Console Output ==
/// Writes human-readable lines: DEBUG/INFO to stdout, WARN and above to
/// stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutput {
    colorize: bool,
}

impl ConsoleOutput {
    pub fn new(colorize: bool) -> Self {
        Self { colorize }
    }
}

/// Formats `timestamp LEVEL [source] message context-json`, optionally
/// wrapped in the level's ANSI colour.
pub fn format_entry(entry: &LogEntry, colorize: bool) -> String {
    let mut line = format!(
        "{} {}",
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.level
    );

    if let Some(source) = &entry.source {
        line.push_str(&format!(" [{}]", source));
    }

    line.push(' ');
    line.push_str(&entry.message);

    if let Some(context) = entry.context.as_ref().filter(|c| !c.is_empty()) {
        if let Ok(json) = serde_json::to_string(context) {
            line.push(' ');
            line.push_str(&json);
        }
    }

    if let Some(stack) = &entry.stack_trace {
        line.push('\n');
        line.push_str(stack);
    }

    if colorize {
        format!("{}{}{}", entry.level.ansi_color(), line, ANSI_RESET)
    } else {
        line
    }
}

#[async_trait]
impl LogOutput for ConsoleOutput {
    fn name(&self) -> &str {
        "console"
    }

    async fn write(&self, entry: &LogEntry) -> LogResult<()> {
        let line = format_entry(entry, self.colorize);
        if entry.level.is_error_stream() {
            writeln!(std::io::stderr().lock(), "{}", line)?;
        } else {
            writeln!(std::io::stdout().lock(), "{}", line)?;
        }
        Ok(())
    }

    async fn flush(&self) -> LogResult<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{log_context, LogLevel};
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_entry() -> LogEntry {
        let mut entry = LogEntry::new(LogLevel::Warn, "cache nearly full");
        entry.timestamp = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        entry
    }

    #[test]
    fn test_format_plain() {
        let mut entry = fixed_entry();
        entry.source = Some("tools".to_string());
        entry.context = log_context(json!({"usage": 97}));

        assert_eq!(
            format_entry(&entry, false),
            "2024-05-01T12:30:00.000Z WARN [tools] cache nearly full {\"usage\":97}"
        );
    }

    #[test]
    fn test_format_without_source_or_context() {
        assert_eq!(
            format_entry(&fixed_entry(), false),
            "2024-05-01T12:30:00.000Z WARN cache nearly full"
        );
    }

    #[test]
    fn test_format_colorized_wraps_line() {
        let line = format_entry(&fixed_entry(), true);
        assert!(line.starts_with("\x1b[33m"));
        assert!(line.ends_with(ANSI_RESET));
        assert!(line.contains("cache nearly full"));
    }

    #[tokio::test]
    async fn test_console_write_succeeds() {
        let output = ConsoleOutput::new(false);
        assert!(output.write(&fixed_entry()).await.is_ok());
        assert!(output.flush().await.is_ok());
    }
}
