//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Results go to stdout and respect the quiet flag. Warnings and errors go
//! to stderr so that stdout stays usable in pipelines.

use std::fmt::Display;
use std::io::Write;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Write the row-level messages of a finished task.
///
/// Prints `Errors:` followed by one message per line. Nothing is written
/// for an empty list.
pub fn write_task_errors<W, I, S>(out: &mut W, messages: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: Display,
{
    let mut messages = messages.into_iter().peekable();
    if messages.peek().is_none() {
        return Ok(());
    }
    writeln!(out, "Errors:")?;
    for message in messages {
        writeln!(out, "  {}", message)?;
    }
    Ok(())
}

/// Format a byte count into IEC units (KiB, MiB, GiB, TiB) with trimmed precision.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{} {}", bytes, UNITS[0]);
    }

    let mut text = if value >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    };
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    format!("{} {}", text, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn task_errors_listed_under_heading() {
        let mut out = Vec::new();
        write_task_errors(&mut out, ["row 3 invalid", "row 9 missing sku"]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Errors:\n  row 3 invalid\n  row 9 missing sku\n"
        );
    }

    #[test]
    fn no_task_errors_no_output() {
        let mut out = Vec::new();
        write_task_errors(&mut out, Vec::<String>::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1000), "1000 B");
        assert_eq!(format_bytes(1024), "1 KiB");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(10 * 1024), "10 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 512 * 1024), "5.5 MiB");
    }
}
