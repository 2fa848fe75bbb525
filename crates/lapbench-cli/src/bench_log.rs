use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};

/// What the third field of a log line holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Wall-clock milliseconds spent solving
    Elapsed(u128),
    /// Label of the failure that left the instance unsolved
    Unsolved(&'static str),
}

impl Timing {
    pub fn elapsed(duration: Duration) -> Self {
        Timing::Elapsed(duration.as_millis())
    }
}

/// One line of the benchmark log: `<time>;<date>;<elapsed ms>;<problem size>`
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub timing: Timing,
    /// Number of assignment variables (workers * tasks)
    pub problem_size: usize,
}

impl LogRecord {
    pub fn now(timing: Timing, problem_size: usize) -> Self {
        Self {
            timestamp: Local::now(),
            timing,
            problem_size,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};",
            self.timestamp.format("%H:%M:%S"),
            self.timestamp.format("%Y-%m-%d")
        )?;
        match self.timing {
            Timing::Elapsed(ms) => write!(f, "{}", ms)?,
            Timing::Unsolved(label) => f.write_str(label)?,
        }
        write!(f, ";{}", self.problem_size)
    }
}

/// Append-only benchmark log. The file is reopened for every record so an
/// interrupted run keeps everything written before it.
#[derive(Debug, Clone)]
pub struct BenchLog {
    path: PathBuf,
}

impl BenchLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &LogRecord) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", record)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_record_format() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 31).unwrap();
        let solved = LogRecord {
            timestamp,
            timing: Timing::elapsed(Duration::from_micros(12_900)),
            problem_size: 25,
        };
        assert_eq!(solved.to_string(), "07:05:31;2024-03-09;12;25");

        let failed = LogRecord {
            timestamp,
            timing: Timing::Unsolved("infeasible"),
            problem_size: 36,
        };
        assert_eq!(failed.to_string(), "07:05:31;2024-03-09;infeasible;36");
    }

    #[test]
    fn test_append_keeps_previous_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = BenchLog::new(&path);

        log.append(&LogRecord::now(Timing::Elapsed(3), 25)).unwrap();
        log.append(&LogRecord::now(Timing::Elapsed(4), 36)).unwrap();
        // a second writer on the same file, as after a restart
        BenchLog::new(&path)
            .append(&LogRecord::now(Timing::Unsolved("error"), 49))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(";3;25"));
        assert!(lines[1].ends_with(";4;36"));
        assert!(lines[2].ends_with(";error;49"));
        assert!(lines.iter().all(|l| l.split(';').count() == 4));
    }
}
