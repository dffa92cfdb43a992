// crates/shard-schema-core/src/runtime/throttle.rs
// ============================================================================
// Module: Throttle Monitor
// Description: Derives the per-tick concurrency ceiling from an external signal.
// Purpose: Let operators lower or raise in-flight work without a restart.
// Dependencies: crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! The monitor reads the signal once per dispatch tick. A missing signal, an
//! unreadable signal, or a first line that is not an integer all keep the
//! previous ceiling. A parsed value is clamped into `0 ..= max_workers`.
//! At most [`MAX_THROTTLE_LINE_BYTES`] bytes of the file are read.
//! The monitor never writes the signal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::interfaces::ThrottleSignal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum bytes read from the throttle file per refresh.
pub const MAX_THROTTLE_LINE_BYTES: u64 = 64;

// ============================================================================
// SECTION: File Signal
// ============================================================================

/// Throttle signal backed by a file whose first line is an integer.
#[derive(Debug, Clone)]
pub struct FileThrottleSignal {
    /// Path of the throttle file.
    path: PathBuf,
}

impl FileThrottleSignal {
    /// Creates a signal reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ThrottleSignal for FileThrottleSignal {
    fn read_first_line(&self) -> io::Result<Option<String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut line = String::new();
        BufReader::new(file.take(MAX_THROTTLE_LINE_BYTES)).read_line(&mut line)?;
        Ok(Some(line))
    }
}

// ============================================================================
// SECTION: Monitor
// ============================================================================

/// Tracks the effective concurrency ceiling.
///
/// # Invariants
/// - `ceiling <= max_workers` at all times.
/// - The initial ceiling is `max_workers`.
pub struct ThrottleMonitor {
    /// Hard maximum, fixed for the process lifetime.
    max_workers: usize,
    /// Ceiling in effect after the last refresh.
    ceiling: usize,
    /// External signal source.
    signal: Box<dyn ThrottleSignal>,
}

impl ThrottleMonitor {
    /// Creates a monitor starting at the hard maximum.
    #[must_use]
    pub fn new(max_workers: usize, signal: Box<dyn ThrottleSignal>) -> Self {
        Self {
            max_workers,
            ceiling: max_workers,
            signal,
        }
    }

    /// Returns the hard maximum.
    #[must_use]
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Returns the ceiling in effect after the last refresh.
    #[must_use]
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Re-reads the signal and returns the ceiling for this tick.
    pub fn refresh(&mut self) -> usize {
        let line = match self.signal.read_first_line() {
            Ok(Some(line)) => line,
            Ok(None) => return self.ceiling,
            Err(err) => {
                warn!(error = %err, ceiling = self.ceiling, "throttle signal unreadable; keeping ceiling");
                return self.ceiling;
            }
        };
        let Some(requested) = parse_limit(&line) else {
            warn!(
                value = line.trim(),
                ceiling = self.ceiling,
                "throttle signal is not an integer; keeping ceiling"
            );
            return self.ceiling;
        };
        let ceiling = clamp_limit(requested, self.max_workers);
        if usize::try_from(requested).ok() != Some(ceiling) {
            debug!(requested, ceiling, max_workers = self.max_workers, "throttle value clamped");
        }
        if ceiling != self.ceiling {
            info!(previous = self.ceiling, ceiling, "throttle ceiling changed");
        }
        self.ceiling = ceiling;
        ceiling
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the first line of the signal as a signed integer.
#[must_use]
pub fn parse_limit(line: &str) -> Option<i64> {
    line.trim().parse::<i64>().ok()
}

/// Clamps a requested limit into `0 ..= max_workers`.
#[must_use]
pub fn clamp_limit(requested: i64, max_workers: usize) -> usize {
    if requested <= 0 {
        return 0;
    }
    usize::try_from(requested).map_or(max_workers, |value| value.min(max_workers))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
