//! # Timed script interpreter
//!
//! Scripts are plain text files of `<time_s>: <json>;` entries, one per line.
//! Each payload is deserialised into the interpreter's record type, which lets
//! the same interpreter replay driver inputs, vehicle states or anything else
//! that can be expressed as JSON.
//!
//! ```text
//! 0.0: {"v_ego_ms": 0.0};
//! 1.5: {"v_ego_ms": 2.5};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::Path;
use std::fs;
use regex::RegexBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A record which is scripted to occur at a specific time.
#[derive(Debug, Clone)]
pub struct Command<T> {
    /// The time the record becomes due
    pub exec_time_s: f64,

    /// The scripted record
    pub record: T
}

/// A script interpreter.
///
/// After loading a script use `.get_pending` with the current time to acquire
/// the records which have become due.
#[derive(Debug)]
pub struct ScriptInterpreter<T> {
    cmds: VecDeque<Command<T>>,
    duration_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script timestamps must not decrease, found {1} s after {0} s")]
    OutOfOrder(f64, f64),

    #[error("Script contains an invalid record at {0} s: {1}")]
    InvalidRecord(f64, serde_json::Error)
}

/// Records which are due for processing.
#[derive(Debug, PartialEq)]
pub enum Pending<T> {
    None,
    Some(Vec<T>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: DeserializeOwned> ScriptInterpreter<T> {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = script_path.as_ref();

        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.display().to_string()));
        }

        let script = fs::read_to_string(path)
            .map_err(ScriptError::ScriptLoadError)?;

        Self::from_str(&script)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        let mut queue: VecDeque<Command<T>> = VecDeque::new();

        // The pattern is a literal so building it cannot fail, but an error
        // still gets reported as an empty script rather than a panic.
        let re = match RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
        {
            Ok(r) => r,
            Err(_) => return Err(ScriptError::ScriptEmpty)
        };

        let mut last_time_s = 0f64;

        for cap in re.captures_iter(script) {
            let (time_str, payload) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(p)) => (t.as_str(), p.as_str()),
                _ => continue
            };

            let exec_time_s: f64 = time_str.parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if exec_time_s < last_time_s {
                return Err(ScriptError::OutOfOrder(last_time_s, exec_time_s));
            }
            last_time_s = exec_time_s;

            let record = serde_json::from_str(payload)
                .map_err(|e| ScriptError::InvalidRecord(exec_time_s, e))?;

            queue.push_back(Command {
                exec_time_s,
                record
            });
        }

        if queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            cmds: queue,
            duration_s: last_time_s
        })
    }
}

impl<T> ScriptInterpreter<T> {
    /// Return the records due at or before `current_time_s`.
    pub fn get_pending(&mut self, current_time_s: f64) -> Pending<T> {

        if self.cmds.is_empty() {
            return Pending::EndOfScript
        }

        let mut due: Vec<T> = vec![];

        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s > current_time_s {
                break;
            }
            if let Some(cmd) = self.cmds.pop_front() {
                due.push(cmd.record);
            }
        }

        if due.is_empty() {
            Pending::None
        }
        else {
            Pending::Some(due)
        }
    }

    /// Get the number of records remaining in the script
    pub fn get_num_pending(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        self.duration_s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Speed {
        v: f64
    }

    #[test]
    fn test_pending_records() {
        let script = "\
            0.0: {\"v\": 1.0};\n\
            0.5: {\"v\": 2.0};\n\
            0.5: {\"v\": 3.0};\n\
            2.0: {\"v\": 4.0};\n";

        let mut si: ScriptInterpreter<Speed> = ScriptInterpreter::from_str(script)
            .unwrap();

        assert_eq!(si.get_num_pending(), 4);
        assert_eq!(si.get_duration(), 2.0);

        assert_eq!(si.get_pending(0.0), Pending::Some(vec![Speed { v: 1.0 }]));
        assert_eq!(si.get_pending(0.2), Pending::None);
        assert_eq!(
            si.get_pending(1.0),
            Pending::Some(vec![Speed { v: 2.0 }, Speed { v: 3.0 }])
        );
        assert_eq!(si.get_pending(5.0), Pending::Some(vec![Speed { v: 4.0 }]));
        assert_eq!(si.get_pending(6.0), Pending::EndOfScript);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::<Speed>::from_str("nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::<Speed>::from_str("1.0: {\"v\": 1.0};\n0.5: {\"v\": 1.0};"),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::<Speed>::from_str("1.0: {\"speed\": 1.0};"),
            Err(ScriptError::InvalidRecord(_, _))
        ));
    }
}
