//! Parsing of the editor's `#run_info` status line
//!
//! After a run the editor shows `Run in 123ms (OK)`, or
//! `Run in <time> (<ErrorName>: <message>!)` when the code raised.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RUN_INFO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^Run in (?P<time>.*?) \((?P<status>.*)\)\s*$").expect("valid run info regex")
});

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>ms|sec\.?|s|min\.?)$")
        .expect("valid duration regex")
});

/// A parsed `#run_info` text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub raw: String,
    pub duration_ms: Option<f64>,
    pub ok: bool,
    /// `Name: message` of the raised error
    pub error: Option<String>,
}

impl RunInfo {
    /// Parse the status text. Text that is not a finished-run line (e.g.
    /// `start vm...`) parses as not ok, without duration.
    pub fn parse(text: &str) -> Self {
        let raw = text.trim().to_string();
        let Some(caps) = RUN_INFO_RE.captures(&raw) else {
            return Self {
                raw: raw.clone(),
                duration_ms: None,
                ok: false,
                error: None,
            };
        };

        let duration_ms = parse_duration_ms(&caps["time"]);
        let status = caps["status"].to_string();
        let (ok, error) = if status == "OK" {
            (true, None)
        } else {
            (false, Some(status.trim_end_matches('!').to_string()))
        };

        Self {
            raw: raw.clone(),
            duration_ms,
            ok,
            error,
        }
    }

    /// The check applied after every editor run: `OK` present, no `Error`
    pub fn check_ok(&self) -> Result<(), String> {
        if !self.raw.contains("OK") {
            return Err(format!("{:?} doesn't contain \"OK\"", self.raw));
        }
        if self.raw.contains("Error") {
            return Err(format!("{:?} contains \"Error\"", self.raw));
        }
        Ok(())
    }
}

fn parse_duration_ms(time: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(time.trim())?;
    let value: f64 = caps["value"].parse().ok()?;
    let factor = match caps["unit"].trim_end_matches('.') {
        "ms" => 1.0,
        "s" | "sec" => 1_000.0,
        "min" => 60_000.0,
        _ => return None,
    };
    Some(value * factor)
}
