//! Tagging progress reporting.
//!
//! Reports observable progress during `kwtag tag` so users see how much of
//! the corpus has been classified. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for a tagging run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagProgressEvent {
    /// Loading the dictionary and corpus.
    Loading { client: String },
    /// `n` keywords classified out of `total`.
    Classifying { client: String, n: u64, total: u64 },
}

/// Reports tagging progress. Implementations write to stderr (human or JSON).
pub trait TagProgressReporter: Send + Sync {
    fn report(&self, event: TagProgressEvent);
}

/// Human-friendly progress on stderr: "tag acme  classifying  1,234 / 5,000 keywords".
pub struct StderrProgress;

impl TagProgressReporter for StderrProgress {
    fn report(&self, event: TagProgressEvent) {
        let line = match &event {
            TagProgressEvent::Loading { client } => format!("tag {}  loading...\n", client),
            TagProgressEvent::Classifying { client, n, total } => format!(
                "tag {}  classifying  {} / {} keywords\n",
                client,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &TagProgressEvent) -> serde_json::Value {
        match event {
            TagProgressEvent::Loading { client } => serde_json::json!({
                "event": "progress",
                "client": client,
                "phase": "loading"
            }),
            TagProgressEvent::Classifying { client, n, total } => serde_json::json!({
                "event": "progress",
                "client": client,
                "phase": "classifying",
                "n": n,
                "total": total
            }),
        }
    }
}

impl TagProgressReporter for JsonProgress {
    fn report(&self, event: TagProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl TagProgressReporter for NoProgress {
    fn report(&self, _event: TagProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn TagProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}': use off, human, or json",
                other
            )),
        }
    }
}
