//! Status reporting seam. Sync outcomes never depend on whether anything
//! listens; reporters are purely observational.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

pub trait Reporter: Send + Sync {
    fn report(&self, level: Level, message: &str);
}

/// Prefixed stderr lines, one per event.
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, level: Level, message: &str) {
        match level {
            Level::Info => eprintln!("[savebackup] {message}"),
            Level::Warn => eprintln!("[savebackup] warning: {message}"),
            Level::Error => eprintln!("[savebackup] error: {message}"),
        }
    }
}

pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _level: Level, _message: &str) {}
}

#[cfg(test)]
pub(crate) struct RecordingReporter {
    pub events: std::sync::Mutex<Vec<(Level, String)>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn report(&self, level: Level, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
