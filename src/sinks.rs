//! Error and telemetry sinks
//!
//! User-facing error reporting and analytics are collaborators owned by the
//! session. Sink calls are best-effort and return nothing, so they cannot
//! abort the operation that triggered them.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{CoordinatorError, Disposition};
use crate::{log_error, log_info, log_warn};

const MODULE: &str = "sinks";

/// Shows errors to the user (dialog, toast, stderr...)
pub trait ErrorReporter: Send + Sync {
    fn show_error(&self, title: &str, message: &str);
}

/// Analytics events and exception reports
pub trait Telemetry: Send + Sync {
    fn log_event(&self, event: &str, data: &Value);
    fn log_exception(&self, error: &CoordinatorError);
}

/// Sink that only writes to the application log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorReporter for LogSink {
    fn show_error(&self, title: &str, message: &str) {
        log_error!(MODULE, "{}: {}", title, message);
    }
}

impl Telemetry for LogSink {
    fn log_event(&self, event: &str, data: &Value) {
        log_info!(MODULE, "event {} {}", event, data);
    }

    fn log_exception(&self, error: &CoordinatorError) {
        log_warn!(MODULE, "exception: {}", error);
    }
}

/// Reporter and telemetry pair shared by one session
#[derive(Clone)]
pub struct Sinks {
    reporter: Arc<dyn ErrorReporter>,
    telemetry: Arc<dyn Telemetry>,
}

impl Default for Sinks {
    fn default() -> Self {
        Self::new(Arc::new(LogSink), Arc::new(LogSink))
    }
}

impl Sinks {
    pub fn new(reporter: Arc<dyn ErrorReporter>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            reporter,
            telemetry,
        }
    }

    pub fn log_event(&self, event: &str, data: Value) {
        self.telemetry.log_event(event, &data);
    }

    /// Route an error according to its disposition
    pub fn report(&self, title: &str, error: &CoordinatorError) {
        match error.disposition() {
            Disposition::Surface => {
                self.reporter.show_error(title, &error.to_string());
                self.telemetry.log_exception(error);
            }
            Disposition::LogOnly => {
                log_warn!(MODULE, "{}: {}", title, error);
                self.telemetry.log_exception(error);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::recording;
    use super::*;

    #[test]
    fn test_surface_errors_reach_reporter() {
        let (sink, sinks) = recording();
        let err = CoordinatorError::MetadataExtractionFailed {
            basename: "disk.img".into(),
            message: "truncated".into(),
        };

        sinks.report("Error opening image", &err);

        let errors = sink.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "Error opening image");
        assert!(errors[0].1.contains("disk.img"));
        assert_eq!(sink.exceptions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_log_only_errors_stay_silent() {
        let (sink, sinks) = recording();

        sinks.report(
            "Firmware download",
            &CoordinatorError::DownloadFailed("HTTP 500".into()),
        );

        assert!(sink.errors.lock().unwrap().is_empty());
        assert_eq!(sink.exceptions.lock().unwrap().len(), 1);
    }
}
