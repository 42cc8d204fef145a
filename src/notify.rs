//! Operator notifications.
//!
//! Fire-and-forget: no acknowledgment, and a failing sink never disturbs the
//! monitoring loop.

/// Notification sink consumed by the monitoring loop.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Terminal notifier: prints a banner to stderr and mirrors it to the log.
pub struct TerminalNotifier;

impl NotificationSink for TerminalNotifier {
    fn notify(&self, title: &str, message: &str) {
        eprintln!("\n--- {} ---\n{}\n", title.to_uppercase(), message);
        log::info!("notify: {title}: {message}");
    }
}

/// Collecting sink for tests.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((title.to_string(), message.to_string()));
        }
    }
}
