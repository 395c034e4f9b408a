/// Name prefixed to every user-visible status message.
pub const APP_NAME: &str = "tether";

/// The one textual channel every outcome is surfaced through: success
/// counts, "no tasks found", and every caught failure.
pub trait Reporter {
    fn info(&self, text: &str);
}

pub fn prefixed(text: &str) -> String {
    format!("{}: {}", APP_NAME, text)
}

/// Default reporter: echoes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&self, text: &str) {
        log::info!("{}", prefixed(text));
    }
}

/// Captures messages in memory. Clones share the same buffer, so a test can
/// keep one handle and hand another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    messages: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, text: &str) {
        self.messages.lock().unwrap().push(prefixed(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reporter_shares_buffer_across_clones() {
        let reporter = MemoryReporter::new();
        let handle = reporter.clone();
        reporter.info("No tasks found.");
        assert_eq!(handle.messages(), vec!["tether: No tasks found."]);
    }
}
