//! Sinks for the versioning event stream

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use crate::models::{LogStatus, VersioningLoggerItem};

/// Append-only receiver of versioning events
///
/// Shared between a universe and all of its projects, hence `&self`.
pub trait VersioningLogger: Send + Sync {
    fn add_item(&self, item: VersioningLoggerItem);
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryLogger {
    items: Mutex<Vec<VersioningLoggerItem>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning the logger ready to share
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of all events recorded so far
    pub fn items(&self) -> Vec<VersioningLoggerItem> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded events with the given status
    pub fn count(&self, status: LogStatus) -> usize {
        self.lock().iter().filter(|i| i.status == status).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic elsewhere while holding the lock must not cost us events
    fn lock(&self) -> MutexGuard<'_, Vec<VersioningLoggerItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VersioningLogger for MemoryLogger {
    fn add_item(&self, item: VersioningLoggerItem) {
        self.lock().push(item);
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl VersioningLogger for TracingLogger {
    fn add_item(&self, item: VersioningLoggerItem) {
        let old = item.old_version.as_ref().map(ToString::to_string);
        let new = item.new_version.as_ref().map(ToString::to_string);
        match item.status {
            LogStatus::Success => info!(
                project = %item.project,
                origin = ?item.original_project,
                old = ?old,
                new = ?new,
                "{}",
                item.message
            ),
            LogStatus::Warning => warn!(project = %item.project, "{}", item.message),
            LogStatus::Error => error!(project = %item.project, "{}", item.message),
        }
    }
}

/// Sends every event to each wrapped logger
#[derive(Default)]
pub struct FanOutLogger {
    sinks: Vec<Arc<dyn VersioningLogger>>,
}

impl FanOutLogger {
    pub fn new(sinks: Vec<Arc<dyn VersioningLogger>>) -> Self {
        Self { sinks }
    }
}

impl VersioningLogger for FanOutLogger {
    fn add_item(&self, item: VersioningLoggerItem) {
        for sink in &self.sinks {
            sink.add_item(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: LogStatus) -> VersioningLoggerItem {
        VersioningLoggerItem::new("app", "/work/app", status).append_to_message("pom.xml: project/version = 1.0.0")
    }

    #[test]
    fn test_memory_logger_keeps_order() {
        let logger = MemoryLogger::new();
        logger.add_item(item(LogStatus::Success));
        logger.add_item(item(LogStatus::Warning));

        let items = logger.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].status, LogStatus::Success);
        assert_eq!(items[1].status, LogStatus::Warning);
        assert_eq!(logger.count(LogStatus::Warning), 1);

        logger.clear();
        assert!(logger.is_empty());
    }

    #[test]
    fn test_memory_logger_survives_poisoned_lock() {
        let logger = MemoryLogger::shared();
        logger.add_item(item(LogStatus::Success));

        let holder = logger.clone();
        let result = std::thread::spawn(move || {
            let _guard = holder.items.lock().unwrap();
            panic!("sink holder failed");
        })
        .join();
        assert!(result.is_err());
        assert!(logger.items.is_poisoned());

        logger.add_item(item(LogStatus::Warning));
        assert_eq!(logger.len(), 2);
        assert_eq!(logger.count(LogStatus::Warning), 1);
        assert_eq!(logger.items()[1].status, LogStatus::Warning);
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let first = MemoryLogger::shared();
        let second = MemoryLogger::shared();
        let sinks: Vec<Arc<dyn VersioningLogger>> =
            vec![first.clone(), second.clone(), Arc::new(TracingLogger)];
        let fan_out = FanOutLogger::new(sinks);

        fan_out.add_item(item(LogStatus::Error));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_items_serialize_to_json() {
        let entry = item(LogStatus::Success);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "Success");
        assert_eq!(json["project"], "app");
    }
}
