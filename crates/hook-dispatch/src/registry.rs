//! Hook registry: one ordered handler table per event type.
//!
//! Entries keep registration order; selection filters that order and never
//! reorders it. Names are unique within an event type.

use std::collections::BTreeMap;
use std::sync::Arc;

use hook_types::{Event, EventType};

use crate::error::DispatchError;
use crate::handler::Handler;
use crate::matcher::Matcher;

/// A registered handler with its matcher.
pub struct RegistryEntry {
    name: String,
    matcher: Matcher,
    handler: Arc<dyn Handler>,
}

impl RegistryEntry {
    /// Handler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Matcher the entry was registered with.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The handler.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

/// Static table of handlers, built once at process start.
#[derive(Default)]
pub struct HookRegistry {
    tables: BTreeMap<EventType, Vec<RegistryEntry>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the table of `event_type`.
    pub fn register(
        &mut self,
        event_type: EventType,
        matcher: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), DispatchError> {
        let name = handler.name().trim().to_string();
        if name.is_empty() {
            return Err(DispatchError::EmptyName);
        }

        let table = self.tables.entry(event_type).or_default();
        if table.iter().any(|e| e.name == name) {
            return Err(DispatchError::DuplicateHandler { event_type, name });
        }

        table.push(RegistryEntry {
            name,
            matcher: Matcher::new(matcher),
            handler,
        });
        Ok(())
    }

    /// Entries that apply to `event`, in registration order.
    pub fn select(&self, event: &Event) -> Vec<&RegistryEntry> {
        self.tables
            .get(&event.event_type)
            .map(|table| table.iter().filter(|e| e.matcher.matches(event)).collect())
            .unwrap_or_default()
    }

    /// Handler names registered for `event_type`, in order.
    pub fn names(&self, event_type: EventType) -> Vec<&str> {
        self.tables
            .get(&event_type)
            .map(|table| table.iter().map(|e| e.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Total number of entries across all event types.
    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use hook_types::Decision;
    use serde_json::json;

    fn noop(name: &str) -> Arc<dyn Handler> {
        handler_fn(name, |_, _| Ok(Decision::allow()))
    }

    #[test]
    fn test_register_and_select_in_order() {
        let mut registry = HookRegistry::new();
        registry.register(EventType::PreToolUse, "*", noop("a")).unwrap();
        registry.register(EventType::PreToolUse, "Read", noop("b")).unwrap();
        registry.register(EventType::PreToolUse, "Bash", noop("c")).unwrap();
        registry.register(EventType::PostToolUse, "*", noop("d")).unwrap();

        let event = Event::new(EventType::PreToolUse, "s").with_tool("Bash", json!({}));
        let names: Vec<_> = registry.select(&event).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_duplicate_name_rejected_per_event_type() {
        let mut registry = HookRegistry::new();
        registry.register(EventType::PreToolUse, "*", noop("x")).unwrap();

        let err = registry
            .register(EventType::PreToolUse, "Bash", noop("x"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateHandler { .. }));

        // Same name under another event type is fine.
        registry.register(EventType::PostToolUse, "*", noop("x")).unwrap();
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = HookRegistry::new();
        assert!(matches!(
            registry.register(EventType::Stop, "*", noop("  ")),
            Err(DispatchError::EmptyName)
        ));
    }

    #[test]
    fn test_select_unregistered_event_type() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.select(&Event::new(EventType::Stop, "s")).is_empty());
        assert!(registry.names(EventType::Stop).is_empty());
    }
}
