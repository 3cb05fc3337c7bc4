//! Engine notifications
//!
//! The engine publishes everything an observer (console, editor, JSON
//! stream) needs to follow a run: state changes, output messages,
//! breakpoints and completion. Observers only receive shared references.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::state::{Register, Vector};

/// Output message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Event published by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    RegisterChanged { register: Register, value: u32 },
    MemoryChanged { address: usize, value: f64 },
    VectorChanged { index: usize, lanes: Vector },
    /// Human-readable message; `line` is 1-based when present
    Output {
        text: String,
        severity: Severity,
        line: Option<usize>,
    },
    /// Paused before executing `line` (1-based)
    BreakpointHit { line: usize },
    /// Program ran to its end
    Completed { executed: u64 },
    /// Instruction failed at `line` (1-based)
    Error { message: String, line: usize },
}

impl Event {
    pub fn info(text: impl Into<String>) -> Self {
        Self::output(text, Severity::Info, None)
    }

    pub fn output(text: impl Into<String>, severity: Severity, line: Option<usize>) -> Self {
        Self::Output {
            text: text.into(),
            severity,
            line,
        }
    }
}

/// Event callback
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Event filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    /// Any register change (flags included)
    Registers,
    /// Changes of one register
    Register(Register),
    Memory,
    Vectors,
    /// Every output message
    Output,
    /// Output messages of one severity
    Severity(Severity),
    Breakpoints,
    /// Completion and errors
    Lifecycle,
}

impl EventFilter {
    /// Checks whether an event passes the filter
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Self::All, _) => true,
            (Self::Registers, Event::RegisterChanged { .. }) => true,
            (Self::Register(reg), Event::RegisterChanged { register, .. }) => reg == register,
            (Self::Memory, Event::MemoryChanged { .. }) => true,
            (Self::Vectors, Event::VectorChanged { .. }) => true,
            (Self::Output, Event::Output { .. }) => true,
            (Self::Severity(wanted), Event::Output { severity, .. }) => wanted == severity,
            (Self::Breakpoints, Event::BreakpointHit { .. }) => true,
            (Self::Lifecycle, Event::Completed { .. } | Event::Error { .. }) => true,
            _ => false,
        }
    }
}

/// Event bus with a bounded history
///
/// Clones share handlers and history, so a host can keep a handle while the
/// engine owns another.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<(EventFilter, EventHandler)>>>,
    history: Arc<Mutex<VecDeque<Event>>>,
    max_history: usize,
}

/// A panicking handler cannot leave the lists half-updated
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history(super::config::event_history())
    }

    /// `max_history == 0` disables the history
    pub fn with_history(max_history: usize) -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Vec::new())),
            history: Arc::new(Mutex::new(VecDeque::with_capacity(max_history.min(1024)))),
            max_history,
        }
    }

    /// Registers a handler for a filter
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        lock(&self.handlers).push((filter, Arc::new(handler)));
    }

    /// Removes every handler registered for `filter`
    pub fn unsubscribe(&self, filter: &EventFilter) {
        lock(&self.handlers).retain(|(f, _)| f != filter);
    }

    /// Records the event and runs matching handlers in subscription order
    pub fn emit(&self, event: Event) {
        if self.max_history > 0 {
            let mut history = lock(&self.history);
            if history.len() == self.max_history {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let handlers: Vec<EventHandler> = lock(&self.handlers)
            .iter()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }

    /// Oldest first
    pub fn history(&self) -> Vec<Event> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("max_history", &self.max_history)
            .field("history_len", &lock(&self.history).len())
            .field("handlers", &lock(&self.handlers).len())
            .finish()
    }
}
