//! Event logging for the structuring pipeline.
//!
//! Every method decompilation owns one [`EventLog`]. Stages and passes append to it while they
//! run, and the log travels back to the caller inside the decompiled result. Events can be
//! inspected for debugging or safely ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (transformation, warning, info)
//! - [`EventLog`] - Append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent builder that records its event when dropped
//!
//! The log is backed by [`boxcar::Vec`], so recording only needs `&self` and the log is `Sync`.
//!
//! # Example
//!
//! ```rust
//! use jvmscope::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::LoopIdentified)
//!     .at("sum", 12)
//!     .message("while loop at statement 12");
//! log.warn("overlapping exception ranges extended");
//!
//! assert_eq!(log.len(), 2);
//! assert!(log.has(EventKind::LoopIdentified));
//! println!("{}", log.summary());
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// The kind of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Transformations
    /// A raw table or lookup switch became a structured switch header.
    SwitchReplaced,
    /// A jump to the next live statement became a no-op.
    JumpRemoved,
    /// A jump to an unconditional jump was retargeted to the final destination.
    JumpThreaded,
    /// A trivial join marker was resolved.
    JoinResolved,
    /// A single-use stack value was substituted into its use.
    AssignmentCondensed,
    /// A `new`/`dup`/`<init>` sequence became a construction expression.
    ConstructorCondensed,
    /// An assignment was embedded into the test that reads it.
    AssignmentCollapsed,
    /// Two chained tests were merged into a short-circuit condition.
    ConditionalCondensed,
    /// A condition was simplified.
    ConditionalSimplified,
    /// A negative jump pair was inverted.
    JumpInverted,
    /// A back jump from a try block to its handler was removed.
    BackEdgeRemoved,
    /// A loop was identified.
    LoopIdentified,
    /// A raw jump became a break or continue.
    BreakRewritten,
    /// A while loop became a for loop.
    ForLoopCreated,
    /// A catch body was identified.
    CatchIdentified,
    /// A redundant synchronized catch-all handler was removed.
    ExceptionPruned,
    /// A forward test became an if or if/else block.
    ConditionalIdentified,
    /// A no-op was unlinked from the statement list.
    NopRemoved,
    /// An array or iterator for-each idiom was recognised.
    IterationRecognised,
    /// A monitor pair became a synchronized block.
    SynchronizedIdentified,

    // Engine
    /// A pass is about to run.
    PassStarted,
    /// A pass has finished.
    PassCompleted,
    /// A method entered the pipeline.
    MethodProcessingStarted,
    /// A method left the pipeline.
    MethodProcessingCompleted,

    // Diagnostic
    /// Informational message.
    Info,
    /// Warning about a heuristic or suspicious input.
    Warning,
    /// A recoverable error.
    Error,
}

impl EventKind {
    /// Returns a short human-readable description of this kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::SwitchReplaced => "switch replaced",
            Self::JumpRemoved => "jump removed",
            Self::JumpThreaded => "jump threaded",
            Self::JoinResolved => "join resolved",
            Self::AssignmentCondensed => "assignment condensed",
            Self::ConstructorCondensed => "constructor condensed",
            Self::AssignmentCollapsed => "assignment collapsed",
            Self::ConditionalCondensed => "conditional condensed",
            Self::ConditionalSimplified => "conditional simplified",
            Self::JumpInverted => "jump inverted",
            Self::BackEdgeRemoved => "back edge removed",
            Self::LoopIdentified => "loop identified",
            Self::BreakRewritten => "break rewritten",
            Self::ForLoopCreated => "for loop created",
            Self::CatchIdentified => "catch identified",
            Self::ExceptionPruned => "exception pruned",
            Self::ConditionalIdentified => "conditional identified",
            Self::NopRemoved => "nop removed",
            Self::IterationRecognised => "iteration recognised",
            Self::SynchronizedIdentified => "synchronized identified",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::MethodProcessingStarted => "method processing started",
            Self::MethodProcessingCompleted => "method processing completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns `true` for events that describe a change to the statement list.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        !matches!(
            self,
            Self::PassStarted
                | Self::PassCompleted
                | Self::MethodProcessingStarted
                | Self::MethodProcessingCompleted
                | Self::Info
                | Self::Warning
                | Self::Error
        )
    }

    /// Returns `true` for info, warning and error events.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single recorded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Name of the method being processed, if known.
    pub method: Option<String>,
    /// Statement index or bytecode offset the event refers to.
    pub location: Option<usize>,
    /// Free-form description.
    pub message: String,
    /// Name of the pass that recorded the event.
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pass {
            Some(pass) => write!(f, "[{}] {}: {}", self.kind, pass, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for an event. The event is appended to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<String>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets both the method and the location.
    pub fn at(mut self, method: impl Into<String>, location: usize) -> Self {
        self.method = Some(method.into());
        self.location = Some(location);
        self
    }

    /// Sets the method name.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the location.
    pub fn location(mut self, location: usize) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the message. Defaults to the kind's description.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Sets the recording pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only, thread-safe collection of events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts recording an event of `kind`.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an info event.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning event.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error event.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events in `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns `true` if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts the events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Iterates over the events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Iterates over the events recorded by the pass named `pass`.
    pub fn filter_pass<'a>(&'a self, pass: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.pass.as_deref() == Some(pass))
    }

    /// Iterates over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct methods mentioned by events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.method.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// One-line summary of the transformation counts.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl Extend<Event> for EventLog {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.events.push(event);
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}
