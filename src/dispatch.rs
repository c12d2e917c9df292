//! Processor trait and command dispatch.
//!
//! Each inbound command or numeric maps to at most one [`Processor`].
//! Processors mutate the session through a [`Context`] and queue events
//! and outbound lines on it; the engine forwards both after dispatch
//! returns. A processor error never stops the stream: it is converted to
//! an error event (or just a debug log for self-healed desyncs) and the
//! next line proceeds.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ProcessorError, Severity};
use crate::event::Event;
use crate::ignore::IgnoreList;
use crate::line::Line;
use crate::outqueue::Priority;
use crate::state::Session;

/// Mutable view handed to a processor for one line.
pub struct Context<'a> {
    /// Session state.
    pub session: &'a mut Session,
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Ignore patterns, consulted for message-style lines.
    pub ignore: &'a IgnoreList,
    /// Events produced by this line, in emission order.
    pub events: &'a mut Vec<Event>,
    /// Outbound lines produced by this line.
    pub out: &'a mut Vec<(Priority, String)>,
    /// Wall-clock milliseconds for this line (tag timestamp or receipt
    /// time).
    pub now_ms: i64,
}

impl Context<'_> {
    /// Queue an event.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Queue an outbound line.
    pub fn send(&mut self, priority: Priority, line: impl Into<String>) {
        self.out.push((priority, line.into()));
    }

    /// Parameter `index` of `line`, or the appropriate missing-parameter
    /// error.
    pub fn require_param<'l>(
        &self,
        line: &'l Line,
        index: usize,
    ) -> Result<&'l str, ProcessorError> {
        line.param(index).ok_or_else(|| ProcessorError::MissingParameter {
            command: line.command.clone(),
            index,
        })
    }
}

/// Handles one command or numeric.
pub trait Processor: Send + Sync {
    /// Process a line. State mutation and event emission go through
    /// `ctx`; an error aborts this line only.
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError>;
}

/// Outcome of dispatching one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A processor handled the line.
    Handled,
    /// No processor is registered for the command.
    NotFound,
    /// The processor failed; an error event was emitted unless the
    /// failure was a self-healed desync.
    Failed(Severity),
}

/// Command-to-processor table.
///
/// Keys are uppercased command tokens or zero-padded numerics. Numerics
/// additionally always emit an [`Event::Numeric`], handled or not.
#[derive(Default)]
pub struct Registry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for a command, replacing any previous one.
    pub fn register(&mut self, command: &str, processor: Arc<dyn Processor>) {
        self.processors
            .insert(command.to_ascii_uppercase(), processor);
    }

    /// Register one processor for several commands.
    pub fn register_many(&mut self, commands: &[&str], processor: Arc<dyn Processor>) {
        for command in commands {
            self.register(command, Arc::clone(&processor));
        }
    }

    /// Whether a command has a processor.
    pub fn is_registered(&self, command: &str) -> bool {
        self.processors
            .contains_key(&command.to_ascii_uppercase())
    }

    /// Dispatch one parsed line. A numeric command additionally emits
    /// [`Event::Numeric`] after its processor's own events.
    pub fn dispatch(&self, ctx: &mut Context<'_>, line: &Line) -> DispatchOutcome {
        let key = dispatch_key(ctx, line);
        let outcome = match self.processors.get(&key) {
            None => {
                tracing::trace!(command = %line.command, "no processor");
                DispatchOutcome::NotFound
            }
            Some(processor) => match processor.process(ctx, line) {
                Ok(()) => DispatchOutcome::Handled,
                Err(err) => {
                    let severity = err.severity();
                    if severity == Severity::Desync {
                        tracing::debug!(command = %line.command, %err, "self-healed desync");
                    } else {
                        ctx.emit(Event::EngineError {
                            severity,
                            message: err.to_string(),
                            raw_line: line.raw.clone(),
                        });
                    }
                    DispatchOutcome::Failed(severity)
                }
            },
        };

        if let Some(numeric) = line.numeric() {
            ctx.emit(Event::Numeric {
                numeric,
                params: line.params.clone(),
            });
        }
        outcome
    }
}

/// Dispatch key for a line. A NOTICE to the AUTH pseudo-target before
/// registration dispatches under the synthetic key `NOTICE AUTH`.
fn dispatch_key(ctx: &Context<'_>, line: &Line) -> String {
    let command = line.command.to_ascii_uppercase();
    if command == "NOTICE"
        && !ctx.session.registered
        && line
            .param(0)
            .map(|t| t.eq_ignore_ascii_case("AUTH"))
            .unwrap_or(false)
    {
        return "NOTICE AUTH".to_string();
    }
    command
}
