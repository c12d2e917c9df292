//! NICK handling.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles `NICK` changes, re-keying the client and its memberships.
pub struct Nick;

impl Processor for Nick {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let source = line
            .source
            .clone()
            .ok_or_else(|| ProcessorError::fatal("NICK without source"))?;
        let old = line.source_nick().unwrap_or_default().to_string();
        let new = ctx.require_param(line, 0)?.to_string();
        let is_self = ctx.session.is_local(&old);

        ctx.session.get_or_create_client(&source);
        ctx.session.rename_client(&old, &new)?;

        ctx.emit(Event::NickChanged { old, new, is_self });
        Ok(())
    }
}
