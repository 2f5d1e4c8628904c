use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use slashgate_core::errors::ApplicationError;

use crate::message::{CommandResult, Message};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing command")]
    MissingCommand,
}

impl From<ValidationError> for ApplicationError {
    fn from(value: ValidationError) -> Self {
        ApplicationError::Validation(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("command handler failed: {0}")]
    Failed(String),
}

/// A command after validation: the name without its leading `/`, and
/// trimmed text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: String,
    pub text: String,
}

pub fn normalize_command(raw_command: &str, raw_text: &str) -> Result<SlashCommand, ValidationError> {
    let name = raw_command.strip_prefix('/').ok_or(ValidationError::MissingCommand)?;
    let text = raw_text.trim();
    if name.is_empty() || text.is_empty() {
        return Err(ValidationError::MissingCommand);
    }

    Ok(SlashCommand { name: name.to_owned(), text: text.to_owned() })
}

/// A participant in broadcast dispatch. Every registered handler sees every
/// command; handlers that do not care return no fragments.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, command: &str, text: &str) -> Result<Vec<Message>, HandlerError>;
}

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: Vec<Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    /// Validates the command and runs every handler in registration order.
    ///
    /// A handler error is logged and skipped; the remaining handlers still
    /// run.
    pub async fn dispatch(
        &self,
        raw_command: &str,
        raw_text: &str,
        context: &EventContext,
    ) -> Result<CommandResult, ValidationError> {
        let command = normalize_command(raw_command, raw_text)?;
        let mut result = CommandResult::default();

        for handler in &self.handlers {
            match handler.handle(&command.name, &command.text).await {
                Ok(fragments) => {
                    debug!(
                        event_name = "command.handler.completed",
                        correlation_id = %context.correlation_id,
                        handler = handler.name(),
                        command = %command.name,
                        fragments = fragments.len(),
                        "command handler completed"
                    );
                    result.extend(fragments);
                }
                Err(error) => {
                    warn!(
                        event_name = "command.handler.failed",
                        correlation_id = %context.correlation_id,
                        handler = handler.name(),
                        command = %command.name,
                        error = %error,
                        "command handler failed, continuing with remaining handlers"
                    );
                }
            }
        }

        Ok(result)
    }
}

/// Answers `/repeat <text>` with `Repeat: <text>`.
#[derive(Default)]
pub struct RepeatCommandHandler;

#[async_trait]
impl CommandHandler for RepeatCommandHandler {
    fn name(&self) -> &str {
        "repeat"
    }

    async fn handle(&self, command: &str, text: &str) -> Result<Vec<Message>, HandlerError> {
        if command != "repeat" {
            return Ok(Vec::new());
        }
        Ok(vec![Message::text(format!("Repeat: {text}"))])
    }
}
