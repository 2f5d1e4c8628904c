//! Slack slash-command gateway
//!
//! This crate holds everything between the raw HTTP callback and the JSON
//! reply:
//! - **Inbound events** (`event`) - headers, raw body and parsed `command`/`text`
//! - **Authentication** (`auth`) - replay window, HMAC check against the tenant pool, flood accounting
//! - **Commands** (`commands`) - validation and broadcast dispatch to registered handlers
//! - **Messages** (`message`) - fragments handlers return
//! - **Markup** (`markup`) - HTML subset to Slack `mrkdwn`
//! - **Encoding** (`encoder`) - response envelope with HTML-safe JSON escaping
//!
//! # Architecture
//!
//! ```text
//! POST /slash-command → RequestAuthenticator → CommandDispatcher → Handlers
//!                                                     ↓
//!                     JSON body ← ResponseEncoder ← MarkupConverter
//! ```

pub mod auth;
pub mod commands;
pub mod encoder;
pub mod event;
pub mod markup;
pub mod message;

pub use auth::{AuthError, AuthSettings, Principal, RequestAuthenticator};
pub use commands::{
    CommandDispatcher, CommandHandler, EventContext, HandlerError, RepeatCommandHandler,
    ValidationError,
};
pub use encoder::{EncodeError, ResponseEncoder};
pub use event::InboundEvent;
pub use markup::{MarkupConverter, MarkupError};
pub use message::{Attachment, CommandResult, Message};
