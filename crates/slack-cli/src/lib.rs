//! Slack command modules.
//!
//! - `config`: settings file + environment overrides.
//! - `messages`: user-facing notices, placeholders and size limits.
//! - `request`: endpoints and typed request variants.
//! - `slack_api`: Web API client (`SlackApi` trait + HTTP implementation).
//! - `ui`: host prompts and searchable pickers.
//! - `status`: success/failure presentation.
//! - `dispatcher`: guarded command dispatch.

pub mod config;
pub mod dispatcher;
pub mod messages;
pub mod request;
pub mod slack_api;
pub mod status;
pub mod ui;

pub use config::{ConfigError, Settings, Workspace};
pub use dispatcher::{CommandDispatcher, Connector, Outcome};
pub use messages::Notice;
pub use request::Endpoint;
pub use slack_api::{ApiResponse, ApiResult, HttpSlackApi, SlackApi, SlackApiError};
pub use status::{ConsoleStatus, OutputMode, StatusSink};
pub use ui::{HostUi, PickItem, PickKind, Presets, PromptKind, TerminalUi};
