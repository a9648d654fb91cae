use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::Notice;
use crate::request::Endpoint;
use crate::slack_api::{ApiResponse, ApiResult, SlackApiError};

pub const ENVELOPE_SCHEMA_VERSION: &str = "v1";
pub const USER_ERROR_CODE: &str = "slack.user";
pub const RUNTIME_ERROR_CODE: &str = "slack.runtime";

/// Where action outcomes are shown to the user.
pub trait StatusSink {
    fn set_status_message(&mut self, endpoint: Endpoint, result: &ApiResult);
    fn set_info_message(&mut self, notice: Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    ServiceJson,
}

/// Prints outcomes on stdout (stderr for failures in text mode).
#[derive(Debug, Clone)]
pub struct ConsoleStatus {
    mode: OutputMode,
    command: &'static str,
    display_time_ms: u64,
}

impl ConsoleStatus {
    pub fn new(mode: OutputMode, command: &'static str, display_time_ms: u64) -> Self {
        Self {
            mode,
            command,
            display_time_ms,
        }
    }
}

impl StatusSink for ConsoleStatus {
    fn set_status_message(&mut self, endpoint: Endpoint, result: &ApiResult) {
        match (self.mode, result) {
            (OutputMode::Text, Ok(response)) => println!("{}", success_message(endpoint, response)),
            (OutputMode::Text, Err(error)) => eprintln!("error: {}", failure_message(endpoint, error)),
            (OutputMode::ServiceJson, _) => println!(
                "{}",
                render_status_envelope(self.command, endpoint, result, self.display_time_ms)
            ),
        }
    }

    fn set_info_message(&mut self, notice: Notice) {
        match self.mode {
            OutputMode::Text => println!("{notice}"),
            OutputMode::ServiceJson => println!(
                "{}",
                render_error_envelope(
                    self.command,
                    USER_ERROR_CODE,
                    notice.message(),
                    Some(serde_json::json!({ "notice": notice.code() })),
                )
            ),
        }
    }
}

pub fn success_message(endpoint: Endpoint, response: &ApiResponse) -> String {
    let payload = &response.payload;
    match endpoint {
        Endpoint::PostText => "Message sent.".to_string(),
        Endpoint::UploadFiles => match payload
            .get("file")
            .and_then(|file| file.get("name"))
            .and_then(Value::as_str)
        {
            Some(name) => format!("File {name} uploaded."),
            None => "File uploaded.".to_string(),
        },
        Endpoint::SetSnooze => match DndStatus::from_payload(payload).snooze_remaining {
            Some(seconds) if seconds > 0 => {
                format!("Snooze set, {} remaining.", format_minutes(seconds))
            }
            _ => "Snooze set.".to_string(),
        },
        Endpoint::EndSnooze => "Snooze ended.".to_string(),
        Endpoint::DndInfo => describe_dnd(&DndStatus::from_payload(payload)),
    }
}

pub fn failure_message(endpoint: Endpoint, error: &SlackApiError) -> String {
    format!("{} failed: {error}", endpoint.method())
}

pub fn describe_dnd(status: &DndStatus) -> String {
    if status.snooze_enabled {
        return match status.snooze_remaining {
            Some(seconds) if seconds > 0 => {
                format!("Do not disturb: snoozed, {} remaining.", format_minutes(seconds))
            }
            _ => "Do not disturb: snoozed.".to_string(),
        };
    }

    if status.dnd_enabled {
        let window = status
            .next_dnd_start_ts
            .zip(status.next_dnd_end_ts)
            .and_then(|(start, end)| Some((format_clock(start)?, format_clock(end)?)));
        if let Some((start, end)) = window {
            return format!("Do not disturb: off, scheduled {start} to {end}.");
        }
    }

    "Do not disturb: off.".to_string()
}

fn format_minutes(seconds: i64) -> String {
    let minutes = (seconds + 59) / 60;
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

fn format_clock(timestamp: i64) -> Option<String> {
    let utc = DateTime::from_timestamp(timestamp, 0)?;
    Some(utc.with_timezone(&Local).format("%a %H:%M").to_string())
}

/// Fields of `dnd.info` / `dnd.setSnooze` replies used for the status line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DndStatus {
    #[serde(default)]
    pub dnd_enabled: bool,
    #[serde(default)]
    pub snooze_enabled: bool,
    #[serde(default)]
    pub snooze_remaining: Option<i64>,
    #[serde(default)]
    pub next_dnd_start_ts: Option<i64>,
    #[serde(default)]
    pub next_dnd_end_ts: Option<i64>,
}

impl DndStatus {
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct ServiceErrorEnvelope<'a> {
    code: &'a str,
    message: &'a str,
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct StatusResult<'a> {
    endpoint: &'a str,
    message: String,
    display_time_ms: u64,
    payload: &'a Value,
}

#[derive(Debug, Serialize)]
struct ServiceEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    ok: bool,
    result: Option<T>,
    error: Option<ServiceErrorEnvelope<'a>>,
}

pub fn render_status_envelope(
    command: &str,
    endpoint: Endpoint,
    result: &ApiResult,
    display_time_ms: u64,
) -> String {
    match result {
        Ok(response) => serialize_envelope(
            command,
            &ServiceEnvelope {
                schema_version: ENVELOPE_SCHEMA_VERSION,
                command,
                ok: true,
                result: Some(StatusResult {
                    endpoint: endpoint.method(),
                    message: success_message(endpoint, response),
                    display_time_ms,
                    payload: &response.payload,
                }),
                error: None,
            },
        ),
        Err(error) => render_error_envelope(
            command,
            RUNTIME_ERROR_CODE,
            &failure_message(endpoint, error),
            Some(serde_json::json!({ "endpoint": endpoint.method() })),
        ),
    }
}

pub fn render_error_envelope(
    command: &str,
    code: &str,
    message: &str,
    details: Option<Value>,
) -> String {
    serialize_envelope(
        command,
        &ServiceEnvelope::<Value> {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            command,
            ok: false,
            result: None,
            error: Some(ServiceErrorEnvelope {
                code,
                message,
                details,
            }),
        },
    )
}

fn serialize_envelope<T: Serialize>(command: &str, envelope: &ServiceEnvelope<'_, T>) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|serialize_error| {
        serde_json::json!({
            "schema_version": ENVELOPE_SCHEMA_VERSION,
            "command": command,
            "ok": false,
            "result": Value::Null,
            "error": {
                "code": "internal.serialize",
                "message": format!("failed to serialize service envelope: {serialize_error}"),
                "details": Value::Null,
            }
        })
        .to_string()
    })
}
