use std::time::Duration;

use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Workspace;
use crate::request::{DndRequest, Endpoint, PostText, UploadFile};
use crate::ui::PickItem;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

const CHANNEL_TYPES: &str = "public_channel,private_channel,im";
const CHANNEL_PAGE_LIMIT: &str = "200";
const MAX_CHANNEL_PAGES: usize = 50;

/// Successful Web API reply; `payload` is the full JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub payload: Value,
}

pub type ApiResult = Result<ApiResponse, SlackApiError>;

pub trait SlackApi {
    /// Pick items for every configured workspace; the item value is its token.
    fn list_teams(&self, workspaces: &[Workspace]) -> Vec<PickItem>;
    /// Pick items for every conversation the token can post to; the item value is the channel id.
    fn list_channels(&self, token: &str) -> Result<Vec<PickItem>, SlackApiError>;
    fn post_text(&self, request: &PostText) -> ApiResult;
    fn upload_file(&self, request: UploadFile) -> ApiResult;
    fn dnd(&self, request: &DndRequest) -> ApiResult;
}

#[derive(Debug, Clone)]
pub struct HttpSlackApi {
    client: Client,
    base_url: String,
}

impl HttpSlackApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|source| SlackApiError::Transport { source })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    fn post_form(&self, method: &str, token: &str, form: &[(&str, String)]) -> ApiResult {
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token)
            .form(form)
            .send()
            .map_err(|source| SlackApiError::Transport { source })?;

        read_response(method, response)
    }

    fn fetch_team_info(&self, token: &str) -> Result<TeamInfo, SlackApiError> {
        let response = self
            .client
            .get(self.method_url("team.info"))
            .bearer_auth(token)
            .send()
            .map_err(|source| SlackApiError::Transport { source })?;

        let reply = read_response("team.info", response)?;
        parse_team_info(reply.payload)
    }

    fn fetch_channel_page(
        &self,
        token: &str,
        cursor: Option<&str>,
    ) -> Result<ChannelPage, SlackApiError> {
        let mut query = vec![
            ("types", CHANNEL_TYPES),
            ("exclude_archived", "true"),
            ("limit", CHANNEL_PAGE_LIMIT),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self
            .client
            .get(self.method_url("conversations.list"))
            .bearer_auth(token)
            .query(&query)
            .send()
            .map_err(|source| SlackApiError::Transport { source })?;

        let reply = read_response("conversations.list", response)?;
        parse_channel_page(reply.payload)
    }
}

impl SlackApi for HttpSlackApi {
    fn list_teams(&self, workspaces: &[Workspace]) -> Vec<PickItem> {
        workspaces
            .iter()
            .enumerate()
            .map(|(index, workspace)| {
                let team = match workspace.name {
                    Some(_) => None,
                    None => self
                        .fetch_team_info(&workspace.token)
                        .inspect_err(|error| debug!(%error, index, "team.info lookup failed"))
                        .ok(),
                };
                team_pick_item(index, workspace, team.as_ref())
            })
            .collect()
    }

    fn list_channels(&self, token: &str) -> Result<Vec<PickItem>, SlackApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_CHANNEL_PAGES {
            let page = self.fetch_channel_page(token, cursor.as_deref())?;
            items.extend(page.items);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(count = items.len(), "loaded conversations");
        Ok(items)
    }

    fn post_text(&self, request: &PostText) -> ApiResult {
        let form = [
            ("channel", request.channel.clone()),
            ("text", request.text.clone()),
            ("as_user", request.as_user.to_string()),
        ];
        self.post_form(Endpoint::PostText.method(), &request.token, &form)
    }

    fn upload_file(&self, request: UploadFile) -> ApiResult {
        let method = Endpoint::UploadFiles.method();
        let UploadFile {
            token,
            channel,
            upload,
            as_user,
        } = request;

        let part = multipart::Part::reader_with_length(upload.file, upload.len)
            .file_name(upload.filename.clone());
        let form = multipart::Form::new()
            .text("channels", channel)
            .text("filename", upload.filename)
            .text("as_user", as_user.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .map_err(|source| SlackApiError::Transport { source })?;

        read_response(method, response)
    }

    fn dnd(&self, request: &DndRequest) -> ApiResult {
        let form = match request {
            DndRequest::SetSnooze { minutes, .. } => vec![("num_minutes", minutes.clone())],
            DndRequest::EndSnooze { .. } | DndRequest::Info { .. } => Vec::new(),
        };
        self.post_form(request.endpoint().method(), request.token(), &form)
    }
}

fn read_response(method: &str, response: reqwest::blocking::Response) -> ApiResult {
    let status_code = response.status().as_u16();
    let body = response
        .text()
        .map_err(|source| SlackApiError::Transport { source })?;

    debug!(method, status = status_code, "slack api response");
    parse_api_response(status_code, &body)
}

/// Slack answers HTTP 200 with `ok: false` for most failures, so both layers are checked.
pub fn parse_api_response(status_code: u16, body: &str) -> ApiResult {
    if !(200..=299).contains(&status_code) {
        let message = extract_error_message(body).unwrap_or_else(|| format!("HTTP {status_code}"));
        return Err(SlackApiError::Http {
            status: status_code,
            message,
        });
    }

    let payload: Value = serde_json::from_str(body).map_err(SlackApiError::InvalidResponse)?;

    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(ApiResponse { payload })
    } else {
        let error = extract_error_message(body).unwrap_or_else(|| "unknown_error".to_string());
        Err(SlackApiError::Slack { error })
    }
}

pub fn parse_channel_page(payload: Value) -> Result<ChannelPage, SlackApiError> {
    let page: ConversationsList =
        serde_json::from_value(payload).map_err(SlackApiError::InvalidResponse)?;

    let items = page
        .channels
        .into_iter()
        .filter(|channel| !channel.is_archived)
        .filter_map(channel_pick_item)
        .collect();

    let next_cursor = page
        .response_metadata
        .and_then(|metadata| metadata.next_cursor)
        .map(|cursor| cursor.trim().to_string())
        .filter(|cursor| !cursor.is_empty());

    Ok(ChannelPage { items, next_cursor })
}

pub fn parse_team_info(payload: Value) -> Result<TeamInfo, SlackApiError> {
    let reply: TeamInfoResponse =
        serde_json::from_value(payload).map_err(SlackApiError::InvalidResponse)?;
    Ok(reply.team)
}

fn channel_pick_item(channel: Conversation) -> Option<PickItem> {
    let id = channel.id.trim().to_string();
    if id.is_empty() {
        return None;
    }

    if channel.is_im {
        let user = channel.user.unwrap_or_else(|| id.clone());
        return Some(PickItem::new(format!("@{user}"), id).with_description("direct message"));
    }

    let name = channel.name.map(|name| name.trim().to_string())?;
    if name.is_empty() {
        return None;
    }

    let description = [channel.topic, channel.purpose]
        .into_iter()
        .flatten()
        .map(|text| text.value.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| {
            if channel.is_private {
                "private channel".to_string()
            } else {
                "channel".to_string()
            }
        });

    Some(PickItem::new(format!("#{name}"), id).with_description(description))
}

fn team_pick_item(index: usize, workspace: &Workspace, team: Option<&TeamInfo>) -> PickItem {
    let label = workspace
        .name
        .clone()
        .or_else(|| team.map(|team| team.name.clone()))
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| format!("Workspace {}", index + 1));

    let description = team
        .and_then(|team| team.domain.clone())
        .filter(|domain| !domain.trim().is_empty())
        .map(|domain| format!("{domain}.slack.com"))
        .unwrap_or_else(|| mask_token(&workspace.token));

    PickItem::new(label, workspace.token.clone()).with_description(description)
}

/// Keeps only the last four characters so pick lists never show a full credential.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("token …{tail}")
}

fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;

    [
        value.get("error").and_then(Value::as_str),
        value.get("message").and_then(Value::as_str),
        value.get("detail").and_then(Value::as_str),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|value| !value.is_empty())
    .map(ToOwned::to_owned)
}

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack api request failed")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("slack api error: {error}")]
    Slack { error: String },
    #[error("invalid slack api response")]
    InvalidResponse(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPage {
    pub items: Vec<PickItem>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamInfoResponse {
    team: TeamInfo,
}

#[derive(Debug, Deserialize)]
struct ConversationsList {
    #[serde(default)]
    channels: Vec<Conversation>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_im: bool,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_archived: bool,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    topic: Option<TextValue>,
    #[serde(default)]
    purpose: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(default)]
    value: String,
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    use serde_json::json;

    use super::*;
    use crate::request::FileUpload;

    #[test]
    fn slack_api_parse_response_accepts_ok_payload() {
        let reply = parse_api_response(200, r#"{"ok":true,"ts":"1700000000.000100"}"#)
            .expect("ok payload should parse");

        assert_eq!(
            reply.payload.get("ts").and_then(Value::as_str),
            Some("1700000000.000100")
        );
    }

    #[test]
    fn slack_api_parse_response_surfaces_slack_error_code() {
        let err = parse_api_response(200, r#"{"ok":false,"error":"channel_not_found"}"#)
            .expect_err("ok=false should fail");

        match err {
            SlackApiError::Slack { error } => assert_eq!(error, "channel_not_found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn slack_api_parse_response_defaults_missing_error_code() {
        let err = parse_api_response(200, r#"{"ok":false}"#).expect_err("ok=false should fail");

        assert_eq!(err.to_string(), "slack api error: unknown_error");
    }

    #[test]
    fn slack_api_parse_response_maps_http_failures() {
        let err = parse_api_response(429, r#"{"ok":false,"error":"ratelimited"}"#)
            .expect_err("non-2xx should fail");

        match err {
            SlackApiError::Http { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "ratelimited");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_api_response(502, "<html>bad gateway</html>").expect_err("should fail");
        assert_eq!(err.to_string(), "slack api error (502): HTTP 502");
    }

    #[test]
    fn slack_api_parse_response_rejects_invalid_json() {
        let err = parse_api_response(200, "not-json").expect_err("invalid json should fail");
        assert!(matches!(err, SlackApiError::InvalidResponse(_)));
    }

    #[test]
    fn slack_api_parse_channel_page_builds_pick_items() {
        let page = parse_channel_page(json!({
            "ok": true,
            "channels": [
                {"id": "C001", "name": "general", "topic": {"value": "Announcements"}, "purpose": {"value": "ignored"}},
                {"id": "C002", "name": "secret", "is_private": true, "topic": {"value": ""}, "purpose": {"value": ""}},
                {"id": "D001", "is_im": true, "user": "U42"},
                {"id": "C003", "name": "old", "is_archived": true},
                {"id": "", "name": "broken"}
            ],
            "response_metadata": {"next_cursor": "dGVhbTpDMDYx"}
        }))
        .expect("page should parse");

        assert_eq!(
            page.items,
            vec![
                PickItem::new("#general", "C001").with_description("Announcements"),
                PickItem::new("#secret", "C002").with_description("private channel"),
                PickItem::new("@U42", "D001").with_description("direct message"),
            ]
        );
        assert_eq!(page.next_cursor.as_deref(), Some("dGVhbTpDMDYx"));
    }

    #[test]
    fn slack_api_parse_channel_page_treats_blank_cursor_as_last_page() {
        let page = parse_channel_page(json!({
            "ok": true,
            "channels": [],
            "response_metadata": {"next_cursor": ""}
        }))
        .expect("page should parse");

        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn slack_api_team_pick_item_prefers_configured_name() {
        let workspace = Workspace {
            name: Some("acme".to_string()),
            token: "xoxp-1234abcd".to_string(),
        };

        let item = team_pick_item(0, &workspace, None);
        assert_eq!(item.label, "acme");
        assert_eq!(item.value, "xoxp-1234abcd");
        assert_eq!(item.description.as_deref(), Some("token …abcd"));
    }

    #[test]
    fn slack_api_team_pick_item_uses_team_info_for_unnamed_workspace() {
        let workspace = Workspace {
            name: None,
            token: "xoxp-5678".to_string(),
        };
        let team = parse_team_info(json!({
            "ok": true,
            "team": {"id": "T1", "name": "Acme Corp", "domain": "acme"}
        }))
        .expect("team info should parse");

        let item = team_pick_item(1, &workspace, Some(&team));
        assert_eq!(item.label, "Acme Corp");
        assert_eq!(item.description.as_deref(), Some("acme.slack.com"));

        let fallback = team_pick_item(1, &workspace, None);
        assert_eq!(fallback.label, "Workspace 2");
    }

    #[test]
    fn slack_api_mask_token_handles_short_tokens() {
        assert_eq!(mask_token("ab"), "token …ab");
        assert_eq!(mask_token(""), "token …");
    }

    #[test]
    fn slack_api_post_text_sends_bearer_token_and_form_fields() {
        let server = MockServer::spawn(vec![MockResponse::ok(r#"{"ok":true,"ts":"1.2"}"#)]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        let reply = api
            .post_text(&PostText {
                token: "xoxp-post".to_string(),
                channel: "C123".to_string(),
                text: "hello & bye".to_string(),
                as_user: true,
            })
            .expect("post should succeed");

        assert_eq!(reply.payload["ts"], "1.2");
        let requests = server.join();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/chat.postMessage");
        assert_eq!(request.header("authorization"), Some("Bearer xoxp-post"));
        assert_eq!(
            request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(request.body, "channel=C123&text=hello+%26+bye&as_user=true");
    }

    #[test]
    fn slack_api_dnd_sends_num_minutes_only_for_set_snooze() {
        let server = MockServer::spawn(vec![
            MockResponse::ok(r#"{"ok":true,"snooze_enabled":true}"#),
            MockResponse::ok(r#"{"ok":true}"#),
        ]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        api.dnd(&DndRequest::SetSnooze {
            token: "xoxp-dnd".to_string(),
            minutes: "1.5".to_string(),
        })
        .expect("set snooze should succeed");
        api.dnd(&DndRequest::EndSnooze {
            token: "xoxp-dnd".to_string(),
        })
        .expect("end snooze should succeed");

        let requests = server.join();
        assert_eq!(requests[0].path, "/dnd.setSnooze");
        assert_eq!(requests[0].header("authorization"), Some("Bearer xoxp-dnd"));
        assert_eq!(requests[0].body, "num_minutes=1.5");
        assert_eq!(requests[1].path, "/dnd.endSnooze");
        assert_eq!(requests[1].body, "");
    }

    #[test]
    fn slack_api_list_channels_follows_cursor_until_blank() {
        let server = MockServer::spawn(vec![
            MockResponse::ok(
                r#"{"ok":true,"channels":[{"id":"C1","name":"general"}],"response_metadata":{"next_cursor":"page-2"}}"#,
            ),
            MockResponse::ok(
                r#"{"ok":true,"channels":[{"id":"D1","is_im":true,"user":"U9"}],"response_metadata":{"next_cursor":""}}"#,
            ),
        ]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        let channels = api.list_channels("xoxp-list").expect("channels");

        let values: Vec<&str> = channels.iter().map(|item| item.value.as_str()).collect();
        assert_eq!(values, vec!["C1", "D1"]);
        let requests = server.join();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.method, "GET");
            assert_eq!(request.header("authorization"), Some("Bearer xoxp-list"));
            assert!(request.path.starts_with("/conversations.list?"));
            assert!(
                request
                    .path
                    .contains("types=public_channel%2Cprivate_channel%2Cim")
            );
            assert!(request.path.contains("exclude_archived=true"));
        }
        assert!(!requests[0].path.contains("cursor="));
        assert!(requests[1].path.contains("cursor=page-2"));
    }

    #[test]
    fn slack_api_list_channels_stops_on_slack_error() {
        let server = MockServer::spawn(vec![MockResponse::ok(
            r#"{"ok":false,"error":"invalid_auth"}"#,
        )]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        let error = api.list_channels("xoxp-bad").expect_err("must fail");

        match error {
            SlackApiError::Slack { error } => assert_eq!(error, "invalid_auth"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.join().len(), 1);
    }

    #[test]
    fn slack_api_upload_file_sends_multipart_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\n").expect("write upload");
        let file = File::open(&path).expect("open upload");

        let server = MockServer::spawn(vec![MockResponse::ok(
            r#"{"ok":true,"file":{"name":"notes.txt"}}"#,
        )]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        api.upload_file(UploadFile {
            token: "xoxp-upload".to_string(),
            channel: "C777".to_string(),
            upload: FileUpload {
                filename: "notes.txt".to_string(),
                file,
                len: 9,
            },
            as_user: true,
        })
        .expect("upload should succeed");

        let requests = server.join();
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/files.upload");
        assert_eq!(request.header("authorization"), Some("Bearer xoxp-upload"));
        assert!(
            request
                .header("content-type")
                .is_some_and(|value| value.starts_with("multipart/form-data"))
        );
        assert!(request.body.contains("name=\"channels\"\r\n\r\nC777\r\n"));
        assert!(request.body.contains("name=\"filename\"\r\n\r\nnotes.txt\r\n"));
        assert!(request.body.contains("name=\"as_user\"\r\n\r\ntrue\r\n"));
        assert!(
            request
                .body
                .contains("name=\"file\"; filename=\"notes.txt\"")
        );
        assert!(request.body.contains("line one\n"));
    }

    #[test]
    fn slack_api_list_teams_looks_up_unnamed_workspaces_only() {
        let server = MockServer::spawn(vec![MockResponse::ok(
            r#"{"ok":true,"team":{"name":"Acme","domain":"acme"}}"#,
        )]);
        let api = HttpSlackApi::new(server.base_url.clone()).expect("client");

        let teams = api.list_teams(&[
            Workspace {
                name: Some("side".to_string()),
                token: "xoxp-side".to_string(),
            },
            Workspace {
                name: None,
                token: "xoxp-acme".to_string(),
            },
        ]);

        let labels: Vec<&str> = teams.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["side", "Acme"]);
        let requests = server.join();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/team.info");
        assert_eq!(requests[0].header("authorization"), Some("Bearer xoxp-acme"));
    }

    #[derive(Debug)]
    struct MockResponse {
        status: u16,
        reason: &'static str,
        body: String,
    }

    impl MockResponse {
        fn ok(body: &str) -> Self {
            Self {
                status: 200,
                reason: "OK",
                body: body.to_string(),
            }
        }
    }

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl CapturedRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        }
    }

    struct MockServer {
        base_url: String,
        handle: thread::JoinHandle<Vec<CapturedRequest>>,
    }

    impl MockServer {
        fn spawn(responses: Vec<MockResponse>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.set_nonblocking(true).expect("nonblocking");
            let base_url = format!("http://{}", listener.local_addr().expect("addr"));
            let handle = thread::spawn(move || {
                let mut captured = Vec::new();
                for response in responses {
                    let start = Instant::now();
                    let mut stream = loop {
                        match listener.accept() {
                            Ok((stream, _)) => break stream,
                            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                                if start.elapsed() > Duration::from_secs(3) {
                                    panic!("mock server timed out waiting for request");
                                }
                                thread::sleep(Duration::from_millis(10));
                            }
                            Err(error) => panic!("mock server accept failed: {error}"),
                        }
                    };
                    stream.set_nonblocking(false).expect("blocking stream");

                    let cloned = stream.try_clone().expect("clone stream");
                    let mut reader = BufReader::new(cloned);
                    let request = read_request(&mut reader);
                    captured.push(request);

                    let response_head = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        response.status,
                        response.reason,
                        response.body.len()
                    );
                    stream
                        .write_all(response_head.as_bytes())
                        .and_then(|_| stream.write_all(response.body.as_bytes()))
                        .expect("write response");
                }

                captured
            });

            Self { base_url, handle }
        }

        fn join(self) -> Vec<CapturedRequest> {
            self.handle.join().expect("mock server thread")
        }
    }

    fn read_request(reader: &mut impl BufRead) -> CapturedRequest {
        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            let bytes = reader.read_line(&mut line).expect("read header");
            if bytes == 0 || line == "\r\n" {
                break;
            }
            if let Some((key, value)) = line.trim_end_matches(['\r', '\n']).split_once(':') {
                headers.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        let header = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value): &(String, String)| value.clone())
        };
        let body = match header("content-length") {
            Some(length) => {
                let mut body = vec![0; length.parse().expect("content length")];
                reader.read_exact(&mut body).expect("read body");
                body
            }
            None if header("transfer-encoding").is_some_and(|value| value.contains("chunked")) => {
                read_chunked_body(reader)
            }
            None => Vec::new(),
        };

        CapturedRequest {
            method,
            path,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    fn read_chunked_body(reader: &mut impl BufRead) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).expect("chunk size");
            let size = usize::from_str_radix(size_line.trim(), 16).expect("hex chunk size");
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).expect("chunk");
            if size == 0 {
                return body;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }
}
