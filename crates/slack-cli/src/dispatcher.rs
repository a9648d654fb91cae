//! Guarded dispatch of user commands.
//!
//! Each action runs the same linear sequence: credential guard, input
//! gathering, token resolution, channel resolution for channel-bound
//! endpoints, the remote call, and finally presentation of the result.
//! Every step that the user can dismiss ends the action with
//! [`Outcome::Aborted`] and no request is sent.

use std::fs::{self, File};
use std::path::Path;

use tracing::{debug, warn};

use crate::config::Settings;
use crate::messages::{
    self, MAX_SNOOZE_MINUTES, MESSAGE_PLACEHOLDER, MISSING_TOKEN_ERROR, Notice,
    SELECT_CHANNEL_PLACEHOLDER, SELECT_WORKSPACE_PLACEHOLDER, SNOOZE_PLACEHOLDER,
};
use crate::request::{ChannelDraft, DndRequest, Endpoint, FileUpload, Request};
use crate::slack_api::{ApiResult, SlackApi, SlackApiError};
use crate::status::StatusSink;
use crate::ui::{HostUi, PickKind, PromptKind};

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The remote call was made and its result presented.
    Dispatched { endpoint: Endpoint, ok: bool },
    /// A guard stopped the action and the notice was presented.
    Notice(Notice),
    /// Nothing was sent and nothing was shown.
    Aborted,
    /// No token is configured; the credential error was shown and nothing else ran.
    MissingCredential,
}

/// Builds the remote client and presentation handles for a settings snapshot.
pub trait Connector {
    type Api: SlackApi;
    type Status: StatusSink;

    fn connect(&self, settings: &Settings) -> Result<(Self::Api, Self::Status), SlackApiError>;
}

struct Session<A, S> {
    api: A,
    status: S,
}

impl<A: SlackApi, S: StatusSink> Session<A, S> {
    fn send(&mut self, request: Request) -> Outcome {
        let endpoint = request.endpoint();
        let result: ApiResult = match request {
            Request::PostText(post) => self.api.post_text(&post),
            Request::UploadFile(upload) => self.api.upload_file(upload),
            Request::Dnd(dnd) => self.api.dnd(&dnd),
        };

        let ok = result.is_ok();
        if let Err(error) = &result {
            debug!(method = endpoint.method(), %error, "remote call failed");
        }
        self.status.set_status_message(endpoint, &result);
        Outcome::Dispatched { endpoint, ok }
    }
}

pub struct CommandDispatcher<U, C: Connector> {
    ui: U,
    connector: C,
    settings: Settings,
    session: Option<Session<C::Api, C::Status>>,
}

impl<U: HostUi, C: Connector> CommandDispatcher<U, C> {
    pub fn new(ui: U, connector: C) -> Self {
        Self {
            ui,
            connector,
            settings: Settings::default(),
            session: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Replaces the settings snapshot and the handles built from it.
    ///
    /// Handles are only created when a credential exists. If the connector
    /// fails, the dispatcher is left without credentials.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), SlackApiError> {
        self.session = None;
        self.settings = Settings::default();

        if settings.has_credentials() {
            let (api, status) = self.connector.connect(&settings)?;
            self.session = Some(Session { api, status });
        }

        self.settings = settings;
        Ok(())
    }

    pub fn is_credential_present(&mut self) -> bool {
        if self.settings.has_credentials() && self.session.is_some() {
            return true;
        }

        self.ui.show_error(MISSING_TOKEN_ERROR);
        false
    }

    /// Direct token, else the only workspace, else the user's pick.
    ///
    /// A dismissed pick yields an empty token, which callers still send.
    pub fn resolve_token(&mut self) -> String {
        if let Some(token) = &self.settings.token {
            return token.clone();
        }

        if let [only] = self.settings.workspaces.as_slice() {
            return only.token.clone();
        }

        let Some(session) = self.session.as_ref() else {
            return String::new();
        };
        let teams = session.api.list_teams(&self.settings.workspaces);

        match self
            .ui
            .pick(PickKind::Workspace, &teams, SELECT_WORKSPACE_PLACEHOLDER)
        {
            Some(team) => team.value,
            None => {
                warn!("workspace pick dismissed; continuing with an empty token");
                String::new()
            }
        }
    }

    pub fn send_message(&mut self) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        let Some(message) = self
            .ui
            .prompt(PromptKind::Message, MESSAGE_PLACEHOLDER)
            .filter(|message| !message.is_empty())
        else {
            return Outcome::Aborted;
        };

        if messages::exceeds_text_limit(&message) {
            return self.notify(Notice::MessageTooLong);
        }

        let token = self.resolve_token();
        self.dispatch_to_channel(token, ChannelDraft::Text(message))
    }

    pub fn send_selection(&mut self) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        let Some(selection) = self.ui.selection().filter(|text| !text.is_empty()) else {
            return self.notify(Notice::NoTextSelected);
        };

        let wrapped = messages::wrap_selection(&selection);
        if messages::exceeds_text_limit(&wrapped) {
            return self.notify(Notice::SelectionTooLong);
        }

        let token = self.resolve_token();
        self.dispatch_to_channel(token, ChannelDraft::Text(wrapped))
    }

    pub fn set_snooze(&mut self) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        let Some(raw) = self.ui.prompt(PromptKind::SnoozeMinutes, SNOOZE_PLACEHOLDER) else {
            return Outcome::Aborted;
        };

        let Some(minutes) = messages::parse_snooze_minutes(&raw) else {
            return self.notify(Notice::InvalidSnooze);
        };

        // No user-facing notice exists for this case; the request is dropped.
        if minutes.exceeds_limit() {
            warn!(
                minutes = minutes.value(),
                max = MAX_SNOOZE_MINUTES,
                "snooze duration too long; nothing sent"
            );
            return Outcome::Aborted;
        }

        let token = self.resolve_token();
        self.dispatch(Request::Dnd(DndRequest::SetSnooze {
            token,
            minutes: minutes.into_raw(),
        }))
    }

    pub fn end_snooze(&mut self) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        let token = self.resolve_token();
        self.dispatch(Request::Dnd(DndRequest::EndSnooze { token }))
    }

    pub fn dnd_info(&mut self) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        let token = self.resolve_token();
        self.dispatch(Request::Dnd(DndRequest::Info { token }))
    }

    /// Uploads a file chosen from a file list or explorer.
    pub fn upload_selected_file(&mut self, path: &Path) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        self.post_file(path)
    }

    /// Uploads the file currently open in the editor.
    pub fn upload_open_file(&mut self, path: &Path) -> Outcome {
        if !self.is_credential_present() {
            return Outcome::MissingCredential;
        }

        self.post_file(path)
    }

    fn post_file(&mut self, path: &Path) -> Outcome {
        let len = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() && metadata.len() > 0 => metadata.len(),
            Ok(_) => return self.notify(Notice::FileEmpty),
            Err(error) => {
                debug!(%error, path = %path.display(), "stat failed");
                return self.notify(Notice::FileEmpty);
            }
        };

        let filename = upload_file_name(path);
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn!(%error, path = %path.display(), "failed to open upload");
                return self.notify(Notice::FileUnreadable);
            }
        };

        let token = self.resolve_token();
        self.dispatch_to_channel(
            token,
            ChannelDraft::File(FileUpload {
                filename,
                file,
                len,
            }),
        )
    }

    fn dispatch(&mut self, request: Request) -> Outcome {
        debug_assert!(!request.endpoint().is_channel_bound());
        match self.session.as_mut() {
            Some(session) => session.send(request),
            None => Outcome::MissingCredential,
        }
    }

    fn dispatch_to_channel(&mut self, token: String, draft: ChannelDraft) -> Outcome {
        let endpoint = draft.endpoint();
        if token.is_empty() {
            warn!(method = endpoint.method(), "dispatching without a token");
        }

        let Some(session) = self.session.as_mut() else {
            return Outcome::MissingCredential;
        };

        let channels = match session.api.list_channels(&token) {
            Ok(channels) => channels,
            Err(error) => {
                session.status.set_status_message(endpoint, &Err(error));
                return Outcome::Dispatched {
                    endpoint,
                    ok: false,
                };
            }
        };

        let Some(channel) = self
            .ui
            .pick(PickKind::Channel, &channels, SELECT_CHANNEL_PLACEHOLDER)
        else {
            debug!(method = endpoint.method(), "channel pick dismissed");
            return Outcome::Aborted;
        };

        session.send(draft.into_request(token, channel.value))
    }

    fn notify(&mut self, notice: Notice) -> Outcome {
        if let Some(session) = self.session.as_mut() {
            session.status.set_info_message(notice);
        }
        Outcome::Notice(notice)
    }
}

fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
