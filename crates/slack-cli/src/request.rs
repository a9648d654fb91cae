use std::fs::File;

/// Remote endpoints reachable from a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    PostText,
    UploadFiles,
    SetSnooze,
    EndSnooze,
    DndInfo,
}

impl Endpoint {
    /// Slack Web API method name.
    pub fn method(self) -> &'static str {
        match self {
            Self::PostText => "chat.postMessage",
            Self::UploadFiles => "files.upload",
            Self::SetSnooze => "dnd.setSnooze",
            Self::EndSnooze => "dnd.endSnooze",
            Self::DndInfo => "dnd.info",
        }
    }

    pub fn is_channel_bound(self) -> bool {
        matches!(self, Self::PostText | Self::UploadFiles)
    }
}

#[derive(Debug)]
pub struct FileUpload {
    pub filename: String,
    pub file: File,
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostText {
    pub token: String,
    pub channel: String,
    pub text: String,
    pub as_user: bool,
}

#[derive(Debug)]
pub struct UploadFile {
    pub token: String,
    pub channel: String,
    pub upload: FileUpload,
    pub as_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DndRequest {
    /// `minutes` is the wire value of `num_minutes`.
    SetSnooze { token: String, minutes: String },
    EndSnooze { token: String },
    Info { token: String },
}

impl DndRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::SetSnooze { .. } => Endpoint::SetSnooze,
            Self::EndSnooze { .. } => Endpoint::EndSnooze,
            Self::Info { .. } => Endpoint::DndInfo,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::SetSnooze { token, .. } | Self::EndSnooze { token } | Self::Info { token } => {
                token
            }
        }
    }
}

/// A fully resolved call, ready for the client.
#[derive(Debug)]
pub enum Request {
    PostText(PostText),
    UploadFile(UploadFile),
    Dnd(DndRequest),
}

impl Request {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::PostText(_) => Endpoint::PostText,
            Self::UploadFile(_) => Endpoint::UploadFiles,
            Self::Dnd(request) => request.endpoint(),
        }
    }
}

/// Payload of a channel-bound action before its destination is known.
#[derive(Debug)]
pub enum ChannelDraft {
    Text(String),
    File(FileUpload),
}

impl ChannelDraft {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Text(_) => Endpoint::PostText,
            Self::File(_) => Endpoint::UploadFiles,
        }
    }

    pub fn into_request(self, token: String, channel: String) -> Request {
        match self {
            Self::Text(text) => Request::PostText(PostText {
                token,
                channel,
                text,
                as_user: true,
            }),
            Self::File(upload) => Request::UploadFile(UploadFile {
                token,
                channel,
                upload,
                as_user: true,
            }),
        }
    }
}
