use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredPermission {
    SendMessages,
    EmbedLinks,
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendMessages => f.write_str("send messages"),
            Self::EmbedLinks => f.write_str("embed links"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Permission,
    Presentation,
    Unexpected,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid or missing channel `{channel_id}`")]
    Configuration { channel_id: String },
    #[error("missing {permission} permission in channel `{channel_id}`")]
    Permission { channel_id: String, permission: RequiredPermission },
    #[error("form presentation failed: {0}")]
    Presentation(String),
    #[error("platform call failed: {0}")]
    Platform(String),
}

pub const PERMISSION_NOTICE: &str =
    "❌ The bot is not allowed to send messages or embeds in the announcement channel.";
pub const GENERIC_SUBMISSION_NOTICE: &str =
    "❌ Something went wrong while posting the announcement.";
pub const PRESENTATION_NOTICE: &str = "Something went wrong while opening the form.";

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Presentation(_) => ErrorKind::Presentation,
            Self::Platform(_) => ErrorKind::Unexpected,
        }
    }

    /// Text shown privately to the user who triggered the failing interaction.
    pub fn user_notice(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Permission => PERMISSION_NOTICE,
            ErrorKind::Presentation => PRESENTATION_NOTICE,
            ErrorKind::Configuration | ErrorKind::Unexpected => GENERIC_SUBMISSION_NOTICE,
        }
    }
}
