use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use leaveform_core::{RequiredPermission, WorkflowError};
use thiserror::Error;

use crate::components::{EphemeralReply, MessageTemplate, ModalTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: String,
    pub name: Option<String>,
}

/// The subset of the bot's effective channel permissions the workflow cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub send_messages: bool,
    pub embed_links: bool,
}

impl PermissionSet {
    pub fn allows(&self, permission: RequiredPermission) -> bool {
        match permission {
            RequiredPermission::SendMessages => self.send_messages,
            RequiredPermission::EmbedLinks => self.embed_links,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform refused the request (missing permissions): {0}")]
    Forbidden(String),
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("interaction response failed: {0}")]
    Interaction(String),
}

impl PlatformError {
    pub fn into_workflow(self, channel_id: &str) -> WorkflowError {
        match self {
            Self::Forbidden(_) => WorkflowError::Permission {
                channel_id: channel_id.to_owned(),
                permission: RequiredPermission::SendMessages,
            },
            Self::Request(message) | Self::Interaction(message) => {
                WorkflowError::Platform(message)
            }
        }
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// `Ok(None)` when the id does not resolve to a channel the bot can post in.
    async fn fetch_channel(&self, channel_id: &str)
        -> Result<Option<ChannelHandle>, PlatformError>;
    async fn permissions_in(&self, channel: &ChannelHandle)
        -> Result<PermissionSet, PlatformError>;
    async fn send_message(
        &self,
        channel: &ChannelHandle,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn show_modal(&self, modal: &ModalTemplate) -> Result<(), PlatformError>;
    async fn reply_ephemeral(&self, reply: &EphemeralReply) -> Result<(), PlatformError>;
}

/// Allows at most one initial response per interaction. A response slot is only
/// consumed once the platform accepted it, so a failed modal can still be
/// followed by an error notice.
pub struct ReplyGuard<R> {
    responder: R,
    responded: AtomicBool,
}

impl<R> ReplyGuard<R>
where
    R: InteractionResponder,
{
    pub fn new(responder: R) -> Self {
        Self { responder, responded: AtomicBool::new(false) }
    }

    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    pub async fn show_modal(&self, modal: &ModalTemplate) -> Result<bool, PlatformError> {
        if !self.claim() {
            return Ok(false);
        }
        self.release_on_error(self.responder.show_modal(modal).await)
    }

    pub async fn reply_once(&self, reply: &EphemeralReply) -> Result<bool, PlatformError> {
        if !self.claim() {
            return Ok(false);
        }
        self.release_on_error(self.responder.reply_ephemeral(reply).await)
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    fn claim(&self) -> bool {
        self.responded.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    fn release_on_error(&self, result: Result<(), PlatformError>) -> Result<bool, PlatformError> {
        match result {
            Ok(()) => Ok(true),
            Err(error) => {
                self.responded.store(false, Ordering::Release);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::{HashMap, VecDeque};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{ChannelHandle, ChatPlatform, InteractionResponder, PermissionSet, PlatformError};
    use crate::components::{EphemeralReply, MessageTemplate, ModalTemplate};

    #[derive(Default)]
    pub struct FakePlatform {
        channels: HashMap<String, PermissionSet>,
        send_failures: Mutex<VecDeque<PlatformError>>,
        sent: Mutex<Vec<(String, MessageTemplate)>>,
    }

    impl FakePlatform {
        pub fn with_channel(mut self, channel_id: &str, permissions: PermissionSet) -> Self {
            self.channels.insert(channel_id.to_owned(), permissions);
            self
        }

        pub fn failing_send(self, error: PlatformError) -> Self {
            self.send_failures.try_lock().expect("unshared during setup").push_back(error);
            self
        }

        pub async fn sent(&self) -> Vec<(String, MessageTemplate)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatPlatform for FakePlatform {
        async fn fetch_channel(
            &self,
            channel_id: &str,
        ) -> Result<Option<ChannelHandle>, PlatformError> {
            Ok(self.channels.contains_key(channel_id).then(|| ChannelHandle {
                id: channel_id.to_owned(),
                name: Some(format!("channel-{channel_id}")),
            }))
        }

        async fn permissions_in(
            &self,
            channel: &ChannelHandle,
        ) -> Result<PermissionSet, PlatformError> {
            self.channels
                .get(&channel.id)
                .copied()
                .ok_or_else(|| PlatformError::Request(format!("unknown channel {}", channel.id)))
        }

        async fn send_message(
            &self,
            channel: &ChannelHandle,
            message: &MessageTemplate,
        ) -> Result<(), PlatformError> {
            if let Some(error) = self.send_failures.lock().await.pop_front() {
                return Err(error);
            }
            self.sent.lock().await.push((channel.id.clone(), message.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingResponder {
        fail_modal: bool,
        fail_reply: bool,
        modals: Mutex<Vec<ModalTemplate>>,
        replies: Mutex<Vec<EphemeralReply>>,
    }

    impl RecordingResponder {
        pub fn failing_modal() -> Self {
            Self { fail_modal: true, ..Self::default() }
        }

        pub fn failing_reply() -> Self {
            Self { fail_reply: true, ..Self::default() }
        }

        pub async fn modals(&self) -> Vec<ModalTemplate> {
            self.modals.lock().await.clone()
        }

        pub async fn replies(&self) -> Vec<EphemeralReply> {
            self.replies.lock().await.clone()
        }
    }

    #[async_trait]
    impl InteractionResponder for RecordingResponder {
        async fn show_modal(&self, modal: &ModalTemplate) -> Result<(), PlatformError> {
            if self.fail_modal {
                return Err(PlatformError::Interaction("modal rejected".to_owned()));
            }
            self.modals.lock().await.push(modal.clone());
            Ok(())
        }

        async fn reply_ephemeral(&self, reply: &EphemeralReply) -> Result<(), PlatformError> {
            if self.fail_reply {
                return Err(PlatformError::Interaction("reply rejected".to_owned()));
            }
            self.replies.lock().await.push(reply.clone());
            Ok(())
        }
    }
}
