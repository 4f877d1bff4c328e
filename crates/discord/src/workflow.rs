//! The leave-form workflow: post the entry button on ready, open the modal on
//! button press, and turn a modal submission into an announcement.

use async_trait::async_trait;
use chrono::Utc;
use leaveform_core::{AppConfig, LeaveRequest, RequiredPermission, WorkflowError};
use tracing::{debug, error, info, warn};

use crate::{
    components::{
        leave_announcement_card, leave_announcement_plain, leave_form_modal, leave_form_prompt,
        EphemeralReply, DATE_FIELD_ID, NAME_FIELD_ID, OPEN_LEAVE_FORM_ID, REASON_FIELD_ID,
        SUBMISSION_SUCCESS_NOTICE, SUBMIT_LEAVE_FORM_ID,
    },
    events::{
        EventContext, EventDispatcher, EventHandler, EventHandlerError, EventKind, GatewayEvent,
        HandlerResult, ModalSubmitEvent, RouteKey,
    },
    platform::{ChannelHandle, ChatPlatform, PermissionSet},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowChannels {
    pub form_channel_id: String,
    pub announce_channel_id: String,
}

impl From<&AppConfig> for WorkflowChannels {
    fn from(config: &AppConfig) -> Self {
        Self {
            form_channel_id: config.discord.form_channel_id.trim().to_owned(),
            announce_channel_id: config.discord.announce_channel_id.trim().to_owned(),
        }
    }
}

pub fn leave_form_dispatcher(channels: WorkflowChannels) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(StartupAnnouncer::new(channels.form_channel_id));
    dispatcher.register(FormPresenter);
    dispatcher.register(SubmissionHandler::new(channels.announce_channel_id));
    dispatcher
}

/// Resolves a channel and checks that the bot may post there.
async fn resolve_postable_channel(
    platform: &dyn ChatPlatform,
    channel_id: &str,
) -> Result<(ChannelHandle, PermissionSet), WorkflowError> {
    let channel = platform
        .fetch_channel(channel_id)
        .await
        .map_err(|error| error.into_workflow(channel_id))?
        .ok_or_else(|| WorkflowError::Configuration { channel_id: channel_id.to_owned() })?;

    let permissions = platform
        .permissions_in(&channel)
        .await
        .map_err(|error| error.into_workflow(channel_id))?;

    if !permissions.allows(RequiredPermission::SendMessages) {
        return Err(WorkflowError::Permission {
            channel_id: channel_id.to_owned(),
            permission: RequiredPermission::SendMessages,
        });
    }

    Ok((channel, permissions))
}

pub struct StartupAnnouncer {
    form_channel_id: String,
}

impl StartupAnnouncer {
    pub fn new(form_channel_id: impl Into<String>) -> Self {
        Self { form_channel_id: form_channel_id.into() }
    }

    pub async fn announce(
        &self,
        platform: &dyn ChatPlatform,
    ) -> Result<ChannelHandle, WorkflowError> {
        let (channel, _) = resolve_postable_channel(platform, &self.form_channel_id).await?;
        platform
            .send_message(&channel, &leave_form_prompt())
            .await
            .map_err(|error| error.into_workflow(&self.form_channel_id))?;
        Ok(channel)
    }
}

#[async_trait]
impl EventHandler for StartupAnnouncer {
    fn route(&self) -> RouteKey {
        RouteKey::event(EventKind::Ready)
    }

    async fn handle(
        &self,
        event: &GatewayEvent,
        platform: &dyn ChatPlatform,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::Ready(ready) = event else {
            return Ok(HandlerResult::Ignored);
        };

        let channel = self.announce(platform).await?;
        info!(
            event_name = "workflow.startup.button_posted",
            correlation_id = %ctx.correlation_id,
            bot_tag = %ready.bot_tag,
            channel_id = %channel.id,
            channel_name = channel.name.as_deref().unwrap_or("unknown"),
            "leave form button posted"
        );
        Ok(HandlerResult::Processed)
    }
}

pub struct FormPresenter;

#[async_trait]
impl EventHandler for FormPresenter {
    fn route(&self) -> RouteKey {
        RouteKey::control(EventKind::ButtonPressed, OPEN_LEAVE_FORM_ID)
    }

    async fn handle(
        &self,
        event: &GatewayEvent,
        _platform: &dyn ChatPlatform,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ButtonPressed(press) = event else {
            return Ok(HandlerResult::Ignored);
        };
        if press.custom_id != OPEN_LEAVE_FORM_ID {
            return Ok(HandlerResult::Ignored);
        }

        debug!(
            event_name = "workflow.form.requested",
            correlation_id = %ctx.correlation_id,
            user_id = %press.user_id.0,
            channel_id = %press.channel_id,
            "presenting leave form"
        );

        Ok(HandlerResult::ShowModal(leave_form_modal()))
    }
}

pub struct SubmissionHandler {
    announce_channel_id: String,
}

impl SubmissionHandler {
    pub fn new(announce_channel_id: impl Into<String>) -> Self {
        Self { announce_channel_id: announce_channel_id.into() }
    }

    pub async fn publish(
        &self,
        platform: &dyn ChatPlatform,
        request: &LeaveRequest,
    ) -> Result<ChannelHandle, WorkflowError> {
        let (channel, permissions) =
            resolve_postable_channel(platform, &self.announce_channel_id).await?;

        let message = if permissions.allows(RequiredPermission::EmbedLinks) {
            leave_announcement_card(request)
        } else {
            leave_announcement_plain(request)
        };

        platform
            .send_message(&channel, &message)
            .await
            .map_err(|error| error.into_workflow(&self.announce_channel_id))?;
        Ok(channel)
    }
}

fn leave_request(submission: &ModalSubmitEvent) -> LeaveRequest {
    LeaveRequest::from_fields(
        submission.user_id.clone(),
        submission.field(NAME_FIELD_ID),
        submission.field(DATE_FIELD_ID),
        submission.field(REASON_FIELD_ID),
        Utc::now(),
    )
}

#[async_trait]
impl EventHandler for SubmissionHandler {
    fn route(&self) -> RouteKey {
        RouteKey::control(EventKind::ModalSubmitted, SUBMIT_LEAVE_FORM_ID)
    }

    async fn handle(
        &self,
        event: &GatewayEvent,
        platform: &dyn ChatPlatform,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ModalSubmitted(submission) = event else {
            return Ok(HandlerResult::Ignored);
        };
        if submission.custom_id != SUBMIT_LEAVE_FORM_ID {
            return Ok(HandlerResult::Ignored);
        }

        let request = leave_request(submission);
        match self.publish(platform, &request).await {
            Ok(channel) => {
                info!(
                    event_name = "workflow.submission.announced",
                    correlation_id = %ctx.correlation_id,
                    user_id = %request.submitter_id.0,
                    channel_id = %channel.id,
                    channel_name = channel.name.as_deref().unwrap_or("unknown"),
                    "leave announcement posted"
                );
                Ok(HandlerResult::Reply(EphemeralReply::new(SUBMISSION_SUCCESS_NOTICE)))
            }
            Err(failure) => {
                match failure {
                    WorkflowError::Permission { .. } | WorkflowError::Configuration { .. } => warn!(
                        event_name = "workflow.submission.rejected",
                        correlation_id = %ctx.correlation_id,
                        user_id = %request.submitter_id.0,
                        error_kind = ?failure.kind(),
                        error = %failure,
                        "leave announcement could not be posted"
                    ),
                    _ => error!(
                        event_name = "workflow.submission.failed",
                        correlation_id = %ctx.correlation_id,
                        user_id = %request.submitter_id.0,
                        error_kind = ?failure.kind(),
                        error = %failure,
                        "leave announcement failed"
                    ),
                }
                Ok(HandlerResult::Reply(EphemeralReply::new(failure.user_notice())))
            }
        }
    }
}
