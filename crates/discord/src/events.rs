use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use leaveform_core::{UserId, WorkflowError};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    components::{EphemeralReply, ModalTemplate},
    platform::{ChatPlatform, InteractionResponder, ReplyGuard},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready(ReadyEvent),
    ButtonPressed(ButtonPressEvent),
    ModalSubmitted(ModalSubmitEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::ButtonPressed(_) => EventKind::ButtonPressed,
            Self::ModalSubmitted(_) => EventKind::ModalSubmitted,
            Self::Unsupported { .. } => EventKind::Unsupported,
        }
    }

    pub fn route_key(&self) -> RouteKey {
        match self {
            Self::ButtonPressed(event) => RouteKey::control(EventKind::ButtonPressed, &event.custom_id),
            Self::ModalSubmitted(event) => {
                RouteKey::control(EventKind::ModalSubmitted, &event.custom_id)
            }
            Self::Ready(_) | Self::Unsupported { .. } => RouteKey::event(self.kind()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    ButtonPressed,
    ModalSubmitted,
    Unsupported,
}

/// Dispatch table key: the event kind plus, for interactions, the control id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub kind: EventKind,
    pub custom_id: Option<String>,
}

impl RouteKey {
    pub fn event(kind: EventKind) -> Self {
        Self { kind, custom_id: None }
    }

    pub fn control(kind: EventKind, custom_id: impl Into<String>) -> Self {
        Self { kind, custom_id: Some(custom_id.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyEvent {
    pub bot_tag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub interaction_id: String,
    pub custom_id: String,
    pub user_id: UserId,
    pub channel_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalSubmitEvent {
    pub interaction_id: String,
    pub custom_id: String,
    pub user_id: UserId,
    pub fields: BTreeMap<String, String>,
}

impl ModalSubmitEvent {
    pub fn field(&self, field_id: &str) -> Option<&str> {
        self.fields.get(field_id).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    ShowModal(ModalTemplate),
    Reply(EphemeralReply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl DispatchError {
    pub fn user_notice(&self) -> &'static str {
        match self {
            Self::Handler(EventHandlerError::Workflow(error)) => error.user_notice(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn route(&self) -> RouteKey;
    async fn handle(
        &self,
        event: &GatewayEvent,
        platform: &dyn ChatPlatform,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<RouteKey, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.route(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &GatewayEvent,
        platform: &dyn ChatPlatform,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.route_key()) else {
            debug!(
                event_name = "ingress.discord.unrouted",
                correlation_id = %ctx.correlation_id,
                event_kind = ?event.kind(),
                "no handler registered for event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, platform, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    NoticeSent,
    AlreadyResponded,
    Failed,
    Nothing,
}

/// Sends a handler's interaction response through the reply guard.
pub async fn deliver<R>(
    guard: &ReplyGuard<R>,
    result: HandlerResult,
    ctx: &EventContext,
) -> DeliveryOutcome
where
    R: InteractionResponder,
{
    match result {
        HandlerResult::ShowModal(modal) => match guard.show_modal(&modal).await {
            Ok(true) => DeliveryOutcome::Delivered,
            Ok(false) => DeliveryOutcome::AlreadyResponded,
            Err(platform_error) => {
                let failure = WorkflowError::Presentation(platform_error.to_string());
                error!(
                    event_name = "workflow.form.presentation_failed",
                    correlation_id = %ctx.correlation_id,
                    modal_id = %modal.custom_id,
                    error = %failure,
                    "failed to present leave form"
                );
                notify_failure(guard, failure.user_notice(), ctx).await
            }
        },
        HandlerResult::Reply(reply) => match guard.reply_once(&reply).await {
            Ok(true) => DeliveryOutcome::Delivered,
            Ok(false) => {
                warn!(
                    event_name = "workflow.reply.suppressed",
                    correlation_id = %ctx.correlation_id,
                    "interaction already answered; dropping reply"
                );
                DeliveryOutcome::AlreadyResponded
            }
            Err(platform_error) => {
                error!(
                    event_name = "workflow.reply.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %platform_error,
                    "failed to send private reply"
                );
                DeliveryOutcome::Failed
            }
        },
        HandlerResult::Processed | HandlerResult::Ignored => DeliveryOutcome::Nothing,
    }
}

/// Sends a private error notice unless the interaction already has a response.
pub async fn notify_failure<R>(
    guard: &ReplyGuard<R>,
    notice: &str,
    ctx: &EventContext,
) -> DeliveryOutcome
where
    R: InteractionResponder,
{
    match guard.reply_once(&EphemeralReply::new(notice)).await {
        Ok(true) => DeliveryOutcome::NoticeSent,
        Ok(false) => DeliveryOutcome::AlreadyResponded,
        Err(platform_error) => {
            error!(
                event_name = "workflow.notice.failed",
                correlation_id = %ctx.correlation_id,
                error = %platform_error,
                "failed to send private error notice"
            );
            DeliveryOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use leaveform_core::{UserId, WorkflowError};

    use super::{
        deliver, notify_failure, ButtonPressEvent, DeliveryOutcome, EventContext, EventDispatcher,
        EventHandler, EventHandlerError, EventKind, GatewayEvent, HandlerResult, ModalSubmitEvent,
        RouteKey,
    };
    use crate::components::{leave_form_modal, EphemeralReply};
    use crate::platform::fakes::{FakePlatform, RecordingResponder};
    use crate::platform::{ChatPlatform, ReplyGuard};

    struct EchoHandler;

    #[async_trait]
    impl EventHandler for EchoHandler {
        fn route(&self) -> RouteKey {
            RouteKey::control(EventKind::ButtonPressed, "echo")
        }

        async fn handle(
            &self,
            _event: &GatewayEvent,
            _platform: &dyn ChatPlatform,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            Ok(HandlerResult::Reply(EphemeralReply::new("echo")))
        }
    }

    fn button(custom_id: &str) -> GatewayEvent {
        GatewayEvent::ButtonPressed(ButtonPressEvent {
            interaction_id: "i-1".to_owned(),
            custom_id: custom_id.to_owned(),
            user_id: UserId("7".to_owned()),
            channel_id: "100".to_owned(),
        })
    }

    #[tokio::test]
    async fn dispatcher_routes_by_kind_and_control_id() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EchoHandler);

        let result = dispatcher
            .dispatch(&button("echo"), &FakePlatform::default(), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Reply(EphemeralReply::new("echo")));
    }

    #[tokio::test]
    async fn dispatcher_ignores_unknown_control_ids() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EchoHandler);

        let result = dispatcher
            .dispatch(&button("other"), &FakePlatform::default(), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn dispatcher_does_not_cross_event_kinds() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EchoHandler);
        let submission = GatewayEvent::ModalSubmitted(ModalSubmitEvent {
            interaction_id: "i-2".to_owned(),
            custom_id: "echo".to_owned(),
            user_id: UserId("7".to_owned()),
            fields: BTreeMap::new(),
        });

        let result = dispatcher
            .dispatch(&submission, &FakePlatform::default(), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn failed_modal_delivery_sends_one_notice() {
        let guard = ReplyGuard::new(RecordingResponder::failing_modal());

        let outcome = deliver(
            &guard,
            HandlerResult::ShowModal(leave_form_modal()),
            &EventContext::default(),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::NoticeSent);
        let replies = guard.responder().replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].content,
            WorkflowError::Presentation(String::new()).user_notice()
        );
    }

    #[tokio::test]
    async fn notices_are_sent_at_most_once_per_interaction() {
        let guard = ReplyGuard::new(RecordingResponder::default());
        let ctx = EventContext::default();

        let first = notify_failure(&guard, "first failure", &ctx).await;
        let second = notify_failure(&guard, "second failure", &ctx).await;
        let third =
            deliver(&guard, HandlerResult::Reply(EphemeralReply::new("late")), &ctx).await;

        assert_eq!(first, DeliveryOutcome::NoticeSent);
        assert_eq!(second, DeliveryOutcome::AlreadyResponded);
        assert_eq!(third, DeliveryOutcome::AlreadyResponded);
        assert_eq!(guard.responder().replies().await.len(), 1);
    }

    #[tokio::test]
    async fn ignored_results_send_nothing() {
        let guard = ReplyGuard::new(RecordingResponder::default());

        let outcome = deliver(&guard, HandlerResult::Ignored, &EventContext::default()).await;

        assert_eq!(outcome, DeliveryOutcome::Nothing);
        assert!(!guard.has_responded());
    }
}
