use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use leaveform_core::{config::parse_snowflake, UserId};
use serenity::all::{
    ActionRowComponent, ButtonStyle, Cache, Channel, ChannelId, Client, ComponentInteraction,
    ComponentInteractionDataKind, Context, CreateActionRow, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateModal, GatewayIntents, GuildChannel,
    GuildId, Http, InputTextStyle, Interaction, Member, ModalInteraction, PartialGuild,
    Permissions, Ready, Timestamp,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    components::{
        ButtonElement, EmbedCard, EphemeralReply, MessageTemplate, ModalTemplate,
        TextInputStyle,
    },
    events::{
        deliver, notify_failure, ButtonPressEvent, EventContext, EventDispatcher, GatewayEvent,
        ModalSubmitEvent, ReadyEvent,
    },
    platform::{
        ChannelHandle, ChatPlatform, InteractionResponder, PermissionSet, PlatformError,
        ReplyGuard,
    },
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("discord client could not be built: {0}")]
    Build(#[source] serenity::Error),
    #[error("discord gateway stopped: {0}")]
    Run(#[source] serenity::Error),
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES
}

/// [`ChatPlatform`] backed by serenity's REST client and gateway cache.
///
/// Built per dispatch. Guild and member lookups go through the cache first and
/// fall back to REST, so permission checks work before the cache has the guild.
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    resolved: Mutex<HashMap<ChannelId, GuildChannel>>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache, resolved: Mutex::new(HashMap::new()) }
    }

    pub fn from_context(ctx: &Context) -> Self {
        Self::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache))
    }

    async fn guild_channel(&self, id: ChannelId) -> Result<GuildChannel, PlatformError> {
        if let Some(channel) = self.resolved.lock().await.get(&id) {
            return Ok(channel.clone());
        }

        let channel = id
            .to_channel((&self.cache, self.http.as_ref()))
            .await
            .map_err(classify)?
            .guild()
            .ok_or_else(|| PlatformError::Request(format!("`{id}` is not a guild channel")))?;
        self.resolved.lock().await.insert(id, channel.clone());
        Ok(channel)
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn fetch_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelHandle>, PlatformError> {
        let Some(id) = parse_snowflake(channel_id) else {
            return Ok(None);
        };

        match ChannelId::new(id).to_channel((&self.cache, self.http.as_ref())).await {
            Ok(Channel::Guild(channel)) => {
                let handle =
                    ChannelHandle { id: channel.id.to_string(), name: Some(channel.name.clone()) };
                self.resolved.lock().await.insert(channel.id, channel);
                Ok(Some(handle))
            }
            Ok(_) => Ok(None),
            Err(error) if status_code(&error) == Some(404) => Ok(None),
            Err(error) => Err(classify(error)),
        }
    }

    async fn permissions_in(
        &self,
        channel: &ChannelHandle,
    ) -> Result<PermissionSet, PlatformError> {
        let id = parse_snowflake(&channel.id)
            .ok_or_else(|| PlatformError::Request(format!("invalid channel id `{}`", channel.id)))?;
        let guild_channel = self.guild_channel(ChannelId::new(id)).await?;

        let bot_id = self.cache.current_user().id;
        let cache_http = (&self.cache, self.http.as_ref());
        let guild = guild_channel.guild_id.to_partial_guild(cache_http).await.map_err(classify)?;
        let member = guild_channel.guild_id.member(cache_http, bot_id).await.map_err(classify)?;

        Ok(effective_permissions(&guild, &guild_channel, &member))
    }

    async fn send_message(
        &self,
        channel: &ChannelHandle,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError> {
        let id = parse_snowflake(&channel.id)
            .ok_or_else(|| PlatformError::Request(format!("invalid channel id `{}`", channel.id)))?;

        ChannelId::new(id)
            .send_message(self.http.as_ref(), create_message(message))
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

fn effective_permissions(
    guild: &PartialGuild,
    channel: &GuildChannel,
    member: &Member,
) -> PermissionSet {
    let permissions = guild.user_permissions_in(channel, member);
    PermissionSet {
        send_messages: permissions.contains(Permissions::SEND_MESSAGES),
        embed_links: permissions.contains(Permissions::EMBED_LINKS),
    }
}

fn status_code(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(http_error) => {
            http_error.status_code().map(|status| status.as_u16())
        }
        _ => None,
    }
}

fn classify(error: serenity::Error) -> PlatformError {
    match status_code(&error) {
        Some(403) => PlatformError::Forbidden(error.to_string()),
        _ => PlatformError::Request(error.to_string()),
    }
}

fn create_message(template: &MessageTemplate) -> CreateMessage {
    let mut builder = CreateMessage::new().content(template.content.clone());

    if !template.embeds.is_empty() {
        builder = builder.embeds(template.embeds.iter().map(create_embed).collect());
    }

    if !template.action_rows.is_empty() {
        let rows = template
            .action_rows
            .iter()
            .map(|row| CreateActionRow::Buttons(row.buttons.iter().map(create_button).collect()))
            .collect();
        builder = builder.components(rows);
    }

    builder
}

fn create_embed(card: &EmbedCard) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(card.title.clone()).colour(card.colour);

    for field in &card.fields {
        embed = embed.field(field.name.clone(), field.value.clone(), field.inline);
    }
    if let Some(footer) = &card.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer.clone()));
    }
    if let Some(timestamp) =
        card.timestamp.and_then(|at| Timestamp::from_unix_timestamp(at.timestamp()).ok())
    {
        embed = embed.timestamp(timestamp);
    }

    embed
}

fn create_button(button: &ButtonElement) -> CreateButton {
    CreateButton::new(button.custom_id.clone())
        .label(button.label.clone())
        .style(ButtonStyle::Primary)
}

fn create_modal(template: &ModalTemplate) -> CreateModal {
    let rows = template
        .inputs
        .iter()
        .map(|input| {
            let style = match input.style {
                TextInputStyle::Short => InputTextStyle::Short,
                TextInputStyle::Paragraph => InputTextStyle::Paragraph,
            };
            let mut text = CreateInputText::new(style, input.label.clone(), input.custom_id.clone())
                .required(input.required);
            if let Some(max_length) = input.max_length {
                text = text.max_length(max_length);
            }
            CreateActionRow::InputText(text)
        })
        .collect();

    CreateModal::new(template.custom_id.clone(), template.title.clone()).components(rows)
}

pub enum InteractionHandle {
    Component(Box<ComponentInteraction>),
    Modal(Box<ModalInteraction>),
}

pub struct SerenityResponder {
    http: Arc<Http>,
    interaction: InteractionHandle,
}

impl SerenityResponder {
    pub fn new(http: Arc<Http>, interaction: InteractionHandle) -> Self {
        Self { http, interaction }
    }

    async fn respond(&self, response: CreateInteractionResponse) -> Result<(), PlatformError> {
        let result = match &self.interaction {
            InteractionHandle::Component(interaction) => {
                interaction.create_response(self.http.as_ref(), response).await
            }
            InteractionHandle::Modal(interaction) => {
                interaction.create_response(self.http.as_ref(), response).await
            }
        };
        result.map_err(|error| PlatformError::Interaction(error.to_string()))
    }
}

#[async_trait]
impl InteractionResponder for SerenityResponder {
    async fn show_modal(&self, modal: &ModalTemplate) -> Result<(), PlatformError> {
        self.respond(CreateInteractionResponse::Modal(create_modal(modal))).await
    }

    async fn reply_ephemeral(&self, reply: &EphemeralReply) -> Result<(), PlatformError> {
        let message =
            CreateInteractionResponseMessage::new().content(reply.content.clone()).ephemeral(true);
        self.respond(CreateInteractionResponse::Message(message)).await
    }
}

fn button_event(interaction: &ComponentInteraction) -> GatewayEvent {
    GatewayEvent::ButtonPressed(ButtonPressEvent {
        interaction_id: interaction.id.to_string(),
        custom_id: interaction.data.custom_id.clone(),
        user_id: UserId(interaction.user.id.to_string()),
        channel_id: interaction.channel_id.to_string(),
    })
}

fn modal_event(interaction: &ModalInteraction) -> GatewayEvent {
    let fields: BTreeMap<String, String> = interaction
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(input) => {
                Some((input.custom_id.clone(), input.value.clone().unwrap_or_default()))
            }
            _ => None,
        })
        .collect();

    GatewayEvent::ModalSubmitted(ModalSubmitEvent {
        interaction_id: interaction.id.to_string(),
        custom_id: interaction.data.custom_id.clone(),
        user_id: UserId(interaction.user.id.to_string()),
        fields,
    })
}

/// Bridges serenity's callbacks into the dispatch table. Every failure is logged
/// here and never bubbles back into the gateway.
pub struct GatewayHandler {
    dispatcher: EventDispatcher,
    announced: AtomicBool,
}

impl GatewayHandler {
    pub fn new(dispatcher: EventDispatcher) -> Self {
        Self { dispatcher, announced: AtomicBool::new(false) }
    }

    /// True only for the first caller. The cache is rebuilt after a full
    /// reconnect and fires again; the prompt is posted once per process.
    fn claim_announcement(&self) -> bool {
        !self.announced.swap(true, Ordering::AcqRel)
    }
}

#[async_trait]
impl serenity::all::EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            event_name = "ingress.discord.ready",
            bot_tag = %ready.user.tag(),
            session_id = %ready.session_id,
            guild_count = ready.guilds.len(),
            "discord gateway ready"
        );
    }

    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        if !self.claim_announcement() {
            debug!(event_name = "ingress.discord.ready_repeat", "skipping repeated cache ready");
            return;
        }

        let bot_tag = ctx.cache.current_user().tag();
        let event = GatewayEvent::Ready(ReadyEvent { bot_tag });
        let context = EventContext { correlation_id: format!("ready-shard-{}", ctx.shard_id.0) };
        debug!(
            event_name = "ingress.discord.cache_ready",
            correlation_id = %context.correlation_id,
            guild_count = guilds.len(),
            "gateway cache ready"
        );
        let platform = SerenityPlatform::from_context(&ctx);

        if let Err(error) = self.dispatcher.dispatch(&event, &platform, &context).await {
            error!(
                event_name = "workflow.startup.failed",
                correlation_id = %context.correlation_id,
                error = %error,
                "failed to post leave form button"
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let (event, handle) = match interaction {
            Interaction::Component(component) => {
                if !matches!(component.data.kind, ComponentInteractionDataKind::Button) {
                    return;
                }
                (button_event(&component), InteractionHandle::Component(Box::new(component)))
            }
            Interaction::Modal(modal) => {
                (modal_event(&modal), InteractionHandle::Modal(Box::new(modal)))
            }
            _ => return,
        };

        let context = EventContext { correlation_id: interaction_id(&event) };
        info!(
            event_name = "ingress.discord.interaction_received",
            correlation_id = %context.correlation_id,
            event_kind = ?event.kind(),
            custom_id = event.route_key().custom_id.as_deref().unwrap_or("none"),
            "received discord interaction"
        );

        let platform = SerenityPlatform::from_context(&ctx);
        let guard = ReplyGuard::new(SerenityResponder::new(Arc::clone(&ctx.http), handle));

        match self.dispatcher.dispatch(&event, &platform, &context).await {
            Ok(result) => {
                let outcome = deliver(&guard, result, &context).await;
                debug!(
                    event_name = "ingress.discord.interaction_handled",
                    correlation_id = %context.correlation_id,
                    outcome = ?outcome,
                    "interaction handled"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "ingress.discord.dispatch_failed",
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "interaction dispatch failed"
                );
                notify_failure(&guard, error.user_notice(), &context).await;
            }
        }
    }
}

fn interaction_id(event: &GatewayEvent) -> String {
    match event {
        GatewayEvent::ButtonPressed(press) => press.interaction_id.clone(),
        GatewayEvent::ModalSubmitted(submission) => submission.interaction_id.clone(),
        GatewayEvent::Ready(_) | GatewayEvent::Unsupported { .. } => {
            "unknown-correlation-id".to_owned()
        }
    }
}

pub struct GatewayRunner {
    token: String,
    dispatcher: EventDispatcher,
}

impl GatewayRunner {
    pub fn new(token: impl Into<String>, dispatcher: EventDispatcher) -> Self {
        Self { token: token.into(), dispatcher }
    }

    /// Runs the gateway until it stops on its own or `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send,
    {
        let handler = GatewayHandler::new(self.dispatcher);
        let mut client = Client::builder(&self.token, gateway_intents())
            .event_handler(handler)
            .await
            .map_err(GatewayError::Build)?;
        let shard_manager = Arc::clone(&client.shard_manager);

        info!(event_name = "system.gateway.connecting", "connecting to discord gateway");
        tokio::select! {
            result = client.start() => result.map_err(GatewayError::Run),
            () = shutdown => {
                info!(event_name = "system.gateway.stopping", "shutting down discord shards");
                shard_manager.shutdown_all().await;
                Ok(())
            }
        }
    }
}
