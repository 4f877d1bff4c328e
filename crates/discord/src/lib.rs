//! Discord Integration - gateway bot interface for the leave form
//!
//! This crate provides the Discord side of leaveform:
//! - **Gateway** (`gateway`) - serenity client, event bridge, REST-backed platform
//! - **Events** (`events`) - gateway event model, dispatch table, response delivery
//! - **Workflow** (`workflow`) - startup button, form presenter, submission handler
//! - **Components** (`components`) - typed builders for buttons, modals and embed cards
//! - **Platform** (`platform`) - narrow traits the workflow talks to, plus the reply guard
//!
//! # Getting Started
//!
//! 1. Create an application at https://discord.com/developers/applications
//! 2. Add a bot user and invite it with `Send Messages` and `Embed Links`
//! 3. Set env vars: `LEAVEFORM_DISCORD_TOKEN`, `LEAVEFORM_FORM_CHANNEL_ID`,
//!    `LEAVEFORM_ANNOUNCE_CHANNEL_ID`
//!
//! # Architecture
//!
//! ```text
//! Gateway Events → GatewayHandler → EventDispatcher → Workflow Handlers
//!                        ↓                                   ↓
//!                   ReplyGuard ← HandlerResult        ChatPlatform (send)
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - builds the serenity client and runs it until shutdown
//! - `EventDispatcher` - routes (event kind, control id) to a handler
//! - `MessageBuilder` - constructs announcement and prompt messages
//! - `ChatPlatform` - trait for channel lookup, permissions and posting

pub mod components;
pub mod events;
pub mod gateway;
pub mod platform;
pub mod workflow;
