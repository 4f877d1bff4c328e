use leaveform_core::config::AppConfig;
use leaveform_discord::{
    gateway::GatewayRunner,
    workflow::{leave_form_dispatcher, WorkflowChannels},
};
use secrecy::ExposeSecret;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub gateway: GatewayRunner,
}

/// Wires an already validated config into the gateway runner. Loading and
/// validation happen before logging is installed, so they stay in `run`.
pub fn bootstrap(config: AppConfig) -> Application {
    let channels = WorkflowChannels::from(&config);
    info!(
        event_name = "system.bootstrap.workflow_configured",
        correlation_id = "bootstrap",
        form_channel_id = %channels.form_channel_id,
        announce_channel_id = %channels.announce_channel_id,
        "leave form workflow configured"
    );

    let dispatcher = leave_form_dispatcher(channels);
    let gateway = GatewayRunner::new(config.discord.token.expose_secret(), dispatcher);

    Application { config, gateway }
}
