use std::any::Any;

use tracing::error;

/// Logs panics through tracing. Serenity runs each event in its own task, so a
/// panicking handler takes down only that task and the gateway keeps running.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            event_name = "system.panic",
            location = %location,
            message = %payload_message(info.payload()),
            "uncaught panic; process continues"
        );
    }));
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
