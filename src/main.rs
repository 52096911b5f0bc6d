use anyhow::Result;

use ara_webhook_relay::config::Settings;
use ara_webhook_relay::session::{SessionController, SessionEnd};
use ara_webhook_relay::shutdown::{listen_for_signals, ShutdownSignal};
use ara_webhook_relay::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Keep the guard alive so spans are flushed on exit
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service_url = %settings.service.url,
        forward_to = %settings.forward.url,
        "Configuration loaded"
    );

    let controller = match SessionController::from_settings(&settings) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "Cannot start relay");
            return Err(e.into());
        }
    };

    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    let summary = match controller.run(shutdown).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), fatal = e.is_fatal(), "Relay session failed");
            return Err(e.into());
        }
    };

    if summary.reason == SessionEnd::StreamExhausted {
        tracing::warn!("Relay stopped because the event stream could not be re-established");
    }

    tracing::info!(
        delivered = summary.delivered,
        failed = summary.failed,
        "Relay shutdown complete"
    );
    Ok(())
}
