//! 'main' for the Tapegauge omnibus process

use anyhow::Result;
use caryatid_process::Process;
use config::{Config, Environment, File};
use std::sync::Arc;
use tapegauge_common::messages::Message;
use tracing::info;

// External modules
use tapegauge_module_camera_capture::CameraCapture;
use tapegauge_module_inflator_control::InflatorControl;
use tapegauge_module_notifier::Notifier;
use tapegauge_module_settings_store::SettingsStore;
use tapegauge_module_width_measurer::WidthMeasurer;
use tapegauge_module_width_monitor::WidthMonitor;

use caryatid_module_clock::Clock;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Standard main
#[tokio::main]
pub async fn main() -> Result<()> {
    // Standard logging using RUST_LOG for log levels default to INFO for events only
    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    Registry::default().with(fmt_layer).init();

    info!("Tapegauge omnibus process");

    // Read the config
    let config = Arc::new(
        Config::builder()
            .add_source(File::with_name("omnibus"))
            .add_source(Environment::with_prefix("TAPEGAUGE"))
            .build()
            .unwrap(),
    );

    // Create the process
    let mut process = Process::<Message>::create(config).await;

    // Register modules
    SettingsStore::register(&mut process);
    CameraCapture::register(&mut process);
    WidthMeasurer::register(&mut process);
    WidthMonitor::register(&mut process);
    InflatorControl::register(&mut process);
    Notifier::register(&mut process);

    Clock::<Message>::register(&mut process);

    // Run it
    process.run().await?;

    // Bye!
    info!("Exiting");

    Ok(())
}
