// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth profile daemon.
//!
//! Listens for Object Push and Hands-Free connections through BlueZ and
//! prints every system message as a JSON line on stdout.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rfcomm_profiles::config::Config;
use rfcomm_profiles::transport::BluezTransport;
use rfcomm_profiles::{Broadcaster, Link, ProfileLinks, ProfileService};

fn bluez_link() -> Link {
    let (events, rx) = mpsc::unbounded_channel();
    Link::new(Arc::new(BluezTransport::new(events)), rx)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("rfcomm_profiles=info".parse()?)
                .add_directive("btprofiled=info".parse()?),
        )
        .init();

    info!("Starting btprofiled v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded");

    let session = bluer::Session::new()
        .await
        .context("Failed to open a BlueZ session")?;
    let adapter = match &config.bluetooth.adapter {
        Some(name) => session.adapter(name)?,
        None => session.default_adapter().await?,
    };
    if !adapter.is_powered().await? {
        info!("Powering on Bluetooth adapter {}...", adapter.name());
        adapter.set_powered(true).await?;
    }
    info!(
        "Using Bluetooth adapter {} ({})",
        adapter.name(),
        adapter.address().await?
    );

    let opp_settings = config.opp_settings();
    std::fs::create_dir_all(&opp_settings.download_dir).with_context(|| {
        format!(
            "Failed to create download directory {}",
            opp_settings.download_dir.display()
        )
    })?;

    let links = ProfileLinks {
        opp: bluez_link(),
        hfp: bluez_link(),
        sco: bluez_link(),
    };
    let (broadcaster, mut messages) = Broadcaster::new();
    let (mut service, handle) =
        ProfileService::new(links, broadcaster, opp_settings, config.hfp_settings());
    service.start_listening()?;
    let service_task = tokio::spawn(service.run());

    info!(
        "Ready. OPP on channel {}, HFP on channel {}",
        config.opp.channel, config.hfp.channel
    );

    loop {
        tokio::select! {
            Some(message) = messages.recv() => match message.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to encode [{}]: {}", message.name(), e),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown() {
        error!("Failed to stop the profile service: {}", e);
    }
    service_task.await?;
    info!("btprofiled stopped");
    Ok(())
}
