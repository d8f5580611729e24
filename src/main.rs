mod alpr;
mod annotate;
mod camera;
mod config;
mod entity;
mod error;
mod hass;
mod pipeline;
mod types;
mod webhook;

use crate::alpr::AlprClient;
use crate::config::Config;
use crate::entity::ObservableEntity;
use crate::hass::HassClient;
use crate::pipeline::DetectionPipeline;
use env_logger::Env;
use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::channel;

#[macro_use]
extern crate failure;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting alpr-handler");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    let client = match AlprClient::new(config.server.clone(), &config.headers) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid ALPR_HEADERS: {}", e);
            return;
        }
    };
    let hass = HassClient::new(&config.hass_host, &config.access_token);
    let scan_interval = config.scan_interval;
    let listen_port = config.listen_port;

    let (tx, rx) = channel(8);
    let pipeline = Arc::new(DetectionPipeline::new(config, client, tx));
    info!(
        "Processing {} as {}",
        pipeline.camera_entity(),
        pipeline.entity_id()
    );
    let extra_attributes = json!({
        "unit_of_measurement": pipeline.unit_of_measurement(),
        "friendly_name": pipeline.name(),
    });

    let hass_task = tokio::spawn(hass::run(hass.clone(), extra_attributes, rx));
    let webhook_task = tokio::spawn(webhook::run(pipeline.clone(), listen_port));
    let camera_task = if scan_interval.as_secs() > 0 {
        Some(tokio::spawn(camera::run(hass, pipeline, scan_interval)))
    } else {
        info!("SCAN_INTERVAL is 0, only processing images posted to the webhook");
        None
    };
    let camera_task = async move {
        match camera_task {
            Some(task) => task.await,
            None => futures::future::pending().await,
        }
    };

    tokio::select! {
        result = hass_task => {
            if let Err(e) = result {
                error!("Home Assistant task failed: {}", e);
            }
        }
        result = webhook_task => {
            if let Err(e) = result {
                error!("Webhook task failed: {}", e);
            }
        }
        result = camera_task => {
            if let Err(e) = result {
                error!("Camera task failed: {}", e);
            }
        }
    }
    info!("Exiting main");
}
