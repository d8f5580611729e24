use crate::alpr::AlprClient;
use crate::annotate;
use crate::config::Config;
use crate::entity::{entity_id_for, ObservableEntity, Observation};
use crate::error::PipelineError;
use crate::types::{InferenceResult, Update, EVENT_VEHICLE_DETECTED};
use bytes::Bytes;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::Sender;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const IMAGE_EXTENSION: &str = "png";

/// Runs camera frames through the ALPR server and keeps the resulting
/// entity state. One instance backs one Home Assistant entity.
pub struct DetectionPipeline {
    config: Config,
    entity_id: String,
    client: AlprClient,
    tx: Sender<Update>,
    observation: Mutex<Observation>,
    running: tokio::sync::Mutex<()>,
}

impl DetectionPipeline {
    pub fn new(config: Config, client: AlprClient, tx: Sender<Update>) -> DetectionPipeline {
        DetectionPipeline {
            entity_id: entity_id_for(&config.name),
            config,
            client,
            tx,
            observation: Mutex::new(Observation::default()),
            running: tokio::sync::Mutex::new(()),
        }
    }

    fn observation(&self) -> MutexGuard<'_, Observation> {
        self.observation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Processes one frame. Returns false if another frame was still being
    /// processed, in which case this one is dropped.
    pub async fn process(&self, image: Bytes) -> bool {
        let _running = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("{}: still processing previous image, skipping", self.entity_id);
                return false;
            }
        };

        self.observation().begin_run();

        let decoded = match annotate::decode(&image) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("{}: {}", self.entity_id, e);
                self.publish_state().await;
                return true;
            }
        };
        debug!(
            "{}: decoded {}x{} image",
            self.entity_id,
            decoded.width(),
            decoded.height()
        );

        let result = match self.infer(image).await {
            Ok(result) => result,
            Err(e) => {
                error!("codeproject_ai_alpr error: {}", e);
                InferenceResult::default()
            }
        };

        let (count, last_detection, vehicles, results) = {
            let mut observation = self.observation();
            observation.vehicles = result.predictions.iter().map(|r| r.normalize()).collect();
            observation.results = result.predictions;
            observation.inference_time = result.inference_ms;
            let count = observation.vehicles.len();
            observation.state = Some(count);
            if count > 0 {
                observation.last_detection =
                    Some(chrono::Local::now().format(DATETIME_FORMAT).to_string());
            }
            (
                count,
                observation.last_detection.clone(),
                observation.vehicles.clone(),
                observation.results.clone(),
            )
        };

        for vehicle in &vehicles {
            self.send(Update::Event {
                event_type: EVENT_VEHICLE_DETECTED,
                data: vehicle.event_data(&self.entity_id),
            })
            .await;
        }

        if let Some(folder) = &self.config.save_file_folder {
            if count > 0 || self.config.always_save_latest_file {
                let canvas = annotate::annotate(&decoded, &results);
                // A run without detections must not touch the previous
                // detection's timestamped file.
                let timestamp = if count > 0 {
                    last_detection.as_deref()
                } else {
                    None
                };
                self.save_image(folder, &canvas, timestamp);
            }
        }

        self.publish_state().await;
        true
    }

    async fn infer(&self, image: Bytes) -> Result<InferenceResult, PipelineError> {
        let result = self.client.recognize(image).await?;
        info!(
            "{}: {} plate(s) in {:?} ms",
            self.entity_id,
            result.predictions.len(),
            result.inference_ms
        );
        Ok(result)
    }

    fn save_image(&self, folder: &Path, canvas: &image::RgbImage, timestamp: Option<&str>) {
        let latest = folder.join(format!("{}_latest.{}", self.config.name, IMAGE_EXTENSION));
        if let Err(e) = canvas.save(&latest) {
            warn!("Error saving image to {:?}: {:?}", latest, e);
        }

        if self.config.save_timestamped_file {
            if let Some(timestamp) = timestamp {
                let path = folder.join(format!(
                    "{}_{}.{}",
                    self.config.name, timestamp, IMAGE_EXTENSION
                ));
                match canvas.save(&path) {
                    Ok(_) => info!("codeproject_ai_alpr saved file {:?}", path),
                    Err(e) => warn!("Error saving image to {:?}: {:?}", path, e),
                }
            }
        }
    }

    async fn publish_state(&self) {
        let update = Update::State {
            entity_id: self.entity_id.clone(),
            state: self.state(),
            attributes: Value::Object(self.attributes()),
        };
        self.send(update).await;
    }

    async fn send(&self, update: Update) {
        if let Err(e) = self.tx.send(update).await {
            error!("Error queueing update for Home Assistant: {}", e);
        }
    }
}

impl ObservableEntity for DetectionPipeline {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn unique_id(&self) -> Option<&str> {
        self.config.unique_id.as_deref()
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn camera_entity(&self) -> &str {
        &self.config.camera_entity
    }

    fn state(&self) -> Option<usize> {
        self.observation().state
    }

    fn attributes(&self) -> Map<String, Value> {
        self.observation().attributes(&self.config)
    }
}
