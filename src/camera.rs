use crate::entity::ObservableEntity;
use crate::hass::HassClient;
use crate::pipeline::DetectionPipeline;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Polls the camera snapshot through Home Assistant, like the
/// `image_processing` component's scan interval does.
pub async fn run(client: HassClient, pipeline: Arc<DetectionPipeline>, interval: Duration) {
    info!(
        "Polling {} every {:?}",
        pipeline.camera_entity(),
        interval
    );
    loop {
        poll_once(&client, &pipeline).await;
        sleep(interval).await;
    }
}

pub async fn poll_once(client: &HassClient, pipeline: &DetectionPipeline) {
    match client.camera_image(pipeline.camera_entity()).await {
        Ok(image) => {
            debug!("Got {} bytes from {}", image.len(), pipeline.camera_entity());
            pipeline.process(image).await;
        }
        Err(e) => error!("Error fetching image from {}: {}", pipeline.camera_entity(), e),
    }
}
