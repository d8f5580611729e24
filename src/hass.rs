use crate::types::Update;
use bytes::Bytes;
use failure::Error;
use log::{debug, error, info};
use serde_json::{json, Value};
use tokio::sync::mpsc::Receiver;

/// Talks to Home Assistant's REST API.
///
/// There is no websocket call to fire an event or set a state from outside
/// an integration, so everything goes over REST.
#[derive(Clone)]
pub struct HassClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl HassClient {
    pub fn new(host: &str, access_token: &str) -> HassClient {
        HassClient {
            base_url: format!("http://{}", host),
            access_token: access_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn authorization(&self) -> String {
        "Bearer ".to_string() + &self.access_token
    }

    pub async fn fire_event(&self, event_type: &str, data: &Value) -> Result<(), Error> {
        self.client
            .post(&format!("{}/api/events/{}", self.base_url, event_type))
            .header("Authorization", self.authorization())
            .json(data)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn set_state(
        &self,
        entity_id: &str,
        state: Option<usize>,
        attributes: &Value,
    ) -> Result<(), Error> {
        let state = match state {
            Some(count) => count.to_string(),
            None => "unknown".to_string(),
        };
        self.client
            .post(&format!("{}/api/states/{}", self.base_url, entity_id))
            .header("Authorization", self.authorization())
            .json(&json!({ "state": state, "attributes": attributes }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn camera_image(&self, camera_entity: &str) -> Result<Bytes, Error> {
        let image = self
            .client
            .get(&format!("{}/api/camera_proxy/{}", self.base_url, camera_entity))
            .header("Authorization", self.authorization())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(image)
    }
}

/// Forwards pipeline updates to Home Assistant until the channel closes.
pub async fn run(client: HassClient, extra_attributes: Value, mut rx: Receiver<Update>) {
    while let Some(update) = rx.recv().await {
        if let Err(e) = forward(&client, &extra_attributes, update).await {
            error!("Error publishing to Home Assistant: {}", e);
        }
    }
    info!("Update channel closed");
}

async fn forward(client: &HassClient, extra_attributes: &Value, update: Update) -> Result<(), Error> {
    match update {
        Update::Event { event_type, data } => {
            info!("Firing {} for plate {}", event_type, data["plate"]);
            client.fire_event(event_type, &data).await
        }
        Update::State {
            entity_id,
            state,
            mut attributes,
        } => {
            debug!("Setting {} to {:?}", entity_id, state);
            if let (Value::Object(attributes), Value::Object(extra)) =
                (&mut attributes, extra_attributes)
            {
                for (key, value) in extra {
                    attributes.insert(key.clone(), value.clone());
                }
            }
            client.set_state(&entity_id, state, &attributes).await
        }
    }
}
