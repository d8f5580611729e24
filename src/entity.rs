use crate::config::Config;
use crate::types::{NormalizedDetection, RawDetection};
use serde_json::{json, Map, Value};

pub const DOMAIN: &str = "image_processing";

/// The accessors Home Assistant reads off an image processing entity.
pub trait ObservableEntity {
    fn name(&self) -> &str;
    fn unique_id(&self) -> Option<&str>;
    fn entity_id(&self) -> &str;
    fn camera_entity(&self) -> &str;
    fn state(&self) -> Option<usize>;
    fn attributes(&self) -> Map<String, Value>;

    fn unit_of_measurement(&self) -> &str {
        "plate"
    }

    /// State and attributes in the shape Home Assistant's REST API expects.
    fn snapshot(&self) -> Value {
        let mut attributes = self.attributes();
        attributes.insert("unit_of_measurement".into(), json!(self.unit_of_measurement()));
        attributes.insert("friendly_name".into(), json!(self.name()));
        json!({
            "entity_id": self.entity_id(),
            "state": match self.state() {
                Some(count) => count.to_string(),
                None => "unknown".to_string(),
            },
            "attributes": attributes,
        })
    }
}

pub fn entity_id_for(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.{}", DOMAIN, slug)
}

/// What the entity remembers between runs.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub state: Option<usize>,
    pub results: Vec<RawDetection>,
    pub vehicles: Vec<NormalizedDetection>,
    pub last_detection: Option<String>,
    pub inference_time: Option<f64>,
}

impl Observation {
    /// Forgets the previous run's result. `last_detection` is kept.
    pub fn begin_run(&mut self) {
        self.state = None;
        self.results.clear();
        self.vehicles.clear();
        self.inference_time = None;
    }

    pub fn detected_plates(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.plate.as_str()).collect()
    }

    pub fn attributes(&self, config: &Config) -> Map<String, Value> {
        let mut attr = Map::new();
        attr.insert("last_detection".into(), json!(self.last_detection));
        attr.insert(
            "vehicles".into(),
            Value::Array(self.vehicles.iter().map(NormalizedDetection::to_json).collect()),
        );
        let detected_plates = self.detected_plates();
        attr.insert("detected_plates".into(), json!(detected_plates));
        if let Some(watched) = &config.watched_plates {
            let presence: Map<String, Value> = watched
                .iter()
                .map(|plate| (plate.clone(), json!(detected_plates.contains(&plate.as_str()))))
                .collect();
            attr.insert("watched_plates".into(), Value::Object(presence));
        }
        attr.insert("server".into(), json!(config.server.as_str()));
        attr.insert("inference_time".into(), json!(self.inference_time));
        if let Some(folder) = &config.save_file_folder {
            attr.insert("save_file_folder".into(), json!(folder.display().to_string()));
            attr.insert(
                "save_timestamped_file".into(),
                json!(config.save_timestamped_file),
            );
            attr.insert(
                "always_save_latest_file".into(),
                json!(config.always_save_latest_file),
            );
        }
        attr
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use url::Url;

    pub(crate) fn config() -> Config {
        Config {
            server: Url::parse("http://localhost:32168/v1/vision/alpr").unwrap(),
            camera_entity: "camera.driveway".to_string(),
            name: "codeproject_ai_alpr_driveway".to_string(),
            unique_id: None,
            save_file_folder: None,
            save_timestamped_file: false,
            always_save_latest_file: false,
            watched_plates: None,
            headers: vec![],
            hass_host: "localhost:8123".to_string(),
            access_token: "secret".to_string(),
            scan_interval: Duration::from_secs(10),
            listen_port: 8402,
        }
    }

    fn observation(plates: &[&str]) -> Observation {
        let results: Vec<RawDetection> = plates
            .iter()
            .map(|p| RawDetection {
                plate: p.to_string(),
                confidence: 0.9,
                x_min: 0.0,
                y_min: 0.0,
                x_max: 10.0,
                y_max: 10.0,
            })
            .collect();
        Observation {
            state: Some(results.len()),
            vehicles: results.iter().map(RawDetection::normalize).collect(),
            results,
            last_detection: Some("2024-01-02_03-04-05".to_string()),
            inference_time: Some(42.0),
        }
    }

    #[test]
    fn entity_id_is_slugged_name() {
        assert_eq!(entity_id_for("Front Gate"), "image_processing.front_gate");
        assert_eq!(
            entity_id_for("codeproject_ai_alpr_driveway"),
            "image_processing.codeproject_ai_alpr_driveway"
        );
    }

    #[test]
    fn watched_plates_presence() {
        let mut config = config();
        config.watched_plates = Some(vec!["ABC123".to_string(), "XYZ999".to_string()]);
        let attr = observation(&["ABC123", "QQQ111"]).attributes(&config);
        assert_eq!(attr["watched_plates"], json!({"ABC123": true, "XYZ999": false}));
        assert_eq!(attr["detected_plates"], json!(["ABC123", "QQQ111"]));
    }

    #[test]
    fn watched_plates_do_not_go_stale() {
        let mut config = config();
        config.watched_plates = Some(vec!["ABC123".to_string()]);
        let mut observation = observation(&["ABC123"]);
        assert_eq!(observation.attributes(&config)["watched_plates"]["ABC123"], true);
        observation.begin_run();
        assert_eq!(observation.attributes(&config)["watched_plates"]["ABC123"], false);
    }

    #[test]
    fn optional_attributes() {
        let attr = observation(&["ABC123"]).attributes(&config());
        assert!(!attr.contains_key("watched_plates"));
        assert!(!attr.contains_key("save_file_folder"));
        assert_eq!(attr["server"], "http://localhost:32168/v1/vision/alpr");
        assert_eq!(attr["inference_time"], 42.0);
        assert_eq!(attr["last_detection"], "2024-01-02_03-04-05");
        assert_eq!(attr["vehicles"][0]["plate"], "ABC123");
        assert_eq!(attr["vehicles"][0]["box_x_centre"], 5.0);

        let mut config = config();
        config.save_file_folder = Some(PathBuf::from("/media/alpr"));
        config.save_timestamped_file = true;
        let attr = observation(&[]).attributes(&config);
        assert_eq!(attr["save_file_folder"], "/media/alpr");
        assert_eq!(attr["save_timestamped_file"], true);
        assert_eq!(attr["always_save_latest_file"], false);
        assert_eq!(attr["vehicles"], json!([]));
    }

    #[test]
    fn begin_run_keeps_last_detection() {
        let mut observation = observation(&["ABC123"]);
        observation.begin_run();
        assert_eq!(observation.state, None);
        assert!(observation.vehicles.is_empty());
        assert_eq!(observation.inference_time, None);
        assert_eq!(observation.last_detection.as_deref(), Some("2024-01-02_03-04-05"));
    }
}
