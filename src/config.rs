use failure::Error;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: Url,
    pub camera_entity: String,
    pub name: String,
    pub unique_id: Option<String>,
    pub save_file_folder: Option<PathBuf>,
    pub save_timestamped_file: bool,
    pub always_save_latest_file: bool,
    pub watched_plates: Option<Vec<String>>,
    pub headers: Vec<(String, String)>,
    pub hass_host: String,
    pub access_token: String,
    pub scan_interval: Duration,
    pub listen_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| match get(key) {
            Some(v) => parse_bool(&v).ok_or_else(|| format_err!("Invalid boolean {} for {}", v, key)),
            None => Ok(false),
        };

        let server = get("ALPR_SERVER").ok_or_else(|| format_err!("ALPR_SERVER is required"))?;
        let server =
            Url::parse(&server).map_err(|e| format_err!("Invalid ALPR_SERVER {}: {}", server, e))?;
        let camera_entity =
            get("CAMERA_ENTITY").ok_or_else(|| format_err!("CAMERA_ENTITY is required"))?;
        let name = match get("ALPR_NAME") {
            Some(name) => name,
            None => {
                let object_id = camera_entity
                    .split_once('.')
                    .map(|(_, object_id)| object_id)
                    .ok_or_else(|| format_err!("Invalid camera entity id {}", camera_entity))?;
                format!("codeproject_ai_alpr_{}", object_id)
            }
        };

        let save_file_folder = match get("SAVE_FILE_FOLDER") {
            Some(folder) => {
                let path = PathBuf::from(folder);
                if !path.is_dir() {
                    return Err(format_err!("SAVE_FILE_FOLDER {:?} is not a directory", path));
                }
                Some(path)
            }
            None => None,
        };

        let watched_plates = get("WATCHED_PLATES").map(|plates| {
            plates
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let headers = match get("ALPR_HEADERS") {
            Some(headers) => parse_headers(&headers)?,
            None => vec![],
        };

        let scan_interval = match get("SCAN_INTERVAL") {
            Some(s) => Duration::from_secs(
                s.trim()
                    .parse()
                    .map_err(|_| format_err!("Invalid SCAN_INTERVAL {}", s))?,
            ),
            None => Duration::from_secs(10),
        };
        let listen_port = match get("LISTEN_PORT") {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| format_err!("Invalid LISTEN_PORT {}", p))?,
            None => 8402,
        };

        Ok(Config {
            server,
            camera_entity,
            name,
            unique_id: get("ALPR_UNIQUE_ID"),
            save_file_folder,
            save_timestamped_file: flag("SAVE_TIMESTAMPED_FILE")?,
            always_save_latest_file: flag("ALWAYS_SAVE_LATEST_FILE")?,
            watched_plates,
            headers,
            hass_host: get("HOST").unwrap_or_else(|| "localhost:8123".to_string()),
            access_token: get("ACCESS_TOKEN")
                .ok_or_else(|| format_err!("ACCESS_TOKEN environment variable unset"))?,
            scan_interval,
            listen_port,
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" => Some(true),
        "0" | "false" | "no" | "off" | "disable" => Some(false),
        _ => None,
    }
}

/// Parses `Name: value; Other: value` into header pairs.
fn parse_headers(s: &str) -> Result<Vec<(String, String)>, Error> {
    s.split(';')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .ok_or_else(|| format_err!("Invalid header {}", h))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
