// REST API client - talks to the dedicated server's built-in HTTP API
// (RESTAPIEnabled=True) with Basic authentication.

use std::time::Duration;

use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("authentication failed, check api_username/api_password")]
    Unauthorized,

    #[error("server returned HTTP {0}")]
    Http(StatusCode),

    #[error("unexpected response shape: {0}")]
    UnexpectedBody(String),
}

/// One row of the players list. Server builds disagree on the exact fields,
/// so anything beyond the common ones is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "playerId", default)]
    pub player_id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub ping: f64,
    #[serde(default)]
    pub level: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct ControlClient {
    http: reqwest::Client,
    api_base: String,
    username: String,
    password: String,
}

impl ControlClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Client)?;

        Ok(ControlClient {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            username: config.api_username.clone(),
            password: config.api_password.clone(),
        })
    }

    /// Probes reachability without credentials. A 401 means the API is up
    /// and guarding itself; a 200 means it answered wide open. Both count as
    /// reachable.
    pub async fn test_connection(&self) -> Result<String, ApiError> {
        let url = format!("{}/v1/api/info", self.api_base);
        let response = self.http.get(&url).timeout(PROBE_TIMEOUT).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Ok("server is reachable and requires authentication".to_string())
            }
            StatusCode::OK => Ok(
                "server responded without authentication, check that the API is meant to be open"
                    .to_string(),
            ),
            status => Err(ApiError::Http(status)),
        }
    }

    /// Raw server info document, shown to the operator as-is.
    pub async fn info(&self) -> Result<Value, ApiError> {
        self.get("/v1/api/info").await
    }

    pub async fn players(&self) -> Result<Vec<PlayerEntry>, ApiError> {
        let body = self.get("/v1/api/players").await?;
        let list = unwrap_players(body)?;
        serde_json::from_value(Value::Array(list))
            .map_err(|e| ApiError::UnexpectedBody(e.to_string()))
    }

    pub async fn kick(&self, player_uid: &str) -> Result<(), ApiError> {
        self.post("/v1/api/kick", Some(json!({ "playeruid": player_uid })))
            .await
    }

    pub async fn ban(&self, player_uid: &str) -> Result<(), ApiError> {
        self.post("/v1/api/ban", Some(json!({ "playeruid": player_uid })))
            .await
    }

    pub async fn teleport(
        &self,
        player_uid: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), ApiError> {
        self.post(
            "/v1/api/teleport",
            Some(json!({ "playeruid": player_uid, "x": x, "y": y, "z": z })),
        )
        .await
    }

    pub async fn save(&self) -> Result<(), ApiError> {
        self.post("/v1/api/save", None).await
    }

    pub async fn announce(&self, message: &str) -> Result<(), ApiError> {
        self.post("/v1/api/announce", Some(json!({ "message": message })))
            .await
    }

    pub async fn shutdown(&self) -> Result<(), ApiError> {
        self.post("/v1/api/shutdown", None).await
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json::<Value>().await?),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status => Err(ApiError::Http(status)),
        }
    }

    /// POST to an action endpoint. These answer 200 with a plain `OK` body,
    /// so success is judged on the status alone.
    async fn post(&self, path: &str, body: Option<Value>) -> Result<(), ApiError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("POST {}", url);

        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.auth_header());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status => Err(ApiError::Http(status)),
        }
    }
}

/// The players list arrives either bare or wrapped; some server builds use
/// `players`, others `data`.
fn unwrap_players(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(list) => Ok(list),
        Value::Object(mut map) => {
            for key in ["players", "data"] {
                if let Some(Value::Array(list)) = map.remove(key) {
                    return Ok(list);
                }
            }
            Err(ApiError::UnexpectedBody(
                "no player list in response object".to_string(),
            ))
        }
        other => Err(ApiError::UnexpectedBody(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ControlClient {
        let config = AppConfig {
            api_base: "http://127.0.0.1:8212/".to_string(),
            api_username: "admin".to_string(),
            api_password: "hunter2".to_string(),
            ..AppConfig::default()
        };
        ControlClient::new(&config).unwrap()
    }

    #[test]
    fn auth_header_is_standard_basic() {
        assert_eq!(client().auth_header(), "Basic YWRtaW46aHVudGVyMg==");
    }

    #[test]
    fn base_url_loses_its_trailing_slash() {
        assert_eq!(client().api_base, "http://127.0.0.1:8212");
    }

    #[test]
    fn players_can_arrive_bare() {
        let list = unwrap_players(json!([{ "name": "Ash" }])).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn players_can_arrive_wrapped() {
        let list = unwrap_players(json!({ "players": [{ "name": "Ash" }] })).unwrap();
        assert_eq!(list.len(), 1);

        let list = unwrap_players(json!({ "data": [{ "name": "Ash" }, { "name": "Brock" }] }))
            .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn unrecognised_player_shapes_are_rejected() {
        assert!(unwrap_players(json!({ "status": "ok" })).is_err());
        assert!(unwrap_players(json!(42)).is_err());
    }

    #[test]
    fn player_entries_keep_unknown_fields() {
        let entry: PlayerEntry = serde_json::from_value(json!({
            "name": "Ash",
            "playerId": "123",
            "userId": "steam_76561",
            "ip": "198.51.100.4",
            "ping": 23.5,
            "level": 14,
            "location_x": -123000.0,
            "location_y": 55000.0
        }))
        .unwrap();

        assert_eq!(entry.name, "Ash");
        assert_eq!(entry.player_id, "123");
        assert_eq!(entry.ping, 23.5);
        assert_eq!(entry.extra["location_x"], json!(-123000.0));
    }

    #[test]
    fn sparse_player_entries_still_deserialize() {
        let entry: PlayerEntry = serde_json::from_value(json!({ "name": "Misty" })).unwrap();
        assert_eq!(entry.name, "Misty");
        assert_eq!(entry.level, 0);
        assert!(entry.user_id.is_empty());
    }
}
