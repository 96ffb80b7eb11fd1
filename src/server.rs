//! HTTP routes.
//!
//! Clients are identified by the peer address of the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use assistant::IntentRouter;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, SecondsFormat, Timelike};
use common::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    router: Arc<IntentRouter>,
}

impl AppState {
    pub fn new(router: Arc<IntentRouter>) -> Self {
        Self { router }
    }
}

#[derive(Debug, Default, Deserialize)]
struct VoiceRequest {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct VoiceResponse {
    response: String,
    assistant_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sleep_mode: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SetLocationRequest {
    #[serde(default)]
    location: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/voice", post(voice))
        .route("/set-location", post(set_location))
        .route("/assistant-status", get(assistant_status))
        .route("/wake-assistant", post(wake_assistant))
        .route("/sleep-assistant", post(sleep_assistant))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn client_id(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

async fn voice(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<VoiceRequest>, JsonRejection>,
) -> Json<VoiceResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable /voice body from {}: {}", addr, rejection);
            VoiceRequest::default()
        }
    };

    let reply = state.router.handle(&client_id(&addr), &request.message).await;
    Json(VoiceResponse {
        response: reply.text,
        assistant_active: reply.active,
        sleep_mode: reply.sleep_mode.then_some(true),
    })
}

async fn set_location(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<SetLocationRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let location = match body {
        Ok(Json(request)) => request.location.trim().to_string(),
        Err(rejection) => {
            warn!("Unreadable /set-location body from {}: {}", addr, rejection);
            String::new()
        }
    };

    if location.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Location is required" })),
        );
    }

    let hour_bucket = Local::now().hour();
    match state.router.weather().validate(&location, hour_bucket).await {
        Ok(_) => {
            let client = client_id(&addr);
            state.router.geo().remember(&client, &location);
            info!("Location for {} set to {}", client, location);
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Location set to {location}"),
                    "success": true
                })),
            )
        }
        Err(Error::WeatherApi { status, message }) => {
            warn!("Location {:?} rejected ({}): {}", location, status, message);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Location not found" })),
            )
        }
        Err(e) => {
            warn!("Location validation error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error validating location" })),
            )
        }
    }
}

async fn assistant_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<Value> {
    let client = client_id(&addr);
    let sessions = state.router.sessions();
    let active = sessions.is_active(&client);
    let last_activity = sessions
        .get(&client)
        .map(|session| session.last_activity.timestamp_millis() as f64 / 1000.0)
        .unwrap_or(0.0);

    Json(json!({
        "assistant_active": active,
        "status": if active { "active" } else { "sleeping" },
        "last_activity": last_activity,
        "client_ip": client
    }))
}

async fn wake_assistant(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<Value> {
    let client = client_id(&addr);
    state.router.sessions().set_active(&client, true);
    info!("Assistant manually woken up for client {}", client);

    Json(json!({
        "message": "Assistant has been woken up",
        "assistant_active": true
    }))
}

async fn sleep_assistant(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<Value> {
    let client = client_id(&addr);
    state.router.sessions().set_active(&client, false);
    info!("Assistant manually put to sleep for client {}", client);

    Json(json!({
        "message": "Assistant has been put to sleep",
        "assistant_active": false
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let counts = state.router.sessions().counts();

    Json(json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        "weather_api_configured": state.router.weather().is_configured(),
        "total_clients": counts.total,
        "active_clients": counts.active,
        "sleeping_clients": counts.sleeping,
        "geolocation_apis": state.router.geo().provider_count()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant::SessionStore;
    use async_trait::async_trait;
    use common::{LookupTarget, WeatherSnapshot};
    use geo_client::{GeoProvider, GeoResolver, LocationCache, RateLimiter};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use weather_client::{WeatherLookup, WeatherProvider};

    const SLEEP_TEXT: &str =
        "Entering sleep mode. Say \"Hey iris\" or \"Hello iris\" to wake me up.";

    struct StubGeo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoProvider for StubGeo {
        fn name(&self) -> &str {
            "stub"
        }

        async fn lookup(&self, _target: &LookupTarget) -> Result<Option<String>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct StubWeather;

    #[async_trait]
    impl WeatherProvider for StubWeather {
        fn is_configured(&self) -> bool {
            true
        }

        async fn current(&self, location: &str) -> Result<WeatherSnapshot, Error> {
            match location {
                "Atlantis" => Err(Error::WeatherApi {
                    status: 400,
                    message: "No matching location found.".into(),
                }),
                "Timeoutville" => Err(Error::Http("timed out".into())),
                _ => Ok(WeatherSnapshot {
                    temperature_celsius: 18.0,
                    condition_text: "Light Rain".into(),
                    resolved_location_name: location.to_string(),
                }),
            }
        }
    }

    struct TestServer {
        base: String,
        geo: Arc<StubGeo>,
    }

    async fn spawn_server() -> TestServer {
        let geo = Arc::new(StubGeo {
            calls: AtomicUsize::new(0),
        });
        let resolver = GeoResolver::new(
            vec![geo.clone() as Arc<dyn GeoProvider>],
            LocationCache::new(Duration::from_secs(1800)),
            RateLimiter::unlimited(),
        );
        let lookup = WeatherLookup::new(Arc::new(StubWeather), 20);
        let router = IntentRouter::new(SessionStore::new(), Arc::new(resolver), Arc::new(lookup));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let service = app(AppState::new(Arc::new(router)))
            .into_make_service_with_connect_info::<SocketAddr>();
        tokio::spawn(async move {
            axum::serve(listener, service).await.expect("test server");
        });

        TestServer {
            base: format!("http://{addr}"),
            geo,
        }
    }

    fn client_from(ip: Ipv4Addr) -> reqwest::Client {
        reqwest::Client::builder()
            .local_address(IpAddr::V4(ip))
            .build()
            .expect("client builds")
    }

    async fn say(client: &reqwest::Client, server: &TestServer, message: &str) -> Value {
        client
            .post(format!("{}/voice", server.base))
            .json(&json!({ "message": message }))
            .send()
            .await
            .expect("voice request")
            .json()
            .await
            .expect("voice json")
    }

    async fn get_json(client: &reqwest::Client, server: &TestServer, path: &str) -> Value {
        client
            .get(format!("{}{}", server.base, path))
            .send()
            .await
            .expect("get request")
            .json()
            .await
            .expect("get json")
    }

    #[tokio::test]
    async fn test_fresh_client_status_is_active() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let status = get_json(&client, &server, "/assistant-status").await;
        assert_eq!(status["assistant_active"], true);
        assert_eq!(status["status"], "active");
        assert_eq!(status["last_activity"], 0.0);
        assert_eq!(status["client_ip"], "127.0.0.1");
    }

    #[tokio::test]
    async fn test_sleep_ignore_wake_scenario() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let reply = say(&client, &server, "turn off").await;
        assert_eq!(
            reply,
            json!({ "response": SLEEP_TEXT, "assistant_active": false })
        );

        let reply = say(&client, &server, "what time is it").await;
        assert_eq!(
            reply,
            json!({ "response": "", "assistant_active": false, "sleep_mode": true })
        );

        let status = get_json(&client, &server, "/assistant-status").await;
        assert_eq!(status["status"], "sleeping");
        assert!(status["last_activity"].as_f64().unwrap_or(0.0) > 0.0);

        let reply = say(&client, &server, "hey iris").await;
        assert_eq!(
            reply,
            json!({
                "response": "Hi again! I was just resting. How can I help?",
                "assistant_active": true
            })
        );
    }

    #[tokio::test]
    async fn test_unreadable_voice_body_gets_fallback() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let reply: Value = client
            .post(format!("{}/voice", server.base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .expect("voice request")
            .json()
            .await
            .expect("voice json");
        assert_eq!(reply["assistant_active"], true);
        assert!(reply["response"]
            .as_str()
            .unwrap_or_default()
            .starts_with("Sorry, I didn't catch that."));
    }

    #[tokio::test]
    async fn test_manual_wake_and_sleep() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let slept: Value = client
            .post(format!("{}/sleep-assistant", server.base))
            .send()
            .await
            .expect("sleep request")
            .json()
            .await
            .expect("sleep json");
        assert_eq!(
            slept,
            json!({ "message": "Assistant has been put to sleep", "assistant_active": false })
        );
        assert_eq!(say(&client, &server, "hello").await["sleep_mode"], true);

        let woke: Value = client
            .post(format!("{}/wake-assistant", server.base))
            .send()
            .await
            .expect("wake request")
            .json()
            .await
            .expect("wake json");
        assert_eq!(
            woke,
            json!({ "message": "Assistant has been woken up", "assistant_active": true })
        );
        assert_eq!(
            say(&client, &server, "hello").await["response"],
            "Hello! How can I help you today?"
        );
    }

    #[tokio::test]
    async fn test_health_counts_distinct_clients() {
        let server = spawn_server().await;
        let first = client_from(Ipv4Addr::new(127, 0, 0, 1));
        let second = client_from(Ipv4Addr::new(127, 0, 0, 2));

        say(&first, &server, "hello").await;
        say(&second, &server, "go to sleep").await;
        say(&first, &server, "thank you").await;

        let health = get_json(&first, &server, "/health").await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["weather_api_configured"], true);
        assert_eq!(health["geolocation_apis"], 1);
        assert_eq!(health["total_clients"], 2);
        assert_eq!(health["active_clients"], 1);
        assert_eq!(health["sleeping_clients"], 1);
        assert!(health["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_set_location_validation() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();
        let url = format!("{}/set-location", server.base);

        let empty = client
            .post(&url)
            .json(&json!({ "location": "   " }))
            .send()
            .await
            .expect("request");
        assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            empty.json::<Value>().await.expect("json"),
            json!({ "error": "Location is required" })
        );

        let malformed = client
            .post(&url)
            .header("content-type", "application/json")
            .body("[]")
            .send()
            .await
            .expect("request");
        assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);

        let unknown = client
            .post(&url)
            .json(&json!({ "location": "Atlantis" }))
            .send()
            .await
            .expect("request");
        assert_eq!(unknown.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            unknown.json::<Value>().await.expect("json"),
            json!({ "error": "Location not found" })
        );

        let unreachable = client
            .post(&url)
            .json(&json!({ "location": "Timeoutville" }))
            .send()
            .await
            .expect("request");
        assert_eq!(
            unreachable.status(),
            reqwest::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_set_location_feeds_weather() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let set = client
            .post(format!("{}/set-location", server.base))
            .json(&json!({ "location": "Bergen" }))
            .send()
            .await
            .expect("request");
        assert_eq!(set.status(), reqwest::StatusCode::OK);
        assert_eq!(
            set.json::<Value>().await.expect("json"),
            json!({ "message": "Location set to Bergen", "success": true })
        );

        let reply = say(&client, &server, "what's the weather like").await;
        assert_eq!(
            reply["response"],
            "It's currently 18.0°C with light rain in Bergen."
        );
        assert_eq!(server.geo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_weather_without_location() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let reply = say(&client, &server, "weather").await;
        assert_eq!(
            reply["response"],
            "Sorry, I couldn't determine your location. Could you tell me which city you'd like weather information for?"
        );
        assert_eq!(reply["assistant_active"], true);
        assert_eq!(server.geo.calls.load(Ordering::SeqCst), 1);
    }
}
