//! Intent router: the per-client wake/sleep state machine.
//!
//! ASLEEP clients only respond to wake phrases; everything else is ignored
//! with an empty reply so the client stays silent. AWAKE clients get the
//! first matching intent from the keyword table.

use crate::intent::{classify, is_wake_phrase, normalize, Intent};
use crate::session::SessionStore;
use chrono::{Local, NaiveDateTime, Timelike};
use common::Error;
use geo_client::GeoResolver;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use weather_client::WeatherLookup;

pub const WAKE_REPLY: &str = "Hi again! I was just resting. How can I help?";
pub const SLEEP_REPLY: &str =
    "Entering sleep mode. Say \"Hey iris\" or \"Hello iris\" to wake me up.";
pub const GREETING_REPLY: &str = "Hello! How can I help you today?";
pub const WELLBEING_REPLY: &str =
    "I'm doing well, thank you for asking! How can I assist you today?";
pub const HELP_REPLY: &str = "I can help you with the current time, weather information for your location, and answer basic questions. Say 'turn off' to put me to sleep, or 'Hey iris' to wake me up!";
pub const THANKS_REPLY: &str = "You're welcome! I'm here to help anytime.";
pub const FALLBACK_REPLY: &str = "Sorry, I didn't catch that. You can ask me about the time, weather, say hello, or tell me to turn off!";
pub const NO_LOCATION_REPLY: &str = "Sorry, I couldn't determine your location. Could you tell me which city you'd like weather information for?";

/// Outcome of one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// Text to speak. Empty means "say nothing".
    pub text: String,
    /// Whether the assistant is awake after this utterance.
    pub active: bool,
    /// Set when the utterance was ignored because the assistant is asleep.
    pub sleep_mode: bool,
}

impl Reply {
    fn awake(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            active: true,
            sleep_mode: false,
        }
    }

    fn entering_sleep() -> Self {
        Self {
            text: SLEEP_REPLY.to_string(),
            active: false,
            sleep_mode: false,
        }
    }

    fn ignored() -> Self {
        Self {
            text: String::new(),
            active: false,
            sleep_mode: true,
        }
    }
}

/// What the session state machine decided for one utterance.
enum Step {
    Woke,
    Ignored,
    Dispatch(Intent),
}

/// Routes utterances for every client.
pub struct IntentRouter {
    sessions: SessionStore,
    geo: Arc<GeoResolver>,
    weather: Arc<WeatherLookup>,
}

impl IntentRouter {
    pub fn new(sessions: SessionStore, geo: Arc<GeoResolver>, weather: Arc<WeatherLookup>) -> Self {
        Self {
            sessions,
            geo,
            weather,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn geo(&self) -> &GeoResolver {
        &self.geo
    }

    pub fn weather(&self) -> &WeatherLookup {
        &self.weather
    }

    /// Handle one utterance from `client_id` at the current local time.
    pub async fn handle(&self, client_id: &str, raw_message: &str) -> Reply {
        self.handle_at(client_id, raw_message, Local::now().naive_local())
            .await
    }

    /// Handle one utterance as if the local wall clock read `now`.
    pub async fn handle_at(&self, client_id: &str, raw_message: &str, now: NaiveDateTime) -> Reply {
        let message = normalize(raw_message);
        info!("Received message from {}: '{}'", client_id, message);

        let step = self.sessions.transition(client_id, |active| {
            if !*active {
                if is_wake_phrase(&message) {
                    *active = true;
                    return Step::Woke;
                }
                return Step::Ignored;
            }
            let intent = classify(&message);
            if intent == Intent::Sleep {
                *active = false;
            }
            Step::Dispatch(intent)
        });

        let intent = match step {
            Step::Woke => {
                info!("Assistant woken up for client {}", client_id);
                return Reply::awake(WAKE_REPLY);
            }
            Step::Ignored => {
                debug!("Assistant is sleeping for client {}, ignoring: '{}'", client_id, message);
                return Reply::ignored();
            }
            Step::Dispatch(intent) => intent,
        };

        match intent {
            Intent::Sleep => {
                info!("Assistant going to sleep for client {}", client_id);
                Reply::entering_sleep()
            }
            Intent::Time => Reply::awake(format!(
                "The current time is {}",
                now.format("%I:%M %p")
            )),
            Intent::Weather => match self.weather_reply(client_id, now.hour()).await {
                Ok(text) => Reply::awake(text),
                Err(e) => {
                    warn!("Weather handling error: {}", e);
                    Reply::awake(FALLBACK_REPLY)
                }
            },
            Intent::Greeting => Reply::awake(GREETING_REPLY),
            Intent::Wellbeing => Reply::awake(WELLBEING_REPLY),
            Intent::Help => Reply::awake(HELP_REPLY),
            Intent::Thanks => Reply::awake(THANKS_REPLY),
            Intent::Unknown => Reply::awake(FALLBACK_REPLY),
        }
    }

    async fn weather_reply(&self, client_id: &str, hour_bucket: u32) -> Result<String, Error> {
        let Some(location) = self.geo.resolve(client_id).await else {
            return Ok(NO_LOCATION_REPLY.to_string());
        };

        let text = match self.weather.fetch(&location, hour_bucket).await? {
            Some(snapshot) => format!(
                "It's currently {:.1}°C with {} in {}.",
                snapshot.temperature_celsius,
                snapshot.condition_text.to_lowercase(),
                snapshot.resolved_location_name
            ),
            None => format!(
                "Sorry, I couldn't fetch weather data for {location}. Please try again later."
            ),
        };
        Ok(text)
    }
}
