//! Keyword intent matching.
//!
//! Matching is plain substring containment on the normalized message. The
//! table order is the priority order: the first entry with a matching
//! keyword wins.

/// Phrases that re-arm a sleeping assistant.
pub const WAKE_PHRASES: &[&str] = &["hey iris", "hello iris", "hi iris"];

/// Phrases that put an awake assistant to sleep.
pub const SLEEP_PHRASES: &[&str] = &["turn off", "go to sleep", "stop listening"];

/// What an awake assistant was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Sleep,
    Time,
    Weather,
    Greeting,
    Wellbeing,
    Help,
    Thanks,
    Unknown,
}

const INTENT_TABLE: &[(Intent, &[&str])] = &[
    (Intent::Sleep, SLEEP_PHRASES),
    (Intent::Time, &["time"]),
    (Intent::Weather, &["weather"]),
    (Intent::Greeting, &["hello"]),
    (Intent::Wellbeing, &["how are you"]),
    (Intent::Help, &["what can you do", "help", "commands"]),
    (Intent::Thanks, &["thank you"]),
];

/// Lower-case and trim a raw transcript.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| message.contains(keyword))
}

/// True if a normalized message contains a wake phrase.
pub fn is_wake_phrase(message: &str) -> bool {
    contains_any(message, WAKE_PHRASES)
}

/// Classify a normalized message.
pub fn classify(message: &str) -> Intent {
    INTENT_TABLE
        .iter()
        .find(|(_, keywords)| contains_any(message, keywords))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Unknown)
}
