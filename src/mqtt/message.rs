use crate::mapping::Payload;
use chrono::{DateTime, Local};
use std::fmt;

/// The most recent payload that went out successfully
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: Payload,
    pub sent_at: DateTime<Local>,
}

impl SentMessage {
    pub fn new(topic: &str, payload: Payload) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            sent_at: Local::now(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.sent_at.format("%H:%M:%S%.3f"),
            self.topic,
            self.payload
        )
    }
}

impl fmt::Display for SentMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {}", self.sent_at.format("%H:%M:%S%.3f"), self.payload)
    }
}
