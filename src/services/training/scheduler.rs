use crate::config::TrainingConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    /// No snapshot, or the snapshot is older than the retrain interval.
    Stale,
    Fresh,
}

/// Decides freshness from the last successful training time alone.
#[derive(Debug, Clone, Copy)]
pub struct RetrainScheduler {
    interval: Duration,
}

impl RetrainScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.retrain_interval())
    }

    pub fn state_at(&self, last_trained: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ModelState {
        match last_trained {
            Some(trained_at) if now - trained_at <= self.interval => ModelState::Fresh,
            _ => ModelState::Stale,
        }
    }

    pub fn next_due(&self, last_trained: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        last_trained.map(|trained_at| trained_at + self.interval)
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Stale => f.write_str("stale"),
            ModelState::Fresh => f.write_str("fresh"),
        }
    }
}
