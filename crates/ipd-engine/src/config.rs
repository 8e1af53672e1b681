//! Tournament run configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::game::MatchParams;
use crate::media::MediaConfig;
use crate::PayoffMatrix;

/// Everything needed to reproduce a tournament run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    /// Rounds per match when `continuation` is 0
    pub rounds: u32,
    /// Per-round probability of another round, in [0, 1)
    pub continuation: f64,
    /// Per-move flip probability, in [0, 1]
    pub noise: f64,
    pub repeats: u32,
    /// Engine-chosen when absent; the result always reports the seed used
    pub seed: Option<u64>,
    pub payoffs: PayoffMatrix,
    /// Registered strategy names, in roster order
    pub strategies: Vec<String>,
    pub media: Option<MediaConfig>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rounds: 150,
            continuation: 0.0,
            noise: 0.0,
            repeats: 1,
            seed: None,
            payoffs: PayoffMatrix::default(),
            strategies: Vec::new(),
            media: None,
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ProbabilityOutOfRange { field, value });
    }
    Ok(())
}

impl TournamentConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Check every rule that must hold before a match is played.
    /// Strategy names are checked against a registry separately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.len() < 2 {
            return Err(ConfigError::TooFewStrategies(self.strategies.len()));
        }
        let mut seen = HashSet::new();
        for name in &self.strategies {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateStrategy(name.clone()));
            }
        }

        if self.rounds == 0 {
            return Err(ConfigError::NotPositive("rounds"));
        }
        if self.repeats == 0 {
            return Err(ConfigError::NotPositive("repeats"));
        }

        check_probability("noise", self.noise)?;
        check_probability("continuation", self.continuation)?;
        if self.continuation >= 1.0 {
            return Err(ConfigError::NonTerminating);
        }

        if let Some(media) = &self.media {
            media.validate()?;
        }
        Ok(())
    }

    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            rounds: self.rounds,
            continuation: self.continuation,
            noise: self.noise,
            payoffs: self.payoffs,
        }
    }

    /// Mean match length: `rounds` for fixed matches, 1 / (1 - p) otherwise
    pub fn expected_rounds(&self) -> f64 {
        if self.continuation > 0.0 {
            1.0 / (1.0 - self.continuation)
        } else {
            self.rounds as f64
        }
    }
}

/// Parse `{"T":5,"R":3,"P":1,"S":0}`
pub fn parse_payoffs(json: &str) -> Result<PayoffMatrix, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::InvalidPayoffs(e.to_string()))
}
