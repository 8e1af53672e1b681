//! Error types for tournament configuration and execution

use std::fmt;

use thiserror::Error;

/// Problems with a run configuration.
///
/// Always reported before any match is played.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("need at least two strategies to run a tournament, got {0}")]
    TooFewStrategies(usize),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy selected more than once: {0}")]
    DuplicateStrategy(String),

    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("continuation probability must be below 1 or matches never end")]
    NonTerminating,

    #[error("{0} must be a positive integer")]
    NotPositive(&'static str),

    #[error("invalid payoffs: {0}")]
    InvalidPayoffs(String),

    #[error("invalid media configuration: {0}")]
    InvalidMedia(String),

    #[error("unknown media outlet: {0}")]
    UnknownOutlet(String),

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub fn media(msg: impl Into<String>) -> Self {
        Self::InvalidMedia(msg.into())
    }
}

/// Failure raised by a strategy callback.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StrategyFault {
    message: String,
}

impl StrategyFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Strategy lifecycle hook that was running when a fault happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    Decide,
    Reset,
    MediaReset,
    ReceiveMedia,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Decide => "decide",
            Hook::Reset => "reset",
            Hook::MediaReset => "media_reset",
            Hook::ReceiveMedia => "receive_media",
        };
        f.write_str(name)
    }
}

/// Any failure of a tournament run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A strategy callback failed; the whole run is aborted.
    #[error("strategy {strategy} failed during {hook}: {source}")]
    Strategy {
        strategy: String,
        hook: Hook,
        #[source]
        source: StrategyFault,
    },
}

impl EngineError {
    pub fn strategy(strategy: impl Into<String>, hook: Hook, source: StrategyFault) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            hook,
            source,
        }
    }
}
