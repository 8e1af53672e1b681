//! Iterated Prisoner's Dilemma tournament engine
//!
//! Round-robin tournaments between pluggable strategies, with move noise,
//! stochastic match length and an optional media network that delivers
//! delayed, possibly inaccurate match reports to subscribed strategies.
//! A single seeded RNG drives every random decision, so a seed and a
//! configuration reproduce a run exactly.
//!
//! This crate is compiled to:
//! - Native (for the `ipd-arena` CLI and other hosts)
//! - WASM (for browser front-ends, behind the `wasm` feature)

mod config;
mod error;
mod game;
mod media;
mod media_aware;
mod pairing;
mod random;
mod registry;
mod strategy;
mod tournament;

#[cfg(feature = "wasm")]
mod wasm;

use serde::{Deserialize, Serialize};

pub use config::{parse_payoffs, TournamentConfig};
pub use error::{ConfigError, EngineError, Hook, StrategyFault};
pub use game::{run_match, MatchParams, MatchRecord, MatchSimulator, MatchState, RoundResult};
pub use media::{
    DelaySpec, MatchId, MatchOutcome, MediaConfig, MediaLogEntry, MediaNetwork, MediaOutlet,
    MediaReport, MediaSummary, RumorPolicy, SideOutcome, SubscriptionConfig,
};
pub use media_aware::{MediaSentinel, MediaTrendFollower, MediaWatchdog};
pub use pairing::{pair_at, pair_count, round_robin_pairs};
pub use random::SeededRng;
pub use registry::{StrategyFactory, StrategyInfo, StrategyRegistry};
pub use strategy::{
    defections, history_string, AlwaysCooperate, AlwaysDefect, Gradual, GrimTrigger, Move,
    Player, Prober, RandomStrategy, Responsive, SoftGrudger, Strategy, SuspiciousTitForTat,
    TitForTat, TitForTwoTats, WinStayLoseShift,
};
pub use tournament::{run_tournament, StandingsRow, TournamentResult};

/// Payoff matrix for the Prisoner's Dilemma
///
/// Values are taken as given; `T > R > P > S` is not enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoffMatrix {
    /// Temptation: defect against a cooperator
    #[serde(rename = "T")]
    pub temptation: i64,
    /// Reward: mutual cooperation
    #[serde(rename = "R")]
    pub reward: i64,
    /// Punishment: mutual defection
    #[serde(rename = "P")]
    pub punishment: i64,
    /// Sucker: cooperate against a defector
    #[serde(rename = "S")]
    pub sucker: i64,
}

impl Default for PayoffMatrix {
    fn default() -> Self {
        Self {
            temptation: 5,
            reward: 3,
            punishment: 1,
            sucker: 0,
        }
    }
}

impl PayoffMatrix {
    pub fn new(temptation: i64, reward: i64, punishment: i64, sucker: i64) -> Self {
        Self {
            temptation,
            reward,
            punishment,
            sucker,
        }
    }

    /// Returns (score_a, score_b)
    pub fn score(&self, a: Move, b: Move) -> (i64, i64) {
        match (a, b) {
            (Move::Cooperate, Move::Cooperate) => (self.reward, self.reward),
            (Move::Cooperate, Move::Defect) => (self.sucker, self.temptation),
            (Move::Defect, Move::Cooperate) => (self.temptation, self.sucker),
            (Move::Defect, Move::Defect) => (self.punishment, self.punishment),
        }
    }

    /// Whether the values form a classic dilemma: `T > R > P > S` and `2R > T + S`
    pub fn is_classic(&self) -> bool {
        self.temptation > self.reward
            && self.reward > self.punishment
            && self.punishment > self.sucker
            && 2 * self.reward > self.temptation + self.sucker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payoff_matrix() {
        let p = PayoffMatrix::default();
        assert_eq!(p.score(Move::Cooperate, Move::Cooperate), (3, 3));
        assert_eq!(p.score(Move::Cooperate, Move::Defect), (0, 5));
        assert_eq!(p.score(Move::Defect, Move::Cooperate), (5, 0));
        assert_eq!(p.score(Move::Defect, Move::Defect), (1, 1));
        assert!(p.is_classic());
    }

    #[test]
    fn test_arbitrary_payoffs_scored_mechanically() {
        let p = PayoffMatrix::new(-1, 10, 7, 20);
        assert!(!p.is_classic());
        assert_eq!(p.score(Move::Defect, Move::Cooperate), (-1, 20));
        assert_eq!(p.score(Move::Cooperate, Move::Cooperate), (10, 10));
    }

    #[test]
    fn test_payoffs_json_uses_letters() {
        let p: PayoffMatrix = serde_json::from_str(r#"{"T":4,"R":2,"P":1,"S":0}"#).unwrap();
        assert_eq!(p, PayoffMatrix::new(4, 2, 1, 0));
        let json = serde_json::to_string(&PayoffMatrix::default()).unwrap();
        assert_eq!(json, r#"{"T":5,"R":3,"P":1,"S":0}"#);
    }
}
