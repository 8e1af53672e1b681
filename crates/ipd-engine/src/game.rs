//! Match execution engine

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, EngineError};
use crate::media::{MatchId, MatchOutcome, MediaNetwork};
use crate::random::SeededRng;
use crate::strategy::{history_string, Move, Player};
use crate::PayoffMatrix;

/// Adds a payoff to a running total, failing instead of wrapping
pub(crate) fn add_score(total: i64, score: i64) -> Result<i64, EngineError> {
    total.checked_add(score).ok_or_else(|| {
        ConfigError::InvalidPayoffs(format!("score total overflows: {} + {}", total, score)).into()
    })
}

/// Rules shared by every match of a tournament
#[derive(Clone, Debug, PartialEq)]
pub struct MatchParams {
    /// Round count when `continuation` is 0
    pub rounds: u32,
    /// Probability of playing another round; 0 means fixed length
    pub continuation: f64,
    /// Probability of flipping each chosen move
    pub noise: f64,
    pub payoffs: PayoffMatrix,
}

impl MatchParams {
    /// Fixed-length, noiseless matches
    pub fn fixed(rounds: u32, payoffs: PayoffMatrix) -> Self {
        Self {
            rounds,
            continuation: 0.0,
            noise: 0.0,
            payoffs,
        }
    }
}

/// Result of a single round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    /// Moves the strategies asked for
    pub chosen_a: Move,
    pub chosen_b: Move,
    /// Moves actually played after noise
    pub move_a: Move,
    pub move_b: Move,
    pub score_a: i64,
    pub score_b: i64,
    pub cumulative_a: i64,
    pub cumulative_b: i64,
}

impl RoundResult {
    pub fn flipped_a(&self) -> bool {
        self.chosen_a != self.move_a
    }

    pub fn flipped_b(&self) -> bool {
        self.chosen_b != self.move_b
    }
}

/// Result of a complete match
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub repeat: u32,
    /// Position of the match within its repeat
    pub index: u32,
    pub player_a: String,
    pub player_b: String,
    pub rounds: Vec<RoundResult>,
    pub total_score_a: i64,
    pub total_score_b: i64,
    pub round_count: u32,
}

impl MatchRecord {
    pub fn match_id(&self) -> MatchId {
        MatchId {
            repeat: self.repeat,
            index: self.index,
            player_a: self.player_a.clone(),
            player_b: self.player_b.clone(),
        }
    }

    pub fn moves_a(&self) -> Vec<Move> {
        self.rounds.iter().map(|r| r.move_a).collect()
    }

    pub fn moves_b(&self) -> Vec<Move> {
        self.rounds.iter().map(|r| r.move_b).collect()
    }

    pub fn history_a(&self) -> String {
        history_string(&self.moves_a())
    }

    pub fn history_b(&self) -> String {
        history_string(&self.moves_b())
    }

    pub fn average_a(&self) -> f64 {
        average(self.total_score_a, self.round_count)
    }

    pub fn average_b(&self) -> f64 {
        average(self.total_score_b, self.round_count)
    }
}

fn average(total: i64, rounds: u32) -> f64 {
    if rounds == 0 {
        0.0
    } else {
        total as f64 / rounds as f64
    }
}

/// Lifecycle of a match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchState {
    Pending,
    InProgress { round: u32 },
    Finished,
}

/// One pairing played round by round.
///
/// Per round: deliver due media, both sides decide, noise, scoring, media
/// roll (with same-tick delivery of zero-delay reports), continuation.
#[derive(Debug)]
pub struct MatchSimulator<'p> {
    id: MatchId,
    params: &'p MatchParams,
    state: MatchState,
    history_a: Vec<Move>,
    history_b: Vec<Move>,
    rounds: Vec<RoundResult>,
    total_a: i64,
    total_b: i64,
}

impl<'p> MatchSimulator<'p> {
    pub fn new(id: MatchId, params: &'p MatchParams) -> Self {
        Self {
            id,
            params,
            state: MatchState::Pending,
            history_a: Vec::new(),
            history_b: Vec::new(),
            rounds: Vec::new(),
            total_a: 0,
            total_b: 0,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Play the next round. `a` and `b` index the two sides in `players`;
    /// every other player may still receive media.
    pub fn play_round(
        &mut self,
        players: &mut [Player],
        a: usize,
        b: usize,
        mut media: Option<&mut MediaNetwork>,
        rng: &mut SeededRng,
    ) -> Result<(), EngineError> {
        let round = match self.state {
            MatchState::Pending => 0,
            MatchState::InProgress { round } => round,
            MatchState::Finished => return Ok(()),
        };
        self.state = MatchState::InProgress { round };

        if let Some(net) = media.as_mut() {
            net.deliver_due(players)?;
        }

        let chosen_a = players[a].decide(&self.history_a, &self.history_b, round, rng)?;
        let chosen_b = players[b].decide(&self.history_b, &self.history_a, round, rng)?;

        let move_a = apply_noise(chosen_a, self.params.noise, rng);
        let move_b = apply_noise(chosen_b, self.params.noise, rng);

        let (score_a, score_b) = self.params.payoffs.score(move_a, move_b);
        self.total_a = add_score(self.total_a, score_a)?;
        self.total_b = add_score(self.total_b, score_b)?;
        self.history_a.push(move_a);
        self.history_b.push(move_b);
        self.rounds.push(RoundResult {
            round,
            chosen_a,
            chosen_b,
            move_a,
            move_b,
            score_a,
            score_b,
            cumulative_a: self.total_a,
            cumulative_b: self.total_b,
        });

        if let Some(net) = media.as_mut() {
            let outcome = MatchOutcome::new(
                self.id.clone(),
                &self.history_a,
                &self.history_b,
                self.total_a,
                self.total_b,
            );
            net.roll_for_match(&outcome, round, &self.params.payoffs, rng);
            net.deliver_due(players)?;
            net.advance();
        }

        let played = round + 1;
        let another = if self.params.continuation > 0.0 {
            rng.chance(self.params.continuation)
        } else {
            played < self.params.rounds
        };
        self.state = if another {
            MatchState::InProgress { round: played }
        } else {
            MatchState::Finished
        };
        Ok(())
    }

    pub fn into_record(self) -> MatchRecord {
        MatchRecord {
            repeat: self.id.repeat,
            index: self.id.index,
            player_a: self.id.player_a,
            player_b: self.id.player_b,
            round_count: self.rounds.len() as u32,
            rounds: self.rounds,
            total_score_a: self.total_a,
            total_score_b: self.total_b,
        }
    }
}

fn apply_noise(chosen: Move, noise: f64, rng: &mut SeededRng) -> Move {
    if noise <= 0.0 {
        return chosen;
    }
    if rng.chance(noise) {
        chosen.flipped()
    } else {
        chosen
    }
}

/// Run a complete match between `players[a]` and `players[b]`
///
/// Both sides are `reset` first. Returns the finished record; any strategy
/// fault aborts the match.
pub fn run_match(
    id: MatchId,
    params: &MatchParams,
    players: &mut [Player],
    a: usize,
    b: usize,
    mut media: Option<&mut MediaNetwork>,
    rng: &mut SeededRng,
) -> Result<MatchRecord, EngineError> {
    debug_assert_ne!(a, b, "self-play is not supported");
    players[a].reset()?;
    players[b].reset()?;

    let mut game = MatchSimulator::new(id, params);
    while game.state() != MatchState::Finished {
        game.play_round(players, a, b, media.as_deref_mut(), rng)?;
    }

    let record = game.into_record();
    debug!(
        repeat = record.repeat,
        index = record.index,
        a = %record.player_a,
        b = %record.player_b,
        rounds = record.round_count,
        score_a = record.total_score_a,
        score_b = record.total_score_b,
        "match finished"
    );
    Ok(record)
}
