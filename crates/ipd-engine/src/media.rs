//! Media network: outlets that report match outcomes to subscribed strategies
//!
//! Outlets roll coverage, accuracy and delay for every round played, using the
//! tournament RNG. Reports are queued against an absolute tick counter that
//! runs across all matches of one repeat and are handed to subscribers once
//! due. Inaccurate reports carry a rumor payload built by a [`RumorPolicy`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ConfigError, EngineError};
use crate::random::SeededRng;
use crate::strategy::{history_string, Move, Player};
use crate::PayoffMatrix;

/// Identity of one match within a tournament run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId {
    pub repeat: u32,
    /// Position of the match within its repeat
    pub index: u32,
    pub player_a: String,
    pub player_b: String,
}

/// One side of a reported outcome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideOutcome {
    pub strategy: String,
    pub score: i64,
    pub average: f64,
    /// Moves as `"CCD..."`
    pub history: String,
}

/// Snapshot of a match as it stood after a given round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub rounds: u32,
    pub a: SideOutcome,
    pub b: SideOutcome,
}

impl MatchOutcome {
    /// Build a snapshot from played histories. Histories must be non-empty
    /// and of equal length.
    pub fn new(
        match_id: MatchId,
        history_a: &[Move],
        history_b: &[Move],
        score_a: i64,
        score_b: i64,
    ) -> Self {
        let rounds = history_a.len() as u32;
        let a = side_outcome(&match_id.player_a, score_a, rounds, history_string(history_a));
        let b = side_outcome(&match_id.player_b, score_b, rounds, history_string(history_b));
        Self {
            match_id,
            rounds,
            a,
            b,
        }
    }

    /// Side reported for the named strategy
    pub fn side(&self, strategy: &str) -> Option<&SideOutcome> {
        [&self.a, &self.b].into_iter().find(|s| s.strategy == strategy)
    }

    pub fn sides(&self) -> [&SideOutcome; 2] {
        [&self.a, &self.b]
    }
}

fn side_outcome(strategy: &str, score: i64, rounds: u32, history: String) -> SideOutcome {
    let average = if rounds == 0 {
        0.0
    } else {
        score as f64 / rounds as f64
    };
    SideOutcome {
        strategy: strategy.to_string(),
        score,
        average,
        history,
    }
}

/// How an outlet corrupts an outcome when its accuracy roll fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RumorPolicy {
    /// Attribute each side's score, average and history to the other player
    #[default]
    SwapParticipants,
    /// Invert every move of both sides and rescore with the payoff matrix
    FlipMoves,
}

impl RumorPolicy {
    /// Build a rumor payload. The result never equals `truth`: a swap of a
    /// symmetric outcome falls back to flipping moves.
    pub fn corrupt(self, truth: &MatchOutcome, payoffs: &PayoffMatrix) -> MatchOutcome {
        let rumor = match self {
            RumorPolicy::SwapParticipants => swap_participants(truth),
            RumorPolicy::FlipMoves => flip_moves(truth, payoffs),
        };
        if rumor == *truth {
            flip_moves(truth, payoffs)
        } else {
            rumor
        }
    }
}

fn swap_participants(truth: &MatchOutcome) -> MatchOutcome {
    let mut rumor = truth.clone();
    std::mem::swap(&mut rumor.a.score, &mut rumor.b.score);
    std::mem::swap(&mut rumor.a.average, &mut rumor.b.average);
    std::mem::swap(&mut rumor.a.history, &mut rumor.b.history);
    rumor
}

fn flip_moves(truth: &MatchOutcome, payoffs: &PayoffMatrix) -> MatchOutcome {
    let flip = |history: &str| -> Vec<Move> {
        history
            .chars()
            .filter_map(Move::from_char)
            .map(Move::flipped)
            .collect()
    };
    let history_a = flip(&truth.a.history);
    let history_b = flip(&truth.b.history);

    let (score_a, score_b) = history_a
        .iter()
        .zip(&history_b)
        .map(|(a, b)| payoffs.score(*a, *b))
        .fold((0i64, 0i64), |(ta, tb), (sa, sb)| {
            (ta.saturating_add(sa), tb.saturating_add(sb))
        });

    MatchOutcome::new(truth.match_id.clone(), &history_a, &history_b, score_a, score_b)
}

/// Delivery delay of an outlet, in rounds
///
/// Reads a bare integer, a list, `{"choices": [..]}`, or `{"min": a, "max": b}`
/// where a missing `min` is 0 and a missing `max` equals `min`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DelaySpec {
    Fixed(u32),
    /// One of the listed values, uniformly
    Set(Vec<u32>),
    /// Uniform over `min..=max`
    Range { min: u32, max: u32 },
}

/// Every accepted input shape of [`DelaySpec`]
#[derive(Deserialize)]
#[serde(untagged)]
enum DelayShape {
    Fixed(u32),
    Set(Vec<u32>),
    Choices {
        choices: Vec<u32>,
    },
    Range {
        #[serde(default)]
        min: u32,
        max: Option<u32>,
    },
}

impl From<DelayShape> for DelaySpec {
    fn from(shape: DelayShape) -> Self {
        match shape {
            DelayShape::Fixed(delay) => DelaySpec::Fixed(delay),
            DelayShape::Set(choices) | DelayShape::Choices { choices } => DelaySpec::Set(choices),
            DelayShape::Range { min, max } => DelaySpec::Range {
                min,
                max: max.unwrap_or(min),
            },
        }
    }
}

impl<'de> Deserialize<'de> for DelaySpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DelayShape::deserialize(deserializer).map(DelaySpec::from)
    }
}

impl Default for DelaySpec {
    fn default() -> Self {
        DelaySpec::Fixed(0)
    }
}

impl DelaySpec {
    /// Draw a concrete delay. Fixed consumes no randomness, Set and Range
    /// consume exactly one draw.
    pub fn resolve(&self, rng: &mut SeededRng) -> u32 {
        match self {
            DelaySpec::Fixed(delay) => *delay,
            DelaySpec::Set(choices) => {
                let idx = rng.next_range(choices.len() as u32) as usize;
                choices.get(idx).copied().unwrap_or(0)
            }
            DelaySpec::Range { min, max } => rng.range_inclusive(*min, *max),
        }
    }

    fn normalized(&self) -> Self {
        match self {
            DelaySpec::Range { min, max } if min > max => DelaySpec::Range {
                min: *max,
                max: *min,
            },
            other => other.clone(),
        }
    }
}

fn full() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

/// A simulated information source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaOutlet {
    pub name: String,
    /// Probability of reporting on a match at all
    #[serde(default = "full")]
    pub coverage: f64,
    /// Probability a report reflects the true outcome
    #[serde(default = "full")]
    pub accuracy: f64,
    #[serde(default)]
    pub delay: DelaySpec,
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Report each match at most once, and deliver it at most once per subscriber
    #[serde(default = "yes")]
    pub avoid_duplicates: bool,
}

impl MediaOutlet {
    pub fn new(name: impl Into<String>, coverage: f64, accuracy: f64, delay: DelaySpec) -> Self {
        Self {
            name: name.into(),
            coverage,
            accuracy,
            delay,
            enabled: true,
            avoid_duplicates: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_avoid_duplicates(mut self, avoid: bool) -> Self {
        self.avoid_duplicates = avoid;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::media("outlet name must not be empty"));
        }
        for (field, value) in [("coverage", self.coverage), ("accuracy", self.accuracy)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::media(format!(
                    "outlet {} {} must be within [0, 1], got {}",
                    self.name, field, value
                )));
            }
        }
        if let DelaySpec::Set(choices) = &self.delay {
            if choices.is_empty() {
                return Err(ConfigError::media(format!(
                    "outlet {} has an empty delay set",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Who follows which outlets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max outlets per strategy. `Some(0)` disables delivery, `None` is unlimited.
    pub limit: Option<u32>,
    /// Outlets a strategy follows when it has no explicit enrollment
    pub defaults: BTreeMap<String, Vec<String>>,
    /// Explicit enrollments, taking precedence over defaults
    pub enrollments: BTreeMap<String, Vec<String>>,
}

/// Media layer configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub outlets: Vec<MediaOutlet>,
    pub subscriptions: SubscriptionConfig,
    pub rumor_policy: RumorPolicy,
}

impl MediaConfig {
    /// Names accepted by [`MediaConfig::preset`]
    pub const PRESETS: [&'static str; 2] = ["none", "basic"];

    /// Built-in configurations, matched case-insensitively
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self {
                outlets: Vec::new(),
                subscriptions: SubscriptionConfig {
                    limit: Some(0),
                    ..Default::default()
                },
                rumor_policy: RumorPolicy::default(),
            }),
            "basic" => Some(Self {
                outlets: vec![
                    MediaOutlet::new("GlobalTruth", 0.85, 0.98, DelaySpec::Set(vec![0, 1])),
                    MediaOutlet::new("AxelrodTimes", 0.65, 0.9, DelaySpec::Set(vec![0, 1, 2])),
                    MediaOutlet::new("RumorMill", 0.5, 0.55, DelaySpec::Set(vec![0, 1, 2, 3])),
                ],
                subscriptions: SubscriptionConfig {
                    limit: Some(2),
                    ..Default::default()
                },
                rumor_policy: RumorPolicy::default(),
            }),
            _ => None,
        }
    }

    /// Resolve a preset name or a JSON document. Blank input means no media.
    pub fn resolve(spec: &str) -> Result<Option<Self>, ConfigError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(None);
        }
        if let Some(preset) = Self::preset(spec) {
            return Ok(Some(preset));
        }
        let config: MediaConfig = serde_json::from_str(spec)
            .map_err(|e| ConfigError::media(format!("not a preset or valid JSON: {}", e)))?;
        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for outlet in &self.outlets {
            outlet.validate()?;
            if !seen.insert(outlet.name.as_str()) {
                return Err(ConfigError::media(format!(
                    "duplicate outlet name {}",
                    outlet.name
                )));
            }
        }
        Ok(())
    }

    pub fn outlet(&self, name: &str) -> Option<&MediaOutlet> {
        self.outlets.iter().find(|o| o.name == name)
    }
}

/// A report emitted by an outlet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaReport {
    pub outlet: String,
    pub match_id: MatchId,
    pub repeat: u32,
    /// Scheduling order within the repeat; ties on the due tick deliver in this order
    pub ordinal: u64,
    /// Match round the report is about (0-indexed)
    pub round: u32,
    pub accurate: bool,
    pub delay: u32,
    pub scheduled_tick: u64,
    pub due_tick: u64,
    pub payload: MatchOutcome,
}

/// A delivered report as recorded in a recipient's log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaLogEntry {
    pub delivered_tick: u64,
    #[serde(flatten)]
    pub report: MediaReport,
}

/// Final state of the media layer for the result boundary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub outlets: Vec<MediaOutlet>,
    pub subscription_limit: Option<u32>,
    pub rumor_policy: RumorPolicy,
    /// Enrollments resolved for the last repeat
    pub enrollments: BTreeMap<String, Vec<String>>,
    /// Every report scheduled, delivered or not
    pub generated: Vec<MediaReport>,
    /// Delivered reports per recipient
    pub reports: BTreeMap<String, Vec<MediaLogEntry>>,
}

/// Runtime state of the media layer for one tournament run
#[derive(Debug)]
pub struct MediaNetwork {
    outlets: Vec<MediaOutlet>,
    subscriptions: SubscriptionConfig,
    rumor_policy: RumorPolicy,
    enrollments: BTreeMap<String, Vec<String>>,
    /// Pending deliveries keyed by (due tick, ordinal)
    pending: BTreeMap<(u64, u64), MediaReport>,
    /// (outlet, match) pairs already reported this repeat
    reported: HashSet<(String, MatchId)>,
    /// (outlet, recipient, match) triples already delivered this repeat
    delivered: HashSet<(String, String, MatchId)>,
    repeat: u32,
    tick: u64,
    next_ordinal: u64,
    generated: Vec<MediaReport>,
    deliveries: BTreeMap<String, Vec<MediaLogEntry>>,
}

impl MediaNetwork {
    pub fn new(config: &MediaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let outlets = config
            .outlets
            .iter()
            .map(|o| MediaOutlet {
                delay: o.delay.normalized(),
                ..o.clone()
            })
            .collect();
        Ok(Self {
            outlets,
            subscriptions: config.subscriptions.clone(),
            rumor_policy: config.rumor_policy,
            enrollments: BTreeMap::new(),
            pending: BTreeMap::new(),
            reported: HashSet::new(),
            delivered: HashSet::new(),
            repeat: 0,
            tick: 0,
            next_ordinal: 0,
            generated: Vec::new(),
            deliveries: BTreeMap::new(),
        })
    }

    pub fn outlets(&self) -> &[MediaOutlet] {
        &self.outlets
    }

    /// Current absolute tick within the repeat
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Move to the next tick. Called once per round played.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn enrollment(&self, strategy: &str) -> &[String] {
        self.enrollments
            .get(strategy)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn enrollments(&self) -> &BTreeMap<String, Vec<String>> {
        &self.enrollments
    }

    pub fn generated(&self) -> &[MediaReport] {
        &self.generated
    }

    pub fn deliveries(&self) -> &BTreeMap<String, Vec<MediaLogEntry>> {
        &self.deliveries
    }

    /// Start a repeat: drop leftovers, restart the clock and resolve
    /// enrollments for the given roster. Enrollment stays fixed for the repeat.
    pub fn begin_repeat(&mut self, repeat: u32, players: &[Player]) {
        self.end_repeat();
        self.repeat = repeat;
        self.tick = 0;
        self.next_ordinal = 0;
        self.reported.clear();
        self.delivered.clear();
        self.enrollments = players
            .iter()
            .map(|p| (p.name().to_string(), self.resolve_enrollment(p)))
            .collect();
        debug!(repeat, enrollments = ?self.enrollments, "media enrollments resolved");
    }

    /// Discard anything still pending. Returns how many reports were dropped.
    pub fn end_repeat(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            debug!(repeat = self.repeat, dropped, "discarding undelivered media reports");
        }
        self.pending.clear();
        dropped
    }

    fn resolve_enrollment(&self, player: &Player) -> Vec<String> {
        let name = player.name();
        let explicit = self
            .subscriptions
            .enrollments
            .get(name)
            .map(|choices| self.normalize(choices))
            .unwrap_or_default();
        if !explicit.is_empty() {
            return explicit;
        }
        if let Some(defaults) = self.subscriptions.defaults.get(name) {
            return self.normalize(defaults);
        }
        let preferred = self.normalize(&player.preferred_outlets(&self.outlets));
        if !preferred.is_empty() {
            return preferred;
        }
        let everything: Vec<String> = self.outlets.iter().map(|o| o.name.clone()).collect();
        self.normalize(&everything)
    }

    /// Deduplicate, keep enabled outlets only, cap at the subscription limit
    fn normalize(&self, choices: &[String]) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        for choice in choices {
            if let Some(limit) = self.subscriptions.limit {
                if result.len() >= limit as usize {
                    break;
                }
            }
            let enabled = self.outlets.iter().any(|o| o.enabled && o.name == *choice);
            if enabled && !result.contains(choice) {
                result.push(choice.clone());
            }
        }
        result
    }

    /// Enable or disable an outlet mid-run. Disabling unsubscribes everyone
    /// and drops its pending reports; enabling applies from the next repeat.
    pub fn set_outlet_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        let outlet = self
            .outlets
            .iter_mut()
            .find(|o| o.name == name)
            .ok_or_else(|| ConfigError::UnknownOutlet(name.to_string()))?;
        outlet.enabled = enabled;
        if !enabled {
            for outlets in self.enrollments.values_mut() {
                outlets.retain(|o| o != name);
            }
            let before = self.pending.len();
            self.pending.retain(|_, report| report.outlet != name);
            debug!(outlet = name, cancelled = before - self.pending.len(), "outlet disabled");
        }
        Ok(())
    }

    /// Let every enabled outlet decide whether to report on `outcome`, the
    /// state of a match after `round`. Returns the number of reports scheduled.
    pub fn roll_for_match(
        &mut self,
        outcome: &MatchOutcome,
        round: u32,
        payoffs: &PayoffMatrix,
        rng: &mut SeededRng,
    ) -> usize {
        let mut scheduled = 0;
        for outlet in self.outlets.iter().filter(|o| o.enabled) {
            let key = (outlet.name.clone(), outcome.match_id.clone());
            if outlet.avoid_duplicates && self.reported.contains(&key) {
                continue;
            }
            if !rng.chance(outlet.coverage) {
                continue;
            }
            let accurate = rng.chance(outlet.accuracy);
            let delay = outlet.delay.resolve(rng);
            let payload = if accurate {
                outcome.clone()
            } else {
                self.rumor_policy.corrupt(outcome, payoffs)
            };

            let report = MediaReport {
                outlet: outlet.name.clone(),
                match_id: outcome.match_id.clone(),
                repeat: self.repeat,
                ordinal: self.next_ordinal,
                round,
                accurate,
                delay,
                scheduled_tick: self.tick,
                due_tick: self.tick + delay as u64,
                payload,
            };
            trace!(
                outlet = %report.outlet,
                ordinal = report.ordinal,
                accurate,
                due_tick = report.due_tick,
                "media report scheduled"
            );

            if outlet.avoid_duplicates {
                self.reported.insert(key);
            }
            self.generated.push(report.clone());
            self.pending.insert((report.due_tick, report.ordinal), report);
            self.next_ordinal += 1;
            scheduled += 1;
        }
        scheduled
    }

    /// Hand every report due at or before the current tick to its
    /// subscribers, in (due tick, ordinal) order. Returns the number of
    /// individual deliveries made.
    pub fn deliver_due(&mut self, players: &mut [Player]) -> Result<usize, EngineError> {
        let due: Vec<(u64, u64)> = self
            .pending
            .range(..=(self.tick, u64::MAX))
            .map(|(key, _)| *key)
            .collect();

        let mut count = 0;
        for key in due {
            let Some(report) = self.pending.remove(&key) else {
                continue;
            };
            let Some(outlet) = self.outlets.iter().find(|o| o.name == report.outlet) else {
                continue;
            };
            if !outlet.enabled {
                continue;
            }

            for player in players.iter_mut() {
                let subscribed = self
                    .enrollments
                    .get(player.name())
                    .is_some_and(|outlets| outlets.contains(&report.outlet));
                if !subscribed {
                    continue;
                }
                if outlet.avoid_duplicates {
                    let first = self.delivered.insert((
                        report.outlet.clone(),
                        player.name().to_string(),
                        report.match_id.clone(),
                    ));
                    if !first {
                        continue;
                    }
                }

                player.receive_media(&report)?;
                trace!(recipient = player.name(), outlet = %report.outlet, ordinal = report.ordinal, "media report delivered");
                self.deliveries
                    .entry(player.name().to_string())
                    .or_default()
                    .push(MediaLogEntry {
                        delivered_tick: self.tick,
                        report: report.clone(),
                    });
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn into_summary(self) -> MediaSummary {
        MediaSummary {
            subscription_limit: self.subscriptions.limit,
            outlets: self.outlets,
            rumor_policy: self.rumor_policy,
            enrollments: self.enrollments,
            generated: self.generated,
            reports: self.deliveries,
        }
    }
}
