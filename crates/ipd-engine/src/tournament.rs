//! Round-robin tournament orchestration

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TournamentConfig;
use crate::error::{ConfigError, EngineError};
use crate::game::{add_score, run_match, MatchRecord};
use crate::media::{MatchId, MediaNetwork, MediaSummary};
use crate::pairing::round_robin_pairs;
use crate::random::SeededRng;
use crate::registry::StrategyRegistry;
use crate::strategy::Player;

/// Aggregated performance of one strategy over the whole run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub strategy: String,
    pub total_score: i64,
    pub total_rounds: u64,
    /// `total_score / total_rounds`, 0 when no rounds were played
    pub avg_per_round: f64,
}

impl StandingsRow {
    fn new(strategy: String, total_score: i64, total_rounds: u64) -> Self {
        let avg_per_round = if total_rounds == 0 {
            0.0
        } else {
            total_score as f64 / total_rounds as f64
        };
        Self {
            strategy,
            total_score,
            total_rounds,
            avg_per_round,
        }
    }
}

/// Average descending, then total descending, then name ascending
fn standings_order(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.avg_per_round
        .total_cmp(&a.avg_per_round)
        .then_with(|| b.total_score.cmp(&a.total_score))
        .then_with(|| a.strategy.cmp(&b.strategy))
}

/// Everything a caller needs to report or reproduce a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentResult {
    /// Effective configuration, with the seed actually used
    pub params: TournamentConfig,
    /// Roster in registry-resolved names
    pub strategies: Vec<String>,
    /// Repeat-major, then pair order
    pub matches: Vec<MatchRecord>,
    pub standings: Vec<StandingsRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaSummary>,
}

impl TournamentResult {
    pub fn seed(&self) -> Option<u64> {
        self.params.seed
    }

    pub fn standing(&self, strategy: &str) -> Option<&StandingsRow> {
        self.standings.iter().find(|row| row.strategy == strategy)
    }

    pub fn winner(&self) -> Option<&StandingsRow> {
        self.standings.first()
    }
}

fn build_roster(registry: &StrategyRegistry, names: &[String]) -> Result<Vec<Player>, ConfigError> {
    names
        .iter()
        .map(|name| Ok(Player::new(name.clone(), registry.instantiate(name)?)))
        .collect()
}

/// Run a full tournament
///
/// The configuration, strategy names and media setup are all checked before
/// the first match. Strategy instances are created fresh for every repeat.
/// Any strategy fault aborts the whole run.
pub fn run_tournament(
    config: &TournamentConfig,
    registry: &StrategyRegistry,
) -> Result<TournamentResult, EngineError> {
    config.validate()?;
    let roster = registry.resolve(&config.strategies)?;
    let mut media = config.media.as_ref().map(MediaNetwork::new).transpose()?;

    let mut rng = match config.seed {
        Some(seed) => SeededRng::new(seed),
        None => SeededRng::from_entropy(),
    };
    let params = config.match_params();
    let pairs = round_robin_pairs(roster.len() as u32);

    info!(
        seed = rng.seed(),
        strategies = roster.len(),
        pairs = pairs.len(),
        repeats = config.repeats,
        media = media.is_some(),
        "tournament started"
    );

    let mut matches = Vec::with_capacity(pairs.len() * config.repeats as usize);
    let mut totals: Vec<(i64, u64)> = vec![(0, 0); roster.len()];

    for repeat in 0..config.repeats {
        let mut players = build_roster(registry, &roster)?;
        for player in players.iter_mut() {
            player.media_reset()?;
        }
        if let Some(net) = media.as_mut() {
            net.begin_repeat(repeat, &players);
        }

        for (index, &(a, b)) in pairs.iter().enumerate() {
            let (a, b) = (a as usize, b as usize);
            let id = MatchId {
                repeat,
                index: index as u32,
                player_a: roster[a].clone(),
                player_b: roster[b].clone(),
            };
            let record = run_match(id, &params, &mut players, a, b, media.as_mut(), &mut rng)?;

            totals[a].0 = add_score(totals[a].0, record.total_score_a)?;
            totals[a].1 += record.round_count as u64;
            totals[b].0 = add_score(totals[b].0, record.total_score_b)?;
            totals[b].1 += record.round_count as u64;
            matches.push(record);
        }

        if let Some(net) = media.as_mut() {
            let discarded = net.end_repeat();
            debug!(
                repeat,
                generated = net.generated().len(),
                delivered = net.deliveries().values().map(Vec::len).sum::<usize>(),
                discarded,
                "repeat finished"
            );
        } else {
            debug!(repeat, "repeat finished");
        }
    }

    let mut standings: Vec<StandingsRow> = roster
        .iter()
        .zip(&totals)
        .map(|(name, &(score, rounds))| StandingsRow::new(name.clone(), score, rounds))
        .collect();
    standings.sort_by(standings_order);

    info!(
        seed = rng.seed(),
        matches = matches.len(),
        draws = rng.draws(),
        leader = standings.first().map(|r| r.strategy.as_str()).unwrap_or(""),
        "tournament finished"
    );

    Ok(TournamentResult {
        params: TournamentConfig {
            seed: Some(rng.seed()),
            ..config.clone()
        },
        strategies: roster,
        matches,
        standings,
        media: media.map(MediaNetwork::into_summary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::sync::Arc;

    use crate::error::{Hook, StrategyFault};
    use crate::media::{DelaySpec, MediaConfig, MediaOutlet, SubscriptionConfig};
    use crate::random::SeededRng;
    use crate::strategy::{Move, Strategy};
    use crate::PayoffMatrix;

    fn config(strategies: &[&str]) -> TournamentConfig {
        TournamentConfig {
            rounds: 20,
            seed: Some(42),
            strategies: strategies.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn run(config: &TournamentConfig) -> TournamentResult {
        run_tournament(config, &StrategyRegistry::with_builtins()).unwrap()
    }

    #[test]
    fn test_round_robin_match_count() {
        let mut c = config(&["AlwaysCooperate", "AlwaysDefect", "TitForTat", "Gradual"]);
        c.repeats = 3;
        let result = run(&c);

        assert_eq!(result.matches.len(), 6 * 3);
        for m in &result.matches {
            assert_ne!(m.player_a, m.player_b);
        }
        // Repeat-major ordering
        assert_eq!(result.matches[0].repeat, 0);
        assert_eq!(result.matches[6].repeat, 1);
        assert_eq!(result.matches[6].index, 0);
    }

    #[test]
    fn test_standings_totals() {
        let result = run(&config(&["AlwaysDefect", "AlwaysCooperate"]));

        let defect = result.standing("AlwaysDefect").unwrap();
        assert_eq!(defect.total_score, 100);
        assert_eq!(defect.total_rounds, 20);
        assert_eq!(defect.avg_per_round, 5.0);

        let coop = result.standing("AlwaysCooperate").unwrap();
        assert_eq!(coop.total_score, 0);
        assert_eq!(result.winner().unwrap().strategy, "AlwaysDefect");
    }

    #[test]
    fn test_standings_tie_breaks() {
        let mut rows = vec![
            StandingsRow::new("Low".into(), 30, 20),
            StandingsRow::new("Zed".into(), 80, 40),
            StandingsRow::new("Beta".into(), 40, 20),
            StandingsRow::new("Alpha".into(), 40, 20),
            StandingsRow::new("Idle".into(), 0, 0),
        ];
        rows.sort_by(standings_order);
        let order: Vec<&str> = rows.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(order, vec!["Zed", "Alpha", "Beta", "Low", "Idle"]);
        assert_eq!(rows[4].avg_per_round, 0.0);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let mut c = config(&["RandomStrategy", "TitForTat", "MediaWatchdog", "MediaSentinel"]);
        c.noise = 0.05;
        c.continuation = 0.9;
        c.repeats = 2;
        c.media = MediaConfig::preset("basic");

        let first = run(&c);
        let second = run(&c);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_chosen_seed_is_reported_and_replays() {
        let mut c = config(&["RandomStrategy", "WinStayLoseShift"]);
        c.seed = None;
        let first = run(&c);
        let seed = first.seed().unwrap();

        c.seed = Some(seed);
        let replay = run(&c);
        assert_eq!(first.matches, replay.matches);
    }

    #[test]
    fn test_names_resolved_through_registry() {
        let result = run(&config(&["tit-for-tat", "always_defect"]));
        assert_eq!(result.strategies, vec!["TitForTat", "AlwaysDefect"]);
        assert_eq!(result.matches[0].player_a, "TitForTat");
    }

    #[test]
    fn test_configuration_errors_before_simulation() {
        let registry = StrategyRegistry::with_builtins();

        let err = run_tournament(&config(&["TitForTat", "Nobody"]), &registry).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::UnknownStrategy(_))));

        let err = run_tournament(&config(&["TitForTat"]), &registry).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::TooFewStrategies(1))));

        let err = run_tournament(&config(&["TitForTat", "tit_for_tat"]), &registry).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::DuplicateStrategy(_))));
    }

    #[test]
    fn test_no_media_summary_without_media() {
        let result = run(&config(&["TitForTat", "AlwaysDefect"]));
        assert!(result.media.is_none());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("media").is_none());
    }

    #[test]
    fn test_subscription_limit_caps_enrollment() {
        let mut c = config(&["MediaSentinel", "MediaWatchdog", "TitForTat"]);
        c.media = Some(MediaConfig {
            outlets: vec![
                MediaOutlet::new("First", 1.0, 1.0, DelaySpec::Fixed(1)),
                MediaOutlet::new("Second", 1.0, 0.5, DelaySpec::Set(vec![0, 2])),
            ],
            subscriptions: SubscriptionConfig {
                limit: Some(1),
                ..Default::default()
            },
            ..Default::default()
        });
        let result = run(&c);
        let media = result.media.unwrap();

        for (name, outlets) in &media.enrollments {
            assert_eq!(outlets.len(), 1, "{} follows {:?}", name, outlets);
        }
        for (name, log) in &media.reports {
            for entry in log {
                assert!(media.enrollments[name].contains(&entry.report.outlet));
            }
        }
        assert!(!media.generated.is_empty());
    }

    #[test]
    fn test_rumors_never_match_truth() {
        let mut c = config(&["RandomStrategy", "TitForTat", "AlwaysCooperate"]);
        c.media = Some(MediaConfig {
            outlets: vec![MediaOutlet::new("Tabloid", 1.0, 0.0, DelaySpec::Fixed(0))
                .with_avoid_duplicates(false)],
            ..Default::default()
        });
        let result = run(&c);
        let media = result.media.unwrap();

        assert!(!media.generated.is_empty());
        for report in &media.generated {
            assert!(!report.accurate);
            let record = result
                .matches
                .iter()
                .find(|m| m.match_id() == report.match_id)
                .unwrap();
            let played = report.round as usize + 1;
            let truth_a: String = record.history_a().chars().take(played).collect();
            let truth_b: String = record.history_b().chars().take(played).collect();
            let payload = &report.payload;
            assert_eq!(payload.a.strategy, record.player_a);
            assert!(payload.a.history != truth_a || payload.b.history != truth_b);
        }
    }

    struct Saboteur;

    impl Strategy for Saboteur {
        fn decide(&mut self, _: &[Move], _: &[Move], round: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
            if round == 5 {
                return Err(StrategyFault::new("refusing to play"));
            }
            Ok(Move::Cooperate)
        }
    }

    #[test]
    fn test_strategy_fault_aborts_run() {
        let mut registry = StrategyRegistry::with_builtins();
        registry
            .register("Saboteur", "Fails mid-match", Box::new(|| Box::new(Saboteur) as Box<dyn Strategy>))
            .unwrap();

        let err = run_tournament(&config(&["TitForTat", "Saboteur"]), &registry).unwrap_err();
        match err {
            EngineError::Strategy { strategy, .. } => assert_eq!(strategy, "Saboteur"),
            other => panic!("unexpected error: {}", other),
        }
    }

    /// Counts matches played by this instance; fails if state survives a repeat
    #[derive(Default)]
    struct OncePerRepeat {
        matches: u32,
    }

    impl Strategy for OncePerRepeat {
        fn decide(&mut self, _: &[Move], _: &[Move], round: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
            if round == 0 {
                self.matches += 1;
            }
            if self.matches > 2 {
                return Err(StrategyFault::new("instance reused across repeats"));
            }
            Ok(Move::Cooperate)
        }
    }

    #[test]
    fn test_fresh_instances_every_repeat() {
        let mut registry = StrategyRegistry::with_builtins();
        registry
            .register("Once", "", Box::new(|| Box::new(OncePerRepeat::default()) as Box<dyn Strategy>))
            .unwrap();
        let mut c = config(&["Once", "TitForTat", "AlwaysDefect"]);
        c.repeats = 4;

        let result = run_tournament(&c, &registry).unwrap();
        assert_eq!(result.matches.len(), 12);
    }

    #[derive(Default)]
    struct HookCounts {
        resets: AtomicU32,
        media_resets: AtomicU32,
        instances: AtomicU32,
    }

    /// Records lifecycle calls; optionally fails one of the reset hooks
    struct Lifecycle {
        counts: Arc<HookCounts>,
        fail_on: Option<Hook>,
        reset_pending: bool,
        media_resets: u32,
    }

    impl Strategy for Lifecycle {
        fn decide(&mut self, _: &[Move], _: &[Move], round: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
            if round == 0 && !std::mem::take(&mut self.reset_pending) {
                return Err(StrategyFault::new("match started without a reset"));
            }
            if self.media_resets != 1 {
                return Err(StrategyFault::new("repeat started without a single media reset"));
            }
            Ok(Move::Cooperate)
        }

        fn reset(&mut self) -> Result<(), StrategyFault> {
            self.counts.resets.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail_on == Some(Hook::Reset) {
                return Err(StrategyFault::new("reset refused"));
            }
            self.reset_pending = true;
            Ok(())
        }

        fn media_reset(&mut self) -> Result<(), StrategyFault> {
            self.counts.media_resets.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail_on == Some(Hook::MediaReset) {
                return Err(StrategyFault::new("media reset refused"));
            }
            self.media_resets += 1;
            Ok(())
        }
    }

    fn lifecycle_registry(fail_on: Option<Hook>) -> (StrategyRegistry, Vec<Arc<HookCounts>>) {
        let mut registry = StrategyRegistry::new();
        let mut all = Vec::new();
        for name in ["First", "Second", "Third"] {
            let counts = Arc::new(HookCounts::default());
            all.push(Arc::clone(&counts));
            let fail_on = if name == "Second" { fail_on } else { None };
            registry
                .register(
                    name,
                    "",
                    Box::new(move || {
                        counts.instances.fetch_add(1, AtomicOrdering::SeqCst);
                        Box::new(Lifecycle {
                            counts: Arc::clone(&counts),
                            fail_on,
                            reset_pending: false,
                            media_resets: 0,
                        }) as Box<dyn Strategy>
                    }),
                )
                .unwrap();
        }
        (registry, all)
    }

    #[test]
    fn test_reset_hooks_run_on_schedule() {
        let (registry, counts) = lifecycle_registry(None);
        let mut c = config(&["First", "Second", "Third"]);
        c.rounds = 5;
        c.repeats = 2;
        c.media = MediaConfig::preset("basic");

        let result = run_tournament(&c, &registry).unwrap();
        assert_eq!(result.matches.len(), 6);

        // Each strategy plays two matches per repeat, over two repeats
        for counts in &counts {
            assert_eq!(counts.instances.load(AtomicOrdering::SeqCst), 2);
            assert_eq!(counts.media_resets.load(AtomicOrdering::SeqCst), 2);
            assert_eq!(counts.resets.load(AtomicOrdering::SeqCst), 4);
        }
    }

    #[test]
    fn test_reset_fault_aborts_run() {
        let (registry, counts) = lifecycle_registry(Some(Hook::Reset));
        let err = run_tournament(&config(&["First", "Second", "Third"]), &registry).unwrap_err();

        match err {
            EngineError::Strategy { strategy, hook, .. } => {
                assert_eq!(strategy, "Second");
                assert_eq!(hook, Hook::Reset);
            }
            other => panic!("unexpected error: {}", other),
        }
        // First match of the first repeat: nothing after the fault runs
        assert_eq!(counts[1].resets.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(counts[2].resets.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_media_reset_fault_aborts_run() {
        let (registry, counts) = lifecycle_registry(Some(Hook::MediaReset));
        let err = run_tournament(&config(&["First", "Second", "Third"]), &registry).unwrap_err();

        match err {
            EngineError::Strategy { strategy, hook, .. } => {
                assert_eq!(strategy, "Second");
                assert_eq!(hook, Hook::MediaReset);
            }
            other => panic!("unexpected error: {}", other),
        }
        // Aborted before the first match
        for counts in &counts {
            assert_eq!(counts.resets.load(AtomicOrdering::SeqCst), 0);
        }
    }

    #[test]
    fn test_standings_total_overflow_is_an_error() {
        // One round per match fits, the second match of AlwaysDefect does not
        let mut c = config(&["AlwaysDefect", "AlwaysCooperate", "TitForTat"]);
        c.rounds = 1;
        c.payoffs = PayoffMatrix::new(i64::MAX / 2 + 1, 3, 1, 0);

        let err = run_tournament(&c, &StrategyRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidPayoffs(_))));
    }
}
