//! Strategies that consult media reports

use std::collections::{BTreeMap, VecDeque};

use crate::error::StrategyFault;
use crate::media::MediaReport;
use crate::random::SeededRng;
use crate::strategy::{Move, Strategy};

/// Tit-for-tat that opens with a defection when recent accurate reports
/// show mostly defections.
#[derive(Debug)]
pub struct MediaSentinel {
    window: usize,
    caution_threshold: f64,
    /// (cooperations, defections) per accurate report, oldest first
    recent: VecDeque<(u32, u32)>,
    cooperations: u32,
    defections: u32,
}

impl MediaSentinel {
    pub const DEFAULT_WINDOW: usize = 30;
    pub const DEFAULT_THRESHOLD: f64 = 0.55;

    pub fn new(window: usize, caution_threshold: f64) -> Self {
        Self {
            window: window.max(1),
            caution_threshold: caution_threshold.clamp(0.0, 1.0),
            recent: VecDeque::new(),
            cooperations: 0,
            defections: 0,
        }
    }

    /// Share of defections over the window reaches the threshold
    pub fn hostile_environment(&self) -> bool {
        let total = self.cooperations + self.defections;
        if total == 0 {
            return false;
        }
        self.defections as f64 / total as f64 >= self.caution_threshold
    }
}

impl Default for MediaSentinel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW, Self::DEFAULT_THRESHOLD)
    }
}

impl Strategy for MediaSentinel {
    fn decide(
        &mut self,
        _my_history: &[Move],
        opponent_history: &[Move],
        round: u32,
        _rng: &mut SeededRng,
    ) -> Result<Move, StrategyFault> {
        if round == 0 {
            return Ok(if self.hostile_environment() {
                Move::Defect
            } else {
                Move::Cooperate
            });
        }
        Ok(match opponent_history.last() {
            Some(Move::Defect) => Move::Defect,
            _ => Move::Cooperate,
        })
    }

    fn media_reset(&mut self) -> Result<(), StrategyFault> {
        self.recent.clear();
        self.cooperations = 0;
        self.defections = 0;
        Ok(())
    }

    fn receive_media(&mut self, report: &MediaReport) -> Result<(), StrategyFault> {
        if !report.accurate {
            return Ok(());
        }
        let (mut coop, mut defect) = (0u32, 0u32);
        for side in report.payload.sides() {
            for c in side.history.chars() {
                match Move::from_char(c) {
                    Some(Move::Cooperate) => coop += 1,
                    Some(Move::Defect) => defect += 1,
                    None => {}
                }
            }
        }
        if coop == 0 && defect == 0 {
            return Ok(());
        }

        self.recent.push_back((coop, defect));
        self.cooperations = self.cooperations.saturating_add(coop);
        self.defections = self.defections.saturating_add(defect);
        while self.recent.len() > self.window {
            if let Some((old_coop, old_defect)) = self.recent.pop_front() {
                self.cooperations = self.cooperations.saturating_sub(old_coop);
                self.defections = self.defections.saturating_sub(old_defect);
            }
        }
        Ok(())
    }
}

/// Win-stay/lose-shift that opens with, and falls back to, the last move of
/// the best-averaging strategy in the latest accurate report.
#[derive(Debug)]
pub struct MediaTrendFollower {
    best_player: Option<String>,
    best_average: f64,
    best_move: Move,
}

impl Default for MediaTrendFollower {
    fn default() -> Self {
        Self {
            best_player: None,
            best_average: f64::NEG_INFINITY,
            best_move: Move::Cooperate,
        }
    }
}

impl MediaTrendFollower {
    /// Strategy currently being followed, if any report has been seen
    pub fn following(&self) -> Option<(&str, f64)> {
        self.best_player
            .as_deref()
            .map(|name| (name, self.best_average))
    }

    pub fn trend_move(&self) -> Move {
        self.best_move
    }
}

impl Strategy for MediaTrendFollower {
    fn decide(
        &mut self,
        my_history: &[Move],
        opponent_history: &[Move],
        _round: u32,
        _rng: &mut SeededRng,
    ) -> Result<Move, StrategyFault> {
        let Some(&mine) = my_history.last() else {
            return Ok(self.best_move);
        };
        let theirs = opponent_history.last().copied().unwrap_or(Move::Cooperate);
        Ok(match (mine, theirs) {
            (Move::Cooperate, Move::Cooperate) => Move::Cooperate,
            // Mutual defection and unprovoked defection both lean on the trend
            (Move::Defect, _) => self.best_move,
            (Move::Cooperate, Move::Defect) => Move::Defect,
        })
    }

    fn media_reset(&mut self) -> Result<(), StrategyFault> {
        *self = Self::default();
        Ok(())
    }

    fn receive_media(&mut self, report: &MediaReport) -> Result<(), StrategyFault> {
        if !report.accurate {
            return Ok(());
        }
        let [a, b] = report.payload.sides();
        // First side wins ties
        let best = if b.average > a.average { b } else { a };
        self.best_player = Some(best.strategy.clone());
        self.best_average = best.average;
        self.best_move = best
            .history
            .chars()
            .last()
            .and_then(Move::from_char)
            .unwrap_or(Move::Cooperate);
        Ok(())
    }
}

/// Grim trigger while the network looks reliable, forgiving
/// tit-for-two-tats otherwise.
#[derive(Debug)]
pub struct MediaWatchdog {
    strict_threshold: f64,
    /// outlet -> (accurate, rumors)
    outlet_stats: BTreeMap<String, (u32, u32)>,
    grim_active: bool,
}

impl MediaWatchdog {
    pub const DEFAULT_THRESHOLD: f64 = 0.75;

    pub fn new(strict_threshold: f64) -> Self {
        Self {
            strict_threshold: strict_threshold.clamp(0.0, 1.0),
            outlet_stats: BTreeMap::new(),
            grim_active: false,
        }
    }

    /// Share of accurate reports seen across all outlets; 0.5 before any news
    pub fn network_reliability(&self) -> f64 {
        let (accurate, total) = self
            .outlet_stats
            .values()
            .fold((0u32, 0u32), |(acc, tot), (a, r)| (acc + a, tot + a + r));
        if total == 0 {
            return 0.5;
        }
        accurate as f64 / total as f64
    }
}

impl Default for MediaWatchdog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl Strategy for MediaWatchdog {
    fn decide(
        &mut self,
        _my_history: &[Move],
        opponent_history: &[Move],
        _round: u32,
        _rng: &mut SeededRng,
    ) -> Result<Move, StrategyFault> {
        if self.network_reliability() >= self.strict_threshold {
            if opponent_history.last() == Some(&Move::Defect) {
                self.grim_active = true;
            }
            return Ok(if self.grim_active {
                Move::Defect
            } else {
                Move::Cooperate
            });
        }
        Ok(crate::strategy::tit_for_two_tats(opponent_history))
    }

    fn reset(&mut self) -> Result<(), StrategyFault> {
        self.grim_active = false;
        Ok(())
    }

    fn media_reset(&mut self) -> Result<(), StrategyFault> {
        self.outlet_stats.clear();
        Ok(())
    }

    fn receive_media(&mut self, report: &MediaReport) -> Result<(), StrategyFault> {
        let stats = self.outlet_stats.entry(report.outlet.clone()).or_default();
        if report.accurate {
            stats.0 += 1;
        } else {
            stats.1 += 1;
        }
        Ok(())
    }
}
