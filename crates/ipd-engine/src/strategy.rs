//! Strategy capability, player handles and the classic built-in strategies

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Hook, StrategyFault};
use crate::media::{MediaOutlet, MediaReport};
use crate::random::SeededRng;

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Cooperate,
    Defect,
}

impl Move {
    /// The opposite move
    pub fn flipped(self) -> Self {
        match self {
            Move::Cooperate => Move::Defect,
            Move::Defect => Move::Cooperate,
        }
    }

    /// Single-letter form used in history strings
    pub fn as_char(self) -> char {
        match self {
            Move::Cooperate => 'C',
            Move::Defect => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'C' | 'c' => Some(Move::Cooperate),
            'D' | 'd' => Some(Move::Defect),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Render a move sequence as a compact `"CCD..."` string
pub fn history_string(history: &[Move]) -> String {
    history.iter().map(|m| m.as_char()).collect()
}

/// Count defections in a history
pub fn defections(history: &[Move]) -> usize {
    history.iter().filter(|m| **m == Move::Defect).count()
}

/// Decision algorithm plugged into the tournament.
///
/// `decide` sees the history as actually played (after noise) and is called
/// exactly once per round. Any randomness must come from the `rng` handed
/// in, never from a generator of the strategy's own.
pub trait Strategy {
    /// Choose this round's move
    fn decide(
        &mut self,
        my_history: &[Move],
        opponent_history: &[Move],
        round: u32,
        rng: &mut SeededRng,
    ) -> Result<Move, StrategyFault>;

    /// Clear match-scoped state. Called before round 1 of every match.
    fn reset(&mut self) -> Result<(), StrategyFault> {
        Ok(())
    }

    /// Clear repeat-scoped media knowledge. Called once per repeat.
    fn media_reset(&mut self) -> Result<(), StrategyFault> {
        Ok(())
    }

    /// Observe a delivered media report. May be called many times per round.
    fn receive_media(&mut self, _report: &MediaReport) -> Result<(), StrategyFault> {
        Ok(())
    }

    /// Outlets this strategy follows when the configuration names none for it
    fn preferred_outlets(&self, _outlets: &[MediaOutlet]) -> Vec<String> {
        Vec::new()
    }
}

/// A named strategy instance plus the media reports it has received
pub struct Player {
    name: String,
    strategy: Box<dyn Strategy>,
    rumors: Vec<MediaReport>,
}

impl Player {
    pub fn new(name: impl Into<String>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
            rumors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports delivered since the last `media_reset`, in delivery order
    pub fn rumors(&self) -> &[MediaReport] {
        &self.rumors
    }

    pub fn decide(
        &mut self,
        my_history: &[Move],
        opponent_history: &[Move],
        round: u32,
        rng: &mut SeededRng,
    ) -> Result<Move, EngineError> {
        self.strategy
            .decide(my_history, opponent_history, round, rng)
            .map_err(|fault| EngineError::strategy(&self.name, Hook::Decide, fault))
    }

    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.strategy
            .reset()
            .map_err(|fault| EngineError::strategy(&self.name, Hook::Reset, fault))
    }

    pub fn media_reset(&mut self) -> Result<(), EngineError> {
        self.rumors.clear();
        self.strategy
            .media_reset()
            .map_err(|fault| EngineError::strategy(&self.name, Hook::MediaReset, fault))
    }

    pub fn receive_media(&mut self, report: &MediaReport) -> Result<(), EngineError> {
        self.rumors.push(report.clone());
        self.strategy
            .receive_media(report)
            .map_err(|fault| EngineError::strategy(&self.name, Hook::ReceiveMedia, fault))
    }

    pub fn preferred_outlets(&self, outlets: &[MediaOutlet]) -> Vec<String> {
        self.strategy.preferred_outlets(outlets)
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("name", &self.name)
            .field("rumors", &self.rumors.len())
            .finish()
    }
}

/// Never defects.
#[derive(Debug, Default)]
pub struct AlwaysCooperate;

impl Strategy for AlwaysCooperate {
    fn decide(&mut self, _: &[Move], _: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(Move::Cooperate)
    }
}

/// Never cooperates.
#[derive(Debug, Default)]
pub struct AlwaysDefect;

impl Strategy for AlwaysDefect {
    fn decide(&mut self, _: &[Move], _: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(Move::Defect)
    }
}

/// Copy opponent's last move. Start with cooperate.
#[derive(Debug, Default)]
pub struct TitForTat;

impl Strategy for TitForTat {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(opponent_history.last().copied().unwrap_or(Move::Cooperate))
    }
}

/// Tit-for-Tat but start with defect.
#[derive(Debug, Default)]
pub struct SuspiciousTitForTat;

impl Strategy for SuspiciousTitForTat {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(opponent_history.last().copied().unwrap_or(Move::Defect))
    }
}

/// Defect only if opponent defected twice in a row.
#[derive(Debug, Default)]
pub struct TitForTwoTats;

impl Strategy for TitForTwoTats {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(tit_for_two_tats(opponent_history))
    }
}

pub(crate) fn tit_for_two_tats(opponent_history: &[Move]) -> Move {
    if opponent_history.len() < 2 {
        return Move::Cooperate;
    }

    let last_two = &opponent_history[opponent_history.len() - 2..];
    if last_two[0] == Move::Defect && last_two[1] == Move::Defect {
        Move::Defect
    } else {
        Move::Cooperate
    }
}

/// Cooperate until the opponent defects once, then always defect.
#[derive(Debug, Default)]
pub struct GrimTrigger {
    triggered: bool,
}

impl Strategy for GrimTrigger {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        if opponent_history.contains(&Move::Defect) {
            self.triggered = true;
        }
        Ok(if self.triggered { Move::Defect } else { Move::Cooperate })
    }

    fn reset(&mut self) -> Result<(), StrategyFault> {
        self.triggered = false;
        Ok(())
    }
}

/// Win-stay, lose-shift.
/// - Mutual cooperation or mutual defection last round: repeat the move
/// - Mismatched moves: switch
#[derive(Debug, Default)]
pub struct WinStayLoseShift;

impl Strategy for WinStayLoseShift {
    fn decide(&mut self, my_history: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        let (Some(my_last), Some(opp_last)) = (my_history.last(), opponent_history.last()) else {
            return Ok(Move::Cooperate);
        };
        if my_last == opp_last {
            Ok(*my_last)
        } else {
            Ok(my_last.flipped())
        }
    }
}

/// Random choice each round, drawn from the tournament RNG.
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl Strategy for RandomStrategy {
    fn decide(&mut self, _: &[Move], _: &[Move], _: u32, rng: &mut SeededRng) -> Result<Move, StrategyFault> {
        Ok(if rng.chance(0.5) { Move::Cooperate } else { Move::Defect })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ProbeMode {
    #[default]
    Probe,
    TitForTat,
    Exploit,
}

/// Opens D, C, C. If the opponent retaliated during the probe play
/// tit-for-tat, otherwise exploit with permanent defection.
#[derive(Debug, Default)]
pub struct Prober {
    mode: ProbeMode,
}

impl Strategy for Prober {
    fn decide(&mut self, my_history: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        match my_history.len() {
            0 => return Ok(Move::Defect),
            1 | 2 => return Ok(Move::Cooperate),
            _ => {}
        }
        if self.mode == ProbeMode::Probe {
            let probe = &opponent_history[..opponent_history.len().min(3)];
            self.mode = if probe.contains(&Move::Defect) {
                ProbeMode::TitForTat
            } else {
                ProbeMode::Exploit
            };
        }
        match self.mode {
            ProbeMode::Exploit => Ok(Move::Defect),
            _ => Ok(opponent_history.last().copied().unwrap_or(Move::Cooperate)),
        }
    }

    fn reset(&mut self) -> Result<(), StrategyFault> {
        self.mode = ProbeMode::Probe;
        Ok(())
    }
}

/// Answers every defection with two rounds of punishment.
#[derive(Debug, Default)]
pub struct SoftGrudger {
    punish: u8,
}

impl Strategy for SoftGrudger {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        if opponent_history.last() == Some(&Move::Defect) {
            self.punish = 2;
        }
        if self.punish > 0 {
            self.punish -= 1;
            return Ok(Move::Defect);
        }
        Ok(Move::Cooperate)
    }

    fn reset(&mut self) -> Result<(), StrategyFault> {
        self.punish = 0;
        Ok(())
    }
}

/// Cooperates while the opponent has cooperated at least as often as it defected.
#[derive(Debug, Default)]
pub struct Responsive;

impl Strategy for Responsive {
    fn decide(&mut self, _: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        let defected = defections(opponent_history);
        let cooperated = opponent_history.len() - defected;
        Ok(if cooperated >= defected { Move::Cooperate } else { Move::Defect })
    }
}

/// Escalating retaliation.
/// After N opponent defections, player should have made N(N+1)/2 total defections
#[derive(Debug, Default)]
pub struct Gradual;

impl Strategy for Gradual {
    fn decide(&mut self, my_history: &[Move], opponent_history: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
        let theirs = defections(opponent_history);
        let expected = theirs * (theirs + 1) / 2;

        if defections(my_history) < expected {
            Ok(Move::Defect)
        } else {
            Ok(Move::Cooperate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Move::{Cooperate as C, Defect as D};

    fn make_rng() -> SeededRng {
        SeededRng::new(42)
    }

    fn decide(strategy: &mut dyn Strategy, mine: &[Move], theirs: &[Move]) -> Move {
        let mut rng = make_rng();
        strategy
            .decide(mine, theirs, mine.len() as u32, &mut rng)
            .expect("built-in strategies never fault")
    }

    #[test]
    fn test_move_flip_and_chars() {
        assert_eq!(C.flipped(), D);
        assert_eq!(D.flipped(), C);
        assert_eq!(Move::from_char('C'), Some(C));
        assert_eq!(Move::from_char('d'), Some(D));
        assert_eq!(Move::from_char('x'), None);
        assert_eq!(history_string(&[C, D, D]), "CDD");
    }

    #[test]
    fn test_tit_for_tat() {
        let mut s = TitForTat;
        assert_eq!(decide(&mut s, &[], &[]), C);
        assert_eq!(decide(&mut s, &[C], &[C]), C);
        assert_eq!(decide(&mut s, &[C], &[D]), D);
    }

    #[test]
    fn test_suspicious_tft_starts_defect() {
        let mut s = SuspiciousTitForTat;
        assert_eq!(decide(&mut s, &[], &[]), D);
        assert_eq!(decide(&mut s, &[D], &[C]), C);
    }

    #[test]
    fn test_always_strategies() {
        for round in 0..10 {
            let mut rng = make_rng();
            assert_eq!(AlwaysDefect.decide(&[], &[], round, &mut rng).unwrap(), D);
            assert_eq!(AlwaysCooperate.decide(&[], &[], round, &mut rng).unwrap(), C);
        }
    }

    #[test]
    fn test_grim_trigger_stays_triggered() {
        let mut s = GrimTrigger::default();
        assert_eq!(decide(&mut s, &[C, C], &[C, C]), C);
        assert_eq!(decide(&mut s, &[C, C], &[C, D]), D);
        // Forgiveness never comes within a match
        assert_eq!(decide(&mut s, &[C, C, D], &[C, D, C]), D);

        s.reset().unwrap();
        assert_eq!(decide(&mut s, &[], &[]), C);
    }

    #[test]
    fn test_win_stay_lose_shift() {
        let mut s = WinStayLoseShift;
        assert_eq!(decide(&mut s, &[], &[]), C);
        // CC and DD count as wins: stay
        assert_eq!(decide(&mut s, &[C], &[C]), C);
        assert_eq!(decide(&mut s, &[D], &[D]), D);
        // Mismatch: shift
        assert_eq!(decide(&mut s, &[C], &[D]), D);
        assert_eq!(decide(&mut s, &[D], &[C]), C);
    }

    #[test]
    fn test_random_strategy_uses_shared_rng() {
        let mut a = SeededRng::new(9);
        let mut b = SeededRng::new(9);
        let mut s = RandomStrategy;

        let moves_a: Vec<_> = (0..50).map(|r| s.decide(&[], &[], r, &mut a).unwrap()).collect();
        let moves_b: Vec<_> = (0..50).map(|r| s.decide(&[], &[], r, &mut b).unwrap()).collect();

        assert_eq!(moves_a, moves_b);
        assert!(moves_a.contains(&C) && moves_a.contains(&D));
        assert_eq!(a.draws(), 50);
    }

    #[test]
    fn test_prober_exploits_pushover() {
        let mut s = Prober::default();
        assert_eq!(decide(&mut s, &[], &[]), D);
        assert_eq!(decide(&mut s, &[D], &[C]), C);
        assert_eq!(decide(&mut s, &[D, C], &[C, C]), C);
        assert_eq!(decide(&mut s, &[D, C, C], &[C, C, C]), D);
        assert_eq!(decide(&mut s, &[D, C, C, D], &[C, C, C, C]), D);
    }

    #[test]
    fn test_prober_switches_to_tft_after_retaliation() {
        let mut s = Prober::default();
        assert_eq!(decide(&mut s, &[D, C, C], &[C, D, C]), C);
        assert_eq!(decide(&mut s, &[D, C, C, C], &[C, D, C, D]), D);

        s.reset().unwrap();
        assert_eq!(decide(&mut s, &[D, C, C], &[C, C, C]), D);
    }

    #[test]
    fn test_soft_grudger_punishes_twice() {
        let mut s = SoftGrudger::default();
        assert_eq!(decide(&mut s, &[C], &[D]), D);
        assert_eq!(decide(&mut s, &[C, D], &[D, C]), D);
        assert_eq!(decide(&mut s, &[C, D, D], &[D, C, C]), C);
    }

    #[test]
    fn test_responsive_majority() {
        let mut s = Responsive;
        assert_eq!(decide(&mut s, &[], &[]), C);
        assert_eq!(decide(&mut s, &[C, C], &[C, D]), C);
        assert_eq!(decide(&mut s, &[C, C, C], &[D, D, C]), D);
    }

    #[test]
    fn test_tit_for_two_tats() {
        let mut s = TitForTwoTats;
        assert_eq!(decide(&mut s, &[C, C], &[C, D]), C);
        assert_eq!(decide(&mut s, &[C, C], &[D, D]), D);
    }

    #[test]
    fn test_gradual_escalates() {
        let mut s = Gradual;
        // One opponent defection: one retaliation
        assert_eq!(decide(&mut s, &[C, C], &[C, D]), D);
        assert_eq!(decide(&mut s, &[C, C, D], &[C, D, C]), C);
        // Two opponent defections: three retaliations in total
        assert_eq!(decide(&mut s, &[C, C, D, C], &[C, D, C, D]), D);
        assert_eq!(decide(&mut s, &[C, C, D, C, D], &[C, D, C, D, C]), D);
        assert_eq!(decide(&mut s, &[C, C, D, C, D, D], &[C, D, C, D, C, C]), C);
    }

    struct Faulty;

    impl Strategy for Faulty {
        fn decide(&mut self, _: &[Move], _: &[Move], _: u32, _: &mut SeededRng) -> Result<Move, StrategyFault> {
            Err(StrategyFault::new("cannot decide"))
        }
    }

    #[test]
    fn test_player_wraps_faults_with_name() {
        let mut player = Player::new("Faulty", Box::new(Faulty));
        let mut rng = make_rng();
        let err = player.decide(&[], &[], 0, &mut rng).unwrap_err();
        match err {
            EngineError::Strategy { strategy, hook, source } => {
                assert_eq!(strategy, "Faulty");
                assert_eq!(hook, Hook::Decide);
                assert_eq!(source.message(), "cannot decide");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
