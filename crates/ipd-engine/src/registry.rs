//! Name -> strategy factory mapping

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::media_aware::{MediaSentinel, MediaTrendFollower, MediaWatchdog};
use crate::strategy::{
    AlwaysCooperate, AlwaysDefect, Gradual, GrimTrigger, Prober, RandomStrategy, Responsive,
    SoftGrudger, Strategy, SuspiciousTitForTat, TitForTat, TitForTwoTats, WinStayLoseShift,
};

/// Builds a fresh strategy instance
pub type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

/// Public description of a registered strategy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
}

struct Entry {
    info: StrategyInfo,
    factory: StrategyFactory,
}

/// Ordered set of strategies a tournament can select from
///
/// Registration order is the order used for rosters and listings.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

/// Lowercase with `-` and `_` removed, so `tit-for-tat` finds `TitForTat`
fn canonical(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn factory<S: Strategy + Default + 'static>() -> StrategyFactory {
    Box::new(|| Box::new(S::default()) as Box<dyn Strategy>)
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in strategy
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, &str, StrategyFactory); 16] = [
            ("AlwaysCooperate", "Always cooperates.", factory::<AlwaysCooperate>()),
            ("AlwaysDefect", "Always defects.", factory::<AlwaysDefect>()),
            ("TitForTat", "Cooperates first, then copies the opponent's last move.", factory::<TitForTat>()),
            ("GrimTrigger", "Cooperates until the opponent defects once, then always defects.", factory::<GrimTrigger>()),
            ("WinStayLoseShift", "Repeats its move after CC or DD, switches otherwise.", factory::<WinStayLoseShift>()),
            ("RandomStrategy", "Cooperates or defects with equal probability.", factory::<RandomStrategy>()),
            ("Prober", "Opens D, C, C; exploits pushovers, plays tit-for-tat against retaliators.", factory::<Prober>()),
            ("SoftGrudger", "Punishes each defection with two defections, then cooperates.", factory::<SoftGrudger>()),
            ("Responsive", "Cooperates while the opponent cooperated at least as often as it defected.", factory::<Responsive>()),
            ("Grudger", "Never forgives a defection.", factory::<GrimTrigger>()),
            ("SuspiciousTitForTat", "Tit-for-tat that opens with a defection.", factory::<SuspiciousTitForTat>()),
            ("TitForTwoTats", "Defects only after two consecutive opponent defections.", factory::<TitForTwoTats>()),
            ("Gradual", "Retaliates with increasing severity, then forgives.", factory::<Gradual>()),
            ("MediaSentinel", "Tit-for-tat that opens cautiously when outlets report frequent defections.", factory::<MediaSentinel>()),
            ("MediaTrendFollower", "Win-stay/lose-shift guided by the best strategy in recent reports.", factory::<MediaTrendFollower>()),
            ("MediaWatchdog", "Grim while the media looks reliable, forgiving otherwise.", factory::<MediaWatchdog>()),
        ];
        for (name, description, build) in builtins {
            registry.entries.push(Entry {
                info: StrategyInfo {
                    name: name.to_string(),
                    description: description.to_string(),
                },
                factory: build,
            });
        }
        registry
    }

    /// Add a strategy. Names must be unique, also after canonicalization.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: StrategyFactory,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::UnknownStrategy(name));
        }
        if self.find(&name).is_some() {
            return Err(ConfigError::DuplicateStrategy(name));
        }
        self.entries.push(Entry {
            info: StrategyInfo {
                name,
                description: description.into(),
            },
            factory,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.info.name.clone()).collect()
    }

    pub fn list(&self) -> Vec<StrategyInfo> {
        self.entries.iter().map(|e| e.info.clone()).collect()
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.info.name == name)
            .or_else(|| {
                let wanted = canonical(name);
                self.entries.iter().find(|e| canonical(&e.info.name) == wanted)
            })
    }

    /// Registered name for `name`, matched exactly or canonically
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.find(name).map(|e| e.info.name.as_str())
    }

    /// Map requested names to registered names, keeping the requested order
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, ConfigError> {
        let mut resolved: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let found = self
                .lookup(name)
                .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))?;
            if resolved.iter().any(|r| r == found) {
                return Err(ConfigError::DuplicateStrategy(found.to_string()));
            }
            resolved.push(found.to_string());
        }
        Ok(resolved)
    }

    /// Registered names in registry order, restricted to `only` when it is
    /// non-empty and without anything in `exclude`
    pub fn select<S: AsRef<str>>(&self, only: &[S], exclude: &[S]) -> Result<Vec<String>, ConfigError> {
        let only = self.resolve_set(only)?;
        let exclude = self.resolve_set(exclude)?;
        Ok(self
            .entries
            .iter()
            .map(|e| e.info.name.clone())
            .filter(|name| only.is_empty() || only.contains(name))
            .filter(|name| !exclude.contains(name))
            .collect())
    }

    fn resolve_set<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, ConfigError> {
        names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| !n.trim().is_empty())
            .map(|n| {
                self.lookup(n)
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::UnknownStrategy(n.to_string()))
            })
            .collect()
    }

    /// Fresh instance of the named strategy
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Strategy>, ConfigError> {
        self.find(name)
            .map(|e| (e.factory)())
            .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| &e.info.name)).finish()
    }
}
