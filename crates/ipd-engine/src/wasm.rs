//! WASM bindings for browser front-ends

#![cfg(feature = "wasm")]

use wasm_bindgen::prelude::*;

use crate::{pair_count, round_robin_pairs, run_tournament, MediaConfig, StrategyRegistry, TournamentConfig};

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Run a full tournament
///
/// # Arguments
/// * `config_json` - JSON serialized TournamentConfig; missing fields take defaults,
///   an empty strategy list selects every built-in strategy
///
/// # Returns
/// Serialized TournamentResult
#[wasm_bindgen]
pub fn run_tournament_json(config_json: &str) -> Result<JsValue, JsError> {
    let registry = StrategyRegistry::with_builtins();
    let mut config = TournamentConfig::from_json(config_json)
        .map_err(|e| JsError::new(&e.to_string()))?;
    if config.strategies.is_empty() {
        config.strategies = registry.names();
    }

    let result = run_tournament(&config, &registry).map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&result)
}

/// Names and descriptions of every built-in strategy
#[wasm_bindgen]
pub fn list_strategies() -> Result<JsValue, JsError> {
    to_js(&StrategyRegistry::with_builtins().list())
}

/// A built-in media configuration by name (`none`, `basic`)
#[wasm_bindgen]
pub fn media_preset(name: &str) -> Result<JsValue, JsError> {
    let preset = MediaConfig::preset(name)
        .ok_or_else(|| JsError::new(&format!("Unknown media preset: {}", name)))?;
    to_js(&preset)
}

/// Pair order of a round-robin among `participant_count` strategies
#[wasm_bindgen]
pub fn round_robin_pairings(participant_count: u32) -> Result<JsValue, JsError> {
    to_js(&round_robin_pairs(participant_count))
}

/// Number of matches per repeat
#[wasm_bindgen]
pub fn get_match_count(participant_count: u32) -> u32 {
    pair_count(participant_count)
}
