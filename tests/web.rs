//! Browser-side checks for the JS facade. Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use fleets_wasm::{state_arrived, FleetSimulation};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridStatsView {
    total_cells: usize,
    indexed_fleets: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineStatsView {
    frames: u64,
    fleets_updated: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlockOverrides {
    max_speed: f32,
}

#[wasm_bindgen_test]
fn stats_reach_javascript() {
    let mut sim = FleetSimulation::new(1000.0, 1000.0, 100.0).ok().unwrap();
    sim.add_fleet(1, 100.0, 100.0, 900.0, 900.0, 10, None);
    sim.step(1.0 / 60.0);

    let grid: GridStatsView = serde_wasm_bindgen::from_value(sim.grid_stats().ok().unwrap()).unwrap();
    assert_eq!(grid.total_cells, 100);
    assert_eq!(grid.indexed_fleets, 1);

    let engine: EngineStatsView =
        serde_wasm_bindgen::from_value(sim.engine_stats().ok().unwrap()).unwrap();
    assert_eq!(engine.frames, 1);
    assert_eq!(engine.fleets_updated, 1);
}

#[wasm_bindgen_test]
fn partial_config_is_accepted() {
    let mut sim = FleetSimulation::new(1000.0, 1000.0, 100.0).ok().unwrap();
    let overrides = serde_wasm_bindgen::to_value(&FlockOverrides { max_speed: 5.0 }).unwrap();
    assert!(sim.configure(overrides).is_ok());

    sim.add_fleet(1, 100.0, 100.0, 900.0, 100.0, 10, None);
    sim.step(1.0);
    assert!(sim.query_radius(105.0, 100.0, 0.5) == vec![1]);
}

#[wasm_bindgen_test]
fn invalid_config_is_an_error() {
    let mut sim = FleetSimulation::new(1000.0, 1000.0, 100.0).ok().unwrap();
    let overrides = serde_wasm_bindgen::to_value(&FlockOverrides { max_speed: -1.0 }).unwrap();
    assert!(sim.configure(overrides).is_err());
    assert!(FleetSimulation::new(1000.0, 1000.0, 0.0).is_err());
}

#[wasm_bindgen_test]
fn options_constructor_defaults_on_undefined() {
    let sim = FleetSimulation::with_options(500.0, 500.0, 50.0, JsValue::UNDEFINED).ok().unwrap();
    assert_eq!(sim.fleet_count(), 0);
    assert_eq!(state_arrived(), 1);
}
