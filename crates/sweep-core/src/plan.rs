//! Sweep requests, launch plans, and experiment generation.

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};
use crate::games::DEFAULT_GAMES;

/// Raw launcher inputs, as collected from the CLI.
///
/// `resolve()` validates these into a [`LaunchPlan`].
#[derive(Debug, Clone, Default)]
pub struct SweepRequest {
    pub group_name: String,
    pub exp_name: String,
    pub config_path: String,
    pub config_name: String,
    /// Prefix of the default roster to run; ignored when `games` is given.
    pub num_games: usize,
    /// Explicit game list; empty means "use the default roster".
    pub games: Vec<String>,
    /// Games to remove from the resolved roster. Each must be present.
    pub excluded_games: Vec<String>,
    /// Seed range size; ignored when `seeds` is given.
    pub num_seeds: u64,
    /// Explicit seed list; empty means `0..num_seeds`.
    pub seeds: Vec<u64>,
    pub device_start: u32,
    pub num_devices: u32,
    pub num_exp_per_device: usize,
    /// Free-form `key=value` entries appended to every experiment.
    pub overrides: Vec<String>,
}

/// A validated sweep: resolved seed and game lists, the device range,
/// and the overrides every generated experiment carries.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub group_name: String,
    pub exp_name: String,
    pub config_path: String,
    pub config_name: String,
    pub seeds: Vec<u64>,
    pub games: Vec<String>,
    pub device_start: u32,
    pub num_devices: u32,
    pub num_exp_per_device: usize,
    pub overrides: Vec<String>,
}

/// One generated experiment configuration.
///
/// Identity is the positional `index` in generation order (seed outer,
/// game inner). Each experiment owns its data; cloning the plan's fields
/// here is what guarantees no two experiments share mutable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Experiment {
    pub index: usize,
    pub seed: u64,
    pub game: String,
    pub config_path: String,
    pub config_name: String,
    /// Ordered override list: `group_name=`, `exp_name=`, `seed=`,
    /// `env.game=`, then the user overrides verbatim.
    pub overrides: Vec<String>,
}

impl SweepRequest {
    /// Validate the request into a launch plan.
    ///
    /// Fails fast on malformed overrides, exclusions that name a game not
    /// in the roster, and an empty device range — all before any dispatch.
    pub fn resolve(self) -> ConfigResult<LaunchPlan> {
        if self.num_devices == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.num_exp_per_device == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        for entry in &self.overrides {
            validate_override(entry)?;
        }

        let mut games = if self.games.is_empty() {
            let count = self.num_games.min(DEFAULT_GAMES.len());
            DEFAULT_GAMES[..count]
                .iter()
                .map(|g| (*g).to_string())
                .collect()
        } else {
            let mut games = self.games;
            games.sort_unstable();
            games
        };

        // Asymmetric removal must not silently no-op: excluding a game
        // that is not in the roster is a configuration mistake.
        for excluded in &self.excluded_games {
            match games.iter().position(|g| g == excluded) {
                Some(pos) => {
                    games.remove(pos);
                }
                None => {
                    return Err(ConfigError::UnknownExcludedGame(excluded.clone()));
                }
            }
        }

        let seeds = if self.seeds.is_empty() {
            (0..self.num_seeds).collect()
        } else {
            self.seeds
        };

        Ok(LaunchPlan {
            group_name: self.group_name,
            exp_name: self.exp_name,
            config_path: self.config_path,
            config_name: self.config_name,
            seeds,
            games,
            device_start: self.device_start,
            num_devices: self.num_devices,
            num_exp_per_device: self.num_exp_per_device,
            overrides: self.overrides,
        })
    }
}

impl LaunchPlan {
    /// The device identifiers this sweep dispatches onto.
    pub fn device_ids(&self) -> Vec<u32> {
        (self.device_start..self.device_start + self.num_devices).collect()
    }

    /// Total number of experiments this plan generates.
    pub fn experiment_count(&self) -> usize {
        self.seeds.len() * self.games.len()
    }

    /// Expand the seed × game product into experiment configurations.
    ///
    /// Seeds are the outer loop, games the inner one. This order is fixed:
    /// it determines dispatch order downstream, so scenario reproducibility
    /// depends on it.
    pub fn experiments(&self) -> Vec<Experiment> {
        let mut experiments = Vec::with_capacity(self.experiment_count());
        for seed in &self.seeds {
            for game in &self.games {
                let mut overrides = vec![
                    format!("group_name={}", self.group_name),
                    format!("exp_name={}", self.exp_name),
                    format!("seed={seed}"),
                    format!("env.game={game}"),
                ];
                overrides.extend(self.overrides.iter().cloned());

                experiments.push(Experiment {
                    index: experiments.len(),
                    seed: *seed,
                    game: game.clone(),
                    config_path: self.config_path.clone(),
                    config_name: self.config_name.clone(),
                    overrides,
                });
            }
        }
        experiments
    }
}

/// Check that an override entry has `key=value` shape with a non-empty key.
fn validate_override(entry: &str) -> ConfigResult<()> {
    match entry.split_once('=') {
        Some((key, _)) if !key.is_empty() => Ok(()),
        _ => Err(ConfigError::MalformedOverride(entry.to_string())),
    }
}
