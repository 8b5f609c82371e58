//! Named CPU profiles: thinking time, notice probabilities and pool weights.
//! Loaded from TOML at runtime for the CLI and the arena.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use serde::Deserialize;

use crate::engine::bot_strategy::{BotStrategy, HeuristicStrategy, RandomStrategy};
use crate::engine::models::Difficulty;

/// A configured chance, or the default when unset or not a number.
fn probability(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| !v.is_nan()).unwrap_or(default).clamp(0.0, 1.0)
}

/// A named CPU profile. Unset fields fall back to the tier defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BotProfile {
    pub description: Option<String>,
    #[serde(default)]
    pub strategy_type: StrategyType,
    /// Tier whose defaults fill unset fields when looked up by name.
    pub base: Option<Difficulty>,

    pub think_min_ms: Option<u64>,
    pub think_max_ms: Option<u64>,
    /// Chance of spotting an available box-completing move.
    pub completion_notice: Option<f64>,
    /// Chance of spotting a safe move.
    pub blocking_notice: Option<f64>,
    /// Copies of the safe moves in the fallback pool.
    pub strategic_weight: Option<u32>,
    /// Copies of all legal moves in the fallback pool.
    pub random_weight: Option<u32>,
}

/// Which [`BotStrategy`] a profile seats.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    #[default]
    Heuristic,
    Random,
}

impl StrategyType {
    pub fn build(self, label: impl Into<String>, profile: DifficultyProfile) -> Box<dyn BotStrategy> {
        match self {
            StrategyType::Heuristic => Box::new(HeuristicStrategy::new(label, profile)),
            StrategyType::Random => Box::new(RandomStrategy),
        }
    }
}

/// Fully resolved parameters for one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyProfile {
    pub think_ms: RangeInclusive<u64>,
    pub completion_notice: f64,
    pub blocking_notice: f64,
    pub strategic_weight: u32,
    pub random_weight: u32,
}

impl DifficultyProfile {
    pub fn builtin(tier: Difficulty) -> Self {
        match tier {
            Difficulty::Easy => Self {
                think_ms: 400..=900,
                completion_notice: 0.55,
                blocking_notice: 0.3,
                strategic_weight: 1,
                random_weight: 3,
            },
            Difficulty::Medium => Self {
                think_ms: 500..=1100,
                completion_notice: 0.85,
                blocking_notice: 0.65,
                strategic_weight: 3,
                random_weight: 2,
            },
            Difficulty::Hard => Self {
                think_ms: 600..=1400,
                completion_notice: 0.98,
                blocking_notice: 0.92,
                strategic_weight: 6,
                random_weight: 1,
            },
        }
    }

    /// Random thinking delay inside the configured range.
    pub fn think_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = (*self.think_ms.start(), *self.think_ms.end());
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

impl BotProfile {
    /// Resolve against a tier's defaults.
    pub fn to_difficulty_profile(&self, tier: Difficulty) -> DifficultyProfile {
        let d = DifficultyProfile::builtin(tier);
        let lo = self.think_min_ms.unwrap_or(*d.think_ms.start());
        let hi = self.think_max_ms.unwrap_or(*d.think_ms.end()).max(lo);
        DifficultyProfile {
            think_ms: lo..=hi,
            completion_notice: probability(self.completion_notice, d.completion_notice),
            blocking_notice: probability(self.blocking_notice, d.blocking_notice),
            strategic_weight: self.strategic_weight.unwrap_or(d.strategic_weight),
            random_weight: self.random_weight.unwrap_or(d.random_weight),
        }
    }
}

/// Maps difficulty tiers to profile names.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProductionConfig {
    pub easy: Option<String>,
    pub medium: Option<String>,
    pub hard: Option<String>,
}

impl ProductionConfig {
    pub fn resolve(&self, tier: Difficulty) -> Option<&str> {
        match tier {
            Difficulty::Easy => self.easy.as_deref(),
            Difficulty::Medium => self.medium.as_deref(),
            Difficulty::Hard => self.hard.as_deref(),
        }
    }
}

/// Top-level TOML file structure.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BotProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, BotProfile>,
    #[serde(default)]
    pub production: ProductionConfig,
}

impl BotProfilesFile {
    fn production_profile(&self, tier: Difficulty) -> Option<(&str, &BotProfile)> {
        self.production
            .resolve(tier)
            .and_then(|name| self.profiles.get(name).map(|p| (name, p)))
    }

    /// Parameters for a tier: the production-mapped profile if there is one,
    /// otherwise the built-in defaults.
    pub fn for_tier(&self, tier: Difficulty) -> DifficultyProfile {
        match self.production_profile(tier) {
            Some((name, profile)) => {
                tracing::debug!(tier = tier.as_str(), profile = name, "using configured CPU profile");
                profile.to_difficulty_profile(tier)
            }
            None => DifficultyProfile::builtin(tier),
        }
    }

    /// Strategy seated for a tier. Unmapped tiers play the heuristic.
    pub fn strategy_for_tier(&self, tier: Difficulty) -> StrategyType {
        self.production_profile(tier).map_or(StrategyType::Heuristic, |(_, p)| p.strategy_type)
    }

    /// Look up a profile by name, resolved against its base tier (medium if unset).
    pub fn named(&self, name: &str) -> Option<DifficultyProfile> {
        self.profiles
            .get(name)
            .map(|p| p.to_difficulty_profile(p.base.unwrap_or(Difficulty::Medium)))
    }

    /// Strategy and parameters of a named profile.
    pub fn named_strategy(&self, name: &str) -> Option<(StrategyType, DifficultyProfile)> {
        let profile = self.named(name)?;
        Some((self.profiles[name].strategy_type, profile))
    }

    /// Reject probabilities that could never be sampled.
    fn validate(&self) -> Result<(), String> {
        let mut names: Vec<&String> = self.profiles.keys().collect();
        names.sort();
        for name in names {
            let p = &self.profiles[name];
            for (field, value) in [("completion_notice", p.completion_notice), ("blocking_notice", p.blocking_notice)] {
                if let Some(v) = value.filter(|v| !(0.0..=1.0).contains(v)) {
                    return Err(format!("profile '{name}': {field} = {v} is not a probability"));
                }
            }
        }
        Ok(())
    }
}

/// Built-in tiers as named profiles, used when no file is found.
pub static BUILTIN_PROFILES: Lazy<BotProfilesFile> = Lazy::new(|| {
    let mut profiles = HashMap::new();
    for tier in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let d = DifficultyProfile::builtin(tier);
        profiles.insert(
            tier.as_str().to_string(),
            BotProfile {
                description: Some(format!("built-in {} tier", tier.as_str())),
                strategy_type: StrategyType::Heuristic,
                base: Some(tier),
                think_min_ms: Some(*d.think_ms.start()),
                think_max_ms: Some(*d.think_ms.end()),
                completion_notice: Some(d.completion_notice),
                blocking_notice: Some(d.blocking_notice),
                strategic_weight: Some(d.strategic_weight),
                random_weight: Some(d.random_weight),
            },
        );
    }
    BotProfilesFile {
        profiles,
        production: ProductionConfig {
            easy: Some("easy".into()),
            medium: Some("medium".into()),
            hard: Some("hard".into()),
        },
    }
});

/// Load profiles from a TOML file. Notice chances outside `0..=1` (NaN
/// included) are refused rather than clamped.
pub fn load_profiles(path: &Path) -> Result<BotProfilesFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let file: BotProfilesFile =
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    file.validate()
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    Ok(file)
}

/// Try to load profiles from well-known paths, returning the built-ins if none found.
pub fn load_default_profiles() -> BotProfilesFile {
    let candidates = [
        "bot_profiles.toml",
        "../bot_profiles.toml",
        "/etc/boxes/bot_profiles.toml",
    ];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_profiles(p) {
                Ok(profiles) => {
                    tracing::info!(path = %p.display(), count = profiles.profiles.len(), "loaded bot profiles");
                    return profiles;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load bot profiles");
                }
            }
        }
    }
    tracing::info!("no bot_profiles.toml found, using built-in defaults");
    BUILTIN_PROFILES.clone()
}
