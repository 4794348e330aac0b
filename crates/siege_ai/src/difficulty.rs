//! Difficulty tiers and the multipliers they carry.

use serde::{Deserialize, Serialize};

/// Seconds between think passes at cadence 1.0.
pub const BASE_THINK_INTERVAL: f32 = 2.0;

/// The selectable difficulty tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Slow thinker, modest ambitions.
    Easy,
    /// The baseline opponent.
    Normal,
    /// Fast, greedy, pushy.
    Hard,
    /// Everything turned up.
    Brutal,
}

impl Difficulty {
    /// All tiers, mildest first.
    pub const ALL: [Self; 4] = [Self::Easy, Self::Normal, Self::Hard, Self::Brutal];

    /// The four multipliers this tier applies.
    #[must_use]
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => DifficultyProfile {
                cadence: 0.5,
                income_target: 0.8,
                aggression: 0.3,
                military_cap: 5,
            },
            Self::Normal => DifficultyProfile {
                cadence: 1.0,
                income_target: 1.0,
                aggression: 0.5,
                military_cap: 8,
            },
            Self::Hard => DifficultyProfile {
                cadence: 1.5,
                income_target: 1.2,
                aggression: 0.7,
                military_cap: 12,
            },
            Self::Brutal => DifficultyProfile {
                cadence: 2.0,
                income_target: 1.5,
                aggression: 0.9,
                military_cap: 20,
            },
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            "brutal" => Ok(Self::Brutal),
            other => Err(format!(
                "unknown difficulty '{other}' (expected easy|normal|hard|brutal)"
            )),
        }
    }
}

/// Four independent multipliers, applied to otherwise identical rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Think passes per [`BASE_THINK_INTERVAL`]; higher reacts faster.
    pub cadence: f32,
    /// Scales the economy the agent tries to sustain.
    pub income_target: f32,
    /// Probability weight for attack waves and cavalry tastes, in `0..1`.
    pub aggression: f32,
    /// Hard ceiling on concurrently owned military units.
    pub military_cap: usize,
}

impl DifficultyProfile {
    /// Seconds between think passes for this profile.
    #[must_use]
    pub fn think_interval(&self) -> f32 {
        BASE_THINK_INTERVAL / self.cadence
    }
}
