use serde::{Deserialize, Serialize};

use crate::collision::CollisionMode;
use crate::error::{CollisionError, Result};
use crate::random_stream::LcgStream;

/// Run configuration for collision handling. Passed explicitly to the
/// handler; there is no global instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collision_mode: CollisionMode,
    /// Weight below which implicit-capture histories play Russian roulette.
    /// Zero disables roulette.
    pub weight_cutoff: f64,
    /// Weight given to histories that survive roulette
    pub survival_weight: f64,
    pub seed: u64,
    /// Random numbers reserved for each history
    pub history_stride: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collision_mode: CollisionMode::Analogue,
            weight_cutoff: 0.25,
            survival_weight: 1.0,
            seed: 1,
            history_stride: 152_917,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CollisionError::invalid_table(format!("bad settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.weight_cutoff >= 0.0) {
            return Err(CollisionError::Domain(format!(
                "weight cutoff must be non-negative, got {}",
                self.weight_cutoff
            )));
        }
        if !(self.survival_weight > 0.0) {
            return Err(CollisionError::Domain(format!(
                "survival weight must be positive, got {}",
                self.survival_weight
            )));
        }
        if self.weight_cutoff > 0.0 && self.survival_weight <= self.weight_cutoff {
            return Err(CollisionError::Domain(format!(
                "survival weight {} must exceed weight cutoff {}",
                self.survival_weight, self.weight_cutoff
            )));
        }
        if self.history_stride == 0 {
            return Err(CollisionError::Domain(
                "history stride must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Independent stream for the given history index.
    pub fn stream_for_history(&self, history: u64) -> LcgStream {
        LcgStream::for_history(self.seed, history, self.history_stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.collision_mode, CollisionMode::Analogue);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_json() {
        let settings = Settings::from_json_str(
            r#"{"collision_mode": "implicit-capture", "weight_cutoff": 0.1, "seed": 99}"#,
        )
        .unwrap();
        assert_eq!(settings.collision_mode, CollisionMode::ImplicitCapture);
        assert_eq!(settings.weight_cutoff, 0.1);
        assert_eq!(settings.survival_weight, 1.0);
        assert_eq!(settings.seed, 99);
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings {
            weight_cutoff: 2.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::from_json_str(r#"{"history_stride": 0}"#).is_err());
        assert!(Settings::from_json_str(r#"{"collision_mode": "bogus"}"#).is_err());
    }

    #[test]
    fn test_history_streams_differ() {
        use crate::random_stream::RandomStream;
        let settings = Settings::default();
        let mut a = settings.stream_for_history(0);
        let mut b = settings.stream_for_history(1);
        assert_ne!(a.next(), b.next());
    }
}
