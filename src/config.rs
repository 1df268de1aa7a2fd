use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a freshly spawned track becomes eligible for output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    /// The spawning frame confirms the track.
    #[default]
    Immediate,
    /// A new track must be matched again on the following frame, otherwise it
    /// is dropped. Tracks spawned on the first frame of a session skip this.
    Probation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub track_thresh: f64,
    pub low_thresh: f64,
    /// Defaults to `track_thresh + 0.1`.
    pub new_track_thresh: Option<f64>,
    pub match_thresh: f64,
    pub low_match_thresh: f64,
    pub new_match_thresh: f64,
    pub track_buffer: u32,
    pub frame_rate: f64,
    pub min_box_area: f64,
    pub aspect_ratio_thresh: Option<f64>,
    pub fuse_score: bool,
    pub confirmation: Confirmation,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            low_thresh: 0.1,
            new_track_thresh: None,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            new_match_thresh: 0.7,
            track_buffer: 30,
            frame_rate: 30.0,
            min_box_area: 10.0,
            aspect_ratio_thresh: None,
            fuse_score: false,
            confirmation: Confirmation::Immediate,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: TrackerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let unit_thresholds = [
            ("track_thresh", self.track_thresh),
            ("low_thresh", self.low_thresh),
            ("match_thresh", self.match_thresh),
            ("low_match_thresh", self.low_match_thresh),
            ("new_match_thresh", self.new_match_thresh),
        ];
        for (name, value) in unit_thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.low_thresh > self.track_thresh {
            return Err(Error::InvalidConfig(format!(
                "low_thresh ({}) exceeds track_thresh ({})",
                self.low_thresh, self.track_thresh
            )));
        }

        let new_track_thresh = self.new_track_thresh();
        if !(new_track_thresh.is_finite() && new_track_thresh >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "new_track_thresh must be non-negative, got {new_track_thresh}"
            )));
        }

        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }

        if self.track_buffer == 0 {
            return Err(Error::InvalidConfig(
                "track_buffer must be at least one frame".to_string(),
            ));
        }

        if self.max_time_lost() == 0 {
            return Err(Error::InvalidConfig(format!(
                "track_buffer {} at {} fps keeps lost tracks for no frame at all",
                self.track_buffer, self.frame_rate
            )));
        }

        if !(self.min_box_area.is_finite() && self.min_box_area >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_box_area must be non-negative, got {}",
                self.min_box_area
            )));
        }

        if let Some(ratio) = self.aspect_ratio_thresh {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "aspect_ratio_thresh must be positive, got {ratio}"
                )));
            }
        }

        Ok(())
    }

    pub fn new_track_thresh(&self) -> f64 {
        self.new_track_thresh.unwrap_or(self.track_thresh + 0.1)
    }

    /// Frames a lost track is kept around, with `track_buffer` expressed at
    /// 30 fps.
    pub fn max_time_lost(&self) -> u32 {
        (self.frame_rate / 30.0 * self.track_buffer as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.max_time_lost(), 30);
        assert!((config.new_track_thresh() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_max_time_lost_scales_with_frame_rate() {
        let config = TrackerConfig {
            frame_rate: 15.0,
            ..Default::default()
        };

        assert_eq!(config.max_time_lost(), 15);
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let config = TrackerConfig {
            track_thresh: -0.1,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_low_thresh_above_track_thresh_is_rejected() {
        let config = TrackerConfig {
            low_thresh: 0.7,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_frame_rate_is_rejected() {
        let config = TrackerConfig {
            frame_rate: 0.0,
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_track_buffer_is_rejected() {
        let config = TrackerConfig {
            track_buffer: 0,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_buffer_shorter_than_one_frame_is_rejected() {
        let config = TrackerConfig {
            frame_rate: 0.5,
            ..Default::default()
        };
        assert_eq!(config.max_time_lost(), 0);

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(TrackerConfig::from_yaml_str("frame_rate: 0.5\n").is_err());
    }

    #[test]
    fn test_yaml_fills_missing_fields_with_defaults() {
        let config = TrackerConfig::from_yaml_str(
            "track_thresh: 0.6\ntrack_buffer: 60\nconfirmation: probation\naspect_ratio_thresh: 1.6\n",
        )
        .unwrap();

        assert_eq!(config.track_thresh, 0.6);
        assert_eq!(config.track_buffer, 60);
        assert_eq!(config.confirmation, Confirmation::Probation);
        assert_eq!(config.aspect_ratio_thresh, Some(1.6));
        assert_eq!(config.match_thresh, 0.8);
    }

    #[test]
    fn test_yaml_sets_association_knobs() {
        let config = TrackerConfig::from_yaml_str(
            "low_thresh: 0.2\nnew_track_thresh: 0.7\nlow_match_thresh: 0.4\nnew_match_thresh: 0.6\nfuse_score: true\n",
        )
        .unwrap();

        assert_eq!(config.low_thresh, 0.2);
        assert_eq!(config.new_track_thresh(), 0.7);
        assert_eq!(config.low_match_thresh, 0.4);
        assert_eq!(config.new_match_thresh, 0.6);
        assert!(config.fuse_score);
    }

    #[test]
    fn test_yaml_with_invalid_values_is_rejected() {
        let result = TrackerConfig::from_yaml_str("match_thresh: 1.5\n");

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let result = TrackerConfig::from_yaml_str("track_thresh: [not a number\n");

        assert!(matches!(result, Err(Error::Yaml(_))));
    }
}
