//! Rig → projection angle transform.
//!
//! Rig yaw is counter-clockwise-positive (0 front, 90 left, 180 back, 270 right),
//! projection yaw is clockwise-positive. Pitch signs are fixed once per rig by a
//! [`PitchConvention`]; the host console is always down-positive.

use serde::{Deserialize, Serialize};

/// Which way positive rig pitch points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchConvention {
    /// `+90` looks at the zenith. Projection pitch equals rig pitch,
    /// the host receives the negated value.
    #[default]
    UpPositive,
    /// `+90` looks at the nadir. Projection pitch is negated,
    /// the host receives the value unchanged.
    DownPositive,
}

/// A projection-space orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionAngle {
    pub pitch: f64,
    pub yaw: f64,
}

/// Pure angle transform bound to one pitch convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AngleModel {
    convention: PitchConvention,
}

impl AngleModel {
    pub fn new(convention: PitchConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> PitchConvention {
        self.convention
    }

    /// Map a rig orientation to the projection filter's orientation.
    pub fn to_projection(&self, pitch: f64, yaw: f64) -> ProjectionAngle {
        let pitch = match self.convention {
            PitchConvention::UpPositive => pitch,
            PitchConvention::DownPositive => -pitch,
        };
        ProjectionAngle {
            pitch: unsigned_zero(pitch),
            yaw: remap_yaw(yaw),
        }
    }

    /// Pitch value to write into the host's camera command.
    pub fn to_host_pitch(&self, pitch: f64) -> f64 {
        let pitch = match self.convention {
            PitchConvention::UpPositive => -pitch,
            PitchConvention::DownPositive => pitch,
        };
        unsigned_zero(pitch)
    }
}

/// `(360 - yaw) mod 360`, always in `[0, 360)`.
pub fn remap_yaw(yaw: f64) -> f64 {
    let wrapped = (360.0 - yaw).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        unsigned_zero(wrapped)
    }
}

/// Wrap any yaw into `[0, 360)`.
pub fn normalize_yaw(yaw: f64) -> f64 {
    let wrapped = yaw.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        unsigned_zero(wrapped)
    }
}

fn unsigned_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaw_wrap_law_over_whole_circle() {
        let model = AngleModel::default();
        for yaw in 0..360 {
            let p = model.to_projection(0.0, yaw as f64);
            let expected = ((360 - yaw) % 360) as f64;
            assert_eq!(p.yaw, expected, "yaw {}", yaw);
            assert!((0.0..360.0).contains(&p.yaw));
        }
    }

    #[test]
    fn test_yaw_edges() {
        let model = AngleModel::default();
        assert_eq!(model.to_projection(0.0, 0.0).yaw, 0.0);
        assert_eq!(model.to_projection(0.0, 359.0).yaw, 1.0);
        assert_eq!(model.to_projection(0.0, 90.0).yaw, 270.0);
        assert_eq!(model.to_projection(0.0, 270.0).yaw, 90.0);
        assert_eq!(model.to_projection(0.0, 360.0).yaw, 0.0);
        assert_eq!(model.to_projection(0.0, -90.0).yaw, 90.0);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let model = AngleModel::new(PitchConvention::UpPositive);
        let first = model.to_projection(37.5, 123.25);
        for _ in 0..100 {
            assert_eq!(model.to_projection(37.5, 123.25), first);
        }
    }

    #[test]
    fn test_up_positive_convention() {
        let model = AngleModel::new(PitchConvention::UpPositive);
        assert_eq!(model.to_projection(90.0, 0.0).pitch, 90.0);
        assert_eq!(model.to_projection(-90.0, 0.0).pitch, -90.0);
        assert_eq!(model.to_host_pitch(90.0), -90.0);
        assert_eq!(model.to_host_pitch(-90.0), 90.0);
    }

    #[test]
    fn test_down_positive_convention() {
        let model = AngleModel::new(PitchConvention::DownPositive);
        assert_eq!(model.to_projection(90.0, 0.0).pitch, -90.0);
        assert_eq!(model.to_host_pitch(90.0), 90.0);
    }

    #[test]
    fn test_zero_pitch_has_no_sign() {
        let model = AngleModel::new(PitchConvention::UpPositive);
        let host = model.to_host_pitch(0.0);
        assert!(host.is_sign_positive());
        assert_eq!(format!("{}", host), "0");
    }

    #[test]
    fn test_normalize_yaw() {
        assert_eq!(normalize_yaw(-90.0), 270.0);
        assert_eq!(normalize_yaw(720.0), 0.0);
        assert_eq!(normalize_yaw(45.0), 45.0);
    }
}
