//! Capture faces and the layouts that generate them.

use serde::{Deserialize, Serialize};

use crate::angle::{normalize_yaw, PitchConvention};
use crate::error::{PanoError, PanoResult};

/// One fixed camera orientation, in rig convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFace {
    name: String,
    pitch: f64,
    yaw: f64,
    #[serde(default)]
    roll: f64,
}

impl CaptureFace {
    pub fn new(name: impl Into<String>, pitch: f64, yaw: f64, roll: f64) -> Self {
        Self {
            name: name.into(),
            pitch,
            yaw: normalize_yaw(yaw),
            roll,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn roll(&self) -> f64 {
        self.roll
    }
}

/// Names of the six cube faces, in declaration order.
/// Widest equirectangular output a run may ask for.
pub const MAX_OUTPUT_WIDTH: u32 = 32768;

/// Cube faces must be exactly this wide for the 3×2 grid projection.
pub const CUBE_FOV: f64 = 90.0;

pub const CUBE_FACE_NAMES: [&str; 6] = ["front", "right", "back", "left", "up", "down"];

/// Multi-ring layout: an equatorial ring, symmetric upper/lower rings, two poles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingLayout {
    pub equator_shots: u32,
    pub ring_pitch: f64,
    pub ring_shots: u32,
}

impl RingLayout {
    /// Pick shot counts so that neighbouring shots overlap by at least
    /// `min_overlap` degrees.
    pub fn for_fov(fov: f64, min_overlap: f64) -> PanoResult<Self> {
        if !(min_overlap >= 0.0 && min_overlap < fov) {
            return Err(PanoError::layout(format!(
                "overlap {}° must be in [0, {}°)",
                min_overlap, fov
            )));
        }
        let max_step = fov - min_overlap;
        let ring_pitch = 45.0;
        if ring_pitch > max_step {
            return Err(PanoError::layout(format!(
                "field of view {}° with {}° overlap needs more than one mid-latitude ring",
                fov, min_overlap
            )));
        }

        let equator_shots = (360.0 / max_step).ceil() as u32;
        // The 45° ring has a shorter circumference, but its yaw step must still
        // stay under the field of view.
        let by_circumference = (360.0 * ring_pitch.to_radians().cos() / max_step).ceil() as u32;
        let by_fov = (360.0 / fov).floor() as u32 + 1;
        let ring_shots = by_circumference.max(by_fov).min(equator_shots);

        let layout = Self {
            equator_shots,
            ring_pitch,
            ring_shots,
        };
        layout.validate(fov)?;
        Ok(layout)
    }

    /// Reject layouts where any angular step reaches the field of view.
    pub fn validate(&self, fov: f64) -> PanoResult<()> {
        if self.equator_shots == 0 || self.ring_shots == 0 {
            return Err(PanoError::layout("ring shot counts must be non-zero"));
        }
        if self.ring_shots > self.equator_shots {
            return Err(PanoError::layout(format!(
                "mid-latitude rings ({} shots) must be coarser than the equator ({} shots)",
                self.ring_shots, self.equator_shots
            )));
        }
        if !(self.ring_pitch > 0.0 && self.ring_pitch < 90.0) {
            return Err(PanoError::layout(format!(
                "ring pitch {}° must be between 0° and 90°",
                self.ring_pitch
            )));
        }

        let steps = [
            ("equator yaw step", 360.0 / self.equator_shots as f64),
            ("ring yaw step", 360.0 / self.ring_shots as f64),
            ("equator-to-ring pitch step", self.ring_pitch),
            ("ring-to-pole pitch step", 90.0 - self.ring_pitch),
        ];
        for (label, step) in steps {
            if step >= fov {
                return Err(PanoError::layout(format!(
                    "{} {}° >= field of view {}° (no overlap)",
                    label, step, fov
                )));
            }
        }
        Ok(())
    }

    fn faces(&self, up: f64) -> Vec<CaptureFace> {
        let mut faces = Vec::new();
        ring(&mut faces, "eq", self.equator_shots, 0.0);
        ring(&mut faces, "hi", self.ring_shots, up * self.ring_pitch / 90.0);
        ring(&mut faces, "lo", self.ring_shots, -up * self.ring_pitch / 90.0);
        faces.push(CaptureFace::new("zenith", up, 0.0, 0.0));
        faces.push(CaptureFace::new("nadir", -up, 0.0, 0.0));
        faces
    }
}

fn ring(out: &mut Vec<CaptureFace>, prefix: &str, shots: u32, pitch: f64) {
    let width = (shots.saturating_sub(1)).to_string().len().max(2);
    let step = 360.0 / shots as f64;
    for i in 0..shots {
        out.push(CaptureFace::new(
            format!("{}_{:0width$}", prefix, i, width = width),
            pitch,
            i as f64 * step,
            0.0,
        ));
    }
}

/// How the rig's faces are produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaceLayout {
    /// Six faces at 90° spacing.
    #[default]
    Cube,
    Rings(RingLayout),
    /// An explicit face list.
    Custom { faces: Vec<CaptureFace> },
}

impl FaceLayout {
    /// Expand the layout into concrete faces.
    pub fn faces(&self, fov: f64, convention: PitchConvention) -> PanoResult<Vec<CaptureFace>> {
        let up = match convention {
            PitchConvention::UpPositive => 90.0,
            PitchConvention::DownPositive => -90.0,
        };
        match self {
            FaceLayout::Cube => {
                if fov < 90.0 {
                    return Err(PanoError::layout(format!(
                        "cube faces are 90° apart; field of view {}° leaves gaps",
                        fov
                    )));
                }
                Ok(vec![
                    CaptureFace::new("front", 0.0, 0.0, 0.0),
                    CaptureFace::new("right", 0.0, 270.0, 0.0),
                    CaptureFace::new("back", 0.0, 180.0, 0.0),
                    CaptureFace::new("left", 0.0, 90.0, 0.0),
                    CaptureFace::new("up", up, 0.0, 0.0),
                    CaptureFace::new("down", -up, 0.0, 0.0),
                ])
            }
            FaceLayout::Rings(rings) => {
                rings.validate(fov)?;
                Ok(rings.faces(up))
            }
            FaceLayout::Custom { faces } => Ok(faces.clone()),
        }
    }
}

/// The validated, ordered set of faces for one panorama.
#[derive(Debug, Clone, PartialEq)]
pub struct Rig {
    faces: Vec<CaptureFace>,
    cube: bool,
}

impl Rig {
    /// Build a rig from explicit faces, validating their names.
    pub fn new(faces: Vec<CaptureFace>) -> PanoResult<Self> {
        if faces.is_empty() {
            return Err(PanoError::layout("a rig needs at least one face"));
        }
        for face in &faces {
            let name = face.name();
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(PanoError::layout(format!(
                    "face name '{}' must be non-empty ASCII alphanumerics or '_'",
                    name
                )));
            }
        }
        for (i, a) in faces.iter().enumerate() {
            for b in faces.iter().skip(i + 1) {
                if a.name() == b.name() {
                    return Err(PanoError::layout(format!(
                        "duplicate face name '{}'",
                        a.name()
                    )));
                }
                if a.name().starts_with(b.name()) || b.name().starts_with(a.name()) {
                    return Err(PanoError::layout(format!(
                        "face names '{}' and '{}' overlap as file prefixes",
                        a.name(),
                        b.name()
                    )));
                }
            }
        }

        let cube = faces.len() == CUBE_FACE_NAMES.len()
            && CUBE_FACE_NAMES
                .iter()
                .all(|n| faces.iter().any(|f| f.name() == *n));
        Ok(Self { faces, cube })
    }

    pub fn from_layout(
        layout: &FaceLayout,
        fov: f64,
        convention: PitchConvention,
    ) -> PanoResult<Self> {
        Self::new(layout.faces(fov, convention)?)
    }

    pub fn faces(&self) -> &[CaptureFace] {
        &self.faces
    }

    pub fn face(&self, name: &str) -> Option<&CaptureFace> {
        self.faces.iter().find(|f| f.name() == name)
    }

    /// Like [`Rig::face`], but an unknown name is an `InvalidFace` error.
    pub fn require(&self, name: &str) -> PanoResult<&CaptureFace> {
        self.face(name)
            .ok_or_else(|| PanoError::InvalidFace(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(|f| f.name())
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Whether the rig is the six named cube faces.
    pub fn is_cube(&self) -> bool {
        self.cube
    }
}

/// Equirectangular output size for a rig: `face_resolution × 360 / fov` wide,
/// half as high, both even.
/// Degenerate field-of-view values saturate instead of overflowing.
pub fn equirect_size(face_resolution: u32, fov: f64) -> (u32, u32) {
    let width = (face_resolution as f64 * 360.0 / fov).round();
    let width = if width.is_finite() {
        width.clamp(2.0, u32::MAX as f64) as u32
    } else {
        u32::MAX
    };
    let width = even(width);
    let height = even((width / 2).max(2));
    (width, height)
}

fn even(v: u32) -> u32 {
    match v.checked_add(v % 2) {
        Some(v) => v,
        None => v - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_layout() {
        let rig = Rig::from_layout(&FaceLayout::Cube, 90.0, PitchConvention::UpPositive).unwrap();
        assert_eq!(rig.len(), 6);
        assert!(rig.is_cube());
        let up = rig.face("up").unwrap();
        assert_eq!((up.pitch(), up.yaw()), (90.0, 0.0));
        assert_eq!(rig.face("left").unwrap().yaw(), 90.0);
        assert_eq!(rig.face("right").unwrap().yaw(), 270.0);
    }

    #[test]
    fn test_cube_down_positive_flips_poles() {
        let rig =
            Rig::from_layout(&FaceLayout::Cube, 90.0, PitchConvention::DownPositive).unwrap();
        assert_eq!(rig.face("up").unwrap().pitch(), -90.0);
        assert_eq!(rig.face("down").unwrap().pitch(), 90.0);
    }

    #[test]
    fn test_cube_rejects_narrow_fov() {
        assert!(FaceLayout::Cube
            .faces(80.0, PitchConvention::UpPositive)
            .is_err());
    }

    #[test]
    fn test_ring_layout_faces() {
        let rings = RingLayout {
            equator_shots: 8,
            ring_pitch: 45.0,
            ring_shots: 6,
        };
        let rig = Rig::from_layout(
            &FaceLayout::Rings(rings),
            90.0,
            PitchConvention::UpPositive,
        )
        .unwrap();
        assert_eq!(rig.len(), 8 + 6 + 6 + 2);
        assert!(!rig.is_cube());
        assert_eq!(rig.face("eq_01").unwrap().yaw(), 45.0);
        assert_eq!(rig.face("hi_00").unwrap().pitch(), 45.0);
        assert_eq!(rig.face("lo_03").unwrap().pitch(), -45.0);
        assert_eq!(rig.face("lo_03").unwrap().yaw(), 180.0);
        assert_eq!(rig.face("zenith").unwrap().pitch(), 90.0);
        assert_eq!(rig.face("nadir").unwrap().pitch(), -90.0);
    }

    #[test]
    fn test_ring_rejects_step_at_or_above_fov() {
        // 4 shots -> 90° step, not less than a 90° field of view
        let rings = RingLayout {
            equator_shots: 4,
            ring_pitch: 45.0,
            ring_shots: 4,
        };
        assert!(rings.validate(90.0).is_err());
        assert!(rings.validate(91.0).is_ok());

        let steep = RingLayout {
            equator_shots: 8,
            ring_pitch: 20.0,
            ring_shots: 6,
        };
        // 70° from ring to pole
        assert!(steep.validate(70.0).is_err());
        assert!(steep.validate(71.0).is_ok());
    }

    #[test]
    fn test_ring_rejects_every_step_kind() {
        let fov = 60.0;
        let cases = [
            (6, 30.0, 6),  // equator step 60
            (8, 30.0, 5),  // ring step 72
            (8, 60.0, 8),  // equator-to-ring 60
            (8, 25.0, 8),  // ring-to-pole 65
        ];
        for (eq, pitch, ring) in cases {
            let layout = RingLayout {
                equator_shots: eq,
                ring_pitch: pitch,
                ring_shots: ring,
            };
            assert!(layout.validate(fov).is_err(), "{:?}", layout);
        }
    }

    #[test]
    fn test_ring_for_fov_overlaps() {
        let layout = RingLayout::for_fov(90.0, 10.0).unwrap();
        let eq_step = 360.0 / layout.equator_shots as f64;
        assert!(eq_step <= 80.0);
        assert!(360.0 / layout.ring_shots as f64 > 0.0);
        assert!(layout.validate(90.0).is_ok());

        assert!(RingLayout::for_fov(40.0, 5.0).is_err());
        assert!(RingLayout::for_fov(90.0, 90.0).is_err());
    }

    #[test]
    fn test_rig_rejects_prefix_names() {
        let faces = vec![
            CaptureFace::new("up", 90.0, 0.0, 0.0),
            CaptureFace::new("upper", 45.0, 0.0, 0.0),
        ];
        assert!(Rig::new(faces).is_err());
    }

    #[test]
    fn test_rig_rejects_bad_names() {
        assert!(Rig::new(vec![CaptureFace::new("", 0.0, 0.0, 0.0)]).is_err());
        assert!(Rig::new(vec![CaptureFace::new("a b", 0.0, 0.0, 0.0)]).is_err());
        assert!(Rig::new(vec![
            CaptureFace::new("a", 0.0, 0.0, 0.0),
            CaptureFace::new("a", 0.0, 90.0, 0.0),
        ])
        .is_err());
        assert!(Rig::new(vec![]).is_err());
    }

    #[test]
    fn test_require_unknown_face() {
        let rig = Rig::from_layout(&FaceLayout::Cube, 90.0, PitchConvention::UpPositive).unwrap();
        assert!(matches!(
            rig.require("sideways"),
            Err(PanoError::InvalidFace(name)) if name == "sideways"
        ));
    }

    #[test]
    fn test_equirect_size() {
        assert_eq!(equirect_size(2048, 90.0), (8192, 4096));
        assert_eq!(equirect_size(1000, 120.0), (3000, 1500));
        let (w, h) = equirect_size(1001, 97.0);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn test_equirect_size_saturates_on_tiny_fov() {
        let (w, h) = equirect_size(2048, 0.0001);
        assert_eq!(w, u32::MAX - 1);
        assert_eq!(h % 2, 0);
        assert_eq!(equirect_size(2048, 0.0).0, u32::MAX - 1);
    }

    #[test]
    fn test_layout_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            layout: FaceLayout,
        }
        let w: Wrapper = toml::from_str(
            "[layout]\nkind = \"rings\"\nequator_shots = 8\nring_pitch = 45.0\nring_shots = 6\n",
        )
        .unwrap();
        assert!(matches!(w.layout, FaceLayout::Rings(r) if r.equator_shots == 8));
    }
}
