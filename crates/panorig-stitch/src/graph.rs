//! ffmpeg filter graphs that turn per-face inputs into one equirectangular
//! stream labelled `[outv]`.
//!
//! Two shapes exist. A six-face cube rig with 90° faces is stacked into the
//! 3×2 grid that `v360=input=c3x2` expects. Any other rig, including a cube
//! captured wider than 90°, is tiled horizontally and projected with
//! `v360=input=tiled`, which takes the camera angle and field of view of
//! every tile explicitly.

use std::fmt::Write as _;

use panorig_core::rig::CUBE_FOV;
use panorig_core::{AngleModel, CaptureFace, FramePattern, ProjectionAngle, Rig};

/// Face order of the c3x2 cube layout, row by row.
pub const CUBE_GRID_ORDER: [&str; 6] = ["right", "left", "up", "down", "front", "back"];

/// Label of the graph's video output.
pub const OUTPUT_LABEL: &str = "outv";

/// One video input of the stitch command.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchInput {
    pub face: String,
    pub angle: ProjectionAngle,
    pub pattern: FramePattern,
}

/// Projection parameters shared by both graph shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    pub field_of_view: f64,
    pub blend_width: f64,
    pub interpolation: String,
    pub width: u32,
    pub height: u32,
}

/// Faces in the order their inputs are passed to ffmpeg.
pub fn input_order(rig: &Rig) -> Vec<&CaptureFace> {
    if rig.is_cube() {
        CUBE_GRID_ORDER
            .iter()
            .filter_map(|name| rig.face(name))
            .collect()
    } else {
        rig.faces().iter().collect()
    }
}

/// Build one [`StitchInput`] per face, in input order.
pub fn stitch_inputs(rig: &Rig, angles: &AngleModel, frame_ext: &str) -> Vec<StitchInput> {
    input_order(rig)
        .into_iter()
        .map(|face| StitchInput {
            face: face.name().to_string(),
            angle: angles.to_projection(face.pitch(), face.yaw()),
            pattern: FramePattern::new(face.name(), frame_ext),
        })
        .collect()
}

/// Graph for a cube rig; inputs 0..6 must be in [`CUBE_GRID_ORDER`].
pub fn cube_grid(settings: &GraphSettings) -> String {
    format!(
        "[0:v][1:v][2:v]hstack=inputs=3[top];\
         [3:v][4:v][5:v]hstack=inputs=3[bot];\
         [top][bot]vstack=inputs=2[grid];\
         [grid]v360=input=c3x2:output=equirect:interp={}:w={}:h={}[{}]",
        settings.interpolation, settings.width, settings.height, OUTPUT_LABEL
    )
}

/// Graph for an arbitrary rig: tiles side by side plus every tile's angle.
pub fn tiled(inputs: &[StitchInput], settings: &GraphSettings) -> String {
    let n = inputs.len();
    let mut graph = String::new();
    let source = if n == 1 {
        "[0:v]".to_string()
    } else {
        for i in 0..n {
            let _ = write!(graph, "[{}:v]", i);
        }
        let _ = write!(graph, "hstack=inputs={}[tiles];", n);
        "[tiles]".to_string()
    };
    let angles = inputs
        .iter()
        .map(|i| format!("{} {}", i.angle.pitch, i.angle.yaw))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = write!(
        graph,
        "{}v360=input=tiled:output=equirect:tiles={}:cam_angles='{}':ih_fov={}:iv_fov={}:blend_width={}:interp={}:w={}:h={}[{}]",
        source,
        n,
        angles,
        settings.field_of_view,
        settings.field_of_view,
        settings.blend_width,
        settings.interpolation,
        settings.width,
        settings.height,
        OUTPUT_LABEL
    );
    graph
}

/// Whether `rig` can use the fixed 3×2 grid: the six cube faces, each
/// exactly 90° wide, since `c3x2` takes no field of view.
pub fn uses_cube_grid(rig: &Rig, field_of_view: f64) -> bool {
    rig.is_cube() && (field_of_view - CUBE_FOV).abs() < 1e-9
}

/// Pick the graph shape for `rig`.
pub fn build(rig: &Rig, inputs: &[StitchInput], settings: &GraphSettings) -> String {
    if uses_cube_grid(rig, settings.field_of_view) {
        cube_grid(settings)
    } else {
        tiled(inputs, settings)
    }
}
