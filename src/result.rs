//! Translates argmin device coordinates back to texture space and wraps
//! them in the public result record.

/// Marker for the cost surface's scalar type. There is exactly one value:
/// the engine only ever produces single-channel float32 output, so this is
/// a zero-sized tag rather than a runtime enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct OutputDtype;

/// Best-match position and cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    pub x: u32,
    pub y: u32,
    pub cost: f32,
}

/// The full outcome of a match call: the host-side cost surface plus the
/// single best match extracted from it.
#[derive(Clone, Debug)]
pub struct MatchResult {
    pub cost_surface: Vec<f32>,
    pub surface_width: u32,
    pub surface_height: u32,
    pub best: Match,
}

/// Translate an argmin tuple `(cost, argx, argy)` in output-surface
/// coordinates into a [`Match`] in texture space.
pub fn assemble(argmin: (f32, f32, f32), left: i32, top: i32) -> Match {
    let (cost, argx, argy) = argmin;
    Match {
        x: (argx as i32 + left) as u32,
        y: (argy as i32 + top) as u32,
        cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_by_overlap_offset() {
        let m = assemble((0.0, 2.0, 3.0), 1, 1);
        assert_eq!(m.x, 3);
        assert_eq!(m.y, 4);
        assert_eq!(m.cost, 0.0);
    }

    #[test]
    fn zero_offset_is_identity() {
        let m = assemble((1.5, 6.0, 6.0), 0, 0);
        assert_eq!(m.x, 6);
        assert_eq!(m.y, 6);
        assert_eq!(m.cost, 1.5);
    }
}
