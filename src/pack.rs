//! Bundles N single-channel feature planes into ⌈N/4⌉ RGBA float32 planes,
//! zero-filling trailing lanes.

use crate::normalize::{normalization_for, Dtype, Normalization};

/// One decoded input plane: row-major samples plus the dtype to normalize
/// from.
pub struct Plane<'a> {
    pub samples: &'a [f32],
    pub dtype: Dtype,
}

/// One packed RGBA float32 device-bound plane, laid out row-major with four
/// `f32` channels per texel.
#[derive(Clone)]
pub struct PackedPlane {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` floats, RGBA interleaved.
    pub texels: Vec<f32>,
}

/// Number of four-channel lanes needed to hold `n` feature maps.
pub fn lane_count(n: usize) -> usize {
    n.div_ceil(4)
}

/// Pack `planes` (all sharing `(width, height)`) into RGBA float32 lanes.
///
/// Lane `i` channel `c` holds plane `4*i + c`, normalized; lanes beyond the
/// last real plane (`4*i + c >= planes.len()`) are zero.
pub fn pack_planes(planes: &[Plane<'_>], width: u32, height: u32) -> Vec<PackedPlane> {
    let pixel_count = (width as usize) * (height as usize);
    let lanes = lane_count(planes.len());
    let mut out = Vec::with_capacity(lanes);

    for lane in 0..lanes {
        let mut texels = vec![0.0f32; pixel_count * 4];
        for c in 0..4 {
            let plane_idx = lane * 4 + c;
            let Some(plane) = planes.get(plane_idx) else {
                continue;
            };
            let norm = normalization_for(plane.dtype);
            debug_assert_eq!(plane.samples.len(), pixel_count);
            for (px, &sample) in plane.samples.iter().enumerate() {
                texels[px * 4 + c] = norm.apply(sample);
            }
        }
        out.push(PackedPlane {
            width,
            height,
            texels,
        });
    }
    out
}

/// Pack a single mask plane into a one-channel float32 raster using the same
/// normalizer as the channel packer.
pub fn pack_mask(mask: &[f32], dtype: Dtype, width: u32, height: u32) -> Vec<f32> {
    let norm: Normalization = normalization_for(dtype);
    let pixel_count = (width as usize) * (height as usize);
    debug_assert_eq!(mask.len(), pixel_count);
    mask.iter().map(|&v| norm.apply(v)).collect()
}

/// Flatten packed planes into the contiguous constant-memory layout used by
/// the constant-kernel matching variants: planes concatenated in order, each
/// a contiguous RGBA raster.
pub fn flatten_for_constant_buffer(planes: &[PackedPlane]) -> Vec<f32> {
    let mut out = Vec::with_capacity(planes.iter().map(|p| p.texels.len()).sum());
    for plane in planes {
        out.extend_from_slice(&plane.texels);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(samples: &'static [f32]) -> Plane<'static> {
        Plane {
            samples,
            dtype: Dtype::F32,
        }
    }

    #[test]
    fn lane_count_rounds_up() {
        assert_eq!(lane_count(1), 1);
        assert_eq!(lane_count(4), 1);
        assert_eq!(lane_count(5), 2);
        assert_eq!(lane_count(8), 2);
        assert_eq!(lane_count(9), 3);
    }

    #[test]
    fn trailing_lanes_are_zero() {
        // N = 5: two lanes, second lane has one real channel and three zero.
        let samples: &'static [f32] = &[1.0, 2.0, 3.0, 4.0];
        let planes = vec![
            plane(samples),
            plane(samples),
            plane(samples),
            plane(samples),
            plane(samples),
        ];
        let packed = pack_planes(&planes, 2, 2);
        assert_eq!(packed.len(), 2);
        // Lane 1 channel 0 holds plane 4 (real); channels 1..4 are zero.
        for px in 0..4 {
            assert_eq!(packed[1].texels[px * 4 + 1], 0.0);
            assert_eq!(packed[1].texels[px * 4 + 2], 0.0);
            assert_eq!(packed[1].texels[px * 4 + 3], 0.0);
        }
    }

    #[test]
    fn single_plane_identity_roundtrip() {
        let samples: &'static [f32] = &[0.25, 0.5, 0.75, 1.0];
        let planes = vec![plane(samples)];
        let packed = pack_planes(&planes, 2, 2);
        assert_eq!(packed.len(), 1);
        for (px, &s) in samples.iter().enumerate() {
            assert_eq!(packed[0].texels[px * 4], s);
        }
    }
}
