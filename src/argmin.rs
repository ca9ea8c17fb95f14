//! Host side of the argmin reduction — stage 2 of the two-stage reduction.
//! Stage 1 (the per-workgroup-tile device reduction) lives in
//! `shaders/argmin.wgsl`; this module finishes the scan across tiles.

/// Number of `⌈W/T⌉ · ⌈H/T⌉` scratch tuples the device stage produces.
pub fn scratch_tile_count(out_width: u32, out_height: u32, tile: u32) -> usize {
    let tiles_x = out_width.div_ceil(tile) as usize;
    let tiles_y = out_height.div_ceil(tile) as usize;
    tiles_x * tiles_y
}

/// Scan the device-produced `(cost, _, argx, argy)` tuples and return the
/// global minimum, breaking ties by first-encountered (row-major) order —
/// the same order the tiles themselves were laid out in, so no reordering
/// is needed before scanning.
pub fn host_reduce(scratch: &[[f32; 4]]) -> (f32, f32, f32) {
    let mut best = scratch[0];
    for &tuple in &scratch[1..] {
        if tuple[0] < best[0] {
            best = tuple;
        }
    }
    (best[0], best[2], best[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_count_rounds_up() {
        assert_eq!(scratch_tile_count(17, 16, 16), 2);
        assert_eq!(scratch_tile_count(32, 32, 16), 4);
    }

    #[test]
    fn picks_global_minimum() {
        let scratch = [
            [5.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 3.0, 4.0],
            [2.0, 0.0, 7.0, 7.0],
        ];
        let (cost, x, y) = host_reduce(&scratch);
        assert_eq!(cost, 1.0);
        assert_eq!((x, y), (3.0, 4.0));
    }

    #[test]
    fn ties_break_to_first_encountered() {
        let scratch = [
            [1.0, 0.0, 2.0, 2.0],
            [1.0, 0.0, 9.0, 9.0],
        ];
        let (cost, x, y) = host_reduce(&scratch);
        assert_eq!(cost, 1.0);
        assert_eq!((x, y), (2.0, 2.0));
    }
}
