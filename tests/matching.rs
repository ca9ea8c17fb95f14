use futures::executor::block_on;

use rotmatch::{Dtype, Engine, EngineConfig, InputPlane, OutputDtype, ResultOrigin};

fn plane(samples: &[f32]) -> InputPlane<'_> {
    InputPlane {
        samples,
        dtype: Dtype::F32,
    }
}

fn zeros(w: u32, h: u32) -> Vec<f32> {
    vec![0.0; (w as usize) * (h as usize)]
}

fn paint_block(buf: &mut [f32], w: u32, x: u32, y: u32, bw: u32, bh: u32, value: f32) {
    for row in 0..bh {
        for col in 0..bw {
            let idx = ((y + row) * w + (x + col)) as usize;
            buf[idx] = value;
        }
    }
}

/// Scenario 1: exact match on a tiny grayscale texture.
#[test]
fn exact_match_tiny_grayscale() {
    let mut engine = block_on(Engine::new(EngineConfig::default())).expect("engine");

    let (tw, th) = (8, 8);
    let (kw, kh) = (3, 3);
    let mut texture = zeros(tw, th);
    paint_block(&mut texture, tw, 2, 3, kw, kh, 1.0);
    let kernel = vec![1.0f32; (kw * kh) as usize];

    let result = engine
        .match_plain("tiny-gray".into(), &[plane(&texture)], tw, th, &[plane(&kernel)], kw, kh, 0.0)
        .expect("match succeeds");

    assert_eq!(result.surface_width, 6);
    assert_eq!(result.surface_height, 6);
    assert_eq!((result.best.x, result.best.y), (2, 3));
    assert_eq!(result.best.cost, 0.0);
}

/// Scenario 2: two feature maps, identical planes everywhere, zero cost
/// regardless of offset.
#[test]
fn two_planes_zero_cost_everywhere() {
    let mut engine = block_on(Engine::new(EngineConfig::default())).expect("engine");

    let (tw, th) = (6, 6);
    let (kw, kh) = (3, 3);
    let texture_a = vec![2.0f32; (tw * th) as usize];
    let texture_b = vec![3.0f32; (tw * th) as usize];
    let kernel_a = vec![2.0f32; (kw * kh) as usize];
    let kernel_b = vec![3.0f32; (kw * kh) as usize];

    let result = engine
        .match_plain(
            "uniform".into(),
            &[plane(&texture_a), plane(&texture_b)],
            tw,
            th,
            &[plane(&kernel_a), plane(&kernel_b)],
            kw,
            kh,
            0.0,
        )
        .expect("match succeeds");

    assert!(result.cost_surface.iter().all(|&c| c == 0.0));
    assert_eq!((result.best.x, result.best.y), (0, 0));
    assert_eq!(result.best.cost, 0.0);
}

/// Scenario 3: five feature maps force a second ping-pong batch; the
/// kernel is the texture's own window at (1, 1), so the exact match sits
/// there regardless of which accumulator surface the final total landed in.
#[test]
fn five_channel_ping_pong_finds_embedded_window() {
    let mut engine = block_on(Engine::new(EngineConfig::default())).expect("engine");

    let (tw, th) = (6, 6);
    let (kw, kh) = (3, 3);

    let mut textures: Vec<Vec<f32>> = Vec::new();
    let mut kernels: Vec<Vec<f32>> = Vec::new();
    for n in 0..5u32 {
        let mut texture = zeros(tw, th);
        for y in 0..th {
            for x in 0..tw {
                texture[(y * tw + x) as usize] = (n + x + 2 * y) as f32;
            }
        }
        let mut kernel = vec![0.0f32; (kw * kh) as usize];
        for y in 0..kh {
            for x in 0..kw {
                kernel[(y * kw + x) as usize] = texture[((y + 1) * tw + (x + 1)) as usize];
            }
        }
        textures.push(texture);
        kernels.push(kernel);
    }
    let texture_planes: Vec<InputPlane<'_>> = textures.iter().map(|t| plane(t)).collect();
    let kernel_planes: Vec<InputPlane<'_>> = kernels.iter().map(|k| plane(k)).collect();

    let result = engine
        .match_plain("five-channel".into(), &texture_planes, tw, th, &kernel_planes, kw, kh, 0.0)
        .expect("match succeeds");

    assert_eq!((result.best.x, result.best.y), (1, 1));
    assert!(result.best.cost.abs() < 1e-4);
}

/// Scenario 4 (reduced): the geometry law a 45-degree rotation must satisfy
/// end to end through the public API, since hand-constructing a bit-exact
/// rotated fixture would only re-derive the shader's own sampling formula.
#[test]
fn forty_five_degree_rotation_shrinks_output_by_the_rotated_bbox_overlap() {
    let engine_cfg = EngineConfig {
        result_origin: ResultOrigin::Center,
        ..EngineConfig::default()
    };
    let engine = block_on(Engine::new(engine_cfg)).expect("engine");

    let (w, h, channels) = engine
        .output_shape(64, 64, 5, 5, std::f64::consts::FRAC_PI_4)
        .expect("valid shape");

    assert_eq!(channels, 1);
    // A 5x5 kernel rotated 45 degrees about its center has corners at
    // distance 2*sqrt(2) from the pivot; floor(2.8284) = 2 and
    // floor(-2.8284) = -3 give a 6x6 bbox split unevenly into a
    // left/top overlap of 3 and a right/bottom overlap of 2.
    assert_eq!(w, 64 - 3 - 2);
    assert_eq!(h, 64 - 3 - 2);
    assert_eq!(engine.output_dtype(), OutputDtype);
}

/// Scenario 5: a texture mask blanks out the otherwise-unique zero-cost
/// location; matching without erosion must avoid only the anchor pixel,
/// and with erosion must avoid the whole kernel footprint.
#[test]
fn masked_match_avoids_blocked_region() {
    let mut engine = block_on(Engine::new(EngineConfig::default())).expect("engine");

    let (tw, th) = (12, 12);
    let (kw, kh) = (3, 3);
    let mut texture = zeros(tw, th);
    paint_block(&mut texture, tw, 5, 5, kw, kh, 1.0);
    let kernel = vec![1.0f32; (kw * kh) as usize];

    let mut mask = vec![1.0f32; (tw * th) as usize];
    paint_block(&mut mask, tw, 5, 5, 3, 3, 0.0);

    let unmasked = engine
        .match_plain("masked-a".into(), &[plane(&texture)], tw, th, &[plane(&kernel)], kw, kh, 0.0)
        .expect("match succeeds");
    assert_eq!((unmasked.best.x, unmasked.best.y), (5, 5));
    assert_eq!(unmasked.best.cost, 0.0);

    let anchor_masked = engine
        .match_with_texture_mask(
            "masked-a".into(),
            &[plane(&texture)],
            tw,
            th,
            &mask,
            Dtype::F32,
            &[plane(&kernel)],
            kw,
            kh,
            0.0,
            false,
        )
        .expect("match succeeds");
    assert_ne!((anchor_masked.best.x, anchor_masked.best.y), (5, 5));

    let eroded = engine
        .match_with_texture_mask(
            "masked-a".into(),
            &[plane(&texture)],
            tw,
            th,
            &mask,
            Dtype::F32,
            &[plane(&kernel)],
            kw,
            kh,
            0.0,
            true,
        )
        .expect("match succeeds");
    assert_ne!((eroded.best.x, eroded.best.y), (5, 5));
}

/// Scenario 6: calling match twice with the same texture id reuses the
/// resource-cache slot (exercised indirectly: both calls must still agree
/// bit-for-bit).
#[test]
fn repeated_texture_id_is_idempotent() {
    let mut engine = block_on(Engine::new(EngineConfig::default())).expect("engine");

    let (tw, th) = (8, 8);
    let (kw, kh) = (3, 3);
    let mut texture = zeros(tw, th);
    paint_block(&mut texture, tw, 2, 3, kw, kh, 1.0);
    let kernel = vec![1.0f32; (kw * kh) as usize];

    let first = engine
        .match_plain("reused".into(), &[plane(&texture)], tw, th, &[plane(&kernel)], kw, kh, 0.0)
        .expect("match succeeds");
    let second = engine
        .match_plain("reused".into(), &[plane(&texture)], tw, th, &[plane(&kernel)], kw, kh, 0.0)
        .expect("match succeeds");

    assert_eq!(first.best.x, second.best.x);
    assert_eq!(first.best.y, second.best.y);
    assert_eq!(first.best.cost, second.best.cost);
}
