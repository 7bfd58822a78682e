//! Translation between the service's relative grid and device pixels.
//!
//! Nothing relative is ever handed to a surface directly: every click target
//! goes through [`CoordinateMapper::to_live`].
use rand::Rng;

use crate::perception::types::{DevicePoint, RelativePoint, Viewport, RELATIVE_MAX};

/// Largest per-axis offset added to interior points of a pointer path.
pub const PATH_JITTER_PX: i32 = 2;

/// Relative grid → device pixels of `viewport`.
pub fn to_device(p: RelativePoint, viewport: Viewport) -> DevicePoint {
    let x = (p.x as f64 * viewport.width as f64 / RELATIVE_MAX as f64).round() as i32;
    let y = (p.y as f64 * viewport.height as f64 / RELATIVE_MAX as f64).round() as i32;
    DevicePoint::new(x, y)
}

/// Device pixels of `viewport` → relative grid.
pub fn to_relative(p: DevicePoint, viewport: Viewport) -> RelativePoint {
    let w = viewport.width.max(1) as f64;
    let h = viewport.height.max(1) as f64;
    let x = (p.x as f64 * RELATIVE_MAX as f64 / w).round() as i32;
    let y = (p.y as f64 * RELATIVE_MAX as f64 / h).round() as i32;
    RelativePoint::new(x, y)
}

/// Keep `p` inside `[margin, size - margin]` on both axes.
///
/// A margin larger than half the viewport collapses to the centre line.
pub fn clamp(p: DevicePoint, viewport: Viewport, margin: i32) -> DevicePoint {
    let w = viewport.width as i32;
    let h = viewport.height as i32;
    let mx = margin.clamp(0, w / 2);
    let my = margin.clamp(0, h / 2);
    DevicePoint::new(p.x.clamp(mx, w - mx), p.y.clamp(my, h - my))
}

/// Proportional rescale between two pixel spaces, e.g. a downsized
/// screenshot and the live viewport it was taken from.
pub fn rescale(p: DevicePoint, from: Viewport, to: Viewport) -> DevicePoint {
    if from == to {
        return p;
    }
    let sx = to.width as f64 / from.width.max(1) as f64;
    let sy = to.height as f64 / from.height.max(1) as f64;
    DevicePoint::new(
        (p.x as f64 * sx).round() as i32,
        (p.y as f64 * sy).round() as i32,
    )
}

/// Smoothstep easing: slow start, fast middle, slow finish.
fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// `steps + 1` points from `from` to `to` along an eased curve.
///
/// Endpoints are exact; interior points carry up to [`PATH_JITTER_PX`] of
/// jitter per axis. `steps == 0` means jump straight to `to`.
pub fn smooth_path<R: Rng + ?Sized>(
    from: DevicePoint,
    to: DevicePoint,
    steps: usize,
    rng: &mut R,
) -> Vec<DevicePoint> {
    if steps == 0 {
        return vec![to];
    }
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;

    (0..=steps)
        .map(|i| {
            if i == 0 {
                return from;
            }
            if i == steps {
                return to;
            }
            let e = ease_in_out(i as f64 / steps as f64);
            let jx = rng.random_range(-PATH_JITTER_PX..=PATH_JITTER_PX);
            let jy = rng.random_range(-PATH_JITTER_PX..=PATH_JITTER_PX);
            DevicePoint::new(
                from.x + (dx * e).round() as i32 + jx,
                from.y + (dy * e).round() as i32 + jy,
            )
        })
        .collect()
}

/// Maps service coordinates onto the live surface.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    /// Size of the frame the service looked at.
    pub screenshot: Viewport,
    /// Size of the surface actions land on.
    pub live: Viewport,
    pub margin: i32,
}

impl CoordinateMapper {
    pub fn new(screenshot: Viewport, live: Viewport, margin: i32) -> Self {
        Self { screenshot, live, margin }
    }

    pub fn to_live(&self, p: RelativePoint) -> DevicePoint {
        let in_frame = to_device(p, self.screenshot);
        let on_surface = rescale(in_frame, self.screenshot, self.live);
        clamp(on_surface, self.live, self.margin)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const VIEWPORTS: [Viewport; 4] = [
        Viewport { width: 1280, height: 800 },
        Viewport { width: 1920, height: 1080 },
        Viewport { width: 375, height: 812 },
        Viewport { width: 333, height: 77 },
    ];

    #[test]
    fn device_round_trip_is_stable_within_one_pixel() {
        for v in VIEWPORTS {
            for x in (0..=RELATIVE_MAX).step_by(37) {
                for y in (0..=RELATIVE_MAX).step_by(41) {
                    let d = to_device(RelativePoint::new(x, y), v);
                    let back = to_device(to_relative(d, v), v);
                    assert!((back.x - d.x).abs() <= 1, "{v:?} x={x}: {d:?} vs {back:?}");
                    assert!((back.y - d.y).abs() <= 1, "{v:?} y={y}: {d:?} vs {back:?}");
                }
            }
        }
    }

    #[test]
    fn grid_corners_map_to_viewport_corners() {
        let v = Viewport::new(1280, 800);
        assert_eq!(to_device(RelativePoint::new(0, 0), v), DevicePoint::new(0, 0));
        assert_eq!(to_device(RelativePoint::new(500, 500), v), DevicePoint::new(640, 400));
        assert_eq!(to_device(RelativePoint::new(1000, 1000), v), DevicePoint::new(1280, 800));
    }

    #[test]
    fn clamp_holds_for_far_outside_points() {
        let margin = 5;
        for v in VIEWPORTS {
            for p in [
                DevicePoint::new(-100_000, -3),
                DevicePoint::new(100_000, 100_000),
                DevicePoint::new(2, 99_999),
                DevicePoint::new(i32::MIN, i32::MAX),
            ] {
                let c = clamp(p, v, margin);
                assert!(c.x >= margin && c.x <= v.width as i32 - margin, "{v:?} {c:?}");
                assert!(c.y >= margin && c.y <= v.height as i32 - margin, "{v:?} {c:?}");
            }
        }
    }

    #[test]
    fn oversized_margin_collapses_to_centre() {
        let v = Viewport::new(10, 6);
        let c = clamp(DevicePoint::new(0, 100), v, 50);
        assert_eq!(c, DevicePoint::new(5, 3));
    }

    #[test]
    fn smooth_path_has_n_plus_one_points_and_exact_ends() {
        let mut rng = StdRng::seed_from_u64(42);
        let from = DevicePoint::new(10, 700);
        let to = DevicePoint::new(900, 40);
        for n in [1usize, 2, 12, 40] {
            let path = smooth_path(from, to, n, &mut rng);
            assert_eq!(path.len(), n + 1);
            assert_eq!(path[0], from);
            assert_eq!(path[n], to);
        }
    }

    #[test]
    fn smooth_path_jitter_is_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let from = DevicePoint::new(0, 0);
        let to = DevicePoint::new(1000, 500);
        let steps = 20;
        let path = smooth_path(from, to, steps, &mut rng);
        for (i, p) in path.iter().enumerate() {
            let e = ease_in_out(i as f64 / steps as f64);
            let ideal_x = (1000.0 * e).round() as i32;
            let ideal_y = (500.0 * e).round() as i32;
            assert!((p.x - ideal_x).abs() <= PATH_JITTER_PX);
            assert!((p.y - ideal_y).abs() <= PATH_JITTER_PX);
        }
    }

    #[test]
    fn same_seed_gives_same_path() {
        let from = DevicePoint::new(3, 4);
        let to = DevicePoint::new(300, 400);
        let a = smooth_path(from, to, 10, &mut StdRng::seed_from_u64(1));
        let b = smooth_path(from, to, 10, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn mapper_rescales_downsized_frames() {
        let mapper = CoordinateMapper::new(
            Viewport::new(640, 400),
            Viewport::new(1280, 800),
            0,
        );
        assert_eq!(mapper.to_live(RelativePoint::new(250, 750)), DevicePoint::new(320, 600));
        assert_eq!(rescale(DevicePoint::new(100, 100), mapper.screenshot, mapper.live), DevicePoint::new(200, 200));
    }

    #[test]
    fn mapper_clamps_out_of_range_service_output() {
        let mapper = CoordinateMapper::new(Viewport::new(1280, 800), Viewport::new(1280, 800), 5);
        let p = mapper.to_live(RelativePoint::new(1500, -20));
        assert_eq!(p, DevicePoint::new(1275, 5));
    }
}
