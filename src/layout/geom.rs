use super::{LayoutParams, PixelRect, SurfaceSize};
use crate::protocol::{NormalizedPoint, NormalizedRect};

pub fn to_surface_rect(rect: &NormalizedRect, surface: SurfaceSize) -> PixelRect {
    PixelRect {
        x: rect.x * surface.width,
        y: (1.0 - rect.y - rect.height) * surface.height,
        width: rect.width * surface.width,
        height: rect.height * surface.height,
    }
}

pub fn is_noise(rect: &PixelRect, params: &LayoutParams) -> bool {
    rect.width < params.noise_min_width || rect.height < params.noise_min_height
}

pub fn pad(rect: &PixelRect, padding: f64) -> PixelRect {
    PixelRect {
        x: rect.x - padding,
        y: rect.y - padding,
        width: rect.width + padding * 2.0,
        height: rect.height + padding * 2.0,
    }
}

pub fn rotation_degrees(
    top_left: NormalizedPoint,
    top_right: NormalizedPoint,
    surface: SurfaceSize,
) -> f64 {
    let dx = (top_right.x - top_left.x) * surface.width;
    let dy = (top_right.y - top_left.y) * surface.height;
    (-dy).atan2(dx).to_degrees()
}

pub fn visible_rotation(angle: f64, params: &LayoutParams) -> Option<f64> {
    (angle.abs() > params.rotation_threshold).then_some(angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> SurfaceSize {
        SurfaceSize::new(800.0, 600.0)
    }

    #[test]
    fn flips_vertical_origin() {
        let rect = NormalizedRect {
            x: 0.25,
            y: 0.5,
            width: 0.5,
            height: 0.125,
        };
        let px = to_surface_rect(&rect, surface());
        assert_eq!(
            px,
            PixelRect {
                x: 200.0,
                y: 225.0,
                width: 400.0,
                height: 75.0,
            }
        );
    }

    #[test]
    fn noise_thresholds_are_exclusive() {
        let params = LayoutParams::default();
        let base = PixelRect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 8.0,
        };
        assert!(!is_noise(&base, &params));
        assert!(is_noise(&PixelRect { width: 9.99, ..base }, &params));
        assert!(is_noise(&PixelRect { height: 7.5, ..base }, &params));
    }

    #[test]
    fn padding_grows_every_side() {
        let rect = PixelRect {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 12.0,
        };
        assert_eq!(
            pad(&rect, 1.0),
            PixelRect {
                x: 9.0,
                y: 19.0,
                width: 32.0,
                height: 14.0,
            }
        );
    }

    #[test]
    fn axis_aligned_line_has_no_rotation() {
        let angle = rotation_degrees(
            NormalizedPoint { x: 0.0, y: 1.0 },
            NormalizedPoint { x: 1.0, y: 1.0 },
            surface(),
        );
        assert_eq!(angle, 0.0);
        assert_eq!(visible_rotation(angle, &LayoutParams::default()), None);
    }

    #[test]
    fn rising_baseline_turns_counter_clockwise() {
        // 100px right and 100px up on screen.
        let angle = rotation_degrees(
            NormalizedPoint { x: 0.0, y: 0.5 },
            NormalizedPoint { x: 0.125, y: 0.5 + 100.0 / 600.0 },
            surface(),
        );
        assert!((angle + 45.0).abs() < 1e-9, "{angle}");
        assert_eq!(visible_rotation(angle, &LayoutParams::default()), Some(angle));
    }

    #[test]
    fn rotation_uses_surface_aspect() {
        // Equal normalized deltas on a wide surface are shallower than 45 degrees.
        let angle = rotation_degrees(
            NormalizedPoint { x: 0.0, y: 0.5 },
            NormalizedPoint { x: 0.1, y: 0.4 },
            surface(),
        );
        let expected = (60.0_f64).atan2(80.0).to_degrees();
        assert!((angle - expected).abs() < 1e-9, "{angle}");
    }

    #[test]
    fn small_tilt_is_ignored() {
        let params = LayoutParams::default();
        assert_eq!(visible_rotation(0.5, &params), None);
        assert_eq!(visible_rotation(-0.4, &params), None);
        assert_eq!(visible_rotation(-0.51, &params), Some(-0.51));
    }
}
