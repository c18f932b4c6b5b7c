use super::backend::WindowInfo;
use crate::protocol::WindowBounds;

pub fn find_matching_window<'a>(
    windows: &'a [WindowInfo],
    bounds: &WindowBounds,
    tolerance: f64,
) -> Option<&'a WindowInfo> {
    let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
    windows.iter().find(|window| {
        close(window.x, bounds.x)
            && close(window.y, bounds.y)
            && close(window.width, bounds.width)
            && close(window.height, bounds.height)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u64, x: f64, y: f64, width: f64, height: f64) -> WindowInfo {
        WindowInfo {
            id,
            app_name: None,
            title: None,
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn matches_within_tolerance() {
        let windows = vec![
            window(1, 0.0, 0.0, 1920.0, 1080.0),
            window(7, 101.5, 99.0, 398.0, 301.0),
        ];
        let bounds = WindowBounds {
            x: 100.0,
            y: 100.0,
            width: 400.0,
            height: 300.0,
        };
        let found = find_matching_window(&windows, &bounds, 2.0).expect("match");
        assert_eq!(found.id, 7);
    }

    #[test]
    fn any_axis_out_of_tolerance_misses() {
        let windows = vec![window(7, 100.0, 100.0, 403.0, 300.0)];
        let bounds = WindowBounds {
            x: 100.0,
            y: 100.0,
            width: 400.0,
            height: 300.0,
        };
        assert!(find_matching_window(&windows, &bounds, 2.0).is_none());
    }
}
