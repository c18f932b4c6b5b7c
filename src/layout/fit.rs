pub fn fit_font_size<F>(box_height: f64, target_width: f64, min_font_size: f64, measure: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let initial = box_height.max(0.0);
    let measured = measure(initial);
    if measured <= target_width || measured <= 0.0 {
        return initial;
    }
    let scaled = initial * (target_width.max(0.0) / measured);
    scaled.max(min_font_size.min(initial)).min(initial)
}
