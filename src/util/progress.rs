/// Render a progress bar: "[=====>....] 52.3%".
/// The interior is exactly `width` characters: floor(width * pct / 100)
/// fill characters, one '>' if any space remains, '.' padding to `width`.
/// At 100% no space remains and the '>' is omitted.
///
/// Lossy: only the fill/width ratio survives rendering, not the exact
/// fill-vs-transition split at boundaries, so re-parsing a rendered bar is
/// not guaranteed to recover the input percentage.
pub fn render_bar(percent: f64, width: usize) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let fill = (width as f64 * percent / 100.0).floor() as usize;
    let fill = fill.min(width);

    let mut bar = String::with_capacity(width + 10);
    bar.push('[');
    for _ in 0..fill {
        bar.push('=');
    }
    if fill < width {
        bar.push('>');
        for _ in 0..width - fill - 1 {
            bar.push('.');
        }
    }
    bar.push(']');
    bar.push_str(&format!(" {:.1}%", percent));
    bar
}
