//! Terminal preview of the published series, laid out like the widget's
//! contribution grid: one column per week, one row per weekday, oldest day in
//! the top-left corner.

use ansi_term::Colour;

use crate::{
    config::Rgba,
    sync::{store::UsageSeries, window::UsageDay},
};

const CELL: &str = "■ ";
const EMPTY_CELL: &str = "  ";

pub fn render(series: &UsageSeries) -> String {
    let days = &series.days;
    let mut out = String::new();

    if days.is_empty() {
        out.push_str("No days in the published series\n");
        return out;
    }

    out.push_str(&format!(
        "{} – {}\n",
        days.first().map(|d| d.date.to_string()).unwrap_or_default(),
        days.last().map(|d| d.date.to_string()).unwrap_or_default(),
    ));

    let weeks = days.chunks(7).collect::<Vec<_>>();
    for row in 0..7 {
        for week in &weeks {
            match week.get(row) {
                Some(day) => out.push_str(&paint(day)),
                None => out.push_str(EMPTY_CELL),
            }
        }
        out.push('\n');
    }

    let active = days.iter().filter(|d| d.seconds > 0).count();
    let total_hours = days.iter().map(|d| d.seconds).sum::<u64>() as f64 / 3600.0;
    out.push_str(&format!(
        "{} days · {} active · {:.1}h total · updated {}\n",
        days.len(),
        active,
        total_hours,
        series.last_updated.format("%Y-%m-%d %H:%M UTC"),
    ));

    out
}

fn paint(day: &UsageDay) -> String {
    let (r, g, b) = match day.color {
        Some(color) => rgb_on_dark(color),
        // No resolved color, fall back to the intensity ramp.
        None => rgb_on_dark(Rgba::new(0.0, 1.0, 0.0, day.intensity.opacity())),
    };
    Colour::RGB(r, g, b).paint(CELL).to_string()
}

/// Collapses the alpha channel by scaling towards the (dark) terminal
/// background.
fn rgb_on_dark(color: Rgba) -> (u8, u8, u8) {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * color.alpha.clamp(0.0, 1.0) * 255.0) as u8;
    (channel(color.red), channel(color.green), channel(color.blue))
}
