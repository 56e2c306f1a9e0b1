use log::info;
use plotters::coord::Shift;
use plotters::prelude::PathElement;
use plotters::prelude::*;

use crate::field::FieldSeries;
use crate::utils::DynError;

pub use plotters::prelude::{RGBColor, BLACK, BLUE, CYAN, GREEN, MAGENTA, RED, WHITE, YELLOW};

pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const PLOT_FONT_SCALE: f64 = 1.2;
pub const FIGURE_SIZE: (u32, u32) = (1280, 720);
const COLORBAR_WIDTH: u32 = 160;
const COLORBAR_STEPS: usize = 256;

/// Line colors cycled across series of one panel.
pub const SERIES_COLORS: [RGBColor; 6] = [BLUE, GREEN, RED, MAGENTA, CYAN, BLACK];

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

pub fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

/// Tick label that stays readable for SI quantities spanning many decades.
fn tick_label(v: &f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e4).contains(&a) {
        format!("{v:.2e}")
    } else {
        format!("{v:.3}")
    }
}

/// Widen a degenerate or non-finite range so plotters can build an axis.
fn padded_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max > min {
        (min, max)
    } else {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
        (min - pad, max + pad)
    }
}

fn extent(values: &[f64]) -> (f64, f64) {
    (
        values.iter().cloned().fold(f64::INFINITY, f64::min),
        values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    )
}

/// matplotlib-style "jet": blue -> cyan -> yellow -> red over `[0, 1]`.
pub fn jet_color(x: f64) -> RGBColor {
    let x = if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |offset: f64| -> u8 {
        let v = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (255.0 * v).round() as u8
    };
    RGBColor(channel(3.0), channel(2.0), channel(1.0))
}

/// One panel of line series sharing an x axis.
pub struct LinePanel<'a> {
    pub x_vals: &'a [f64],
    pub series: Vec<(&'a [f64], RGBColor, String)>,
    pub caption: Option<String>,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub y_range: Option<(f64, f64)>,
}

pub fn draw_line_panel(area: &Area<'_>, panel: &LinePanel<'_>) -> Result<(), DynError> {
    if panel.series.is_empty() {
        return Err("No series provided to plot".into());
    }
    for (data_series, _, _) in panel.series.iter() {
        if data_series.len() != panel.x_vals.len() {
            return Err("X-value vector length does not match data length".into());
        }
    }
    if panel.x_vals.is_empty() {
        return Err("No data points to plot".into());
    }

    let (x_min, x_max) = extent(panel.x_vals);
    let (x_min, x_max) = padded_range(x_min, x_max);

    let (min_val, max_val) = if let Some(range) = panel.y_range {
        range
    } else {
        let mut min_val = f64::INFINITY;
        let mut max_val = f64::NEG_INFINITY;
        for (data_series, _, _) in panel.series.iter() {
            let (lo, hi) = extent(data_series);
            min_val = min_val.min(lo);
            max_val = max_val.max(hi);
        }
        (min_val, max_val)
    };
    let (min_val, max_val) = padded_range(min_val, max_val);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(80));
    if let Some(caption) = panel.caption.as_deref() {
        builder.caption(caption, ("sans-serif", scaled_font_size(20)).into_font());
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_label)
        .y_desc(panel.y_label)
        .x_label_formatter(&tick_label)
        .y_label_formatter(&tick_label)
        .label_style(("sans-serif", scaled_font_size(14)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(16)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for (data_series, color, label) in panel.series.iter() {
        let color = *color;
        chart
            .draw_series(LineSeries::new(
                panel
                    .x_vals
                    .iter()
                    .zip(data_series.iter())
                    .map(|(x, y)| (*x, *y)),
                color,
            ))?
            .label(label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(14)).into_font())
        .draw()?;

    Ok(())
}

/// Panels stacked vertically on one area, with an optional figure title.
pub fn draw_stacked_panels(
    root: &Area<'_>,
    panels: &[LinePanel<'_>],
    title: Option<&str>,
) -> Result<(), DynError> {
    if panels.is_empty() {
        return Err("No panels to draw".into());
    }
    root.fill(&WHITE)?;
    let body = match title {
        Some(text) => root.titled(text, ("sans-serif", scaled_font_size(20)).into_font())?,
        None => root.clone(),
    };
    let areas = body.split_evenly((panels.len(), 1));
    for (area, panel) in areas.iter().zip(panels.iter()) {
        draw_line_panel(area, panel)?;
    }
    Ok(())
}

pub fn plot_stacked_panels(
    filename: &str,
    size: (u32, u32),
    panels: &[LinePanel<'_>],
    title: Option<&str>,
) -> Result<(), DynError> {
    let root = BitMapBackend::new(filename, size).into_drawing_area();
    draw_stacked_panels(&root, panels, title)?;
    root.present()?;
    info!("[plot] Wrote {}", filename);
    Ok(())
}

/// Curve drawn over a pseudocolor map.
pub struct Overlay<'a> {
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub label: &'a str,
}

/// Part of the segment `p -> q` inside `[x0, x1] x [y0, y1]`.
fn clip_segment(
    p: (f64, f64),
    q: (f64, f64),
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    if ![p.0, p.1, q.0, q.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (q.0 - p.0, q.1 - p.1);
    let (mut t_in, mut t_out) = (0.0f64, 1.0f64);
    for (den, num) in [(-dx, p.0 - x0), (dx, x1 - p.0), (-dy, p.1 - y0), (dy, y1 - p.1)] {
        if den == 0.0 {
            if num < 0.0 {
                return None;
            }
            continue;
        }
        let r = num / den;
        if den < 0.0 {
            t_in = t_in.max(r);
        } else {
            t_out = t_out.min(r);
        }
        if t_in > t_out {
            return None;
        }
    }
    let at = |t: f64| (p.0 + t * dx, p.1 + t * dy);
    let start = if t_in == 0.0 { p } else { at(t_in) };
    let end = if t_out == 1.0 { q } else { at(t_out) };
    Some((start, end))
}

/// Visible pieces of a polyline, cut where it crosses the box edges.
pub fn clip_polyline(
    points: &[(f64, f64)],
    x_range: (f64, f64),
    y_range: (f64, f64),
) -> Vec<Vec<(f64, f64)>> {
    let mut pieces = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for pair in points.windows(2) {
        match clip_segment(pair[0], pair[1], x_range, y_range) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    if current.len() > 1 {
                        pieces.push(std::mem::take(&mut current));
                    }
                    current = vec![start];
                }
                current.push(end);
            }
            None => {
                if current.len() > 1 {
                    pieces.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if current.len() > 1 {
        pieces.push(current);
    }
    pieces
}

/// Pseudocolor map of `values` (rows along `y_vals`, columns along `x_vals`)
/// with a colorbar, in the manner of `pcolormesh`.
pub fn plot_pcolormesh(
    filename: &str,
    x_vals: &[f64],
    y_vals: &[f64],
    values: &FieldSeries,
    (vmin, vmax): (f64, f64),
    overlays: &[Overlay<'_>],
    title: &str,
    x_label: &str,
    y_label: &str,
) -> Result<(), DynError> {
    if values.rows() != y_vals.len() || values.cols() != x_vals.len() {
        return Err(format!(
            "Map shape {}x{} does not match axes {}x{}",
            values.rows(),
            values.cols(),
            y_vals.len(),
            x_vals.len()
        )
        .into());
    }
    if values.is_empty() {
        return Err("No map cells to plot".into());
    }

    let cell_step = |axis: &[f64]| if axis.len() > 1 { axis[1] - axis[0] } else { 1.0 };
    let dx = cell_step(x_vals);
    let dy = cell_step(y_vals);
    let (x_min, x_max) = extent(x_vals);
    let (y_min, y_max) = extent(y_vals);
    let (x_lo, x_hi) = padded_range(x_min, x_max + dx);
    let (y_lo, y_hi) = padded_range(y_min, y_max + dy);

    let root = BitMapBackend::new(filename, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (main_area, bar_area) = root.split_horizontally(FIGURE_SIZE.0 - COLORBAR_WIDTH);

    let mut chart = ChartBuilder::on(&main_area)
        .caption(title, ("sans-serif", scaled_font_size(24)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(70))
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .x_label_formatter(&tick_label)
        .y_label_formatter(&tick_label)
        .label_style(("sans-serif", scaled_font_size(16)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    let span = vmax - vmin;
    let normalize = move |v: f64| if span > 0.0 { (v - vmin) / span } else { 0.0 };
    chart.draw_series((0..values.rows()).flat_map(|t| {
        (0..values.cols()).map(move |x| {
            let x0 = x_vals[x];
            let y0 = y_vals[t];
            Rectangle::new(
                [(x0, y0), (x0 + dx, y0 + dy)],
                jet_color(normalize(values.get(t, x))).filled(),
            )
        })
    }))?;

    for overlay in overlays {
        let color = overlay.color;
        let pieces = clip_polyline(&overlay.points, (x_lo, x_hi), (y_lo, y_hi));
        for (n, piece) in pieces.into_iter().enumerate() {
            let series = chart.draw_series(LineSeries::new(piece, color.stroke_width(2)))?;
            if n == 0 {
                series
                    .label(overlay.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
            }
        }
    }
    if !overlays.is_empty() {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.6))
            .label_font(("sans-serif", scaled_font_size(16)).into_font())
            .draw()?;
    }

    draw_colorbar(&bar_area, vmin, vmax)?;

    root.present()?;
    info!("[plot] Wrote {}", filename);
    Ok(())
}

fn draw_colorbar(area: &Area<'_>, vmin: f64, vmax: f64) -> Result<(), DynError> {
    let (lo, hi) = padded_range(vmin, vmax);
    let mut bar = ChartBuilder::on(area)
        .margin_top(scaled_area_size(40))
        .margin_bottom(scaled_area_size(50))
        .margin_right(10)
        .y_label_area_size(scaled_area_size(90))
        .build_cartesian_2d(0.0..1.0, lo..hi)?;
    bar.configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_label_formatter(&tick_label)
        .label_style(("sans-serif", scaled_font_size(14)).into_font())
        .draw()?;
    let step = (hi - lo) / COLORBAR_STEPS as f64;
    bar.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y0 = lo + step * i as f64;
        let frac = (i as f64 + 0.5) / COLORBAR_STEPS as f64;
        Rectangle::new([(0.0, y0), (1.0, y0 + step)], jet_color(frac).filled())
    }))?;
    Ok(())
}

/// Scatter markers and connecting segments on a horizontal-line chart.
pub struct SegmentRow {
    pub y: f64,
    pub points: [f64; 2],
    pub segments: Vec<(f64, f64)>,
    pub color: RGBColor,
}

pub fn plot_segment_rows(
    filename: &str,
    rows: &[SegmentRow],
    x_range: (f64, f64),
    title: &str,
) -> Result<(), DynError> {
    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let y_max = rows.iter().map(|r| r.y).fold(0.0, f64::max) + 1.0;
    let (x_lo, x_hi) = padded_range(x_range.0, x_range.1);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(20)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(50))
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_label_formatter(&tick_label)
        .label_style(("sans-serif", scaled_font_size(14)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for row in rows {
        let color = row.color;
        chart.draw_series(
            row.points
                .iter()
                .map(|&x| Circle::new((x, row.y), 4, color.filled())),
        )?;
        for &(a, b) in &row.segments {
            chart.draw_series(LineSeries::new(vec![(a, row.y), (b, row.y)], color))?;
        }
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jet_spans_blue_to_red() {
        assert_eq!(jet_color(0.0), RGBColor(0, 0, 128));
        assert_eq!(jet_color(1.0), RGBColor(128, 0, 0));
        let mid = jet_color(0.5);
        assert_eq!(mid.1, 255);
        assert_eq!(jet_color(f64::NAN), jet_color(0.0));
        assert_eq!(jet_color(-4.0), jet_color(0.0));
    }

    #[test]
    fn degenerate_ranges_are_padded() {
        assert_eq!(padded_range(0.0, 0.0), (-1.0, 1.0));
        let (lo, hi) = padded_range(2.0, 2.0);
        assert!(lo < 2.0 && hi > 2.0);
        assert_eq!(padded_range(f64::INFINITY, f64::NEG_INFINITY), (0.0, 1.0));
        assert_eq!(padded_range(-1.0, 3.0), (-1.0, 3.0));
    }

    #[test]
    fn tick_labels_switch_to_scientific() {
        assert_eq!(tick_label(&0.5), "0.500");
        assert_eq!(tick_label(&0.0), "0.000");
        assert_eq!(tick_label(&1.5e-9), "1.50e-9");
    }

    #[test]
    fn pcolormesh_rejects_mismatched_axes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let map = FieldSeries::zeros(3, 4);
        let err = plot_pcolormesh(
            path.to_str().unwrap(),
            &[0.0, 1.0, 2.0],
            &[0.0, 1.0, 2.0],
            &map,
            (0.0, 1.0),
            &[],
            "t",
            "x",
            "y",
        );
        assert!(err.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn overlay_leaving_the_map_stops_at_the_edge() {
        let rising = [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)];
        let pieces = clip_polyline(&rising, (0.0, 3.0), (0.0, 2.0));
        assert_eq!(pieces.len(), 1);
        assert_eq!(&pieces[0][..2], &[(0.0, 0.0), (1.0, 1.0)]);
        let (x, y) = pieces[0][2];
        assert!((x - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(y, 2.0);

        let inside = [(0.5, 0.5), (1.0, 1.5)];
        assert_eq!(clip_polyline(&inside, (0.0, 3.0), (0.0, 2.0)), vec![inside.to_vec()]);
        let above = [(0.0, 5.0), (3.0, 6.0)];
        assert!(clip_polyline(&above, (0.0, 3.0), (0.0, 2.0)).is_empty());
    }

    #[test]
    fn overlay_reentering_the_map_is_split() {
        let hump = [(0.0, 1.0), (1.0, 3.0), (2.0, 1.0)];
        let pieces = clip_polyline(&hump, (0.0, 2.0), (0.0, 2.0));
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0][0], (0.0, 1.0));
        assert!((pieces[0][1].0 - 0.5).abs() < 1e-12);
        assert!((pieces[1][0].0 - 1.5).abs() < 1e-12);
        assert_eq!(pieces[1][1], (2.0, 1.0));
    }

    #[test]
    fn pcolormesh_draws_overlays_past_the_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let map = FieldSeries::from_fn(3, 4, |t, x| (t * 4 + x) as f64);
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 0.5, 1.0];
        let curve = Overlay {
            points: x.iter().map(|&k| (k, 1.0 + k * k)).collect(),
            color: RED,
            label: "curve",
        };
        let outside = Overlay {
            points: vec![(0.0, 10.0), (3.0, 12.0)],
            color: BLUE,
            label: "outside",
        };
        plot_pcolormesh(
            path.to_str().unwrap(),
            &x,
            &y,
            &map,
            (0.0, 11.0),
            &[curve, outside],
            "t",
            "x",
            "y",
        )
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn line_panel_rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.png");
        let root = BitMapBackend::new(&path, (64, 64)).into_drawing_area();
        let y = [1.0, 2.0];
        let panel = LinePanel {
            x_vals: &[0.0, 1.0, 2.0],
            series: vec![(&y[..], BLUE, "y".to_string())],
            caption: None,
            x_label: "x",
            y_label: "y",
            y_range: None,
        };
        assert!(draw_line_panel(&root, &panel).is_err());
    }
}
