// Bar-chart rasters for the four per-image histograms. The bin math lives in
// `statistics`; this module only maps counts onto pixels.

use crate::core_modules::statistics::{Histogram, Metric};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const EDGE: Rgb<u8> = Rgb([0, 0, 0]);
const MARGIN: u32 = 40;

pub fn metric_color(metric: Metric) -> Rgb<u8> {
    match metric {
        Metric::Widths => Rgb([0, 0, 255]),
        Metric::Heights => Rgb([0, 128, 0]),
        Metric::XPositions => Rgb([128, 0, 128]),
        Metric::YPositions => Rgb([255, 165, 0]),
    }
}

/// Draws `histogram` as a `width` x `height` bar chart.
pub fn render_histogram(histogram: &Histogram, metric: Metric, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    let plot_width = width.saturating_sub(2 * MARGIN).max(1);
    let plot_height = height.saturating_sub(2 * MARGIN).max(1);
    let origin_x = MARGIN as f32;
    let origin_y = (MARGIN + plot_height) as f32;

    let bins = histogram.counts.len().max(1) as u32;
    let max_count = histogram.max_count().max(1) as f64;
    let bar_width = (plot_width as f64 / bins as f64).max(1.0);
    let color = metric_color(metric);

    for (index, &count) in histogram.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let bar_height = ((count as f64 / max_count) * plot_height as f64).round().max(1.0) as u32;
        let left = MARGIN as i32 + (index as f64 * bar_width).round() as i32;
        let top = (MARGIN + plot_height - bar_height) as i32;
        let rect = Rect::at(left, top).of_size(bar_width.round().max(1.0) as u32, bar_height);
        draw_filled_rect_mut(&mut canvas, rect, color);
        draw_hollow_rect_mut(&mut canvas, rect, EDGE);
    }

    // Axes
    draw_line_segment_mut(
        &mut canvas,
        (origin_x, origin_y),
        (origin_x + plot_width as f32, origin_y),
        EDGE,
    );
    draw_line_segment_mut(&mut canvas, (origin_x, origin_y), (origin_x, MARGIN as f32), EDGE);

    canvas
}
