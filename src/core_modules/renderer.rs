// THEORY:
// The renderer draws the calibrated boxes back over the source image so a human
// can check what was measured. It owns no measurements and keeps no canvas
// between calls: each overview is its own pure function from
// (source image, measurements) to a new raster.
//
// Key principles:
// 1.  **Independent Passes**: `render_boxes` and `render_labeled` both start from
//     a fresh copy of the source. Producing one never depends on having
//     produced the other.
// 2.  **Shared Geometry**: Box placement comes straight from the truncated
//     `bbox_pixel_xmin/ymin` in each measurement, so overlays line up with the
//     numbers in the report.
// 3.  **Scoped Failure**: Writing one overview can fail without affecting the
//     other. `write_overviews` reports each artifact's outcome separately.

use crate::core_modules::calibration::CalibratedMeasurement;
use crate::core_modules::utils::glyphs;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Drawing parameters shared by both overviews.
#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub box_thickness: u32,
    pub label_margin_px: i32,
    pub label_scale: u32,
}

/// Source image with every bounding box drawn.
pub fn render_boxes(source: &RgbImage, measurements: &[CalibratedMeasurement], style: &RenderStyle) -> RgbImage {
    let mut canvas = source.clone();
    for measurement in measurements {
        draw_box(&mut canvas, measurement, style.box_thickness);
    }
    canvas
}

/// Source image with every bounding box and its width label.
pub fn render_labeled(source: &RgbImage, measurements: &[CalibratedMeasurement], style: &RenderStyle) -> RgbImage {
    let mut canvas = source.clone();
    for measurement in measurements {
        draw_box(&mut canvas, measurement, style.box_thickness);
    }
    for measurement in measurements {
        let label = format_width_label(measurement.width_nm);
        // Label baseline sits `label_margin_px` above the box.
        let label_height = (glyphs::GLYPH_HEIGHT * style.label_scale) as i32;
        glyphs::draw_text(
            &mut canvas,
            LABEL_COLOR,
            measurement.bbox_pixel_xmin,
            measurement
                .bbox_pixel_ymin
                .saturating_sub(style.label_margin_px)
                .saturating_sub(label_height),
            style.label_scale,
            &label,
        );
    }
    canvas
}

pub fn format_width_label(width_nm: f64) -> String {
    format!("{width_nm:.2} nm")
}

/// Outcome of writing one raster artifact.
#[derive(Debug)]
pub struct ArtifactOutcome {
    pub path: PathBuf,
    pub result: Result<()>,
}

/// Renders and writes both overviews into `output_dir`.
///
/// `output_dir` must already exist. Each artifact's result is returned on its own.
pub fn write_overviews(
    source: &RgbImage,
    measurements: &[CalibratedMeasurement],
    style: &RenderStyle,
    output_dir: &Path,
    image_name: &str,
    extension: &str,
) -> [ArtifactOutcome; 2] {
    let boxes_path = output_dir.join(format!("{image_name}_annotations_no_sizes.{extension}"));
    let boxes = render_boxes(source, measurements, style);
    let boxes_result = image_helper::save(&boxes, &boxes_path);

    let labeled_path = output_dir.join(format!("{image_name}_annotations.{extension}"));
    let labeled = render_labeled(source, measurements, style);
    let labeled_result = image_helper::save(&labeled, &labeled_path);

    [
        ArtifactOutcome {
            path: boxes_path,
            result: boxes_result,
        },
        ArtifactOutcome {
            path: labeled_path,
            result: labeled_result,
        },
    ]
}

fn draw_box(canvas: &mut RgbImage, measurement: &CalibratedMeasurement, thickness: u32) {
    let (canvas_width, canvas_height) = canvas.dimensions();
    let pad = i64::from(thickness);

    // Edges further than `thickness` outside the canvas can never be painted, so
    // the box is cut down to that band before imageproc sees it.
    let clip = |start: i32, size: f64, canvas_dim: u32| -> Option<(i32, u32)> {
        let start = i64::from(start);
        let end = start.saturating_add(size.round().max(1.0) as i64);
        let low = start.max(-pad);
        let high = end.min(i64::from(canvas_dim) + pad);
        (high > low).then(|| (low as i32, (high - low) as u32))
    };
    let Some((left, width)) = clip(measurement.bbox_pixel_xmin, measurement.bbox_pixel_width, canvas_width) else {
        return;
    };
    let Some((top, height)) = clip(measurement.bbox_pixel_ymin, measurement.bbox_pixel_height, canvas_height) else {
        return;
    };

    // Strokes grow inward from the outer edge.
    for inset in 0..thickness {
        let inner_width = width.saturating_sub(2 * inset);
        let inner_height = height.saturating_sub(2 * inset);
        if inner_width == 0 || inner_height == 0 {
            break;
        }
        let rect = Rect::at(left + inset as i32, top + inset as i32).of_size(inner_width, inner_height);
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(xmin: i32, ymin: i32, width_px: f64, height_px: f64, width_nm: f64) -> CalibratedMeasurement {
        CalibratedMeasurement {
            class_id: 0,
            center_x_nm: 0.0,
            center_y_nm: 0.0,
            width_nm,
            height_nm: 0.0,
            bbox_pixel_xmin: xmin,
            bbox_pixel_ymin: ymin,
            bbox_pixel_width: width_px,
            bbox_pixel_height: height_px,
        }
    }

    fn style() -> RenderStyle {
        RenderStyle {
            box_thickness: 1,
            label_margin_px: 10,
            label_scale: 1,
        }
    }

    #[test]
    fn boxes_are_drawn_at_truncated_corner() {
        let source = RgbImage::new(100, 100);
        let m = measurement(10, 40, 20.0, 10.0, 1.0);
        let out = render_boxes(&source, &[m], &style());

        assert_eq!(*out.get_pixel(10, 40), BOX_COLOR);
        assert_eq!(*out.get_pixel(29, 49), BOX_COLOR);
        assert_eq!(*out.get_pixel(20, 45), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(9, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn passes_do_not_share_a_canvas() {
        let source = RgbImage::new(100, 100);
        let m = measurement(10, 40, 20.0, 10.0, 8.0);

        let labeled = render_labeled(&source, &[m], &style());
        let boxes = render_boxes(&source, &[m], &style());
        let boxes_again = render_boxes(&source, &[m], &style());

        assert_eq!(boxes, boxes_again);
        assert_ne!(boxes, labeled);
        // Source untouched.
        assert!(source.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn label_sits_above_the_box() {
        let source = RgbImage::new(100, 100);
        let m = measurement(10, 40, 20.0, 10.0, 8.0);
        let labeled = render_labeled(&source, &[m], &style());

        // Glyph block spans rows 23..30; the box interior stays label-free.
        let has_label = (40 - 10 - 7..40 - 10)
            .any(|y| (10..60).any(|x| *labeled.get_pixel(x, y as u32) == LABEL_COLOR));
        assert!(has_label);
        for y in 41..49 {
            for x in 11..29 {
                assert_ne!(*labeled.get_pixel(x, y), LABEL_COLOR);
            }
        }
    }

    #[test]
    fn label_format_has_two_decimals() {
        assert_eq!(format_width_label(414.5), "414.50 nm");
        assert_eq!(format_width_label(41.449), "41.45 nm");
    }

    #[test]
    fn boxes_off_canvas_are_clipped() {
        let source = RgbImage::new(20, 20);
        let m = measurement(-5, -5, 40.0, 40.0, 1.0);
        let thick = RenderStyle {
            box_thickness: 3,
            ..style()
        };
        let out = render_labeled(&source, &[m], &thick);
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn write_failure_is_per_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = RgbImage::new(16, 16);
        let outcomes = write_overviews(&source, &[], &style(), dir.path(), "img", "png");
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert!(dir.path().join("img_annotations_no_sizes.png").is_file());
        assert!(dir.path().join("img_annotations.png").is_file());

        let missing = dir.path().join("nope");
        let outcomes = write_overviews(&source, &[], &style(), &missing, "img", "png");
        assert!(outcomes.iter().all(|o| o.result.is_err()));
    }

    #[test]
    fn enormous_boxes_are_clamped_to_the_canvas() {
        let source = RgbImage::new(64, 64);
        let huge = measurement(i32::MIN, i32::MIN, 6.4e9, 6.4e9, 6.4e9);
        let far_right = measurement(i32::MAX, 10, f64::MAX, 4.0, 1.0);
        let thick = RenderStyle {
            box_thickness: 2,
            ..style()
        };

        let boxes = render_boxes(&source, &[huge, far_right], &thick);
        let labeled = render_labeled(&source, &[huge, far_right], &thick);
        // Every edge of both boxes lies off canvas.
        assert!(boxes.pixels().all(|p| *p == Rgb([0, 0, 0])));
        assert_eq!(labeled.dimensions(), (64, 64));
    }

    #[test]
    fn clamping_keeps_visible_edges_in_place() {
        let source = RgbImage::new(20, 20);
        // Starts off canvas to the left, right edge at x = 11.
        let m = measurement(-1000, 5, 1012.0, 5.0, 1.0);
        let out = render_boxes(&source, &[m], &style());

        assert_eq!(*out.get_pixel(11, 5), BOX_COLOR);
        assert_eq!(*out.get_pixel(11, 9), BOX_COLOR);
        assert_eq!(*out.get_pixel(0, 5), BOX_COLOR);
        assert_eq!(*out.get_pixel(0, 7), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(12, 5), Rgb([0, 0, 0]));
    }
}
