//! ROC curve rendering: false positive rate on x, true positive rate on y.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::path::Path;

const SIZE: u32 = 480;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const CHANCE: Rgb<u8> = Rgb([190, 190, 190]);
const CURVE: Rgb<u8> = Rgb([31, 119, 180]);

/// Draw the curve through `(fpr[i], tpr[i])` and save it as an image at `path`.
pub fn render(fpr: &[f32], tpr: &[f32], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    draw(fpr, tpr)
        .save(path)
        .with_context(|| format!("writing ROC curve {}", path.display()))?;
    Ok(())
}

fn draw(fpr: &[f32], tpr: &[f32]) -> RgbImage {
    let mut img = RgbImage::from_pixel(SIZE, SIZE, BACKGROUND);

    line(&mut img, to_pixel(0.0, 0.0), to_pixel(1.0, 1.0), CHANCE);
    line(&mut img, to_pixel(0.0, 0.0), to_pixel(1.0, 0.0), AXIS);
    line(&mut img, to_pixel(0.0, 0.0), to_pixel(0.0, 1.0), AXIS);

    let mut points: Vec<(f32, f32)> = fpr.iter().copied().zip(tpr.iter().copied()).collect();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    for pair in points.windows(2) {
        line(&mut img, to_pixel(pair[0].0, pair[0].1), to_pixel(pair[1].0, pair[1].1), CURVE);
    }
    if let [(x, y)] = points[..] {
        let (px, py) = to_pixel(x, y);
        img.put_pixel(px, py, CURVE);
    }

    img
}

/// Map rates in `[0, 1]` onto the plot area; y grows downwards in the image.
fn to_pixel(fpr: f32, tpr: f32) -> (u32, u32) {
    let span = (SIZE - 2 * MARGIN) as f32;
    let x = MARGIN as f32 + fpr.clamp(0.0, 1.0) * span;
    let y = (SIZE - MARGIN) as f32 - tpr.clamp(0.0, 1.0) * span;
    (x.round() as u32, y.round() as u32)
}

fn line(img: &mut RgbImage, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
    let (x0, y0) = (from.0 as f32, from.1 as f32);
    let (x1, y1) = (to.0 as f32, to.1 as f32);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1.0) as u32;

    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (x0 + (x1 - x0) * t).round() as u32;
        let y = (y0 + (y1 - y0) * t).round() as u32;
        if x < img.width() && y < img.height() {
            img.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel_corners() {
        assert_eq!(to_pixel(0.0, 0.0), (MARGIN, SIZE - MARGIN));
        assert_eq!(to_pixel(1.0, 1.0), (SIZE - MARGIN, MARGIN));
        assert_eq!(to_pixel(2.0, -1.0), (SIZE - MARGIN, SIZE - MARGIN));
    }

    #[test]
    fn test_draw_curve_pixels() {
        let img = draw(&[0.0, 0.0, 1.0], &[0.0, 1.0, 1.0]);
        let (x, y) = to_pixel(0.5, 1.0);
        assert_eq!(*img.get_pixel(x, y), CURVE);
        let (x, y) = to_pixel(0.5, 0.5);
        assert_eq!(*img.get_pixel(x, y), CHANCE);
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("roc.png");
        render(&[0.0, 0.2, 1.0], &[0.0, 0.9, 1.0], &path).unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!(written.width(), SIZE);
        assert_eq!(written.height(), SIZE);
    }
}
