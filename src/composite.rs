use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{imageops, DynamicImage, Rgb, RgbImage};
use ndarray::prelude::*;

/// Height of the label strip above the panels.
pub const HEADER_HEIGHT: u32 = 28;
/// Horizontal spacing between panels.
pub const PANEL_GAP: u32 = 4;

const TEXT_SCALE: u32 = 2;
const TEXT_MARGIN: i32 = 6;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

// Golden-angle walk keeps adjacent labels visually distinct.
const GOLDEN_ANGLE_DEG: f32 = 137.508;

/// Render the inspection composite for one result: a header strip naming
/// the source file, then three panels side by side (original image, mask
/// overlay, flow field).
///
/// `context` sets the panel dimensions. Mask and flow data are drawn where
/// they overlap it; a mask or flow of different dimensions is clipped
/// rather than rejected, since the render context is shared across the
/// whole batch.
pub fn render(
    context: &DynamicImage,
    mask: &Array2<u32>,
    flow: &Array3<f32>,
    filename: &str,
) -> RgbImage {
    let original = context.to_rgb8();
    let (width, height) = original.dimensions();

    let mut canvas = RgbImage::new(3 * width + 2 * PANEL_GAP, HEADER_HEIGHT + height);

    draw_text(
        &mut canvas,
        TEXT_MARGIN,
        (HEADER_HEIGHT as i32 - 8 * TEXT_SCALE as i32) / 2,
        &format!("Segmentation of {filename}"),
        TEXT_COLOR,
        TEXT_SCALE,
    );

    let top = i64::from(HEADER_HEIGHT);
    imageops::replace(&mut canvas, &original, 0, top);
    imageops::replace(
        &mut canvas,
        &mask_overlay(&original, mask),
        i64::from(width + PANEL_GAP),
        top,
    );
    imageops::replace(
        &mut canvas,
        &flow_panel(flow, width, height),
        i64::from(2 * (width + PANEL_GAP)),
        top,
    );

    canvas
}

/// Original image with every labeled region tinted by its label color.
fn mask_overlay(original: &RgbImage, mask: &Array2<u32>) -> RgbImage {
    let (mask_height, mask_width) = mask.dim();
    let mut overlay = original.clone();
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        if (y as usize) < mask_height && (x as usize) < mask_width {
            let label = mask[[y as usize, x as usize]];
            if label != 0 {
                *pixel = blend(*pixel, label_color(label));
            }
        }
    }
    overlay
}

/// Flow field rendered as a color wheel: direction maps to hue, magnitude
/// to brightness. Pixels outside the flow data stay black.
fn flow_panel(flow: &Array3<f32>, width: u32, height: u32) -> RgbImage {
    let mut panel = RgbImage::new(width, height);
    if flow.shape()[0] < 2 {
        return panel;
    }

    let dy = flow.index_axis(Axis(0), 0);
    let dx = flow.index_axis(Axis(0), 1);
    let (flow_height, flow_width) = dy.dim();

    let max_magnitude = dy
        .iter()
        .zip(dx.iter())
        .map(|(&y, &x)| y.hypot(x))
        .fold(0.0_f32, f32::max);
    if max_magnitude <= f32::EPSILON {
        return panel;
    }

    for (x, y, pixel) in panel.enumerate_pixels_mut() {
        if (y as usize) < flow_height && (x as usize) < flow_width {
            let fy = dy[[y as usize, x as usize]];
            let fx = dx[[y as usize, x as usize]];
            let angle = fy.atan2(fx).to_degrees().rem_euclid(360.0);
            let value = (fy.hypot(fx) / max_magnitude).clamp(0.0, 1.0);
            *pixel = hsv_to_rgb(angle, 1.0, value);
        }
    }
    panel
}

pub fn label_color(label: u32) -> Rgb<u8> {
    let hue = (label as f32 * GOLDEN_ANGLE_DEG).rem_euclid(360.0);
    hsv_to_rgb(hue, 0.85, 1.0)
}

fn blend(base: Rgb<u8>, tint: Rgb<u8>) -> Rgb<u8> {
    Rgb([
        ((u16::from(base[0]) + u16::from(tint[0])) / 2) as u8,
        ((u16::from(base[1]) + u16::from(tint[1])) / 2) as u8,
        ((u16::from(base[2]) + u16::from(tint[2])) / 2) as u8,
    ])
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = value - c;
    let (r, g, b) = match hue {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Rgb([
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ])
}

/// 8x8 bitmap glyph text, scaled. Out-of-bounds pixels are clipped so long
/// labels never panic on narrow composites.
fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let mut cursor_x = x;
    for ch in text.chars() {
        if let Some(glyph) = BASIC_FONTS.get(ch) {
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8u32 {
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let px = cursor_x + (col * scale + sx) as i32;
                            let py = y + (row as u32 * scale + sy) as i32;
                            if px >= 0
                                && py >= 0
                                && (px as u32) < img.width()
                                && (py as u32) < img.height()
                            {
                                img.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        cursor_x += (8 * scale) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures(width: u32, height: u32) -> (DynamicImage, Array2<u32>, Array3<f32>) {
        let context = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([40, 40, 40]),
        ));
        let mut mask = Array2::<u32>::zeros((height as usize, width as usize));
        mask[[1, 1]] = 1;
        let mut flow = Array3::<f32>::zeros((2, height as usize, width as usize));
        flow[[0, 2, 2]] = 1.0;
        (context, mask, flow)
    }

    #[test]
    fn composite_dimensions_follow_context() {
        let (context, mask, flow) = fixtures(10, 6);
        let composite = render(&context, &mask, &flow, "pic1.jpg");
        assert_eq!(composite.width(), 3 * 10 + 2 * PANEL_GAP);
        assert_eq!(composite.height(), HEADER_HEIGHT + 6);
    }

    #[test]
    fn header_carries_text_pixels() {
        let (context, mask, flow) = fixtures(10, 6);
        let composite = render(&context, &mask, &flow, "pic1.jpg");
        let header_has_text = (0..HEADER_HEIGHT)
            .any(|y| (0..composite.width()).any(|x| *composite.get_pixel(x, y) == TEXT_COLOR));
        assert!(header_has_text);
    }

    #[test]
    fn labeled_pixels_are_tinted() {
        let (context, mask, flow) = fixtures(10, 6);
        let composite = render(&context, &mask, &flow, "pic1.jpg");
        let original_pixel = *composite.get_pixel(1, HEADER_HEIGHT + 1);
        let overlay_pixel = *composite.get_pixel(10 + PANEL_GAP + 1, HEADER_HEIGHT + 1);
        assert_ne!(original_pixel, overlay_pixel);
        // unlabeled pixels pass through untouched
        let untouched = *composite.get_pixel(10 + PANEL_GAP, HEADER_HEIGHT);
        assert_eq!(untouched, Rgb([40, 40, 40]));
    }

    #[test]
    fn flow_panel_lights_up_only_where_flow_exists() {
        let (context, mask, flow) = fixtures(10, 6);
        let composite = render(&context, &mask, &flow, "pic1.jpg");
        let flow_left = 2 * (10 + PANEL_GAP);
        assert_ne!(
            *composite.get_pixel(flow_left + 2, HEADER_HEIGHT + 2),
            Rgb([0, 0, 0])
        );
        assert_eq!(
            *composite.get_pixel(flow_left + 5, HEADER_HEIGHT + 5),
            Rgb([0, 0, 0])
        );
    }

    #[test]
    fn mask_larger_than_context_is_clipped() {
        let (context, _, flow) = fixtures(4, 4);
        let mask = Array2::<u32>::from_elem((32, 32), 3);
        // must not panic
        let composite = render(&context, &mask, &flow, "pic2.jpg");
        assert_eq!(composite.height(), HEADER_HEIGHT + 4);
    }

    #[test]
    fn adjacent_labels_get_distinct_colors() {
        assert_ne!(label_color(1), label_color(2));
        assert_ne!(label_color(2), label_color(3));
    }
}
