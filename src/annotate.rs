use crate::error::PipelineError;
use crate::types::RawDetection;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageError, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

const LINE_WIDTH: i32 = 3;
const FONT_HEIGHT: i32 = 8;
const DECIMAL_PLACES: i32 = 3;

pub fn decode(data: &[u8]) -> Result<DynamicImage, PipelineError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(ImageError::from)?;
    Ok(reader.decode()?)
}

/// Box as `(y_min, x_min, y_max, x_max)`, each scaled to [0, 1] and rounded.
pub fn normalized_box(detection: &RawDetection, width: u32, height: u32) -> (f64, f64, f64, f64) {
    let (width, height) = (f64::from(width), f64::from(height));
    (
        round(detection.y_min / height),
        round(detection.x_min / width),
        round(detection.y_max / height),
        round(detection.x_max / width),
    )
}

fn round(v: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES);
    (v * scale).round() / scale
}

/// Draws a normalized box with a text label above its top-left corner.
pub fn draw_box(image: &mut RgbImage, bbox: (f64, f64, f64, f64), text: &str, color: Rgb<u8>) {
    let (y_min, x_min, y_max, x_max) = bbox;
    let (width, height) = image.dimensions();
    let left = to_pixel(x_min, width);
    let right = to_pixel(x_max, width);
    let top = to_pixel(y_min, height);
    let bottom = to_pixel(y_max, height);

    for inset in 0..LINE_WIDTH {
        let w = (right - left - 2 * inset + 1).max(1) as u32;
        let h = (bottom - top - 2 * inset + 1).max(1) as u32;
        draw_hollow_rect_mut(image, Rect::at(left + inset, top + inset).of_size(w, h), color);
    }
    if !text.is_empty() {
        draw_text(
            image,
            left + LINE_WIDTH,
            (top - LINE_WIDTH - FONT_HEIGHT).abs(),
            text,
            color,
        );
    }
}

/// Scales a normalized coordinate to pixels, kept within one pixel of the
/// image so the outline arithmetic cannot overflow.
fn to_pixel(v: f64, dim: u32) -> i32 {
    (v * f64::from(dim)).round().clamp(-1.0, f64::from(dim)) as i32
}

pub fn annotate(image: &DynamicImage, detections: &[RawDetection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    for detection in detections {
        let bbox = normalized_box(detection, width, height);
        draw_box(&mut canvas, bbox, &detection.plate, RED);
    }
    canvas
}

fn draw_text(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                let py = y + row as i32;
                for col in 0..5 {
                    let px = x + col;
                    if (bits >> (4 - col)) & 1 == 1 && px >= 0 && px < width && py >= 0 && py < height
                    {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
        x += 6;
    }
}

/// 5x7 glyphs for the characters that appear on plates.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::ImageOutputFormat;

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
            .write_to(&mut data, ImageOutputFormat::Png)
            .unwrap();
        data.into_inner()
    }

    fn detection(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> RawDetection {
        RawDetection {
            plate: "AB12".to_string(),
            confidence: 0.9,
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    #[test]
    fn decodes_png() {
        let image = decode(&png(64, 48)).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[test]
    fn rejects_garbage() {
        match decode(b"definitely not an image") {
            Err(PipelineError::Decode(_)) => {}
            other => panic!("unexpected result {:?}", other.map(|i| (i.width(), i.height()))),
        }
    }

    #[test]
    fn normalizes_and_rounds_box() {
        let bbox = normalized_box(&detection(100.0, 50.0, 200.0, 100.0), 300, 150);
        assert_eq!(bbox, (0.333, 0.333, 0.667, 0.667));
    }

    #[test]
    fn draws_outline_and_label() {
        let image = decode(&png(100, 100)).unwrap();
        let canvas = annotate(&image, &[detection(20.0, 40.0, 60.0, 80.0)]);
        // Outline corners.
        assert_eq!(*canvas.get_pixel(20, 40), RED);
        assert_eq!(*canvas.get_pixel(60, 80), RED);
        assert_eq!(*canvas.get_pixel(22, 60), RED);
        // Interior stays untouched.
        assert_eq!(*canvas.get_pixel(40, 60), Rgb([0, 0, 0]));
        // Label sits above the box: the top row of 'A' starts one pixel in.
        assert_eq!(*canvas.get_pixel(24, 29), RED);
        assert_eq!(*canvas.get_pixel(23, 29), Rgb([0, 0, 0]));
    }

    #[test]
    fn huge_coordinates_are_clamped() {
        let image = decode(&png(100, 50)).unwrap();
        let canvas = annotate(&image, &[detection(10.0, 10.0, 1.0e10, 20.0)]);
        assert_eq!(*canvas.get_pixel(10, 10), RED);
        assert_eq!(*canvas.get_pixel(99, 12), RED);

        let canvas = annotate(&image, &[detection(-1.0e10, -1.0e10, 1.0e10, 1.0e10)]);
        assert_eq!(*canvas.get_pixel(1, 1), RED);
        assert_eq!(*canvas.get_pixel(50, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn clips_boxes_at_the_edge() {
        let image = decode(&png(10, 10)).unwrap();
        let canvas = annotate(&image, &[detection(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(*canvas.get_pixel(0, 0), RED);
        assert_eq!(*canvas.get_pixel(9, 5), RED);
        assert_eq!(*canvas.get_pixel(5, 5), Rgb([0, 0, 0]));
    }
}
