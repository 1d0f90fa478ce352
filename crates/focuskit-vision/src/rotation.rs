//! Static frame rotation about the image centre

use image::{Rgb, RgbImage};

/// Rotate `image` by `degrees` counter-clockwise about its centre.
///
/// Output keeps the input dimensions; pixels mapped from outside the source
/// are black. Bilinear sampling. A zero angle returns the input unchanged.
pub fn rotate(image: &RgbImage, degrees: f32) -> RgbImage {
    if degrees == 0.0 || !degrees.is_finite() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;
    let (sin, cos) = degrees.to_radians().sin_cos();

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cx + cos * dx - sin * dy;
        let sy = cy + sin * dx + cos * dy;
        sample_bilinear(image, sx, sy)
    })
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f32; 3];
    for (ox, oy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if weight == 0.0 {
            continue;
        }
        if let Some(px) = pixel_at(image, x0 + ox, y0 + oy) {
            for (a, c) in acc.iter_mut().zip(px.0) {
                *a += weight * f32::from(c);
            }
        }
    }

    Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

fn pixel_at(image: &RgbImage, x: i64, y: i64) -> Option<&Rgb<u8>> {
    let x = u32::try_from(x).ok()?;
    let y = u32::try_from(y).ok()?;
    if x < image.width() && y < image.height() {
        Some(image.get_pixel(x, y))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_angle_is_identity() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8, y as u8, 7]));
        assert_eq!(rotate(&image, 0.0), image);
    }

    #[test]
    fn test_half_turn_mirrors_about_centre() {
        let mut image = RgbImage::new(4, 4);
        image.put_pixel(3, 3, Rgb([200, 100, 50]));

        let rotated = rotate(&image, 180.0);
        assert_eq!(rotated.dimensions(), (4, 4));
        assert_eq!(*rotated.get_pixel(1, 1), Rgb([200, 100, 50]));
        assert_eq!(*rotated.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_quarter_turn_moves_row_to_column() {
        // A horizontal line through the centre becomes vertical
        let mut image = RgbImage::new(9, 9);
        for x in 0..9 {
            image.put_pixel(x, 4, Rgb([255, 0, 0]));
        }

        let rotated = rotate(&image, 90.0);
        for y in 0..9 {
            assert_eq!(rotated.get_pixel(4, y).0[0], 255, "row {}", y);
        }
        assert_eq!(rotated.get_pixel(0, 4).0[0], 0);
    }
}
