use image::{DynamicImage, GenericImageView, ImageReader, RgbImage, imageops::FilterType};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode the file at `path` and scale it so its longer side is `max_dimension`.
pub fn load_normalized(path: &Path, max_dimension: u32) -> Result<RgbImage, DecodeError> {
    let reader = BufReader::new(File::open(path)?);
    read_normalized(reader, max_dimension)
}

/// Same as [`load_normalized`] for an already opened stream. The format is
/// sniffed from the content, not from any file name.
pub fn read_normalized<R: BufRead + Seek>(
    reader: R,
    max_dimension: u32,
) -> Result<RgbImage, DecodeError> {
    let img = ImageReader::new(reader).with_guessed_format()?.decode()?;
    Ok(normalize(img, max_dimension))
}

/// Consumes the decoded image so the full-resolution buffer is dropped as
/// soon as the bounded raster exists.
pub fn normalize(img: DynamicImage, max_dimension: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = target_size(width, height, max_dimension);

    if (new_width, new_height) == (width, height) {
        return img.to_rgb8();
    }
    img.resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8()
}

/// Aspect-preserving target size with floor rounding:
/// `scale = min(max/width, max/height)`, each side `floor(side * scale)`.
///
/// Computed in integers as `side * max / longest`, which is the exact floor
/// of the rational product. Sides never collapse below one pixel.
pub fn target_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = u64::from(width.max(height).max(1));
    let scale = |side: u32| {
        let scaled = u64::from(side) * u64::from(max_dimension) / longest;
        scaled.max(1) as u32
    };
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let intensity = ((x + y) % 256) as u8;
            Rgb([intensity, 255 - intensity, (x % 256) as u8])
        })
    }

    #[test]
    fn test_target_size_floors_the_short_side() {
        assert_eq!(target_size(1920, 1080, 250), (250, 140));
        assert_eq!(target_size(1080, 1920, 250), (140, 250));
        assert_eq!(target_size(1000, 1000, 250), (250, 250));
        assert_eq!(target_size(333, 1000, 250), (83, 250));
    }

    #[test]
    fn test_target_size_upscales_small_images() {
        assert_eq!(target_size(100, 50, 250), (250, 125));
        assert_eq!(target_size(1, 1, 250), (250, 250));
    }

    #[test]
    fn test_target_size_never_collapses() {
        assert_eq!(target_size(10_000, 3, 250), (250, 1));
    }

    #[test]
    fn test_target_size_preserves_aspect() {
        for &(width, height) in &[(1920, 1080), (640, 480), (37, 911), (4000, 3001), (7, 5)] {
            for &max in &[16u32, 100, 250, 999] {
                let (w, h) = target_size(width, height, max);
                assert_eq!(w.max(h), max);

                let longest = f64::from(width.max(height));
                let exact_w = f64::from(width) * f64::from(max) / longest;
                let exact_h = f64::from(height) * f64::from(max) / longest;
                assert!((f64::from(w) - exact_w).abs() <= 1.0);
                assert!((f64::from(h) - exact_h).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn test_normalize_bounds_raster() {
        let img = DynamicImage::ImageRgb8(gradient(640, 320));
        let raster = normalize(img, 250);
        assert_eq!(raster.dimensions(), (250, 125));
    }

    #[test]
    fn test_read_normalized_sniffs_format() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(gradient(300, 200))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let raster = read_normalized(Cursor::new(bytes), 150).unwrap();
        assert_eq!(raster.dimensions(), (150, 100));
    }

    #[test]
    fn test_load_normalized_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("not_an_image.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(matches!(
            load_normalized(&path, 250),
            Err(DecodeError::Image(_))
        ));
    }

    #[test]
    fn test_load_normalized_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.jpg");

        assert!(matches!(load_normalized(&path, 250), Err(DecodeError::Io(_))));
    }
}
