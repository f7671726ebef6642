// ============================================================
// Layer 4 — Image Loader
// ============================================================
// Decodes JPEG/PNG files with the `image` crate and writes
// predicted masks back out as 8-bit grayscale PNGs.
//
// Every image must already have the exact (height, width) the
// network was built for. Nothing is resized: a mismatched file
// is an error naming the file and both shapes.
//
// Grayscale masks are expanded to RGB so raws and masks share
// the (H, W, 3) layout.

use anyhow::{ensure, Context, Result};
use image::{GrayImage, RgbImage};
use std::path::Path;

/// Load `path` as RGB and check it is exactly height × width
pub fn load_rgb(path: &Path, height: usize, width: usize) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?
        .to_rgb8();

    ensure!(
        img.height() as usize == height && img.width() as usize == width,
        "Image '{}' is {}x{} (HxW) but the network expects {}x{}; \
         crop or resize inputs before preparing",
        path.display(),
        img.height(),
        img.width(),
        height,
        width
    );

    Ok(img)
}

/// Write a single-channel mask of height × width pixels as PNG
pub fn save_mask(path: &Path, height: usize, width: usize, pixels: Vec<u8>) -> Result<()> {
    let img = GrayImage::from_raw(width as u32, height as u32, pixels)
        .with_context(|| format!("Mask buffer does not match {height}x{width}"))?;

    img.save(path)
        .with_context(|| format!("Cannot write mask '{}'", path.display()))?;

    tracing::debug!("Wrote mask '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn test_loads_matching_image() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("a_raw.png");
        RgbImage::from_pixel(6, 4, Rgb([10, 20, 30])).save(&path).unwrap();

        let img = load_rgb(&path, 4, 6).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_rejects_wrong_dimensions() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("a_raw.png");
        RgbImage::new(6, 4).save(&path).unwrap();

        let err = load_rgb(&path, 6, 4).unwrap_err();
        assert!(err.to_string().contains("expects 6x4"));
    }

    #[test]
    fn test_grayscale_expands_to_rgb() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("a_mask.png");
        GrayImage::from_pixel(2, 2, image::Luma([200])).save(&path).unwrap();

        let img = load_rgb(&path, 2, 2).unwrap();
        assert_eq!(img.get_pixel(1, 1), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_saves_mask_png() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("a_mask.png");
        save_mask(&path, 2, 3, vec![0, 50, 100, 150, 200, 255]).unwrap();

        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(2, 1).0, [255]);
    }

    #[test]
    fn test_undecodable_file_is_an_error() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("broken_raw.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        assert!(load_rgb(&path, 1, 1).is_err());
    }
}
