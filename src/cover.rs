use std::path::Path;

use anyhow::Context as _;
use image::{DynamicImage, GrayImage, Luma, imageops};

pub const COVER_PNG_FILENAME: &str = "cover-image.png";
pub const COVER_GIF_FILENAME: &str = "cover-image.gif";
pub const MASTHEAD_FILENAME: &str = "masthead.gif";

const COVER_WIDTH: u32 = 600;
const COVER_HEIGHT: u32 = 800;
const TOP_OFFSET: i64 = 100;

/// Draw the cover (paper logo centered on a white canvas) and re-encode
/// the logo as the masthead. The logo image is a required resource: a run
/// without a cover is not a valid package, so failures here are fatal.
pub fn generate(logo_path: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let logo = image::open(logo_path)
        .with_context(|| format!("open paper logo: {}", logo_path.display()))?;

    let mut canvas: GrayImage =
        GrayImage::from_pixel(COVER_WIDTH, COVER_HEIGHT, Luma([255]));
    let logo_gray = logo.to_luma8();
    let x = (i64::from(COVER_WIDTH) - i64::from(logo_gray.width())).max(0) / 2;
    imageops::overlay(&mut canvas, &logo_gray, x, TOP_OFFSET);

    let cover = DynamicImage::ImageLuma8(canvas);
    let png_path = out_dir.join(COVER_PNG_FILENAME);
    cover
        .save(&png_path)
        .with_context(|| format!("write cover: {}", png_path.display()))?;

    // The gif encoder wants RGBA frames.
    let gif_path = out_dir.join(COVER_GIF_FILENAME);
    DynamicImage::ImageRgba8(cover.to_rgba8())
        .save(&gif_path)
        .with_context(|| format!("write cover: {}", gif_path.display()))?;

    let masthead_path = out_dir.join(MASTHEAD_FILENAME);
    DynamicImage::ImageRgba8(logo.to_rgba8())
        .save(&masthead_path)
        .with_context(|| format!("write masthead: {}", masthead_path.display()))?;

    tracing::info!(logo = %logo_path.display(), "cover and masthead written");
    Ok(())
}
