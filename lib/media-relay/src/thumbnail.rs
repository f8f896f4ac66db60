use std::io::Cursor;

use anyhow::bail;
use image::{imageops::FilterType, DynamicImage, ImageFormat};

/// Scales `body` to `size` pixels wide, cropping anything taller to its centered square first. Always a JPEG.
pub fn build(body: &[u8], size: u32) -> anyhow::Result<Vec<u8>> {
	if size == 0 {
		bail!("thumbnail size must be positive");
	}
	let image = image::load_from_memory(body)?;
	let (width, height) = (image.width(), image.height());
	if width == 0 || height == 0 {
		bail!("image has no pixels");
	}
	let scaled_height = ((u64::from(height) * u64::from(size)) / u64::from(width)).max(1);
	let scaled_height = u32::try_from(scaled_height).unwrap_or(u32::MAX);
	let thumbnail = if scaled_height > size {
		image
			.crop_imm(0, (height - width) / 2, width, width)
			.resize_exact(size, size, FilterType::Lanczos3)
	} else {
		image.resize_exact(size, scaled_height, FilterType::Lanczos3)
	};
	let mut out = Cursor::new(Vec::new());
	DynamicImage::ImageRgb8(thumbnail.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg)?;
	Ok(out.into_inner())
}
