// Image preparation before recognition: decode, optional grayscale, re-encode as PNG.

use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::OcrError;

/// Decode `src` and write a PNG copy to `dst`, converted to 8-bit luma when
/// `grayscale` is set. Returns the image dimensions.
pub fn prepare_image(src: &Path, dst: &Path, grayscale: bool) -> Result<(u32, u32), OcrError> {
    let img = decode(src).map_err(|e| OcrError::ImageRead(format!("{}: {e}", src.display())))?;
    let dims = (img.width(), img.height());

    let saved = if grayscale {
        img.to_luma8().save_with_format(dst, ImageFormat::Png)
    } else {
        img.save_with_format(dst, ImageFormat::Png)
    };
    saved.map_err(|e| OcrError::Io(std::io::Error::other(e)))?;

    Ok(dims)
}

/// The format is sniffed from the file's leading bytes; the extension is
/// only a fallback.
fn decode(src: &Path) -> image::ImageResult<DynamicImage> {
    ImageReader::open(src)?.with_guessed_format()?.decode()
}
