//! Block image extraction: page image + block polygon → cropped base64 PNG.
//!
//! Vision models read a block far better from a tight crop than from the
//! whole page, but a crop that hugs the ink exactly clips descenders and
//! border rules. The crop is therefore grown by a small fraction of the
//! block's own size before cutting (`image_expansion_ratio`).
//!
//! PNG is used over JPEG because it is lossless; compression artefacts on
//! small glyphs confuse vision models. `detail: "high"` keeps the provider
//! from downscaling the crop to a single low-resolution tile.

use crate::schema::{Block, Page};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use tracing::debug;

/// Crop `block` out of `page`'s image.
///
/// Returns `None` when the page has no image or the (clamped) crop is empty.
pub fn extract_block_image(page: &Page, block: &Block, expansion: f32) -> Option<DynamicImage> {
    let img = page.image.as_ref()?;
    let (w, h) = img.dimensions();

    let [x0, y0, x1, y1] = block
        .polygon
        .rescale(page.size, (w as f32, h as f32))
        .expand(expansion, expansion)
        .bbox();

    let left = x0.floor().clamp(0.0, w as f32) as u32;
    let top = y0.floor().clamp(0.0, h as f32) as u32;
    let right = x1.ceil().clamp(0.0, w as f32) as u32;
    let bottom = y1.ceil().clamp(0.0, h as f32) as u32;

    if right <= left || bottom <= top {
        debug!("Block {}: crop outside page image, sending none", block.id);
        return None;
    }
    Some(img.crop_imm(left, top, right - left, bottom - top))
}

/// Encode a crop as a base64 PNG ready for the model request.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} crop → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Crop and encode in one step. Encoding failures degrade to "no image".
pub fn block_image_data(page: &Page, block: &Block, expansion: f32) -> Option<ImageData> {
    let crop = extract_block_image(page, block, expansion)?;
    match encode_image(&crop) {
        Ok(data) => Some(data),
        Err(e) => {
            debug!("Block {}: image encode failed: {}", block.id, e);
            None
        }
    }
}
