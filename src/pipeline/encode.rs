//! Image encoding: rendered pages → PNG, uploads → MIME-tagged raster, both → base64.
//!
//! Vision endpoints take images as base64 data-URIs embedded in the JSON
//! body. Rendered pages are encoded as PNG because lossless text edges read
//! better than JPEG artefacts. Uploaded images are passed through untouched;
//! only their MIME type is sniffed.

use crate::output::RasterImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_page(img: &DynamicImage) -> Result<RasterImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded page {}x{} → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(RasterImage {
        bytes: buf,
        mime_type: "image/png",
    })
}

/// Wrap uploaded image bytes, detecting the MIME type from magic bytes and
/// falling back to the file extension.
pub fn raster_from_upload(bytes: &[u8], filename: &str) -> RasterImage {
    RasterImage {
        bytes: bytes.to_vec(),
        mime_type: sniff_mime(bytes, filename),
    }
}

fn sniff_mime(bytes: &[u8], filename: &str) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        match format {
            ImageFormat::Png => return "image/png",
            ImageFormat::Jpeg => return "image/jpeg",
            ImageFormat::Gif => return "image/gif",
            ImageFormat::Bmp => return "image/bmp",
            ImageFormat::WebP => return "image/webp",
            _ => {}
        }
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Base64 payload of an image.
pub fn to_base64(image: &RasterImage) -> String {
    STANDARD.encode(&image.bytes)
}

/// `data:<mime>;base64,<payload>` URI for OpenAI-style `image_url` parts.
pub fn to_data_url(image: &RasterImage) -> String {
    format!("data:{};base64,{}", image.mime_type, to_base64(image))
}
