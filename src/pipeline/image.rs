//! Image → PDF rendering.
//!
//! Decodes the upload with the `image` crate, honours embedded EXIF
//! orientation when present (absent or invalid orientation means no
//! rotation), flattens transparency onto white, and embeds the pixels as a
//! JPEG XObject on one page per frame — animated GIFs become one page per
//! frame, everything else renders a single page. Pages are the configured
//! canonical size with the picture aspect-fit and centred inside the
//! margins.

use crate::config::JobConfig;
use crate::error::RenderError;
use crate::pipeline::compose::Composer;
use crate::session::UploadedFile;
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{
    AnimationDecoder, DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat, ImageReader,
    Rgb, RgbImage,
};
use lopdf::Document;
use std::io::Cursor;
use tracing::debug;

pub fn render(file: &UploadedFile, config: &JobConfig) -> Result<Document, RenderError> {
    if file.content.is_empty() {
        return Err(RenderError::corrupt("zero-byte file"));
    }

    let frames = decode_frames(&file.content)?;
    debug!(name = %file.original_name, frames = frames.len(), "image decoded");

    let (page_w, page_h) = config.page_size.portrait_pt();
    let mut composer = Composer::new();

    for frame in frames {
        let rgb = flatten_to_rgb(&frame);
        let (px_w, px_h) = (rgb.width(), rgb.height());
        let jpeg = encode_jpeg(&rgb, config.jpeg_quality)?;
        let xobj = composer.add_jpeg(jpeg, px_w, px_h);
        composer.image_page(page_w, page_h, config.margin_pt, xobj, px_w, px_h);
    }

    Ok(composer.finish())
}

/// Decode the upload into one image per output page.
///
/// GIFs with more than one frame yield all frames; every other format
/// (including multi-directory TIFF, where only the first directory is
/// read) yields exactly one.
fn decode_frames(bytes: &[u8]) -> Result<Vec<DynamicImage>, RenderError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RenderError::corrupt(format!("unreadable image: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| RenderError::corrupt("unrecognised image format"))?;

    if format == ImageFormat::Gif {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .map_err(|e| RenderError::corrupt(format!("invalid GIF: {e}")))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| RenderError::corrupt(format!("invalid GIF frame: {e}")))?;
        if frames.len() > 1 {
            return Ok(frames
                .into_iter()
                .map(|f| DynamicImage::ImageRgba8(f.into_buffer()))
                .collect());
        }
        // Single-frame GIF continues through the common path below so the
        // orientation handling stays uniform.
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RenderError::corrupt(format!("unreadable image: {e}")))?
        .into_decoder()
        .map_err(|e| RenderError::corrupt(format!("image decode failed: {e}")))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| RenderError::corrupt(format!("image decode failed: {e}")))?;
    img.apply_orientation(orientation);
    Ok(vec![img])
}

/// Flatten any alpha channel onto a white background.
pub(crate) fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => {
            let rgba = other.to_rgba8();
            let mut rgb = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
            for (x, y, px) in rgba.enumerate_pixels() {
                let a = px[3] as u32;
                let blend = |fg: u8| ((fg as u32 * a + 255 * (255 - a)) / 255) as u8;
                rgb.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
            }
            rgb
        }
    }
}

pub(crate) fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::corrupt(format!("JPEG encode failed: {e}")))?;
    Ok(jpeg)
}
