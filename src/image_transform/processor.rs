//! Image processing implementation
//!
//! decode → resize → flip → rotate → encode (same format as the source)

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, Frame, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use std::num::NonZeroU32;

use super::error::ImageError;
use crate::constants::JPEG_QUALITY;
use crate::options::{Rotation, TransformOptions};

/// Formats the engine can decode and re-encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Gif,
    Jpeg,
    Png,
}

impl SourceFormat {
    pub fn detect(data: &[u8]) -> Result<Self, ImageError> {
        match image::guess_format(data) {
            Ok(ImageFormat::Gif) => Ok(SourceFormat::Gif),
            Ok(ImageFormat::Jpeg) => Ok(SourceFormat::Jpeg),
            Ok(ImageFormat::Png) => Ok(SourceFormat::Png),
            Ok(other) => Err(ImageError::unsupported_format(format!("{:?}", other))),
            Err(_) => Err(ImageError::unsupported_format("unknown")),
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            SourceFormat::Gif => ImageFormat::Gif,
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::Gif => "gif",
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
        }
    }
}

/// How the image is scaled before flipping and rotating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResizePlan {
    Keep,
    /// Scale to exactly this size (aspect already accounted for)
    Scale(u32, u32),
    /// Center-crop to the target aspect, then scale to exactly this size
    Thumbnail(u32, u32),
}

/// Apply `options` to an encoded image synchronously
pub fn process(data: &[u8], options: &TransformOptions) -> Result<Vec<u8>, ImageError> {
    let format = SourceFormat::detect(data)?;
    let img = image::load_from_memory_with_format(data, format.image_format())
        .map_err(|e| ImageError::decode_failed(e.to_string()))?;

    let (target_w, target_h) =
        resolve_target(img.width(), img.height(), options.width, options.height);

    let mut img = match plan_resize(img.width(), img.height(), target_w, target_h, options.fit) {
        ResizePlan::Keep => img,
        ResizePlan::Scale(w, h) => resize_image(&img, w, h)?,
        ResizePlan::Thumbnail(w, h) => thumbnail(&img, w, h)?,
    };

    if options.flip_vertical {
        img = img.flipv();
    }
    if options.flip_horizontal {
        img = img.fliph();
    }

    img = match options.rotate {
        Rotation::None => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    };

    encode(&img, format)
}

/// Resolve fractional dimensions and never go past the source size
fn resolve_target(src_w: u32, src_h: u32, width: f64, height: f64) -> (u32, u32) {
    (
        resolve_dimension(src_w, width),
        resolve_dimension(src_h, height),
    )
}

fn resolve_dimension(src: u32, value: f64) -> u32 {
    let resolved = if value > 0.0 && value < 1.0 {
        (f64::from(src) * value) as u32
    } else {
        value as u32
    };
    resolved.min(src)
}

fn plan_resize(src_w: u32, src_h: u32, w: u32, h: u32, fit: bool) -> ResizePlan {
    if w == 0 && h == 0 {
        return ResizePlan::Keep;
    }

    let (dst_w, dst_h) = if fit {
        fit_dimensions(src_w, src_h, w, h)
    } else if w == 0 || h == 0 {
        proportional_dimensions(src_w, src_h, w, h)
    } else {
        return ResizePlan::Thumbnail(w, h);
    };

    if (dst_w, dst_h) == (src_w, src_h) {
        ResizePlan::Keep
    } else {
        ResizePlan::Scale(dst_w, dst_h)
    }
}

/// Largest size inside the `max_w`×`max_h` box with the source aspect ratio
///
/// A zero side leaves that axis unconstrained.
fn fit_dimensions(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let max_w = if max_w == 0 { src_w } else { max_w };
    let max_h = if max_h == 0 { src_h } else { max_h };

    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let box_aspect = f64::from(max_w) / f64::from(max_h);

    if src_aspect > box_aspect {
        let h = (f64::from(max_w) / src_aspect + 0.5).floor() as u32;
        (max_w, h.max(1))
    } else {
        let w = (f64::from(max_h) * src_aspect + 0.5).floor() as u32;
        (w.max(1), max_h)
    }
}

/// Scale the missing axis to keep the aspect ratio
fn proportional_dimensions(src_w: u32, src_h: u32, w: u32, h: u32) -> (u32, u32) {
    if w == 0 {
        let tmp = f64::from(src_w) * f64::from(h) / f64::from(src_h);
        (((tmp + 0.5).floor() as u32).max(1), h)
    } else {
        let tmp = f64::from(src_h) * f64::from(w) / f64::from(src_w);
        (w, ((tmp + 0.5).floor() as u32).max(1))
    }
}

/// Crop the centre of the image to the target aspect, then scale to w×h
fn thumbnail(img: &DynamicImage, w: u32, h: u32) -> Result<DynamicImage, ImageError> {
    let (src_w, src_h) = (img.width(), img.height());
    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let dst_aspect = f64::from(w) / f64::from(h);

    let (crop_w, crop_h) = if src_aspect > dst_aspect {
        let crop_w = (f64::from(src_h) * dst_aspect + 0.5).floor() as u32;
        (crop_w.clamp(1, src_w), src_h)
    } else {
        let crop_h = (f64::from(src_w) / dst_aspect + 0.5).floor() as u32;
        (src_w, crop_h.clamp(1, src_h))
    };

    let x = (src_w - crop_w) / 2;
    let y = (src_h - crop_h) / 2;
    let cropped = img.crop_imm(x, y, crop_w, crop_h);

    if (crop_w, crop_h) == (w, h) {
        Ok(cropped)
    } else {
        resize_image(&cropped, w, h)
    }
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_width =
        NonZeroU32::new(img.width()).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}

fn encode(img: &DynamicImage, format: SourceFormat) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let failed = |e: image::ImageError| ImageError::encode_failed(format.name(), e.to_string());

    match format {
        SourceFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
                .encode(&rgb, rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(failed)?;
        }
        SourceFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
                .map_err(failed)?;
        }
        SourceFormat::Gif => {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode_frame(Frame::new(img.to_rgba8()))
                .map_err(failed)?;
        }
    }

    Ok(buf)
}
