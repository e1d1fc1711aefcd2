//! Image decode/encode collaborators.
//!
//! The conversion core only sees [`ImageCodec`]. [`PngCodec`] is the default
//! implementation backed by the `image` crate: it reads DDS (DXT1/3/5), TGA,
//! BMP and PNG inputs and writes PNG.

use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, GenericImageView, ImageBuffer, ImageError, ImageOutputFormat};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{DecodeError, EncodeError};

/// Pixel layout of a [`RawImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Luma8,
    LumaA8,
    Rgb8,
    Rgba8,
    Bgra8,
    Rgba16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::LumaA8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgba16 => 8,
        }
    }
}

/// Decoded pixels handed from the decoder to the encoder
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Bytes per row, including any padding
    pub row_stride: usize,
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Tightly packed image with no row padding
    pub fn packed(width: u32, height: u32, pixel_format: PixelFormat, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixel_format,
            row_stride: width as usize * pixel_format.bytes_per_pixel(),
            pixels,
        }
    }

    /// Pixel data with row padding removed
    fn tight_rows(&self) -> Result<Cow<'_, [u8]>, EncodeError> {
        let row_len = self.width as usize * self.pixel_format.bytes_per_pixel();
        let height = self.height as usize;

        if self.row_stride < row_len {
            return Err(EncodeError::InvalidBuffer {
                reason: format!(
                    "row stride {} shorter than row length {}",
                    self.row_stride, row_len
                ),
            });
        }
        let needed = match height {
            0 => 0,
            h => self.row_stride * (h - 1) + row_len,
        };
        if self.pixels.len() < needed {
            return Err(EncodeError::InvalidBuffer {
                reason: format!("{} bytes supplied, {} required", self.pixels.len(), needed),
            });
        }

        if self.row_stride == row_len {
            return Ok(Cow::Borrowed(&self.pixels[..needed]));
        }
        let mut packed = Vec::with_capacity(row_len * height);
        for row in 0..height {
            let start = row * self.row_stride;
            packed.extend_from_slice(&self.pixels[start..start + row_len]);
        }
        Ok(Cow::Owned(packed))
    }
}

/// Decode and encode collaborators used by the conversion worker
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RawImage, DecodeError>;

    /// Must not leave a partial file at `path` when it fails
    fn encode(&self, image: &RawImage, path: &Path) -> Result<(), EncodeError>;
}

/// `image`-crate backed codec writing PNG
#[derive(Debug, Default, Clone, Copy)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn decode(&self, path: &Path) -> Result<RawImage, DecodeError> {
        // Format comes from the file signature only, never the extension
        let reader = ImageReader::new(BufReader::new(File::open(path)?)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(DecodeError::UnsupportedFormat {
                reason: format!("unrecognized file signature: {}", path.display()),
            });
        }
        let decoded = reader.decode().map_err(decode_error)?;

        let (pixel_format, decoded) = match decoded.color() {
            ColorType::L8 => (PixelFormat::Luma8, decoded),
            ColorType::La8 => (PixelFormat::LumaA8, decoded),
            ColorType::Rgb8 => (PixelFormat::Rgb8, decoded),
            ColorType::Rgba8 => (PixelFormat::Rgba8, decoded),
            _ => (PixelFormat::Rgba8, DynamicImage::ImageRgba8(decoded.to_rgba8())),
        };
        let (width, height) = decoded.dimensions();

        Ok(RawImage::packed(width, height, pixel_format, decoded.into_bytes()))
    }

    fn encode(&self, image: &RawImage, path: &Path) -> Result<(), EncodeError> {
        let dynamic = to_dynamic(image)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::Builder::new()
            .prefix(".dds2png-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            dynamic
                .write_to(&mut writer, ImageOutputFormat::Png)
                .map_err(encode_error)?;
            writer.flush()?;
        }

        staged.persist(path).map_err(|e| EncodeError::Io(e.error))?;
        Ok(())
    }
}

fn to_dynamic(image: &RawImage) -> Result<DynamicImage, EncodeError> {
    let (width, height) = (image.width, image.height);
    let pixels = image.tight_rows()?.into_owned();
    let short = || EncodeError::InvalidBuffer {
        reason: format!("buffer too small for {width}x{height}"),
    };

    let dynamic = match image.pixel_format {
        PixelFormat::Luma8 => {
            DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, pixels).ok_or_else(short)?)
        }
        PixelFormat::LumaA8 => {
            DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, pixels).ok_or_else(short)?)
        }
        PixelFormat::Rgb8 => {
            DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, pixels).ok_or_else(short)?)
        }
        PixelFormat::Rgba8 => {
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, pixels).ok_or_else(short)?)
        }
        PixelFormat::Bgra8 => {
            let mut pixels = pixels;
            pixels.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, pixels).ok_or_else(short)?)
        }
        other => return Err(EncodeError::UnsupportedPixelFormat(other)),
    };
    Ok(dynamic)
}

fn decode_error(e: ImageError) -> DecodeError {
    match e {
        ImageError::IoError(io) => DecodeError::Io(io),
        ImageError::Unsupported(u) => DecodeError::UnsupportedFormat {
            reason: u.to_string(),
        },
        other => DecodeError::CorruptData {
            reason: other.to_string(),
        },
    }
}

fn encode_error(e: ImageError) -> EncodeError {
    match e {
        ImageError::IoError(io) => EncodeError::Io(io),
        other => EncodeError::Encoder {
            reason: other.to_string(),
        },
    }
}
