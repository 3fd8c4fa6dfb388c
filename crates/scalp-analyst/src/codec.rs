//! Chart image codec
//!
//! Every vendor receives the chart the same way: lossless PNG bytes, base64
//! encoded with the standard alphabet and padding. Whatever format the chart
//! was loaded from, it is re-encoded to PNG here.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};
use scalp_llm::EncodedImage;
use thiserror::Error;
use tracing::debug;

/// Image codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// The PNG encoder rejected the image
    #[error("failed to encode chart as PNG: {0}")]
    Encoding(#[source] image::ImageError),

    /// Input bytes are not a readable image
    #[error("failed to decode chart image: {0}")]
    Decoding(#[source] image::ImageError),

    /// Payload is not valid base64
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Image has zero width or height
    #[error("chart image has no pixels")]
    EmptyImage,
}

/// A decoded, non-empty raster chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    inner: DynamicImage,
}

impl ChartImage {
    /// Wrap an in-memory image
    ///
    /// Floating point rasters are converted to 8-bit RGBA since PNG cannot
    /// hold them.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, CodecError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CodecError::EmptyImage);
        }

        let inner = match image {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                DynamicImage::ImageRgba8(image.to_rgba8())
            }
            other => other,
        };
        Ok(Self { inner })
    }

    /// Decode any format the `image` crate recognizes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let image = image::load_from_memory(bytes).map_err(CodecError::Decoding)?;
        Self::from_dynamic(image)
    }

    /// Read and decode an image file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        debug!("Loading chart from {}", path.display());
        let image = image::open(path).map_err(CodecError::Decoding)?;
        Self::from_dynamic(image)
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Underlying raster
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }
}

/// Serialize a chart as PNG and base64-encode it
pub fn encode_png_base64(image: &ChartImage) -> Result<EncodedImage, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .inner
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(CodecError::Encoding)?;

    let bytes = buffer.into_inner();
    debug!(
        width = image.width(),
        height = image.height(),
        png_bytes = bytes.len(),
        "Encoded chart"
    );
    Ok(EncodedImage::png(STANDARD.encode(bytes)))
}

/// Inverse of [`encode_png_base64`]
pub fn decode_base64_png(encoded: &EncodedImage) -> Result<ChartImage, CodecError> {
    let bytes = STANDARD.decode(encoded.data.as_bytes())?;
    ChartImage::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn candles() -> ChartImage {
        let raster = RgbImage::from_fn(12, 8, |x, y| {
            if (x + y) % 3 == 0 {
                Rgb([16, 185, 129])
            } else {
                Rgb([239, 68, 68])
            }
        });
        ChartImage::from_dynamic(DynamicImage::ImageRgb8(raster)).unwrap()
    }

    #[test]
    fn test_encoding_is_png_base64() {
        let encoded = encode_png_base64(&candles()).unwrap();
        assert_eq!(encoded.media_type, "image/png");

        let bytes = STANDARD.decode(&encoded.data).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_round_trip_preserves_pixels() {
        let chart = candles();
        let decoded = decode_base64_png(&encode_png_base64(&chart).unwrap()).unwrap();
        assert_eq!(decoded.as_dynamic().to_rgb8(), chart.as_dynamic().to_rgb8());
    }

    #[test]
    fn test_reencoding_is_stable() {
        let first = encode_png_base64(&candles()).unwrap();
        let second = encode_png_base64(&decode_base64_png(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_jpeg_input_is_reencoded_as_png() {
        let mut jpeg = Cursor::new(Vec::new());
        candles()
            .as_dynamic()
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();

        let chart = ChartImage::from_bytes(&jpeg.into_inner()).unwrap();
        assert_eq!((chart.width(), chart.height()), (12, 8));

        let encoded = encode_png_base64(&chart).unwrap();
        let bytes = STANDARD.decode(&encoded.data).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn test_alpha_channel_survives() {
        let raster = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 128]));
        let chart = ChartImage::from_dynamic(DynamicImage::ImageRgba8(raster)).unwrap();
        let decoded = decode_base64_png(&encode_png_base64(&chart).unwrap()).unwrap();
        assert_eq!(decoded.as_dynamic().to_rgba8().get_pixel(1, 1), &Rgba([10, 20, 30, 128]));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let err = ChartImage::from_dynamic(DynamicImage::new_rgb8(0, 4)).unwrap_err();
        assert!(matches!(err, CodecError::EmptyImage));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            ChartImage::from_bytes(b"definitely not an image"),
            Err(CodecError::Decoding(_))
        ));
        assert!(matches!(
            decode_base64_png(&EncodedImage::png("***")),
            Err(CodecError::Base64(_))
        ));
    }
}
