use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use super::{FrameExtractionError, NotReadyReason};

/// Matches the quality browsers use for `canvas.toBlob('image/jpeg')`.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// One still, JPEG-encoded, ready for a single round trip to the service.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Monotonic per loop; results echo it back so stale ones can be dropped.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

impl SampledFrame {
    pub fn encode(
        sequence: u64,
        image: &RgbImage,
        quality: u8,
    ) -> Result<Self, FrameExtractionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FrameExtractionError::NotReady(
                NotReadyReason::InvalidDimensions { width, height },
            ));
        }

        let mut jpeg = Vec::with_capacity((width * height / 4) as usize);
        JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(image)?;

        Ok(Self {
            sequence,
            captured_at: Utc::now(),
            width,
            height,
            jpeg,
        })
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.jpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encodes_jpeg_with_sequence_and_dimensions() {
        let image = RgbImage::from_pixel(64, 48, Rgb([200, 120, 40]));
        let frame = SampledFrame::encode(7, &image, DEFAULT_JPEG_QUALITY).unwrap();

        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width, frame.height), (64, 48));
        // JPEG SOI marker
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn base64_payload_decodes_back_to_the_jpeg() {
        let image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        let frame = SampledFrame::encode(1, &image, 80).unwrap();

        let decoded = general_purpose::STANDARD.decode(frame.to_base64()).unwrap();
        assert_eq!(decoded, frame.jpeg);
    }

    #[test]
    fn rejects_empty_images() {
        let image = RgbImage::new(0, 0);
        let err = SampledFrame::encode(1, &image, 80).unwrap_err();
        assert!(matches!(
            err,
            FrameExtractionError::NotReady(NotReadyReason::InvalidDimensions { .. })
        ));
    }
}
