//! Image decoding into RGB pixel buffers.

use crate::types::{PipelineError, PixelBuffer};

/// Decode an image from raw file bytes (PNG, JPEG, BMP) into a 3-channel
/// RGB buffer.
///
/// The format is sniffed from the content, not a file name. Alpha is
/// dropped and grayscale sources are expanded to RGB.
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] if the bytes are empty, in an
/// unsupported format, or corrupt.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, PipelineError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img.to_rgb8();
    log::debug!("decode: {} bytes -> {}x{}", bytes.len(), rgb.width(), rgb.height());
    Ok(PixelBuffer::from(rgb))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Channels;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_to_rgb() {
        let img = image::RgbaImage::from_fn(3, 2, |x, _| {
            image::Rgba([u8::try_from(10 * x).unwrap(), 20, 30, 255])
        });
        let buf = decode(&encode_png(&img)).unwrap();
        assert_eq!(buf.channels(), Channels::Rgb);
        assert_eq!((buf.width(), buf.height()), (3, 2));
        assert_eq!(buf.pixel(2, 1), &[20, 20, 30]);
    }

    #[test]
    fn dimensions_match_source() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let buf = decode(&encode_png(&img)).unwrap();
        assert_eq!(buf.width(), 17);
        assert_eq!(buf.height(), 31);
        assert_eq!(buf.as_raw().len(), 17 * 31 * 3);
    }

    #[test]
    fn bmp_is_supported() {
        let img = image::RgbImage::from_fn(4, 4, |_, _| image::Rgb([1, 2, 3]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Bmp).unwrap();
        let decoded = decode(buf.get_ref()).unwrap();
        assert_eq!(decoded.pixel(0, 0), &[1, 2, 3]);
    }
}
