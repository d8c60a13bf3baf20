use anyhow::Result;
use fast_image_resize::images::Image;
use fast_image_resize::{IntoImageView, Resizer};
use image::DynamicImage;

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    /// Fill value for the letterbox padding.
    pub pad: [u8; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            height: 640,
            width: 640,
            channels: 3,
            pad: [114, 114, 114],
        }
    }
}

/// How the source image was placed inside the model input: needed to map
/// predicted boxes back to source-image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct LetterboxMeta {
    pub scale: f32,
    pub x_offset: u32,
    pub y_offset: u32,
}

#[derive(Debug)]
pub struct Processor {
    pub config: PreprocessConfig,
}

impl Processor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    fn convert_to_dynamic(&self, image: Image<'static>) -> DynamicImage {
        DynamicImage::ImageRgb8(
            image::ImageBuffer::from_raw(image.width(), image.height(), image.buffer().to_vec())
                .expect("Failed to create ImageBuffer"),
        )
    }

    /// Letterbox the image into the model input size, keeping aspect ratio, and
    /// scale pixel values to [0, 1] in CHW order with a leading batch axis.
    pub fn preprocess(
        &self,
        x: &DynamicImage,
    ) -> Result<(ndarray::Array<f32, ndarray::IxDyn>, LetterboxMeta)> {
        // Normalize to RGB8 up front so the resize buffer layout is known.
        let x = DynamicImage::ImageRgb8(x.to_rgb8());
        let (orig_width, orig_height) = (x.width(), x.height());
        let scale = (self.config.width as f32 / orig_width as f32)
            .min(self.config.height as f32 / orig_height as f32);
        let new_width = (orig_width as f32 * scale) as u32;
        let new_height = (orig_height as f32 * scale) as u32;

        let mut dst_image = Image::new(
            new_width,
            new_height,
            x.pixel_type()
                .ok_or_else(|| anyhow::anyhow!("unsupported pixel layout"))?,
        );
        let mut resizer = Resizer::new();
        let resize_options = fast_image_resize::ResizeOptions::new()
            .resize_alg(fast_image_resize::ResizeAlg::Nearest);
        resizer
            .resize(&x, &mut dst_image, Some(&resize_options))
            .map_err(|e| anyhow::anyhow!("resize failed: {e}"))?;
        let resized = self.convert_to_dynamic(dst_image).to_rgb8();

        let mut padded = image::RgbImage::from_pixel(
            self.config.width as u32,
            self.config.height as u32,
            image::Rgb(self.config.pad),
        );
        // Center the resized image in the padded canvas.
        let x_offset = (self.config.width as u32 - new_width) / 2;
        let y_offset = (self.config.height as u32 - new_height) / 2;
        image::imageops::overlay(&mut padded, &resized, x_offset as i64, y_offset as i64);

        let mut img_arr =
            ndarray::Array::zeros((1, self.config.channels, self.config.height, self.config.width));
        for (i, rgb) in padded.pixels().enumerate() {
            let y = i / self.config.width;
            let x = i % self.config.width;
            img_arr[[0, 0, y, x]] = rgb[0] as f32 / 255.0;
            img_arr[[0, 1, y, x]] = rgb[1] as f32 / 255.0;
            img_arr[[0, 2, y, x]] = rgb[2] as f32 / 255.0;
        }

        let meta = LetterboxMeta {
            scale,
            x_offset,
            y_offset,
        };
        Ok((img_arr.into_dyn(), meta))
    }
}
