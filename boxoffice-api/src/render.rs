use std::io::Cursor;

use boxoffice_core::render::{CodeRenderer, RenderError};
use image::{ImageFormat, Luma};
use qrcode::QrCode;

/// Renders redemption code values as QR PNGs.
pub struct QrPngRenderer {
    min_dimension: u32,
}

impl QrPngRenderer {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl Default for QrPngRenderer {
    fn default() -> Self {
        Self::new(300)
    }
}

impl CodeRenderer for QrPngRenderer {
    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
        let code = QrCode::new(payload.as_bytes()).map_err(|e| RenderError(e.to_string()))?;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RenderError(e.to_string()))?;
        Ok(bytes)
    }
}
