//! Callout rendering: geometry, paint commands and the raster surface

pub mod font;
pub mod layout;
pub mod paint;
pub mod raster;

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// PNG encoding of a rendered surface
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

impl Screenshot {
    /// `data:image/png;base64,...` form of the PNG bytes
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png_data))
    }
}
