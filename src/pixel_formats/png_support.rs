// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::error::{Error, Result};
use crate::pixel_formats::Image;
use png::{ColorType, Transformations};
use std::io::Cursor;

impl Image {
    /// Decodes a PNG into 8-bit RGBA.
    ///
    /// Palettes are expanded and 16-bit channels are reduced to 8 bits.
    pub fn from_png(bytes: &[u8]) -> Result<Image> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(Transformations::normalize_to_color8());
        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::config(format!("can't read PNG header: {e}")))?;
        let (width, height) = {
            let info = reader.info();
            (info.width, info.height)
        };
        let mut buffer = vec![0; (width * height * 4) as usize];
        let frame = reader
            .next_frame(&mut buffer)
            .map_err(|e| Error::config(format!("can't decode PNG: {e}")))?;
        let samples = frame.color_type.samples();
        let packed = &buffer[..(width * height) as usize * samples];
        let rgba: Vec<u8> = match frame.color_type {
            ColorType::Rgba => packed.to_vec(),
            ColorType::Rgb => packed
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            ColorType::GrayscaleAlpha => packed
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            ColorType::Grayscale => packed.iter().flat_map(|g| [*g, *g, *g, 255]).collect(),
            ColorType::Indexed => {
                return Err(Error::config("PNG palette was not expanded"));
            }
        };
        Image::from_rgba(width, height, rgba)
            .ok_or_else(|| Error::config("PNG decoded to an unexpected size"))
    }
}
