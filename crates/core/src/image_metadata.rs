//! PNG text-chunk access for workflows embedded in generated images.
//!
//! ComfyUI's `SaveImage` node stores the execution graph under the `prompt`
//! keyword and the display graph under `workflow`.

use std::collections::HashMap;
use std::io::Cursor;

use crate::error::CoreError;

/// Text-chunk keyword holding the execution graph.
pub const PROMPT_KEY: &str = "prompt";

/// Text-chunk keyword holding the display graph.
pub const WORKFLOW_KEY: &str = "workflow";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

fn png_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Png(e.to_string())
}

/// Read all `tEXt`, `zTXt` and `iTXt` chunks, whether they are written
/// before or after the image data.
pub fn read_text_chunks(bytes: &[u8]) -> Result<HashMap<String, String>, CoreError> {
    if !is_png(bytes) {
        return Err(CoreError::Malformed("Not a PNG image".to_string()));
    }

    let decoder = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder.read_info().map_err(png_error)?;
    // Skips the pixel data and parses the remaining chunks up to IEND.
    reader.finish().map_err(png_error)?;
    let info = reader.info();

    let mut chunks = HashMap::new();
    for chunk in &info.uncompressed_latin1_text {
        chunks.insert(chunk.keyword.clone(), chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        match chunk.get_text() {
            Ok(text) => {
                chunks.insert(chunk.keyword.clone(), text);
            }
            Err(e) => tracing::warn!(keyword = %chunk.keyword, error = %e, "Skipping unreadable zTXt chunk"),
        }
    }
    for chunk in &info.utf8_text {
        match chunk.get_text() {
            Ok(text) => {
                chunks.insert(chunk.keyword.clone(), text);
            }
            Err(e) => tracing::warn!(keyword = %chunk.keyword, error = %e, "Skipping unreadable iTXt chunk"),
        }
    }
    Ok(chunks)
}

/// Re-encode a PNG with additional text chunks.
///
/// ASCII text is written as `tEXt`, anything else as `iTXt`. Palette
/// images are expanded to true colour in the process.
pub fn embed_text_chunks(bytes: &[u8], chunks: &[(&str, String)]) -> Result<Vec<u8>, CoreError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().map_err(png_error)?;
    let mut pixels = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut pixels).map_err(png_error)?;
    pixels.truncate(frame.buffer_size());

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
        encoder.set_color(frame.color_type);
        encoder.set_depth(frame.bit_depth);
        for (keyword, text) in chunks {
            if text.is_ascii() {
                encoder
                    .add_text_chunk(keyword.to_string(), text.clone())
                    .map_err(png_error)?;
            } else {
                encoder
                    .add_itxt_chunk(keyword.to_string(), text.clone())
                    .map_err(png_error)?;
            }
        }
        let mut writer = encoder.write_header().map_err(png_error)?;
        writer.write_image_data(&pixels).map_err(png_error)?;
        writer.finish().map_err(png_error)?;
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_support {
    /// A 2x2 RGB image with the given text chunks.
    pub fn png_with_text(chunks: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 2);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            for (keyword, text) in chunks {
                encoder
                    .add_text_chunk(keyword.to_string(), text.to_string())
                    .unwrap();
            }
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[255u8; 12]).unwrap();
            writer.finish().unwrap();
        }
        out
    }

    /// A 2x2 RGB image whose text chunks follow the image data.
    pub fn png_with_trailing_text(chunks: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 2);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[255u8; 12]).unwrap();
            for (keyword, text) in chunks {
                if text.is_ascii() {
                    writer
                        .write_text_chunk(&png::text_metadata::TEXtChunk::new(*keyword, *text))
                        .unwrap();
                } else {
                    writer
                        .write_text_chunk(&png::text_metadata::ITXtChunk::new(*keyword, *text))
                        .unwrap();
                }
            }
            writer.finish().unwrap();
        }
        out
    }
}
