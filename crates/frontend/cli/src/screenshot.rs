use anyhow::{Context, Result};
use retro_core::types::Frame;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write `frame` as an 8-bit RGBA PNG.
pub fn write_png(path: &Path, frame: &Frame) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let w = BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_rgba(frame))?;
    writer.finish()?;
    Ok(())
}

fn to_rgba(frame: &Frame) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(frame.pixels.len() * 4);
    for &px in &frame.pixels {
        let r = (px >> 16) as u8;
        let g = (px >> 8) as u8;
        let b = px as u8;
        let a = (px >> 24) as u8;
        rgba.extend_from_slice(&[r, g, b, a]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_is_reordered() {
        let frame = Frame {
            width: 2,
            height: 1,
            pixels: vec![0xFF11_2233, 0x8044_5566],
        };
        assert_eq!(
            to_rgba(&frame),
            vec![0x11, 0x22, 0x33, 0xFF, 0x44, 0x55, 0x66, 0x80]
        );
    }

    #[test]
    fn png_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut frame = Frame::new(4, 3);
        frame.pixels[0] = 0xFFFF_0000;
        write_png(&path, &frame).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
