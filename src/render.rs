//! Text to monochrome raster rendering.
//!
//! Rasterizes a handful of text lines onto a fixed-size two-colour canvas
//! using an embedded TrueType font (DejaVu Sans Mono), then encodes the
//! result as PNG or BMP for the device to fetch.
//!
//! # Example
//!
//! ```
//! use framed::render::{OutputFormat, RenderConfig, Renderer};
//!
//! let renderer = Renderer::embedded(RenderConfig::default()).unwrap();
//! let frame = renderer.render(&["12:00 Monday, week 1", "Hello"]);
//! let png = frame.encode(OutputFormat::Png).unwrap();
//! assert!(png.starts_with(b"\x89PNG"));
//! ```

use std::fmt;
use std::str::FromStr;

use fontdue::{Font, FontSettings};
use image::{GrayImage, Luma};

use crate::error::Error;
use crate::{CHARS_PER_LINE, DISPLAY_HEIGHT, DISPLAY_WIDTH, MAX_LINES};

/// Embedded DejaVu Sans Mono font
pub static EMBEDDED_FONT: &[u8] = include_bytes!("../fonts/DejaVuSansMono.ttf");

/// Glyph coverage at or above this is drawn in the foreground colour.
const COVERAGE_THRESHOLD: u8 = 128;

/// How many rows and columns of text fit on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutLimits {
    /// Rows beyond this are dropped
    pub max_lines: usize,
    /// Longer lines are truncated to this many characters
    pub max_chars_per_line: usize,
}

impl Default for LayoutLimits {
    fn default() -> Self {
        Self {
            max_lines: MAX_LINES,
            max_chars_per_line: CHARS_PER_LINE,
        }
    }
}

/// Font size and text placement, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontDescription {
    /// Font size; also the distance between baselines
    pub size: f32,
    /// Gap above the first row
    pub offset: i32,
    /// Left margin
    pub margin: i32,
}

impl Default for FontDescription {
    fn default() -> Self {
        Self {
            size: 30.0,
            offset: 10,
            margin: 15,
        }
    }
}

/// Two-colour palette as 8-bit luma values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Canvas colour
    pub background: u8,
    /// Text colour
    pub foreground: u8,
}

impl Palette {
    /// Black text on white
    pub const BLACK_ON_WHITE: Palette = Palette {
        background: 255,
        foreground: 0,
    };

    /// White text on black
    pub const WHITE_ON_BLACK: Palette = Palette {
        background: 0,
        foreground: 255,
    };

    /// Grey RGB entries, background first, for indexed encodings.
    fn rgb_entries(self) -> [u8; 6] {
        let (bg, fg) = (self.background, self.foreground);
        [bg, bg, bg, fg, fg, fg]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::BLACK_ON_WHITE
    }
}

/// Configuration for frame rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Canvas width (default: 800)
    pub width: u32,
    /// Canvas height (default: 480)
    pub height: u32,
    /// Font size and placement
    pub font: FontDescription,
    /// Row and column limits
    pub limits: LayoutLimits,
    /// Colours
    pub palette: Palette,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
            font: FontDescription::default(),
            limits: LayoutLimits::default(),
            palette: Palette::default(),
        }
    }
}

impl RenderConfig {
    /// Use a different palette.
    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Use different layout limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LayoutLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Use a different font size and placement.
    #[must_use]
    pub fn with_font(mut self, font: FontDescription) -> Self {
        self.font = font;
        self
    }
}

/// Raster image format served to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// PNG (default)
    #[default]
    Png,
    /// Windows bitmap
    Bmp,
}

impl OutputFormat {
    /// MIME type for the `Content-Type` header.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Bmp => "image/bmp",
        }
    }

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "bmp" => Ok(OutputFormat::Bmp),
            other => Err(Error::Config(format!("Unknown image format '{}'", other))),
        }
    }
}

/// One rendered screen. Every pixel holds either the palette's background
/// or its foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: GrayImage,
    palette: Palette,
}

impl Frame {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw pixels.
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Encode as a 1-bit, two-entry palette image into an in-memory buffer,
    /// so the length is known up front.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, Error> {
        match format {
            OutputFormat::Png => self.encode_png(),
            OutputFormat::Bmp => Ok(self.encode_bmp()),
        }
    }

    fn encode_png(&self) -> Result<Vec<u8>, Error> {
        let stride = self.width().div_ceil(8) as usize;
        let mut data = Vec::with_capacity(stride * self.height() as usize);
        for y in 0..self.height() {
            data.extend(self.pack_row(y, stride));
        }

        let mut buf = Vec::new();
        let mut encoder = png::Encoder::new(&mut buf, self.width(), self.height());
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::One);
        encoder.set_palette(self.palette.rgb_entries().to_vec());
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
        Ok(buf)
    }

    fn encode_bmp(&self) -> Vec<u8> {
        const HEADER_LEN: u32 = 14 + 40 + 2 * 4;
        // BMP rows are padded to 4 bytes
        let stride = self.width().div_ceil(32) as usize * 4;
        let image_len = (stride * self.height() as usize) as u32;

        let mut buf = Vec::with_capacity((HEADER_LEN + image_len) as usize);
        buf.extend_from_slice(b"BM");
        buf.extend_from_slice(&(HEADER_LEN + image_len).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&HEADER_LEN.to_le_bytes());

        // BITMAPINFOHEADER, bottom-up rows
        buf.extend_from_slice(&40u32.to_le_bytes());
        buf.extend_from_slice(&(self.width() as i32).to_le_bytes());
        buf.extend_from_slice(&(self.height() as i32).to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // planes
        buf.extend_from_slice(&1u16.to_le_bytes()); // bits per pixel
        buf.extend_from_slice(&0u32.to_le_bytes()); // uncompressed
        buf.extend_from_slice(&image_len.to_le_bytes());
        buf.extend_from_slice(&2835i32.to_le_bytes()); // 72 dpi
        buf.extend_from_slice(&2835i32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes()); // palette entries
        buf.extend_from_slice(&0u32.to_le_bytes());

        for luma in [self.palette.background, self.palette.foreground] {
            buf.extend_from_slice(&[luma, luma, luma, 0]);
        }
        for y in (0..self.height()).rev() {
            buf.extend(self.pack_row(y, stride));
        }
        buf
    }

    /// One row at one bit per pixel, most significant bit first. Set bits
    /// are foreground.
    fn pack_row(&self, y: u32, stride: usize) -> Vec<u8> {
        let mut row = vec![0u8; stride];
        for x in 0..self.width() {
            if self.image.get_pixel(x, y).0[0] == self.palette.foreground {
                row[(x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }
        row
    }
}

/// Renders text lines with a font loaded once at startup.
///
/// Immutable after construction; share it freely between request handlers.
pub struct Renderer {
    font: Font,
    config: RenderConfig,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Parse `font_data` as a TrueType/OpenType font.
    pub fn new(font_data: &[u8], config: RenderConfig) -> Result<Self, Error> {
        let settings = FontSettings {
            scale: config.font.size,
            ..FontSettings::default()
        };
        let font =
            Font::from_bytes(font_data, settings).map_err(|e| Error::Font(e.to_string()))?;
        Ok(Self { font, config })
    }

    /// Renderer using the embedded DejaVu Sans Mono.
    pub fn embedded(config: RenderConfig) -> Result<Self, Error> {
        Self::new(EMBEDDED_FONT, config)
    }

    /// The active configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Distance between baselines in pixels.
    pub fn line_height(&self) -> i32 {
        self.config.font.size.round() as i32
    }

    /// Draw `lines` top to bottom, one per row.
    ///
    /// Rows beyond the layout limit are dropped and long lines are cut to
    /// the column limit. A line the font cannot draw is left blank and
    /// logged; the rest of the frame is still rendered.
    pub fn render<S: AsRef<str>>(&self, lines: &[S]) -> Frame {
        let RenderConfig {
            width,
            height,
            font,
            limits,
            palette,
        } = self.config;
        let mut image = GrayImage::from_pixel(width, height, Luma([palette.background]));

        let step = self.line_height();
        for (row, line) in lines.iter().take(limits.max_lines).enumerate() {
            let text = clamp_line(line.as_ref(), limits.max_chars_per_line);
            let baseline = font.offset + (row as i32 + 1) * step;
            if let Err(e) = self.draw_line(&mut image, font.margin, baseline, text) {
                tracing::warn!(row, error = %e, "Skipping line that cannot be drawn");
            }
        }

        Frame { image, palette }
    }

    fn draw_line(
        &self,
        image: &mut GrayImage,
        x: i32,
        baseline: i32,
        text: &str,
    ) -> Result<(), Error> {
        // Check the whole line first so a bad line leaves nothing behind
        if let Some(ch) = text
            .chars()
            .find(|&c| !c.is_whitespace() && self.font.lookup_glyph_index(c) == 0)
        {
            return Err(Error::MissingGlyph { ch });
        }

        let size = self.config.font.size;
        let space = self.font.metrics(' ', size).advance_width;
        let ink = Luma([self.config.palette.foreground]);
        let mut cursor = x as f32;

        for ch in text.chars() {
            if ch.is_whitespace() {
                cursor += space;
                continue;
            }

            let (metrics, coverage) = self.font.rasterize(ch, size);
            let left = cursor.round() as i32 + metrics.xmin;
            let top = baseline - metrics.height as i32 - metrics.ymin;

            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    if coverage[row * metrics.width + col] < COVERAGE_THRESHOLD {
                        continue;
                    }
                    let px = left + col as i32;
                    let py = top + row as i32;
                    if px < 0 || py < 0 {
                        continue;
                    }
                    if let Some(pixel) = image.get_pixel_mut_checked(px as u32, py as u32) {
                        *pixel = ink;
                    }
                }
            }

            cursor += metrics.advance_width;
        }

        Ok(())
    }
}

/// Cut `line` to at most `max_chars` characters (not bytes).
pub fn clamp_line(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_IMAGE_SIZE;
    use std::io::Cursor;

    fn renderer() -> Renderer {
        Renderer::embedded(RenderConfig::default()).unwrap()
    }

    fn ink(frame: &Frame) -> usize {
        frame.as_image().pixels().filter(|p| p.0[0] == 0).count()
    }

    fn full_screen(r: &Renderer) -> Frame {
        let lines: Vec<String> = (0..MAX_LINES)
            .map(|i| format!("{:02} {}", i, "Wq@#".repeat(10)))
            .collect();
        r.render(&lines)
    }

    #[test]
    fn test_render_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 480);
        assert_eq!(config.limits.max_lines, 14);
        assert_eq!(config.limits.max_chars_per_line, 42);
        assert_eq!(config.palette, Palette::BLACK_ON_WHITE);
    }

    #[test]
    fn test_bad_font_is_an_error() {
        let err = Renderer::new(b"definitely not a font", RenderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Font(_)));
    }

    #[test]
    fn test_clamp_line() {
        assert_eq!(clamp_line("hello", 3), "hel");
        assert_eq!(clamp_line("hello", 5), "hello");
        assert_eq!(clamp_line("hello", 10), "hello");
        assert_eq!(clamp_line("ééé", 2), "éé");
        assert_eq!(clamp_line("", 2), "");
    }

    #[test]
    fn test_multibyte_line_at_limit_is_kept() {
        let line = "é".repeat(CHARS_PER_LINE);
        assert_eq!(clamp_line(&line, CHARS_PER_LINE), line);

        let r = renderer();
        let full = r.render(&[line.as_str()]);
        let short = r.render(&["é".repeat(CHARS_PER_LINE - 1)]);
        assert_ne!(full, short);
    }

    #[test]
    fn test_render_dimensions_and_ink() {
        let r = renderer();
        let blank = r.render::<&str>(&[]);
        assert_eq!(blank.width(), 800);
        assert_eq!(blank.height(), 480);
        assert_eq!(ink(&blank), 0);

        let hello = r.render(&["Hello"]);
        assert!(ink(&hello) > 0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = renderer();
        let lines = ["12:00 Monday, week 1", "Hello", "World"];
        let a = r.render(&lines).encode(OutputFormat::Png).unwrap();
        let b = r.render(&lines).encode(OutputFormat::Png).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_long_line_is_truncated() {
        let r = renderer();
        let long = "x".repeat(CHARS_PER_LINE + 20);
        let exact = "x".repeat(CHARS_PER_LINE);
        assert_eq!(r.render(&[long]), r.render(&[exact]));
    }

    #[test]
    fn test_extra_lines_are_dropped() {
        let r = renderer();
        let lines: Vec<String> = (0..MAX_LINES + 5).map(|i| format!("row {}", i)).collect();
        assert_eq!(r.render(&lines), r.render(&lines[..MAX_LINES]));
        assert_ne!(r.render(&lines), r.render(&lines[..MAX_LINES - 1]));
    }

    #[test]
    fn test_undrawable_line_is_skipped() {
        let r = renderer();
        let with_bad = r.render(&["ok", "smile \u{1F600}", "after"]);
        let without = r.render(&["ok", "", "after"]);
        assert_eq!(with_bad, without);
    }

    #[test]
    fn test_whitespace_only_advances() {
        let r = renderer();
        assert_eq!(ink(&r.render(&["   \t  "])), 0);
        assert_ne!(r.render(&["a b"]), r.render(&["ab"]));
    }

    #[test]
    fn test_inverted_palette() {
        let config = RenderConfig::default().with_palette(Palette::WHITE_ON_BLACK);
        let r = Renderer::embedded(config).unwrap();
        let frame = r.render(&["Hello"]);
        assert_eq!(frame.as_image().get_pixel(0, 0).0[0], 0);
        assert!(frame.as_image().pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn test_encode_formats() {
        let frame = renderer().render(&["Hello"]);

        let png = frame.encode(OutputFormat::Png).unwrap();
        assert!(png.starts_with(b"\x89PNG"));

        let bmp = frame.encode(OutputFormat::Bmp).unwrap();
        assert!(bmp.starts_with(b"BM"));

        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(&decoded, frame.as_image());
        let decoded = image::load_from_memory(&bmp).unwrap().to_luma8();
        assert_eq!(&decoded, frame.as_image());
    }

    #[test]
    fn test_png_is_one_bit_indexed() {
        let png = full_screen(&renderer()).encode(OutputFormat::Png).unwrap();
        assert!(png.len() <= MAX_IMAGE_SIZE);

        let reader = png::Decoder::new(Cursor::new(&png)).read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.bit_depth, png::BitDepth::One);
        assert_eq!(info.color_type, png::ColorType::Indexed);
        assert_eq!(info.palette.as_deref(), Some(&[255, 255, 255, 0, 0, 0][..]));
    }

    #[test]
    fn test_bmp_is_one_bit() {
        let bmp = full_screen(&renderer()).encode(OutputFormat::Bmp).unwrap();
        assert!(bmp.len() <= MAX_IMAGE_SIZE);
        assert_eq!(bmp.len(), 62 + 100 * 480);
        assert_eq!(u32::from_le_bytes([bmp[2], bmp[3], bmp[4], bmp[5]]) as usize, bmp.len());
        assert_eq!(u16::from_le_bytes([bmp[28], bmp[29]]), 1);
    }

    #[test]
    fn test_inverted_palette_round_trips() {
        let config = RenderConfig::default().with_palette(Palette::WHITE_ON_BLACK);
        let frame = Renderer::embedded(config).unwrap().render(&["Hello"]);
        for format in [OutputFormat::Png, OutputFormat::Bmp] {
            let data = frame.encode(format).unwrap();
            let decoded = image::load_from_memory(&data).unwrap().to_luma8();
            assert_eq!(&decoded, frame.as_image(), "{}", format);
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("BMP".parse::<OutputFormat>().unwrap(), OutputFormat::Bmp);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Bmp.content_type(), "image/bmp");
        assert_eq!(OutputFormat::Png.to_string(), "png");
    }
}
