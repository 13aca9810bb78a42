//! Payload string + options → encoded image bytes.
//!
//! The batch pipeline only sees the [`Renderer`] trait, which yields PNG.
//! [`QrRenderer`] is the concrete implementation: `qrcode` for the symbol matrix,
//! `image` for raster, PNG and JPEG; `qrcode`'s SVG renderer for vector export.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use qrcode::render::svg;
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

use crate::{CornerStyle, DotStyle, ErrorCorrection, OutputFormat, RenderOptions};

/// Side length of a finder pattern in modules.
const FINDER: usize = 7;

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot encode payload ({len} bytes): {reason}")]
    Encode { len: usize, reason: String },
    #[error("invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Other(String),
}

/// Turns one payload into encoded image bytes. Called concurrently from worker threads.
pub trait Renderer: Send + Sync {
    fn render(&self, data: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &RenderOptions) -> Result<Vec<u8>, RenderError> + Send + Sync,
{
    fn render(&self, data: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        self(data, options)
    }
}

impl From<ErrorCorrection> for EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

/// Styled PNG renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct QrRenderer;

impl QrRenderer {
    pub fn new() -> Self {
        Self
    }

    fn symbol(&self, data: &str, options: &RenderOptions) -> Result<QrCode, RenderError> {
        if options.width == 0 || options.height == 0 {
            return Err(RenderError::InvalidSize {
                width: options.width,
                height: options.height,
            });
        }
        // An empty symbol is not encodable; a lone space keeps the slot renderable.
        let data = if data.is_empty() { " " } else { data };
        QrCode::with_error_correction_level(data.as_bytes(), options.error_correction.into()).map_err(
            |e| RenderError::Encode {
                len: data.len(),
                reason: e.to_string(),
            },
        )
    }

    /// Rasterize without encoding.
    pub fn raster(&self, data: &str, options: &RenderOptions) -> Result<RgbaImage, RenderError> {
        let code = self.symbol(data, options)?;
        let matrix = Matrix {
            n: code.width(),
            dark: code
                .to_colors()
                .into_iter()
                .map(|c| c == Color::Dark)
                .collect(),
        };
        Ok(paint(&matrix, options))
    }

    /// Render in `format`. Dot and corner styles apply to raster output; SVG draws square modules
    /// with the requested colors, at least `width x height`, with a quiet zone when `margin > 0`.
    pub fn encode(&self, data: &str, options: &RenderOptions, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        match format {
            OutputFormat::Png => {
                let img = self.raster(data, options)?;
                let mut bytes = Vec::new();
                DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
                Ok(bytes)
            }
            OutputFormat::Jpeg => {
                let flat = flatten_on_white(&self.raster(data, options)?);
                let mut bytes = Vec::new();
                JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&flat)?;
                Ok(bytes)
            }
            OutputFormat::Svg => {
                let code = self.symbol(data, options)?;
                let (dark, light) = (options.fg_color.to_string(), options.bg_color.to_string());
                let doc = code
                    .render::<svg::Color>()
                    .min_dimensions(options.width, options.height)
                    .dark_color(svg::Color(&dark))
                    .light_color(svg::Color(&light))
                    .quiet_zone(options.margin > 0)
                    .build();
                Ok(doc.into_bytes())
            }
        }
    }
}

impl Renderer for QrRenderer {
    fn render(&self, data: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        self.encode(data, options, OutputFormat::Png)
    }
}

/// Composite onto white, dropping alpha.
fn flatten_on_white(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgba([r, g, b, a]) = *img.get_pixel(x, y);
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

struct Matrix {
    n: usize,
    dark: Vec<bool>,
}

impl Matrix {
    fn is_dark(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 || x as usize >= self.n || y as usize >= self.n {
            return false;
        }
        self.dark[y as usize * self.n + x as usize]
    }

    /// Origin of the finder pattern containing module `(x, y)`, if any.
    fn finder_origin(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let far = self.n - FINDER;
        [(0, 0), (far, 0), (0, far)]
            .into_iter()
            .find(|&(ox, oy)| x >= ox && x < ox + FINDER && y >= oy && y < oy + FINDER)
    }
}

fn paint(matrix: &Matrix, options: &RenderOptions) -> RgbaImage {
    let fg = Rgba(options.fg_color.to_rgba());
    let bg = Rgba(options.bg_color.to_rgba());
    let mut img = RgbaImage::from_pixel(options.width, options.height, bg);

    let span = (matrix.n + 2 * options.margin as usize) as f64;
    let side = f64::from(options.width.min(options.height));
    let scale = side / span;
    let off_x = (f64::from(options.width) - side) / 2.0;
    let off_y = (f64::from(options.height) - side) / 2.0;
    let margin = f64::from(options.margin);

    for (px, py, pixel) in img.enumerate_pixels_mut() {
        let mx = (f64::from(px) + 0.5 - off_x) / scale - margin;
        let my = (f64::from(py) + 0.5 - off_y) / scale - margin;
        if mx < 0.0 || my < 0.0 || mx >= matrix.n as f64 || my >= matrix.n as f64 {
            continue;
        }
        let (x, y) = (mx.floor() as usize, my.floor() as usize);
        let hit = match matrix.finder_origin(x, y) {
            Some((ox, oy)) => in_finder(options.corner_style, mx - ox as f64, my - oy as f64),
            None => {
                matrix.dark[y * matrix.n + x]
                    && in_dot(matrix, options.dot_style, x, y, mx.fract(), my.fract())
            }
        };
        if hit {
            *pixel = fg;
        }
    }
    img
}

/// Inside an axis-aligned square at `(x0, y0)` of side `size` with corner radius `r`.
fn in_rounded_square(x: f64, y: f64, x0: f64, y0: f64, size: f64, r: f64) -> bool {
    if x < x0 || y < y0 || x >= x0 + size || y >= y0 + size {
        return false;
    }
    let cx = x.clamp(x0 + r, x0 + size - r);
    let cy = y.clamp(y0 + r, y0 + size - r);
    (x - cx).powi(2) + (y - cy).powi(2) <= r * r
}

/// `(fx, fy)` are coordinates inside the 7×7 finder, in modules.
fn in_finder(style: CornerStyle, fx: f64, fy: f64) -> bool {
    let (outer_r, inner_r, eye_r) = match style {
        CornerStyle::Square => (0.0, 0.0, 0.0),
        CornerStyle::Dot => (3.5, 2.5, 1.5),
        CornerStyle::ExtraRounded => (2.5, 1.5, 0.75),
    };
    let ring = in_rounded_square(fx, fy, 0.0, 0.0, 7.0, outer_r)
        && !in_rounded_square(fx, fy, 1.0, 1.0, 5.0, inner_r);
    ring || in_rounded_square(fx, fy, 2.0, 2.0, 3.0, eye_r)
}

/// `(u, v)` are fractional coordinates inside dark module `(x, y)`.
fn in_dot(matrix: &Matrix, style: DotStyle, x: usize, y: usize, u: f64, v: f64) -> bool {
    if style == DotStyle::Square {
        return true;
    }
    if style == DotStyle::Dots {
        return (u - 0.5).powi(2) + (v - 0.5).powi(2) <= 0.25;
    }

    let (xi, yi) = (x as isize, y as isize);
    let free_left = !matrix.is_dark(xi - 1, yi);
    let free_right = !matrix.is_dark(xi + 1, yi);
    let free_top = !matrix.is_dark(xi, yi - 1);
    let free_bottom = !matrix.is_dark(xi, yi + 1);

    let left = u < 0.5;
    let top = v < 0.5;
    let (free_h, free_v) = (
        if left { free_left } else { free_right },
        if top { free_top } else { free_bottom },
    );
    // Main diagonal corners: top-left and bottom-right.
    let diagonal = left == top;

    let r = match style {
        DotStyle::Rounded if free_h && free_v => 0.25,
        DotStyle::ExtraRounded if free_h && free_v => 0.5,
        DotStyle::Classy if diagonal && free_h && free_v => 0.5,
        DotStyle::ClassyRounded if free_h && free_v => {
            if diagonal {
                0.5
            } else {
                0.25
            }
        }
        _ => 0.0,
    };
    in_rounded_square(u, v, 0.0, 0.0, 1.0, r)
}
