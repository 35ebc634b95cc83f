use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

use encoding_rs::{Encoding, UTF_8};
use image::{Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use tracing::{debug, info};

use crate::common::{ScanError, ScanResult};

pub const DEFAULT_SIZE: u32 = 1024;
pub const DEFAULT_MARGIN: u32 = 1;
/// Largest output side in pixels `QRBuilder` will render.
pub const MAX_SIDE: u32 = 16_384;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum ECLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<ECLevel> for EcLevel {
    fn from(ecl: ECLevel) -> Self {
        match ecl {
            ECLevel::L => EcLevel::L,
            ECLevel::M => EcLevel::M,
            ECLevel::Q => EcLevel::Q,
            ECLevel::H => EcLevel::H,
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{self:?}")
    }
}

impl FromStr for ECLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            other => Err(format!("unknown ec level: {other}")),
        }
    }
}

/// Looks up a character set by its WHATWG label, e.g. `utf-8` or `iso-8859-1`.
pub fn charset_for_label(label: &str) -> ScanResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ScanError::Encode(format!("unknown charset: {label}")))
}

// QR symbol
//------------------------------------------------------------------------------

/// Module grid of an encoded symbol, without quiet zone.
#[derive(Debug, Clone)]
pub struct QR {
    width: usize,
    version: i16,
    grid: Vec<bool>,
}

impl QR {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn version(&self) -> i16 {
        self.version
    }

    pub fn is_dark(&self, r: usize, c: usize) -> bool {
        self.grid[r * self.width + c]
    }

    /// Side in pixels of the canvas `render` draws for `size` and `margin`.
    pub fn side(&self, size: u32, margin: u32) -> u32 {
        size.max(self.quiet_width(margin))
    }

    fn quiet_width(&self, margin: u32) -> u32 {
        (self.width as u32).saturating_add(margin.saturating_mul(2))
    }

    /// Renders onto a square canvas of side `max(size, width + 2 * margin)`.
    /// Modules are scaled by the largest integer that fits and centred; any
    /// leftover pixels become extra border.
    pub fn render(&self, size: u32, margin: u32, fg: Rgba<u8>, bg: Rgba<u8>) -> RgbaImage {
        let input_w = self.width as u32;
        let qr_w = self.quiet_width(margin);
        let out_w = self.side(size, margin);
        let scale = out_w / qr_w;
        let pad = (out_w - input_w * scale) / 2;
        debug!(out_w, scale, pad, "Rendering symbol");

        RgbaImage::from_fn(out_w, out_w, |x, y| {
            let inside = (pad..pad + input_w * scale).contains(&x)
                && (pad..pad + input_w * scale).contains(&y);
            if inside && self.is_dark(((y - pad) / scale) as usize, ((x - pad) / scale) as usize) {
                fg
            } else {
                bg
            }
        })
    }

    /// Text rendering for a dark terminal: light modules and the quiet zone are
    /// `█`, dark modules are blank.
    pub fn to_str(&self, margin: usize, module_sz: usize) -> String {
        let qr_sz = self.width.saturating_mul(module_sz);
        let qz_sz = margin.saturating_mul(module_sz);
        let total_sz = qz_sz + qr_sz + qz_sz;

        let mut canvas = String::with_capacity(total_sz * (total_sz + 1) * 3);
        for i in 0..total_sz {
            for j in 0..total_sz {
                let inside = (qz_sz..qz_sz + qr_sz).contains(&i) && (qz_sz..qz_sz + qr_sz).contains(&j);
                let dark = inside && self.is_dark((i - qz_sz) / module_sz, (j - qz_sz) / module_sz);
                canvas.push(if dark { ' ' } else { '█' });
            }
            canvas.push('\n');
        }
        canvas
    }
}

// Builder
//------------------------------------------------------------------------------

pub struct QRBuilder<'a> {
    text: &'a str,
    size: u32,
    margin: u32,
    ec_level: ECLevel,
    fg: Rgba<u8>,
    bg: Rgba<u8>,
    charset: &'static Encoding,
}

impl<'a> QRBuilder<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            size: DEFAULT_SIZE,
            margin: DEFAULT_MARGIN,
            ec_level: ECLevel::M,
            fg: BLACK,
            bg: WHITE,
            charset: UTF_8,
        }
    }

    pub fn text(&mut self, text: &'a str) -> &mut Self {
        self.text = text;
        self
    }

    pub fn size(&mut self, size: u32) -> &mut Self {
        self.size = size;
        self
    }

    pub fn margin(&mut self, margin: u32) -> &mut Self {
        self.margin = margin;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    pub fn colors(&mut self, fg: Rgba<u8>, bg: Rgba<u8>) -> &mut Self {
        self.fg = fg;
        self.bg = bg;
        self
    }

    pub fn charset(&mut self, charset: &'static Encoding) -> &mut Self {
        self.charset = charset;
        self
    }

    pub fn metadata(&self) -> String {
        format!(
            "{{ Size: {}, Margin: {}, Ec level: {}, Charset: {} }}",
            self.size,
            self.margin,
            self.ec_level,
            self.charset.name()
        )
    }

    pub fn encode(&self) -> ScanResult<QR> {
        if self.text.trim().is_empty() {
            return Err(ScanError::EmptyText);
        }

        let (bytes, _, has_err) = self.charset.encode(self.text);
        if has_err {
            return Err(ScanError::Encode(format!(
                "text cannot be represented in {}",
                self.charset.name()
            )));
        }

        let code = QrCode::with_error_correction_level(&bytes, self.ec_level.into())
            .map_err(|e| ScanError::Encode(e.to_string()))?;
        let version = match code.version() {
            qrcode::Version::Normal(v) | qrcode::Version::Micro(v) => v,
        };
        let grid = code.to_colors().into_iter().map(|c| c == qrcode::Color::Dark).collect();
        debug!(version, width = code.width(), "Encoded symbol");
        let qr = QR { width: code.width(), version, grid };

        let side = qr.side(self.size, self.margin);
        if side > MAX_SIDE {
            return Err(ScanError::Encode(format!(
                "image side {side} exceeds {MAX_SIDE} pixels"
            )));
        }
        Ok(qr)
    }

    pub fn build(&self) -> ScanResult<RgbaImage> {
        debug!("Generating QR {}", self.metadata());
        let qr = self.encode()?;
        let img = qr.render(self.size, self.margin, self.fg, self.bg);
        info!(version = qr.version(), side = img.width(), "QR generated");
        Ok(img)
    }
}

/// `size` x `size` black-on-white QR image of `text`, or larger if the symbol
/// plus margin does not fit.
pub fn encode(text: &str, size: u32, margin: u32, ec_level: ECLevel) -> ScanResult<RgbaImage> {
    QRBuilder::new(text).size(size).margin(margin).ec_level(ec_level).build()
}
