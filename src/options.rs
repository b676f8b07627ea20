//! Transform directives
//!
//! A request may carry a compact directive string describing how the fetched
//! image should be transformed. The same string is appended to the target URL
//! as a `#` fragment so it becomes part of the cache key.
//!
//! # Grammar
//!
//! Comma separated tokens, any order:
//!
//! ```text
//! 100x200   width 100, height 200 (either side may be empty)
//! 0.5x      half of the original width
//! 150       square shorthand, 150x150
//! fit       scale to fit inside the box instead of cropping
//! fv, fh    flip vertically / horizontally
//! r90       rotate clockwise (0, 90, 180 or 270)
//! ```
//!
//! [`TransformOptions::encode`] always writes the canonical order
//! `{w}x{h},fit,fv,fh,r{deg}` so `decode(encode(x)) == x`.

use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;

/// Clockwise rotation applied after resizing and flipping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Parsed set of transform directives
///
/// `width` and `height` follow the same convention: a value in (0, 1) is a
/// fraction of the original dimension, anything else is an absolute pixel
/// count and 0 leaves that axis unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformOptions {
    pub width: f64,
    pub height: f64,
    pub fit: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub rotate: Rotation,
}

impl TransformOptions {
    /// No transform requested; the payload is passed through untouched
    pub const EMPTY: TransformOptions = TransformOptions {
        width: 0.0,
        height: 0.0,
        fit: false,
        flip_horizontal: false,
        flip_vertical: false,
        rotate: Rotation::None,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Serialize to the canonical directive string (`""` when empty)
    pub fn encode(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = format!("{}x{}", self.width, self.height);
        if self.fit {
            out.push_str(",fit");
        }
        if self.flip_vertical {
            out.push_str(",fv");
        }
        if self.flip_horizontal {
            out.push_str(",fh");
        }
        if self.rotate != Rotation::None {
            out.push_str(&format!(",r{}", self.rotate.degrees()));
        }
        out
    }

    /// Parse a directive string; unknown or malformed tokens are rejected
    pub fn decode(directives: &str) -> Result<Self, ProxyError> {
        let mut options = TransformOptions::EMPTY;
        let mut size_seen = false;

        for token in directives.split(',').map(str::trim) {
            if token.is_empty() {
                continue;
            }

            match token {
                "fit" => options.fit = true,
                "fv" => options.flip_vertical = true,
                "fh" => options.flip_horizontal = true,
                _ if token.starts_with('r') => {
                    options.rotate = parse_rotation(&token[1..]).ok_or_else(|| {
                        ProxyError::bad_request(format!("invalid rotation directive: {:?}", token))
                    })?;
                }
                _ => {
                    if size_seen {
                        return Err(ProxyError::bad_request(format!(
                            "duplicate size directive: {:?}",
                            token
                        )));
                    }
                    let (width, height) = parse_size(token)?;
                    options.width = width;
                    options.height = height;
                    size_seen = true;
                }
            }
        }

        Ok(options)
    }
}

impl fmt::Display for TransformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TransformOptions {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn parse_rotation(value: &str) -> Option<Rotation> {
    value.parse::<u16>().ok().and_then(Rotation::from_degrees)
}

fn parse_size(token: &str) -> Result<(f64, f64), ProxyError> {
    match token.split_once('x') {
        Some((w, h)) => Ok((parse_dimension(w, token)?, parse_dimension(h, token)?)),
        None => {
            let side = parse_dimension(token, token)?;
            Ok((side, side))
        }
    }
}

fn parse_dimension(value: &str, token: &str) -> Result<f64, ProxyError> {
    if value.is_empty() {
        return Ok(0.0);
    }

    let invalid = || ProxyError::bad_request(format!("invalid directive: {:?}", token));

    // Only plain decimals; rejects "inf", "NaN", exponents and signs
    if !value.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid());
    }
    let parsed: f64 = value.parse().map_err(|_| invalid())?;
    if !parsed.is_finite() {
        return Err(invalid());
    }
    Ok(parsed)
}
