// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Format descriptors and the negotiation contract.
//!
//! A [`FormatDescriptor`] is a partially-specified raw video format: every
//! field is either concrete (`Some`) or a wildcard (`None`). Negotiation
//! turns a proposal into a fully concrete descriptor or rejects it.
//!
//! The contract supported by every filter node is fixed:
//!
//! | field                 | accepted value            | default              |
//! |-----------------------|---------------------------|----------------------|
//! | kind                  | raw video                 | raw video            |
//! | pixel layout          | RGB32                     | RGB32                |
//! | width / height        | any non-zero              | preferred (320x240)  |
//! | row stride            | width × 4                 | width × 4            |
//! | pixel / line offset   | 0                         | 0                    |
//! | field rate            | any positive, finite      | preferred (30)       |
//! | interlace             | 1                         | 1                    |
//! | first active line     | 0                         | 0                    |
//! | last active line      | height − 1                | height − 1           |
//! | orientation           | top-left, left-to-right   | top-left             |
//! | pixel aspect (w, h)   | 1, 1                      | 1, 1                 |

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{Destination, Error, Result};

/// Bytes per pixel in the only supported layout.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Top-level classification of the data on a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    RawVideo,
    RawAudio,
    EncodedVideo,
    EncodedAudio,
    Multistream,
}

/// Memory layout of one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 32-bit `0x00RRGGBB` words in host byte order.
    Rgb32,
    Rgba32,
    Rgb24,
    Rgb16,
    Yuv422,
    Gray8,
}

/// Scan order of the lines in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// First line is the top of the image, pixels run left to right.
    TopLeftRight,
    BottomLeftRight,
}

/// A raw video format where any field may be a wildcard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatDescriptor {
    pub kind: Option<MediaKind>,
    pub pixel_layout: Option<PixelLayout>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Bytes per row.
    pub row_stride: Option<u32>,
    /// Offset of the origin pixel within a row.
    pub pixel_offset: Option<u32>,
    pub line_offset: Option<u32>,
    /// Fields (frames for progressive material) per second.
    pub field_rate: Option<f32>,
    pub interlace: Option<u32>,
    pub first_active: Option<u32>,
    pub last_active: Option<u32>,
    pub orientation: Option<Orientation>,
    pub pixel_width_aspect: Option<u16>,
    pub pixel_height_aspect: Option<u16>,
}

impl FormatDescriptor {
    /// The fully wildcard template.
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// A raw-video template: the kind is set, everything else is wildcard.
    pub fn raw_video() -> Self {
        Self {
            kind: Some(MediaKind::RawVideo),
            ..Self::default()
        }
    }

    /// Returns `true` if the video fields carry no concrete value.
    ///
    /// The media kind is not considered, so a raw-video template is still a
    /// wildcard format.
    pub fn is_wildcard(&self) -> bool {
        self.pixel_layout.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.row_stride.is_none()
            && self.pixel_offset.is_none()
            && self.line_offset.is_none()
            && self.field_rate.is_none()
            && self.interlace.is_none()
            && self.first_active.is_none()
            && self.last_active.is_none()
            && self.orientation.is_none()
            && self.pixel_width_aspect.is_none()
            && self.pixel_height_aspect.is_none()
    }

    /// Returns `true` if every field is concrete.
    pub fn is_concrete(&self) -> bool {
        self.kind.is_some()
            && self.pixel_layout.is_some()
            && self.width.is_some()
            && self.height.is_some()
            && self.row_stride.is_some()
            && self.pixel_offset.is_some()
            && self.line_offset.is_some()
            && self.field_rate.is_some()
            && self.interlace.is_some()
            && self.first_active.is_some()
            && self.last_active.is_some()
            && self.orientation.is_some()
            && self.pixel_width_aspect.is_some()
            && self.pixel_height_aspect.is_some()
    }

    /// Size in bytes of one frame, if stride and height are known.
    pub fn frame_size(&self) -> Option<usize> {
        Some(self.row_stride? as usize * self.height? as usize)
    }

    /// Clears every video field, keeping the media kind.
    pub(crate) fn clear_video(&mut self) {
        *self = Self {
            kind: self.kind,
            ..Self::default()
        };
    }

    /// Fills wildcards in `self` from the concrete fields of `other`.
    fn inherit(&mut self, other: &FormatDescriptor) {
        macro_rules! inherit {
            ($($field:ident),*) => {
                $(if self.$field.is_none() { self.$field = other.$field; })*
            };
        }
        inherit!(
            kind,
            pixel_layout,
            width,
            height,
            row_stride,
            pixel_offset,
            line_offset,
            field_rate,
            interlace,
            first_active,
            last_active,
            orientation,
            pixel_width_aspect,
            pixel_height_aspect
        );
    }
}

fn show<T: fmt::Debug>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| format!("{v:?}"))
        .unwrap_or_else(|| "*".to_owned())
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}x{} stride {} @{} fps, interlace {}, active {}..{}, {}, aspect {}:{}",
            show(&self.kind),
            show(&self.pixel_layout),
            show(&self.width),
            show(&self.height),
            show(&self.row_stride),
            show(&self.field_rate),
            show(&self.interlace),
            show(&self.first_active),
            show(&self.last_active),
            show(&self.orientation),
            show(&self.pixel_width_aspect),
            show(&self.pixel_height_aspect),
        )
    }
}

/// The node's preferred values for the free fields of the contract.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferredFormat {
    pub width: u32,
    pub height: u32,
    pub field_rate: f32,
}

impl Default for PreferredFormat {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            field_rate: 30.0,
        }
    }
}

/// Resolves wildcard-bearing proposals against the fixed raw-video contract.
///
/// The negotiator holds no reference to connection state; it only reads and
/// writes the descriptor it is handed, so it can be exercised in isolation.
#[derive(Clone, Debug)]
pub struct FormatNegotiator {
    input: Destination,
    preferred: PreferredFormat,
}

/// Resolves one field: fills a wildcard with `default`, then checks support.
fn settle<T: Copy + fmt::Debug>(
    field: &mut Option<T>,
    name: &'static str,
    default: T,
    supported: impl FnOnce(T) -> bool,
) -> Result<T> {
    let value = *field.get_or_insert(default);
    if supported(value) {
        Ok(value)
    } else {
        debug!("Unsupported value for {}: {:?}", name, value);
        Err(Error::BadFormat)
    }
}

impl FormatNegotiator {
    /// Creates a negotiator for the input addressed by `input`.
    pub fn new(input: Destination, preferred: PreferredFormat) -> Self {
        Self { input, preferred }
    }

    pub fn preferred(&self) -> PreferredFormat {
        self.preferred
    }

    /// Negotiates a format proposed for this node's input.
    ///
    /// On success every wildcard in `proposed` has been replaced by the
    /// preferred value and the descriptor is fully concrete. On failure
    /// `proposed` is left exactly as it was passed in.
    ///
    /// # Errors
    ///
    /// - [`Error::BadDestination`] if `destination` is not the node's input
    /// - [`Error::BadFormat`] if any concrete field is not supported
    pub fn negotiate(&self, destination: Destination, proposed: &mut FormatDescriptor) -> Result<()> {
        if destination != self.input {
            debug!("Negotiation addressed to {}, expected {}", destination, self.input);
            return Err(Error::BadDestination);
        }
        self.specialize(proposed)
    }

    /// Fully specializes `proposed` without checking the addressed endpoint.
    ///
    /// Same atomicity as [`Self::negotiate`].
    pub fn specialize(&self, proposed: &mut FormatDescriptor) -> Result<()> {
        let mut format = proposed.clone();
        self.specialize_in_place(&mut format)?;
        trace!("Specialized format: {}", format);
        *proposed = format;
        Ok(())
    }

    /// Specializes an output proposal constrained by the working format.
    ///
    /// Wildcards are filled from `working` first, then from the defaults.
    /// When `working` is already concrete the result has to match it, since
    /// transforms keep frames the same size.
    pub fn specialize_output(
        &self,
        proposed: &mut FormatDescriptor,
        working: &FormatDescriptor,
    ) -> Result<()> {
        let mut format = proposed.clone();
        format.inherit(working);
        self.specialize_in_place(&mut format)?;
        if working.is_concrete() && format != *working {
            debug!("Output proposal {} conflicts with working format {}", format, working);
            return Err(Error::BadFormat);
        }
        *proposed = format;
        Ok(())
    }

    fn specialize_in_place(&self, f: &mut FormatDescriptor) -> Result<()> {
        settle(&mut f.kind, "kind", MediaKind::RawVideo, |k| k == MediaKind::RawVideo)?;
        settle(&mut f.pixel_layout, "pixel layout", PixelLayout::Rgb32, |p| {
            p == PixelLayout::Rgb32
        })?;
        let width = settle(&mut f.width, "width", self.preferred.width, |w| w > 0)?;
        let height = settle(&mut f.height, "height", self.preferred.height, |h| h > 0)?;

        // Derived: a row is exactly one packed line of RGB32 pixels.
        let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or(Error::BadFormat)?;
        settle(&mut f.row_stride, "row stride", stride, |s| s == stride)?;

        settle(&mut f.pixel_offset, "pixel offset", 0, |o| o == 0)?;
        settle(&mut f.line_offset, "line offset", 0, |o| o == 0)?;
        settle(&mut f.field_rate, "field rate", self.preferred.field_rate, |r| {
            r.is_finite() && r > 0.0
        })?;
        settle(&mut f.interlace, "interlace", 1, |i| i == 1)?;
        settle(&mut f.first_active, "first active", 0, |l| l == 0)?;

        // Derived: every line of the frame is active.
        settle(&mut f.last_active, "last active", height - 1, |l| l == height - 1)?;

        settle(&mut f.orientation, "orientation", Orientation::TopLeftRight, |o| {
            o == Orientation::TopLeftRight
        })?;
        settle(&mut f.pixel_width_aspect, "pixel width aspect", 1, |a| a == 1)?;
        settle(&mut f.pixel_height_aspect, "pixel height aspect", 1, |a| a == 1)?;
        Ok(())
    }

    /// Checks the media kind of a proposal, treating a wildcard as a mismatch.
    pub fn check_kind(format: &FormatDescriptor) -> Result<()> {
        match format.kind {
            Some(MediaKind::RawVideo) => Ok(()),
            other => {
                debug!("Bad format kind: {}", show(&other));
                Err(Error::BadFormat)
            }
        }
    }
}
