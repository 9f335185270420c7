// SPDX-License-Identifier: MIT OR Apache-2.0
//! RGBA colours carried by nodes and ports.

use serde::{Deserialize, Serialize};

/// Straight-alpha colour with float channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha (the persisted `colorT` channel)
    pub a: f32,
}

impl Color {
    /// Default node body colour (yellow-green)
    pub const NODE_DEFAULT: Self = Self::new(0.603_921_6, 0.803_921_6, 0.196_078_43, 1.0);
    /// Default port colour
    pub const PORT_DEFAULT: Self = Self::new(0.501_960_8, 0.666_666_7, 0.666_666_7, 1.0);

    /// Create a colour from float channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a colour from 8-bit channels
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
            a: f32::from(a) / 255.0,
        }
    }

    /// Convert to an egui colour for renderers
    pub fn to_color32(self) -> egui::Color32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        egui::Color32::from_rgba_unmultiplied(
            channel(self.r),
            channel(self.g),
            channel(self.b),
            channel(self.a),
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::NODE_DEFAULT
    }
}
