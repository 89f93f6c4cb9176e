//! Packed 32-bit colors: `0xAARRGGBB`.
//!
//! Every color crossing a module boundary travels in this form. Quantization
//! only ever looks at fully opaque colors, so the packing helpers that build a
//! color from channels always set alpha to 255.

/// Pack three 8-bit channels into an opaque ARGB color.
#[inline]
pub const fn argb_from_rgb(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Pack four 8-bit channels into an ARGB color.
#[inline]
pub const fn argb_from_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

#[inline]
pub const fn alpha_from_argb(argb: u32) -> u8 {
    (argb >> 24) as u8
}

#[inline]
pub const fn red_from_argb(argb: u32) -> u8 {
    (argb >> 16) as u8
}

#[inline]
pub const fn green_from_argb(argb: u32) -> u8 {
    (argb >> 8) as u8
}

#[inline]
pub const fn blue_from_argb(argb: u32) -> u8 {
    argb as u8
}

/// Unpack the color channels, dropping alpha.
#[inline]
pub const fn rgb_from_argb(argb: u32) -> [u8; 3] {
    [red_from_argb(argb), green_from_argb(argb), blue_from_argb(argb)]
}

/// Whether the color is fully opaque.
#[inline]
pub const fn is_opaque(argb: u32) -> bool {
    alpha_from_argb(argb) == 255
}
