//! # StarPRNT Byte Constants
//!
//! Escape bytes and integer encoding shared by the StarPRNT commands this
//! emulator understands.
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`
//!
//! ## Reference
//!
//! Based on "StarPRNT Command Specifications Rev. 4.10"
//! by Star Micronics Co., Ltd.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
///
/// Most StarPRNT commands begin with ESC (0x1B).
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used in combination with ESC for extended commands:
/// - `ESC GS` prefix for graphics, status, and advanced features
/// - Hex: 0x1D, Decimal: 29
pub const GS: u8 = 0x1D;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
///
/// ## Example
///
/// ```
/// use cloudprnt_emulator::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(576), [0x40, 0x02]); // 576 = 0x0240
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

/// Decode a little-endian [low, high] byte pair
///
/// ```
/// use cloudprnt_emulator::protocol::commands::read_u16_le;
///
/// assert_eq!(read_u16_le(0xF4, 0x01), 500);
/// ```
#[inline]
pub const fn read_u16_le(low: u8, high: u8) -> u16 {
    low as u16 | (high as u16) << 8
}
