//! In-place byte transform
//!
//! Implements the additive byte shift applied to every file. Each byte is
//! replaced by `(byte + delta) mod 256`, where `delta` is the key for
//! encryption and its negation for decryption. This is a toy substitution
//! and offers no confidentiality; a real cipher would slot in at the
//! [`transform`] boundary.

mod action;
mod shift;

pub use action::Action;
pub use shift::{shift_byte, transform};

/// Size of the byte alphabet the shift wraps around
pub const BYTE_RANGE: u16 = 256;
