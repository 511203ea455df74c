// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Variable-length size header written in front of every allocation.
//!
//! The user size is split into 7-bit groups and stored *backwards* from the
//! payload, most-significant group first:
//!
//! ```text
//!   user_size = 17281 = 0000001 0000111 0000001 (three groups)
//!
//!   payload - 3   payload - 2   payload - 1   payload
//!   ┌──────────┬──────────┬──────────┬──────────────────┐
//!   │ 00000001 │ 10000111 │ 10000001 │  user bytes ...  │
//!   └──────────┴──────────┴──────────┴──────────────────┘
//!     stop        more        more
//! ```
//!
//! The high bit of a byte means "keep scanning back"; the byte furthest
//! from the payload has it clear. Four bytes hold 28 bits, so sizes of
//! `2^28` and above are rejected with [`ArenaError::CapacityExceeded`].

use crate::ArenaError;

/// Largest number of bytes a size header may occupy.
pub const MAX_HEADER_BYTES: usize = 4;

/// Largest user size the header can encode (`2^28 - 1`).
pub const MAX_ENCODABLE_SIZE: usize = (1 << (GROUP_BITS * MAX_HEADER_BYTES)) - 1;

const GROUP_BITS: usize = 7;
const GROUP_MASK: u8 = 0x7F;
const CONTINUE: u8 = 0x80;

/// A decoded size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeHeader {
    /// Number of header bytes in front of the payload.
    pub header_size: usize,
    /// User-visible size of the payload.
    pub user_size: usize,
}

impl SizeHeader {
    /// Total storage span of the block: header plus payload.
    pub fn span(&self) -> usize {
        self.header_size + self.user_size
    }
}

/// Returns the minimal number of header bytes needed for `user_size`.
pub fn header_size_for(user_size: usize) -> Result<usize, ArenaError> {
    match user_size {
        s if s < 1 << 7 => Ok(1),
        s if s < 1 << 14 => Ok(2),
        s if s < 1 << 21 => Ok(3),
        s if s <= MAX_ENCODABLE_SIZE => Ok(4),
        _ => Err(ArenaError::CapacityExceeded {
            requested: user_size,
        }),
    }
}

/// Splits a block span into the narrowest header that describes it exactly.
///
/// Returns `None` when the remaining payload would not be encodable. At
/// the 7-bit group boundaries no canonical width exists (a span of 129
/// is either 1 + 128 or 2 + 127, and neither header is minimal for its
/// payload); the wider header is chosen and written with a leading zero
/// group.
pub fn header_for_span(span: usize) -> Option<SizeHeader> {
    (1..=MAX_HEADER_BYTES).find_map(|header_size| {
        let user_size = span.checked_sub(header_size)?;
        match header_size_for(user_size) {
            Ok(needed) if needed <= header_size => Some(SizeHeader {
                header_size,
                user_size,
            }),
            _ => None,
        }
    })
}

/// Writes the canonical header for `user_size` so that it ends at
/// `payload - 1`. Returns the number of bytes written.
pub fn encode(heap: &mut [u8], payload: usize, user_size: usize) -> Result<usize, ArenaError> {
    let width = header_size_for(user_size)?;
    encode_with_width(heap, payload, user_size, width)?;
    Ok(width)
}

/// Writes `user_size` using exactly `width` header bytes.
///
/// `width` may exceed the canonical size; the surplus leading groups are
/// zero and still decode to the same value.
pub fn encode_with_width(
    heap: &mut [u8],
    payload: usize,
    user_size: usize,
    width: usize,
) -> Result<(), ArenaError> {
    let needed = header_size_for(user_size)?;
    if width < needed || width > MAX_HEADER_BYTES {
        return Err(ArenaError::CapacityExceeded {
            requested: user_size,
        });
    }
    if payload < width || payload > heap.len() {
        return Err(ArenaError::Corruption(format!(
            "size header of {width} bytes before offset {payload} does not fit the arena"
        )));
    }

    for i in 0..width {
        let shift = GROUP_BITS * (width - i - 1);
        let mut byte = (user_size >> shift) as u8 & GROUP_MASK;
        if i != width - 1 {
            byte |= CONTINUE;
        }
        heap[payload - 1 - i] = byte;
    }
    Ok(())
}

/// Reads the header that ends at `payload - 1`.
///
/// Scans at most [`MAX_HEADER_BYTES`] bytes. Returns `None` if the payload
/// lies outside `(0, heap.len()]` or the scan would run off the front of
/// the buffer.
pub fn decode(heap: &[u8], payload: usize) -> Option<SizeHeader> {
    if payload == 0 || payload > heap.len() {
        return None;
    }

    let mut user_size = 0usize;
    for header_size in 1..=MAX_HEADER_BYTES {
        let byte = heap[payload.checked_sub(header_size)?];
        user_size = (user_size << GROUP_BITS) | usize::from(byte & GROUP_MASK);
        if byte & CONTINUE == 0 {
            return Some(SizeHeader {
                header_size,
                user_size,
            });
        }
    }

    Some(SizeHeader {
        header_size: MAX_HEADER_BYTES,
        user_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [usize; 10] = [
        0, 1, 126, 127, 128, 16383, 16384, 2097151, 2097152, 268435455,
    ];

    #[test]
    fn test_header_size_boundaries() {
        assert_eq!(header_size_for(0).unwrap(), 1);
        assert_eq!(header_size_for(127).unwrap(), 1);
        assert_eq!(header_size_for(128).unwrap(), 2);
        assert_eq!(header_size_for(16383).unwrap(), 2);
        assert_eq!(header_size_for(16384).unwrap(), 3);
        assert_eq!(header_size_for(2097151).unwrap(), 3);
        assert_eq!(header_size_for(2097152).unwrap(), 4);
        assert_eq!(header_size_for(MAX_ENCODABLE_SIZE).unwrap(), 4);
    }

    #[test]
    fn test_capacity_exceeded() {
        let result = header_size_for(1 << 28);
        assert_eq!(
            result,
            Err(ArenaError::CapacityExceeded { requested: 1 << 28 })
        );

        let mut heap = [0u8; 8];
        assert!(encode(&mut heap, 4, 1 << 28).is_err());
        assert_eq!(heap, [0u8; 8]);
    }

    #[test]
    fn test_round_trip() {
        for size in SAMPLES {
            let mut heap = [0u8; 8];
            let width = encode(&mut heap, 6, size).unwrap();
            let decoded = decode(&heap, 6).unwrap();
            assert_eq!(decoded.user_size, size, "size {size}");
            assert_eq!(decoded.header_size, width);
            assert_eq!(decoded.header_size, header_size_for(size).unwrap());
        }
    }

    #[test]
    fn test_byte_layout() {
        let mut heap = [0u8; 4];
        assert_eq!(encode(&mut heap, 4, 17281).unwrap(), 3);
        assert_eq!(heap[3], 0b1000_0001);
        assert_eq!(heap[2], 0b1000_0111);
        assert_eq!(heap[1], 0b0000_0001);
        // Bytes outside the header are untouched.
        assert_eq!(heap[0], 0);
    }

    #[test]
    fn test_single_byte_header_has_no_continuation() {
        let mut heap = [0xFFu8; 2];
        encode(&mut heap, 2, 10).unwrap();
        assert_eq!(heap, [0xFF, 10]);
    }

    #[test]
    fn test_padded_width_decodes() {
        let mut heap = [0u8; 4];
        encode_with_width(&mut heap, 4, 127, 2).unwrap();
        assert_eq!(heap[3], CONTINUE);
        assert_eq!(heap[2], 127);
        let decoded = decode(&heap, 4).unwrap();
        assert_eq!(decoded.header_size, 2);
        assert_eq!(decoded.user_size, 127);
    }

    #[test]
    fn test_width_too_narrow() {
        let mut heap = [0u8; 4];
        assert!(encode_with_width(&mut heap, 4, 128, 1).is_err());
        assert!(encode_with_width(&mut heap, 4, 1, 5).is_err());
    }

    #[test]
    fn test_header_out_of_bounds() {
        let mut heap = [0u8; 4];
        assert!(matches!(
            encode(&mut heap, 1, 200),
            Err(ArenaError::Corruption(_))
        ));
        assert!(encode(&mut heap, 5, 1).is_err());
    }

    #[test]
    fn test_decode_bounds() {
        let heap = [CONTINUE; 4];
        assert!(decode(&heap, 0).is_none());
        assert!(decode(&heap, 5).is_none());
        // Continuation bits all the way to the front of the buffer.
        assert!(decode(&heap, 2).is_none());
        // Four continuation bytes stop the scan at the limit.
        let decoded = decode(&heap, 4).unwrap();
        assert_eq!(decoded.header_size, MAX_HEADER_BYTES);
        assert_eq!(decoded.user_size, 0);
    }

    #[test]
    fn test_header_for_span() {
        assert_eq!(
            header_for_span(11),
            Some(SizeHeader {
                header_size: 1,
                user_size: 10
            })
        );
        assert_eq!(header_for_span(128).unwrap().header_size, 1);
        assert_eq!(header_for_span(130).unwrap().header_size, 2);

        // No canonical split exists at the group boundary.
        let boundary = header_for_span(129).unwrap();
        assert_eq!(boundary.header_size, 2);
        assert_eq!(boundary.user_size, 127);
        assert_eq!(boundary.span(), 129);

        assert!(header_for_span(MAX_ENCODABLE_SIZE + 4).is_some());
        assert!(header_for_span(MAX_ENCODABLE_SIZE + 5).is_none());
    }
}
