//! Codecs for the compressed integer formats of ECMA-335 II.23.2.
//!
//! Unlike the rest of the physical metadata, which is little-endian,
//! compressed integers are stored big-endian with the length encoded in
//! the top bits of the first byte.

use crate::{Error, ErrorKind};

/// The largest value representable as a compressed unsigned integer.
pub(crate) const MAX_COMPRESSED_UNSIGNED: u32 = 0x1FFF_FFFF;

/// Decodes a compressed unsigned number at the start of a byte slice,
/// returning the number and the rest of the slice in the success case.
pub(crate) fn decode_unsigned(data: &[u8]) -> Result<(u32, &[u8]), Error> {
    let first_byte = *data
        .first()
        .ok_or(ErrorKind::InvalidCompressedUnsigned)?;

    if first_byte & 0b1000_0000 == 0 {
        return Ok((first_byte as u32, &data[1..]));
    }

    if first_byte & 0b0100_0000 == 0 {
        let bytes = data
            .get(..2)
            .ok_or(ErrorKind::InvalidCompressedUnsigned)?;
        let num = u16::from_be_bytes(bytes.try_into().unwrap());
        let masked = num & 0b0011_1111_1111_1111;
        return Ok((masked as u32, &data[2..]));
    }

    if first_byte & 0b0010_0000 == 0 {
        let bytes = data
            .get(..4)
            .ok_or(ErrorKind::InvalidCompressedUnsigned)?;
        let num = u32::from_be_bytes(bytes.try_into().unwrap());
        let masked = num & 0b0001_1111_1111_1111_1111_1111_1111_1111;
        return Ok((masked, &data[4..]));
    }

    Err(ErrorKind::InvalidCompressedUnsigned.into())
}

/// Decodes a compressed signed number at the start of a byte slice,
/// returning the number and the rest of the slice in the success case.
///
/// The encoding rotates the two's-complement value left by one bit before
/// compressing, so decoding rotates right and sign-extends from the
/// width selected by the tag bits.
pub(crate) fn decode_signed(data: &[u8]) -> Result<(i32, &[u8]), Error> {
    let first_byte = *data.first().ok_or(ErrorKind::InvalidCompressedSigned)?;

    if first_byte & 0b1000_0000 == 0 {
        // transform `0b0abc_defg` to `0bggab_cdef`.
        let lsb = first_byte & 0b0000_0001;
        let mut rotated = first_byte >> 1;
        rotated |= lsb << 6;
        rotated |= lsb << 7;
        return Ok((rotated as i8 as i32, &data[1..]));
    }

    if first_byte & 0b0100_0000 == 0 {
        let bytes = data.get(..2).ok_or(ErrorKind::InvalidCompressedSigned)?;
        let mut num = u16::from_be_bytes(bytes.try_into().unwrap());
        num &= 0b0011_1111_1111_1111; // clear the tag bits
        let lsb = num & 0b0000_0001;
        let mut rotated = num >> 1;
        rotated |= lsb << 13;
        rotated |= lsb << 14;
        rotated |= lsb << 15;
        return Ok((rotated as i16 as i32, &data[2..]));
    }

    if first_byte & 0b0010_0000 == 0 {
        let bytes = data.get(..4).ok_or(ErrorKind::InvalidCompressedSigned)?;
        let mut num = u32::from_be_bytes(bytes.try_into().unwrap());
        num &= 0b0001_1111_1111_1111_1111_1111_1111_1111; // clear the tag bits
        let lsb = num & 0b0000_0001;
        let mut rotated = num >> 1;
        rotated |= lsb << 28;
        rotated |= lsb << 29;
        rotated |= lsb << 30;
        rotated |= lsb << 31;
        return Ok((rotated as i32, &data[4..]));
    }

    Err(ErrorKind::InvalidCompressedSigned.into())
}

/// Encodes a compressed unsigned number into the provided scratch buffer,
/// returning the encoded bytes.
///
/// Values up to 0x7F use one byte, up to 0x3FFF two bytes and up to
/// [`MAX_COMPRESSED_UNSIGNED`] four bytes; anything larger is not
/// representable.
pub(crate) fn encode_unsigned(value: u32, buf: &mut [u8; 4]) -> Result<&[u8], Error> {
    if value <= 0x7F {
        buf[0] = value as u8;
        Ok(&buf[..1])
    } else if value <= 0x3FFF {
        buf[..2].copy_from_slice(&(value as u16 | 0x8000).to_be_bytes());
        Ok(&buf[..2])
    } else if value <= MAX_COMPRESSED_UNSIGNED {
        buf.copy_from_slice(&(value | 0xC000_0000).to_be_bytes());
        Ok(&buf[..4])
    } else {
        Err(ErrorKind::UncompressibleValue(value).into())
    }
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
pub(crate) fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

macro_rules! le_reader {
    ($name:ident, $ty:ty) => {
        /// Reads a little-endian value from the front of the slice,
        /// advancing it past the consumed bytes.
        pub(crate) fn $name(data: &mut &[u8]) -> Result<$ty, Error> {
            const SIZE: usize = std::mem::size_of::<$ty>();
            let bytes = data.get(..SIZE).ok_or(ErrorKind::InvalidLength)?;
            let value = <$ty>::from_le_bytes(bytes.try_into().unwrap());
            *data = &data[SIZE..];
            Ok(value)
        }
    };
}

le_reader!(read_u8, u8);
le_reader!(read_u32, u32);
le_reader!(read_u64, u64);

/// Advances the slice by `count` bytes.
pub(crate) fn advance<'a>(data: &mut &'a [u8], count: usize) -> Result<&'a [u8], Error> {
    let skipped = data.get(..count).ok_or(ErrorKind::InvalidLength)?;
    *data = &data[count..];
    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::{align_up, decode_signed, decode_unsigned, encode_unsigned};

    #[test]
    fn test_decode_unsigned() {
        let cases = [
            (&[0x03][..], 0x03),
            (&[0x7F], 0x7F),
            (&[0x80, 0x80], 0x80),
            (&[0xAE, 0x57], 0x2E57),
            (&[0xAF, 0xFF], 0x2FFF),
            (&[0xBF, 0xFF], 0x3FFF),
            (&[0xC0, 0x00, 0x40, 0x00], 0x4000),
            (&[0xC0, 0x01, 0x00, 0x00], 0x10000),
            (&[0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (arg, res) in cases.iter() {
            assert_eq!(decode_unsigned(arg).unwrap().0, *res);
        }
    }

    #[test]
    fn test_decode_signed() {
        let cases = [
            (&[0x01][..], -64),
            (&[0x7E], 63),
            (&[0x7B], -3),
            (&[0x80, 0x80], 64),
            (&[0x80, 0x01], -8192),
            (&[0xC0, 0x00, 0x40, 0x00], 8192),
            (&[0xDF, 0xFF, 0xFF, 0xFE], 268435455),
            (&[0xC0, 0x00, 0x00, 0x01], -268435456),
        ];

        for (arg, res) in cases.iter() {
            assert_eq!(decode_signed(arg).unwrap().0, *res);
        }
    }

    #[test]
    fn test_encode_unsigned() {
        let cases: &[(u32, &[u8])] = &[
            (0x03, &[0x03]),
            (0x7F, &[0x7F]),
            (0x80, &[0x80, 0x80]),
            (0x2FFF, &[0xAF, 0xFF]),
            (0x3FFF, &[0xBF, 0xFF]),
            (0x4000, &[0xC0, 0x00, 0x40, 0x00]),
            (0x10000, &[0xC0, 0x01, 0x00, 0x00]),
            (0x1FFF_FFFF, &[0xDF, 0xFF, 0xFF, 0xFF]),
        ];

        for (value, expected) in cases.iter() {
            let mut buf = [0u8; 4];
            assert_eq!(encode_unsigned(*value, &mut buf).unwrap(), *expected);
        }

        let mut buf = [0u8; 4];
        assert!(encode_unsigned(0x2000_0000, &mut buf).is_err());
    }

    #[test]
    fn test_unsigned_round_trip() {
        // Exercise the length bucket boundaries in both directions.
        for value in [
            0u32, 1, 0x7E, 0x7F, 0x80, 0x3FFE, 0x3FFF, 0x4000, 0xFFFF, 0x10000, 0x1FFF_FFFE,
            0x1FFF_FFFF,
        ] {
            let mut buf = [0u8; 4];
            let encoded = encode_unsigned(value, &mut buf).unwrap();
            let expected_len = match value {
                v if v <= 0x7F => 1,
                v if v <= 0x3FFF => 2,
                _ => 4,
            };
            assert_eq!(encoded.len(), expected_len);
            let (decoded, rest) = decode_unsigned(encoded).unwrap();
            assert_eq!(decoded, value);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 4), 8);
    }
}
