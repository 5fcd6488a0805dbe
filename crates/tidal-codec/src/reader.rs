use crate::error::CodecError;
use crate::writer::Major;

/// Additional-information value announcing an indefinite length.
pub const INDEFINITE: u8 = 31;

/// Cursor over an immutable byte slice.
///
/// Every read advances the cursor and fails with [`CodecError::Range`] when
/// fewer bytes remain than requested.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, amount: usize) -> Result<&'a [u8], CodecError> {
        let available = self.remaining();
        if amount > available {
            return Err(CodecError::Range {
                needed: amount,
                available,
            });
        }
        let start = self.pos;
        self.pos += amount;
        Ok(&self.bytes[start..self.pos])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn peek_u8(&self) -> Result<u8, CodecError> {
        self.bytes.get(self.pos).copied().ok_or(CodecError::Range {
            needed: 1,
            available: 0,
        })
    }

    pub fn skip(&mut self, amount: usize) -> Result<(), CodecError> {
        self.take(amount).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        self.take_array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.take_array().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        self.take_array().map(u64::from_be_bytes)
    }

    /// Reads an IEEE 754 half-precision float, widened to `f64`.
    pub fn read_f16(&mut self) -> Result<f64, CodecError> {
        Ok(f16_to_f64(self.read_u16()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        self.take_array().map(f32::from_be_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        self.take_array().map(f64::from_be_bytes)
    }

    pub fn read_bytes(&mut self, amount: usize) -> Result<&'a [u8], CodecError> {
        self.take(amount)
    }

    /// Reads an initial byte, returning its major type and additional information.
    pub fn read_major(&mut self) -> Result<(Major, u8), CodecError> {
        let byte = self.read_u8()?;
        Ok((Major::from_initial(byte), byte & 0x1f))
    }

    /// Resolves the argument announced by `info`.
    ///
    /// Callers must handle [`INDEFINITE`] before calling this.
    pub fn read_major_length(&mut self, info: u8) -> Result<u64, CodecError> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => self.read_u8().map(u64::from),
            25 => self.read_u16().map(u64::from),
            26 => self.read_u32().map(u64::from),
            27 => self.read_u64(),
            other => Err(CodecError::InvalidLength(other)),
        }
    }
}

fn f16_to_f64(half: u16) -> f64 {
    let sign = if half & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((half & 0x7c00) >> 10);
    let frac = f64::from(half & 0x03ff);

    match exp {
        0 => sign * (frac / 1024.0) * 2f64.powi(-14),
        0x1f if frac != 0.0 => f64::NAN,
        0x1f => sign * f64::INFINITY,
        _ => sign * (1.0 + frac / 1024.0) * 2f64.powi(exp - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::{Reader, INDEFINITE};
    use crate::error::CodecError;
    use crate::writer::Major;

    #[test]
    fn reads_advance_cursor() {
        let data = [0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x04];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8().expect("u8"), 1);
        assert_eq!(r.read_u16().expect("u16"), 0x0203);
        assert_eq!(r.read_u32().expect("u32"), 4);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.position(), 7);
    }

    #[test]
    fn exhausted_reader_reports_range_error() {
        let mut r = Reader::new(&[0x01]);
        let err = r.read_u32().expect_err("not enough bytes");
        assert_eq!(
            err,
            CodecError::Range {
                needed: 4,
                available: 1
            }
        );
        assert!(r.peek_u8().is_ok(), "failed read must not advance");
    }

    #[test]
    fn major_length_handles_every_width() {
        let data = [0x18, 0xff, 0x19, 0x01, 0x00, 0x1b, 0, 0, 0, 1, 0, 0, 0, 0];
        let mut r = Reader::new(&data);
        for expected in [255_u64, 256, 1 << 32] {
            let (major, info) = r.read_major().expect("major");
            assert_eq!(major, Major::Unsigned);
            assert_eq!(r.read_major_length(info).expect("length"), expected);
        }
    }

    #[test]
    fn reserved_length_info_is_rejected() {
        let mut r = Reader::new(&[]);
        assert_eq!(r.read_major_length(28), Err(CodecError::InvalidLength(28)));
        assert_eq!(
            r.read_major_length(INDEFINITE),
            Err(CodecError::InvalidLength(INDEFINITE))
        );
    }

    #[test]
    fn half_floats_widen_exactly() {
        let cases: [(u16, f64); 5] = [
            (0x3c00, 1.0),
            (0xc000, -2.0),
            (0x7bff, 65_504.0),
            (0x0001, 5.960_464_477_539_063e-8),
            (0x7c00, f64::INFINITY),
        ];
        for (bits, expected) in cases {
            let bytes = bits.to_be_bytes();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.read_f16().expect("f16"), expected, "bits {bits:#06x}");
        }
        let nan = 0x7e00_u16.to_be_bytes();
        assert!(Reader::new(&nan).read_f16().expect("f16").is_nan());
    }
}
