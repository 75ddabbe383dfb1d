use crate::error::{ClassFileError, Result};

/// Big-endian cursor over class bytes.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len().saturating_sub(self.pos);
        if len > remaining {
            return Err(ClassFileError::UnexpectedEof {
                offset: self.pos,
                wanted: len - remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u2(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u4(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u8(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }
}

/// Decodes the "modified UTF-8" encoding used by class file string constants.
///
/// Differs from standard UTF-8 in that NUL is written as `C0 80` and
/// supplementary characters are written as two 3-byte surrogate halves.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return None;
            }
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1)?;
            if b1 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b0 & 0x1F) as u16) << 6) | (b1 & 0x3F) as u16);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1)?;
            let b2 = *bytes.get(i + 2)?;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push(
                (((b0 & 0x0F) as u16) << 12) | (((b1 & 0x3F) as u16) << 6) | (b2 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_values() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x07];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u4().unwrap(), 0xCAFEBABE);
        assert_eq!(r.u2().unwrap(), 0x34);
        assert_eq!(r.u1().unwrap(), 7);
        assert_eq!(r.position(), 7);
    }

    #[test]
    fn test_eof_reports_offset() {
        let data = [0x00, 0x01, 0x02];
        let mut r = ByteReader::new(&data);
        r.u2().unwrap();
        let err = r.u4().unwrap_err();
        assert_eq!(
            err,
            ClassFileError::UnexpectedEof {
                offset: 2,
                wanted: 3
            }
        );
    }

    #[test]
    fn test_modified_utf8_nul_and_supplementary() {
        assert_eq!(decode_modified_utf8(b"abc").as_deref(), Some("abc"));
        assert_eq!(decode_modified_utf8(&[0xC0, 0x80]).as_deref(), Some("\0"));
        // U+1F600 as a surrogate pair, each half 3-byte encoded
        let smile = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&smile).as_deref(), Some("\u{1F600}"));
        assert!(decode_modified_utf8(&[0x00]).is_none());
        assert!(decode_modified_utf8(&[0xE0, 0x80]).is_none());
    }
}
