//! Bounded formatted writes.
//!
//! Payloads are rendered into a fixed-capacity buffer. A write that would
//! overflow is refused and reported as [`Truncated`], leaving the decision to
//! log, drop or retry with the caller.

use std::fmt;

/// A formatted write did not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    /// Bytes the complete output would have needed
    pub needed: usize,
    /// Capacity of the buffer
    pub capacity: usize,
}

impl fmt::Display for Truncated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buffer truncation: needed {} bytes, have {}",
            self.needed, self.capacity
        )
    }
}

impl std::error::Error for Truncated {}

/// Fixed-capacity text buffer.
#[derive(Clone)]
pub struct BoundedBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Default for BoundedBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for BoundedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundedBuf").field(&self.as_str()).finish()
    }
}

impl<const N: usize> BoundedBuf<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only whole `&str` values are ever copied in.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the contents with `args`.
    ///
    /// On overflow the buffer is left empty and the full required length
    /// is reported.
    pub fn format(&mut self, args: fmt::Arguments<'_>) -> Result<&str, Truncated> {
        self.clear();
        let mut writer = Writer {
            inner: &mut *self,
            needed: 0,
        };
        if fmt::write(&mut writer, args).is_err() || writer.needed > N {
            let needed = writer.needed;
            self.clear();
            return Err(Truncated {
                needed,
                capacity: N,
            });
        }
        Ok(self.as_str())
    }
}

struct Writer<'a, const N: usize> {
    inner: &'a mut BoundedBuf<N>,
    needed: usize,
}

impl<const N: usize> fmt::Write for Writer<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.needed += s.len();
        if self.needed > N {
            // Keep counting so the caller learns the full size.
            return Ok(());
        }
        let start = self.inner.len;
        self.inner.buf[start..start + s.len()].copy_from_slice(s.as_bytes());
        self.inner.len += s.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fits() {
        let mut buf = BoundedBuf::<16>::new();
        assert_eq!(buf.format(format_args!("{:.2}", 53.6f32)), Ok("53.60"));
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_format_exact_capacity() {
        let mut buf = BoundedBuf::<4>::new();
        assert_eq!(buf.format(format_args!("{:04X}", 0xFD35)), Ok("FD35"));
    }

    #[test]
    fn test_format_truncation_reported() {
        let mut buf = BoundedBuf::<4>::new();
        let err = buf
            .format(format_args!("{}-{}", "abc", "defg"))
            .unwrap_err();
        assert_eq!(
            err,
            Truncated {
                needed: 8,
                capacity: 4
            }
        );
        assert!(buf.is_empty());
        assert_eq!(err.to_string(), "buffer truncation: needed 8 bytes, have 4");
    }

    #[test]
    fn test_format_replaces_previous_contents() {
        let mut buf = BoundedBuf::<8>::new();
        buf.format(format_args!("first")).unwrap();
        assert_eq!(buf.format(format_args!("2nd")), Ok("2nd"));
    }
}
