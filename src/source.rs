use arrayvec::ArrayVec;
use std::io;

use crate::err::SourceError;

/// Longest line kept, in bytes. NMEA allows 82 characters; some receivers
/// send longer proprietary sentences.
pub const LINE_CAPACITY: usize = 256;

/// Frames a byte stream into `\n` terminated lines.
///
/// Every call to `next` blocks until a full line (or EOF) is read. The
/// terminating `\n` is not part of the yielded line. A line that does not fit
/// into `LINE_CAPACITY` is skipped up to its newline and reported as
/// `SourceError::LineTooLong`.
pub struct LineSource<R> {
    input: io::Bytes<R>,
    buf: ArrayVec<[u8; LINE_CAPACITY]>,
    overflowed: bool,
}

impl<R: io::Read> LineSource<R> {
    pub fn new(input: R) -> Self {
        LineSource {
            input: input.bytes(),
            buf: ArrayVec::new(),
            overflowed: false,
        }
    }

    /// Same as `next`, named after what the ingestion loop asks for.
    #[inline]
    pub fn next_line(&mut self) -> Option<Result<Vec<u8>, SourceError>> {
        self.next()
    }

    fn take_line(&mut self) -> Result<Vec<u8>, SourceError> {
        let line = self.buf.to_vec();
        self.buf.clear();
        if self.overflowed {
            self.overflowed = false;
            return Err(SourceError::LineTooLong(LINE_CAPACITY));
        }
        Ok(line)
    }
}

impl<R: io::Read> Iterator for LineSource<R> {
    type Item = Result<Vec<u8>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match try_some!(self.input.next().transpose()) {
                None if self.buf.is_empty() && !self.overflowed => return None,
                None => return Some(self.take_line()),
                Some(b'\n') => return Some(self.take_line()),
                Some(_) if self.overflowed => (),
                Some(c) => {
                    if self.buf.try_push(c).is_err() {
                        self.overflowed = true;
                    }
                }
            }
        }
    }
}
