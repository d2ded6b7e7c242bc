//! Splitting a byte stream on an arbitrary token.

use std::io::{self, BufRead};

/// Iterator over the `token`-separated pieces of a buffered reader
///
/// Pieces are yielded without their terminator. A terminator at the very end
/// of the input does not produce a trailing empty piece, matching
/// [`BufRead::lines`].
pub(crate) struct TokenReader<R> {
    reader: R,
    token: Vec<u8>,
    done: bool,
}

impl<R: BufRead> TokenReader<R> {
    /// Split `reader` on `token`; an empty token falls back to `\n`
    pub(crate) fn new(reader: R, token: &[u8]) -> Self {
        let token = if token.is_empty() {
            b"\n".to_vec()
        } else {
            token.to_vec()
        };
        Self {
            reader,
            token,
            done: false,
        }
    }

    fn next_piece(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let last = self.token[self.token.len() - 1];
        let mut buf = Vec::new();
        loop {
            let read = self.reader.read_until(last, &mut buf)?;
            if read == 0 || buf.last() != Some(&last) {
                // End of input, possibly mid-piece
                self.done = true;
                return Ok((!buf.is_empty()).then_some(buf));
            }
            if buf.ends_with(&self.token) {
                buf.truncate(buf.len() - self.token.len());
                return Ok(Some(buf));
            }
            // Matched the token's last byte but not the whole token
        }
    }
}

impl<R: BufRead> Iterator for TokenReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_piece() {
            Ok(Some(piece)) => Some(Ok(piece)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
