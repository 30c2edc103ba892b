//! RFC 6587 TCP frame extraction: octet-counting and non-transparent
//! framing, auto-detected per frame on the first non-space byte.

/// Upper bound on the digit run at the start of an octet-counting frame,
/// to avoid unbounded buffering while waiting for a length prefix.
pub const MAX_LENGTH_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// The digit run introducing an octet-counted length exceeded
    /// [`MAX_LENGTH_DIGITS`].
    OverlongDigitRun,
    /// The octet-counted length, or the accumulated non-transparent line,
    /// exceeded the configured per-message size limit.
    MessageTooLarge,
}

/// One fully extracted frame and the number of input bytes it consumed.
pub struct Frame<'a> {
    pub message: &'a [u8],
    pub consumed: usize,
}

/// Attempts to extract exactly one frame from the front of `buf`.
///
/// Returns `Ok(None)` if `buf` doesn't yet contain a complete frame (the
/// caller should read more bytes and retry). Detection is per RFC 6587: if
/// the first byte is an ASCII digit, this is an octet-counted frame
/// (`MSG-LEN SP MESSAGE`); otherwise it is non-transparent framing,
/// terminated by `\n` with an optional leading `\r` tolerated and dropped.
pub fn extract_frame(buf: &[u8], max_message_size: usize) -> Result<Option<Frame<'_>>, FramingError> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0].is_ascii_digit() {
        extract_octet_counted(buf, max_message_size)
    } else {
        extract_non_transparent(buf, max_message_size)
    }
}

fn extract_octet_counted(buf: &[u8], max_message_size: usize) -> Result<Option<Frame<'_>>, FramingError> {
    let mut i = 0;
    while i < buf.len() && buf[i].is_ascii_digit() {
        i += 1;
        if i > MAX_LENGTH_DIGITS {
            return Err(FramingError::OverlongDigitRun);
        }
    }

    if i >= buf.len() {
        // Still accumulating digits; not necessarily an error yet unless
        // we've already exceeded the bound above.
        return Ok(None);
    }

    if buf[i] != b' ' {
        // No space after the digit run — not a well-formed octet-counted
        // frame. Treat the digit run itself as malformed.
        return Err(FramingError::OverlongDigitRun);
    }

    let len_str = std::str::from_utf8(&buf[..i]).map_err(|_| FramingError::OverlongDigitRun)?;
    let len: usize = len_str.parse().map_err(|_| FramingError::OverlongDigitRun)?;

    if len > max_message_size {
        return Err(FramingError::MessageTooLarge);
    }

    let body_start = i + 1;
    let body_end = body_start + len;
    if buf.len() < body_end {
        return Ok(None);
    }

    Ok(Some(Frame {
        message: &buf[body_start..body_end],
        consumed: body_end,
    }))
}

fn extract_non_transparent(buf: &[u8], max_message_size: usize) -> Result<Option<Frame<'_>>, FramingError> {
    match buf.iter().position(|&b| b == b'\n') {
        None => {
            if buf.len() > max_message_size {
                Err(FramingError::MessageTooLarge)
            } else {
                Ok(None)
            }
        }
        Some(pos) => {
            let mut end = pos;
            if end > 0 && buf[end - 1] == b'\r' {
                end -= 1;
            }
            if end > max_message_size {
                return Err(FramingError::MessageTooLarge);
            }
            Ok(Some(Frame {
                message: &buf[..end],
                consumed: pos + 1,
            }))
        }
    }
}
