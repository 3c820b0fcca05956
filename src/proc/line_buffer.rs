// src/proc/line_buffer.rs

//! Line buffering for streamed child output.

/// Platform line-ending sequence used to split child output into lines.
pub const EOL: &[u8] = if cfg!(windows) { b"\r\n" } else { b"\n" };

/// Accumulates raw output bytes and yields complete lines.
///
/// Bytes between line endings are buffered across reads; [`LineBuffer::flush`]
/// hands back the remainder when the stream ends.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every complete line they finish.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = find_eol(&self.buf) {
            let rest = self.buf.split_off(pos + EOL.len());
            self.buf.truncate(pos);
            lines.push(String::from_utf8_lossy(&self.buf).into_owned());
            self.buf = rest;
        }
        lines
    }

    /// Flush any buffered partial line at end of stream.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}

fn find_eol(buf: &[u8]) -> Option<usize> {
    buf.windows(EOL.len()).position(|w| w == EOL)
}
