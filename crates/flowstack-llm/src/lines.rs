/// Incremental splitter for line-delimited streaming bodies.
///
/// Network chunks arrive at arbitrary boundaries; this buffers partial
/// lines across `feed` calls and hands back only complete ones. Blank
/// lines are dropped.
#[derive(Default)]
pub struct LineParser {
    buffer: String,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and extract the complete lines it closes.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer = self.buffer[pos + 1..].to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }

        lines
    }

    /// The trailing unterminated line at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buffer);
        let tail = tail.trim();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        }
    }
}
