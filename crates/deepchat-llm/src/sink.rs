use std::io::{self, Write};

/// Receives streamed fragments as they arrive.
pub trait FragmentSink: Send {
    /// Called once per fragment, with the answer accumulated so far (fragment included).
    fn on_fragment(&mut self, fragment: &str, accumulated: &str);

    /// Called once after the stream ended successfully.
    fn on_finish(&mut self, _accumulated: &str) {}

    /// Called when the call failed. Fragments already delivered stay delivered.
    fn on_abort(&mut self) {}
}

impl<F> FragmentSink for F
where
    F: FnMut(&str, &str) + Send,
{
    fn on_fragment(&mut self, fragment: &str, accumulated: &str) {
        self(fragment, accumulated)
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FragmentSink for NullSink {
    fn on_fragment(&mut self, _fragment: &str, _accumulated: &str) {}
}

/// Writes fragments to a writer, flushing after each one.
///
/// An optional prefix is written before the answer and a newline after it.
pub struct WriterSink<W: Write + Send> {
    writer: W,
    prefix: Option<String>,
    started: bool,
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            prefix: None,
            started: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn start(&mut self) -> io::Result<()> {
        if !self.started {
            self.started = true;
            if let Some(prefix) = &self.prefix {
                self.writer.write_all(prefix.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_fragment(&mut self, fragment: &str) -> io::Result<()> {
        self.start()?;
        self.writer.write_all(fragment.as_bytes())?;
        self.writer.flush()
    }

    fn write_end(&mut self) -> io::Result<()> {
        self.start()?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.started = false;
        Ok(())
    }
}

impl<W: Write + Send> FragmentSink for WriterSink<W> {
    fn on_fragment(&mut self, fragment: &str, _accumulated: &str) {
        if let Err(e) = self.write_fragment(fragment) {
            tracing::warn!("Failed to write stream fragment: {}", e);
        }
    }

    fn on_finish(&mut self, _accumulated: &str) {
        if let Err(e) = self.write_end() {
            tracing::warn!("Failed to finish stream output: {}", e);
        }
    }

    // Nothing is written, the next answer starts with its own prefix
    fn on_abort(&mut self) {
        self.started = false;
    }
}
