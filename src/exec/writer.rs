// src/exec/writer.rs

//! Output plumbing for unit commands.
//!
//! Several units run concurrently, all ultimately writing to the same
//! destination (normally stdout). [`UnitWriter`] buffers one unit's output
//! and releases it in a single piece when the unit finishes, so output from
//! different units never interleaves mid-stream.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable handle over a shared byte sink.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Shared handle over the process stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedWriter(..)")
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().unwrap().flush()
    }
}

/// In-memory sink whose contents can be read back after a run. Used for the
/// JSON plan capture step and by tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().unwrap().clone()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Buffers a single unit's output until [`UnitWriter::flush_output`]
/// releases it to the underlying shared writer.
#[derive(Clone)]
pub struct UnitWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
    target: SharedWriter,
}

impl UnitWriter {
    pub fn new(target: SharedWriter) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            target,
        }
    }

    /// Write everything buffered so far to the underlying writer, in one
    /// piece, and clear the buffer.
    pub fn flush_output(&self) -> io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.is_empty() {
            return Ok(());
        }

        let mut target = self.target.clone();
        target.write_all(&buffer)?;
        target.flush()?;
        buffer.clear();
        Ok(())
    }
}

impl fmt::Debug for UnitWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnitWriter(..)")
    }
}

impl Write for UnitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
