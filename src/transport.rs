use std::io;

/// The outbound half of a device connection.
///
/// Writing is a non-blocking hand-off to the transport; the decoder never
/// reads. Connectionless or already-closed transports simply provide no
/// channel, in which case acknowledgments are skipped.
pub trait ReplyChannel {
    /// Write all bytes of a reply frame.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// A reply channel that collects written bytes in memory.
#[derive(Debug, Default)]
pub struct BufferChannel {
    written: Vec<u8>,
}

impl BufferChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl ReplyChannel for BufferChannel {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(buf);
        Ok(())
    }
}
