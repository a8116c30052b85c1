//! Transport layer for client-connection I/O
//!
//! The dispatcher and the texture sync codec work against this trait rather
//! than `TcpStream` directly, so the protocol paths can be exercised with an
//! in-memory mock.

use crate::error::Result;
use std::io::{Read, Write};
use std::net::TcpStream;

/// Transport trait for one client connection
pub trait Transport: Read + Write + Send {
    /// Number of bytes that can be read without blocking.
    ///
    /// May under-report; callers only gate on small thresholds (the texture
    /// handle poll waits for four bytes).
    fn available(&mut self) -> Result<usize>;
}

impl Transport for TcpStream {
    fn available(&mut self) -> Result<usize> {
        // Probe with a non-blocking peek. Four bytes is the largest
        // threshold any caller checks against.
        self.set_nonblocking(true)?;
        let mut probe = [0u8; 4];
        let peeked = self.peek(&mut probe);
        self.set_nonblocking(false)?;
        match peeked {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use crate::error::Result;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    /// In-memory transport with a scriptable availability schedule.
    ///
    /// `starve_polls` availability checks report zero bytes before the
    /// queued input becomes visible, which is how the texture-handle retry
    /// loop is tested without a peer.
    pub struct MockTransport {
        input: VecDeque<u8>,
        pub output: Vec<u8>,
        starve_polls: usize,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                input: VecDeque::new(),
                output: Vec::new(),
                starve_polls: 0,
            }
        }

        pub fn with_input(bytes: &[u8]) -> Self {
            let mut t = Self::new();
            t.input.extend(bytes);
            t
        }

        pub fn starve_for(mut self, polls: usize) -> Self {
            self.starve_polls = polls;
            self
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.input.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.input.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn available(&mut self) -> Result<usize> {
            if self.starve_polls > 0 {
                self.starve_polls -= 1;
                return Ok(0);
            }
            Ok(self.input.len())
        }
    }
}
