use std::collections::VecDeque;
use std::io;

/// The two datagram queues OpenSSL reads from and writes to.
///
/// Each `read` hands out exactly one datagram and each `write` is exactly
/// one datagram, which is what a DTLS engine expects from its transport.
#[derive(Debug, Default)]
pub(crate) struct IoBuffer {
    incoming: VecDeque<Vec<u8>>,
    outgoing: VecDeque<Vec<u8>>,
}

impl IoBuffer {
    pub fn push_incoming(&mut self, datagram: &[u8]) {
        self.incoming.push_back(datagram.to_vec());
    }

    pub fn pop_outgoing(&mut self) -> Option<Vec<u8>> {
        self.outgoing.pop_front()
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }
}

impl io::Read for IoBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(datagram) = self.incoming.pop_front() else {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "WouldBlock"));
        };

        let n = datagram.len().min(buf.len());
        if n < datagram.len() {
            warn!(
                "Incoming datagram truncated from {} to {} bytes",
                datagram.len(),
                n
            );
        }
        buf[..n].copy_from_slice(&datagram[..n]);

        Ok(n)
    }
}

impl io::Write for IoBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
