// SPDX-License-Identifier: MPL-2.0

//! Framed reads and writes over a split transport. Writers hand complete
//! encoded packets to [`FrameWriter::write_frame`]; because every frame goes
//! out in one guarded `write_all`, concurrent operations never interleave
//! bytes on the wire.

use std::io::ErrorKind;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{timeout, Instant};

use crate::client::error::ClientError;
use crate::client::transport::BoxedTransport;
use crate::codec::MAX_REMAINING_LENGTH;

/// Timestamp of the most recent successful read on a link. Only inbound
/// traffic counts; if our own pings fed this clock a silent broker would
/// never be detected. The keepalive supervisor watches it to declare the
/// link dead.
#[derive(Debug)]
pub(crate) struct Activity {
    last: StdMutex<Instant>,
}

impl Activity {
    pub(crate) fn new() -> Self {
        Self {
            last: StdMutex::new(Instant::now()),
        }
    }

    pub(crate) fn touch(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Instant::now();
        }
    }

    pub(crate) fn idle_for(&self) -> Duration {
        match self.last.lock() {
            Ok(last) => last.elapsed(),
            Err(_) => Duration::ZERO,
        }
    }
}

fn map_read_error(err: std::io::Error) -> ClientError {
    if err.kind() == ErrorKind::UnexpectedEof {
        ClientError::ConnectionClosed
    } else {
        ClientError::Transport(err.into())
    }
}

pub(crate) struct FrameReader {
    inner: ReadHalf<BoxedTransport>,
    response_timeout: Duration,
    activity: std::sync::Arc<Activity>,
}

impl FrameReader {
    pub(crate) fn new(
        inner: ReadHalf<BoxedTransport>,
        response_timeout: Duration,
        activity: std::sync::Arc<Activity>,
    ) -> Self {
        Self {
            inner,
            response_timeout,
            activity,
        }
    }

    async fn read_exact_timed(&mut self, buf: &mut [u8]) -> Result<(), ClientError> {
        match timeout(self.response_timeout, self.inner.read_exact(buf)).await {
            Err(_) => Err(ClientError::Timeout {
                operation: "frame body",
                timeout: self.response_timeout,
            }),
            Ok(Err(err)) => Err(map_read_error(err)),
            Ok(Ok(_)) => {
                self.activity.touch();
                Ok(())
            }
        }
    }

    /// Reads one complete frame. The wait for the first header byte is
    /// untimed (an idle link is legal; the keepalive supervisor owns dead
    /// link detection), but once a frame has started the rest must arrive
    /// within the response timeout.
    pub(crate) async fn read_frame(&mut self) -> Result<BytesMut, ClientError> {
        let mut first = [0u8; 1];
        self.inner
            .read_exact(&mut first)
            .await
            .map_err(map_read_error)?;
        self.activity.touch();

        let mut frame = BytesMut::with_capacity(8);
        frame.extend_from_slice(&first);

        // Remaining length, one byte at a time, at most four bytes.
        let mut remaining = 0usize;
        let mut shift = 0u32;
        for i in 0.. {
            let mut byte = [0u8; 1];
            self.read_exact_timed(&mut byte).await?;
            frame.extend_from_slice(&byte);
            remaining |= usize::from(byte[0] & 0x7F) << shift;
            if byte[0] & 0x80 == 0 {
                break;
            }
            if i == 3 {
                return Err(ClientError::protocol(
                    "remaining length continues past four bytes",
                ));
            }
            shift += 7;
        }
        if remaining > MAX_REMAINING_LENGTH {
            return Err(ClientError::protocol("remaining length out of range"));
        }

        let header_len = frame.len();
        frame.resize(header_len + remaining, 0);
        if remaining > 0 {
            self.read_exact_timed(&mut frame[header_len..]).await?;
        }
        Ok(frame)
    }
}

pub(crate) struct FrameWriter {
    inner: WriteHalf<BoxedTransport>,
    response_timeout: Duration,
}

impl FrameWriter {
    pub(crate) fn new(inner: WriteHalf<BoxedTransport>, response_timeout: Duration) -> Self {
        Self {
            inner,
            response_timeout,
        }
    }

    /// Writes one complete encoded frame and flushes it.
    pub(crate) async fn write_frame(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let write = async {
            self.inner.write_all(frame).await?;
            self.inner.flush().await
        };
        match timeout(self.response_timeout, write).await {
            Err(_) => Err(ClientError::Timeout {
                operation: "frame write",
                timeout: self.response_timeout,
            }),
            Ok(Err(err)) => Err(ClientError::Transport(err.into())),
            Ok(Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::duplex;

    fn reader_for(stream: tokio::io::DuplexStream) -> FrameReader {
        let boxed: BoxedTransport = Box::new(stream);
        let (read, _write) = tokio::io::split(boxed);
        FrameReader::new(read, Duration::from_millis(200), Arc::new(Activity::new()))
    }

    #[tokio::test]
    async fn reads_frame_split_across_writes() {
        let (client, mut server) = duplex(64);
        let mut reader = reader_for(client);
        server.write_all(&[0x40, 0x02]).await.unwrap();
        let read = tokio::spawn(async move { reader.read_frame().await });
        tokio::task::yield_now().await;
        server.write_all(&[0x00, 0x07]).await.unwrap();
        let frame = read.await.unwrap().unwrap();
        assert_eq!(&frame[..], &[0x40, 0x02, 0x00, 0x07]);
    }

    #[tokio::test]
    async fn closed_stream_is_connection_closed() {
        let (client, server) = duplex(64);
        drop(server);
        let mut reader = reader_for(client);
        assert!(matches!(
            reader.read_frame().await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn stalled_frame_body_times_out() {
        let (client, mut server) = duplex(64);
        let mut reader = reader_for(client);
        // Header promises two bytes that never arrive.
        server.write_all(&[0x40, 0x02]).await.unwrap();
        assert!(matches!(
            reader.read_frame().await,
            Err(ClientError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn overlong_remaining_length_is_protocol_error() {
        let (client, mut server) = duplex(64);
        let mut reader = reader_for(client);
        server
            .write_all(&[0x30, 0x80, 0x80, 0x80, 0x80, 0x01])
            .await
            .unwrap();
        assert!(matches!(
            reader.read_frame().await,
            Err(ClientError::Protocol { .. })
        ));
    }
}
