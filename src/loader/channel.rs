//! Bounded response channel.
//!
//! A single-producer/single-consumer byte pipe whose capacity is fixed when
//! it is created. The producer writes the whole payload in one
//! all-or-nothing operation; the consumer reads it as a body stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel capacity {requested} exceeds limit {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("write of {len} bytes does not fit in remaining capacity {available}")]
    ShortWrite { len: usize, available: usize },

    #[error("channel consumer closed")]
    ConsumerClosed,
}

/// Create a channel holding exactly `capacity` bytes.
///
/// Fails if `capacity` is above `limit`, mirroring a pipe that cannot be
/// allocated at that size.
pub fn create(capacity: usize, limit: usize) -> Result<(ChannelProducer, ChannelConsumer), ChannelError> {
    if capacity > limit {
        return Err(ChannelError::CapacityExceeded {
            requested: capacity,
            limit,
        });
    }

    // One slot: the payload always arrives as a single chunk.
    let (tx, rx) = mpsc::channel(1);
    Ok((
        ChannelProducer {
            tx,
            capacity,
            written: 0,
        },
        ChannelConsumer { rx },
    ))
}

/// Write end of the response channel.
#[derive(Debug)]
pub struct ChannelProducer {
    tx: mpsc::Sender<Bytes>,
    capacity: usize,
    written: usize,
}

impl ChannelProducer {
    pub fn remaining(&self) -> usize {
        self.capacity - self.written
    }

    /// Write all of `data` or nothing.
    pub fn write_all_or_none(&mut self, data: Bytes) -> Result<usize, ChannelError> {
        let available = self.remaining();
        if data.len() > available {
            return Err(ChannelError::ShortWrite {
                len: data.len(),
                available,
            });
        }
        if data.is_empty() {
            return Ok(0);
        }

        let len = data.len();
        self.tx.try_send(data).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => ChannelError::ConsumerClosed,
            mpsc::error::TrySendError::Full(_) => ChannelError::ShortWrite { len, available: 0 },
        })?;
        self.written += len;
        Ok(len)
    }
}

/// Read end of the response channel, handed to the consumer.
#[derive(Debug)]
pub struct ChannelConsumer {
    rx: mpsc::Receiver<Bytes>,
}

impl Stream for ChannelConsumer {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}
