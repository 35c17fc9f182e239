//! Point-to-point message passing between the processes owning subdomains.
//!
//! Messages are contiguous byte slices. A halo exchange step sends one slab
//! to one neighbor while receiving the matching slab from the opposite
//! neighbor, so backends only need a combined send-receive primitive.

#[cfg(feature = "mpi")]
mod mpi_backend;

use crate::error::{FieldError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use std::{
    collections::VecDeque,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

#[cfg(feature = "mpi")]
pub use mpi_backend::MpiComm;

/// Blocking combined send-receive interface.
pub trait Communicator {
    /// Returns the rank of the calling process.
    fn rank(&self) -> usize;

    /// Returns the number of processes.
    fn size(&self) -> usize;

    /// Sends a buffer to one process and receives a buffer of known
    /// length from another, both with the given tag.
    ///
    /// Either half may be omitted when there is no process to talk to.
    /// Returns once the receive buffer has been filled.
    fn send_receive(
        &self,
        send: Option<(usize, &[u8])>,
        receive: Option<(usize, &mut [u8])>,
        tag: u16,
    ) -> Result<()>;
}

type Key = (usize, usize, u16); // (source, destination, tag)

type Mailbox = DashMap<Key, VecDeque<Bytes>>;

fn deliver(mailbox: &Mailbox, key: Key, buf: &[u8]) {
    mailbox
        .entry(key)
        .or_default()
        .push_back(Bytes::copy_from_slice(buf));
}

fn take(mailbox: &Mailbox, key: &Key) -> Option<Bytes> {
    mailbox
        .get_mut(key)
        .and_then(|mut queue| queue.pop_front())
}

fn copy_received(bytes: &Bytes, buf: &mut [u8], source: usize, tag: u16) -> Result<()> {
    if bytes.len() != buf.len() {
        return Err(FieldError::Communication(format!(
            "message from rank {} with tag {} holds {} bytes, expected {}",
            source,
            tag,
            bytes.len(),
            buf.len()
        )));
    }
    buf.copy_from_slice(bytes);
    Ok(())
}

/// Communicator for a single process.
///
/// The only valid peer is rank 0 itself, which is what a periodic
/// undecomposed dimension exchanges with.
#[derive(Debug, Default)]
pub struct SerialComm {
    mailbox: Mailbox,
}

impl SerialComm {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_peer(peer: usize) -> Result<()> {
        if peer == 0 {
            Ok(())
        } else {
            Err(FieldError::Communication(format!(
                "serial communicator has no rank {}",
                peer
            )))
        }
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send_receive(
        &self,
        send: Option<(usize, &[u8])>,
        receive: Option<(usize, &mut [u8])>,
        tag: u16,
    ) -> Result<()> {
        if let Some((destination, buf)) = send {
            Self::check_peer(destination)?;
            deliver(&self.mailbox, (0, 0, tag), buf);
        }
        if let Some((source, buf)) = receive {
            Self::check_peer(source)?;
            let bytes = take(&self.mailbox, &(0, 0, tag)).ok_or_else(|| {
                FieldError::Communication(format!("no pending message with tag {}", tag))
            })?;
            copy_received(&bytes, buf, source, tag)?;
        }
        Ok(())
    }
}

/// Communicator for several ranks living on threads of one process.
///
/// All communicators of one universe share a mailbox. Sends never block;
/// receives spin until the message arrives or the timeout expires.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    timeout: Duration,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates one communicator for each of `size` ranks sharing a mailbox.
    pub fn universe(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                timeout: Self::DEFAULT_TIMEOUT,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Returns the communicator with the given receive timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer < self.size {
            Ok(())
        } else {
            Err(FieldError::Communication(format!(
                "rank {} out of range for {} ranks",
                peer, self.size
            )))
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_receive(
        &self,
        send: Option<(usize, &[u8])>,
        receive: Option<(usize, &mut [u8])>,
        tag: u16,
    ) -> Result<()> {
        if let Some((destination, buf)) = send {
            self.check_peer(destination)?;
            deliver(&self.mailbox, (self.rank, destination, tag), buf);
        }
        if let Some((source, buf)) = receive {
            self.check_peer(source)?;
            let key = (source, self.rank, tag);
            let start = Instant::now();
            let bytes = loop {
                if let Some(bytes) = take(&self.mailbox, &key) {
                    break bytes;
                }
                if start.elapsed() > self.timeout {
                    return Err(FieldError::Communication(format!(
                        "rank {} timed out waiting for rank {} with tag {}",
                        self.rank, source, tag
                    )));
                }
                thread::yield_now();
            };
            copy_received(&bytes, buf, source, tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn serial_self_exchange_roundtrip() {
        let comm = SerialComm::new();
        let mut recv = [0_u8; 4];
        comm.send_receive(Some((0, &[1_u8, 2, 3, 4][..])), Some((0, &mut recv[..])), 7)
            .unwrap();
        assert_eq!(recv, [1, 2, 3, 4]);
    }

    #[test]
    fn serial_rejects_other_ranks_and_missing_messages() {
        let comm = SerialComm::new();
        assert!(comm.send_receive(Some((1, &[0_u8][..])), None, 0).is_err());
        let mut recv = [0_u8; 1];
        assert!(comm.send_receive(None, Some((0, &mut recv[..])), 3).is_err());
    }

    #[test]
    fn local_two_rank_exchange() {
        let mut comms = LocalComm::universe(2);
        let comm1 = comms.pop().unwrap();
        let comm0 = comms.pop().unwrap();

        let handle = thread::spawn(move || {
            let mut recv = [0_u8; 3];
            comm1
                .send_receive(Some((0, &[9_u8, 8, 7][..])), Some((0, &mut recv[..])), 5)
                .unwrap();
            recv
        });

        let mut recv = [0_u8; 3];
        comm0
            .send_receive(Some((1, &[1_u8, 2, 3][..])), Some((1, &mut recv[..])), 5)
            .unwrap();

        assert_eq!(recv, [9, 8, 7]);
        assert_eq!(handle.join().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn local_length_mismatch_is_reported() {
        let comms = LocalComm::universe(1);
        let mut recv = [0_u8; 2];
        let result = comms[0].send_receive(Some((0, &[1_u8, 2, 3][..])), Some((0, &mut recv[..])), 1);
        assert!(matches!(result, Err(FieldError::Communication(_))));
    }

    #[test]
    fn local_receive_times_out() {
        let comm = LocalComm::universe(2)
            .remove(0)
            .with_timeout(Duration::from_millis(10));
        let mut recv = [0_u8; 1];
        assert!(comm.send_receive(None, Some((1, &mut recv[..])), 2).is_err());
    }
}
