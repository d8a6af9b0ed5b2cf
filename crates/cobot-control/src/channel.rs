//! Seqlock-style single-slot channel over a shared memory region.
//!
//! Layout: `[seq: u64][len: u32][payload: capacity bytes]`. The writer
//! bumps `seq` to odd before writing the payload and back to even after;
//! a reader retries whenever it observes an odd `seq`, or a `seq` that
//! changed between reading the length/payload and re-checking it
//! afterward. Single-writer/single-reader, as the hand-off channel and
//! `SharedFeedback` both are (`SPEC_FULL.md` §9's design note — the
//! teacher never needed a cross-process snapshot, so this pattern has no
//! direct teacher precedent beyond the shared memory region itself).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::shm::ShmRegion;

const SEQ_BYTES: usize = 8;
const LEN_BYTES: usize = 4;
const HEADER_BYTES: usize = SEQ_BYTES + LEN_BYTES;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("encoded payload of {0} bytes exceeds channel capacity {1}")]
    PayloadTooLarge(usize, usize),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// A fixed-capacity seqlock slot carrying bincode-encoded values of type
/// `T`.
pub struct SeqlockChannel<T> {
    region: ShmRegion,
    capacity: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> SeqlockChannel<T> {
    /// `capacity` bounds the encoded payload size; the region backing
    /// this channel is `HEADER_BYTES + capacity` bytes.
    pub fn open(name: &str, capacity: usize) -> Result<Self, ChannelError> {
        let region = ShmRegion::open(name, HEADER_BYTES + capacity)?;
        Ok(Self { region, capacity, _marker: std::marker::PhantomData })
    }

    fn seq(&self) -> &AtomicU64 {
        unsafe { &*(self.region.as_ptr() as *const AtomicU64) }
    }

    fn len_cell(&self) -> &AtomicU32 {
        unsafe { &*(self.region.as_ptr().add(SEQ_BYTES) as *const AtomicU32) }
    }

    fn payload(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.region.as_ptr().add(HEADER_BYTES), self.capacity) }
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.region.as_mut_ptr().add(HEADER_BYTES), self.capacity) }
    }

    /// Publishes a new value, overwriting whatever was there before.
    pub fn write(&mut self, value: &T) -> Result<(), ChannelError> {
        let encoded = bincode::serialize(value)?;
        if encoded.len() > self.capacity {
            return Err(ChannelError::PayloadTooLarge(encoded.len(), self.capacity));
        }

        self.seq().fetch_add(1, Ordering::AcqRel);
        self.len_cell().store(encoded.len() as u32, Ordering::Relaxed);
        self.payload_mut()[..encoded.len()].copy_from_slice(&encoded);
        self.seq().fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Reads the most recently published value, retrying until a
    /// consistent snapshot is observed. Returns `None` if nothing has
    /// ever been published (the slot is still all zero).
    pub fn read(&self) -> Result<Option<T>, ChannelError> {
        loop {
            let s1 = self.seq().load(Ordering::Acquire);
            if s1 % 2 != 0 {
                continue;
            }
            if s1 == 0 {
                return Ok(None);
            }
            let len = self.len_cell().load(Ordering::Relaxed) as usize;
            let mut buf = vec![0u8; len];
            buf.copy_from_slice(&self.payload()[..len]);
            let s2 = self.seq().load(Ordering::Acquire);
            if s1 != s2 {
                continue;
            }
            let value = bincode::deserialize(&buf)?;
            return Ok(Some(value));
        }
    }

    /// Current sequence number, for polling whether a new value has been
    /// published since the last observed sequence.
    pub fn sequence(&self) -> u64 {
        self.seq().load(Ordering::Acquire)
    }

    /// Reads the value only if the channel's sequence has advanced past
    /// `last_seen`, updating `last_seen` in that case.
    pub fn read_if_changed(&self, last_seen: &mut u64) -> Result<Option<T>, ChannelError> {
        let current = self.sequence();
        if current == *last_seen || current % 2 != 0 {
            return Ok(None);
        }
        let value = self.read()?;
        *last_seen = current;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: f64,
        b: Vec<f64>,
    }

    #[test]
    fn unwritten_channel_reads_as_none() {
        let name = format!("chan_test_unwritten_{}", std::process::id());
        let channel: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 256).unwrap();
        assert_eq!(channel.read().unwrap(), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let name = format!("chan_test_roundtrip_{}", std::process::id());
        let mut writer: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 256).unwrap();
        let reader: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 256).unwrap();

        let value = Sample { a: 1.5, b: vec![1.0, 2.0, 3.0] };
        writer.write(&value).unwrap();
        assert_eq!(reader.read().unwrap(), Some(value));
    }

    #[test]
    fn later_writes_overwrite_earlier_ones() {
        let name = format!("chan_test_overwrite_{}", std::process::id());
        let mut writer: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 256).unwrap();
        writer.write(&Sample { a: 1.0, b: vec![] }).unwrap();
        writer.write(&Sample { a: 2.0, b: vec![9.0] }).unwrap();
        assert_eq!(writer.read().unwrap(), Some(Sample { a: 2.0, b: vec![9.0] }));
    }

    #[test]
    fn read_if_changed_only_fires_once_per_write() {
        let name = format!("chan_test_changed_{}", std::process::id());
        let mut writer: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 256).unwrap();
        let mut last_seen = 0u64;
        assert_eq!(writer.read_if_changed(&mut last_seen).unwrap(), None);

        writer.write(&Sample { a: 1.0, b: vec![] }).unwrap();
        assert!(writer.read_if_changed(&mut last_seen).unwrap().is_some());
        assert_eq!(writer.read_if_changed(&mut last_seen).unwrap(), None);

        writer.write(&Sample { a: 2.0, b: vec![] }).unwrap();
        assert!(writer.read_if_changed(&mut last_seen).unwrap().is_some());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let name = format!("chan_test_oversized_{}", std::process::id());
        let mut writer: SeqlockChannel<Sample> = SeqlockChannel::open(&name, 8).unwrap();
        let err = writer.write(&Sample { a: 1.0, b: vec![1.0, 2.0, 3.0] }).unwrap_err();
        assert!(matches!(err, ChannelError::PayloadTooLarge(_, 8)));
    }
}
