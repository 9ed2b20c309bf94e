//! UBX framing: synchronization, checksum verification and outbound framing.
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::time::Instant;

use log::trace;

use crate::error::{Error, Result};

pub const SYNC_CHAR_1: u8 = 0xb5;
pub const SYNC_CHAR_2: u8 = 0x62;

/// id (2) + length (2)
const HEADER_LEN: usize = 4;
const CHECKSUM_LEN: usize = 2;

/// 8-bit Fletcher checksum used by UBX, over id‖length‖payload.
pub fn checksum<'a, I: IntoIterator<Item = &'a u8>>(data: I) -> (u8, u8) {
    data.into_iter().fold((0u8, 0u8), |(a, b), byte| {
        let a = a.wrapping_add(*byte);
        (a, b.wrapping_add(a))
    })
}

/// Frames `payload` as message `id`, ready to be written to the receiver.
/// Payloads must fit the 16 bit length field.
pub fn encode_frame(id: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u16::try_from(payload.len()).map_err(|_| Error::Oversized {
        size: payload.len(),
        max: u16::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(2 + HEADER_LEN + payload.len() + CHECKSUM_LEN);
    frame.extend_from_slice(&[SYNC_CHAR_1, SYNC_CHAR_2]);
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(payload);

    let (ck_a, ck_b) = checksum(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    Ok(frame)
}

/// One verified UBX frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: u16,
    pub payload: Vec<u8>,
}

/// [FrameReader] pulls verified frames out of a byte stream.
///
/// Bytes consumed while evaluating a frame candidate that fails its checksum
/// are pushed back, and scanning resumes one byte past the rejected sync
/// marker. A marker that appears by coincidence inside payload data can
/// therefore never swallow the genuine frames that follow it.
pub struct FrameReader<R: Read> {
    reader: R,
    /// Pushed back bytes, consumed before the reader
    cache: VecDeque<u8>,
    /// Number of rejected frame candidates
    rejected: usize,
    /// Reads give up past this instant
    deadline: Option<Instant>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            cache: VecDeque::new(),
            rejected: 0,
            deadline: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Number of frame candidates rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Blocks until the next valid frame.
    ///
    /// ## Returns
    /// - Ok(Some(frame)) for each frame that passed its checksum
    /// - Ok(None) once the underlying stream is exhausted
    /// - Err(e) on I/O error
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.deadline = None;
        self.next_frame()
    }

    /// Same as [Self::read_frame], but gives up at `deadline` with an
    /// [ErrorKind::TimedOut] I/O error, whether the stream is silent or
    /// carries anything but UBX frames.
    pub fn read_frame_until(&mut self, deadline: Instant) -> Result<Option<Frame>> {
        self.deadline = Some(deadline);
        let frame = self.next_frame();
        self.deadline = None;
        frame
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if !self.synchronize()? {
                return Ok(None);
            }

            let Some(header) = self.take(HEADER_LEN)? else {
                return Ok(None);
            };

            let id = u16::from_le_bytes([header[0], header[1]]);
            let length = u16::from_le_bytes([header[2], header[3]]) as usize;

            let Some(body) = self.take(length + CHECKSUM_LEN)? else {
                return Ok(None);
            };

            let (payload, ck) = body.split_at(length);

            if checksum(header.iter().chain(payload)) == (ck[0], ck[1]) {
                return Ok(Some(Frame {
                    id,
                    payload: payload.to_vec(),
                }));
            }

            self.rejected += 1;
            trace!(
                "checksum mismatch for 0x{:04X} ({} bytes), resynchronizing",
                id,
                length
            );

            // resume right after the first sync byte
            let mut consumed = Vec::with_capacity(1 + header.len() + body.len());
            consumed.push(SYNC_CHAR_2);
            consumed.extend_from_slice(&header);
            consumed.extend_from_slice(&body);
            self.push_back(&consumed);
        }
    }

    /// Consumes bytes until the sync marker has been read.
    /// Returns false when the stream ended first.
    fn synchronize(&mut self) -> Result<bool> {
        let mut last = match self.next_byte()? {
            Some(byte) => byte,
            None => return Ok(false),
        };

        loop {
            let Some(current) = self.next_byte()? else {
                return Ok(false);
            };

            if last == SYNC_CHAR_1 && current == SYNC_CHAR_2 {
                return Ok(true);
            }

            last = current;
        }
    }

    fn take(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        let mut bytes = Vec::with_capacity(size);
        while bytes.len() < size {
            match self.next_byte()? {
                Some(byte) => bytes.push(byte),
                None => return Ok(None),
            }
        }
        Ok(Some(bytes))
    }

    /// Reads one byte, cache first. Read timeouts are not errors here,
    /// the receiver is simply quiet.
    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.cache.pop_front() {
            return Ok(Some(byte));
        }

        let mut buf = [0u8; 1];
        loop {
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(io::Error::from(ErrorKind::TimedOut).into());
            }

            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) => match e.kind() {
                    ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {},
                    _ => return Err(e.into()),
                },
            }
        }
    }

    /// Puts `bytes` in front of the cache, preserving their order.
    fn push_back(&mut self, bytes: &[u8]) {
        for byte in bytes.iter().rev() {
            self.cache.push_front(*byte);
        }
    }
}
