// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire format for trajectory streaming.
//!
//! Every record is a little-endian frame whose `length` prefix counts the
//! bytes that follow it:
//!
//! ```text
//! TrajectoryPoint:
//! +------------+--------------+----------------+--------------+--------------+-------------------+
//! | length u32 | msg_type u32 | comm_class u32 | sequence i32 | velocity f64 | positions f64 * N |
//! +------------+--------------+----------------+--------------+--------------+-------------------+
//!
//! Reply (length = 56):
//! +------------+--------------+----------------+------------+--------------+------------------+
//! | length u32 | msg_type u32 | comm_class u32 | result i32 | sequence i32 | 10 words, zeroed |
//! +------------+--------------+----------------+------------+--------------+------------------+
//! ```
//!
//! A negative `sequence` is a command code rather than a point; only
//! [`SEQ_STOP`] is understood.
//!
//! All parsing is safe: malformed input returns Err, never panics.

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Size of the `length` prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Point body bytes before the position block (msg_type, comm_class, sequence, velocity).
pub const POINT_HEADER_SIZE: usize = 20;

/// Bytes per encoded joint position.
pub const POSITION_SIZE: usize = 8;

/// Declared length of every reply.
pub const REPLY_LENGTH: u32 = 56;

/// Unused payload words trailing a reply.
pub const REPLY_PAYLOAD_WORDS: usize = 10;

/// Total reply frame size on the wire, prefix included.
pub const REPLY_FRAME_SIZE: usize = LENGTH_PREFIX_SIZE + REPLY_LENGTH as usize;

/// Message type of a joint trajectory point (replies echo it).
pub const MSG_TYPE_JOINT_TRAJ_PT: u32 = 11;

pub const COMM_CLASS_SERVICE_REQUEST: u32 = 2;
pub const COMM_CLASS_SERVICE_REPLY: u32 = 3;

pub const REPLY_SUCCESS: i32 = 1;
pub const REPLY_FAILURE: i32 = 2;

/// Reserved sequence: discard buffered points and cancel motion.
pub const SEQ_STOP: i32 = -4;

// ---------------------------------------------------------------------------
// Trajectory point
// ---------------------------------------------------------------------------

/// One decoded trajectory-point message.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    /// Non-negative for ordinary points, negative for command codes.
    pub sequence: i32,
    /// Joint positions in radians, one per group axis.
    pub joint_positions: Vec<f64>,
    /// Fraction of maximum speed. Nominally `[0, 1]`, not clamped here.
    pub velocity_fraction: f64,
}

impl TrajectoryPoint {
    pub fn new(sequence: i32, joint_positions: Vec<f64>, velocity_fraction: f64) -> Self {
        Self {
            sequence,
            joint_positions,
            velocity_fraction,
        }
    }

    /// Command message carrying zeroed positions for a group of `dof` axes.
    pub fn command(sequence: i32, dof: usize) -> Self {
        Self::new(sequence, vec![0.0; dof], 0.0)
    }

    /// Interpret the sequence field as a command, if it is one.
    pub fn command_code(&self) -> Option<Command> {
        Command::from_sequence(self.sequence)
    }
}

/// Out-of-band instruction carried in a negative sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stop,
    Unsupported(i32),
}

impl Command {
    pub fn from_sequence(sequence: i32) -> Option<Self> {
        match sequence {
            s if s >= 0 => None,
            SEQ_STOP => Some(Self::Stop),
            s => Some(Self::Unsupported(s)),
        }
    }
}

/// Encode a point into a complete frame (client side and tests).
pub fn encode_point(point: &TrajectoryPoint) -> Vec<u8> {
    let body_len = POINT_HEADER_SIZE + point.joint_positions.len() * POSITION_SIZE;
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + body_len);
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());
    buf.extend_from_slice(&MSG_TYPE_JOINT_TRAJ_PT.to_le_bytes());
    buf.extend_from_slice(&COMM_CLASS_SERVICE_REQUEST.to_le_bytes());
    buf.extend_from_slice(&point.sequence.to_le_bytes());
    buf.extend_from_slice(&point.velocity_fraction.to_le_bytes());
    for p in &point.joint_positions {
        buf.extend_from_slice(&p.to_le_bytes());
    }
    buf
}

/// Decode one complete frame (prefix included) into a point for a group of
/// `dof` axes.
///
/// The communication class is not checked; clients differ on whether they
/// stream as topic or service-request traffic.
pub fn decode_point(frame: &[u8], dof: usize) -> Result<TrajectoryPoint, ProtocolError> {
    let mut r = FieldReader::new(frame);
    let declared = r.u32()? as usize;
    let actual = frame.len() - LENGTH_PREFIX_SIZE;
    if declared != actual {
        return Err(ProtocolError::LengthMismatch { declared, actual });
    }
    if actual < POINT_HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            needed: LENGTH_PREFIX_SIZE + POINT_HEADER_SIZE,
            available: frame.len(),
        });
    }

    let msg_type = r.u32()?;
    if msg_type != MSG_TYPE_JOINT_TRAJ_PT {
        return Err(ProtocolError::UnexpectedType(msg_type));
    }
    let _comm_class = r.u32()?;
    let sequence = r.i32()?;
    let velocity_fraction = r.f64()?;

    let block = actual - POINT_HEADER_SIZE;
    if block % POSITION_SIZE != 0 {
        return Err(ProtocolError::Misaligned(block));
    }
    let got = block / POSITION_SIZE;
    if got != dof {
        return Err(ProtocolError::DofMismatch { expected: dof, got });
    }

    let mut joint_positions = Vec::with_capacity(got);
    for _ in 0..got {
        joint_positions.push(r.f64()?);
    }

    Ok(TrajectoryPoint {
        sequence,
        joint_positions,
        velocity_fraction,
    })
}

/// Read the `length` prefix of a buffered frame, if four bytes are present.
pub fn peek_length(buf: &[u8]) -> Option<usize> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(prefix) as usize)
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Success,
    Failure,
}

impl ReplyCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Success => REPLY_SUCCESS,
            Self::Failure => REPLY_FAILURE,
        }
    }

    pub fn from_i32(v: i32) -> Result<Self, ProtocolError> {
        match v {
            REPLY_SUCCESS => Ok(Self::Success),
            REPLY_FAILURE => Ok(Self::Failure),
            other => Err(ProtocolError::UnknownResult(other)),
        }
    }
}

/// ACK or NACK for one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub sequence: i32,
    pub code: ReplyCode,
}

impl Reply {
    pub fn ack(sequence: i32) -> Self {
        Self {
            sequence,
            code: ReplyCode::Success,
        }
    }

    pub fn nack(sequence: i32) -> Self {
        Self {
            sequence,
            code: ReplyCode::Failure,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.code == ReplyCode::Success
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REPLY_FRAME_SIZE);
        buf.extend_from_slice(&REPLY_LENGTH.to_le_bytes());
        buf.extend_from_slice(&MSG_TYPE_JOINT_TRAJ_PT.to_le_bytes());
        buf.extend_from_slice(&COMM_CLASS_SERVICE_REPLY.to_le_bytes());
        buf.extend_from_slice(&self.code.as_i32().to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.resize(REPLY_FRAME_SIZE, 0);
        buf
    }

    /// Decode a reply frame (client side and tests).
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = FieldReader::new(frame);
        let declared = r.u32()? as usize;
        if declared != REPLY_LENGTH as usize || frame.len() != REPLY_FRAME_SIZE {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: frame.len().saturating_sub(LENGTH_PREFIX_SIZE),
            });
        }
        let msg_type = r.u32()?;
        if msg_type != MSG_TYPE_JOINT_TRAJ_PT {
            return Err(ProtocolError::UnexpectedType(msg_type));
        }
        let _comm_class = r.u32()?;
        let code = ReplyCode::from_i32(r.i32()?)?;
        let sequence = r.i32()?;
        Ok(Self { sequence, code })
    }
}

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        let src = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated {
            needed: end,
            available: self.buf.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.take().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, ProtocolError> {
        self.take().map(i32::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64, ProtocolError> {
        self.take().map(f64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_layout() {
        let point = TrajectoryPoint::new(7, vec![0.5, -1.25], 0.3);
        let frame = encode_point(&point);
        assert_eq!(frame.len(), 4 + 20 + 16);
        assert_eq!(&frame[..4], &36u32.to_le_bytes());
        assert_eq!(&frame[4..8], &11u32.to_le_bytes());
        assert_eq!(&frame[12..16], &7i32.to_le_bytes());
        assert_eq!(decode_point(&frame, 2).unwrap(), point);
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let mut frame = encode_point(&TrajectoryPoint::new(1, vec![0.0; 6], 1.0));
        frame[4..8].copy_from_slice(&10u32.to_le_bytes());
        assert_eq!(
            decode_point(&frame, 6),
            Err(ProtocolError::UnexpectedType(10))
        );
    }

    #[test]
    fn test_decode_rejects_dof_mismatch() {
        let frame = encode_point(&TrajectoryPoint::new(1, vec![0.0; 5], 1.0));
        assert_eq!(
            decode_point(&frame, 6),
            Err(ProtocolError::DofMismatch {
                expected: 6,
                got: 5
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        let mut frame = encode_point(&TrajectoryPoint::new(1, vec![0.0; 2], 1.0));
        frame.pop();
        assert!(matches!(
            decode_point(&frame, 2),
            Err(ProtocolError::LengthMismatch { .. })
        ));

        let short = 8u32.to_le_bytes().iter().chain(&[0u8; 8]).copied().collect::<Vec<_>>();
        assert!(matches!(
            decode_point(&short, 0),
            Err(ProtocolError::Truncated { .. })
        ));

        let mut misaligned = encode_point(&TrajectoryPoint::new(1, vec![0.0; 2], 1.0));
        misaligned.extend_from_slice(&[0u8; 3]);
        let body = (misaligned.len() - 4) as u32;
        misaligned[..4].copy_from_slice(&body.to_le_bytes());
        assert_eq!(decode_point(&misaligned, 2), Err(ProtocolError::Misaligned(19)));

        assert!(decode_point(&[1, 2], 0).is_err());
    }

    #[test]
    fn test_reply_layout() {
        let frame = Reply::nack(-9).encode();
        assert_eq!(frame.len(), REPLY_FRAME_SIZE);
        assert_eq!(&frame[..4], &56u32.to_le_bytes());
        assert_eq!(&frame[8..12], &COMM_CLASS_SERVICE_REPLY.to_le_bytes());
        assert_eq!(&frame[12..16], &REPLY_FAILURE.to_le_bytes());
        assert_eq!(&frame[16..20], &(-9i32).to_le_bytes());
        assert!(frame[20..].iter().all(|b| *b == 0));

        let decoded = Reply::decode(&frame).unwrap();
        assert_eq!(decoded, Reply::nack(-9));
        assert!(!decoded.is_ack());
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::from_sequence(0), None);
        assert_eq!(Command::from_sequence(12), None);
        assert_eq!(Command::from_sequence(SEQ_STOP), Some(Command::Stop));
        assert_eq!(Command::from_sequence(-1), Some(Command::Unsupported(-1)));
        assert_eq!(
            TrajectoryPoint::command(-7, 3).command_code(),
            Some(Command::Unsupported(-7))
        );
    }

    #[test]
    fn test_peek_length() {
        assert_eq!(peek_length(&[1, 0]), None);
        assert_eq!(peek_length(&[20, 0, 0, 0, 9]), Some(20));
    }
}
