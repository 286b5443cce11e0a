//! Reed–Solomon outer code — super-block streaming with interleaving.
//!
//! # Wire format
//!
//! The encoder emits super-blocks of `BLK_LEN × 255` bytes, each holding
//! `BLK_LEN` interleaved codewords, followed by one trailer:
//!
//! ```text
//! super-block × N : scatter(BLK_LEN codewords of 255 bytes)
//! 64 bytes        : BLAKE2b-512 over every payload row (padding included)
//! 4 bytes         : k_i (LE u16), k_j (LE u16) — truncation marker
//! ```
//!
//! `(k_i, k_j)` name the first payload row that saw a short read and how
//! many real bytes it holds; the decoder uses them to strip the zero
//! padding of the final super-block.  Input whose length is an exact
//! multiple of `BLK_LEN × 223` yields one extra all-zero super-block with
//! marker `(0, 0)` — the marker row must exist in the last block.
//!
//! # Interleaving
//!
//! [`scatter`] writes the block column-major so that a contiguous burst of
//! up to `BLK_LEN` damaged bytes on the medium lands on `BLK_LEN` distinct
//! codewords, at most one byte each; a single corrupt byte is far inside
//! what each codeword can repair.  [`gather`] is the inverse.
//!
//! # Decoder states
//!
//! `reading-block → classify(full | trailer | truncated)`: a full block is
//! decoded and held back until the next read shows what follows it; the
//! trailer verifies the checksum and truncates the held block; any other
//! byte count means the stream was cut and the held block is emitted in
//! full before the error is reported.

pub mod codeword;
pub mod gf;

use std::io::{self, Read, Write};
use thiserror::Error;

use crate::record::CHECKSUM_LEN;
use crate::wire::read_fully;

pub use codeword::Repair;
pub use gf::{KK, NN, NROOTS};

/// Codewords per super-block.
pub const BLK_LEN: usize = 16 * 511;
/// On-wire bytes per super-block.
pub const WIRE_BLOCK: usize = BLK_LEN * NN;
/// Payload bytes per super-block.
pub const PAYLOAD_BLOCK: usize = BLK_LEN * KK;
/// Trailer: BLAKE2b digest plus the truncation marker.
pub const TRAILER_LEN: usize = CHECKSUM_LEN + 4;

#[derive(Error, Debug)]
pub enum EccError {
    /// The stream ended on neither a super-block nor a trailer boundary.
    /// Everything decodable has already been written.
    #[error(
        "file truncated. can't validate the checksum or remove superfluous \
         0x00 padding, but the data might be ok."
    )]
    Truncated(DecodeReport),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What one decoding run observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeReport {
    /// Total byte errors corrected across all codewords.
    pub corrected:     u64,
    /// Codewords the Berlekamp–Massey decoder gave up on.
    pub uncorrectable: u64,
    /// Whether the trailer digest matched the decoded payload stream.
    pub checksum_ok:   bool,
    /// The `(k_i, k_j)` marker parsed from the trailer.
    pub truncation:    Option<(u16, u16)>,
}

impl DecodeReport {
    /// True when nothing suspicious was seen.
    pub fn is_clean(&self) -> bool {
        self.uncorrectable == 0 && self.checksum_ok
    }
}

// ── Interleaver ──────────────────────────────────────────────────────────────

/// Codeword order → wire order (column-major reshape of the
/// `BLK_LEN × 255` grid).
pub fn scatter(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), WIRE_BLOCK);
    debug_assert_eq!(dst.len(), WIRE_BLOCK);
    for row in 0..BLK_LEN {
        for col in 0..NN {
            dst[col * BLK_LEN + row] = src[row * NN + col];
        }
    }
}

/// Wire order → codeword order; exact inverse of [`scatter`].
pub fn gather(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), WIRE_BLOCK);
    debug_assert_eq!(dst.len(), WIRE_BLOCK);
    for row in 0..BLK_LEN {
        for col in 0..NN {
            dst[row * NN + col] = src[col * BLK_LEN + row];
        }
    }
}

// ── Encoder ──────────────────────────────────────────────────────────────────

/// Encode `input` into super-blocks on `output`, ending with the trailer.
pub fn encode_stream<R: Read, W: Write>(input: &mut R, output: &mut W) -> io::Result<()> {
    let mut ec_buf = vec![0u8; WIRE_BLOCK];
    let mut tr_buf = vec![0u8; WIRE_BLOCK];
    let mut hash = blake2b_simd::Params::new()
        .hash_length(CHECKSUM_LEN)
        .to_state();

    let mut k_i = u16::MAX;
    let mut k_j = u16::MAX;
    let mut at_eof = false;

    while !at_eof {
        for row in 0..BLK_LEN {
            let cw = &mut ec_buf[row * NN..(row + 1) * NN];
            let got = read_fully(input, &mut cw[..KK])?;
            if got < KK {
                cw[got..KK].fill(0);
                if k_i == u16::MAX && k_j == u16::MAX {
                    k_i = row as u16;
                    k_j = got as u16;
                }
                at_eof = true;
            }
            hash.update(&cw[..KK]);
            codeword::encode(cw.try_into().unwrap());
        }
        scatter(&ec_buf, &mut tr_buf);
        output.write_all(&tr_buf)?;
    }

    output.write_all(hash.finalize().as_bytes())?;
    output.write_all(&k_i.to_le_bytes())?;
    output.write_all(&k_j.to_le_bytes())?;
    output.flush()
}

// ── Decoder ──────────────────────────────────────────────────────────────────

/// Decode super-blocks from `input` onto `output`.
///
/// Corrections and uncorrectable codewords are tallied, never fatal; the
/// trailer checksum is the final arbiter and a mismatch is only flagged in
/// the report.  A stream cut anywhere else yields [`EccError::Truncated`]
/// after everything decodable has been emitted.
pub fn decode_stream<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<DecodeReport, EccError> {
    let mut ec_buf = vec![0u8; WIRE_BLOCK];
    let mut tr_buf = vec![0u8; WIRE_BLOCK];
    let mut hash = blake2b_simd::Params::new()
        .hash_length(CHECKSUM_LEN)
        .to_state();
    let mut report = DecodeReport::default();

    // Priming read: the first super-block is decoded before any
    // classification; each following read decides how the block before it
    // is emitted.
    read_fully(input, &mut tr_buf)?;
    decode_block(&tr_buf, &mut ec_buf, &mut hash, &mut report);

    loop {
        let got = read_fully(input, &mut tr_buf)?;
        if got == WIRE_BLOCK {
            emit_rows(&ec_buf, BLK_LEN, output)?;
            decode_block(&tr_buf, &mut ec_buf, &mut hash, &mut report);
        } else if got == TRAILER_LEN {
            report.checksum_ok =
                hash.finalize().as_bytes() == &tr_buf[..CHECKSUM_LEN];
            let k_i = u16::from_le_bytes([tr_buf[CHECKSUM_LEN], tr_buf[CHECKSUM_LEN + 1]]);
            let k_j =
                u16::from_le_bytes([tr_buf[CHECKSUM_LEN + 2], tr_buf[CHECKSUM_LEN + 3]]);
            report.truncation = Some((k_i, k_j));

            // Whole rows up to the marker row, then its real bytes only.
            emit_rows(&ec_buf, (k_i as usize).min(BLK_LEN), output)?;
            if (k_i as usize) < BLK_LEN {
                let row = &ec_buf[k_i as usize * NN..];
                output.write_all(&row[..(k_j as usize).min(KK)])?;
            }
            output.flush()?;
            return Ok(report);
        } else {
            // Neither a block nor a trailer: the stream was cut.  Emit what
            // the last decode produced so the caller can salvage it.
            emit_rows(&ec_buf, BLK_LEN, output)?;
            output.flush()?;
            return Err(EccError::Truncated(report));
        }
    }
}

/// Gather one wire block and run the row decoder over every codeword.
fn decode_block(
    tr_buf: &[u8],
    ec_buf: &mut [u8],
    hash: &mut blake2b_simd::State,
    report: &mut DecodeReport,
) {
    gather(tr_buf, ec_buf);
    for row in 0..BLK_LEN {
        let cw: &mut [u8; NN] = (&mut ec_buf[row * NN..(row + 1) * NN])
            .try_into()
            .unwrap();
        match codeword::decode(cw) {
            Repair::Clean => {}
            Repair::Corrected(n) => report.corrected += n as u64,
            Repair::Uncorrectable => report.uncorrectable += 1,
        }
        hash.update(&cw[..KK]);
    }
}

/// Write the payload bytes of the first `rows` codewords.
fn emit_rows<W: Write>(ec_buf: &[u8], rows: usize, output: &mut W) -> io::Result<()> {
    for row in 0..rows {
        output.write_all(&ec_buf[row * NN..row * NN + KK])?;
    }
    Ok(())
}
