//! Streaming parser: reassembles whole MQTT control packets from
//! arbitrarily chunked transport reads.
//!
//! The parser is a byte-at-a-time state machine that is re-entrant across
//! calls to [`Parser::process_chunk`] — all state lives in `self` and
//! survives a chunk boundary landing anywhere, including mid-header or
//! mid-varint.

use crate::codec::decode_remaining_length_step;
use crate::log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Init,
    CalcRemLen,
    ReadRem,
}

/// Streaming MQTT packet reassembler with a fixed-size RX scratch buffer
/// of capacity `RXN`.
///
/// When a complete packet lies entirely within one transport chunk, it is
/// dispatched straight out of that chunk (the "zero-copy fast path") and
/// never touches the scratch buffer at all. A packet split across chunk
/// boundaries is copied incrementally into the scratch buffer and
/// dispatched from there once complete.
pub struct Parser<const RXN: usize> {
    state: ParserState,
    hdr_byte: u8,
    rem_len: u32,
    rem_len_mult: u32,
    curr_pos: usize,
    rx_buf: [u8; RXN],
}

impl<const RXN: usize> Parser<RXN> {
    /// Create a parser in its initial (`INIT`) state.
    pub const fn new() -> Self {
        Self {
            state: ParserState::Init,
            hdr_byte: 0,
            rem_len: 0,
            rem_len_mult: 0,
            curr_pos: 0,
            rx_buf: [0; RXN],
        }
    }

    /// Feed one transport chunk through the state machine, invoking
    /// `dispatch(header_byte, payload)` once per complete packet found.
    ///
    /// `payload` excludes the fixed header and the remaining-length
    /// bytes; `header_byte` still carries the packet type and flags in
    /// its nibbles exactly as it arrived on the wire.
    pub fn process_chunk(&mut self, chunk: &[u8], mut dispatch: impl FnMut(u8, &[u8])) {
        let mut idx = 0;
        while idx < chunk.len() {
            match self.state {
                ParserState::Init => {
                    self.hdr_byte = chunk[idx];
                    self.rem_len = 0;
                    self.rem_len_mult = 0;
                    self.curr_pos = 0;
                    self.state = ParserState::CalcRemLen;
                    idx += 1;
                }
                ParserState::CalcRemLen => {
                    let idx_term = idx;
                    let byte = chunk[idx];
                    match decode_remaining_length_step(byte, &mut self.rem_len, &mut self.rem_len_mult) {
                        Ok(true) => {
                            idx += 1;
                            let rem_len = self.rem_len as usize;
                            if rem_len == 0 {
                                dispatch(self.hdr_byte, &[]);
                                self.state = ParserState::Init;
                            } else {
                                // bytes remaining in this chunk counted from the
                                // terminal varint byte, inclusive of itself. The
                                // whole payload is present inline iff more than
                                // rem_len bytes follow idx_term.
                                let bytes_after = chunk.len() - idx_term;
                                if bytes_after > rem_len {
                                    let payload = &chunk[idx..idx + rem_len];
                                    dispatch(self.hdr_byte, payload);
                                    idx += rem_len;
                                    self.state = ParserState::Init;
                                } else {
                                    self.curr_pos = 0;
                                    self.state = ParserState::ReadRem;
                                }
                            }
                        }
                        Ok(false) => {
                            idx += 1;
                        }
                        Err(()) => {
                            warn!("remaining-length varint exceeded four bytes, discarding packet");
                            self.state = ParserState::Init;
                            idx += 1;
                        }
                    }
                }
                ParserState::ReadRem => {
                    let rem_len = self.rem_len as usize;
                    let available = chunk.len() - idx;
                    let to_copy = core::cmp::min(available, rem_len - self.curr_pos);
                    if self.curr_pos < RXN {
                        let copy_len = core::cmp::min(to_copy, RXN - self.curr_pos);
                        self.rx_buf[self.curr_pos..self.curr_pos + copy_len]
                            .copy_from_slice(&chunk[idx..idx + copy_len]);
                    }
                    self.curr_pos += to_copy;
                    idx += to_copy;
                    if self.curr_pos == rem_len {
                        if rem_len <= RXN {
                            dispatch(self.hdr_byte, &self.rx_buf[..rem_len]);
                        } else {
                            warn!("packet discarded: too big for RX scratch buffer");
                        }
                        self.state = ParserState::Init;
                    }
                }
            }
        }
    }
}

impl<const RXN: usize> Default for Parser<RXN> {
    fn default() -> Self {
        Self::new()
    }
}
