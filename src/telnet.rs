//! Telnet framing adapter (§4.7): de-IACs the outbound byte stream, delivers
//! `IAC EOR` as an end-of-record signal, and handles the minimal option
//! negotiation needed to enter 3270 binary mode.
//!
//! Grounded on `protocol_common::telnet_base` (`TelnetCommand`, IAC-doubling,
//! the `parse_telnet_stream` incremental-scan idiom), trimmed from its
//! general RFC 854 command set down to exactly what a 3270 session needs
//! (`BINARY`, `END-OF-RECORD`, `TERMINAL-TYPE`) and re-architected as a
//! byte-at-a-time state machine so it survives fragmented reads the way
//! `parse_telnet_stream`'s whole-buffer scan does not. Also fixes the
//! teacher's `connection.tls` default of terminal type `"IBM-3179-2"` (a
//! 5250 device name) to the 3270 device type `IBM-3278-2` this spec names.

use log::{debug, trace};

const IAC: u8 = 0xFF;
const DONT: u8 = 0xFE;
const DO: u8 = 0xFD;
const WONT: u8 = 0xFC;
const WILL: u8 = 0xFB;
const SB: u8 = 0xFA;
const SE: u8 = 0xF0;
const EOR_CMD: u8 = 0xEF;

const OPT_BINARY: u8 = 0x00;
const OPT_TERMINAL_TYPE: u8 = 0x18;
const OPT_EOR: u8 = 0x19;

const TTYPE_IS: u8 = 0x00;
const TTYPE_SEND: u8 = 0x01;

/// The default terminal type string this adapter answers TERMINAL-TYPE
/// SEND subnegotiations with — a real 3270 Model 2, not the teacher's
/// leftover 5250 device name.
pub const DEFAULT_TERMINAL_TYPE: &str = "IBM-3278-2";

/// Consumer of de-IACed outbound bytes and record boundaries.
pub trait TelnetSink {
    fn data(&mut self, bytes: &[u8]);
    fn end_record(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Data,
    Iac,
    Negotiate(Verb),
    Sub,
    SubIac,
}

/// Incremental Telnet layer sitting between the raw socket and [`crate::parser::StreamParser`].
#[derive(Debug)]
pub struct TelnetAdapter {
    mode: Mode,
    sub_buf: Vec<u8>,
    terminal_type: String,
}

impl TelnetAdapter {
    pub fn new(terminal_type: impl Into<String>) -> Self {
        TelnetAdapter { mode: Mode::Data, sub_buf: Vec::new(), terminal_type: terminal_type.into() }
    }

    /// The byte sequence a client sends unprompted at connect time to offer
    /// the options this session needs.
    pub fn greeting() -> Vec<u8> {
        let mut out = Vec::new();
        for &opt in &[OPT_BINARY, OPT_EOR, OPT_TERMINAL_TYPE] {
            out.extend_from_slice(&[IAC, WILL, opt]);
        }
        out.extend_from_slice(&[IAC, DO, OPT_BINARY]);
        out
    }

    /// Consume `bytes` from the socket, delivering de-IACed data and
    /// end-of-record signals to `sink`. Returns any negotiation reply bytes
    /// that must be written back to the socket.
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn TelnetSink) -> Vec<u8> {
        let mut reply = Vec::new();
        let mut data_run = Vec::new();
        for &byte in bytes {
            match self.mode {
                Mode::Data => {
                    if byte == IAC {
                        flush(&mut data_run, sink);
                        self.mode = Mode::Iac;
                    } else {
                        data_run.push(byte);
                    }
                }
                Mode::Iac => match byte {
                    IAC => {
                        data_run.push(IAC);
                        self.mode = Mode::Data;
                    }
                    EOR_CMD => {
                        flush(&mut data_run, sink);
                        trace!("telnet: end of record");
                        sink.end_record();
                        self.mode = Mode::Data;
                    }
                    WILL => self.mode = Mode::Negotiate(Verb::Will),
                    WONT => self.mode = Mode::Negotiate(Verb::Wont),
                    DO => self.mode = Mode::Negotiate(Verb::Do),
                    DONT => self.mode = Mode::Negotiate(Verb::Dont),
                    SB => {
                        self.sub_buf.clear();
                        self.mode = Mode::Sub;
                    }
                    _ => {
                        // NOP, GA, and other zero-argument commands: no state to track.
                        self.mode = Mode::Data;
                    }
                },
                Mode::Negotiate(verb) => {
                    self.handle_negotiation(verb, byte, &mut reply);
                    self.mode = Mode::Data;
                }
                Mode::Sub => {
                    if byte == IAC {
                        self.mode = Mode::SubIac;
                    } else {
                        self.sub_buf.push(byte);
                    }
                }
                Mode::SubIac => match byte {
                    SE => {
                        self.handle_subnegotiation(&mut reply);
                        self.mode = Mode::Data;
                    }
                    IAC => {
                        self.sub_buf.push(IAC);
                        self.mode = Mode::Sub;
                    }
                    _ => {
                        // Malformed (IAC not followed by SE or escaped IAC); resync to data.
                        self.mode = Mode::Data;
                    }
                },
            }
        }
        flush(&mut data_run, sink);
        reply
    }

    fn handle_negotiation(&mut self, verb: Verb, option: u8, reply: &mut Vec<u8>) {
        debug!("telnet: negotiation {verb:?} option={option}");
        match verb {
            Verb::Do => {
                if matches!(option, OPT_BINARY | OPT_EOR | OPT_TERMINAL_TYPE) {
                    reply.extend_from_slice(&[IAC, WILL, option]);
                } else {
                    reply.extend_from_slice(&[IAC, WONT, option]);
                }
            }
            Verb::Will => {
                if matches!(option, OPT_BINARY | OPT_EOR) {
                    reply.extend_from_slice(&[IAC, DO, option]);
                } else {
                    reply.extend_from_slice(&[IAC, DONT, option]);
                }
            }
            Verb::Dont | Verb::Wont => {
                // Peer declined or withdrew an option; nothing further to negotiate.
            }
        }
    }

    fn handle_subnegotiation(&mut self, reply: &mut Vec<u8>) {
        if self.sub_buf.first() == Some(&OPT_TERMINAL_TYPE) && self.sub_buf.get(1) == Some(&TTYPE_SEND) {
            reply.push(IAC);
            reply.push(SB);
            reply.push(OPT_TERMINAL_TYPE);
            reply.push(TTYPE_IS);
            for &b in self.terminal_type.as_bytes() {
                reply.push(b);
                if b == IAC {
                    reply.push(IAC);
                }
            }
            reply.push(IAC);
            reply.push(SE);
        }
    }
}

fn flush(data_run: &mut Vec<u8>, sink: &mut dyn TelnetSink) {
    if !data_run.is_empty() {
        sink.data(data_run);
        data_run.clear();
    }
}

/// Frame inbound (terminal-to-host) reply bytes for the wire: double any
/// `IAC` byte, terminate with `IAC EOR`.
pub fn frame_outbound(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out.push(IAC);
    out.push(EOR_CMD);
    out
}
