//! afterimage-control-osc
//!
//! Live tuning over OSC. Receives UDP packets, extracts `(name, f32)` parameter updates
//! and preset switches, and applies them to a [`PipelineConfig`].
//!
//! rosc 0.10.x API note:
//! - `rosc::decoder::decode_udp` returns `Result<(&[u8], OscPacket), _>` (nom-style),
//!   where the first tuple element is the *unconsumed remainder* of the buffer.

use std::io;
use std::net::UdpSocket;

use afterimage_core::PipelineConfig;
use afterimage_runtime::{preset_from_str, Preset};
use rosc::{OscPacket, OscType};
use tracing::{debug, warn};

/// One decoded control message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlUpdate {
    /// `/param/<name> <number>` or `/<name> <number>`.
    Param { name: String, value: f32 },
    /// `/preset <string>`.
    Preset(Preset),
}

/// Non-blocking UDP OSC receiver.
///
/// Convention:
/// - Address: "/param/<name>" or "/<name>", value is the first argument, coercible to f32
///   (Float, Double, Int, Long)
/// - Address: "/preset", first argument a String naming a preset
#[derive(Debug)]
pub struct OscParamReceiver {
    sock: UdpSocket,
    buf: [u8; 2048],
}

impl OscParamReceiver {
    /// Bind to an address like "127.0.0.1:9000" and put the socket in non-blocking mode.
    pub fn bind(addr: &str) -> io::Result<Self> {
        let sock = UdpSocket::bind(addr)?;
        sock.set_nonblocking(true)?;
        Ok(Self {
            sock,
            buf: [0u8; 2048],
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.sock.local_addr()
    }

    /// Drain the socket and return every update available right now. Never blocks.
    pub fn poll(&mut self) -> Vec<ControlUpdate> {
        let mut out = Vec::new();

        loop {
            match self.sock.recv_from(&mut self.buf) {
                Ok((n, from)) => match rosc::decoder::decode_udp(&self.buf[..n]) {
                    Ok((_rest, pkt)) => extract_from_packet(pkt, &mut out),
                    Err(e) => debug!(%from, error = ?e, "dropping undecodable OSC packet"),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "OSC socket error");
                    break;
                }
            }
        }

        out
    }
}

/// Walk a packet/bundle tree and push parsed messages into `out`.
fn extract_from_packet(pkt: OscPacket, out: &mut Vec<ControlUpdate>) {
    match pkt {
        OscPacket::Message(m) => match parse_message(&m.addr, &m.args) {
            Some(u) => out.push(u),
            None => debug!(addr = %m.addr, "ignoring OSC message"),
        },
        OscPacket::Bundle(b) => {
            for p in b.content {
                extract_from_packet(p, out);
            }
        }
    }
}

/// Parse a message into an update if it matches our convention.
pub fn parse_message(addr: &str, args: &[OscType]) -> Option<ControlUpdate> {
    if addr == "/preset" {
        return match args.first()? {
            OscType::String(s) => preset_from_str(s).map(ControlUpdate::Preset),
            _ => None,
        };
    }

    let name = addr
        .strip_prefix("/param/")
        .or_else(|| addr.strip_prefix('/'))?;
    if name.is_empty() {
        return None;
    }
    let value = match *args.first()? {
        OscType::Float(x) => x,
        OscType::Double(x) => x as f32,
        OscType::Int(x) => x as f32,
        OscType::Long(x) => x as f32,
        _ => return None,
    };
    Some(ControlUpdate::Param {
        name: name.to_string(),
        value,
    })
}

/// Apply updates in order. Rejected updates are logged and skipped; the config only
/// ever holds validated values. Returns how many were applied.
pub fn apply_updates(config: &mut PipelineConfig, updates: &[ControlUpdate]) -> usize {
    let mut applied = 0;
    for u in updates {
        match u {
            ControlUpdate::Param { name, value } => match config.set_param(name, *value) {
                Ok(()) => {
                    debug!(%name, value, "param updated");
                    applied += 1;
                }
                Err(e) => warn!(%name, value, error = %e, "param update rejected"),
            },
            ControlUpdate::Preset(p) => {
                debug!(preset = p.name(), "preset selected");
                *config = p.config();
                applied += 1;
            }
        }
    }
    applied
}
