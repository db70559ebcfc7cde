//! Pointer input decoding
//!
//! Turns a raw PS/2 byte stream into normalized motion packets and queues
//! them behind a read interface that only ever hands out whole packets.

use std::collections::VecDeque;
use std::mem;

use bytemuck::{Pod, Zeroable};
use pane_proto::MouseButtons;
use tracing::{debug, trace};

/// Normalized relative motion. `dy` grows upward, as the device reports it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MotionPacket {
    pub dx: i32,
    pub dy: i32,
    pub buttons: u32,
}

pub const PACKET_SIZE: usize = mem::size_of::<MotionPacket>();

impl MotionPacket {
    pub fn buttons(&self) -> MouseButtons {
        MouseButtons::from_bits_truncate(self.buttons)
    }
}

const SYNC_BIT: u8 = 0x08;
const X_SIGN: u8 = 0x10;
const Y_SIGN: u8 = 0x20;
const X_OVERFLOW: u8 = 0x40;
const Y_OVERFLOW: u8 = 0x80;
const BUTTON_MASK: u8 = 0x07;

/// Three-byte PS/2 frame decoder
#[derive(Debug, Default)]
pub struct Ps2Decoder {
    frame: [u8; 3],
    state: usize,
}

impl Ps2Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a packet when it completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<MotionPacket> {
        self.frame[self.state] = byte;
        match self.state {
            0 => {
                if byte & SYNC_BIT == 0 {
                    debug!("PS/2 stream out of sync, dropping byte {:#04x}", byte);
                    return None;
                }
                self.state = 1;
                None
            }
            1 => {
                self.state = 2;
                None
            }
            _ => {
                self.state = 0;
                Some(Self::parse(self.frame))
            }
        }
    }

    fn parse(frame: [u8; 3]) -> MotionPacket {
        let status = frame[0];
        let mut dx = frame[1] as i32;
        let mut dy = frame[2] as i32;
        if dx != 0 && status & X_SIGN != 0 {
            dx -= 0x100;
        }
        if dy != 0 && status & Y_SIGN != 0 {
            dy -= 0x100;
        }
        if status & (X_OVERFLOW | Y_OVERFLOW) != 0 {
            dx = 0;
            dy = 0;
        }
        let packet = MotionPacket {
            dx,
            dy,
            buttons: (status & BUTTON_MASK) as u32,
        };
        trace!("PS/2 packet {:?}", packet);
        packet
    }

    /// Decode `bytes` into `queue`
    pub fn feed(&mut self, bytes: &[u8], queue: &mut PacketQueue) {
        for &byte in bytes {
            if let Some(packet) = self.push(byte) {
                queue.enqueue(packet);
            }
        }
    }
}

/// Decoded packets waiting to be read
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<MotionPacket>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, packet: MotionPacket) {
        self.packets.push_back(packet);
    }

    pub fn can_read(&self) -> bool {
        !self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Copy as many whole packets as fit into `buf`, returning bytes written.
    /// A partial packet is never written.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut nread = 0;
        while buf.len() - nread >= PACKET_SIZE {
            let Some(packet) = self.packets.pop_front() else {
                break;
            };
            buf[nread..nread + PACKET_SIZE].copy_from_slice(bytemuck::bytes_of(&packet));
            nread += PACKET_SIZE;
        }
        nread
    }
}
