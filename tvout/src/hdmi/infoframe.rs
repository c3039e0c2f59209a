//! Auxiliary metadata packets (infoframes) and audio clock recovery values.

use heapless::Vec;
use log::debug;

use super::regs::*;
use crate::config::HardwareGeneration;
use crate::error::{Error, Result};
use crate::platform::RegisterBlock;

/// Largest infoframe payload the packet registers hold
pub const MAX_PAYLOAD: usize = 27;

pub const AVI_VERSION: u8 = 0x02;
pub const AVI_LENGTH: u8 = 0x0d;
pub const AUI_VERSION: u8 = 0x01;
pub const AUI_LENGTH: u8 = 0x0a;

// AVI payload bits
const AVI_ACTIVE_FORMAT_VALID: u8 = 1 << 4;
const AVI_UNDERSCANNED_DISPLAY_VALID: u8 = 1 << 1;
const AVI_PIC_ASPECT_RATIO_16_9: u8 = 2 << 4;
const AVI_SAME_AS_PIC_ASPECT_RATIO: u8 = 8;

/// Packet type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoframeKind {
    Avi = 0x82,
    Audio = 0x84,
}

/// A header plus payload with its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infoframe {
    pub kind: InfoframeKind,
    pub version: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
    pub checksum: u8,
}

impl Infoframe {
    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Auxiliary video information for `vic`: RGB, 16:9, underscanned.
    pub fn avi(vic: u8) -> Self {
        let mut payload = [0u8; AVI_LENGTH as usize];
        payload[0] = AVI_ACTIVE_FORMAT_VALID | AVI_UNDERSCANNED_DISPLAY_VALID;
        payload[1] = AVI_PIC_ASPECT_RATIO_16_9 | AVI_SAME_AS_PIC_ASPECT_RATIO;
        payload[3] = vic;
        // Payload fits by construction
        Self::from_parts(InfoframeKind::Avi, AVI_VERSION, &payload)
    }

    /// Audio infoframe with every field "refer to stream header"
    pub fn audio() -> Self {
        Self::from_parts(InfoframeKind::Audio, AUI_VERSION, &[0u8; AUI_LENGTH as usize])
    }

    fn from_parts(kind: InfoframeKind, version: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::new();
        for b in payload.iter().take(MAX_PAYLOAD) {
            let _ = bytes.push(*b);
        }
        let checksum = checksum(kind as u8, version, bytes.len() as u8, &bytes);
        Self {
            kind,
            version,
            payload: bytes,
            checksum,
        }
    }
}

/// Checksum making header, payload and checksum sum to zero mod 256.
pub fn checksum(kind: u8, version: u8, length: u8, payload: &[u8]) -> u8 {
    let sum = payload
        .iter()
        .fold(kind.wrapping_add(version).wrapping_add(length), |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Build a packet; `length` must equal the payload size.
pub fn build(kind: InfoframeKind, version: u8, length: u8, payload: &[u8]) -> Result<Infoframe> {
    if payload.len() != length as usize || payload.len() > MAX_PAYLOAD {
        return Err(Error::InvalidArgument);
    }
    Ok(Infoframe::from_parts(kind, version, payload))
}

/// Program one packet into the Gen2 packet registers, or stop every packet
/// when the sink only speaks DVI.
pub fn write_packet<R: RegisterBlock>(regs: &R, frame: &Infoframe, hdmi_sink: bool) {
    debug!(
        "hdmi: infoframe type {:#04x} ver {} len {}",
        frame.kind as u8,
        frame.version,
        frame.length()
    );

    if !hdmi_sink {
        disable_packets(regs);
        return;
    }

    let (con, con_value, header, first_byte, sum) = match frame.kind {
        InfoframeKind::Avi => (AVI_CON, AVI_CON_EVERY_VSYNC, AVI_HEADER0, avi_byte(1), AVI_CHECK_SUM),
        InfoframeKind::Audio => (AUI_CON, AUI_CON_EVERY_VSYNC, AUI_HEADER0, aui_byte(1), AUI_CHECK_SUM),
    };

    regs.write_byte(con, con_value);
    regs.write_byte(header, frame.kind as u8);
    regs.write_byte(header + 4, frame.version);
    regs.write_byte(header + 8, frame.length());
    for (i, b) in frame.payload.iter().enumerate() {
        regs.write_byte(first_byte + 4 * i, *b);
    }
    debug!("hdmi: infoframe checksum = {:#04x}", frame.checksum);
    regs.write_byte(sum, frame.checksum);
}

/// Stop transmitting every auxiliary packet
pub fn disable_packets<R: RegisterBlock>(regs: &R) {
    regs.write_byte(VSI_CON, VSI_CON_DO_NOT_TRANSMIT);
    regs.write_byte(AVI_CON, AVI_CON_DO_NOT_TRANSMIT);
    regs.write_byte(AUI_CON, AUI_CON_NO_TRAN);
}

// =============================================================================
// Audio clock recovery
// =============================================================================

/// N/CTS pair for a sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcrValues {
    pub n: u32,
    pub cts: u32,
}

/// Fixed N/CTS lookup. Unknown rates yield zero, which the sink cannot use.
pub fn acr(sample_rate: u32) -> AcrValues {
    let (n, cts) = match sample_rate {
        32000 => (4096, 27000),
        44100 => (6272, 30000),
        88200 => (12544, 30000),
        176400 => (25088, 30000),
        48000 => (6144, 27000),
        96000 => (12288, 27000),
        192000 => (24576, 27000),
        _ => (0, 0),
    };
    AcrValues { n, cts }
}

/// Write N, measured CTS and CTS, then start ACR transmission.
pub fn write_acr<R: RegisterBlock>(regs: &R, values: AcrValues, generation: HardwareGeneration) {
    for (i, reg) in [ACR_N0, ACR_N1, ACR_N2].into_iter().enumerate() {
        regs.write_byte(reg, (values.n >> (8 * i)) as u8);
    }
    for (i, reg) in [ACR_MCTS0, ACR_MCTS1, ACR_MCTS2].into_iter().enumerate() {
        regs.write_byte(reg, (values.cts >> (8 * i)) as u8);
    }
    for (i, reg) in [ACR_CTS0, ACR_CTS1, ACR_CTS2].into_iter().enumerate() {
        regs.write_byte(reg, (values.cts >> (8 * i)) as u8);
    }
    regs.write_byte(GenerationRegs::of(generation).acr_con, 4);
}
