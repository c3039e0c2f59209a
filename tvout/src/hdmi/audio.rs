//! Gen1 audio path: I2S input, channel status and clock recovery.

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use log::debug;

use super::infoframe::{acr, write_acr};
use super::regs::*;
use super::HdmiShared;
use crate::config::HardwareGeneration;
use crate::error::{Error, Result};
use crate::platform::RegisterBlock;

/// Sample rate programmed at power-on
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// IEC 60958 sampling frequency code
pub fn sample_frequency_code(sample_rate: u32) -> u8 {
    match sample_rate {
        44100 => 0x0,
        48000 => 0x2,
        32000 => 0x3,
        96000 => 0xa,
        _ => 0x0,
    }
}

/// Program the fixed 16-bit I2S configuration and ACR for `sample_rate`.
pub(crate) fn init<R: RegisterBlock>(regs: &R, sample_rate: u32) {
    debug!("hdmi: audio init {} Hz", sample_rate);

    // 16 bits per sample
    let (data_num, bit_ch) = (1, 0);

    write_acr(regs, acr(sample_rate), HardwareGeneration::Gen1);

    regs.write_byte(
        I2S_MUX_CON,
        I2S_IN_DISABLE | I2S_AUD_I2S | I2S_CUV_I2S_ENABLE | I2S_MUX_ENABLE,
    );
    regs.write_byte(I2S_MUX_CH, I2S_CH0_EN | I2S_CH1_EN | I2S_CH2_EN);
    regs.write_byte(I2S_MUX_CUV, I2S_CUV_RL_EN);

    regs.write_byte(I2S_CLK_CON, I2S_CLK_DIS);
    regs.write_byte(I2S_CLK_CON, I2S_CLK_EN);

    let dsd = regs.read(I2S_DSD_CON) | 0x01;
    regs.write_byte(I2S_DSD_CON, dsd as u8);

    // SCLK/LRCK, SDATA1/2, SDATA3/2, DSD
    regs.write_byte(I2S_PIN_SEL_0, i2s_sel_high(5) | i2s_sel_low(6));
    regs.write_byte(I2S_PIN_SEL_1, i2s_sel_high(1) | i2s_sel_low(4));
    regs.write_byte(I2S_PIN_SEL_2, i2s_sel_high(1) | i2s_sel_low(2));
    regs.write_byte(I2S_PIN_SEL_3, i2s_sel_low(0));

    regs.write_byte(I2S_CON_1, I2S_SCLK_FALLING_EDGE | I2S_L_CH_LOW_POL);
    regs.write_byte(
        I2S_CON_2,
        I2S_MSB_FIRST_MODE | i2s_set_bit_ch(bit_ch) | i2s_set_sdata_bit(data_num) | I2S_BASIC_FORMAT,
    );

    regs.write_byte(
        I2S_CH_ST_0,
        I2S_CH_STATUS_MODE_0
            | I2S_2AUD_CH_WITHOUT_PREEMPH
            | I2S_COPYRIGHT
            | I2S_LINEAR_PCM
            | I2S_CONSUMER_FORMAT,
    );
    regs.write_byte(I2S_CH_ST_1, I2S_CD_PLAYER);
    regs.write_byte(I2S_CH_ST_2, i2s_set_source_num(0));
    write_channel_frequency(regs, sample_rate);
    regs.write_byte(
        I2S_CH_ST_4,
        I2S_ORG_SMP_FREQ_44_1 | I2S_WORD_LEN_MAX24_24BITS | I2S_WORD_LEN_MAX_24BITS,
    );
    regs.write_byte(I2S_CH_ST_CON, I2S_CH_STATUS_RELOAD);
}

fn write_channel_frequency<R: RegisterBlock>(regs: &R, sample_rate: u32) {
    regs.write_byte(
        I2S_CH_ST_3,
        I2S_CLK_ACCUR_LEVEL_2 | i2s_set_smp_freq(sample_frequency_code(sample_rate)),
    );
}

/// Start or stop audio packets. A sink without audio support is left alone.
pub(crate) fn control<R: RegisterBlock>(regs: &R, on: bool, sink_audio: bool) {
    if !sink_audio {
        return;
    }
    regs.write_byte(V13_AUI_CON, if on { AUI_CON_EVERY_VSYNC } else { AUI_CON_NO_TRAN });
    regs.write_mask(CON_0, if on { ASP_EN } else { ASP_DIS }, ASP_MASK);
}

/// Owned handle to the audio side of a powered Gen1 encoder.
///
/// Handed out by power-on. Every call fails with [`Error::NotPowered`] once
/// the encoder is off; a fresh handle comes with the next power-on.
pub struct AudioPort<R> {
    shared: Arc<HdmiShared<R>>,
}

impl<R: RegisterBlock> AudioPort<R> {
    pub(crate) fn new(shared: Arc<HdmiShared<R>>) -> Self {
        Self { shared }
    }

    fn check_powered(&self) -> Result<()> {
        if self.shared.powered.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotPowered)
        }
    }

    /// Toggle audio sample packets and the audio infoframe.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.check_powered()?;
        control(
            &self.shared.regs,
            enabled,
            self.shared.sink_audio.load(Ordering::Acquire),
        );
        Ok(())
    }

    /// Reprogram clock recovery and channel status for a new rate.
    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        self.check_powered()?;
        let regs = &self.shared.regs;
        self.shared.sample_rate.store(sample_rate, Ordering::Release);
        write_acr(regs, acr(sample_rate), HardwareGeneration::Gen1);
        write_channel_frequency(regs, sample_rate);
        regs.write_byte(I2S_CH_ST_CON, I2S_CH_STATUS_RELOAD);
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate.load(Ordering::Acquire)
    }
}
