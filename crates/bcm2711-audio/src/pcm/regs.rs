//! PCM/I2S register map.

// Field encoders shift values already bounded by option validation.
#![allow(clippy::arithmetic_side_effects)]

/// ARM physical address of the PCM block.
pub const PCM_BASE: u64 = 0xFE20_3000;

/// Size of the PCM window.
pub const PCM_WINDOW_SIZE: usize = 0x24;

pub(crate) const CS: usize = 0x00;
pub(crate) const MODE: usize = 0x08;
pub(crate) const RXC: usize = 0x0c;
pub(crate) const TXC: usize = 0x10;
pub(crate) const DREQ: usize = 0x14;

/// Physical address of the FIFO, the device end of every PCM transfer.
pub const PCM_FIFO_PHYS: u64 = 0xFE20_3004;

// CS
pub(crate) const CS_RXSEX: u32 = 1 << 23;
pub(crate) const CS_TXE: u32 = 1 << 21;
pub(crate) const CS_TXW: u32 = 1 << 17;
pub(crate) const CS_RXERR: u32 = 1 << 16;
pub(crate) const CS_TXERR: u32 = 1 << 15;
pub(crate) const CS_DMAEN: u32 = 1 << 9;
pub(crate) const CS_RXCLR: u32 = 1 << 4;
pub(crate) const CS_TXCLR: u32 = 1 << 3;
pub(crate) const CS_TXON: u32 = 1 << 2;
pub(crate) const CS_RXON: u32 = 1 << 1;
pub(crate) const CS_EN: u32 = 1 << 0;

pub(crate) const fn cs_rxthr(level: u32) -> u32 {
    (level & 0x3) << 7
}

pub(crate) const fn cs_txthr(level: u32) -> u32 {
    (level & 0x3) << 5
}

// MODE
pub(crate) const MODE_CLK_DIS: u32 = 1 << 28;
pub(crate) const MODE_FRXP: u32 = 1 << 25;
pub(crate) const MODE_FTXP: u32 = 1 << 24;
pub(crate) const MODE_CLKM: u32 = 1 << 23;
pub(crate) const MODE_CLKI: u32 = 1 << 22;
pub(crate) const MODE_FSM: u32 = 1 << 21;
pub(crate) const MODE_FSI: u32 = 1 << 20;

pub(crate) const fn mode_flen(len: u32) -> u32 {
    (len & 0x3ff) << 10
}

pub(crate) const fn mode_fslen(len: u32) -> u32 {
    len & 0x3ff
}

// TXC / RXC share one layout.
const XC_CH1WEX: u32 = 1 << 31;
const XC_CH1EN: u32 = 1 << 30;
const XC_CH2WEX: u32 = 1 << 15;
const XC_CH2EN: u32 = 1 << 14;

/// TXC/RXC value for two enabled channels of `bits`, the first starting
/// `bit_delay` clocks into the frame and the second right after it.
pub(crate) fn channel_config(bits: u32, bit_delay: u32) -> u32 {
    let wex = u32::from(bits >= 24);
    let wid = (bits - 16 * wex - 8) & 0xf;
    let ch2pos = (bit_delay + bits) & 0x3ff;
    let ch1pos = bit_delay & 0x3ff;
    let wex_bits = if wex == 1 { XC_CH1WEX | XC_CH2WEX } else { 0 };
    wex_bits | XC_CH1EN | (ch1pos << 20) | (wid << 16) | XC_CH2EN | (ch2pos << 4) | wid
}

// DREQ
pub(crate) const fn dreq_thresholds(tx_panic: u32, tx_req: u32, rx_panic: u32, rx_req: u32) -> u32 {
    ((tx_panic & 0x7f) << 24) | ((rx_panic & 0x7f) << 16) | ((tx_req & 0x7f) << 8) | (rx_req & 0x7f)
}
