// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Shared vector dispatch.
//!
//! Vector slots 128 to 143 each carry up to 32 sources. When a shared slot
//! fires, every candidate source of the slot is checked in a fixed order and
//! its handler runs if the source is
//!
//! - routed onto the slot (its bit in the slot's `VSSEL` bitmap is set),
//! - enabled in its peripheral, and
//! - flagged in its peripheral.
//!
//! A flagged source whose routing bit is clear is skipped silently; another
//! mechanism (a direct slot, DMA or event triggering) owns it.
//!
//! The candidates of every slot are described by [`Row`]s: which peripheral
//! bits say "enabled" and which say "flagged". The rows of a slot are walked
//! in table order, so two sources firing together run their handlers in that
//! order.

use core::cell::Cell;
use core::ptr;

use crate::interrupts::{self, *};

/// Access width of a peripheral register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
}

/// Some bits of one peripheral register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub addr: usize,
    pub width: Width,
    pub mask: u32,
}

impl Field {
    pub const fn byte(addr: usize, mask: u32) -> Field {
        Field {
            addr,
            width: Width::Byte,
            mask,
        }
    }

    pub const fn half(addr: usize, mask: u32) -> Field {
        Field {
            addr,
            width: Width::Half,
            mask,
        }
    }

    pub const fn word(addr: usize, mask: u32) -> Field {
        Field {
            addr,
            width: Width::Word,
            mask,
        }
    }
}

/// Reads peripheral registers for the dispatcher.
pub trait PeripheralBus {
    /// Raw value of the register holding `field`, zero-extended.
    fn read(&self, field: &Field) -> u32;
}

/// The memory-mapped peripherals of the running chip.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mmio;

impl PeripheralBus for Mmio {
    fn read(&self, field: &Field) -> u32 {
        // SAFETY: every `Field` in the dispatch tables names a readable
        // peripheral register of the matching width, and reading a status or
        // enable register has no side effects.
        unsafe {
            match field.width {
                Width::Byte => u32::from(ptr::read_volatile(field.addr as *const u8)),
                Width::Half => u32::from(ptr::read_volatile(field.addr as *const u16)),
                Width::Word => ptr::read_volatile(field.addr as *const u32),
            }
        }
    }
}

/// A condition on peripheral register bits.
#[derive(Clone, Copy, Debug)]
pub enum Check {
    Always,
    /// Any masked bit set.
    Set(Field),
    /// No masked bit set.
    Clear(Field),
    /// Every masked bit set.
    AllSet(Field),
    /// The first field is set and the second is clear.
    SetClear(Field, Field),
    /// `((a & a.mask) >> shift) & b & b.mask` is non-zero.
    Overlap { a: Field, b: Field, shift: u8 },
    /// `flag & flag.mask & !mask` is non-zero.
    Unmasked { flag: Field, mask: Field },
    /// Any of the checks holds.
    Any(&'static [Check]),
}

impl Check {
    pub fn holds<B: PeripheralBus + ?Sized>(&self, bus: &B) -> bool {
        match *self {
            Check::Always => true,
            Check::Set(f) => bus.read(&f) & f.mask != 0,
            Check::Clear(f) => bus.read(&f) & f.mask == 0,
            Check::AllSet(f) => bus.read(&f) & f.mask == f.mask,
            Check::SetClear(set, clear) => {
                bus.read(&set) & set.mask != 0 && bus.read(&clear) & clear.mask == 0
            }
            Check::Overlap { a, b, shift } => {
                ((bus.read(&a) & a.mask) >> shift) & bus.read(&b) & b.mask != 0
            }
            Check::Unmasked { flag, mask } => {
                bus.read(&flag) & flag.mask & !(bus.read(&mask) & mask.mask) != 0
            }
            Check::Any(checks) => checks.iter().any(|c| c.holds(bus)),
        }
    }
}

/// One candidate source of a shared slot.
#[derive(Clone, Copy, Debug)]
pub struct Row {
    pub source: u32,
    pub enable: Check,
    pub status: Check,
}

impl Row {
    const fn new(source: u32, enable: Check, status: Check) -> Row {
        Row {
            source,
            enable,
            status,
        }
    }

    const fn flag(source: u32, status: Check) -> Row {
        Row::new(source, Check::Always, status)
    }

    /// Whether the handler of this row should run.
    pub fn fires<B: PeripheralBus + ?Sized>(&self, bus: &B, routing: u32) -> bool {
        routing & interrupts::route_mask(self.source) != 0
            && self.enable.holds(bus)
            && self.status.holds(bus)
    }
}

/* Peripheral register addresses */

const INTC_EIFR: usize = 0x4005_1054;

const DMA1_BASE: usize = 0x4005_3000;
const DMA2_BASE: usize = 0x4005_3400;
const DMA_INTSTAT0: usize = 0x04;
const DMA_INTSTAT1: usize = 0x08;
const DMA_INTMASK0: usize = 0x0C;
const DMA_INTMASK1: usize = 0x10;
const fn dma_chctl(base: usize, ch: usize) -> usize {
    base + 0x5C + 0x40 * ch
}
const DMA_CHCTL_IE: u32 = 1 << 12;

const EFM_FSR: usize = 0x4001_0410;
const EFM_FITE: usize = 0x4001_0418;
const QSPI_SR: usize = 0x9C00_000C;
const DCU1_BASE: usize = 0x4005_2000;
const DCU_FLAG: usize = 0x04;
const DCU_INTSEL: usize = 0x18;

const TMR01_BASE: usize = 0x4002_4000;
const TMR02_BASE: usize = 0x4002_4400;
const TMR0_BCONR: usize = 0x10;
const TMR0_STFLR: usize = 0x14;

const SYSREG_BASE: usize = 0x4005_4000;
const CMU_XTALSTDCR: usize = SYSREG_BASE + 0x040;
const CMU_XTALSTDSR: usize = SYSREG_BASE + 0x041;
const PWR_PVDCR1: usize = SYSREG_BASE + 0x413;
const PWR_PVDDSR: usize = SYSREG_BASE + 0x417;
const WKTM_CR: usize = 0x4004_C000;
const SWDT_SR: usize = 0x4004_9404;
const WDT_SR: usize = 0x4004_9004;

const TMR61_BASE: usize = 0x4001_8000;
const TMR62_BASE: usize = 0x4001_8400;
const TMR63_BASE: usize = 0x4001_8800;
const TMR6_ICONR: usize = 0x54;
const TMR6_STFLR: usize = 0x70;

const TMRA1_BASE: usize = 0x4001_5000;
const TMRA_BCSTR: usize = 0x80;
const TMRA_ICONR: usize = 0x90;
const TMRA_STFLR: usize = 0x9C;
const fn tmra(unit: usize) -> usize {
    TMRA1_BASE + 0x400 * (unit - 1)
}

const USBFS_BASE: usize = 0x400C_0000;
const USBFS_GAHBCFG: usize = USBFS_BASE + 0x008;
const USBFS_GINTSTS: usize = USBFS_BASE + 0x014;
const USBFS_GINTMSK: usize = USBFS_BASE + 0x018;

const USART1_BASE: usize = 0x4001_D000;
const USART2_BASE: usize = 0x4001_D400;
const USART3_BASE: usize = 0x4002_1000;
const USART4_BASE: usize = 0x4002_1400;
const USART_SR: usize = 0x00;
const USART_CR1: usize = 0x0C;

const SPI1_BASE: usize = 0x4001_C000;
const SPI2_BASE: usize = 0x4001_C400;
const SPI3_BASE: usize = 0x4002_0000;
const SPI4_BASE: usize = 0x4002_0400;
const SPI_CR1: usize = 0x04;
const SPI_SR: usize = 0x14;

const TMR41_BASE: usize = 0x4001_7000;
const TMR42_BASE: usize = 0x4002_4800;
const TMR43_BASE: usize = 0x4002_4C00;
const TMR4_CCSR: usize = 0x48;
const TMR4_OCSRU: usize = 0x60;
const TMR4_OCSRV: usize = 0x64;
const TMR4_OCSRW: usize = 0x68;
const TMR4_RCSR: usize = 0xA4;

const EMB1_BASE: usize = 0x4001_7C00;
const EMB_STAT: usize = 0x0C;
const EMB_INTEN: usize = 0x14;

const I2S1_BASE: usize = 0x4001_E000;
const I2S2_BASE: usize = 0x4001_E400;
const I2S3_BASE: usize = 0x4002_2000;
const I2S4_BASE: usize = 0x4002_2400;
const I2S_CTRL: usize = 0x00;
const I2S_SR: usize = 0x04;
const I2S_ER: usize = 0x08;

const I2C1_BASE: usize = 0x4004_E000;
const I2C2_BASE: usize = 0x4004_E400;
const I2C3_BASE: usize = 0x4004_E800;
const I2C_CR2: usize = 0x04;
const I2C_SR: usize = 0x14;

const FCM_RIER: usize = 0x4004_8418;
const FCM_SR: usize = 0x4004_841C;

const ADC1_BASE: usize = 0x4004_0000;
const ADC2_BASE: usize = 0x4004_0400;
const ADC_ISR: usize = 0x46;
const ADC_ICR: usize = 0x47;
const ADC_AWDCR: usize = 0xA0;
const ADC_AWDSR0: usize = 0xAC;
const ADC_AWDSR1: usize = 0xAE;

const SDIOC1_BASE: usize = 0x4006_FC00;
const SDIOC2_BASE: usize = 0x4007_0000;
const SDIOC_NORINTST: usize = 0x30;
const SDIOC_ERRINTST: usize = 0x32;
const SDIOC_NORINTSGEN: usize = 0x38;
const SDIOC_ERRINTSGEN: usize = 0x3A;

const CAN_BASE: usize = 0x4007_0400;
const CAN_RTIE: usize = CAN_BASE + 0xA4;
const CAN_RTIF: usize = CAN_BASE + 0xA5;
const CAN_ERRINT: usize = CAN_BASE + 0xA6;
const CAN_TTCFG: usize = CAN_BASE + 0xBF;

/* Row builders for peripherals with several instances */

const fn eirq_rows() -> [Row; 16] {
    let mut rows = [Row::flag(0, Check::Always); 16];
    let mut ch = 0;
    while ch < 16 {
        rows[ch] = Row::flag(
            EIRQ0 + ch as u32,
            Check::Set(Field::word(INTC_EIFR, 1 << ch)),
        );
        ch += 1;
    }
    rows
}

/// Rows of a DMA unit in channel order. Each channel contributes its
/// transfer-complete, block-transfer-complete and error rows, all gated by the
/// channel's `CHCTL.IE`. The error rows of the four channels share one source,
/// so its handler runs once per channel in error.
const fn dma_rows(base: usize, tc0: u32, btc0: u32, err: u32) -> [Row; 12] {
    let mut rows = [Row::flag(0, Check::Always); 12];
    let mut ch = 0;
    while ch < 4 {
        let ie = Field::word(dma_chctl(base, ch), DMA_CHCTL_IE);
        rows[3 * ch] = Row::new(
            tc0 + ch as u32,
            Check::SetClear(ie, Field::word(base + DMA_INTMASK1, 1 << ch)),
            Check::Set(Field::word(base + DMA_INTSTAT1, 1 << ch)),
        );
        rows[3 * ch + 1] = Row::new(
            btc0 + ch as u32,
            Check::SetClear(ie, Field::word(base + DMA_INTMASK1, 1 << (16 + ch))),
            Check::Set(Field::word(base + DMA_INTSTAT1, 1 << (16 + ch))),
        );
        rows[3 * ch + 2] = Row::new(
            err,
            Check::Set(ie),
            Check::Unmasked {
                flag: Field::word(base + DMA_INTSTAT0, 0x0001_0001 << ch),
                mask: Field::word(base + DMA_INTMASK0, 0x0001_0001 << ch),
            },
        );
        ch += 1;
    }
    rows
}

const fn dcu_rows() -> [Row; 4] {
    let mut rows = [Row::flag(0, Check::Always); 4];
    let mut unit = 0;
    while unit < 4 {
        let base = DCU1_BASE + 0x400 * unit;
        rows[unit] = Row::flag(
            DCU1 + unit as u32,
            Check::Overlap {
                a: Field::word(base + DCU_INTSEL, 0x7F),
                b: Field::word(base + DCU_FLAG, 0x7F),
                shift: 0,
            },
        );
        unit += 1;
    }
    rows
}

const fn tmr0_rows(base: usize, first: u32) -> [Row; 2] {
    [
        Row::new(
            first,
            Check::Set(Field::word(base + TMR0_BCONR, 1 << 2)),
            Check::Set(Field::word(base + TMR0_STFLR, 1 << 0)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::word(base + TMR0_BCONR, 1 << 18)),
            Check::Set(Field::word(base + TMR0_STFLR, 1 << 16)),
        ),
    ]
}

/// Compare A-F, overflow, underflow and dead time, then the two up/down
/// compare-match pairs whose enables sit seven bits above their flags.
const fn timer6_rows(base: usize, first: u32) -> [Row; 11] {
    let mut rows = [Row::flag(0, Check::Always); 11];
    let mut k = 0;
    while k < 9 {
        rows[k] = Row::new(
            first + k as u32,
            Check::Set(Field::word(base + TMR6_ICONR, 1 << k)),
            Check::Set(Field::word(base + TMR6_STFLR, 1 << k)),
        );
        k += 1;
    }
    rows[9] = Row::flag(
        first + 11,
        Check::Overlap {
            a: Field::word(base + TMR6_ICONR, (1 << 16) | (1 << 17)),
            b: Field::word(base + TMR6_STFLR, (1 << 9) | (1 << 10)),
            shift: 7,
        },
    );
    rows[10] = Row::flag(
        first + 12,
        Check::Overlap {
            a: Field::word(base + TMR6_ICONR, (1 << 18) | (1 << 19)),
            b: Field::word(base + TMR6_STFLR, (1 << 11) | (1 << 12)),
            shift: 7,
        },
    );
    rows
}

const fn timera_rows(base: usize, first: u32) -> [Row; 3] {
    [
        Row::new(
            first,
            Check::Set(Field::word(base + TMRA_BCSTR, 1 << 12)),
            Check::Set(Field::word(base + TMRA_BCSTR, 1 << 14)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::word(base + TMRA_BCSTR, 1 << 13)),
            Check::Set(Field::word(base + TMRA_BCSTR, 1 << 15)),
        ),
        Row::flag(
            first + 2,
            Check::Overlap {
                a: Field::word(base + TMRA_ICONR, 0xFF),
                b: Field::word(base + TMRA_STFLR, 0xFF),
                shift: 0,
            },
        ),
    ]
}

/// Receive error, receive end, transmit empty, transmit end and receive
/// timeout.
const fn usart_rows(base: usize, first: u32) -> [Row; 5] {
    let sr = base + USART_SR;
    let cr1 = base + USART_CR1;
    [
        Row::new(
            first,
            Check::Set(Field::word(cr1, 1 << 5)),
            Check::Set(Field::word(sr, (1 << 0) | (1 << 1) | (1 << 3))),
        ),
        Row::flag(
            first + 1,
            Check::Overlap {
                a: Field::word(cr1, 1 << 5),
                b: Field::word(sr, 1 << 5),
                shift: 0,
            },
        ),
        Row::new(
            first + 2,
            Check::Set(Field::word(cr1, 1 << 7)),
            Check::Set(Field::word(sr, 1 << 7)),
        ),
        Row::new(
            first + 3,
            Check::Set(Field::word(cr1, 1 << 6)),
            Check::Set(Field::word(sr, 1 << 6)),
        ),
        Row::new(
            first + 4,
            Check::Set(Field::word(cr1, 1 << 1)),
            Check::Set(Field::word(sr, 1 << 8)),
        ),
    ]
}

/// Receive full, transmit empty, idle and error.
const fn spi_rows(base: usize, first: u32) -> [Row; 4] {
    let cr1 = base + SPI_CR1;
    let sr = base + SPI_SR;
    [
        Row::new(
            first,
            Check::Set(Field::word(cr1, 1 << 10)),
            Check::Set(Field::word(sr, 1 << 7)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::word(cr1, 1 << 9)),
            Check::Set(Field::word(sr, 1 << 5)),
        ),
        Row::new(
            first + 2,
            Check::Set(Field::word(cr1, 1 << 11)),
            Check::Clear(Field::word(sr, 1 << 1)),
        ),
        Row::new(
            first + 3,
            Check::Set(Field::word(cr1, 1 << 8)),
            Check::Set(Field::word(sr, (1 << 0) | (1 << 2) | (1 << 3) | (1 << 4))),
        ),
    ]
}

/// Compare match U/V/W high and low, overflow, underflow, then the three
/// reload matches whose interrupt bits are mask bits (clear means enabled).
const fn timer4_rows(base: usize, first: u32) -> [Row; 11] {
    let ocsr = [TMR4_OCSRU, TMR4_OCSRV, TMR4_OCSRW];
    let mut rows = [Row::flag(0, Check::Always); 11];
    let mut ch = 0;
    while ch < 3 {
        let reg = base + ocsr[ch];
        rows[2 * ch] = Row::new(
            first + 2 * ch as u32,
            Check::Set(Field::half(reg, 1 << 4)),
            Check::Set(Field::half(reg, 1 << 6)),
        );
        rows[2 * ch + 1] = Row::new(
            first + 2 * ch as u32 + 1,
            Check::Set(Field::half(reg, 1 << 5)),
            Check::Set(Field::half(reg, 1 << 7)),
        );
        ch += 1;
    }
    rows[6] = Row::new(
        first + 6,
        Check::Set(Field::half(base + TMR4_CCSR, 1 << 8)),
        Check::Set(Field::half(base + TMR4_CCSR, 1 << 9)),
    );
    rows[7] = Row::new(
        first + 7,
        Check::Set(Field::half(base + TMR4_CCSR, 1 << 13)),
        Check::Set(Field::half(base + TMR4_CCSR, 1 << 14)),
    );
    let mut ch = 0;
    while ch < 3 {
        rows[8 + ch] = Row::new(
            first + 8 + ch as u32,
            Check::Clear(Field::half(base + TMR4_RCSR, 1 << ch)),
            Check::Set(Field::half(base + TMR4_RCSR, 1 << (4 + 4 * ch))),
        );
        ch += 1;
    }
    rows
}

const fn emb_rows() -> [Row; 4] {
    let mut rows = [Row::flag(0, Check::Always); 4];
    let mut group = 0;
    while group < 4 {
        let base = EMB1_BASE + 0x20 * group;
        rows[group] = Row::flag(
            EMB_GR0 + group as u32,
            Check::Overlap {
                a: Field::word(base + EMB_STAT, 0xF),
                b: Field::word(base + EMB_INTEN, 0xF),
                shift: 0,
            },
        );
        group += 1;
    }
    rows
}

/// Transmit, receive and error.
const fn i2s_rows(base: usize, first: u32) -> [Row; 3] {
    let ctrl = base + I2S_CTRL;
    [
        Row::new(
            first,
            Check::Set(Field::word(ctrl, 1 << 1)),
            Check::Set(Field::word(base + I2S_SR, 1 << 0)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::word(ctrl, 1 << 3)),
            Check::Set(Field::word(base + I2S_SR, 1 << 1)),
        ),
        Row::new(
            first + 2,
            Check::Set(Field::word(ctrl, 1 << 4)),
            Check::Set(Field::word(base + I2S_ER, 0x3)),
        ),
    ]
}

/// Receive full, transmit empty, transmit end and error.
const fn i2c_rows(base: usize, first: u32) -> [Row; 4] {
    let cr2 = base + I2C_CR2;
    let sr = base + I2C_SR;
    [
        Row::new(
            first,
            Check::Set(Field::word(cr2, 1 << 6)),
            Check::Set(Field::word(sr, 1 << 6)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::word(cr2, 1 << 7)),
            Check::Set(Field::word(sr, 1 << 7)),
        ),
        Row::new(
            first + 2,
            Check::Set(Field::word(cr2, 1 << 5)),
            Check::Set(Field::word(sr, 1 << 5)),
        ),
        Row::flag(
            first + 3,
            Check::Overlap {
                a: Field::word(cr2, 0x00F0_5217),
                b: Field::word(sr, 0x00F0_5217),
                shift: 0,
            },
        ),
    ]
}

const fn adc_eoc_rows(base: usize, first: u32) -> [Row; 2] {
    [
        Row::new(
            first,
            Check::Set(Field::byte(base + ADC_ICR, 1 << 0)),
            Check::Set(Field::byte(base + ADC_ISR, 1 << 0)),
        ),
        Row::new(
            first + 1,
            Check::Set(Field::byte(base + ADC_ICR, 1 << 1)),
            Check::Set(Field::byte(base + ADC_ISR, 1 << 1)),
        ),
    ]
}

/* Per-slot tables */

static EIRQ_ROWS: [Row; 16] = eirq_rows();

static DMA1_ROWS: [Row; 12] = dma_rows(DMA1_BASE, DMA1_TC0, DMA1_BTC0, DMA1_ERR);
static DMA2_ROWS: [Row; 12] = dma_rows(DMA2_BASE, DMA2_TC0, DMA2_BTC0, DMA2_ERR);
static EFM_QSPI_ROWS: [Row; 4] = [
    Row::new(
        EFM_PEERR,
        Check::Set(Field::word(EFM_FITE, 1 << 0)),
        Check::Set(Field::word(EFM_FSR, 0xF)),
    ),
    Row::new(
        EFM_COLERR,
        Check::Set(Field::word(EFM_FITE, 1 << 2)),
        Check::Set(Field::word(EFM_FSR, 1 << 5)),
    ),
    Row::new(
        EFM_OPTEND,
        Check::Set(Field::word(EFM_FITE, 1 << 1)),
        Check::Set(Field::word(EFM_FSR, 1 << 4)),
    ),
    Row::flag(QSPI_INTR, Check::Set(Field::word(QSPI_SR, 1 << 7))),
];
static DCU_ROWS: [Row; 4] = dcu_rows();

static TMR01_ROWS: [Row; 2] = tmr0_rows(TMR01_BASE, TMR01_GCMA);
static TMR02_ROWS: [Row; 2] = tmr0_rows(TMR02_BASE, TMR02_GCMA);
static CLOCK_WDT_ROWS: [Row; 3] = [
    Row::new(
        XTAL_STOP,
        Check::Set(Field::byte(CMU_XTALSTDCR, 1 << 0)),
        Check::Set(Field::byte(CMU_XTALSTDSR, 1 << 0)),
    ),
    Row::flag(WKTM_PRD, Check::Set(Field::half(WKTM_CR, 1 << 12))),
    Row::flag(
        SWDT_REFUDF,
        Check::Set(Field::word(SWDT_SR, (1 << 16) | (1 << 17))),
    ),
];

static TMR61_ROWS: [Row; 11] = timer6_rows(TMR61_BASE, TMR61_GCMA);
static TMR62_ROWS: [Row; 11] = timer6_rows(TMR62_BASE, TMR62_GCMA);
static TMR63_ROWS: [Row; 11] = timer6_rows(TMR63_BASE, TMR63_GCMA);

static TMRA1_ROWS: [Row; 3] = timera_rows(tmra(1), TMRA1_OVF);
static TMRA2_ROWS: [Row; 3] = timera_rows(tmra(2), TMRA2_OVF);
static TMRA3_ROWS: [Row; 3] = timera_rows(tmra(3), TMRA3_OVF);
static TMRA4_ROWS: [Row; 3] = timera_rows(tmra(4), TMRA4_OVF);
static TMRA5_ROWS: [Row; 3] = timera_rows(tmra(5), TMRA5_OVF);
static TMRA6_ROWS: [Row; 3] = timera_rows(tmra(6), TMRA6_OVF);
static USBFS_ROWS: [Row; 1] = [Row::new(
    USBFS_GLB,
    Check::Set(Field::word(USBFS_GAHBCFG, 1 << 0)),
    Check::Overlap {
        a: Field::word(USBFS_GINTMSK, 0xF77C_FCFB),
        b: Field::word(USBFS_GINTSTS, 0xFFFF_FFFF),
        shift: 0,
    },
)];
static USART1_ROWS: [Row; 5] = usart_rows(USART1_BASE, USART1_EI);
static USART2_ROWS: [Row; 5] = usart_rows(USART2_BASE, USART2_EI);

static USART3_ROWS: [Row; 5] = usart_rows(USART3_BASE, USART3_EI);
static USART4_ROWS: [Row; 5] = usart_rows(USART4_BASE, USART4_EI);
static SPI1_ROWS: [Row; 4] = spi_rows(SPI1_BASE, SPI1_SPRI);
static SPI2_ROWS: [Row; 4] = spi_rows(SPI2_BASE, SPI2_SPRI);
static SPI3_ROWS: [Row; 4] = spi_rows(SPI3_BASE, SPI3_SPRI);
static SPI4_ROWS: [Row; 4] = spi_rows(SPI4_BASE, SPI4_SPRI);

static TMR41_ROWS: [Row; 11] = timer4_rows(TMR41_BASE, TMR41_GCMUH);
static TMR42_ROWS: [Row; 11] = timer4_rows(TMR42_BASE, TMR42_GCMUH);
static TMR43_ROWS: [Row; 11] = timer4_rows(TMR43_BASE, TMR43_GCMUH);

static EMB_ROWS: [Row; 4] = emb_rows();
static I2S1_ROWS: [Row; 3] = i2s_rows(I2S1_BASE, I2S1_TXIRQOUT);
static I2S2_ROWS: [Row; 3] = i2s_rows(I2S2_BASE, I2S2_TXIRQOUT);
static I2S3_ROWS: [Row; 3] = i2s_rows(I2S3_BASE, I2S3_TXIRQOUT);
static I2S4_ROWS: [Row; 3] = i2s_rows(I2S4_BASE, I2S4_TXIRQOUT);

static I2C1_ROWS: [Row; 4] = i2c_rows(I2C1_BASE, I2C1_RXI);
static I2C2_ROWS: [Row; 4] = i2c_rows(I2C2_BASE, I2C2_RXI);
static I2C3_ROWS: [Row; 4] = i2c_rows(I2C3_BASE, I2C3_RXI);
static PVD_FCM_WDT_ROWS: [Row; 6] = [
    Row::new(
        PVD1,
        Check::Set(Field::byte(PWR_PVDCR1, 1 << 0)),
        Check::Set(Field::byte(PWR_PVDDSR, 1 << 1)),
    ),
    Row::new(
        PVD2,
        Check::Set(Field::byte(PWR_PVDCR1, 1 << 4)),
        Check::Set(Field::byte(PWR_PVDDSR, 1 << 5)),
    ),
    Row::new(
        FCMFERRI,
        Check::Set(Field::word(FCM_RIER, 1 << 0)),
        Check::Set(Field::word(FCM_SR, 1 << 0)),
    ),
    Row::new(
        FCMMENDI,
        Check::Set(Field::word(FCM_RIER, 1 << 1)),
        Check::Set(Field::word(FCM_SR, 1 << 1)),
    ),
    Row::new(
        FCMCOVFI,
        Check::Set(Field::word(FCM_RIER, 1 << 2)),
        Check::Set(Field::word(FCM_SR, 1 << 2)),
    ),
    Row::flag(
        WDT_REFUDF,
        Check::Set(Field::word(WDT_SR, (1 << 16) | (1 << 17))),
    ),
];

static ADC1_EOC_ROWS: [Row; 2] = adc_eoc_rows(ADC1_BASE, ADC1_EOCA);
// Channel and sequence compare share one window-compare flag pair.
static ADC1_AWD_FLAGS: [Check; 2] = [
    Check::Set(Field::half(ADC1_BASE + ADC_AWDSR1, 1 << 0)),
    Check::Set(Field::half(ADC1_BASE + ADC_AWDSR0, 0xFFFF)),
];
static ADC1_AWD_ROWS: [Row; 2] = [
    Row::new(
        ADC1_CHCMP,
        Check::Set(Field::half(ADC1_BASE + ADC_AWDCR, 1 << 8)),
        Check::Any(&ADC1_AWD_FLAGS),
    ),
    Row::new(
        ADC1_SEQCMP,
        Check::Set(Field::half(ADC1_BASE + ADC_AWDCR, 1 << 8)),
        Check::Any(&ADC1_AWD_FLAGS),
    ),
];
static ADC2_EOC_ROWS: [Row; 2] = adc_eoc_rows(ADC2_BASE, ADC2_EOCA);
static ADC2_AWD_ROWS: [Row; 2] = [
    Row::new(
        ADC2_CHCMP,
        Check::Set(Field::half(ADC2_BASE + ADC_AWDCR, 1 << 8)),
        Check::Set(Field::half(ADC2_BASE + ADC_AWDSR0, 0x1FF)),
    ),
    Row::new(
        ADC2_SEQCMP,
        Check::Set(Field::half(ADC2_BASE + ADC_AWDCR, 1 << 8)),
        Check::Set(Field::half(ADC2_BASE + ADC_AWDSR0, 0x1FF)),
    ),
];

static SDIOC1_FLAGS: [Check; 2] = [
    Check::Overlap {
        a: Field::half(SDIOC1_BASE + SDIOC_NORINTST, 0x1F7),
        b: Field::half(SDIOC1_BASE + SDIOC_NORINTSGEN, 0xFFFF),
        shift: 0,
    },
    Check::Overlap {
        a: Field::half(SDIOC1_BASE + SDIOC_ERRINTST, 0x17F),
        b: Field::half(SDIOC1_BASE + SDIOC_ERRINTSGEN, 0xFFFF),
        shift: 0,
    },
];
static SDIOC2_FLAGS: [Check; 2] = [
    Check::Overlap {
        a: Field::half(SDIOC2_BASE + SDIOC_NORINTST, 0x1F7),
        b: Field::half(SDIOC2_BASE + SDIOC_NORINTSGEN, 0xFFFF),
        shift: 0,
    },
    Check::Overlap {
        a: Field::half(SDIOC2_BASE + SDIOC_ERRINTST, 0x17F),
        b: Field::half(SDIOC2_BASE + SDIOC_ERRINTSGEN, 0xFFFF),
        shift: 0,
    },
];
// Each error pair of ERRINT and TTCFG is a flag next to its enable.
static CAN_FLAGS: [Check; 8] = [
    Check::Set(Field::byte(CAN_TTCFG, 1 << 5)),
    Check::Set(Field::byte(CAN_RTIF, 1 << 0)),
    Check::Overlap {
        a: Field::byte(CAN_RTIF, 0xFE),
        b: Field::byte(CAN_RTIE, 0xFF),
        shift: 0,
    },
    Check::AllSet(Field::byte(CAN_ERRINT, 0x03)),
    Check::AllSet(Field::byte(CAN_ERRINT, 0x0C)),
    Check::AllSet(Field::byte(CAN_ERRINT, 0x30)),
    Check::AllSet(Field::byte(CAN_TTCFG, 0x18)),
    Check::AllSet(Field::byte(CAN_TTCFG, 0xC0)),
];
static SDIO_CAN_ROWS: [Row; 3] = [
    Row::flag(
        SDIOC1_SD,
        Check::Any(&SDIOC1_FLAGS),
    ),
    Row::flag(
        SDIOC2_SD,
        Check::Any(&SDIOC2_FLAGS),
    ),
    Row::flag(CAN_INT, Check::Any(&CAN_FLAGS)),
];

/// Candidate rows of every shared slot, indexed by `slot - 128`, in
/// dispatch order.
static SHARED_TABLE: [&[&[Row]]; 16] = [
    &[&EIRQ_ROWS],
    &[&DMA1_ROWS, &DMA2_ROWS, &EFM_QSPI_ROWS, &DCU_ROWS],
    &[&TMR01_ROWS, &TMR02_ROWS, &CLOCK_WDT_ROWS],
    &[&TMR61_ROWS, &TMR62_ROWS],
    &[&TMR63_ROWS],
    &[],
    &[],
    &[],
    &[
        &TMRA1_ROWS,
        &TMRA2_ROWS,
        &TMRA3_ROWS,
        &TMRA4_ROWS,
        &TMRA5_ROWS,
        &TMRA6_ROWS,
        &USBFS_ROWS,
        &USART1_ROWS,
        &USART2_ROWS,
    ],
    &[
        &USART3_ROWS,
        &USART4_ROWS,
        &SPI1_ROWS,
        &SPI2_ROWS,
        &SPI3_ROWS,
        &SPI4_ROWS,
    ],
    &[&TMR41_ROWS, &TMR42_ROWS],
    &[&TMR43_ROWS],
    &[&EMB_ROWS, &I2S1_ROWS, &I2S2_ROWS, &I2S3_ROWS, &I2S4_ROWS],
    &[&I2C1_ROWS, &I2C2_ROWS, &I2C3_ROWS, &PVD_FCM_WDT_ROWS],
    &[&ADC1_EOC_ROWS, &ADC1_AWD_ROWS, &ADC2_EOC_ROWS, &ADC2_AWD_ROWS],
    &[&SDIO_CAN_ROWS],
];

/// Candidate rows of shared `slot` in dispatch order. Empty for any other
/// slot.
pub fn rows(slot: u32) -> impl Iterator<Item = &'static Row> {
    let groups: &'static [&'static [Row]] = slot
        .checked_sub(128)
        .and_then(|i| SHARED_TABLE.get(i as usize))
        .copied()
        .unwrap_or(&[]);
    groups.iter().flat_map(|group| group.iter())
}

/// Candidate sources of shared `slot` in dispatch order, each listed once.
pub fn sources(slot: u32) -> impl Iterator<Item = u32> {
    rows(slot)
        .enumerate()
        .filter(move |&(i, row)| rows(slot).take(i).all(|r| r.source != row.source))
        .map(|(_, row)| row.source)
}

#[allow(clippy::declare_interior_mutable_const)]
const UNBOUND: Cell<Option<fn()>> = Cell::new(None);

/// Handlers of the shared sources, one per source number.
pub struct SharedHandlers {
    handlers: [Cell<Option<fn()>>; interrupts::NUM_SOURCES as usize],
}

impl SharedHandlers {
    pub const fn new() -> SharedHandlers {
        SharedHandlers {
            handlers: [UNBOUND; interrupts::NUM_SOURCES as usize],
        }
    }

    /// Bind `handler` to `source`. Returns `false` if `source` has no routing
    /// bit.
    pub fn bind(&self, source: u32, handler: fn()) -> bool {
        match self.handlers.get(source as usize) {
            Some(cell) => {
                cell.set(Some(handler));
                true
            }
            None => false,
        }
    }

    pub fn unbind(&self, source: u32) {
        if let Some(cell) = self.handlers.get(source as usize) {
            cell.set(None);
        }
    }

    pub fn get(&self, source: u32) -> Option<fn()> {
        self.handlers.get(source as usize).and_then(Cell::get)
    }

    /// Run the handlers of every candidate of `slot` that is routed, enabled
    /// and flagged, in table order. Returns how many handlers ran.
    pub fn dispatch<B: PeripheralBus + ?Sized>(&self, slot: u32, bus: &B, routing: u32) -> usize {
        let mut ran = 0;
        for row in rows(slot) {
            if row.fires(bus, routing) {
                if let Some(handler) = self.get(row.source) {
                    handler();
                    ran += 1;
                }
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    }

    fn record(name: &'static str) {
        CALLS.with(|c| c.borrow_mut().push(name));
    }

    fn take_calls() -> Vec<&'static str> {
        CALLS.with(|c| c.borrow_mut().drain(..).collect())
    }

    fn dma1_tc0() {
        record("dma1_tc0");
    }

    fn dma1_tc1() {
        record("dma1_tc1");
    }

    fn dma1_btc0() {
        record("dma1_btc0");
    }

    fn dma1_err() {
        record("dma1_err");
    }

    fn dma2_btc1() {
        record("dma2_btc1");
    }

    fn usart1_ri() {
        record("usart1_ri");
    }

    fn usart1_ti() {
        record("usart1_ti");
    }

    fn tmr41_rlou() {
        record("tmr41_rlou");
    }

    #[test]
    fn every_row_sits_on_its_sources_slot() {
        for slot in 128..=143 {
            for source in sources(slot) {
                assert_eq!(interrupts::shared_slot(source), slot, "source {}", source);
            }
        }
        assert_eq!(sources(133).count(), 0);
        assert_eq!(sources(127).count(), 0);
        assert_eq!(sources(144).count(), 0);
    }

    #[test]
    fn dma_slot_walks_each_channel_in_turn() {
        let dma1: Vec<u32> = (0..4)
            .flat_map(|ch| [DMA1_TC0 + ch, DMA1_BTC0 + ch])
            .collect();
        let mut expected = vec![dma1[0], dma1[1], DMA1_ERR];
        expected.extend_from_slice(&dma1[2..]);
        expected.extend([DMA2_TC0, DMA2_BTC0, DMA2_ERR]);
        expected.extend((1..4).flat_map(|ch| [DMA2_TC0 + ch, DMA2_BTC0 + ch]));
        expected.extend([EFM_PEERR, EFM_COLERR, EFM_OPTEND, QSPI_INTR]);
        expected.extend([DCU1, DCU2, DCU3, DCU4]);
        assert_eq!(sources(129).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn other_slots_keep_routing_bit_order() {
        for slot in (128..=143).filter(|&slot| slot != 129) {
            let bits: Vec<u32> = sources(slot).map(|s| s & 31).collect();
            let mut sorted = bits.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(bits, sorted, "slot {}", slot);
        }
    }

    #[test]
    fn block_complete_of_one_channel_runs_before_the_next_channel() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(DMA1_TC1, dma1_tc1);
        handlers.bind(DMA1_BTC0, dma1_btc0);
        handlers.bind(DMA1_ERR, dma1_err);

        bus.set(dma_chctl(DMA1_BASE, 0), DMA_CHCTL_IE);
        bus.set(dma_chctl(DMA1_BASE, 1), DMA_CHCTL_IE);
        bus.set(DMA1_BASE + DMA_INTSTAT1, (1 << 1) | (1 << 16));
        bus.set(DMA1_BASE + DMA_INTSTAT0, 1 << 1);
        let routing = interrupts::route_mask(DMA1_TC1)
            | interrupts::route_mask(DMA1_BTC0)
            | interrupts::route_mask(DMA1_ERR);

        assert_eq!(handlers.dispatch(129, &bus, routing), 3);
        assert_eq!(take_calls(), vec!["dma1_btc0", "dma1_tc1", "dma1_err"]);
    }

    #[test]
    fn dma_error_needs_its_own_channel_enabled() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(DMA1_ERR, dma1_err);
        let routing = interrupts::route_mask(DMA1_ERR);

        bus.set(dma_chctl(DMA1_BASE, 0), DMA_CHCTL_IE);
        bus.set(DMA1_BASE + DMA_INTSTAT0, 1 << 1);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);

        bus.set(dma_chctl(DMA1_BASE, 1), DMA_CHCTL_IE);
        assert_eq!(handlers.dispatch(129, &bus, routing), 1);

        // Errors on two enabled channels run the handler once per channel.
        bus.set(DMA1_BASE + DMA_INTSTAT0, (1 << 1) | (1 << 16));
        assert_eq!(handlers.dispatch(129, &bus, routing), 2);

        bus.set(DMA1_BASE + DMA_INTMASK0, 0x0003_0003);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);
        assert_eq!(take_calls(), vec!["dma1_err"; 3]);
    }

    #[test]
    fn routed_enabled_flagged_source_fires_once() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(DMA1_TC0, dma1_tc0);

        bus.set(dma_chctl(DMA1_BASE, 0), DMA_CHCTL_IE);
        bus.set(DMA1_BASE + DMA_INTSTAT1, 1 << 0);

        let routing = interrupts::route_mask(DMA1_TC0);
        assert_eq!(handlers.dispatch(129, &bus, routing), 1);
        assert_eq!(take_calls(), vec!["dma1_tc0"]);

        // Same flag and enable, routing bit clear.
        assert_eq!(handlers.dispatch(129, &bus, 0), 0);
        assert!(take_calls().is_empty());
    }

    #[test]
    fn masked_or_unflagged_sources_do_not_fire() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(DMA1_TC0, dma1_tc0);
        let routing = interrupts::route_mask(DMA1_TC0);

        bus.set(DMA1_BASE + DMA_INTSTAT1, 1 << 0);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);

        bus.set(dma_chctl(DMA1_BASE, 0), DMA_CHCTL_IE);
        bus.set(DMA1_BASE + DMA_INTMASK1, 1 << 0);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);

        bus.set(DMA1_BASE + DMA_INTMASK1, 0);
        bus.set(DMA1_BASE + DMA_INTSTAT1, 0);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);
        assert!(take_calls().is_empty());
    }

    #[test]
    fn dma2_block_complete_reads_dma2_flags() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(DMA2_BTC1, dma2_btc1);
        let routing = interrupts::route_mask(DMA2_BTC1);

        bus.set(dma_chctl(DMA2_BASE, 1), DMA_CHCTL_IE);
        bus.set(DMA1_BASE + DMA_INTSTAT1, 1 << 17);
        assert_eq!(handlers.dispatch(129, &bus, routing), 0);

        bus.set(DMA2_BASE + DMA_INTSTAT1, 1 << 17);
        assert_eq!(handlers.dispatch(129, &bus, routing), 1);
        assert_eq!(take_calls(), vec!["dma2_btc1"]);
    }

    #[test]
    fn simultaneous_sources_run_in_table_order() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        // Bound in reverse to show binding order does not matter.
        handlers.bind(USART1_TI, usart1_ti);
        handlers.bind(USART1_RI, usart1_ri);

        bus.set(USART1_BASE + USART_CR1, (1 << 5) | (1 << 7));
        bus.set(USART1_BASE + USART_SR, (1 << 5) | (1 << 7));
        let routing = interrupts::route_mask(USART1_RI) | interrupts::route_mask(USART1_TI);

        assert_eq!(handlers.dispatch(136, &bus, routing), 2);
        assert_eq!(take_calls(), vec!["usart1_ri", "usart1_ti"]);
    }

    #[test]
    fn timer4_reload_enable_is_a_mask_bit() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        handlers.bind(TMR41_RLOU, tmr41_rlou);
        let routing = interrupts::route_mask(TMR41_RLOU);

        bus.set(TMR41_BASE + TMR4_RCSR, (1 << 4) | (1 << 0));
        assert_eq!(handlers.dispatch(138, &bus, routing), 0);

        bus.set(TMR41_BASE + TMR4_RCSR, 1 << 4);
        assert_eq!(handlers.dispatch(138, &bus, routing), 1);
        assert_eq!(take_calls(), vec!["tmr41_rlou"]);
    }

    #[test]
    fn unbound_source_is_checked_but_runs_nothing() {
        let bus = MockBus::default();
        let handlers = SharedHandlers::new();
        bus.set(INTC_EIFR, 1 << 3);
        assert!(rows(128).any(|r| r.source == EIRQ3 && r.fires(&bus, 1 << 3)));
        assert_eq!(handlers.dispatch(128, &bus, 1 << 3), 0);
    }

    #[test]
    fn compound_checks() {
        let bus = MockBus::default();
        let timer6_up_a = timer6_rows(TMR61_BASE, TMR61_GCMA)[9];
        assert_eq!(timer6_up_a.source, TMR61_SCMA);
        bus.set(TMR61_BASE + TMR6_ICONR, 1 << 16);
        bus.set(TMR61_BASE + TMR6_STFLR, 1 << 10);
        assert!(!timer6_up_a.status.holds(&bus));
        bus.set(TMR61_BASE + TMR6_STFLR, 1 << 9);
        assert!(timer6_up_a.status.holds(&bus));

        let dma1_err = DMA1_ROWS[2];
        bus.set(DMA1_BASE + DMA_INTSTAT0, 1 << 16);
        bus.set(DMA1_BASE + DMA_INTMASK0, 1 << 16);
        assert!(!dma1_err.status.holds(&bus));
        bus.set(DMA1_BASE + DMA_INTMASK0, 0);
        assert!(dma1_err.status.holds(&bus));

        let can = SDIO_CAN_ROWS[2];
        bus.set(CAN_ERRINT, 0x04);
        assert!(!can.status.holds(&bus));
        bus.set(CAN_ERRINT, 0x0C);
        assert!(can.status.holds(&bus));

        let spi_idle = spi_rows(SPI1_BASE, SPI1_SPRI)[2];
        bus.set(SPI1_BASE + SPI_SR, 1 << 1);
        assert!(!spi_idle.status.holds(&bus));
        bus.set(SPI1_BASE + SPI_SR, 0);
        assert!(spi_idle.status.holds(&bus));
    }

    #[test]
    fn narrow_registers_are_read_at_their_width() {
        let bus = MockBus::default();
        let wktm = CLOCK_WDT_ROWS[1];
        bus.set(WKTM_CR, 0x1_0000);
        assert!(!wktm.status.holds(&bus));
        bus.set(WKTM_CR, 1 << 12);
        assert!(wktm.status.holds(&bus));
    }
}
