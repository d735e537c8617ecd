// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Clock controller (CMU).
//!
//! Controls the seven clock sources, the system clock switch, the bus clock
//! dividers and the function clock gates (FCG).
//!
//! Switching the system clock to or from the MPLL, or changing the dividers
//! while the MPLL drives the system, is done with every peripheral clock gate
//! closed: the gates are saved, closed, the change is made and the gates are
//! reopened, with a settle window after each step.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! cmu.configure_xtal(&XtalConfig::default())?;
//! cmu.enable_oscillator(Oscillator::Xtal, true)?;
//! cmu.configure_mpll(PllSource::Xtal, &PllDividers { m: 1, n: 42, p: 2, q: 7, r: 7 })?;
//! cmu.enable_oscillator(Oscillator::Mpll, true)?;
//! cmu.set_flash_wait_cycles(5)?;
//! cmu.set_system_clock_source(SysClkSource::Mpll);
//! ```

use core::cell::Cell;

use bitflags::bitflags;
use kernel::platform::chip::Processor;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{Field, FieldValue, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;
use log::{debug, warn};

use crate::protect::{EfmUnlocked, Fcg0Unlocked, Protect, Unlocked};
use crate::sysreg::{
    EfmRegisters, MstpRegisters, SysregRegisters, CKSWR, EFM_BASE, FRMC, MCOCFGR, MSTP_BASE,
    OSCSTBSR, OSCSTP, PERICKSEL, PLLCFGR, SCFGR, SYSREG_BASE, TPIUCKCFGR, UFSCKCFGR, XTAL32CFGR,
    XTALCFGR, XTALSTDCR, XTALSTDSR,
};

pub const HRC_HZ: u32 = 16_000_000;
pub const MRC_HZ: u32 = 8_000_000;
pub const LRC_HZ: u32 = 32_768;
pub const XTAL32_HZ: u32 = 32_768;
pub const DEFAULT_XTAL_HZ: u32 = 8_000_000;

/// Polls of a ready flag before giving up with `BUSY`.
const STABLE_TIMEOUT: u32 = 0x1000;
/// Cycles the bus is given after closing or reopening the clock gates and
/// after switching the system clock.
const SETTLE_CYCLES: u32 = 0xB0;
/// Start-up delay of the oscillators that have no ready flag.
const SHORT_DELAY: u32 = 5;

/// Gate values with every peripheral clock stopped. The SRAM gates of FCG0
/// stay open.
const FCG0_CLOSED: u32 = 0xFFFF_FAEE;
const FCG_CLOSED: u32 = 0xFFFF_FFFF;

const USBFS_GATE: u32 = 1 << 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Oscillator {
    Xtal,
    Xtal32,
    Hrc,
    Mrc,
    Lrc,
    Mpll,
    Upll,
}

/// System clock sources, with their `CKSW` encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SysClkSource {
    Hrc = 0,
    Mrc = 1,
    Lrc = 2,
    Xtal = 3,
    Xtal32 = 4,
    Mpll = 5,
}

impl SysClkSource {
    pub fn oscillator(self) -> Oscillator {
        match self {
            SysClkSource::Hrc => Oscillator::Hrc,
            SysClkSource::Mrc => Oscillator::Mrc,
            SysClkSource::Lrc => Oscillator::Lrc,
            SysClkSource::Xtal => Oscillator::Xtal,
            SysClkSource::Xtal32 => Oscillator::Xtal32,
            SysClkSource::Mpll => Oscillator::Mpll,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PllSource {
    Xtal,
    Hrc,
}

/// Dividers and multiplier of a PLL: `out_x = input / m * n / x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllDividers {
    pub m: u32,
    pub n: u32,
    pub p: u32,
    pub q: u32,
    pub r: u32,
}

/// Divider of a bus clock, relative to the system clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ClockDiv {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div32 = 5,
    Div64 = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SysclkDividers {
    pub hclk: ClockDiv,
    pub exck: ClockDiv,
    pub pclk0: ClockDiv,
    pub pclk1: ClockDiv,
    pub pclk2: ClockDiv,
    pub pclk3: ClockDiv,
    pub pclk4: ClockDiv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockFrequencies {
    pub sysclk: u32,
    pub hclk: u32,
    pub exck: u32,
    pub pclk0: u32,
    pub pclk1: u32,
    pub pclk2: u32,
    pub pclk3: u32,
    pub pclk4: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllFrequencies {
    pub mpll_p: u32,
    pub mpll_q: u32,
    pub mpll_r: u32,
    pub upll_p: u32,
    pub upll_q: u32,
    pub upll_r: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XtalMode {
    Oscillator,
    ExternalClock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum XtalDrive {
    High = 0,
    Middle = 1,
    Low = 2,
    UltraLow = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XtalConfig {
    /// Frequency of the crystal or external clock, used for frequency
    /// reporting.
    pub frequency_hz: u32,
    pub mode: XtalMode,
    pub drive: XtalDrive,
    pub super_drive: bool,
}

impl Default for XtalConfig {
    fn default() -> Self {
        XtalConfig {
            frequency_hz: DEFAULT_XTAL_HZ,
            mode: XtalMode::Oscillator,
            drive: XtalDrive::High,
            super_drive: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopAction {
    Interrupt,
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Xtal32Drive {
    Middle = 0,
    High = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Xtal32Filter {
    Off = 0,
    RunOnly = 2,
    Always = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Xtal32Config {
    pub drive: Xtal32Drive,
    pub super_drive: bool,
    pub filter: Xtal32Filter,
}

/// USB 48 MHz clock sources, with their `USBCKS` encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum UsbClock {
    SysclkDiv2 = 2,
    SysclkDiv3 = 3,
    SysclkDiv4 = 4,
    MpllP = 8,
    MpllQ = 9,
    MpllR = 10,
    UpllP = 11,
    UpllQ = 12,
    UpllR = 13,
}

/// Clock of the ADC and TRNG, or of an I2S unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum PeripheralClock {
    Pclk = 0,
    MpllP = 8,
    MpllQ = 9,
    MpllR = 10,
    UpllP = 11,
    UpllQ = 12,
    UpllR = 13,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TpiuDiv {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mco {
    Mco1,
    Mco2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum McoSource {
    Hrc = 0,
    Mrc = 1,
    Lrc = 2,
    Xtal = 3,
    Xtal32 = 4,
    MpllP = 6,
    UpllP = 7,
    MpllQ = 8,
    UpllQ = 9,
    Sysclk = 11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum McoDiv {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div32 = 5,
    Div64 = 6,
    Div128 = 7,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fcg0: u32 {
        const SRAMH = 1 << 0;
        const SRAM12 = 1 << 4;
        const SRAM3 = 1 << 8;
        const SRAMRET = 1 << 10;
        const DMA1 = 1 << 14;
        const DMA2 = 1 << 15;
        const FCM = 1 << 16;
        const AOS = 1 << 17;
        const AES = 1 << 20;
        const HASH = 1 << 21;
        const TRNG = 1 << 22;
        const CRC = 1 << 23;
        const DCU1 = 1 << 24;
        const DCU2 = 1 << 25;
        const DCU3 = 1 << 26;
        const DCU4 = 1 << 27;
        const KEY = 1 << 31;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fcg1: u32 {
        const CAN = 1 << 0;
        const QSPI = 1 << 3;
        const I2C1 = 1 << 4;
        const I2C2 = 1 << 5;
        const I2C3 = 1 << 6;
        const USBFS = 1 << 8;
        const SDIOC1 = 1 << 10;
        const SDIOC2 = 1 << 11;
        const SPI1 = 1 << 16;
        const SPI2 = 1 << 17;
        const SPI3 = 1 << 18;
        const SPI4 = 1 << 19;
        const USART1 = 1 << 24;
        const USART2 = 1 << 25;
        const USART3 = 1 << 26;
        const USART4 = 1 << 27;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fcg2: u32 {
        const TMR01 = 1 << 0;
        const TMR02 = 1 << 1;
        const TMRA1 = 1 << 2;
        const TMRA2 = 1 << 3;
        const TMRA3 = 1 << 4;
        const TMRA4 = 1 << 5;
        const TMRA5 = 1 << 6;
        const TMRA6 = 1 << 7;
        const TMR41 = 1 << 8;
        const TMR42 = 1 << 9;
        const TMR43 = 1 << 10;
        const EMB = 1 << 15;
        const TMR61 = 1 << 16;
        const TMR62 = 1 << 17;
        const TMR63 = 1 << 18;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fcg3: u32 {
        const ADC1 = 1 << 0;
        const ADC2 = 1 << 1;
        const CMP = 1 << 8;
        const OTS = 1 << 12;
    }
}

/// Peripherals of one function clock gate register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fcg {
    Fcg0(Fcg0),
    Fcg1(Fcg1),
    Fcg2(Fcg2),
    Fcg3(Fcg3),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FcgSnapshot([u32; 4]);

/// Clock state saved before a low-power entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ClockBackup {
    source: SysClkSource,
    hrc_on: bool,
    mrc_on: bool,
}

pub struct Cmu<'a, P: Processor> {
    sysreg: StaticRef<SysregRegisters>,
    mstp: StaticRef<MstpRegisters>,
    efm: StaticRef<EfmRegisters>,
    processor: &'a P,
    xtal_hz: Cell<u32>,
}

impl<'a, P: Processor> Cmu<'a, P> {
    pub const fn new(processor: &'a P) -> Self {
        Self::with_registers(SYSREG_BASE, MSTP_BASE, EFM_BASE, processor)
    }

    pub const fn with_registers(
        sysreg: StaticRef<SysregRegisters>,
        mstp: StaticRef<MstpRegisters>,
        efm: StaticRef<EfmRegisters>,
        processor: &'a P,
    ) -> Self {
        Cmu {
            sysreg,
            mstp,
            efm,
            processor,
            xtal_hz: Cell::new(DEFAULT_XTAL_HZ),
        }
    }

    fn delay(&self, cycles: u32) {
        for _ in 0..cycles {
            self.processor.nop();
        }
    }

    fn wait_stable(&self, flag: Field<u8, OSCSTBSR::Register>) -> Result<(), ErrorCode> {
        for _ in 0..STABLE_TIMEOUT {
            if self.sysreg.oscstbsr.is_set(flag) {
                return Ok(());
            }
        }
        Err(ErrorCode::BUSY)
    }

    pub fn system_clock_source(&self) -> SysClkSource {
        match self.sysreg.ckswr.read(CKSWR::CKSW) {
            1 => SysClkSource::Mrc,
            2 => SysClkSource::Lrc,
            3 => SysClkSource::Xtal,
            4 => SysClkSource::Xtal32,
            5 => SysClkSource::Mpll,
            // Reserved encodings read back as the reset source.
            _ => SysClkSource::Hrc,
        }
    }

    pub fn pll_source(&self) -> PllSource {
        if self.sysreg.pllcfgr.is_set(PLLCFGR::PLLSRC) {
            PllSource::Hrc
        } else {
            PllSource::Xtal
        }
    }

    pub fn is_enabled(&self, osc: Oscillator) -> bool {
        !self.control(osc).is_set(OSCSTP::STP)
    }

    fn control(&self, osc: Oscillator) -> &ReadWrite<u8, OSCSTP::Register> {
        match osc {
            Oscillator::Xtal => &self.sysreg.xtalcr,
            Oscillator::Xtal32 => &self.sysreg.xtal32cr,
            Oscillator::Hrc => &self.sysreg.hrccr,
            Oscillator::Mrc => &self.sysreg.mrccr,
            Oscillator::Lrc => &self.sysreg.lrccr,
            Oscillator::Mpll => &self.sysreg.pllcr,
            Oscillator::Upll => &self.sysreg.upllcr,
        }
    }

    /// Ready flag of `osc`, or `None` if it has none and the caller should
    /// assume it runs once enabled.
    pub fn is_stable(&self, osc: Oscillator) -> Option<bool> {
        let flag = match osc {
            Oscillator::Hrc => OSCSTBSR::HRCSTBF,
            Oscillator::Xtal => OSCSTBSR::XTALSTBF,
            Oscillator::Mpll => OSCSTBSR::MPLLSTBF,
            Oscillator::Upll => OSCSTBSR::UPLLSTBF,
            _ => return None,
        };
        Some(self.sysreg.oscstbsr.is_set(flag))
    }

    /// Whether stopping `osc` would stop the system clock.
    fn feeds_system_clock(&self, osc: Oscillator) -> bool {
        let source = self.system_clock_source();
        if source.oscillator() == osc {
            return true;
        }
        let pll_input = match osc {
            Oscillator::Xtal => PllSource::Xtal,
            Oscillator::Hrc => PllSource::Hrc,
            _ => return false,
        };
        source == SysClkSource::Mpll
            && self.is_enabled(Oscillator::Mpll)
            && self.pll_source() == pll_input
    }

    /// Start or stop a clock source.
    ///
    /// Starting waits for the ready flag where the source has one and returns
    /// `BUSY` if it does not rise in time. Stopping the system clock, or the
    /// PLL input while the PLL is the system clock, returns `FAIL`.
    pub fn enable_oscillator(&self, osc: Oscillator, enable: bool) -> Result<(), ErrorCode> {
        if !enable && self.feeds_system_clock(osc) {
            warn!("cmu: refusing to stop {:?}, it drives the system clock", osc);
            return Err(ErrorCode::FAIL);
        }

        {
            let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
            self.control(osc).write(if enable {
                OSCSTP::STP::CLEAR
            } else {
                OSCSTP::STP::SET
            });
        }

        if !enable {
            return Ok(());
        }
        let res = match osc {
            Oscillator::Hrc => self.wait_stable(OSCSTBSR::HRCSTBF),
            Oscillator::Xtal => self.wait_stable(OSCSTBSR::XTALSTBF),
            Oscillator::Mpll => self.wait_stable(OSCSTBSR::MPLLSTBF),
            Oscillator::Upll => self.wait_stable(OSCSTBSR::UPLLSTBF),
            Oscillator::Xtal32 | Oscillator::Mrc | Oscillator::Lrc => {
                self.delay(SHORT_DELAY);
                Ok(())
            }
        };
        if res.is_err() {
            warn!("cmu: {:?} did not become stable", osc);
        }
        res
    }

    fn close_gates(&self) -> FcgSnapshot {
        let snapshot = FcgSnapshot([
            self.mstp.fcg0.get(),
            self.mstp.fcg1.get(),
            self.mstp.fcg2.get(),
            self.mstp.fcg3.get(),
        ]);
        {
            let _fcg0 = Fcg0Unlocked::new(self.mstp);
            self.mstp.fcg0.set(FCG0_CLOSED);
        }
        self.mstp.fcg1.set(FCG_CLOSED);
        self.mstp.fcg2.set(FCG_CLOSED);
        self.mstp.fcg3.set(FCG_CLOSED);
        self.delay(SETTLE_CYCLES);
        snapshot
    }

    fn reopen_gates(&self, snapshot: FcgSnapshot) {
        let [fcg0, fcg1, fcg2, fcg3] = snapshot.0;
        {
            let _fcg0 = Fcg0Unlocked::new(self.mstp);
            self.mstp.fcg0.set(fcg0);
        }
        self.mstp.fcg1.set(fcg1);
        self.mstp.fcg2.set(fcg2);
        self.mstp.fcg3.set(fcg3);
        self.delay(SETTLE_CYCLES);
    }

    /// Run `f` with every peripheral clock gated if `gated` is set.
    fn with_gates_closed<R>(&self, gated: bool, f: impl FnOnce() -> R) -> R {
        if !gated {
            return f();
        }
        let snapshot = self.close_gates();
        let res = f();
        self.delay(SETTLE_CYCLES);
        self.reopen_gates(snapshot);
        res
    }

    /// Switch the system clock. The target source must already be running.
    pub fn set_system_clock_source(&self, target: SysClkSource) {
        let current = self.system_clock_source();
        let gated = current == SysClkSource::Mpll || target == SysClkSource::Mpll;
        self.with_gates_closed(gated, || {
            let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
            self.sysreg.ckswr.write(CKSWR::CKSW.val(target as u8));
        });
        debug!("cmu: system clock {:?} -> {:?}", current, target);
    }

    pub fn configure_sysclk_dividers(&self, div: &SysclkDividers) {
        let gated = self.system_clock_source() == SysClkSource::Mpll;
        self.with_gates_closed(gated, || {
            let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
            self.sysreg.scfgr.write(
                SCFGR::HCLKS.val(div.hclk as u32)
                    + SCFGR::EXCKS.val(div.exck as u32)
                    + SCFGR::PCLK0S.val(div.pclk0 as u32)
                    + SCFGR::PCLK1S.val(div.pclk1 as u32)
                    + SCFGR::PCLK2S.val(div.pclk2 as u32)
                    + SCFGR::PCLK3S.val(div.pclk3 as u32)
                    + SCFGR::PCLK4S.val(div.pclk4 as u32),
            );
        });
    }

    /// Open (`enable`) or close the clock gates of the given peripherals.
    pub fn set_fcg(&self, gate: Fcg, enable: bool) {
        let (reg, bits) = match gate {
            Fcg::Fcg0(bits) => (&self.mstp.fcg0, bits.bits()),
            Fcg::Fcg1(bits) => (&self.mstp.fcg1, bits.bits()),
            Fcg::Fcg2(bits) => (&self.mstp.fcg2, bits.bits()),
            Fcg::Fcg3(bits) => (&self.mstp.fcg3, bits.bits()),
        };
        // A set bit stops the clock.
        let value = if enable {
            reg.get() & !bits
        } else {
            reg.get() | bits
        };
        match gate {
            Fcg::Fcg0(_) => {
                let _fcg0 = Fcg0Unlocked::new(self.mstp);
                reg.set(value);
            }
            _ => reg.set(value),
        }
    }

    fn pll_input_hz(&self, source: PllSource) -> u32 {
        match source {
            PllSource::Xtal => self.xtal_hz.get(),
            PllSource::Hrc => HRC_HZ,
        }
    }

    fn check_pll(&self, source: PllSource, div: &PllDividers) -> Result<(), ErrorCode> {
        let in_range = (1..=24).contains(&div.m)
            && (20..=480).contains(&div.n)
            && [div.p, div.q, div.r].iter().all(|d| (2..=16).contains(d));
        if !in_range {
            return Err(ErrorCode::INVAL);
        }
        let vco_in = self.pll_input_hz(source) / div.m;
        let vco = u64::from(vco_in) * u64::from(div.n);
        if !(1_000_000..=24_000_000).contains(&vco_in) || !(240_000_000..=480_000_000).contains(&vco)
        {
            return Err(ErrorCode::INVAL);
        }
        Ok(())
    }

    fn encode_pll(div: &PllDividers) -> FieldValue<u32, PLLCFGR::Register> {
        PLLCFGR::PLLM.val(div.m - 1)
            + PLLCFGR::PLLN.val(div.n - 1)
            + PLLCFGR::PLLP.val(div.p - 1)
            + PLLCFGR::PLLQ.val(div.q - 1)
            + PLLCFGR::PLLR.val(div.r - 1)
    }

    /// Configure the MPLL and the input of both PLLs. Fails with `FAIL` while
    /// the MPLL drives the system clock.
    pub fn configure_mpll(&self, source: PllSource, div: &PllDividers) -> Result<(), ErrorCode> {
        self.check_pll(source, div)?;
        if self.system_clock_source() == SysClkSource::Mpll {
            return Err(ErrorCode::FAIL);
        }
        let src = match source {
            PllSource::Xtal => PLLCFGR::PLLSRC::Xtal,
            PllSource::Hrc => PLLCFGR::PLLSRC::Hrc,
        };
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.pllcfgr.write(Self::encode_pll(div) + src);
        Ok(())
    }

    /// Configure the UPLL, which shares the MPLL's input.
    pub fn configure_upll(&self, div: &PllDividers) -> Result<(), ErrorCode> {
        self.check_pll(self.pll_source(), div)?;
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.upllcfgr.write(Self::encode_pll(div));
        Ok(())
    }

    pub fn pll_frequencies(&self) -> PllFrequencies {
        let input = self.pll_input_hz(self.pll_source());
        let outputs = |reg: &ReadWrite<u32, PLLCFGR::Register>| {
            let vco = input / (reg.read(PLLCFGR::PLLM) + 1) * (reg.read(PLLCFGR::PLLN) + 1);
            (
                vco / (reg.read(PLLCFGR::PLLP) + 1),
                vco / (reg.read(PLLCFGR::PLLQ) + 1),
                vco / (reg.read(PLLCFGR::PLLR) + 1),
            )
        };
        let (mpll_p, mpll_q, mpll_r) = outputs(&self.sysreg.pllcfgr);
        let (upll_p, upll_q, upll_r) = outputs(&self.sysreg.upllcfgr);
        PllFrequencies {
            mpll_p,
            mpll_q,
            mpll_r,
            upll_p,
            upll_q,
            upll_r,
        }
    }

    pub fn clock_frequencies(&self) -> ClockFrequencies {
        let sysclk = match self.system_clock_source() {
            SysClkSource::Hrc => HRC_HZ,
            SysClkSource::Mrc => MRC_HZ,
            SysClkSource::Lrc => LRC_HZ,
            SysClkSource::Xtal => self.xtal_hz.get(),
            SysClkSource::Xtal32 => XTAL32_HZ,
            SysClkSource::Mpll => self.pll_frequencies().mpll_p,
        };
        let scfgr = &self.sysreg.scfgr;
        let div = |field| sysclk >> scfgr.read(field);
        ClockFrequencies {
            sysclk,
            hclk: div(SCFGR::HCLKS),
            exck: div(SCFGR::EXCKS),
            pclk0: div(SCFGR::PCLK0S),
            pclk1: div(SCFGR::PCLK1S),
            pclk2: div(SCFGR::PCLK2S),
            pclk3: div(SCFGR::PCLK3S),
            pclk4: div(SCFGR::PCLK4S),
        }
    }

    pub fn configure_xtal(&self, config: &XtalConfig) {
        self.xtal_hz.set(config.frequency_hz);
        let mode = match config.mode {
            XtalMode::Oscillator => 0,
            XtalMode::ExternalClock => 1,
        };
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.xtalcfgr.write(
            XTALCFGR::XTALDRV.val(config.drive as u8)
                + XTALCFGR::XTALMS.val(mode)
                + XTALCFGR::SUPDRV.val(u8::from(config.super_drive)),
        );
    }

    /// Set the XTAL stabilization wait, in the hardware's 0-15 encoding.
    pub fn set_xtal_stable_time(&self, time: u8) -> Result<(), ErrorCode> {
        if time > 15 {
            return Err(ErrorCode::INVAL);
        }
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.xtalstbcr.set(time);
        Ok(())
    }

    /// Enable XTAL failure detection with the given response, or disable it
    /// with `None`.
    pub fn configure_xtal_stop_detect(&self, action: Option<StopAction>) {
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        // The response can only be changed with detection off.
        self.sysreg.xtalstdcr.write(XTALSTDCR::XTALSTDE::CLEAR);
        match action {
            None => {}
            Some(StopAction::Interrupt) => {
                self.sysreg
                    .xtalstdcr
                    .write(XTALSTDCR::XTALSTDIE::SET + XTALSTDCR::XTALSTDRIS::CLEAR);
                self.sysreg.xtalstdcr.modify(XTALSTDCR::XTALSTDE::SET);
            }
            Some(StopAction::Reset) => {
                self.sysreg
                    .xtalstdcr
                    .write(XTALSTDCR::XTALSTDRE::SET + XTALSTDCR::XTALSTDRIS::SET);
                self.sysreg.xtalstdcr.modify(XTALSTDCR::XTALSTDE::SET);
            }
        }
    }

    pub fn xtal_stop_detected(&self) -> bool {
        self.sysreg.xtalstdsr.is_set(XTALSTDSR::XTALSTDF)
    }

    pub fn clear_xtal_stop_flag(&self) {
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.xtalstdsr.write(XTALSTDSR::XTALSTDF::CLEAR);
    }

    pub fn configure_xtal32(&self, config: &Xtal32Config) {
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.xtal32cfgr.write(
            XTAL32CFGR::XTAL32DRV.val(config.drive as u8)
                + XTAL32CFGR::XTAL32SUPDRV.val(u8::from(config.super_drive)),
        );
        self.sysreg.xtal32nfr.set(config.filter as u8);
    }

    /// Write the trim of an internal oscillator. Only HRC, MRC and LRC have
    /// one.
    pub fn set_trim(&self, osc: Oscillator, trim: i8) -> Result<(), ErrorCode> {
        let reg = match osc {
            Oscillator::Hrc => &self.sysreg.hrctrm,
            Oscillator::Mrc => &self.sysreg.mrctrm,
            Oscillator::Lrc => &self.sysreg.lrctrm,
            _ => return Err(ErrorCode::INVAL),
        };
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        reg.set(trim as u8);
        Ok(())
    }

    /// Select the USB clock. The USB block is gated during the switch.
    pub fn set_usb_clock_source(&self, source: UsbClock) {
        let fcg1 = self.mstp.fcg1.get();
        self.mstp.fcg1.set(fcg1 | USBFS_GATE);
        self.delay(SETTLE_CYCLES);
        {
            let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
            self.sysreg
                .ufsckcfgr
                .write(UFSCKCFGR::USBCKS.val(source as u16));
        }
        self.delay(SETTLE_CYCLES);
        self.mstp.fcg1.set(fcg1);
    }

    /// Select the ADC and TRNG clock.
    pub fn set_peripheral_clock_source(&self, source: PeripheralClock) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg
            .pericksel
            .write(PERICKSEL::PERICKSEL.val(source as u16));
    }

    /// Select the clock of I2S `unit` (1 to 4).
    pub fn set_i2s_clock_source(&self, unit: u8, source: PeripheralClock) -> Result<(), ErrorCode> {
        if !(1..=4).contains(&unit) {
            return Err(ErrorCode::INVAL);
        }
        let shift = 4 * (unit - 1);
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        let cleared = self.sysreg.i2scksel.get() & !(0xF << shift);
        self.sysreg
            .i2scksel
            .set(cleared | ((source as u16) << shift));
        Ok(())
    }

    pub fn configure_tpiu(&self, div: TpiuDiv, enable: bool) {
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        self.sysreg.tpiuckcfgr.write(
            TPIUCKCFGR::TPIUCKS.val(div as u8) + TPIUCKCFGR::TPIUCKOE.val(u8::from(enable)),
        );
    }

    pub fn configure_mco(&self, output: Mco, source: McoSource, div: McoDiv, enable: bool) {
        let reg = match output {
            Mco::Mco1 => &self.sysreg.mco1cfgr,
            Mco::Mco2 => &self.sysreg.mco2cfgr,
        };
        let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
        reg.write(
            MCOCFGR::MCOSEL.val(source as u8)
                + MCOCFGR::MCODIV.val(div as u8)
                + MCOCFGR::MCOEN.val(u8::from(enable)),
        );
    }

    /// Set the flash read wait cycles (0 to 15). Raise this before speeding
    /// up HCLK and lower it after slowing down.
    pub fn set_flash_wait_cycles(&self, cycles: u8) -> Result<(), ErrorCode> {
        if cycles > 15 {
            return Err(ErrorCode::INVAL);
        }
        let _efm = EfmUnlocked::new(self.efm);
        self.efm.frmc.modify(FRMC::FLWT.val(u32::from(cycles)));
        Ok(())
    }

    /// Move the system clock to the MRC ahead of a low-power entry, keeping
    /// what is needed to undo it. A stopped HRC is started first and stays
    /// running until [`Cmu::restore`].
    pub(crate) fn force_mrc(&self) -> Result<ClockBackup, ErrorCode> {
        let backup = ClockBackup {
            source: self.system_clock_source(),
            hrc_on: self.is_enabled(Oscillator::Hrc),
            mrc_on: self.is_enabled(Oscillator::Mrc),
        };
        if !backup.hrc_on {
            if let Err(e) = self.enable_oscillator(Oscillator::Hrc, true) {
                self.stop_unused(Oscillator::Hrc);
                return Err(e);
            }
        }
        if backup.source != SysClkSource::Mrc {
            if !backup.mrc_on {
                self.enable_oscillator(Oscillator::Mrc, true)?;
            }
            self.set_system_clock_source(SysClkSource::Mrc);
        }
        Ok(backup)
    }

    /// Stop a source nothing runs from any more.
    fn stop_unused(&self, osc: Oscillator) {
        if let Err(e) = self.enable_oscillator(osc, false) {
            warn!("cmu: could not stop {:?}: {:?}", osc, e);
        }
    }

    /// Start the oscillators `source` runs from, waiting for each to settle.
    fn restart(&self, source: SysClkSource) -> Result<(), ErrorCode> {
        match source {
            SysClkSource::Mrc => Ok(()),
            SysClkSource::Mpll => {
                if self.pll_source() == PllSource::Xtal {
                    self.enable_oscillator(Oscillator::Xtal, true)?;
                }
                self.enable_oscillator(Oscillator::Mpll, true)
            }
            other => self.enable_oscillator(other.oscillator(), true),
        }
    }

    /// Undo [`Cmu::force_mrc`]: the saved system clock source runs again and
    /// the MRC is stopped only after the system clock has left it.
    ///
    /// If a source does not become stable again the system clock stays on the
    /// MRC and the error is returned.
    pub(crate) fn restore(&self, backup: ClockBackup) -> Result<(), ErrorCode> {
        if backup.hrc_on {
            self.enable_oscillator(Oscillator::Hrc, true)?;
        }
        if backup.source != SysClkSource::Mrc {
            if let Err(e) = self.restart(backup.source) {
                warn!("cmu: staying on MRC, {:?} did not restart", backup.source);
                return Err(e);
            }
            self.set_system_clock_source(backup.source);
        }
        if !backup.mrc_on {
            self.stop_unused(Oscillator::Mrc);
        }
        if !backup.hrc_on {
            self.stop_unused(Oscillator::Hrc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ram_block, MockProcessor};

    struct Setup {
        sysreg: StaticRef<SysregRegisters>,
        mstp: StaticRef<MstpRegisters>,
        efm: StaticRef<EfmRegisters>,
        processor: &'static MockProcessor,
    }

    fn setup() -> Setup {
        Setup {
            sysreg: ram_block(),
            mstp: ram_block(),
            efm: ram_block(),
            processor: Box::leak(Box::new(MockProcessor::default())),
        }
    }

    impl Setup {
        fn cmu(&self) -> Cmu<'static, MockProcessor> {
            Cmu::with_registers(self.sysreg, self.mstp, self.efm, self.processor)
        }

        fn run_on_mpll_from(&self, source: PllSource) {
            let src = match source {
                PllSource::Xtal => PLLCFGR::PLLSRC::Xtal,
                PllSource::Hrc => PLLCFGR::PLLSRC::Hrc,
            };
            self.sysreg.pllcfgr.write(src);
            self.sysreg.ckswr.write(CKSWR::CKSW::Mpll);
        }
    }

    #[test]
    fn stopping_the_system_clock_fails() {
        let s = setup();
        let cmu = s.cmu();
        assert_eq!(cmu.system_clock_source(), SysClkSource::Hrc);
        assert_eq!(
            cmu.enable_oscillator(Oscillator::Hrc, false),
            Err(ErrorCode::FAIL)
        );
        assert!(cmu.is_enabled(Oscillator::Hrc));
        assert_eq!(cmu.enable_oscillator(Oscillator::Mrc, false), Ok(()));
        assert!(!cmu.is_enabled(Oscillator::Mrc));
    }

    #[test]
    fn stopping_the_pll_input_fails_only_while_mpll_runs_the_system() {
        let s = setup();
        let cmu = s.cmu();
        s.run_on_mpll_from(PllSource::Xtal);

        assert_eq!(
            cmu.enable_oscillator(Oscillator::Xtal, false),
            Err(ErrorCode::FAIL)
        );
        assert_eq!(cmu.enable_oscillator(Oscillator::Hrc, false), Ok(()));
        assert_eq!(
            cmu.enable_oscillator(Oscillator::Mpll, false),
            Err(ErrorCode::FAIL)
        );

        s.sysreg.ckswr.write(CKSWR::CKSW::Mrc);
        assert_eq!(cmu.enable_oscillator(Oscillator::Xtal, false), Ok(()));
        assert_eq!(cmu.enable_oscillator(Oscillator::Mpll, false), Ok(()));
    }

    #[test]
    fn start_waits_for_ready_flag() {
        let s = setup();
        let cmu = s.cmu();
        assert_eq!(
            cmu.enable_oscillator(Oscillator::Xtal, true),
            Err(ErrorCode::BUSY)
        );

        s.sysreg.oscstbsr.write(OSCSTBSR::XTALSTBF::SET);
        assert_eq!(cmu.enable_oscillator(Oscillator::Xtal, true), Ok(()));
        assert_eq!(cmu.is_stable(Oscillator::Xtal), Some(true));
        assert_eq!(cmu.is_stable(Oscillator::Lrc), None);

        let nops = s.processor.nop_count.get();
        assert_eq!(cmu.enable_oscillator(Oscillator::Lrc, true), Ok(()));
        assert_eq!(s.processor.nop_count.get(), nops + SHORT_DELAY as usize);
        assert_eq!(s.sysreg.fprc.get(), 0xA500);
    }

    #[test]
    fn switching_to_mpll_gates_peripherals_around_the_switch() {
        let s = setup();
        let cmu = s.cmu();
        s.mstp.fcg1.set(0x1234_5678);
        s.mstp.fcg3.set(0xFFFF_FEFF);

        cmu.set_system_clock_source(SysClkSource::Mpll);

        assert_eq!(cmu.system_clock_source(), SysClkSource::Mpll);
        assert_eq!(s.mstp.fcg0.get(), 0);
        assert_eq!(s.mstp.fcg1.get(), 0x1234_5678);
        assert_eq!(s.mstp.fcg3.get(), 0xFFFF_FEFF);
        assert_eq!(s.mstp.fcg0pc.get(), 0xA5A5_0000);
        assert_eq!(s.processor.nop_count.get(), 3 * SETTLE_CYCLES as usize);
        assert_eq!(s.sysreg.fprc.get(), 0xA500);
    }

    #[test]
    fn switching_between_internal_oscillators_skips_the_gating() {
        let s = setup();
        let cmu = s.cmu();
        cmu.set_system_clock_source(SysClkSource::Mrc);
        assert_eq!(cmu.system_clock_source(), SysClkSource::Mrc);
        assert_eq!(s.processor.nop_count.get(), 0);
        assert_eq!(s.mstp.fcg0pc.get(), 0);
    }

    #[test]
    fn pll_configuration_is_validated_and_encoded() {
        let s = setup();
        let cmu = s.cmu();
        let good = PllDividers {
            m: 1,
            n: 42,
            p: 2,
            q: 7,
            r: 7,
        };
        assert_eq!(
            cmu.configure_mpll(PllSource::Xtal, &PllDividers { m: 0, ..good }),
            Err(ErrorCode::INVAL)
        );
        // 8 MHz * 20 = 160 MHz VCO, below range.
        assert_eq!(
            cmu.configure_mpll(PllSource::Xtal, &PllDividers { n: 20, ..good }),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(cmu.configure_mpll(PllSource::Xtal, &good), Ok(()));
        assert_eq!(s.sysreg.pllcfgr.read(PLLCFGR::PLLN), 41);
        assert_eq!(s.sysreg.pllcfgr.read(PLLCFGR::PLLP), 1);
        assert_eq!(cmu.pll_source(), PllSource::Xtal);

        let pll = cmu.pll_frequencies();
        assert_eq!(pll.mpll_p, 168_000_000);
        assert_eq!(pll.mpll_q, 48_000_000);

        s.sysreg.ckswr.write(CKSWR::CKSW::Mpll);
        assert_eq!(
            cmu.configure_mpll(PllSource::Xtal, &good),
            Err(ErrorCode::FAIL)
        );
    }

    #[test]
    fn bus_clocks_follow_the_dividers() {
        let s = setup();
        let cmu = s.cmu();
        cmu.configure_sysclk_dividers(&SysclkDividers {
            hclk: ClockDiv::Div1,
            exck: ClockDiv::Div2,
            pclk0: ClockDiv::Div1,
            pclk1: ClockDiv::Div2,
            pclk2: ClockDiv::Div4,
            pclk3: ClockDiv::Div4,
            pclk4: ClockDiv::Div2,
        });
        let f = cmu.clock_frequencies();
        assert_eq!(f.sysclk, HRC_HZ);
        assert_eq!(f.hclk, 16_000_000);
        assert_eq!(f.pclk2, 4_000_000);
        assert_eq!(f.exck, 8_000_000);
    }

    #[test]
    fn fcg0_writes_use_the_protect_key() {
        let s = setup();
        let cmu = s.cmu();
        s.mstp.fcg0.set(0xFFFF_FFFF);
        cmu.set_fcg(Fcg::Fcg0(Fcg0::DMA1 | Fcg0::DMA2), true);
        assert_eq!(s.mstp.fcg0.get(), 0xFFFF_3FFF);
        assert_eq!(s.mstp.fcg0pc.get(), 0xA5A5_0000);

        cmu.set_fcg(Fcg::Fcg2(Fcg2::TMR01), false);
        assert_eq!(s.mstp.fcg2.get(), 1);
    }

    #[test]
    fn argument_checks() {
        let s = setup();
        let cmu = s.cmu();
        assert_eq!(cmu.set_flash_wait_cycles(16), Err(ErrorCode::INVAL));
        assert_eq!(cmu.set_flash_wait_cycles(5), Ok(()));
        assert_eq!(s.efm.frmc.read(FRMC::FLWT), 5);
        assert_eq!(s.efm.faprt.get(), 0);

        assert_eq!(cmu.set_trim(Oscillator::Xtal, 1), Err(ErrorCode::INVAL));
        assert_eq!(cmu.set_trim(Oscillator::Hrc, -2), Ok(()));
        assert_eq!(s.sysreg.hrctrm.get(), 0xFE);

        assert_eq!(
            cmu.set_i2s_clock_source(5, PeripheralClock::UpllR),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            cmu.set_i2s_clock_source(3, PeripheralClock::UpllR),
            Ok(())
        );
        assert_eq!(s.sysreg.i2scksel.get(), 13 << 8);
    }

    #[test]
    fn forced_mrc_is_undone() {
        let s = setup();
        let cmu = s.cmu();
        s.sysreg.oscstbsr.write(OSCSTBSR::HRCSTBF::SET);
        s.sysreg.mrccr.write(OSCSTP::STP::SET);

        let backup = cmu.force_mrc().unwrap();
        assert_eq!(cmu.system_clock_source(), SysClkSource::Mrc);
        assert!(cmu.is_enabled(Oscillator::Mrc));

        assert_eq!(cmu.restore(backup), Ok(()));
        assert_eq!(cmu.system_clock_source(), SysClkSource::Hrc);
        assert!(!cmu.is_enabled(Oscillator::Mrc));
        assert!(cmu.is_enabled(Oscillator::Hrc));
    }

    #[test]
    fn stopped_hrc_runs_through_the_backup() {
        let s = setup();
        let cmu = s.cmu();
        s.sysreg
            .oscstbsr
            .write(OSCSTBSR::HRCSTBF::SET + OSCSTBSR::XTALSTBF::SET);
        s.sysreg.ckswr.write(CKSWR::CKSW::Xtal);
        s.sysreg.hrccr.write(OSCSTP::STP::SET);

        let backup = cmu.force_mrc().unwrap();
        assert!(cmu.is_enabled(Oscillator::Hrc));
        assert_eq!(cmu.system_clock_source(), SysClkSource::Mrc);

        assert_eq!(cmu.restore(backup), Ok(()));
        assert_eq!(cmu.system_clock_source(), SysClkSource::Xtal);
        assert!(!cmu.is_enabled(Oscillator::Hrc));
    }

    #[test]
    fn hrc_that_never_settles_aborts_the_backup() {
        let s = setup();
        let cmu = s.cmu();
        s.sysreg.ckswr.write(CKSWR::CKSW::Xtal);
        s.sysreg.hrccr.write(OSCSTP::STP::SET);

        assert_eq!(cmu.force_mrc().err(), Some(ErrorCode::BUSY));
        assert_eq!(cmu.system_clock_source(), SysClkSource::Xtal);
        assert!(!cmu.is_enabled(Oscillator::Hrc));
    }

    #[test]
    fn source_that_does_not_restart_leaves_the_clock_on_mrc() {
        let s = setup();
        let cmu = s.cmu();
        s.sysreg
            .oscstbsr
            .write(OSCSTBSR::HRCSTBF::SET + OSCSTBSR::XTALSTBF::SET);
        s.sysreg.ckswr.write(CKSWR::CKSW::Mpll);
        s.sysreg.pllcfgr.write(PLLCFGR::PLLSRC::Xtal);
        s.sysreg.mrccr.write(OSCSTP::STP::SET);

        let backup = cmu.force_mrc().unwrap();
        assert_eq!(cmu.system_clock_source(), SysClkSource::Mrc);

        // MPLLSTBF never rises.
        assert_eq!(cmu.restore(backup), Err(ErrorCode::BUSY));
        assert_eq!(cmu.system_clock_source(), SysClkSource::Mrc);
        assert!(cmu.is_enabled(Oscillator::Mrc));
    }
}
