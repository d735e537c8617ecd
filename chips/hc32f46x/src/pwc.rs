// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Power controller (PWC).
//!
//! Three low-power states are reachable from run mode: Sleep, Stop and
//! Power-Down. All of them end only through a hardware wake event, so the
//! caller has to arm at least one wake source before entering Stop
//! (`Intc::enable_wakeup`) or Power-Down ([`Pwc::enable_pd_wakeup`]).
//!
//! Around Stop and Power-Down the NVIC is narrowed to the lines that can wake
//! the chip, and the system clock is moved to the MRC. Both are undone on
//! wake-up, clocks first.
//!
//! ```rust,ignore
//! chip.intc.enable_wakeup(Wakeup::EIRQ3)?;
//! chip.pwc.enter_stop()?;
//! ```

use core::cell::Cell;

use bitflags::bitflags;
use cortexm::nvic::Nvic;
use kernel::platform::chip::Processor;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;
use log::{info, warn};

use crate::cmu::{ClockBackup, Cmu, Fcg, Oscillator, SysClkSource};
use crate::intc::{Intc, Wakeup, FIRST_SHARED_SLOT, LAST_SHARED_SLOT, NUM_DIRECT_SLOTS};
use crate::protect::{Protect, Unlocked};
use crate::sysreg::{
    SysregRegisters, WktmRegisters, OSCSTP, PVDCR0, PWCMR, PWRC0, PWRC1, PWRC2, PWRC3, STPMCR,
    SYSREG_BASE, WKTCR, WKTM_BASE, XTAL32CS,
};

/// NVIC enable words covering the 144 vector slots.
const NVIC_WORDS: usize = 5;

/// `PVDCR1` with both PVD reset selections cleared.
const PVDCR1_NO_RESET: u8 = 0xDD;

/// Cycles between the power-down request and the WFI.
const POWER_DOWN_DELAY: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerDownMode {
    Mode1 = 0,
    Mode2 = 1,
    Mode3 = 2,
    Mode4 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IoRetain {
    /// Pins keep their state during power-down.
    PowerDown = 0,
    /// Pins keep their state through the power-down reset.
    PowerReset = 1,
    HighImpedance = 2,
}

/// Driver ability and core voltage of run mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunSpeed {
    High,
    UltraLow,
}

impl RunSpeed {
    fn ddas(self) -> u8 {
        match self {
            RunSpeed::High => 15,
            RunSpeed::UltraLow => 8,
        }
    }

    fn dvs(self) -> u8 {
        match self {
            RunSpeed::High => 3,
            RunSpeed::UltraLow => 2,
        }
    }
}

/// Wake-up time from power-down, set by the VCAP capacitance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PdWakeTime {
    Vcap100nF = 0,
    Vcap47nF = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerModeConfig {
    pub mode: PowerDownMode,
    pub rldo: bool,
    pub retention_sram: bool,
    pub io: IoRetain,
    pub pll_power: bool,
    pub hrc_power: bool,
    pub speed: RunSpeed,
    pub wake_time: PdWakeTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopModeConfig {
    pub speed: RunSpeed,
    /// Resume from Stop without waiting for the flash to be ready.
    pub flash_no_wait: bool,
    /// Run on the MRC right after waking.
    pub wake_on_mrc: bool,
    /// Keep the MPLL running through Stop.
    pub pll: bool,
}

bitflags! {
    /// Power-down wake-up sources: `PDWKE0` in bits 0-7, `PDWKE1` in bits
    /// 8-15 and `PDWKE2` in bits 16-23.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PdWakeup: u32 {
        const WKUP0_0 = 1 << 0;
        const WKUP0_1 = 1 << 1;
        const WKUP0_2 = 1 << 2;
        const WKUP0_3 = 1 << 3;
        const WKUP1_0 = 1 << 4;
        const WKUP1_1 = 1 << 5;
        const WKUP1_2 = 1 << 6;
        const WKUP1_3 = 1 << 7;
        const WKUP2_0 = 1 << 8;
        const WKUP2_1 = 1 << 9;
        const WKUP2_2 = 1 << 10;
        const WKUP2_3 = 1 << 11;
        const WKUP3_0 = 1 << 12;
        const WKUP3_1 = 1 << 13;
        const WKUP3_2 = 1 << 14;
        const WKUP3_3 = 1 << 15;
        const PVD1 = 1 << 16;
        const PVD2 = 1 << 17;
        const NMI = 1 << 18;
        const RTC_PERIOD = 1 << 20;
        const RTC_ALARM = 1 << 21;
        const XTAL32_ERROR = 1 << 22;
        const WKTM = 1 << 23;
    }

    /// Latched power-down wake flags: `PDWKF0` in bits 0-7, `PDWKF1` in bits
    /// 8-15.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PdWakeFlag: u16 {
        const PTWK0 = 1 << 0;
        const PTWK1 = 1 << 1;
        const PTWK2 = 1 << 2;
        const PTWK3 = 1 << 3;
        const PVD1 = 1 << 4;
        const PVD2 = 1 << 5;
        const NMI = 1 << 6;
        const RXD0 = 1 << 10;
        const RTC_PERIOD = 1 << 12;
        const RTC_ALARM = 1 << 13;
        const XTAL32_ERROR = 1 << 14;
        const WKTM = 1 << 15;
    }

    /// Rising-edge selections of `PDWKES`. A clear bit selects the falling
    /// edge, or for the PVDs the crossing to above the threshold.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PdWakeEdge: u8 {
        const PTWK0 = 1 << 0;
        const PTWK1 = 1 << 1;
        const PTWK2 = 1 << 2;
        const PTWK3 = 1 << 3;
        const PVD1_BELOW = 1 << 4;
        const PVD2_BELOW = 1 << 5;
        const NMI = 1 << 6;
    }

    /// Power control bits of `RAMPC0`; a set bit powers the block down.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RamPowerDown: u32 {
        const RAM0 = 1 << 0;
        const RAM1 = 1 << 1;
        const RAM2 = 1 << 2;
        const RAM3 = 1 << 3;
        const USBFS = 1 << 4;
        const SDIOC0 = 1 << 5;
        const SDIOC1 = 1 << 6;
        const CAN = 1 << 7;
        const CACHE = 1 << 8;
    }
}

/// `RAMOPM` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum RamSpeed {
    High = 0x8043,
    UltraLow = 0x9062,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum WakeTimerClock {
    Hz64 = 0,
    Xtal32 = 1,
    Lrc = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeTimerConfig {
    /// 12-bit compare value.
    pub compare: u16,
    pub clock: WakeTimerClock,
    pub enable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pvd {
    Pvd1,
    Pvd2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PvdFilterClock {
    LrcQuarter = 0,
    LrcHalf = 1,
    Lrc1 = 2,
    Lrc2 = 3,
}

/// Settings of one voltage detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PvdUnitConfig {
    /// Raise an interrupt (or reset) on detection.
    pub interrupt_enable: bool,
    /// Reset instead of interrupting.
    pub reset: bool,
    pub compare_output: bool,
    /// Filter clock, or `None` to disable the digital filter.
    pub filter: Option<PvdFilterClock>,
    /// Threshold in the 0-7 hardware encoding.
    pub level: u8,
    /// Route the detection to the maskable interrupt instead of the NMI.
    pub maskable: bool,
}

impl PvdUnitConfig {
    fn control(&self) -> u8 {
        u8::from(self.interrupt_enable)
            | (u8::from(self.reset) << 1)
            | (u8::from(self.compare_output) << 2)
    }

    fn filter(&self) -> u8 {
        match self.filter {
            None => 1,
            Some(clock) => (clock as u8) << 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PvdConfig {
    pub pvd1: PvdUnitConfig,
    pub pvd2: PvdUnitConfig,
}

/// State saved across a low-power entry. Scalars only touched with
/// interrupts disabled.
struct PowerBackup {
    nvic: Cell<[u32; NVIC_WORDS]>,
    clocks: Cell<Option<ClockBackup>>,
    depth: Cell<u8>,
}

pub struct Pwc<'a, P: Processor> {
    sysreg: StaticRef<SysregRegisters>,
    wktm: StaticRef<WktmRegisters>,
    processor: &'a P,
    cmu: &'a Cmu<'a, P>,
    intc: &'a Intc,
    nvic: &'a Nvic,
    backup: PowerBackup,
}

impl<'a, P: Processor> Pwc<'a, P> {
    pub const fn new(processor: &'a P, cmu: &'a Cmu<'a, P>, intc: &'a Intc, nvic: &'a Nvic) -> Self {
        Self::with_registers(SYSREG_BASE, WKTM_BASE, processor, cmu, intc, nvic)
    }

    pub const fn with_registers(
        sysreg: StaticRef<SysregRegisters>,
        wktm: StaticRef<WktmRegisters>,
        processor: &'a P,
        cmu: &'a Cmu<'a, P>,
        intc: &'a Intc,
        nvic: &'a Nvic,
    ) -> Self {
        Pwc {
            sysreg,
            wktm,
            processor,
            cmu,
            intc,
            nvic,
            backup: PowerBackup {
                nvic: Cell::new([0; NVIC_WORDS]),
                clocks: Cell::new(None),
                depth: Cell::new(0),
            },
        }
    }

    /// Suspend the core until the next interrupt. Clocks keep running.
    pub fn enter_sleep(&self) {
        {
            let _power = Unlocked::new(self.sysreg, Protect::POWER);
            self.sysreg.stpmcr.modify(STPMCR::STOP::CLEAR);
            self.sysreg.pwrc0.modify(PWRC0::PWDN::CLEAR);
        }
        self.processor.wait_for_interrupt();
    }

    /// Enter Stop mode and return once a Stop wake source has fired.
    ///
    /// With no wake source armed in `WUPEN` the chip never wakes; that is
    /// logged and caught by a debug assertion. Errors come from moving the
    /// system clock off and back onto its source; see
    /// [`Pwc::backup_clocks`] and [`Pwc::recover_clocks`].
    pub fn enter_stop(&self) -> Result<(), ErrorCode> {
        let armed = self.intc.wakeup();
        if armed.is_empty() {
            warn!("pwc: entering stop with no wake-up source armed");
        }
        debug_assert!(!armed.is_empty(), "stop entered with no wake-up source");

        info!("pwc: entering stop");
        self.prepare(armed)?;
        {
            let _power = Unlocked::new(self.sysreg, Protect::POWER);
            self.sysreg.stpmcr.modify(STPMCR::STOP::SET);
            self.sysreg.pwrc0.modify(PWRC0::PWDN::CLEAR);
        }
        self.processor.wait_for_interrupt();
        let recovered = self.recover_clocks();
        self.restore_nvic();
        info!("pwc: left stop");
        recovered
    }

    /// Enter Power-Down mode and return once a power-down wake source has
    /// fired.
    ///
    /// PVD resets are turned into interrupts first, so a voltage drop wakes
    /// the chip instead of resetting it. With no source armed in `PDWKE0-2`
    /// the chip never wakes; that is logged and caught by a debug assertion.
    pub fn enter_power_down(&self) -> Result<(), ErrorCode> {
        let armed = self.pd_wakeup();
        if armed.is_empty() {
            warn!("pwc: entering power-down with no wake-up source armed");
        }
        debug_assert!(!armed.is_empty(), "power-down entered with no wake-up source");

        info!("pwc: entering power-down");
        self.prepare(self.intc.wakeup())?;
        {
            let _pvd = Unlocked::new(self.sysreg, Protect::PVD);
            let pvdcr1 = self.sysreg.pvdcr1.get();
            self.sysreg.pvdcr1.set(pvdcr1 & PVDCR1_NO_RESET);
        }
        {
            let _power = Unlocked::new(self.sysreg, Protect::POWER);
            self.sysreg.stpmcr.modify(STPMCR::STOP::SET);
            self.processor.with_interrupts_disabled(|| {
                self.sysreg.pwrc0.modify(PWRC0::PWDN::SET);
                for _ in 0..POWER_DOWN_DELAY {
                    self.processor.nop();
                }
                self.processor.wait_for_interrupt();
            });
        }
        let recovered = self.recover_clocks();
        self.restore_nvic();
        info!("pwc: left power-down");
        recovered
    }

    /// Narrow the NVIC and move to the MRC. Nothing is left changed if the
    /// clock backup fails.
    fn prepare(&self, armed: Wakeup) -> Result<(), ErrorCode> {
        self.narrow_to_wakeup(armed);
        if let Err(e) = self.backup_clocks() {
            self.restore_nvic();
            return Err(e);
        }
        Ok(())
    }

    /// Save the NVIC enables and leave only the wake-capable lines enabled.
    fn narrow_to_wakeup(&self, armed: Wakeup) {
        self.processor.with_interrupts_disabled(|| {
            self.backup.nvic.set(self.nvic.save_enables::<NVIC_WORDS>());
            self.nvic.disable_range(FIRST_SHARED_SLOT, LAST_SHARED_SLOT);
            for slot in 0..NUM_DIRECT_SLOTS as u32 {
                let Some(source) = self.intc.source_at(slot) else {
                    continue;
                };
                match Wakeup::for_source(source) {
                    Some(flag) if armed.contains(flag) => {}
                    _ => self.nvic.disable(slot),
                }
            }
        });
    }

    fn restore_nvic(&self) {
        self.processor
            .with_interrupts_disabled(|| self.nvic.restore_enables(&self.backup.nvic.get()));
    }

    /// Move the system clock to the MRC, saving the clock state. Calls nest;
    /// only the outermost one touches the hardware.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::SIZE]\) if 255 backups are already outstanding.
    ///   Nothing is counted, so the call must not be matched by a recover.
    /// - [Err]\([ErrorCode::BUSY]\) if a stopped HRC does not settle. The
    ///   clocks are left as they were.
    pub fn backup_clocks(&self) -> Result<(), ErrorCode> {
        self.processor.with_interrupts_disabled(|| {
            let depth = self.backup.depth.get();
            let Some(next) = depth.checked_add(1) else {
                warn!("pwc: clock backups nested too deep");
                return Err(ErrorCode::SIZE);
            };
            if depth == 0 {
                self.backup.clocks.set(Some(self.cmu.force_mrc()?));
            }
            self.backup.depth.set(next);
            Ok(())
        })
    }

    /// Undo one [`Pwc::backup_clocks`]. The clock state is restored when the
    /// outermost backup is undone; extra calls do nothing.
    ///
    /// If the saved source does not become stable again the system clock
    /// stays on the MRC and `BUSY` is returned. The backup is consumed either
    /// way.
    pub fn recover_clocks(&self) -> Result<(), ErrorCode> {
        self.processor.with_interrupts_disabled(|| match self.backup.depth.get() {
            0 => Ok(()),
            1 => {
                self.backup.depth.set(0);
                match self.backup.clocks.take() {
                    Some(clocks) => self.cmu.restore(clocks),
                    None => Ok(()),
                }
            }
            depth => {
                self.backup.depth.set(depth - 1);
                Ok(())
            }
        })
    }

    pub fn configure_power_mode(&self, config: &PowerModeConfig) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg.pwrc0.write(
            PWRC0::PDMDS.val(config.mode as u8)
                + PWRC0::VVDRSD.val(u8::from(!config.rldo))
                + PWRC0::RETRAMSD.val(u8::from(!config.retention_sram))
                + PWRC0::IORTN.val(config.io as u8),
        );
        self.sysreg.pwrc1.modify(
            PWRC1::VHRCSD.val(u8::from(!config.hrc_power))
                + PWRC1::VPLLSD.val(u8::from(!config.pll_power)),
        );
        self.sysreg.pwrc2.write(
            PWRC2::DDAS.val(config.speed.ddas()) + PWRC2::DVS.val(config.speed.dvs()),
        );
        self.sysreg
            .pwrc3
            .modify(PWRC3::PDTS.val(config.wake_time as u8));
    }

    /// Configure Stop mode. Stopping the MPLL in Stop is refused with `FAIL`
    /// while it drives the system clock.
    pub fn configure_stop_mode(&self, config: &StopModeConfig) -> Result<(), ErrorCode> {
        if !config.pll && self.cmu.system_clock_source() == SysClkSource::Mpll {
            warn!("pwc: cannot stop the MPLL while it is the system clock");
            return Err(ErrorCode::FAIL);
        }
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg.stpmcr.write(
            STPMCR::FLNWT.val(u16::from(config.flash_no_wait))
                + STPMCR::CKSMRC.val(u16::from(config.wake_on_mrc)),
        );
        if !config.pll {
            let _clock = Unlocked::new(self.sysreg, Protect::CLOCK);
            self.sysreg.pllcr.write(OSCSTP::STP::SET);
        }
        let stop_speed = match config.speed {
            RunSpeed::High => 0,
            RunSpeed::UltraLow => 3,
        };
        self.sysreg.pwrc1.modify(
            PWRC1::VHRCSD::CLEAR
                + PWRC1::VPLLSD.val(u8::from(!config.pll))
                + PWRC1::STPDAS.val(stop_speed),
        );
        Ok(())
    }

    /// Arm Stop wake-up sources; same as `Intc::enable_wakeup`.
    pub fn stop_wakeup(&self, mask: Wakeup, enable: bool) -> Result<(), ErrorCode> {
        if enable {
            self.intc.enable_wakeup(mask)
        } else {
            self.intc.disable_wakeup(mask)
        }
    }

    pub fn pd_wakeup(&self) -> PdWakeup {
        let bits = u32::from(self.sysreg.pdwke0.get())
            | (u32::from(self.sysreg.pdwke1.get()) << 8)
            | (u32::from(self.sysreg.pdwke2.get()) << 16);
        PdWakeup::from_bits_truncate(bits)
    }

    fn write_pd_wakeup(&self, wake: PdWakeup) {
        let bits = wake.bits();
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg.pdwke0.set(bits as u8);
        self.sysreg.pdwke1.set((bits >> 8) as u8);
        self.sysreg.pdwke2.set((bits >> 16) as u8);
    }

    pub fn enable_pd_wakeup(&self, mask: PdWakeup) {
        self.write_pd_wakeup(self.pd_wakeup() | mask);
    }

    pub fn disable_pd_wakeup(&self, mask: PdWakeup) {
        self.write_pd_wakeup(self.pd_wakeup() - mask);
    }

    pub fn set_pd_wakeup_edges(&self, rising: PdWakeEdge) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg.pdwkes.set(rising.bits());
    }

    pub fn pd_wakeup_flag(&self, flag: PdWakeFlag) -> bool {
        let bits = u16::from(self.sysreg.pdwkf0.get()) | (u16::from(self.sysreg.pdwkf1.get()) << 8);
        PdWakeFlag::from_bits_truncate(bits).intersects(flag)
    }

    pub fn clear_pd_wakeup_flag(&self, flag: PdWakeFlag) {
        let bits = flag.bits();
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        let low = bits as u8;
        let high = (bits >> 8) as u8;
        if low != 0 {
            let f0 = self.sysreg.pdwkf0.get();
            self.sysreg.pdwkf0.set(f0 & !low);
        }
        if high != 0 {
            let f1 = self.sysreg.pdwkf1.get();
            self.sysreg.pdwkf1.set(f1 & !high);
        }
    }

    pub fn configure_ram(&self, power_down: RamPowerDown, speed: RamSpeed) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg.rampc0.set(power_down.bits());
        self.sysreg.ramopm.set(speed as u16);
    }

    /// Keep the XTAL32 current source on through power-down.
    pub fn xtal32_current_source(&self, enable: bool) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg
            .xtal32cs
            .modify(XTAL32CS::CSDIS.val(u8::from(!enable)));
    }

    pub fn configure_wake_timer(&self, config: &WakeTimerConfig) -> Result<(), ErrorCode> {
        if config.compare > 0x0FFF {
            return Err(ErrorCode::INVAL);
        }
        self.wktm.cr.write(
            WKTCR::WKTMCMP.val(config.compare)
                + WKTCR::WKCKS.val(config.clock as u16)
                + WKTCR::WKTCE.val(u16::from(config.enable)),
        );
        Ok(())
    }

    pub fn enable_wake_timer(&self, enable: bool) {
        self.wktm.cr.modify(WKTCR::WKTCE.val(u16::from(enable)));
    }

    /// Whether the wake-up timer reached its compare value.
    pub fn wake_timer_expired(&self) -> bool {
        self.wktm.cr.is_set(WKTCR::WKOVF)
    }

    pub fn clear_wake_timer_flag(&self) {
        self.wktm.cr.modify(WKTCR::WKOVF::CLEAR);
    }

    pub fn configure_pvd(&self, config: &PvdConfig) -> Result<(), ErrorCode> {
        if config.pvd1.level > 7 || config.pvd2.level > 7 {
            return Err(ErrorCode::INVAL);
        }
        let (p1, p2) = (&config.pvd1, &config.pvd2);
        let _pvd = Unlocked::new(self.sysreg, Protect::PVD);
        self.sysreg.pvdcr1.set(p1.control() | (p2.control() << 4));
        self.sysreg.pvdfcr.set(p1.filter() | (p2.filter() << 4));
        self.sysreg.pvdlcr.set(p1.level | (p2.level << 4));
        self.sysreg
            .pvdicr
            .set(u8::from(p1.maskable) | (u8::from(p2.maskable) << 4));
        Ok(())
    }

    pub fn enable_pvd(&self, pvd: Pvd, enable: bool) {
        let field = match pvd {
            Pvd::Pvd1 => PVDCR0::PVD1EN,
            Pvd::Pvd2 => PVDCR0::PVD2EN,
        };
        let _pvd = Unlocked::new(self.sysreg, Protect::PVD);
        self.sysreg.pvdcr0.modify(field.val(u8::from(enable)));
    }

    /// Route the external VCC input to PVD2.
    pub fn enable_external_vcc(&self, enable: bool) {
        let _pvd = Unlocked::new(self.sysreg, Protect::PVD);
        self.sysreg
            .pvdcr0
            .modify(PVDCR0::EXVCCINEN.val(u8::from(enable)));
    }

    pub fn pvd_detected(&self, pvd: Pvd) -> bool {
        let bit = match pvd {
            Pvd::Pvd1 => 1 << 1,
            Pvd::Pvd2 => 1 << 5,
        };
        self.sysreg.pvddsr.get() & bit != 0
    }

    pub fn clear_pvd_flag(&self, pvd: Pvd) {
        let bit = match pvd {
            Pvd::Pvd1 => 1 << 1,
            Pvd::Pvd2 => 1 << 5,
        };
        let _pvd = Unlocked::new(self.sysreg, Protect::PVD);
        let flags = self.sysreg.pvddsr.get();
        self.sysreg.pvddsr.set(flags & !bit);
    }

    /// Power the HRC domain on or off. The HRC must not be the system clock
    /// when turned off.
    pub fn hrc_power(&self, enable: bool) -> Result<(), ErrorCode> {
        if !enable && self.cmu.is_enabled(Oscillator::Hrc) {
            return Err(ErrorCode::FAIL);
        }
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg
            .pwrc1
            .modify(PWRC1::VHRCSD.val(u8::from(!enable)));
        Ok(())
    }

    /// Power the PLL domain on or off. Both PLLs must be stopped when turned
    /// off.
    pub fn pll_power(&self, enable: bool) -> Result<(), ErrorCode> {
        if !enable
            && (self.cmu.is_enabled(Oscillator::Mpll) || self.cmu.is_enabled(Oscillator::Upll))
        {
            return Err(ErrorCode::FAIL);
        }
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg
            .pwrc1
            .modify(PWRC1::VPLLSD.val(u8::from(!enable)));
        Ok(())
    }

    /// Buffer the internal voltage references for the ADC.
    pub fn power_monitor(&self, enable: bool) {
        let _power = Unlocked::new(self.sysreg, Protect::POWER);
        self.sysreg
            .pwcmr
            .modify(PWCMR::ADBUFE.val(u8::from(enable)));
    }

    pub fn set_fcg(&self, gate: Fcg, enable: bool) {
        self.cmu.set_fcg(gate, enable);
    }
}
