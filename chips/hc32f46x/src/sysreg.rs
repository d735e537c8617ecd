// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System control register blocks.
//!
//! The clock (CMU) and power (PWC) controllers share one register block at
//! `0x4005_4000`, together with the register write-protect key (`FPRC`). The
//! function clock gates live in the MSTP block, the flash wait cycles in the
//! EFM block and the wake-up timer in its own block.

use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    pub SysregRegisters {
        (0x000 => _reserved0),
        (0x008 => pub ramopm: ReadWrite<u16>),
        (0x00A => _reserved1),
        (0x00C => pub stpmcr: ReadWrite<u16, STPMCR::Register>),
        (0x00E => _reserved2),
        (0x010 => pub pericksel: ReadWrite<u16, PERICKSEL::Register>),
        (0x012 => pub i2scksel: ReadWrite<u16>),
        (0x014 => pub rampc0: ReadWrite<u32>),
        (0x018 => _reserved3),
        (0x020 => pub scfgr: ReadWrite<u32, SCFGR::Register>),
        (0x024 => pub ufsckcfgr: ReadWrite<u16, UFSCKCFGR::Register>),
        (0x026 => pub ckswr: ReadWrite<u8, CKSWR::Register>),
        (0x027 => _reserved4),
        (0x02A => pub pllcr: ReadWrite<u8, OSCSTP::Register>),
        (0x02B => _reserved5),
        (0x02E => pub upllcr: ReadWrite<u8, OSCSTP::Register>),
        (0x02F => _reserved6),
        (0x032 => pub xtalcr: ReadWrite<u8, OSCSTP::Register>),
        (0x033 => _reserved7),
        (0x036 => pub hrccr: ReadWrite<u8, OSCSTP::Register>),
        (0x037 => _reserved8),
        (0x038 => pub mrccr: ReadWrite<u8, OSCSTP::Register>),
        (0x039 => _reserved9),
        (0x03C => pub oscstbsr: ReadWrite<u8, OSCSTBSR::Register>),
        (0x03D => pub mco1cfgr: ReadWrite<u8, MCOCFGR::Register>),
        (0x03E => pub mco2cfgr: ReadWrite<u8, MCOCFGR::Register>),
        (0x03F => pub tpiuckcfgr: ReadWrite<u8, TPIUCKCFGR::Register>),
        (0x040 => pub xtalstdcr: ReadWrite<u8, XTALSTDCR::Register>),
        (0x041 => pub xtalstdsr: ReadWrite<u8, XTALSTDSR::Register>),
        (0x042 => _reserved10),
        (0x061 => pub mrctrm: ReadWrite<u8>),
        (0x062 => pub hrctrm: ReadWrite<u8>),
        (0x063 => _reserved11),
        (0x0A2 => pub xtalstbcr: ReadWrite<u8>),
        (0x0A3 => _reserved12),
        (0x100 => pub pllcfgr: ReadWrite<u32, PLLCFGR::Register>),
        (0x104 => pub upllcfgr: ReadWrite<u32, PLLCFGR::Register>),
        (0x108 => _reserved13),
        (0x3FE => pub fprc: ReadWrite<u16>),
        (0x400 => pub pwrc0: ReadWrite<u8, PWRC0::Register>),
        (0x401 => pub pwrc1: ReadWrite<u8, PWRC1::Register>),
        (0x402 => pub pwrc2: ReadWrite<u8, PWRC2::Register>),
        (0x403 => pub pwrc3: ReadWrite<u8, PWRC3::Register>),
        (0x404 => pub pdwke0: ReadWrite<u8>),
        (0x405 => pub pdwke1: ReadWrite<u8>),
        (0x406 => pub pdwke2: ReadWrite<u8>),
        (0x407 => pub pdwkes: ReadWrite<u8>),
        (0x408 => pub pdwkf0: ReadWrite<u8>),
        (0x409 => pub pdwkf1: ReadWrite<u8>),
        (0x40A => pub pwcmr: ReadWrite<u8, PWCMR::Register>),
        (0x40B => _reserved14),
        (0x410 => pub xtalcfgr: ReadWrite<u8, XTALCFGR::Register>),
        (0x411 => _reserved15),
        (0x412 => pub pvdcr0: ReadWrite<u8, PVDCR0::Register>),
        (0x413 => pub pvdcr1: ReadWrite<u8>),
        (0x414 => pub pvdfcr: ReadWrite<u8>),
        (0x415 => pub pvdlcr: ReadWrite<u8>),
        (0x416 => pub pvdicr: ReadWrite<u8>),
        (0x417 => pub pvddsr: ReadWrite<u8>),
        (0x418 => _reserved16),
        (0x420 => pub xtal32cr: ReadWrite<u8, OSCSTP::Register>),
        (0x421 => pub xtal32cfgr: ReadWrite<u8, XTAL32CFGR::Register>),
        (0x422 => _reserved17),
        (0x425 => pub xtal32nfr: ReadWrite<u8>),
        (0x426 => _reserved18),
        (0x427 => pub lrccr: ReadWrite<u8, OSCSTP::Register>),
        (0x428 => _reserved19),
        (0x429 => pub lrctrm: ReadWrite<u8>),
        (0x42A => _reserved20),
        (0x42B => pub xtal32cs: ReadWrite<u8, XTAL32CS::Register>),
        (0x42C => @END),
    },

    pub MstpRegisters {
        (0x00 => pub fcg0: ReadWrite<u32>),
        (0x04 => pub fcg1: ReadWrite<u32>),
        (0x08 => pub fcg2: ReadWrite<u32>),
        (0x0C => pub fcg3: ReadWrite<u32>),
        (0x10 => pub fcg0pc: ReadWrite<u32>),
        (0x14 => @END),
    },

    pub EfmRegisters {
        (0x00 => pub faprt: ReadWrite<u32>),
        (0x04 => pub fstp: ReadWrite<u32>),
        (0x08 => pub frmc: ReadWrite<u32, FRMC::Register>),
        (0x0C => @END),
    },

    pub WktmRegisters {
        (0x00 => pub cr: ReadWrite<u16, WKTCR::Register>),
        (0x02 => @END),
    }
}

register_bitfields![u8,
    pub CKSWR [
        CKSW OFFSET(0) NUMBITS(3) [
            Hrc = 0,
            Mrc = 1,
            Lrc = 2,
            Xtal = 3,
            Xtal32 = 4,
            Mpll = 5
        ]
    ],
    /// Stop bit shared by every oscillator control register.
    pub OSCSTP [
        STP OFFSET(0) NUMBITS(1) []
    ],
    pub OSCSTBSR [
        HRCSTBF OFFSET(0) NUMBITS(1) [],
        XTALSTBF OFFSET(3) NUMBITS(1) [],
        MPLLSTBF OFFSET(5) NUMBITS(1) [],
        UPLLSTBF OFFSET(6) NUMBITS(1) []
    ],
    pub MCOCFGR [
        MCOSEL OFFSET(0) NUMBITS(4) [],
        MCODIV OFFSET(4) NUMBITS(3) [],
        MCOEN OFFSET(7) NUMBITS(1) []
    ],
    pub TPIUCKCFGR [
        TPIUCKS OFFSET(0) NUMBITS(2) [],
        TPIUCKOE OFFSET(7) NUMBITS(1) []
    ],
    pub XTALSTDCR [
        XTALSTDIE OFFSET(0) NUMBITS(1) [],
        XTALSTDRE OFFSET(1) NUMBITS(1) [],
        XTALSTDRIS OFFSET(2) NUMBITS(1) [],
        XTALSTDE OFFSET(7) NUMBITS(1) []
    ],
    pub XTALSTDSR [
        XTALSTDF OFFSET(0) NUMBITS(1) []
    ],
    pub XTALCFGR [
        XTALDRV OFFSET(4) NUMBITS(2) [],
        XTALMS OFFSET(6) NUMBITS(1) [],
        SUPDRV OFFSET(7) NUMBITS(1) []
    ],
    pub XTAL32CFGR [
        XTAL32DRV OFFSET(0) NUMBITS(3) [],
        XTAL32SUPDRV OFFSET(3) NUMBITS(1) []
    ],
    pub XTAL32CS [
        CSDIS OFFSET(7) NUMBITS(1) []
    ],
    pub PWRC0 [
        PDMDS OFFSET(0) NUMBITS(2) [],
        VVDRSD OFFSET(2) NUMBITS(1) [],
        RETRAMSD OFFSET(3) NUMBITS(1) [],
        IORTN OFFSET(4) NUMBITS(2) [],
        PWDN OFFSET(7) NUMBITS(1) []
    ],
    pub PWRC1 [
        VPLLSD OFFSET(0) NUMBITS(1) [],
        VHRCSD OFFSET(1) NUMBITS(1) [],
        STPDAS OFFSET(6) NUMBITS(2) []
    ],
    pub PWRC2 [
        DDAS OFFSET(0) NUMBITS(4) [],
        DVS OFFSET(4) NUMBITS(2) []
    ],
    pub PWRC3 [
        PDTS OFFSET(2) NUMBITS(1) []
    ],
    pub PWCMR [
        ADBUFE OFFSET(7) NUMBITS(1) []
    ],
    pub PVDCR0 [
        EXVCCINEN OFFSET(0) NUMBITS(1) [],
        PVD1EN OFFSET(5) NUMBITS(1) [],
        PVD2EN OFFSET(6) NUMBITS(1) []
    ]
];

register_bitfields![u16,
    pub STPMCR [
        FLNWT OFFSET(0) NUMBITS(1) [],
        CKSMRC OFFSET(1) NUMBITS(1) [],
        STOP OFFSET(15) NUMBITS(1) []
    ],
    pub PERICKSEL [
        PERICKSEL OFFSET(0) NUMBITS(4) []
    ],
    pub UFSCKCFGR [
        USBCKS OFFSET(4) NUMBITS(4) []
    ],
    pub WKTCR [
        WKTMCMP OFFSET(0) NUMBITS(12) [],
        WKOVF OFFSET(12) NUMBITS(1) [],
        WKCKS OFFSET(13) NUMBITS(2) [],
        WKTCE OFFSET(15) NUMBITS(1) []
    ]
];

register_bitfields![u32,
    pub SCFGR [
        PCLK0S OFFSET(0) NUMBITS(3) [],
        PCLK1S OFFSET(4) NUMBITS(3) [],
        PCLK2S OFFSET(8) NUMBITS(3) [],
        PCLK3S OFFSET(12) NUMBITS(3) [],
        PCLK4S OFFSET(16) NUMBITS(3) [],
        EXCKS OFFSET(20) NUMBITS(3) [],
        HCLKS OFFSET(24) NUMBITS(3) []
    ],
    /// Layout of both `PLLCFGR` and `UPLLCFGR`; `PLLSRC` only exists in the
    /// former and selects the input of both PLLs.
    pub PLLCFGR [
        PLLM OFFSET(0) NUMBITS(5) [],
        PLLSRC OFFSET(7) NUMBITS(1) [
            Xtal = 0,
            Hrc = 1
        ],
        PLLN OFFSET(8) NUMBITS(9) [],
        PLLR OFFSET(20) NUMBITS(4) [],
        PLLQ OFFSET(24) NUMBITS(4) [],
        PLLP OFFSET(28) NUMBITS(4) []
    ],
    pub FRMC [
        FLWT OFFSET(0) NUMBITS(4) []
    ]
];

pub const SYSREG_BASE: StaticRef<SysregRegisters> =
    unsafe { StaticRef::new(0x4005_4000 as *const SysregRegisters) };

pub const MSTP_BASE: StaticRef<MstpRegisters> =
    unsafe { StaticRef::new(0x4004_8000 as *const MstpRegisters) };

pub const EFM_BASE: StaticRef<EfmRegisters> =
    unsafe { StaticRef::new(0x4001_0400 as *const EfmRegisters) };

pub const WKTM_BASE: StaticRef<WktmRegisters> =
    unsafe { StaticRef::new(0x4004_C000 as *const WktmRegisters) };
