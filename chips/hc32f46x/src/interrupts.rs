// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt source numbers of the HC32F46x.
//!
//! A source names one hardware condition. Sources are grouped by 32: group
//! `g` may be selected onto direct slots `32 + 6g ..= 37 + 6g` (any source
//! may use slots 0-31) and is multiplexed onto shared slot `128 + g`, where
//! the source's routing bit is `source % 32`.

pub const EIRQ0: u32 = 0;
pub const EIRQ1: u32 = 1;
pub const EIRQ2: u32 = 2;
pub const EIRQ3: u32 = 3;
pub const EIRQ4: u32 = 4;
pub const EIRQ5: u32 = 5;
pub const EIRQ6: u32 = 6;
pub const EIRQ7: u32 = 7;
pub const EIRQ8: u32 = 8;
pub const EIRQ9: u32 = 9;
pub const EIRQ10: u32 = 10;
pub const EIRQ11: u32 = 11;
pub const EIRQ12: u32 = 12;
pub const EIRQ13: u32 = 13;
pub const EIRQ14: u32 = 14;
pub const EIRQ15: u32 = 15;

pub const DMA1_TC0: u32 = 32;
pub const DMA1_TC1: u32 = 33;
pub const DMA1_TC2: u32 = 34;
pub const DMA1_TC3: u32 = 35;
pub const DMA2_TC0: u32 = 36;
pub const DMA2_TC1: u32 = 37;
pub const DMA2_TC2: u32 = 38;
pub const DMA2_TC3: u32 = 39;
pub const DMA1_BTC0: u32 = 40;
pub const DMA1_BTC1: u32 = 41;
pub const DMA1_BTC2: u32 = 42;
pub const DMA1_BTC3: u32 = 43;
pub const DMA2_BTC0: u32 = 44;
pub const DMA2_BTC1: u32 = 45;
pub const DMA2_BTC2: u32 = 46;
pub const DMA2_BTC3: u32 = 47;
pub const DMA1_ERR: u32 = 48;
pub const DMA2_ERR: u32 = 49;
pub const EFM_PEERR: u32 = 50;
pub const EFM_COLERR: u32 = 51;
pub const EFM_OPTEND: u32 = 52;
pub const QSPI_INTR: u32 = 54;
pub const DCU1: u32 = 55;
pub const DCU2: u32 = 56;
pub const DCU3: u32 = 57;
pub const DCU4: u32 = 58;

pub const TMR01_GCMA: u32 = 64;
pub const TMR01_GCMB: u32 = 65;
pub const TMR02_GCMA: u32 = 66;
pub const TMR02_GCMB: u32 = 67;
pub const RTC_ALM: u32 = 81;
pub const RTC_PRD: u32 = 82;
pub const XTAL32_STOP: u32 = 84;
pub const XTAL_STOP: u32 = 85;
pub const WKTM_PRD: u32 = 86;
pub const SWDT_REFUDF: u32 = 87;

pub const TMR61_GCMA: u32 = 96;
pub const TMR61_GCMB: u32 = 97;
pub const TMR61_GCMC: u32 = 98;
pub const TMR61_GCMD: u32 = 99;
pub const TMR61_GCME: u32 = 100;
pub const TMR61_GCMF: u32 = 101;
pub const TMR61_GOVF: u32 = 102;
pub const TMR61_GUDF: u32 = 103;
pub const TMR61_GDTE: u32 = 104;
pub const TMR61_SCMA: u32 = 107;
pub const TMR61_SCMB: u32 = 108;
pub const TMR62_GCMA: u32 = 112;
pub const TMR62_GCMB: u32 = 113;
pub const TMR62_GCMC: u32 = 114;
pub const TMR62_GCMD: u32 = 115;
pub const TMR62_GCME: u32 = 116;
pub const TMR62_GCMF: u32 = 117;
pub const TMR62_GOVF: u32 = 118;
pub const TMR62_GUDF: u32 = 119;
pub const TMR62_GDTE: u32 = 120;
pub const TMR62_SCMA: u32 = 123;
pub const TMR62_SCMB: u32 = 124;
pub const TMR63_GCMA: u32 = 128;
pub const TMR63_GCMB: u32 = 129;
pub const TMR63_GCMC: u32 = 130;
pub const TMR63_GCMD: u32 = 131;
pub const TMR63_GCME: u32 = 132;
pub const TMR63_GCMF: u32 = 133;
pub const TMR63_GOVF: u32 = 134;
pub const TMR63_GUDF: u32 = 135;
pub const TMR63_GDTE: u32 = 136;
pub const TMR63_SCMA: u32 = 139;
pub const TMR63_SCMB: u32 = 140;

pub const TMRA1_OVF: u32 = 256;
pub const TMRA1_UDF: u32 = 257;
pub const TMRA1_CMP: u32 = 258;
pub const TMRA2_OVF: u32 = 259;
pub const TMRA2_UDF: u32 = 260;
pub const TMRA2_CMP: u32 = 261;
pub const TMRA3_OVF: u32 = 262;
pub const TMRA3_UDF: u32 = 263;
pub const TMRA3_CMP: u32 = 264;
pub const TMRA4_OVF: u32 = 265;
pub const TMRA4_UDF: u32 = 266;
pub const TMRA4_CMP: u32 = 267;
pub const TMRA5_OVF: u32 = 268;
pub const TMRA5_UDF: u32 = 269;
pub const TMRA5_CMP: u32 = 270;
pub const TMRA6_OVF: u32 = 272;
pub const TMRA6_UDF: u32 = 273;
pub const TMRA6_CMP: u32 = 274;
pub const USBFS_GLB: u32 = 275;
pub const USART1_EI: u32 = 278;
pub const USART1_RI: u32 = 279;
pub const USART1_TI: u32 = 280;
pub const USART1_TCI: u32 = 281;
pub const USART1_RTO: u32 = 282;
pub const USART2_EI: u32 = 283;
pub const USART2_RI: u32 = 284;
pub const USART2_TI: u32 = 285;
pub const USART2_TCI: u32 = 286;
pub const USART2_RTO: u32 = 287;

pub const USART3_EI: u32 = 288;
pub const USART3_RI: u32 = 289;
pub const USART3_TI: u32 = 290;
pub const USART3_TCI: u32 = 291;
pub const USART3_RTO: u32 = 292;
pub const USART4_EI: u32 = 293;
pub const USART4_RI: u32 = 294;
pub const USART4_TI: u32 = 295;
pub const USART4_TCI: u32 = 296;
pub const USART4_RTO: u32 = 297;
pub const SPI1_SPRI: u32 = 299;
pub const SPI1_SPTI: u32 = 300;
pub const SPI1_SPII: u32 = 301;
pub const SPI1_SPEI: u32 = 302;
pub const SPI2_SPRI: u32 = 304;
pub const SPI2_SPTI: u32 = 305;
pub const SPI2_SPII: u32 = 306;
pub const SPI2_SPEI: u32 = 307;
pub const SPI3_SPRI: u32 = 309;
pub const SPI3_SPTI: u32 = 310;
pub const SPI3_SPII: u32 = 311;
pub const SPI3_SPEI: u32 = 312;
pub const SPI4_SPRI: u32 = 314;
pub const SPI4_SPTI: u32 = 315;
pub const SPI4_SPII: u32 = 316;
pub const SPI4_SPEI: u32 = 317;

pub const TMR41_GCMUH: u32 = 320;
pub const TMR41_GCMUL: u32 = 321;
pub const TMR41_GCMVH: u32 = 322;
pub const TMR41_GCMVL: u32 = 323;
pub const TMR41_GCMWH: u32 = 324;
pub const TMR41_GCMWL: u32 = 325;
pub const TMR41_GOVF: u32 = 326;
pub const TMR41_GUDF: u32 = 327;
pub const TMR41_RLOU: u32 = 328;
pub const TMR41_RLOV: u32 = 329;
pub const TMR41_RLOW: u32 = 330;
pub const TMR42_GCMUH: u32 = 336;
pub const TMR42_GCMUL: u32 = 337;
pub const TMR42_GCMVH: u32 = 338;
pub const TMR42_GCMVL: u32 = 339;
pub const TMR42_GCMWH: u32 = 340;
pub const TMR42_GCMWL: u32 = 341;
pub const TMR42_GOVF: u32 = 342;
pub const TMR42_GUDF: u32 = 343;
pub const TMR42_RLOU: u32 = 344;
pub const TMR42_RLOV: u32 = 345;
pub const TMR42_RLOW: u32 = 346;
pub const TMR43_GCMUH: u32 = 352;
pub const TMR43_GCMUL: u32 = 353;
pub const TMR43_GCMVH: u32 = 354;
pub const TMR43_GCMVL: u32 = 355;
pub const TMR43_GCMWH: u32 = 356;
pub const TMR43_GCMWL: u32 = 357;
pub const TMR43_GOVF: u32 = 358;
pub const TMR43_GUDF: u32 = 359;
pub const TMR43_RLOU: u32 = 360;
pub const TMR43_RLOV: u32 = 361;
pub const TMR43_RLOW: u32 = 362;

pub const EMB_GR0: u32 = 390;
pub const EMB_GR1: u32 = 391;
pub const EMB_GR2: u32 = 392;
pub const EMB_GR3: u32 = 393;
pub const I2S1_TXIRQOUT: u32 = 400;
pub const I2S1_RXIRQOUT: u32 = 401;
pub const I2S1_ERRIRQOUT: u32 = 402;
pub const I2S2_TXIRQOUT: u32 = 403;
pub const I2S2_RXIRQOUT: u32 = 404;
pub const I2S2_ERRIRQOUT: u32 = 405;
pub const I2S3_TXIRQOUT: u32 = 406;
pub const I2S3_RXIRQOUT: u32 = 407;
pub const I2S3_ERRIRQOUT: u32 = 408;
pub const I2S4_TXIRQOUT: u32 = 409;
pub const I2S4_RXIRQOUT: u32 = 410;
pub const I2S4_ERRIRQOUT: u32 = 411;

pub const ACMP1: u32 = 416;
pub const ACMP2: u32 = 417;
pub const ACMP3: u32 = 418;
pub const I2C1_RXI: u32 = 420;
pub const I2C1_TXI: u32 = 421;
pub const I2C1_TEI: u32 = 422;
pub const I2C1_EEI: u32 = 423;
pub const I2C2_RXI: u32 = 424;
pub const I2C2_TXI: u32 = 425;
pub const I2C2_TEI: u32 = 426;
pub const I2C2_EEI: u32 = 427;
pub const I2C3_RXI: u32 = 428;
pub const I2C3_TXI: u32 = 429;
pub const I2C3_TEI: u32 = 430;
pub const I2C3_EEI: u32 = 431;
pub const USART1_WUPI: u32 = 432;
pub const PVD1: u32 = 433;
pub const PVD2: u32 = 434;
pub const FCMFERRI: u32 = 436;
pub const FCMMENDI: u32 = 437;
pub const FCMCOVFI: u32 = 438;
pub const WDT_REFUDF: u32 = 439;

pub const ADC1_EOCA: u32 = 448;
pub const ADC1_EOCB: u32 = 449;
pub const ADC1_CHCMP: u32 = 450;
pub const ADC1_SEQCMP: u32 = 451;
pub const ADC2_EOCA: u32 = 452;
pub const ADC2_EOCB: u32 = 453;
pub const ADC2_CHCMP: u32 = 454;
pub const ADC2_SEQCMP: u32 = 455;

pub const SDIOC1_SD: u32 = 482;
pub const SDIOC2_SD: u32 = 485;
pub const CAN_INT: u32 = 486;

/// One past the highest source number that has a routing bit.
pub const NUM_SOURCES: u32 = 512;

/// Shared slot that multiplexes `source`.
pub const fn shared_slot(source: u32) -> u32 {
    128 + source / 32
}

/// Routing bit of `source` within its shared slot's bitmap.
pub const fn route_mask(source: u32) -> u32 {
    1 << (source & 31)
}

/// First direct slot above 31 that `source` may be selected onto. The window
/// is six slots wide.
pub const fn direct_window_start(source: u32) -> u32 {
    source / 32 * 6 + 32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_numbering_matches_slot_and_bit() {
        assert_eq!(shared_slot(EIRQ5), 128);
        assert_eq!(shared_slot(DMA1_TC0), 129);
        assert_eq!(route_mask(DMA1_TC0), 1);
        assert_eq!(shared_slot(USART1_RI), 136);
        assert_eq!(route_mask(USART1_RI), 1 << 23);
        assert_eq!(shared_slot(CAN_INT), 143);
    }

    #[test]
    fn direct_windows_are_six_slots_per_group() {
        assert_eq!(direct_window_start(EIRQ5), 32);
        assert_eq!(direct_window_start(DMA1_TC0), 38);
        assert_eq!(direct_window_start(CAN_INT), 32 + 15 * 6);
    }
}
