// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Shared kernel types for the HC32F46x chip crates.
//!
//! The kernel crate holds what the architecture and chip crates have in
//! common: the error type returned by every fallible hardware operation, the
//! `StaticRef` handle used for memory-mapped register blocks, and the traits
//! that separate chip logic from the core it runs on.

#![cfg_attr(not(test), no_std)]

pub mod errorcode;
pub mod platform;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
pub use crate::platform::chip::{Chip, InterruptService, Processor};
