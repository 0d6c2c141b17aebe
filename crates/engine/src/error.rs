// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! Re-exports the core error taxonomy as the engine's `Result` alias.
//!
//! The engine adds no error kinds of its own: every failure a caller can
//! observe is already one of `taskyard_core::Error`'s variants.

pub use taskyard_core::{Error, SpawnError, UserError};

pub type Result<T> = std::result::Result<T, Error>;
