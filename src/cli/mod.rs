// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI module for LeyIA
//!
//! Handles command-line argument parsing and chat input classification.

pub mod args;
pub mod input;

pub use args::*;
pub use input::{parse_input, ReplInput};
