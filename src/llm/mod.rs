// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Assistant service module for LeyIA
//!
//! Provides the abstraction over the stateful assistant service and its
//! file store, plus the OpenAI implementation and a scriptable mock.

pub mod assistant;
pub mod mock_provider;
pub mod providers;

pub use assistant::*;
