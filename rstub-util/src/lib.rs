/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Command-line arguments and logging setup shared by the rstub run modes.

pub mod commandline;
mod logging;

pub use logging::LogControl;
pub use logging::LogError;
pub use logging::PACKETS_TARGET;
