/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod _QDisableRandomization;
mod _QEnvironment;
mod _QEnvironmentHexEncoded;
mod _QSetWorkingDir;
mod _r;
mod _r_upper;
mod _vAttach;
mod _vRun;

pub use _QDisableRandomization::*;
pub use _QEnvironment::*;
pub use _QEnvironmentHexEncoded::*;
pub use _QSetWorkingDir::*;
pub use _r::*;
pub use _r_upper::*;
pub use _vAttach::*;
pub use _vRun::*;

bare_commands! {
    /// `!`: keep the session alive across kills and restarts.
    ExclamationMark,
}
