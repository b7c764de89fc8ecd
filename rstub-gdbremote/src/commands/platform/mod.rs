/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod _qGroupName;
mod _qLaunchGDBServer;
mod _qPlatform_mkdir;
mod _qPlatform_shell;
mod _qProcessInfoPID;
mod _qUserName;
mod _qfProcessInfo;

pub use _qGroupName::*;
pub use _qLaunchGDBServer::*;
pub use _qPlatform_mkdir::*;
pub use _qPlatform_shell::*;
pub use _qProcessInfoPID::*;
pub use _qUserName::*;
pub use _qfProcessInfo::*;

bare_commands! {
    /// Continues a `qfProcessInfo` listing.
    qsProcessInfo,
    qGetWorkingDir,
}
