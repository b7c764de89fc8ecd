/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod _QLaunchArch;
mod _QRestoreRegisterState;
mod _QSaveRegisterState;
mod _QSetDisableASLR;
mod _QSetEnableAsyncProfiling;
mod _QSetLogging;
mod _QSetMaxPacketSize;
mod _QSetMaxPayloadSize;
mod _QSetSTD;
mod _QSyncThreadState;
mod __m;
mod __m_upper;
mod _a_upper;
mod _jThreadsInfo;
mod _qGetProfileData;
mod _qMemoryRegionInfo;
mod _qModuleInfo;
mod _qRegisterInfo;
mod _qThreadStopInfo;
mod _qWatchpointSupportInfo;
mod _x;

pub use _QLaunchArch::*;
pub use _QRestoreRegisterState::*;
pub use _QSaveRegisterState::*;
pub use _QSetDisableASLR::*;
pub use _QSetEnableAsyncProfiling::*;
pub use _QSetLogging::*;
pub use _QSetMaxPacketSize::*;
pub use _QSetMaxPayloadSize::*;
pub use _QSetSTD::*;
pub use _QSyncThreadState::*;
pub use __m::*;
pub use __m_upper::*;
pub use _a_upper::*;
pub use _jThreadsInfo::*;
pub use _qGetProfileData::*;
pub use _qMemoryRegionInfo::*;
pub use _qModuleInfo::*;
pub use _qRegisterInfo::*;
pub use _qThreadStopInfo::*;
pub use _qWatchpointSupportInfo::*;
pub use _x::*;

bare_commands! {
    qHostInfo,
    qProcessInfo,
    qShlibInfoAddr,
    QThreadSuffixSupported,
    QListThreadsInStopReply,
    QEnableErrorStrings,
    qGDBServerVersion,
    qVAttachOrWaitSupported,
    /// Whether the last `A` launch worked.
    qLaunchSuccess,
}
