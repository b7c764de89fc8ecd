/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod _QAgent;
mod _QAllow;
mod _QNonStop;
mod _QPassSignals;
mod _QProgramSignals;
mod _QThreadEvents;
mod _Qbtrace;
mod _b;
mod _c;
mod _c_upper;
mod _d;
mod _d_upper;
mod _g;
mod _g_upper;
mod _h_upper;
mod _k;
mod _m;
mod _m_upper;
mod _p;
mod _p_upper;
mod _qAttached;
mod _qCRC;
mod _qGetTIBAddr;
mod _qGetTLSAddr;
mod _qSearch;
mod _qSupported;
mod _qSymbol;
mod _qThreadExtraInfo;
mod _qXfer;
mod _s;
mod _s_upper;
mod _t;
mod _t_upper;
mod _vCont;
mod _vFile;
mod _vFlash;
mod _vKill;
mod _x_upper;
mod _z;
mod _z_upper;

pub use _QAgent::*;
pub use _QAllow::*;
pub use _QNonStop::*;
pub use _QPassSignals::*;
pub use _QProgramSignals::*;
pub use _QThreadEvents::*;
pub use _Qbtrace::*;
pub use _b::*;
pub use _c::*;
pub use _c_upper::*;
pub use _d::*;
pub use _d_upper::*;
pub use _g::*;
pub use _g_upper::*;
pub use _h_upper::*;
pub use _k::*;
pub use _m::*;
pub use _m_upper::*;
pub use _p::*;
pub use _p_upper::*;
pub use _qAttached::*;
pub use _qCRC::*;
pub use _qGetTIBAddr::*;
pub use _qGetTLSAddr::*;
pub use _qSearch::*;
pub use _qSupported::*;
pub use _qSymbol::*;
pub use _qThreadExtraInfo::*;
pub use _qXfer::*;
pub use _s::*;
pub use _s_upper::*;
pub use _t::*;
pub use _t_upper::*;
pub use _vCont::*;
pub use _vFile::*;
pub use _vFlash::*;
pub use _vKill::*;
pub use _x_upper::*;
pub use _z::*;
pub use _z_upper::*;

bare_commands! {
    /// `?`: why the target last stopped.
    QuestionMark,
    QStartNoAckMode,
    qOffsets,
    qC,
    qfThreadInfo,
    qsThreadInfo,
}
