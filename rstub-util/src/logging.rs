/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::reload;

/// Target under which every packet sent or received is traced.
pub const PACKETS_TARGET: &str = "packets";

#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Reload(#[from] reload::Error),
}

#[derive(Debug)]
struct Levels {
    base: String,
    debug: bool,
    remote: bool,
}

impl Levels {
    fn directives(&self) -> String {
        let mut s = if self.debug {
            String::from("debug")
        } else {
            self.base.clone()
        };
        if self.remote {
            s.push(',');
            s.push_str(PACKETS_TARGET);
            s.push_str("=trace");
        }
        s
    }
}

/// Handle on the active log filter. Cloning it is cheap; every clone
/// controls the same filter.
///
/// The remote protocol can change logging at run time (`QSetLogging`, `d`),
/// so this is handed to the session delegates rather than kept in a global.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    levels: Arc<Mutex<Levels>>,
    _guard: Option<Arc<WorkerGuard>>,
}

impl std::fmt::Debug for LogControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogControl")
            .field("levels", &*self.levels.lock())
            .finish()
    }
}

impl LogControl {
    /// Creates a control for a filter built from `base`, together with the
    /// layer it controls. The layer must be installed in (or at least
    /// outlive) the subscriber for changes to take effect.
    pub fn new(
        base: &str,
        debug: bool,
        remote: bool,
    ) -> Result<(Self, reload::Layer<EnvFilter, Registry>), LogError> {
        let levels = Levels {
            base: base.to_owned(),
            debug,
            remote,
        };
        let filter = EnvFilter::try_new(levels.directives())?;
        let (layer, handle) = reload::Layer::new(filter);
        Ok((
            LogControl {
                handle,
                levels: Arc::new(Mutex::new(levels)),
                _guard: None,
            },
            layer,
        ))
    }

    pub(crate) fn keep_guard(mut self, guard: Option<WorkerGuard>) -> Self {
        self._guard = guard.map(Arc::new);
        self
    }

    fn apply(&self, levels: &Levels) -> Result<(), LogError> {
        let filter = EnvFilter::try_new(levels.directives())?;
        self.handle.reload(filter)?;
        Ok(())
    }

    /// Replaces the base filter directives, e.g. `info,rstub_target=trace`.
    pub fn set_filter(&self, directives: &str) -> Result<(), LogError> {
        // Validate before touching the stored state.
        EnvFilter::try_new(directives)?;
        let mut levels = self.levels.lock();
        levels.base = directives.to_owned();
        self.apply(&levels)
    }

    /// Turns debug-level logging and packet tracing on or off.
    pub fn configure(&self, debug: bool, remote: bool) -> Result<(), LogError> {
        let mut levels = self.levels.lock();
        levels.debug = debug;
        levels.remote = remote;
        self.apply(&levels)
    }

    /// Flips debug-level logging, returning the new setting.
    pub fn toggle_debug(&self) -> Result<bool, LogError> {
        let mut levels = self.levels.lock();
        levels.debug = !levels.debug;
        self.apply(&levels)?;
        Ok(levels.debug)
    }

    pub fn is_debug(&self) -> bool {
        self.levels.lock().debug
    }

    pub fn is_remote(&self) -> bool {
        self.levels.lock().remote
    }

    /// The directives currently in effect.
    pub fn directives(&self) -> String {
        self.levels.lock().directives()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directives_follow_flags() {
        let (ctl, _layer) = LogControl::new("warn", false, false).unwrap();
        assert_eq!(ctl.directives(), "warn");

        ctl.configure(false, true).unwrap();
        assert_eq!(ctl.directives(), "warn,packets=trace");

        assert!(ctl.toggle_debug().unwrap());
        assert_eq!(ctl.directives(), "debug,packets=trace");

        ctl.set_filter("info,rstub_target=trace").unwrap();
        assert_eq!(ctl.directives(), "debug,packets=trace");
        assert!(!ctl.toggle_debug().unwrap());
        assert_eq!(ctl.directives(), "info,rstub_target=trace,packets=trace");
    }

    #[test]
    fn rejects_bad_directives() {
        let (ctl, _layer) = LogControl::new("warn", false, false).unwrap();
        assert!(ctl.set_filter("rstub=notalevel").is_err());
        assert_eq!(ctl.directives(), "warn");
    }
}
