/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use parking_lot::Mutex;
use rstub_target::Interrupt;

#[derive(Default)]
struct LinkState {
    /// A resume command was handed to the session and has not answered yet.
    running: bool,
    /// An interrupt arrived before the session could arm the link.
    pending: bool,
    interrupter: Option<Arc<dyn Interrupt>>,
}

/// Out-of-band path between a connection's reader and its session.
///
/// While the session blocks in a resume, the reader keeps reading; an
/// interrupt byte goes through here to the target instead of queueing behind
/// the blocked command.
#[derive(Default)]
pub struct SessionLink {
    state: Mutex<LinkState>,
}

impl SessionLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader side: a resume command is about to be queued.
    pub fn expect_resume(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.pending = false;
    }

    /// Reader side: delivers an interrupt to the running target. Returns
    /// false when nothing is running, in which case the interrupt should go
    /// to the session as a regular packet.
    pub fn interrupt(&self) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            return false;
        }
        match &state.interrupter {
            Some(interrupter) => {
                if let Err(err) = interrupter.interrupt() {
                    tracing::warn!("failed to interrupt target: {}", err);
                }
            }
            None => state.pending = true,
        }
        true
    }

    /// Session side: the target is about to run. An interrupt that raced
    /// ahead of this call is delivered now.
    pub fn arm(&self, interrupter: Option<Arc<dyn Interrupt>>) {
        let mut state = self.state.lock();
        state.running = true;
        if state.pending {
            state.pending = false;
            match &interrupter {
                Some(interrupter) => {
                    if let Err(err) = interrupter.interrupt() {
                        tracing::warn!("failed to interrupt target: {}", err);
                    }
                }
                None => tracing::debug!("dropping interrupt, target cannot be interrupted"),
            }
        }
        state.interrupter = interrupter;
    }

    /// Session side: the resume answered.
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.pending = false;
        state.interrupter = None;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use rstub_target::ErrorCode;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Interrupt for Counter {
        fn interrupt(&self) -> Result<(), ErrorCode> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn idle_interrupts_go_to_the_session() {
        let link = SessionLink::new();
        assert!(!link.interrupt());
    }

    #[test]
    fn early_interrupt_fires_on_arm() {
        let link = SessionLink::new();
        let counter = Arc::new(Counter::default());

        link.expect_resume();
        assert!(link.interrupt());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        link.arm(Some(counter.clone() as Arc<dyn Interrupt>));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(link.interrupt());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        link.disarm();
        assert!(!link.is_running());
        assert!(!link.interrupt());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
