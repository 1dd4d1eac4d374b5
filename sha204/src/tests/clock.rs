// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::timing::TimingProvider;
use std::cell::Cell;
use std::rc::Rc;

/// Shared virtual time in nanoseconds.
#[derive(Clone, Debug, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ns: u64) {
        self.0.set(self.0.get() + ns);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(ms * 1_000_000);
    }
}

impl TimingProvider for Clock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as u64);
    }
}
