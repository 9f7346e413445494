// Copyright 2025 Beanwatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity metrics record and its fixed-size binary layout.

use bytes::{Buf, BufMut, BytesMut};

use crate::timespan::{TimespanCounters, WorkUnit};

/// The three overlapping windows kept for every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Never reset except by deleting the store.
    Forever,
    /// Reset once per fresh process start.
    SinceStart,
    /// Reset on every configuration reload, including the first.
    SinceRestart,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Forever, Window::SinceStart, Window::SinceRestart];

    /// Value of the `Type` constraint naming this window.
    pub fn type_name(self) -> &'static str {
        match self {
            Window::Forever => "forever",
            Window::SinceStart => "since-start",
            Window::SinceRestart => "since-restart",
        }
    }
}

/// Counters for one entity across all three windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityRecord {
    pub forever: TimespanCounters,
    pub since_start: TimespanCounters,
    pub since_restart: TimespanCounters,
}

impl EntityRecord {
    /// Size in bytes of an encoded record.
    pub const ENCODED_LEN: usize = 3 * TimespanCounters::FIELD_COUNT * 8;

    /// An all-zero record whose windows all start at `now`.
    pub fn fresh(now: i64) -> Self {
        let ts = TimespanCounters::starting_at(now);
        Self {
            forever: ts,
            since_start: ts,
            since_restart: ts,
        }
    }

    pub fn window(&self, window: Window) -> &TimespanCounters {
        match window {
            Window::Forever => &self.forever,
            Window::SinceStart => &self.since_start,
            Window::SinceRestart => &self.since_restart,
        }
    }

    /// Adds one unit of work to every window.
    pub fn apply(&mut self, unit: &WorkUnit) {
        self.forever.apply(unit);
        self.since_start.apply(unit);
        self.since_restart.apply(unit);
    }

    /// Reset rules applied at startup or reload: the since-start window only
    /// on a process start, the since-restart window always.
    pub fn reset(&mut self, is_process_start: bool, now: i64) {
        if is_process_start {
            self.since_start.reset(now);
        }
        self.since_restart.reset(now);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        for ts in [&self.forever, &self.since_start, &self.since_restart] {
            put_timespan(&mut buf, ts);
        }
        buf.to_vec()
    }

    /// Decodes a stored blob. Any length other than [`Self::ENCODED_LEN`]
    /// yields `None`, which callers treat as an absent record.
    pub fn decode(blob: &[u8]) -> Option<Self> {
        if blob.len() != Self::ENCODED_LEN {
            return None;
        }
        let mut buf = blob;
        Some(Self {
            forever: get_timespan(&mut buf),
            since_start: get_timespan(&mut buf),
            since_restart: get_timespan(&mut buf),
        })
    }
}

fn put_timespan(buf: &mut BytesMut, ts: &TimespanCounters) {
    let counters = ts
        .in_bytes
        .iter()
        .chain(&ts.in_requests)
        .chain(&ts.out_bytes)
        .chain(&ts.out_responses)
        .chain([
            &ts.in_low_bytes,
            &ts.out_low_bytes,
            &ts.total_requests,
            &ts.total_responses,
        ]);
    for v in counters {
        buf.put_u64_le(*v);
    }
    buf.put_i64_le(ts.start_time);
}

fn get_timespan(buf: &mut &[u8]) -> TimespanCounters {
    let mut ts = TimespanCounters::default();
    for slot in ts
        .in_bytes
        .iter_mut()
        .chain(ts.in_requests.iter_mut())
        .chain(ts.out_bytes.iter_mut())
        .chain(ts.out_responses.iter_mut())
    {
        *slot = buf.get_u64_le();
    }
    ts.in_low_bytes = buf.get_u64_le();
    ts.out_low_bytes = buf.get_u64_le();
    ts.total_requests = buf.get_u64_le();
    ts.total_responses = buf.get_u64_le();
    ts.start_time = buf.get_i64_le();
    ts
}
