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

use beanwatch_common::Property;
use chrono::{DateTime, Utc};

/// Format used for the human-readable `StartDate` property.
pub const START_DATE_FORMAT: &str = "%A, %d-%b-%Y %H:%M:%S %Z";

/// Status codes that get their own byte and response buckets.
pub const TRACKED_STATUSES: [u16; 7] = [200, 301, 302, 401, 403, 404, 500];

/// Method buckets, in property order.
const METHOD_LABELS: [&str; 4] = ["GET", "HEAD", "POST", "PUT"];

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Request method of a unit of work, as far as the counters care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    /// Any other method; counted in the totals only.
    Other,
}

impl Method {
    /// Maps an HTTP method token (case-sensitive, as on the wire).
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            _ => Method::Other,
        }
    }
}

/// One completed unit of work, as observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub method: Method,
    /// A GET answered with headers only counts as HEAD.
    pub header_only: bool,
    pub status: u16,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Bytes sent by the final response of an internal redirect chain.
    pub last_bytes_out: Option<u64>,
}

impl WorkUnit {
    pub fn new(method: Method, status: u16) -> Self {
        Self {
            method,
            header_only: false,
            status,
            bytes_in: 0,
            bytes_out: 0,
            last_bytes_out: None,
        }
    }

    pub fn with_bytes_in(mut self, bytes: u64) -> Self {
        self.bytes_in = bytes;
        self
    }

    pub fn with_bytes_out(mut self, bytes: u64) -> Self {
        self.bytes_out = bytes;
        self
    }

    pub fn with_header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    pub fn with_last_bytes_out(mut self, bytes: u64) -> Self {
        self.last_bytes_out = Some(bytes);
        self
    }

    /// Outbound bytes charged for this unit. Falls back to the last
    /// redirect response when the original response sent nothing.
    pub fn effective_bytes_out(&self) -> u64 {
        if self.bytes_out != 0 {
            self.bytes_out
        } else {
            self.last_bytes_out.unwrap_or(0)
        }
    }

    fn method_bucket(&self) -> Option<usize> {
        match (self.method, self.header_only) {
            (Method::Get, true) | (Method::Head, _) => Some(1),
            (Method::Get, false) => Some(0),
            (Method::Post, _) => Some(2),
            (Method::Put, _) => Some(3),
            (Method::Other, _) => None,
        }
    }

    fn status_bucket(&self) -> Option<usize> {
        TRACKED_STATUSES.iter().position(|&s| s == self.status)
    }
}

/// Counters accumulated over one measurement window.
///
/// Per-method and per-status buckets are partial; the four totals count
/// every unit of work, so each total is at least the sum of its buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimespanCounters {
    pub in_bytes: [u64; 4],
    pub in_requests: [u64; 4],
    pub out_bytes: [u64; 7],
    pub out_responses: [u64; 7],
    pub in_low_bytes: u64,
    pub out_low_bytes: u64,
    pub total_requests: u64,
    pub total_responses: u64,
    /// Window start, microseconds since the Unix epoch.
    pub start_time: i64,
}

impl TimespanCounters {
    /// Number of `u64`-sized fields in the fixed binary layout.
    pub const FIELD_COUNT: usize = 4 + 4 + 7 + 7 + 4 + 1;

    /// A zeroed window starting at `start_time`.
    pub fn starting_at(start_time: i64) -> Self {
        Self {
            start_time,
            ..Self::default()
        }
    }

    /// Zeroes every counter and restarts the window at `now`.
    pub fn reset(&mut self, now: i64) {
        *self = Self::starting_at(now);
    }

    /// Adds one unit of work.
    pub fn apply(&mut self, unit: &WorkUnit) {
        let bytes_out = unit.effective_bytes_out();

        if let Some(i) = unit.method_bucket() {
            self.in_bytes[i] = self.in_bytes[i].saturating_add(unit.bytes_in);
            self.in_requests[i] = self.in_requests[i].saturating_add(1);
        }

        if let Some(i) = unit.status_bucket() {
            self.out_bytes[i] = self.out_bytes[i].saturating_add(bytes_out);
            self.out_responses[i] = self.out_responses[i].saturating_add(1);
        }

        self.in_low_bytes = self.in_low_bytes.saturating_add(unit.bytes_in);
        self.out_low_bytes = self.out_low_bytes.saturating_add(bytes_out);
        self.total_requests = self.total_requests.saturating_add(1);
        self.total_responses = self.total_responses.saturating_add(1);
    }

    pub fn requests_for(&self, method: Method) -> u64 {
        let unit = WorkUnit::new(method, 0);
        unit.method_bucket().map_or(0, |i| self.in_requests[i])
    }

    pub fn responses_for(&self, status: u16) -> u64 {
        TRACKED_STATUSES
            .iter()
            .position(|&s| s == status)
            .map_or(0, |i| self.out_responses[i])
    }

    /// Renders the window as bean properties, in the fixed published order.
    ///
    /// `now` is used for `StartElapsed`.
    pub fn properties(&self, now: i64) -> Vec<Property> {
        let mut props = Vec::with_capacity(Self::FIELD_COUNT + 2);

        for (label, value) in METHOD_LABELS.iter().zip(self.in_bytes) {
            props.push(Property::u64(format!("InBytes{}", label), value));
        }
        for (label, value) in METHOD_LABELS.iter().zip(self.in_requests) {
            props.push(Property::u64(format!("InRequests{}", label), value));
        }
        for (status, value) in TRACKED_STATUSES.iter().zip(self.out_bytes) {
            props.push(Property::u64(format!("OutBytes{}", status), value));
        }
        for (status, value) in TRACKED_STATUSES.iter().zip(self.out_responses) {
            props.push(Property::u64(format!("OutResponses{}", status), value));
        }

        props.push(Property::u64("InLowBytes", self.in_low_bytes));
        props.push(Property::u64("OutLowBytes", self.out_low_bytes));
        props.push(Property::u64("InRequests", self.total_requests));
        props.push(Property::u64("OutResponses", self.total_responses));

        props.push(Property::string("StartDate", format_start_date(self.start_time)));
        props.push(Property::u64("StartTime", self.start_time.max(0) as u64));
        props.push(Property::u64(
            "StartElapsed",
            now.saturating_sub(self.start_time).max(0) as u64,
        ));

        props
    }
}

fn format_start_date(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|dt| dt.format(START_DATE_FORMAT).to_string())
        .unwrap_or_default()
}
