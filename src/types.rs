//! Core data types for the expression engine
//!
//! # Key Types
//!
//! - **`Series`**: An evenly-sampled value vector over a time window, with a
//!   parallel absent-flag vector and opaque render attributes
//! - **`MetricRequest`**: A `(metric, from, until)` fetch key
//! - **`RenderAttrs`**: Presentation flags carried through untouched
//! - **`ValuesMap`**: Fetched data keyed by the exact requests the planner
//!   emitted
//!
//! # Absent samples
//!
//! `values` and `is_absent` are always the same length. Where
//! `is_absent[i]` is set the stored value is meaningless and consumers must
//! ignore it; derived series store `0.0` there.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fetch request for one metric selector over a half-open time window.
///
/// Times are Unix seconds. The planner emits these with offsets relative to
/// a caller-chosen base window; the evaluator looks series up under the
/// exact same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricRequest {
    /// Metric selector, possibly containing glob and brace characters
    pub metric: String,
    /// Window start in Unix seconds (inclusive)
    pub from: i32,
    /// Window end in Unix seconds (exclusive)
    pub until: i32,
}

impl MetricRequest {
    /// Create a request for a metric over `[from, until)`
    pub fn new(metric: impl Into<String>, from: i32, until: i32) -> Self {
        Self {
            metric: metric.into(),
            from,
            until,
        }
    }
}

/// Presentation attributes passed through the engine untouched.
///
/// The engine assigns no meaning to these; renderers downstream do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderAttrs {
    /// Line color, if a `color()` tag set one
    pub color: Option<String>,
    /// Draw with a dashed line
    pub dashed: bool,
    /// Draw samples as full-height vertical lines
    pub draw_as_infinite: bool,
    /// Plot against the secondary Y axis
    pub second_y_axis: bool,
}

/// A fetched or derived time-series.
///
/// `start_time` is inclusive, `stop_time` exclusive, and `step_time` is the
/// sample period in seconds. For derived series
/// `values.len() == ceil((stop_time - start_time) / step_time)`; fetched
/// series carry whatever the fetcher supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Display name
    pub name: String,
    /// Window start in Unix seconds (inclusive)
    pub start_time: i32,
    /// Window end in Unix seconds (exclusive)
    pub stop_time: i32,
    /// Sample period in seconds
    pub step_time: i32,
    /// Sample values; slots flagged absent hold a meaningless `0.0`
    pub values: Vec<f64>,
    /// Parallel absent flags; `true` means no data at that position
    pub is_absent: Vec<bool>,
    /// Opaque presentation attributes
    pub attrs: RenderAttrs,
}

impl Series {
    /// Create a series with all samples present
    pub fn new(
        name: impl Into<String>,
        start_time: i32,
        stop_time: i32,
        step_time: i32,
        values: Vec<f64>,
    ) -> Self {
        let n = values.len();
        Self {
            name: name.into(),
            start_time,
            stop_time,
            step_time,
            values,
            is_absent: vec![false; n],
            attrs: RenderAttrs::default(),
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clone of this series under a new name, samples shared as-is
    pub fn renamed(&self, name: impl Into<String>) -> Series {
        let mut r = self.clone();
        r.name = name.into();
        r
    }

    /// Same-shape derived series: window, step, and attrs copied, all
    /// samples zeroed and present
    pub fn zeroed(&self, name: impl Into<String>) -> Series {
        Series {
            name: name.into(),
            start_time: self.start_time,
            stop_time: self.stop_time,
            step_time: self.step_time,
            values: vec![0.0; self.values.len()],
            is_absent: vec![false; self.values.len()],
            attrs: self.attrs.clone(),
        }
    }

    /// Mark sample `i` absent, zeroing the stored value
    pub fn set_absent(&mut self, i: usize) {
        self.values[i] = 0.0;
        self.is_absent[i] = true;
    }
}

/// Fetched series keyed by the exact requests the planner emitted.
///
/// Owned by the caller; the evaluator only reads it. One selector may map
/// to many series because of glob expansion.
pub type ValuesMap = HashMap<MetricRequest, Vec<Series>>;
