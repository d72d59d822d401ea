//! Series kernel: windowed moments, percentile selection, value reducers,
//! correlation statistics, and the bounded top-N heap
//!
//! Everything here is pure and operates on plain `f64` slices. Missing
//! samples are represented as NaN at this layer; callers translate NaN back
//! into absent flags before results leave the evaluator.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

// ============================================================================
// Windowed Moments
// ============================================================================

/// Fixed-size ring buffer tracking running sum and sum of squares.
///
/// NaN pushes are counted separately and excluded from the moments, so a
/// window with missing samples still yields the statistics of its present
/// ones.
///
/// The standard deviation uses `sqrt(n*Σx² − (Σx)²) / n` — biased and
/// slightly unstable, preserved because downstream consumers expect exactly
/// these values.
#[derive(Debug, Clone)]
pub struct Windowed {
    data: Vec<f64>,
    head: usize,
    length: usize,
    sum: f64,
    sum_sq: f64,
    nans: usize,
}

impl Windowed {
    /// Create a window of `size` slots
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size],
            head: 0,
            length: 0,
            sum: 0.0,
            sum_sq: 0.0,
            nans: 0,
        }
    }

    /// Push a value, evicting the oldest once the window is full
    pub fn push(&mut self, n: f64) {
        let old = self.data[self.head];

        self.length += 1;

        self.data[self.head] = n;
        self.head += 1;
        if self.head >= self.data.len() {
            self.head = 0;
        }

        if !old.is_nan() {
            self.sum -= old;
            self.sum_sq -= old * old;
        } else {
            self.nans -= 1;
        }

        if !n.is_nan() {
            self.sum += n;
            self.sum_sq += n * n;
        } else {
            self.nans += 1;
        }
    }

    /// Number of present (non-NaN) values currently in the window
    pub fn len(&self) -> usize {
        if self.length < self.data.len() {
            return self.length - self.nans;
        }
        self.data.len() - self.nans
    }

    /// Whether the window holds no present values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Biased standard deviation of the present values
    pub fn stdev(&self) -> f64 {
        let l = self.len();
        if l == 0 {
            return 0.0;
        }

        let n = l as f64;
        (n * self.sum_sq - self.sum * self.sum).sqrt() / n
    }

    /// Mean of the present values (NaN when the window is empty)
    pub fn mean(&self) -> f64 {
        self.sum / self.len() as f64
    }

    /// The raw slot contents, NaN where a pushed value was missing
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

// ============================================================================
// Percentile Selection
// ============================================================================

/// The p-th percentile of `values` via partial selection.
///
/// `k = (len-1)*p/100`; the smallest `ceil(k)+1` elements are selected in
/// place, and the largest of them is the answer. With `interpolate`, a
/// fractional `k` blends the two largest selected elements linearly.
pub fn percentile(values: &mut [f64], percent: f64, interpolate: bool) -> f64 {
    if values.is_empty() || !(0.0..=100.0).contains(&percent) {
        return f64::NAN;
    }
    if values.len() == 1 {
        return values[0];
    }

    let k = ((values.len() - 1) as f64 * percent) / 100.0;
    let length = (k.ceil() as usize + 1).min(values.len());

    values.select_nth_unstable_by(length - 1, |a, b| {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    });

    let mut top = f64::NEG_INFINITY;
    let mut second = f64::NEG_INFINITY;
    for &v in &values[..length] {
        if v > top {
            second = top;
            top = v;
        } else if v > second {
            second = v;
        }
    }

    let remainder = k - k.trunc();
    if remainder == 0.0 || !interpolate {
        top
    } else {
        top * remainder + second * (1.0 - remainder)
    }
}

// ============================================================================
// Value Reducers
// ============================================================================

/// Largest present value (-inf when all are absent)
pub fn max_value(values: &[f64], absent: &[bool]) -> f64 {
    let mut m = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if absent[i] {
            continue;
        }
        if v > m {
            m = v;
        }
    }
    m
}

/// Smallest present value (+inf when all are absent)
pub fn min_value(values: &[f64], absent: &[bool]) -> f64 {
    let mut m = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if absent[i] {
            continue;
        }
        if v < m {
            m = v;
        }
    }
    m
}

/// Mean of the present values (NaN when all are absent)
pub fn avg_value(values: &[f64], absent: &[bool]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if absent[i] {
            continue;
        }
        count += 1;
        total += v;
    }
    total / count as f64
}

/// Last present value (NaN when all are absent)
pub fn current_value(values: &[f64], absent: &[bool]) -> f64 {
    for i in (0..values.len()).rev() {
        if !absent[i] {
            return values[i];
        }
    }
    f64::NAN
}

/// Population variance of the present values (NaN when all are absent)
pub fn variance_value(values: &[f64], absent: &[bool]) -> f64 {
    let mean = avg_value(values, absent);
    if mean.is_nan() {
        return mean;
    }

    let mut square_sum = 0.0;
    let mut count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if absent[i] {
            continue;
        }
        count += 1;
        square_sum += (mean - v) * (mean - v);
    }
    square_sum / count as f64
}

// ============================================================================
// Summarization Kernels
// ============================================================================

/// Reduce a bucket of values with a named function.
///
/// Accepts `sum`, `avg`, `max`, `min`, `last`, and `pNN` percentiles
/// (interpolated). Empty buckets yield NaN so callers can flag them absent.
pub fn summarize_values(func: &str, values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    match func {
        "sum" => values.iter().sum(),
        "avg" => values.iter().sum::<f64>() / values.len() as f64,
        "max" => values.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v)),
        "min" => values.iter().fold(f64::INFINITY, |m, &v| m.min(v)),
        "last" => values[values.len() - 1],
        _ => match func.split('p').nth(1).and_then(|p| p.parse::<f64>().ok()) {
            Some(percent) => {
                let mut copy = values.to_vec();
                percentile(&mut copy, percent, true)
            }
            None => 0.0,
        },
    }
}

// ============================================================================
// Correlation
// ============================================================================

/// Pearson product-moment correlation of two equal-length slices.
///
/// NaN inputs poison the result, which is what windowed callers rely on: a
/// window containing a missing sample reports no correlation. Zero-variance
/// inputs divide by zero and also come out NaN.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let a_mean = a.iter().sum::<f64>() / n;
    let b_mean = b.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut sum_aa = 0.0;
    let mut sum_bb = 0.0;
    for i in 0..a.len() {
        let da = a[i] - a_mean;
        let db = b[i] - b_mean;
        numerator += da * db;
        sum_aa += da * da;
        sum_bb += db * db;
    }

    numerator / (sum_aa.sqrt() * sum_bb.sqrt())
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// Returns the p-value for the null hypothesis that both samples come from
/// the same distribution, using the asymptotic Q_KS significance series.
/// NaN inputs are dropped; empty samples yield NaN.
pub fn ks_test2(a: &[f64], b: &[f64]) -> f64 {
    let mut d1: Vec<f64> = a.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut d2: Vec<f64> = b.iter().copied().filter(|v| !v.is_nan()).collect();
    if d1.is_empty() || d2.is_empty() {
        return f64::NAN;
    }

    d1.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    d2.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

    let en1 = d1.len() as f64;
    let en2 = d2.len() as f64;
    let mut j1 = 0usize;
    let mut j2 = 0usize;
    let mut fn1 = 0.0;
    let mut fn2 = 0.0;
    let mut d = 0.0f64;

    while j1 < d1.len() && j2 < d2.len() {
        let v1 = d1[j1];
        let v2 = d2[j2];
        if v1 <= v2 {
            j1 += 1;
            fn1 = j1 as f64 / en1;
        }
        if v2 <= v1 {
            j2 += 1;
            fn2 = j2 as f64 / en2;
        }
        let dt = (fn2 - fn1).abs();
        if dt > d {
            d = dt;
        }
    }

    let en = (en1 * en2 / (en1 + en2)).sqrt();
    qks((en + 0.12 + 0.11 / en) * d)
}

/// Kolmogorov-Smirnov complementary CDF Q_KS(z)
fn qks(z: f64) -> f64 {
    if z == 0.0 {
        return 1.0;
    }
    if z < 1.18 {
        let y = (-1.233700550136169827 / (z * z)).exp();
        return 1.0 - 2.506628274631000502 / z * (y + y.powi(9) + y.powi(25));
    }
    let x = (-2.0 * z * z).exp();
    2.0 * (x - x.powi(4) + x.powi(9))
}

// ============================================================================
// Bounded Top-N Heap
// ============================================================================

/// An entry ranked by `val`, remembering which input series it came from
#[derive(Debug, Clone, Copy)]
pub struct HeapEntry {
    /// Index into the caller's series list
    pub idx: usize,
    /// Ranking value
    pub val: f64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.val.partial_cmp(&other.val).unwrap_or(Ordering::Equal)
    }
}

/// Min-heap over `(idx, val)` entries for top-N selection.
///
/// `offer` keeps at most `limit` entries by evicting the smallest; `push`
/// is unbounded for rankers that pop the N smallest instead.
#[derive(Debug)]
pub struct TopN {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    limit: usize,
}

impl TopN {
    /// Create a heap bounded at `limit` entries for `offer`
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            limit,
        }
    }

    /// Keep this entry only if it ranks among the `limit` largest seen
    pub fn offer(&mut self, idx: usize, val: f64) {
        if self.heap.len() < self.limit {
            self.heap.push(Reverse(HeapEntry { idx, val }));
            return;
        }
        if let Some(Reverse(smallest)) = self.heap.peek() {
            if smallest.val < val {
                self.heap.pop();
                self.heap.push(Reverse(HeapEntry { idx, val }));
            }
        }
    }

    /// Unbounded insert
    pub fn push(&mut self, idx: usize, val: f64) {
        self.heap.push(Reverse(HeapEntry { idx, val }));
    }

    /// Remove and return the smallest entry
    pub fn pop_min(&mut self) -> Option<HeapEntry> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the heap is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain all entries, largest value first
    pub fn into_descending(mut self) -> Vec<HeapEntry> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(e) = self.pop_min() {
            out.push(e);
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windowed_mean_and_eviction() {
        let mut w = Windowed::new(3);
        for v in [1.0, 2.0, 3.0] {
            w.push(v);
        }
        assert!((w.mean() - 2.0).abs() < 1e-12);

        w.push(4.0); // evicts 1.0
        assert!((w.mean() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_windowed_nan_excluded() {
        let mut w = Windowed::new(4);
        w.push(1.0);
        w.push(f64::NAN);
        w.push(3.0);
        assert_eq!(w.len(), 2);
        assert!((w.mean() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_windowed_stdev() {
        let mut w = Windowed::new(4);
        for v in [2.0, 4.0, 4.0, 4.0] {
            w.push(v);
        }
        // population stdev of [2,4,4,4] is sqrt(3)/2
        assert!((w.stdev() - 0.8660254037844386).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_interpolated() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&mut data, 50.0, true) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_uninterpolated_takes_upper() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&mut data, 50.0, false), 3.0);
    }

    #[test]
    fn test_percentile_bounds() {
        let mut data = vec![5.0, 1.0, 3.0];
        assert_eq!(percentile(&mut data, 0.0, true), 1.0);
        let mut data = vec![5.0, 1.0, 3.0];
        assert_eq!(percentile(&mut data, 100.0, true), 5.0);
        let mut empty: Vec<f64> = vec![];
        assert!(percentile(&mut empty, 50.0, true).is_nan());
        let mut data = vec![1.0];
        assert!(percentile(&mut data, 150.0, true).is_nan());
    }

    #[test]
    fn test_reducers_skip_absent() {
        let values = [1.0, 99.0, 3.0];
        let absent = [false, true, false];
        assert_eq!(max_value(&values, &absent), 3.0);
        assert_eq!(min_value(&values, &absent), 1.0);
        assert!((avg_value(&values, &absent) - 2.0).abs() < 1e-12);
        assert_eq!(current_value(&values, &absent), 3.0);
        assert!((variance_value(&values, &absent) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reducers_all_absent() {
        let values = [1.0, 2.0];
        let absent = [true, true];
        assert_eq!(max_value(&values, &absent), f64::NEG_INFINITY);
        assert!(avg_value(&values, &absent).is_nan());
        assert!(current_value(&values, &absent).is_nan());
    }

    #[test]
    fn test_summarize_values() {
        let vals = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(summarize_values("sum", &vals), 10.0);
        assert_eq!(summarize_values("avg", &vals), 2.5);
        assert_eq!(summarize_values("max", &vals), 4.0);
        assert_eq!(summarize_values("min", &vals), 1.0);
        assert_eq!(summarize_values("last", &vals), 4.0);
        assert!((summarize_values("p50", &vals) - 2.5).abs() < 1e-12);
        assert!(summarize_values("sum", &[]).is_nan());
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);

        let c = [4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_nan_poisons() {
        let a = [1.0, f64::NAN, 3.0];
        let b = [1.0, 2.0, 3.0];
        assert!(pearson(&a, &b).is_nan());
    }

    #[test]
    fn test_pearson_zero_variance_is_nan() {
        let a = [2.0, 2.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        assert!(pearson(&a, &b).is_nan());
    }

    #[test]
    fn test_ks_identical_samples_high_p() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let p = ks_test2(&a, &a);
        assert!(p > 0.99, "identical samples should not reject, got {}", p);
    }

    #[test]
    fn test_ks_disjoint_samples_low_p() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..50).map(|i| (i + 1000) as f64).collect();
        let p = ks_test2(&a, &b);
        assert!(p < 0.01, "disjoint samples should reject, got {}", p);
    }

    #[test]
    fn test_topn_offer_keeps_largest() {
        let mut heap = TopN::new(2);
        for (i, v) in [1.0, 5.0, 3.0, 4.0].iter().enumerate() {
            heap.offer(i, *v);
        }
        let drained = heap.into_descending();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].idx, 1); // 5.0
        assert_eq!(drained[1].idx, 3); // 4.0
    }

    #[test]
    fn test_topn_pop_min_ascending() {
        let mut heap = TopN::new(usize::MAX);
        for (i, v) in [3.0, 1.0, 2.0].iter().enumerate() {
            heap.push(i, *v);
        }
        assert_eq!(heap.pop_min().unwrap().idx, 1);
        assert_eq!(heap.pop_min().unwrap().idx, 2);
        assert_eq!(heap.pop_min().unwrap().idx, 0);
    }
}
