//! Fixed-width bucket summarization
//!
//! `summarize` and `hitcount` walk input samples into `[t, t+bucketSize)`
//! buckets; a partial trailing bucket is emitted. `maxDataPoints`
//! downsamples with `avg` buckets sized so the output fits the requested
//! point budget.

use super::{args, Call};
use crate::error::{ErrorKind, EvalResult};
use crate::stats::summarize_values;
use crate::types::{Series, ValuesMap};

/// Number of buckets covering `[start, stop)`
fn bucket_count(start: i32, stop: i32, bucket_size: i32) -> usize {
    (((stop - start) as f64 / bucket_size as f64).ceil() as i64).max(0) as usize
}

/// Snap `start` back to the day, hour, or minute depending on how coarse
/// the buckets are
fn align_start_to_interval(start: i32, bucket_size: i32) -> i32 {
    for unit in [86400, 3600, 60] {
        if bucket_size >= unit {
            return start - start.rem_euclid(unit);
        }
    }
    start
}

/// Floor both ends to bucket multiples, keeping a partial trailing bucket
fn align_to_bucket_size(start: i32, stop: i32, bucket_size: i32) -> (i32, i32) {
    let start = start - start.rem_euclid(bucket_size);
    let mut new_stop = stop - stop.rem_euclid(bucket_size);
    if stop != new_stop {
        new_stop += bucket_size;
    }
    (start, new_stop)
}

/// A fresh bucketized output series
fn bucket_series(name: String, like: &Series, start: i32, stop: i32, bucket_size: i32) -> Series {
    let buckets = bucket_count(start, stop, bucket_size);
    let mut r = Series::new(name, start, stop, bucket_size, vec![0.0; buckets]);
    r.attrs = like.attrs.clone();
    r
}

pub(crate) fn summarize(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let bucket_size = args::get_interval_arg(call, 1, 1)?;
    if bucket_size <= 0 {
        return Err(ErrorKind::BadType);
    }
    let func = args::get_string_arg_default(call, 2, "sum")?;
    let align_to_from = args::get_bool_arg_default(call, 3, false)?;

    let interval_str = args::get_string_arg(call, 1)?;

    let mut start = arg[0].start_time;
    let mut stop = arg[0].stop_time;
    if !align_to_from {
        (start, stop) = align_to_bucket_size(start, stop, bucket_size);
    }

    let mut results = Vec::with_capacity(arg.len());
    for a in &arg {
        let name = match call.args.len() {
            2 => format!("summarize({},'{}')", a.name, interval_str),
            3 => format!("summarize({},'{}','{}')", a.name, interval_str, func),
            _ => format!(
                "summarize({},'{}','{}',{})",
                a.name, interval_str, func, align_to_from
            ),
        };

        let mut r = bucket_series(name, a, start, stop, bucket_size);

        let mut t = a.start_time;
        let mut bucket_end = start + bucket_size;
        let mut bucket_vals: Vec<f64> = Vec::new();
        let mut ridx = 0usize;
        let mut bucket_items = 0usize;

        for i in 0..a.len() {
            bucket_items += 1;
            if !a.is_absent[i] {
                bucket_vals.push(a.values[i]);
            }

            t += a.step_time;

            if t >= stop {
                break;
            }

            if t >= bucket_end {
                if ridx < r.len() {
                    let rv = summarize_values(func, &bucket_vals);
                    if rv.is_nan() {
                        r.set_absent(ridx);
                    } else {
                        r.values[ridx] = rv;
                    }
                }
                ridx += 1;
                bucket_end += bucket_size;
                bucket_items = 0;
                bucket_vals.clear();
            }
        }

        if bucket_items > 0 && ridx < r.len() {
            let rv = summarize_values(func, &bucket_vals);
            if rv.is_nan() {
                r.set_absent(ridx);
            } else {
                r.values[ridx] = rv;
            }
        }

        results.push(r);
    }

    Ok(results)
}

/// Bucketized sample counts: each present sample contributes
/// `value * step`, treating per-second rates as event counts
pub(crate) fn hitcount(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let bucket_size = args::get_interval_arg(call, 1, 1)?;
    if bucket_size <= 0 {
        return Err(ErrorKind::BadType);
    }
    let align_to_interval = args::get_bool_arg_default(call, 2, false)?;

    let interval_str = args::get_string_arg(call, 1)?;

    let mut start = arg[0].start_time;
    let stop = arg[0].stop_time;
    if align_to_interval {
        start = align_start_to_interval(start, bucket_size);
    }

    let mut results = Vec::with_capacity(arg.len());
    for a in &arg {
        let name = match call.args.len() {
            2 => format!("hitcount({},'{}')", a.name, interval_str),
            _ => format!(
                "hitcount({},'{}',{})",
                a.name, interval_str, align_to_interval
            ),
        };

        let mut r = bucket_series(name, a, start, stop, bucket_size);

        let mut t = a.start_time;
        let mut bucket_end = start + bucket_size;
        let mut count = 0.0f64;
        let mut ridx = 0usize;
        let mut bucket_items = 0usize;

        for i in 0..a.len() {
            bucket_items += 1;
            if !a.is_absent[i] {
                if count.is_nan() {
                    count = 0.0;
                }
                count += a.values[i] * a.step_time as f64;
            }

            t += a.step_time;

            if t >= stop {
                break;
            }

            if t >= bucket_end {
                if ridx < r.len() {
                    if count.is_nan() {
                        r.set_absent(ridx);
                    } else {
                        r.values[ridx] = count;
                    }
                }
                ridx += 1;
                bucket_end += bucket_size;
                count = f64::NAN;
                bucket_items = 0;
            }
        }

        if bucket_items > 0 && ridx < r.len() {
            if count.is_nan() {
                r.set_absent(ridx);
            } else {
                r.values[ridx] = count;
            }
        }

        results.push(r);
    }

    Ok(results)
}

/// Downsample with `avg` buckets so each series fits within `points`
/// samples; series already small enough pass through unchanged
pub(crate) fn max_data_points(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let points = args::get_int_arg(call, 1)?;
    if points <= 0 {
        return Err(ErrorKind::BadType);
    }

    let start = arg[0].start_time;
    let stop = arg[0].stop_time;
    let step = arg[0].step_time;
    if step <= 0 {
        return Err(ErrorKind::BadType);
    }

    let vals = ((stop - start) as f64 / step as f64).ceil() as i64;
    // Integer division: the trailing remainder spills into one extra bucket.
    let bucket_size = (vals / points) as i32 * step;

    if bucket_size <= step {
        return Ok(arg);
    }

    let (start, stop) = align_to_bucket_size(start, stop, bucket_size);

    let mut results = Vec::with_capacity(arg.len());
    for a in &arg {
        let mut r = bucket_series(a.name.clone(), a, start, stop, bucket_size);

        let mut t = a.start_time;
        let mut bucket_end = start + bucket_size;
        let mut bucket_vals: Vec<f64> = Vec::new();
        let mut ridx = 0usize;
        let mut bucket_items = 0usize;

        for i in 0..a.len() {
            bucket_items += 1;
            if !a.is_absent[i] {
                bucket_vals.push(a.values[i]);
            }

            t += a.step_time;

            if t >= stop {
                break;
            }

            if t >= bucket_end {
                if ridx < r.len() {
                    let rv = summarize_values("avg", &bucket_vals);
                    if rv.is_nan() {
                        r.set_absent(ridx);
                    } else {
                        r.values[ridx] = rv;
                    }
                }
                ridx += 1;
                bucket_end += bucket_size;
                bucket_items = 0;
                bucket_vals.clear();
            }
        }

        if bucket_items > 0 && ridx < r.len() {
            let rv = summarize_values("avg", &bucket_vals);
            if rv.is_nan() {
                r.set_absent(ridx);
            } else {
                r.values[ridx] = rv;
            }
        }

        results.push(r);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::super::eval;
    use crate::parser::parse;
    use crate::types::{MetricRequest, Series, ValuesMap};

    fn single(values: Vec<f64>, absent: Vec<bool>) -> ValuesMap {
        let until = 60 * values.len() as i32;
        let mut a = Series::new("foo.a", 0, until, 60, values);
        a.is_absent = absent;
        let mut map = ValuesMap::new();
        map.insert(MetricRequest::new("foo.a", 0, until), vec![a]);
        map
    }

    fn run(target: &str, values: &ValuesMap, until: i32) -> Vec<Series> {
        let (expr, _) = parse(target).unwrap();
        eval(&expr, 0, until, values)
    }

    #[test]
    fn test_summarize_sum() {
        let map = single(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![false; 6]);
        let out = run("summarize(foo.a,'2min')", &map, 360);
        assert_eq!(out[0].name, "summarize(foo.a,'2min')");
        assert_eq!(out[0].step_time, 120);
        assert_eq!(out[0].values, vec![3.0, 7.0, 11.0]);
    }

    #[test]
    fn test_summarize_named_function() {
        let map = single(vec![1.0, 2.0, 3.0, 4.0], vec![false; 4]);
        let out = run("summarize(foo.a,'2min','max')", &map, 240);
        assert_eq!(out[0].name, "summarize(foo.a,'2min','max')");
        assert_eq!(out[0].values, vec![2.0, 4.0]);
    }

    #[test]
    fn test_summarize_empty_bucket_absent() {
        let map = single(
            vec![1.0, 2.0, 0.0, 0.0, 5.0, 6.0],
            vec![false, false, true, true, false, false],
        );
        let out = run("summarize(foo.a,'2min')", &map, 360);
        assert_eq!(out[0].values[0], 3.0);
        assert!(out[0].is_absent[1]);
        assert_eq!(out[0].values[2], 11.0);
    }

    #[test]
    fn test_summarize_partial_trailing_bucket() {
        let map = single(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![false; 5]);
        let out = run("summarize(foo.a,'2min')", &map, 300);
        // [0,120) -> 3, [120,240) -> 7, trailing partial [240,300) -> 5
        assert_eq!(out[0].values, vec![3.0, 7.0, 5.0]);
    }

    #[test]
    fn test_summarize_percentile_bucket() {
        let map = single(vec![1.0, 2.0, 3.0, 4.0], vec![false; 4]);
        let out = run("summarize(foo.a,'4min','p50')", &map, 240);
        assert_eq!(out[0].values.len(), 1);
        assert!((out[0].values[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_hitcount_scales_by_step() {
        let map = single(vec![1.0, 2.0, 3.0, 4.0], vec![false; 4]);
        let out = run("hitcount(foo.a,'2min')", &map, 240);
        assert_eq!(out[0].name, "hitcount(foo.a,'2min')");
        // (1+2)*60 and (3+4)*60
        assert_eq!(out[0].values, vec![180.0, 420.0]);
    }

    #[test]
    fn test_max_data_points_passthrough_when_small() {
        let map = single(vec![1.0, 2.0, 3.0], vec![false; 3]);
        let out = run("maxDataPoints(foo.a,10)", &map, 180);
        assert_eq!(out[0].values, vec![1.0, 2.0, 3.0]);
        assert_eq!(out[0].step_time, 60);
    }

    #[test]
    fn test_max_data_points_downsamples() {
        let map = single((1..=8).map(|i| i as f64).collect(), vec![false; 8]);
        let out = run("maxDataPoints(foo.a,2)", &map, 480);
        assert_eq!(out[0].name, "foo.a");
        assert_eq!(out[0].step_time, 240);
        // avg of 1..4 and avg of 5..8
        assert_eq!(out[0].values, vec![2.5, 6.5]);
    }
}
