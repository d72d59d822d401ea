//! Moving-window statistics
//!
//! Window arguments accept either a sample count or an interval string; an
//! interval is divided by the input step to get the count. Until a window
//! has filled, outputs are absent. Missing inputs enter the window as NaN
//! and are excluded from the moments.

use super::{args, Call};
use crate::ast::Expr;
use crate::error::{ErrorKind, EvalResult};
use crate::interval::parse_interval;
use crate::stats::{self, Windowed};
use crate::types::{Series, ValuesMap};

/// Resolve a window argument to a sample count given the input step
fn window_size(call: &Call<'_>, n: usize, step: i32) -> EvalResult<usize> {
    let count = match call.args.get(n) {
        None => return Err(ErrorKind::MissingArgument),
        Some(Expr::Const { val }) => *val as i64,
        Some(Expr::Str { val }) => {
            let seconds = parse_interval(val, 1).map_err(|_| ErrorKind::BadType)?;
            (seconds / step.max(1)) as i64
        }
        Some(_) => return Err(ErrorKind::BadType),
    };

    if count <= 0 {
        return Err(ErrorKind::BadType);
    }
    Ok(count as usize)
}

/// Mean of the trailing window; the first `window` samples are absent
pub(crate) fn moving_average(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let window = window_size(call, 1, arg[0].step_time)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("movingAverage({},{})", a.name, window));
            r.start_time = from;
            r.stop_time = until;

            let mut w = Windowed::new(window);
            for i in 0..a.len() {
                let v = if a.is_absent[i] {
                    f64::NAN
                } else {
                    a.values[i]
                };
                r.values[i] = w.mean();
                w.push(v);
                if i < window || r.values[i].is_nan() {
                    r.set_absent(i);
                }
            }
            r
        })
        .collect())
}

/// Median of the present values in the trailing window
pub(crate) fn moving_median(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let window = window_size(call, 1, arg[0].step_time)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("movingMedian({},{})", a.name, window));
            r.start_time = from;
            r.stop_time = until;

            for i in 0..a.len() {
                if i + 1 < window {
                    r.set_absent(i);
                    continue;
                }

                let lo = i + 1 - window;
                let mut present: Vec<f64> = (lo..=i)
                    .filter(|&j| !a.is_absent[j])
                    .map(|j| a.values[j])
                    .collect();

                let m = median(&mut present);
                if m.is_nan() {
                    r.set_absent(i);
                } else {
                    r.values[i] = m;
                }
            }
            r
        })
        .collect())
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Trailing-window standard deviation.
///
/// A window whose present count falls below
/// `(1 - missingThreshold) * points` is reported absent once enough samples
/// have gone by to expect a full window.
pub(crate) fn stdev(
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
    let missing_threshold = args::get_float_arg_default(call, 2, 0.1)?;

    let min_len = ((1.0 - missing_threshold) * points as f64) as usize;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("stdev({},{})", a.name, points));

            let mut w = Windowed::new(points as usize);
            for i in 0..a.len() {
                let v = if a.is_absent[i] {
                    f64::NAN
                } else {
                    a.values[i]
                };
                w.push(v);
                r.values[i] = w.stdev();
                if r.values[i].is_nan() || (i >= min_len && w.len() < min_len) {
                    r.set_absent(i);
                }
            }
            r
        })
        .collect())
}

/// Windowed Pearson correlation of two single series
pub(crate) fn pearson(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let second = call.args.get(1).ok_or(ErrorKind::MissingArgument)?;
    let arg1 = args::get_series_arg(&call.args[0], from, until, values)?;
    let arg2 = args::get_series_arg(second, from, until, values)?;
    if arg1.len() != 1 || arg2.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }

    let a1 = &arg1[0];
    let a2 = &arg2[0];
    if a1.len() != a2.len() {
        return Err(ErrorKind::BadType);
    }

    let window = window_size(call, 2, a1.step_time)?;

    let mut w1 = Windowed::new(window);
    let mut w2 = Windowed::new(window);

    let mut r = a1.zeroed(format!("pearson({},{},{})", a1.name, a2.name, window));
    r.start_time = from;
    r.stop_time = until;

    for i in 0..a1.len() {
        let (mut v1, mut v2) = (a1.values[i], a2.values[i]);
        if a1.is_absent[i] || a2.is_absent[i] {
            v1 = f64::NAN;
            v2 = f64::NAN;
        }
        w1.push(v1);
        w2.push(v2);

        if i + 1 < window {
            r.set_absent(i);
            continue;
        }

        let c = stats::pearson(w1.data(), w2.data());
        if c.is_nan() {
            r.set_absent(i);
        } else {
            r.values[i] = c;
        }
    }

    Ok(vec![r])
}

/// Windowed two-sample Kolmogorov-Smirnov test of two single series
pub(crate) fn ks_test2(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let second = call.args.get(1).ok_or(ErrorKind::MissingArgument)?;
    let arg1 = args::get_series_arg(&call.args[0], from, until, values)?;
    let arg2 = args::get_series_arg(second, from, until, values)?;
    if arg1.len() != 1 || arg2.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }

    let a1 = &arg1[0];
    let a2 = &arg2[0];
    if a1.len() != a2.len() {
        return Err(ErrorKind::BadType);
    }

    let window = window_size(call, 2, a1.step_time)?;

    let mut w1 = Windowed::new(window);
    let mut w2 = Windowed::new(window);

    let mut r = a1.zeroed(format!(
        "kolmogorovSmirnovTest2({},{},{})",
        a1.name, a2.name, window
    ));
    r.start_time = from;
    r.stop_time = until;

    for i in 0..a1.len() {
        let (mut v1, mut v2) = (a1.values[i], a2.values[i]);
        if a1.is_absent[i] || a2.is_absent[i] {
            v1 = f64::NAN;
            v2 = f64::NAN;
        }
        w1.push(v1);
        w2.push(v2);

        if i < window {
            r.set_absent(i);
            continue;
        }

        let p = stats::ks_test2(w1.data(), w2.data());
        if p.is_nan() {
            r.set_absent(i);
        } else {
            r.values[i] = p;
        }
    }

    Ok(vec![r])
}
