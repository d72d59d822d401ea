//! Per-point transforms over one series

use super::{args, map_series, Call};
use crate::ast::fmt_g;
use crate::error::EvalResult;
use crate::types::{Series, ValuesMap};

pub(crate) fn absolute(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        for i in 0..a.len() {
            if a.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            r.values[i] = a.values[i].abs();
        }
    })
}

pub(crate) fn integral(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        let mut current = 0.0;
        for i in 0..a.len() {
            if a.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            current += a.values[i];
            r.values[i] = current;
        }
    })
}

pub(crate) fn invert(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        for i in 0..a.len() {
            if a.is_absent[i] || a.values[i] == 0.0 {
                r.set_absent(i);
                continue;
            }
            r.values[i] = 1.0 / a.values[i];
        }
    })
}

pub(crate) fn square_root(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        for i in 0..a.len() {
            if a.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            r.values[i] = a.values[i].sqrt();
        }
    })
}

/// 1 where a sample is present, 0 where it is absent; the output itself has
/// no absent samples
pub(crate) fn is_non_null(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series("isNonNull", &call.args[0], from, until, values, |a, r| {
        for i in 0..a.len() {
            r.values[i] = if a.is_absent[i] { 0.0 } else { 1.0 };
        }
    })
}

/// Subtract the series minimum from every present sample
pub(crate) fn offset_to_zero(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        let mut minimum = f64::INFINITY;
        for i in 0..a.len() {
            if !a.is_absent[i] && a.values[i] < minimum {
                minimum = a.values[i];
            }
        }
        for i in 0..a.len() {
            if a.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            r.values[i] = a.values[i] - minimum;
        }
    })
}

/// First sample is absent; later samples report the step from the previous
/// present sample
pub(crate) fn derivative(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        if a.is_empty() {
            return;
        }
        let mut prev = a.values[0];
        for i in 0..a.len() {
            if i == 0 || a.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            r.values[i] = a.values[i] - prev;
            prev = a.values[i];
        }
    })
}

pub(crate) fn scale(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let factor = args::get_float_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("scale({},{})", a.name, fmt_g(factor)));
            for i in 0..a.len() {
                if a.is_absent[i] {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = a.values[i] * factor;
            }
            r
        })
        .collect())
}

pub(crate) fn offset(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let factor = args::get_float_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("offset({},{})", a.name, fmt_g(factor)));
            for i in 0..a.len() {
                if a.is_absent[i] {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = a.values[i] + factor;
            }
            r
        })
        .collect())
}

pub(crate) fn pow(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let factor = args::get_float_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("pow({},{})", a.name, fmt_g(factor)));
            for i in 0..a.len() {
                if a.is_absent[i] {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = a.values[i].powf(factor);
            }
            r
        })
        .collect())
}

/// Multiply by `seconds / step`, rescaling a per-step rate to a per-interval
/// rate
pub(crate) fn scale_to_seconds(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let seconds = args::get_float_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("scaleToSeconds({},{})", a.name, seconds as i64));
            let factor = seconds / a.step_time as f64;
            for i in 0..a.len() {
                if a.is_absent[i] {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = a.values[i] * factor;
            }
            r
        })
        .collect())
}

/// Replace absent samples with a default and clear their absent flags
pub(crate) fn transform_null(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let default = args::get_float_arg_default(call, 1, 0.0)?;

    Ok(arg
        .iter()
        .map(|a| {
            let name = if call.args.len() == 1 {
                format!("transformNull({})", a.name)
            } else {
                format!("transformNull({},{})", a.name, fmt_g(default))
            };
            let mut r = a.zeroed(name);
            for i in 0..a.len() {
                r.values[i] = if a.is_absent[i] { default } else { a.values[i] };
            }
            r
        })
        .collect())
}

/// Carry the last present value across gaps of up to `limit` samples;
/// `limit < 0` carries forever
pub(crate) fn keep_last_value(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let keep = args::get_int_arg_default(call, 1, -1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let name = if call.args.len() == 1 {
                format!("keepLastValue({})", a.name)
            } else {
                format!("keepLastValue({},{})", a.name, keep)
            };
            let mut r = a.zeroed(name);

            let mut prev = f64::NAN;
            let mut missing = 0i64;
            for i in 0..a.len() {
                if a.is_absent[i] {
                    if (keep < 0 || missing < keep) && !prev.is_nan() {
                        r.values[i] = prev;
                        missing += 1;
                    } else {
                        r.is_absent[i] = true;
                    }
                    continue;
                }
                missing = 0;
                prev = a.values[i];
                r.values[i] = prev;
            }
            r
        })
        .collect())
}

pub(crate) fn logarithm(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let base = args::get_int_arg_default(call, 1, 10)?;
    let base_log = (base as f64).ln();

    Ok(arg
        .iter()
        .map(|a| {
            let name = if call.args.len() == 1 {
                format!("logarithm({})", a.name)
            } else {
                format!("logarithm({},{})", a.name, base)
            };
            let mut r = a.zeroed(name);
            for i in 0..a.len() {
                if a.is_absent[i] {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = a.values[i].ln() / base_log;
            }
            r
        })
        .collect())
}

/// 1 where the value differs from the previous seen value, 0 elsewhere
pub(crate) fn changed(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        let mut prev = f64::NAN;
        for i in 0..a.len() {
            let v = a.values[i];
            if prev.is_nan() {
                prev = v;
                r.values[i] = 0.0;
            } else if !v.is_nan() && prev != v {
                r.values[i] = 1.0;
                prev = v;
            } else {
                r.values[i] = 0.0;
            }
        }
    })
}

/// Shared counter-delta walk for `nonNegativeDerivative` and `perSecond`.
///
/// The two differ in how a step is scaled and in the counter-wrap formula:
/// `nonNegativeDerivative` emits `(max - prev) + v + 1` while `perSecond`
/// emits `(max - prev) + v + 1/step`. Downstream consumers expect both
/// formulas exactly as written.
fn counter_delta(
    arg: &[Series],
    name_prefix: &str,
    explicit_max: bool,
    max_value: f64,
    per_second: bool,
) -> Vec<Series> {
    arg.iter()
        .map(|a| {
            let name = if explicit_max {
                format!("{}({},{})", name_prefix, a.name, fmt_g(max_value))
            } else {
                format!("{}({})", name_prefix, a.name)
            };
            let mut r = a.zeroed(name);
            if a.is_empty() {
                return r;
            }

            let step = a.step_time as f64;
            let mut prev = a.values[0];
            for i in 0..a.len() {
                let v = a.values[i];
                if i == 0 || a.is_absent[i] || a.is_absent[i - 1] {
                    r.is_absent[i] = true;
                    prev = v;
                    continue;
                }

                let diff = v - prev;
                if diff >= 0.0 {
                    r.values[i] = if per_second { diff / step } else { diff };
                } else if !max_value.is_nan() && max_value >= v {
                    r.values[i] = if per_second {
                        (max_value - prev) + v + 1.0 / step
                    } else {
                        (max_value - prev) + v + 1.0
                    };
                } else {
                    r.set_absent(i);
                }
                prev = v;
            }
            r
        })
        .collect()
}

pub(crate) fn non_negative_derivative(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let max_value = args::get_float_arg_default(call, 1, f64::NAN)?;

    Ok(counter_delta(
        &arg,
        "nonNegativeDerivative",
        call.args.len() > 1,
        max_value,
        false,
    ))
}

pub(crate) fn per_second(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let max_value = args::get_float_arg_default(call, 1, f64::NAN)?;

    Ok(counter_delta(
        &arg,
        "perSecond",
        call.args.len() > 1,
        max_value,
        true,
    ))
}

/// `removeAboveValue` / `removeBelowValue`: blank out samples beyond the
/// threshold
pub(crate) fn remove_by_value(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let threshold = args::get_float_arg(call, 1)?;
    let above = call.target == "removeAboveValue";

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("{}({}, {})", call.target, a.name, fmt_g(threshold)));
            for i in 0..a.len() {
                let v = a.values[i];
                let beyond = if above { v > threshold } else { v < threshold };
                if a.is_absent[i] || beyond {
                    r.set_absent(i);
                    continue;
                }
                r.values[i] = v;
            }
            r
        })
        .collect())
}
