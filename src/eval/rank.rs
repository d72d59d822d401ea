//! Heap-based top-N ranking

use super::{args, Call};
use crate::ast::Expr;
use crate::error::{ErrorKind, EvalResult};
use crate::stats::{self, TopN};
use crate::types::{Series, ValuesMap};

/// `highestAverage` / `highestCurrent` / `highestMax`: the `n` series with
/// the largest reduced value, strongest first
pub(crate) fn highest(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let n = args::get_int_arg(call, 1)?;
    if n < 0 {
        return Err(ErrorKind::BadType);
    }

    if arg.len() < n as usize {
        return Ok(arg);
    }

    let reduce: fn(&[f64], &[bool]) -> f64 = match call.target {
        "highestMax" => stats::max_value,
        "highestAverage" => stats::avg_value,
        _ => stats::current_value,
    };

    let mut heap = TopN::new(n as usize);
    for (i, a) in arg.iter().enumerate() {
        let m = reduce(&a.values, &a.is_absent);
        if m.is_nan() {
            continue;
        }
        heap.offer(i, m);
    }

    Ok(heap
        .into_descending()
        .into_iter()
        .map(|e| arg[e.idx].clone())
        .collect())
}

/// `lowestAverage` / `lowestCurrent`: the `n` series with the smallest
/// reduced value, weakest first
pub(crate) fn lowest(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let n = args::get_int_arg(call, 1)?;
    if n < 0 {
        return Err(ErrorKind::BadType);
    }

    if arg.len() < n as usize {
        return Ok(arg);
    }

    let reduce: fn(&[f64], &[bool]) -> f64 = match call.target {
        "lowestAverage" => stats::avg_value,
        _ => stats::current_value,
    };

    let mut heap = TopN::new(usize::MAX);
    for (i, a) in arg.iter().enumerate() {
        heap.push(i, reduce(&a.values, &a.is_absent));
    }

    let mut results = Vec::with_capacity(n as usize);
    for _ in 0..n {
        match heap.pop_min() {
            Some(e) => results.push(arg[e.idx].clone()),
            None => break,
        }
    }

    Ok(results)
}

/// The `n` series with the largest sample variance, most deviant first
pub(crate) fn most_deviant(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let n = args::get_int_arg(call, 0)?;
    if n < 0 {
        return Err(ErrorKind::BadType);
    }
    let series_arg = call.args.get(1).ok_or(ErrorKind::MissingArgument)?;
    let arg = args::get_series_arg(series_arg, from, until, values)?;

    let mut heap = TopN::new(n as usize);
    for (i, a) in arg.iter().enumerate() {
        let variance = stats::variance_value(&a.values, &a.is_absent);
        if variance.is_nan() {
            continue;
        }
        heap.offer(i, variance);
    }

    Ok(heap
        .into_descending()
        .into_iter()
        .map(|e| arg[e.idx].clone())
        .collect())
}

/// The `n` compare-series best correlated with a reference series.
///
/// `direction` selects the sign handling: `pos` keeps only non-negative
/// correlations, `neg` only non-positive ones, `abs` ranks by magnitude.
/// Degenerate NaN correlations (zero-variance inputs) are skipped.
pub(crate) fn pearson_closest(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let compare_arg = call.args.get(1).ok_or(ErrorKind::MissingArgument)?;
    let reference = args::get_series_arg(&call.args[0], from, until, values)?;
    if reference.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }

    let compare = args::get_series_arg(compare_arg, from, until, values)?;
    let n = args::get_int_arg(call, 2)?;
    if n < 0 {
        return Err(ErrorKind::BadType);
    }

    let direction = args::get_string_arg_default(call, 3, "abs")?;
    if !matches!(direction, "pos" | "neg" | "abs") {
        return Err(ErrorKind::BadType);
    }

    let ref_values = masked(&reference[0]);

    // Standardized so the smallest value is the strongest correlation.
    let mut heap = TopN::new(usize::MAX);
    for (i, a) in compare.iter().enumerate() {
        if a.len() != ref_values.len() {
            continue;
        }

        let value = stats::pearson(&ref_values, &masked(a));
        let ranked = if value.is_nan() {
            continue;
        } else if direction == "abs" {
            -value.abs()
        } else if direction == "pos" && value >= 0.0 {
            -value
        } else if direction == "neg" && value <= 0.0 {
            value
        } else {
            continue;
        };

        heap.push(i, ranked);
    }

    let mut results = Vec::new();
    while results.len() < n as usize {
        match heap.pop_min() {
            Some(e) => results.push(compare[e.idx].clone()),
            None => break,
        }
    }

    Ok(results)
}

/// The `n` series with the most samples above `Q3 + basis * IQR` of the
/// pooled sample distribution; series with no outliers are dropped
pub(crate) fn tukey_above(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;

    let window = match call.args.get(1) {
        Some(Expr::Const { val }) => *val as i64,
        Some(Expr::Str { val }) => {
            let seconds = crate::interval::parse_interval(val, 1).map_err(|_| ErrorKind::BadType)?;
            (seconds / arg[0].step_time.max(1)) as i64
        }
        _ => return Err(ErrorKind::BadType),
    };
    if window < 0 {
        return Err(ErrorKind::BadType);
    }

    let basis = args::get_float_arg(call, 2)?;
    let n = args::get_int_arg(call, 3)?;
    if n < 0 {
        return Err(ErrorKind::BadType);
    }

    let mut points: Vec<f64> = Vec::new();
    for a in &arg {
        for i in 0..a.len() {
            if !a.is_absent[i] {
                points.push(a.values[i]);
            }
        }
    }
    if points.is_empty() {
        return Err(ErrorKind::MissingTimeseries);
    }

    points.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    let first = (0.25 * points.len() as f64) as usize;
    let third = ((0.75 * points.len() as f64) as usize).min(points.len() - 1);
    let iqr = points[third] - points[first];
    let threshold = points[third] + basis * iqr;

    let mut heap = TopN::new(n as usize);
    for (i, a) in arg.iter().enumerate() {
        let mut outliers = 0usize;
        for j in 0..a.len() {
            if !a.is_absent[j] && a.values[j] >= threshold {
                outliers += 1;
            }
        }
        if outliers == 0 {
            continue;
        }
        heap.offer(i, outliers as f64);
    }

    Ok(heap
        .into_descending()
        .into_iter()
        .map(|e| arg[e.idx].clone())
        .collect())
}

/// Sample values with absent slots replaced by NaN, the form the
/// correlation kernel expects
fn masked(a: &Series) -> Vec<f64> {
    (0..a.len())
        .map(|i| if a.is_absent[i] { f64::NAN } else { a.values[i] })
        .collect()
}
