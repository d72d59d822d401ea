//! Multi-series reductions, arithmetic combinators, and grouping

use std::collections::BTreeMap;

use tracing::debug;

use super::{aggregate_series, args, eval, Call};
use crate::ast::{fmt_g, Expr};
use crate::error::{ErrorKind, EvalResult};
use crate::eval::alias::extract_metric;
use crate::parser::parse;
use crate::stats;
use crate::types::{MetricRequest, Series, ValuesMap};

pub(crate) fn sum_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_args(call.args, from, until, values)?;
    Ok(aggregate_series(
        format!("sumSeries({})", call.arg_string),
        &series,
        |vals| vals.iter().sum(),
    ))
}

pub(crate) fn average_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_args(call.args, from, until, values)?;
    Ok(aggregate_series(
        format!("averageSeries({})", call.arg_string),
        &series,
        |vals| vals.iter().sum::<f64>() / vals.len() as f64,
    ))
}

pub(crate) fn max_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_args(call.args, from, until, values)?;
    Ok(aggregate_series(
        format!("maxSeries({})", call.arg_string),
        &series,
        |vals| vals.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v)),
    ))
}

pub(crate) fn min_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_args(call.args, from, until, values)?;
    Ok(aggregate_series(
        format!("minSeries({})", call.arg_string),
        &series,
        |vals| vals.iter().fold(f64::INFINITY, |m, &v| m.min(v)),
    ))
}

/// Pointwise percentile across sibling series
pub(crate) fn percentile_of_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_arg(&call.args[0], from, until, values)?;
    let percent = args::get_float_arg(call, 1)?;
    let interpolate = args::get_bool_arg_default(call, 2, false)?;

    Ok(aggregate_series(
        format!("percentileOfSeries({})", call.arg_string),
        &series,
        |vals| {
            let mut copy = vals.to_vec();
            stats::percentile(&mut copy, percent, interpolate)
        },
    ))
}

/// Constant series holding the p-th percentile of each input's present
/// samples
pub(crate) fn n_percentile(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let percent = args::get_float_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("nPercentile({},{})", a.name, fmt_g(percent)));

            let mut present: Vec<f64> = (0..a.len())
                .filter(|&i| !a.is_absent[i])
                .map(|i| a.values[i])
                .collect();
            let value = stats::percentile(&mut present, percent, true);

            for i in 0..r.len() {
                if value.is_nan() {
                    r.set_absent(i);
                } else {
                    r.values[i] = value;
                }
            }
            r
        })
        .collect())
}

/// Group input series by their metric name with the listed dot-segment
/// positions deleted, then reduce each group
pub(crate) fn series_with_wildcards(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_arg(&call.args[0], from, until, values)?;
    let fields = args::get_int_args(call, 1)?;
    let average = call.target == "averageSeriesWithWildcards";
    let func_name = if average {
        "averageSeriesWithWildcards"
    } else {
        "sumSeriesWithWildcards"
    };

    let mut groups: BTreeMap<String, Vec<&Series>> = BTreeMap::new();
    for a in &series {
        let metric = extract_metric(&a.name);
        let kept: Vec<&str> = metric
            .split('.')
            .enumerate()
            .filter(|(i, _)| !fields.contains(&(*i as i64)))
            .map(|(_, n)| n)
            .collect();
        groups.entry(kept.join(".")).or_default().push(a);
    }

    let mut results = Vec::with_capacity(groups.len());
    for (node, members) in groups {
        let mut r = members[0].zeroed(format!("{}({})", func_name, node));
        let mut counts = vec![0.0f64; r.len()];
        let mut any = vec![false; r.len()];

        for a in &members {
            for i in 0..a.len().min(r.len()) {
                if a.is_absent[i] {
                    continue;
                }
                any[i] = true;
                counts[i] += 1.0;
                r.values[i] += a.values[i];
            }
        }

        for i in 0..r.len() {
            if !any[i] {
                r.set_absent(i);
            } else if average {
                r.values[i] /= counts[i];
            }
        }

        results.push(r);
    }

    Ok(results)
}

/// Subtract every subtrahend from the minuend; absent subtrahend samples
/// count as zero
pub(crate) fn diff_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    if call.args.len() < 2 {
        return Err(ErrorKind::MissingArgument);
    }

    let minuend = args::get_series_arg(&call.args[0], from, until, values)?;
    let subtrahends = args::get_series_args(&call.args[1..], from, until, values)?;

    let m = &minuend[0];
    let mut r = m.zeroed(format!("diffSeries({})", call.arg_string));

    for i in 0..m.len() {
        if m.is_absent[i] {
            r.set_absent(i);
            continue;
        }

        let mut sub = 0.0;
        for s in &subtrahends {
            if i >= s.len() || s.is_absent[i] {
                continue;
            }
            sub += s.values[i];
        }

        r.values[i] = m.values[i] - sub;
    }

    Ok(vec![r])
}

/// Pointwise quotient of exactly two single series with matching shape;
/// zero or absent denominators come out absent
pub(crate) fn divide_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    if call.args.len() != 2 {
        return Err(ErrorKind::MissingArgument);
    }

    let numerator = args::get_series_arg(&call.args[0], from, until, values)?;
    let denominator = args::get_series_arg(&call.args[1], from, until, values)?;

    if numerator.len() != 1 || denominator.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }

    let n = &numerator[0];
    let d = &denominator[0];
    if n.step_time != d.step_time || n.len() != d.len() {
        return Err(ErrorKind::BadType);
    }

    let mut r = n.zeroed(format!("divideSeries({})", call.arg_string));
    for i in 0..n.len() {
        if n.is_absent[i] || d.is_absent[i] || d.values[i] == 0.0 {
            r.set_absent(i);
            continue;
        }
        r.values[i] = n.values[i] / d.values[i];
    }

    Ok(vec![r])
}

/// Pointwise product of single-series factors with matching shape
pub(crate) fn multiply_series(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let first = args::get_series_arg(&call.args[0], from, until, values)?;
    if first.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }

    let mut r = first[0].renamed(format!("multiplySeries({})", call.arg_string));

    for arg in &call.args[1..] {
        let other = args::get_series_arg(arg, from, until, values)?;
        if other.len() != 1 {
            return Err(ErrorKind::MissingTimeseries);
        }

        let o = &other[0];
        if r.step_time != o.step_time || r.len() != o.len() {
            return Err(ErrorKind::BadType);
        }

        for i in 0..r.len() {
            if r.is_absent[i] || o.is_absent[i] {
                r.set_absent(i);
                continue;
            }
            r.values[i] *= o.values[i];
        }
    }

    Ok(vec![r])
}

/// Express each series as a percentage of a total: the sibling sum, a
/// constant, or a single total series
pub(crate) fn as_percent(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;

    enum Total {
        SiblingSum,
        Constant(f64),
        Single(Series),
    }

    let (total, suffix) = match call.args.get(1) {
        None => (Total::SiblingSum, None),
        Some(Expr::Const { val }) => (Total::Constant(*val), Some(fmt_g(*val))),
        Some(e @ (Expr::Name { .. } | Expr::Func { .. })) => {
            let total = args::get_series_arg(e, from, until, values)?;
            if total.len() != 1 {
                return Err(ErrorKind::MissingTimeseries);
            }
            let label = match e {
                Expr::Name { target } => target.clone(),
                Expr::Func {
                    target, arg_string, ..
                } => format!("{}({})", target, arg_string),
                _ => unreachable!(),
            };
            (Total::Single(total.into_iter().next().unwrap()), Some(label))
        }
        Some(_) => return Err(ErrorKind::BadType),
    };

    let total_at = |i: usize| -> f64 {
        match &total {
            Total::SiblingSum => {
                let mut t = 0.0;
                let mut any = false;
                for a in &arg {
                    if i >= a.len() || a.is_absent[i] {
                        continue;
                    }
                    any = true;
                    t += a.values[i];
                }
                if any {
                    t
                } else {
                    f64::NAN
                }
            }
            Total::Constant(v) => *v,
            Total::Single(s) => {
                if i >= s.len() || s.is_absent[i] {
                    f64::NAN
                } else {
                    s.values[i]
                }
            }
        }
    };

    let mut results: Vec<Series> = arg
        .iter()
        .map(|a| {
            let name = match &suffix {
                None => format!("asPercent({})", a.name),
                Some(s) => format!("asPercent({},{})", a.name, s),
            };
            a.zeroed(name)
        })
        .collect();

    for i in 0..results[0].len() {
        let t = total_at(i);
        for (r, a) in results.iter_mut().zip(&arg) {
            if a.is_absent[i] || t.is_nan() || t == 0.0 {
                r.set_absent(i);
                continue;
            }
            r.values[i] = a.values[i] / t * 100.0;
        }
    }

    Ok(results)
}

/// Concatenate the series of every argument
pub(crate) fn group(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    args::get_series_args(call.args, from, until, values)
}

/// Group by the dot-segment at `node`, then evaluate
/// `<callback>(<groupKey>)` with the group bound under the key's name
pub(crate) fn group_by_node(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let series = args::get_series_arg(&call.args[0], from, until, values)?;
    let field = args::get_int_arg(call, 1)?;
    let callback = args::get_string_arg(call, 2)?;

    if field < 0 {
        return Err(ErrorKind::BadType);
    }

    let mut groups: BTreeMap<String, Vec<Series>> = BTreeMap::new();
    for a in series {
        let metric = extract_metric(&a.name).to_string();
        let Some(node) = metric.split('.').nth(field as usize) else {
            debug!(metric = %metric, field, "groupByNode index beyond metric depth");
            continue;
        };
        groups.entry(node.to_string()).or_default().push(a);
    }

    let mut results = Vec::new();
    for (key, members) in groups {
        let synthesized = format!("{}({})", callback, key);
        let (expr, _) = parse(&synthesized).map_err(|_| ErrorKind::BadType)?;

        let mut bound = ValuesMap::new();
        bound.insert(MetricRequest::new(key, from, until), members);

        results.extend(eval(&expr, from, until, &bound));
    }

    Ok(results)
}

/// Pass series through, or synthesize an all-absent placeholder when the
/// argument resolves to nothing
pub(crate) fn ensure(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    match args::get_series_arg(&call.args[0], from, until, values) {
        Ok(series) => Ok(series),
        Err(_) => {
            let n = ((until - from) / 60 + 1).max(0) as usize;
            let mut placeholder = Series::new("unknown", from, until, 60, vec![0.0; n]);
            placeholder.is_absent = vec![true; n];
            Ok(vec![placeholder])
        }
    }
}
