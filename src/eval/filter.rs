//! Filters over names and reduced values, sorting, and truncation

use std::cmp::Ordering;

use regex::Regex;
use tracing::debug;

use super::{args, Call};
use crate::error::{ErrorKind, EvalResult};
use crate::stats;
use crate::types::{Series, ValuesMap};

/// `grep` keeps series whose name matches the pattern; `exclude` drops them
pub(crate) fn grep_or_exclude(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let pattern = args::get_string_arg(call, 1)?;

    let re = Regex::new(pattern).map_err(|e| {
        debug!(pattern, error = %e, "filter pattern rejected");
        ErrorKind::BadType
    })?;

    let keep_matches = call.target == "grep";
    Ok(arg
        .into_iter()
        .filter(|a| re.is_match(&a.name) == keep_matches)
        .collect())
}

/// The `averageAbove`/`maximumBelow`-family filters: reduce each series to
/// one value and compare against the threshold.
///
/// `*Above` is inclusive except for the `maximum`/`minimum` variants, which
/// are strict; `*Below` is always inclusive.
pub(crate) fn filter_by_reduced_value(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let n = args::get_float_arg(call, 1)?;

    let split = call
        .target
        .find(['A', 'B'])
        .ok_or(ErrorKind::BadType)?;
    let above = &call.target[split..] == "Above";

    let (reduce, inclusive): (fn(&[f64], &[bool]) -> f64, bool) = match &call.target[..split] {
        "average" => (stats::avg_value, true),
        "current" => (stats::current_value, true),
        "maximum" => (stats::max_value, false),
        "minimum" => (stats::min_value, false),
        _ => return Err(ErrorKind::BadType),
    };

    Ok(arg
        .into_iter()
        .filter(|a| {
            let value = reduce(&a.values, &a.is_absent);
            if above {
                if inclusive {
                    value >= n
                } else {
                    value > n
                }
            } else {
                value <= n
            }
        })
        .collect())
}

/// Keep the first `n` series
pub(crate) fn limit(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let mut arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let n = args::get_int_arg(call, 1)?;

    if n < 0 {
        return Err(ErrorKind::BadType);
    }

    arg.truncate(n as usize);
    Ok(arg)
}

/// `sortByTotal` / `sortByMaxima` / `sortByMinima`: order by a summarized
/// value, largest first (minima sorts by reciprocal so the smallest minimum
/// wins)
pub(crate) fn sort_by_value(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;

    let mut keyed: Vec<(f64, Series)> = arg
        .into_iter()
        .map(|a| {
            let key = match call.target {
                "sortByTotal" => stats::summarize_values("sum", &a.values),
                "sortByMaxima" => stats::summarize_values("max", &a.values),
                _ => 1.0 / stats::summarize_values("min", &a.values),
            };
            (key, a)
        })
        .collect();

    keyed.sort_by(|x, y| y.0.partial_cmp(&x.0).unwrap_or(Ordering::Equal));

    Ok(keyed.into_iter().map(|(_, a)| a).collect())
}

pub(crate) fn sort_by_name(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let mut arg = args::get_series_arg(&call.args[0], from, until, values)?;
    arg.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(arg)
}
