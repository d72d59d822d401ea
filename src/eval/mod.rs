//! Expression evaluator
//!
//! `eval` turns a parsed expression plus fetched data into derived series.
//! Dispatch lives here; the operator families each get their own module:
//!
//! - `transform`: per-point transforms over one series
//! - `alias`: name rewrites and presentation tags
//! - `combine`: multi-series reductions, arithmetic, grouping
//! - `filter`: name/value filters, sorts, truncation
//! - `rank`: heap-based top-N selection
//! - `windowed`: moving-window statistics
//! - `compare`: threshold comparators and variance anomaly checks
//! - `buckets`: fixed-width bucket summarization
//! - `special`: constant lines, time shifting, forecasting
//!
//! Every operator fails closed: argument and lookup problems yield an empty
//! series list rather than aborting the evaluation, so a dashboard with one
//! broken target still renders the rest. Unknown function names are logged
//! at warning level and likewise return nothing.

mod alias;
mod args;
mod buckets;
mod combine;
mod compare;
mod filter;
mod rank;
mod special;
mod transform;
mod windowed;

use tracing::warn;

use crate::ast::{fmt_g, Expr};
use crate::error::EvalResult;
use crate::types::{MetricRequest, Series, ValuesMap};

/// A function invocation under evaluation
pub(crate) struct Call<'a> {
    pub target: &'a str,
    pub args: &'a [Expr],
    pub arg_string: &'a str,
}

/// Evaluate an expression over `[from, until)` against fetched data.
///
/// `Name` nodes look up `values[{target, from, until}]` — the caller must
/// have populated exactly that key. `Const` nodes become a degenerate
/// single-sample series. String nodes and zero-argument calls evaluate to
/// nothing.
pub fn eval(e: &Expr, from: i32, until: i32, values: &ValuesMap) -> Vec<Series> {
    match e {
        Expr::Name { target } => values
            .get(&MetricRequest::new(target.clone(), from, until))
            .cloned()
            .unwrap_or_default(),
        Expr::Const { val } => vec![Series::new(fmt_g(*val), 0, 0, 0, vec![*val])],
        Expr::Str { .. } => Vec::new(),
        Expr::Func {
            target,
            args,
            arg_string,
        } => {
            if args.is_empty() {
                return Vec::new();
            }
            dispatch(
                &Call {
                    target,
                    args,
                    arg_string,
                },
                from,
                until,
                values,
            )
        }
    }
}

fn dispatch(call: &Call<'_>, from: i32, until: i32, values: &ValuesMap) -> Vec<Series> {
    let result: EvalResult<Vec<Series>> = match call.target {
        "absolute" => transform::absolute(call, from, until, values),
        "integral" => transform::integral(call, from, until, values),
        "invert" => transform::invert(call, from, until, values),
        "squareRoot" => transform::square_root(call, from, until, values),
        "isNonNull" | "isNotNull" => transform::is_non_null(call, from, until, values),
        "offsetToZero" => transform::offset_to_zero(call, from, until, values),
        "derivative" => transform::derivative(call, from, until, values),
        "scale" => transform::scale(call, from, until, values),
        "offset" => transform::offset(call, from, until, values),
        "pow" => transform::pow(call, from, until, values),
        "scaleToSeconds" => transform::scale_to_seconds(call, from, until, values),
        "transformNull" => transform::transform_null(call, from, until, values),
        "keepLastValue" => transform::keep_last_value(call, from, until, values),
        "logarithm" | "log" => transform::logarithm(call, from, until, values),
        "changed" => transform::changed(call, from, until, values),
        "nonNegativeDerivative" => {
            transform::non_negative_derivative(call, from, until, values)
        }
        "perSecond" => transform::per_second(call, from, until, values),
        "removeAboveValue" | "removeBelowValue" => {
            transform::remove_by_value(call, from, until, values)
        }

        "alias" => alias::alias(call, from, until, values),
        "aliasByMetric" => alias::alias_by_metric(call, from, until, values),
        "aliasByNode" => alias::alias_by_node(call, from, until, values),
        "aliasSub" => alias::alias_sub(call, from, until, values),
        "color" => alias::color(call, from, until, values),
        "dashed" | "drawAsInfinite" | "secondYAxis" => {
            alias::render_flag(call, from, until, values)
        }
        "severity" => alias::severity(call, from, until, values),
        "failureThreshold" => alias::failure_threshold(call, from, until, values),

        "sum" | "sumSeries" => combine::sum_series(call, from, until, values),
        "avg" | "averageSeries" => combine::average_series(call, from, until, values),
        "maxSeries" => combine::max_series(call, from, until, values),
        "minSeries" => combine::min_series(call, from, until, values),
        "sumSeriesWithWildcards" | "averageSeriesWithWildcards" => {
            combine::series_with_wildcards(call, from, until, values)
        }
        "diffSeries" => combine::diff_series(call, from, until, values),
        "divideSeries" => combine::divide_series(call, from, until, values),
        "multiplySeries" => combine::multiply_series(call, from, until, values),
        "asPercent" => combine::as_percent(call, from, until, values),
        "percentileOfSeries" => combine::percentile_of_series(call, from, until, values),
        "nPercentile" => combine::n_percentile(call, from, until, values),
        "group" => combine::group(call, from, until, values),
        "groupByNode" => combine::group_by_node(call, from, until, values),
        "ensure" => combine::ensure(call, from, until, values),

        "grep" | "exclude" => filter::grep_or_exclude(call, from, until, values),
        "averageAbove" | "averageBelow" | "currentAbove" | "currentBelow" | "maximumAbove"
        | "maximumBelow" | "minimumAbove" | "minimumBelow" => {
            filter::filter_by_reduced_value(call, from, until, values)
        }
        "limit" => filter::limit(call, from, until, values),
        "sortByMaxima" | "sortByMinima" | "sortByTotal" => {
            filter::sort_by_value(call, from, until, values)
        }
        "sortByName" => filter::sort_by_name(call, from, until, values),

        "highestAverage" | "highestCurrent" | "highestMax" => {
            rank::highest(call, from, until, values)
        }
        "lowestAverage" | "lowestCurrent" => rank::lowest(call, from, until, values),
        "mostDeviant" => rank::most_deviant(call, from, until, values),
        "pearsonClosest" => rank::pearson_closest(call, from, until, values),
        "tukeyAbove" => rank::tukey_above(call, from, until, values),

        "movingAverage" => windowed::moving_average(call, from, until, values),
        "movingMedian" => windowed::moving_median(call, from, until, values),
        "stdev" | "stddev" => windowed::stdev(call, from, until, values),
        "pearson" => windowed::pearson(call, from, until, values),
        "kolmogorovSmirnovTest2" | "ksTest2" => windowed::ks_test2(call, from, until, values),

        "checkLess" | "checkLessEqual" | "checkGreater" | "checkGreaterEqual" | "checkEqual" => {
            compare::check(call, from, until, values)
        }
        "checkVariance" => compare::check_variance(call, from, until, values),

        "summarize" => buckets::summarize(call, from, until, values),
        "hitcount" => buckets::hitcount(call, from, until, values),
        "maxDataPoints" => buckets::max_data_points(call, from, until, values),

        "constantLine" => special::constant_line(call, from, until, values),
        "timeShift" => special::time_shift(call, from, until, values),
        "holtWintersForecast" => special::holt_winters_forecast(call, from, until, values),

        _ => {
            warn!(function = call.target, "unknown function in eval");
            return Vec::new();
        }
    };

    result.unwrap_or_default()
}

/// Evaluate the first argument and apply `f` to each resulting series.
///
/// Each output starts as a zeroed clone named `<target>(<input name>)`; the
/// callback fills values and may override the name or attributes.
pub(crate) fn map_series<F>(
    target: &str,
    first_arg: &Expr,
    from: i32,
    until: i32,
    values: &ValuesMap,
    f: F,
) -> EvalResult<Vec<Series>>
where
    F: Fn(&Series, &mut Series),
{
    let arg = args::get_series_arg(first_arg, from, until, values)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.zeroed(format!("{}({})", target, a.name));
            f(a, &mut r);
            r
        })
        .collect())
}

/// Pointwise reduction across sibling series.
///
/// At each index the present values are collected and reduced; indices where
/// every sibling is absent come out absent. Shorter siblings simply stop
/// contributing past their end.
pub(crate) fn aggregate_series(
    name: String,
    series: &[Series],
    f: impl Fn(&[f64]) -> f64,
) -> Vec<Series> {
    let mut r = series[0].zeroed(name);
    let mut bucket = Vec::with_capacity(series.len());

    for i in 0..r.len() {
        bucket.clear();
        for a in series {
            if i < a.len() && !a.is_absent[i] {
                bucket.push(a.values[i]);
            }
        }

        let v = if bucket.is_empty() {
            f64::NAN
        } else {
            f(&bucket)
        };

        if v.is_nan() {
            r.set_absent(i);
        } else {
            r.values[i] = v;
        }
    }

    vec![r]
}
