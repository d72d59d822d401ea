//! Threshold comparators and the variance anomaly check
//!
//! Comparator outputs are alert-shaped: 0 where the condition holds, 1
//! where it fails, absent where either operand is absent. They draw as
//! infinite lines on the second Y axis so they overlay cleanly.

use super::{args, map_series, Call};
use crate::error::{ErrorKind, EvalResult};
use crate::stats::Windowed;
use crate::types::{Series, ValuesMap};

/// `checkLess` / `checkLessEqual` / `checkGreater` / `checkGreaterEqual` /
/// `checkEqual`
///
/// The comparator argument is either an equal-shape series or a two-sample
/// constant line, whose first sample becomes a fixed threshold.
pub(crate) fn check(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    if call.args.len() < 2 {
        return Err(ErrorKind::MissingArgument);
    }

    let comparator = args::get_series_arg(&call.args[1], from, until, values)?;
    if comparator.len() != 1 {
        return Err(ErrorKind::MissingTimeseries);
    }
    let c = comparator.into_iter().next().unwrap();

    let split = call.target.find(['L', 'G', 'E']).ok_or(ErrorKind::BadType)?;
    let (compare, op): (fn(f64, f64) -> bool, &str) = match &call.target[split..] {
        "Less" => (|a, b| a < b, "<"),
        "LessEqual" => (|a, b| a <= b, "<="),
        "Greater" => (|a, b| a > b, ">"),
        "GreaterEqual" => (|a, b| a >= b, ">="),
        "Equal" => (|a, b| a == b, "="),
        _ => return Err(ErrorKind::BadType),
    };

    // A two-sample comparator is a constant line; anything else must be an
    // equal-shape series.
    let threshold = (c.len() == 2).then(|| c.values[0]);
    let operand_name = match threshold {
        Some(v) => format!("{}", v as i64),
        None => c.name.clone(),
    };

    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        r.name = format!("{} {} {}", a.name, op, operand_name);
        r.attrs.draw_as_infinite = true;
        r.attrs.second_y_axis = true;

        for i in 0..a.len() {
            if a.is_absent[i] {
                r.is_absent[i] = true;
                continue;
            }

            let v2 = match threshold {
                Some(v) => v,
                None => {
                    if i >= c.len() || c.is_absent[i] {
                        r.is_absent[i] = true;
                        continue;
                    }
                    c.values[i]
                }
            };

            r.values[i] = if compare(a.values[i], v2) { 0.0 } else { 1.0 };
        }
    })
}

/// Flag samples that sit `acceptableStdevs` deviations away from the
/// pointwise sibling mean, but only once `windows` consecutive samples
/// (counting runs on both sides) are flagged together
pub(crate) fn check_variance(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let acceptable_stdevs = args::get_float_arg(call, 1)?;
    let windows = args::get_int_arg(call, 2)?;

    let length = arg[0].len();

    // Pointwise mean and biased stdev across the present sibling samples;
    // indices with no data report zero.
    let mut averages = vec![0.0; length];
    let mut stdevs = vec![0.0; length];
    for i in 0..length {
        let present: Vec<f64> = arg
            .iter()
            .filter(|a| i < a.len() && !a.is_absent[i])
            .map(|a| a.values[i])
            .collect();
        if present.is_empty() {
            continue;
        }

        averages[i] = present.iter().sum::<f64>() / present.len() as f64;

        let mut w = Windowed::new(present.len());
        for &v in &present {
            w.push(v);
        }
        let stdev = w.stdev();
        if !stdev.is_nan() {
            stdevs[i] = stdev;
        }
    }

    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        r.name = format!(
            "stdev({}) < {:.2} ({} windows)",
            a.name, acceptable_stdevs, windows
        );
        r.attrs.draw_as_infinite = true;
        r.attrs.second_y_axis = true;

        let n = a.len();
        let mut single_failures = vec![0i64; n];
        for i in 0..n {
            if a.is_absent[i] || i >= length {
                continue;
            }

            let stdevs_away = if stdevs[i] > 0.0 {
                ((a.values[i] - averages[i]) / stdevs[i]).abs()
            } else {
                0.0
            };

            if stdevs_away >= acceptable_stdevs {
                single_failures[i] = 1;
            }
        }

        // Run lengths of consecutive failures to the left and right of each
        // sample.
        let mut left_failures = vec![0i64; n];
        let mut failures = 0i64;
        for i in 0..n {
            left_failures[i] = failures;
            if single_failures[i] == 1 {
                failures += 1;
            } else {
                failures = 0;
            }
        }

        let mut right_failures = vec![0i64; n];
        failures = 0;
        for i in (0..n).rev() {
            right_failures[i] = failures;
            if single_failures[i] == 1 {
                failures += 1;
            } else {
                failures = 0;
            }
        }

        for i in 0..n {
            if single_failures[i] == 0 {
                continue;
            }

            let run = 1 + left_failures[i] + right_failures[i];
            r.values[i] = if run < windows { 0.0 } else { 1.0 };
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::eval;
    use crate::parser::parse;
    use crate::types::{MetricRequest, Series, ValuesMap};

    fn run(target: &str, values: &ValuesMap, until: i32) -> Vec<Series> {
        let (expr, _) = parse(target).unwrap();
        eval(&expr, 0, until, values)
    }

    #[test]
    fn test_check_less_against_constant_line() {
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", 0, 180),
            vec![Series::new("foo.a", 0, 180, 60, vec![1.0, 5.0, 2.0])],
        );
        let out = run("checkLess(foo.a,constantLine(3))", &map, 180);
        assert_eq!(out[0].name, "foo.a < 3");
        assert_eq!(out[0].values, vec![0.0, 1.0, 0.0]);
        assert!(out[0].attrs.draw_as_infinite);
        assert!(out[0].attrs.second_y_axis);
    }

    #[test]
    fn test_check_greater_against_series() {
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", 0, 180),
            vec![Series::new("foo.a", 0, 180, 60, vec![1.0, 5.0, 2.0])],
        );
        let mut b = Series::new("foo.b", 0, 180, 60, vec![0.0, 9.0, 0.0]);
        b.is_absent = vec![false, false, true];
        map.insert(MetricRequest::new("foo.b", 0, 180), vec![b]);

        let out = run("checkGreater(foo.a,foo.b)", &map, 180);
        assert_eq!(out[0].name, "foo.a > foo.b");
        assert_eq!(out[0].values[0], 0.0); // 1 > 0 holds
        assert_eq!(out[0].values[1], 1.0); // 5 > 9 fails
        assert!(out[0].is_absent[2]); // comparator absent
    }

    #[test]
    fn test_check_equal() {
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", 0, 120),
            vec![Series::new("foo.a", 0, 120, 60, vec![3.0, 4.0])],
        );
        let out = run("checkEqual(foo.a,constantLine(3))", &map, 120);
        assert_eq!(out[0].values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_check_variance_requires_consecutive_windows() {
        // Three siblings; the third spikes away from the others for two
        // consecutive samples in the middle.
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.*", 0, 300),
            vec![
                Series::new("foo.a", 0, 300, 60, vec![1.0, 1.0, 1.0, 1.0, 1.0]),
                Series::new("foo.b", 0, 300, 60, vec![1.2, 1.2, 1.2, 1.2, 1.2]),
                Series::new("foo.c", 0, 300, 60, vec![1.1, 9.0, 9.0, 1.1, 1.1]),
            ],
        );

        let out = run("checkVariance(foo.*,1,2)", &map, 300);
        assert_eq!(out.len(), 3);
        let spiky = &out[2];
        assert_eq!(spiky.name, "stdev(foo.c) < 1.00 (2 windows)");
        assert_eq!(spiky.values[0], 0.0);
        assert_eq!(spiky.values[1], 1.0);
        assert_eq!(spiky.values[2], 1.0);
        assert_eq!(spiky.values[3], 0.0);
        assert!(spiky.attrs.draw_as_infinite);
    }
}
