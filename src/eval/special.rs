//! Constant lines, time shifting, and forecasting

use super::{args, Call};
use crate::ast::fmt_g;
use crate::error::{ErrorKind, EvalResult};
use crate::holtwinters;
use crate::types::{Series, ValuesMap};

const ALPHA: f64 = 0.1;
const BETA: f64 = 0.0035;
const GAMMA: f64 = 0.1;
const SEASON_SECONDS: i32 = 86400;
const WARMUP_SECONDS: i32 = 7 * 86400;

/// A two-sample horizontal line spanning the evaluation window
pub(crate) fn constant_line(
    call: &Call<'_>,
    from: i32,
    until: i32,
    _values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let value = args::get_float_arg(call, 0)?;

    Ok(vec![Series::new(
        fmt_g(value),
        from,
        until,
        until - from,
        vec![value, value],
    )])
}

/// Evaluate the subexpression over the shifted window, then relabel the
/// results back onto the requested one
pub(crate) fn time_shift(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let offset = args::get_interval_arg(call, 1, -1)?;
    let arg = args::get_series_arg(&call.args[0], from + offset, until + offset, values)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.renamed(format!("timeShift({})", a.name));
            r.start_time = a.start_time - offset;
            r.stop_time = a.stop_time - offset;
            r
        })
        .collect())
}

/// Holt-Winters forecast of the evaluation window, seeded from a seven-day
/// warm-up fetch.
///
/// The planner extends each underlying request a week into the past; here
/// the warm-up segment trains the model and only the predictions covering
/// the original window are returned. The season is one day of samples.
pub(crate) fn holt_winters_forecast(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_args(call.args, from - WARMUP_SECONDS, until, values)?;

    let mut results = Vec::with_capacity(arg.len());
    for a in &arg {
        if a.step_time <= 0 {
            return Err(ErrorKind::BadType);
        }

        let horizon = ((until - from) / a.step_time) as usize;
        if horizon == 0 || horizon > a.len() {
            return Err(ErrorKind::BadType);
        }
        let warmup = &a.values[..a.len() - horizon];

        let period = (SEASON_SECONDS / a.step_time) as usize;
        let predictions =
            holtwinters::forecast(warmup, ALPHA, BETA, GAMMA, period, horizon)
                .ok_or(ErrorKind::BadType)?;

        let window = predictions[predictions.len() - horizon..].to_vec();
        let mut r = Series::new(
            format!("holtWintersForecast({})", a.name),
            a.start_time + WARMUP_SECONDS,
            a.stop_time,
            a.step_time,
            window,
        );
        r.attrs = a.attrs.clone();
        results.push(r);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::super::eval;
    use crate::parser::parse;
    use crate::types::{MetricRequest, Series, ValuesMap};

    fn run(target: &str, values: &ValuesMap, from: i32, until: i32) -> Vec<Series> {
        let (expr, _) = parse(target).unwrap();
        eval(&expr, from, until, values)
    }

    #[test]
    fn test_constant_line() {
        let out = run("constantLine(42.5)", &ValuesMap::new(), 0, 120);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "42.5");
        assert_eq!(out[0].values, vec![42.5, 42.5]);
        assert_eq!(out[0].start_time, 0);
        assert_eq!(out[0].stop_time, 120);
        assert_eq!(out[0].step_time, 120);
    }

    #[test]
    fn test_time_shift_relabels_window() {
        // The engine fetches the shifted window; the output is relabeled
        // back onto the requested one.
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", -3600, -3480),
            vec![Series::new("foo.a", -3600, -3480, 60, vec![1.0, 2.0])],
        );

        let out = run("timeShift(foo.a,'-1h')", &map, 0, 120);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "timeShift(foo.a)");
        assert_eq!(out[0].start_time, 0);
        assert_eq!(out[0].stop_time, 120);
        assert_eq!(out[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_holt_winters_forecast_window() {
        // 1-hour step: a day-long season is 24 samples. Provide 7 days of
        // warm-up plus the 1-day evaluation window.
        let step = 3600;
        let from = 7 * 86400;
        let until = 8 * 86400;
        let season: Vec<f64> = (0..24).map(|h| 10.0 + (h % 12) as f64).collect();
        let total = 8 * 24;
        let values: Vec<f64> = (0..total).map(|i| season[i % 24]).collect();

        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", from - 7 * 86400, until),
            vec![Series::new("foo.a", 0, until, step, values)],
        );

        let out = run("holtWintersForecast(foo.a)", &map, from, until);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "holtWintersForecast(foo.a)");
        assert_eq!(out[0].len(), 24);
        assert_eq!(out[0].start_time, 7 * 86400);
        assert_eq!(out[0].stop_time, until);
        assert!(out[0].is_absent.iter().all(|&x| !x));
    }

    #[test]
    fn test_holt_winters_too_little_data_fails_closed() {
        let mut map = ValuesMap::new();
        map.insert(
            MetricRequest::new("foo.a", -7 * 86400, 120),
            vec![Series::new("foo.a", -7 * 86400, 120, 60, vec![1.0, 2.0, 3.0])],
        );
        assert!(run("holtWintersForecast(foo.a)", &map, 0, 120).is_empty());
    }
}
