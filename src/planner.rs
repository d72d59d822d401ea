//! Metric-request planner
//!
//! Walks a parsed expression and collects the raw fetches it needs. Leaf
//! selectors contribute `(metric, 0, 0)` — offsets relative to whatever base
//! window the caller will evaluate with — and time-aware functions rewrite
//! the offsets of everything collected beneath them:
//!
//! - `timeShift(series, interval)` shifts both ends of every request by the
//!   parsed interval (negative by default).
//! - `holtWintersForecast(...)` pulls `from` back seven days so the model
//!   has a warm-up window.
//!
//! The planner never evaluates anything; deduplication and fetching belong
//! to the collaborator that owns storage.

use crate::ast::Expr;
use crate::interval::parse_interval;
use crate::types::MetricRequest;

const FORECAST_WARMUP_SECONDS: i32 = 7 * 86400;

/// Collect the fetch requests an expression needs, with time rewrites
/// applied.
///
/// # Example
///
/// ```rust
/// use graphfn::parser::parse;
/// use graphfn::planner::metric_requests;
///
/// let (expr, _) = parse("timeShift(foo.bar,'1h')").unwrap();
/// let reqs = metric_requests(&expr);
/// assert_eq!(reqs.len(), 1);
/// assert_eq!(reqs[0].metric, "foo.bar");
/// assert_eq!(reqs[0].from, -3600);
/// assert_eq!(reqs[0].until, -3600);
/// ```
pub fn metric_requests(e: &Expr) -> Vec<MetricRequest> {
    match e {
        Expr::Name { target } => vec![MetricRequest::new(target.clone(), 0, 0)],
        Expr::Const { .. } | Expr::Str { .. } => Vec::new(),
        Expr::Func { target, args, .. } => {
            let mut requests: Vec<MetricRequest> =
                args.iter().flat_map(metric_requests).collect();

            match target.as_str() {
                "timeShift" => {
                    let Some(offset) = shift_offset(args) else {
                        return Vec::new();
                    };
                    for r in &mut requests {
                        r.from += offset;
                        r.until += offset;
                    }
                }
                "holtWintersForecast" => {
                    for r in &mut requests {
                        r.from -= FORECAST_WARMUP_SECONDS;
                    }
                }
                _ => {}
            }

            requests
        }
    }
}

/// The `timeShift` interval argument, defaulting unsigned literals to the
/// past
fn shift_offset(args: &[Expr]) -> Option<i32> {
    match args.get(1) {
        Some(Expr::Str { val }) => parse_interval(val, -1).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn requests_for(target: &str) -> Vec<MetricRequest> {
        let (expr, rest) = parse(target).unwrap();
        assert!(rest.is_empty());
        metric_requests(&expr)
    }

    #[test]
    fn test_name_contributes_zero_offsets() {
        let reqs = requests_for("foo.bar");
        assert_eq!(reqs, vec![MetricRequest::new("foo.bar", 0, 0)]);
    }

    #[test]
    fn test_consts_and_strings_contribute_nothing() {
        assert!(requests_for("constantLine(42)").is_empty());
    }

    #[test]
    fn test_function_unions_argument_requests() {
        let reqs = requests_for("sumSeries(foo.bar,foo.baz)");
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].metric, "foo.bar");
        assert_eq!(reqs[1].metric, "foo.baz");
    }

    #[test]
    fn test_time_shift_rewrites_whole_subtree() {
        let reqs = requests_for("timeShift(sumSeries(foo.bar,foo.baz),'1d')");
        assert_eq!(reqs.len(), 2);
        for r in &reqs {
            assert_eq!(r.from, -86400);
            assert_eq!(r.until, -86400);
        }
    }

    #[test]
    fn test_time_shift_explicit_positive() {
        let reqs = requests_for("timeShift(foo.bar,'+1h')");
        assert_eq!(reqs[0].from, 3600);
        assert_eq!(reqs[0].until, 3600);
    }

    #[test]
    fn test_time_shift_bad_interval_drops_requests() {
        assert!(requests_for("timeShift(foo.bar,'nonsense')").is_empty());
        assert!(requests_for("timeShift(foo.bar,5)").is_empty());
    }

    #[test]
    fn test_forecast_extends_from_by_a_week() {
        let reqs = requests_for("holtWintersForecast(foo.bar)");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].from, -7 * 86400);
        assert_eq!(reqs[0].until, 0);
    }

    #[test]
    fn test_nested_rewrites_compose() {
        let reqs = requests_for("timeShift(holtWintersForecast(foo.bar),'1d')");
        assert_eq!(reqs[0].from, -8 * 86400);
        assert_eq!(reqs[0].until, -86400);
    }
}
