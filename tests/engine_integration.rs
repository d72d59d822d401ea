//! Integration tests for the expression engine
//!
//! These exercise the full pipeline: parse a textual target, plan its
//! fetches, bind data, and evaluate. Covers the end-to-end scenarios a
//! render endpoint would drive plus the algebraic invariants the operators
//! promise (idempotence, identity factors, self-difference, commutative
//! sums, derivative/integral inversion).

use graphfn::types::{MetricRequest, Series, ValuesMap};
use graphfn::{eval, metric_requests, parse, Expr};

// ============================================================================
// Helper Functions
// ============================================================================

/// Build a one-series map for `name` over `[0, 60 * len)` at a 60 s step
fn bind(name: &str, values: Vec<f64>, absent: Vec<bool>) -> (ValuesMap, i32) {
    let until = 60 * values.len() as i32;
    let mut s = Series::new(name, 0, until, 60, values);
    s.is_absent = absent;
    let mut map = ValuesMap::new();
    map.insert(MetricRequest::new(name, 0, until), vec![s]);
    (map, until)
}

/// Parse and evaluate a target over `[from, until)`
fn run(target: &str, values: &ValuesMap, from: i32, until: i32) -> Vec<Series> {
    let (expr, rest) = parse(target).expect("target should parse");
    assert!(rest.is_empty(), "unconsumed tail {:?}", rest);
    eval(&expr, from, until, values)
}

/// Assert two series agree pointwise: same length, same absent flags, and
/// equal values wherever present
fn assert_same_points(a: &Series, b: &Series) {
    assert_eq!(a.len(), b.len());
    for i in 0..a.len() {
        assert_eq!(a.is_absent[i], b.is_absent[i], "absence differs at {}", i);
        if !a.is_absent[i] {
            assert!(
                (a.values[i] - b.values[i]).abs() < 1e-9,
                "values differ at {}: {} vs {}",
                i,
                a.values[i],
                b.values[i]
            );
        }
    }
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

#[test]
fn test_sum_of_constant_lines() {
    let out = run(
        "sumSeries(constantLine(1),constantLine(2))",
        &ValuesMap::new(),
        0,
        120,
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "sumSeries(constantLine(1),constantLine(2))");
    assert_eq!(out[0].values, vec![3.0, 3.0]);
    assert_eq!(out[0].is_absent, vec![false, false]);
}

#[test]
fn test_moving_average_warmup() {
    let (map, until) = bind("a", vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![false; 5]);
    let out = run("movingAverage(a,3)", &map, 0, until);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].is_absent, vec![true, true, true, false, false]);
    assert!((out[0].values[3] - 2.0).abs() < 1e-12);
    assert!((out[0].values[4] - 3.0).abs() < 1e-12);
}

#[test]
fn test_n_percentile_interpolates() {
    let (map, until) = bind("a", vec![1.0, 2.0, 3.0, 4.0], vec![false; 4]);
    let out = run("nPercentile(a,50)", &map, 0, until);
    assert_eq!(out[0].values, vec![2.5; 4]);
}

#[test]
fn test_as_percent_absent_and_zero_denominator() {
    let (mut map, until) = bind(
        "a",
        vec![10.0, 20.0, 0.0, 40.0],
        vec![false, false, true, false],
    );
    map.insert(
        MetricRequest::new("b", 0, until),
        vec![Series::new("b", 0, until, 60, vec![100.0, 100.0, 100.0, 0.0])],
    );

    let out = run("asPercent(a,b)", &map, 0, until);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].values[0], 10.0);
    assert_eq!(out[0].values[1], 20.0);
    assert!(out[0].is_absent[2]);
    assert!(out[0].is_absent[3]);
}

#[test]
fn test_time_shift_plan_and_eval() {
    let target = "timeShift(a,'-1h')";
    let (expr, _) = parse(target).unwrap();

    // The planner asks for the shifted window...
    let reqs = metric_requests(&expr);
    assert_eq!(reqs, vec![MetricRequest::new("a", -3600, -3600)]);

    // ...and the evaluator looks the subtree up under that window, then
    // relabels the output onto the requested one.
    let mut map = ValuesMap::new();
    map.insert(
        MetricRequest::new("a", -3600, -3600 + 120),
        vec![Series::new("a", -3600, -3480, 60, vec![7.0, 8.0])],
    );

    let out = eval(&expr, 0, 120, &map);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start_time, -3600 + 3600);
    assert_eq!(out[0].stop_time, -3480 + 3600);
    assert_eq!(out[0].values, vec![7.0, 8.0]);
}

#[test]
fn test_group_by_node_sums_each_group() {
    let mut map = ValuesMap::new();
    map.insert(
        MetricRequest::new("servers.{a,b}.cpu", 0, 120),
        vec![
            Series::new("servers.a.cpu", 0, 120, 60, vec![1.0, 1.0]),
            Series::new("servers.b.cpu", 0, 120, 60, vec![2.0, 2.0]),
        ],
    );

    let out = run("groupByNode(servers.{a,b}.cpu,1,'sumSeries')", &map, 0, 120);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].name, "sumSeries(a)");
    assert_eq!(out[0].values, vec![1.0, 1.0]);
    assert_eq!(out[1].name, "sumSeries(b)");
    assert_eq!(out[1].values, vec![2.0, 2.0]);
}

#[test]
fn test_fail_closed_on_unknown_function_and_bad_args() {
    let (map, until) = bind("a", vec![1.0, 2.0], vec![false; 2]);
    assert!(run("definitelyNotAFunction(a)", &map, 0, until).is_empty());
    assert!(run("scale(a)", &map, 0, until).is_empty()); // missing factor
    assert!(run("scale(a,'2')", &map, 0, until).is_empty()); // wrong type
    assert!(run("scale(missing.metric,2)", &map, 0, until).is_empty());
}

#[test]
fn test_glob_selector_fans_out() {
    let mut map = ValuesMap::new();
    map.insert(
        MetricRequest::new("foo.*", 0, 60),
        vec![
            Series::new("foo.a", 0, 60, 60, vec![1.0]),
            Series::new("foo.b", 0, 60, 60, vec![2.0]),
        ],
    );

    let out = run("scale(foo.*,10)", &map, 0, 60);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].name, "scale(foo.a,10)");
    assert_eq!(out[1].name, "scale(foo.b,10)");
}

// ============================================================================
// Universal Invariants
// ============================================================================

#[test]
fn test_parse_reconstructs_arg_string() {
    let text = "summarize(scale(foo.bar,2),'1min','avg')";
    let (expr, _) = parse(text).unwrap();
    match expr {
        Expr::Func {
            target, arg_string, ..
        } => {
            assert_eq!(format!("{}({})", target, arg_string), text);
        }
        _ => panic!("expected call"),
    }
}

#[test]
fn test_values_and_absence_stay_parallel() {
    let (map, until) = bind(
        "a",
        vec![1.0, 0.0, 3.0, 0.0],
        vec![false, true, false, true],
    );
    for target in [
        "absolute(a)",
        "integral(a)",
        "derivative(a)",
        "movingAverage(a,2)",
        "summarize(a,'2min')",
        "keepLastValue(a)",
    ] {
        for s in run(target, &map, 0, until) {
            assert_eq!(
                s.values.len(),
                s.is_absent.len(),
                "parallel vectors diverged for {}",
                target
            );
        }
    }
}

#[test]
fn test_alias_idempotent() {
    let (map, until) = bind("a", vec![1.0, 2.0], vec![false; 2]);
    let once = run("alias(a,'x')", &map, 0, until);
    let twice = run("alias(alias(a,'x'),'x')", &map, 0, until);
    assert_eq!(once, twice);
}

#[test]
fn test_absolute_idempotent() {
    let (map, until) = bind("a", vec![-1.0, 2.0, -3.0], vec![false, false, true]);
    let once = run("absolute(a)", &map, 0, until);
    let twice = run("absolute(absolute(a))", &map, 0, until);
    assert_same_points(&once[0], &twice[0]);
}

#[test]
fn test_is_non_null_idempotent() {
    let (map, until) = bind("a", vec![1.0, 0.0], vec![false, true]);
    let once = run("isNonNull(a)", &map, 0, until);
    let twice = run("isNonNull(isNonNull(a))", &map, 0, until);
    assert_same_points(&once[0], &twice[0]);
}

#[test]
fn test_scale_by_one_is_identity() {
    let (map, until) = bind("a", vec![1.5, 0.0, -2.5], vec![false, true, false]);
    let original = run("absolute(a)", &map, 0, until); // any derived copy
    let scaled = run("scale(absolute(a),1)", &map, 0, until);
    assert_same_points(&original[0], &scaled[0]);
}

#[test]
fn test_diff_series_with_self_is_zero() {
    let (map, until) = bind("a", vec![1.0, 0.0, 3.0], vec![false, true, false]);
    let out = run("diffSeries(a,a)", &map, 0, until);
    assert_eq!(out[0].values[0], 0.0);
    assert!(out[0].is_absent[1]);
    assert_eq!(out[0].values[2], 0.0);
}

#[test]
fn test_sum_is_commutative() {
    let mut map = ValuesMap::new();
    for (name, vals) in [("a", vec![1.0, 4.0]), ("b", vec![2.0, 5.0]), ("c", vec![3.0, 6.0])] {
        map.insert(
            MetricRequest::new(name, 0, 120),
            vec![Series::new(name, 0, 120, 60, vals)],
        );
    }

    let fwd = run("sumSeries(a,b,c)", &map, 0, 120);
    let rev = run("sumSeries(c,b,a)", &map, 0, 120);
    assert_same_points(&fwd[0], &rev[0]);
    assert_eq!(fwd[0].values, vec![6.0, 15.0]);
}

#[test]
fn test_derivative_undoes_integral() {
    let (map, until) = bind("a", vec![2.0, 5.0, 1.0, 4.0], vec![false; 4]);
    let original = run("absolute(a)", &map, 0, until);
    let round_trip = run("derivative(integral(a))", &map, 0, until);

    assert!(round_trip[0].is_absent[0]);
    for i in 1..4 {
        assert!(
            (round_trip[0].values[i] - original[0].values[i]).abs() < 1e-9,
            "mismatch at {}",
            i
        );
    }
}

#[test]
fn test_sort_ranking_closure() {
    let mut map = ValuesMap::new();
    map.insert(
        MetricRequest::new("foo.*", 0, 60),
        vec![
            Series::new("foo.c", 0, 60, 60, vec![3.0]),
            Series::new("foo.a", 0, 60, 60, vec![1.0]),
            Series::new("foo.b", 0, 60, 60, vec![2.0]),
        ],
    );

    let once = run("sortByName(foo.*)", &map, 0, 60);
    let twice = run("sortByName(sortByName(foo.*))", &map, 0, 60);
    let names: Vec<&str> = once.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["foo.a", "foo.b", "foo.c"]);
    assert_eq!(once, twice);
}

// ============================================================================
// Plan/Fetch/Eval Contract
// ============================================================================

#[test]
fn test_planner_offsets_feed_fetch_keys() {
    // The planner emits offsets relative to a zero base; a fetcher adds the
    // real window, and the evaluator keys its internal re-requests the same
    // way.
    let target = "sumSeries(timeShift(a,'-1h'),b)";
    let (expr, _) = parse(target).unwrap();

    let reqs = metric_requests(&expr);
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0], MetricRequest::new("a", -3600, -3600));
    assert_eq!(reqs[1], MetricRequest::new("b", 0, 0));

    let (from, until) = (1000, 1120);
    let mut map = ValuesMap::new();
    map.insert(
        MetricRequest::new("a", from - 3600, until - 3600),
        vec![Series::new("a", from - 3600, until - 3600, 60, vec![1.0, 1.0])],
    );
    map.insert(
        MetricRequest::new("b", from, until),
        vec![Series::new("b", from, until, 60, vec![2.0, 2.0])],
    );

    let out = eval(&expr, from, until, &map);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].values, vec![3.0, 3.0]);
}
