//! Name transforms and presentation tags
//!
//! These leave sample data untouched. `extract_metric` digs the underlying
//! metric path out of a decorated display name such as
//! `movingAverage(servers.a.cpu,10)` so node-based renames work on the
//! metric, not the decoration.

use regex::Regex;
use tracing::debug;

use super::{args, map_series, Call};
use crate::error::{ErrorKind, EvalResult};
use crate::parser::is_name_char;
use crate::types::{Series, ValuesMap};

/// Find the metric path inside a display name: the longest run of name
/// characters, with commas allowed inside braces, ending at `)` or a
/// top-level comma.
pub(crate) fn extract_metric(m: &str) -> &str {
    let bytes = m.as_bytes();
    let mut start = 0;
    let mut end = 0;
    let mut braces = 0i32;

    while end < bytes.len() {
        match bytes[end] {
            b'{' => braces += 1,
            b'}' => braces -= 1,
            b')' => return &m[start..end],
            b',' if braces == 0 => return &m[start..end],
            c => {
                if !(is_name_char(c) || c == b',') {
                    start = end + 1;
                }
            }
        }
        end += 1;
    }

    &m[start..end]
}

/// Rename the first series of the argument list outright
pub(crate) fn alias(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let name = args::get_string_arg(call, 1)?;

    Ok(vec![arg[0].renamed(name)])
}

/// Rename each series to the last dot-segment of its metric path
pub(crate) fn alias_by_metric(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    map_series(call.target, &call.args[0], from, until, values, |a, r| {
        let metric = extract_metric(&a.name);
        let last = metric.rsplit('.').next().unwrap_or(metric);
        r.name = last.to_string();
        r.values = a.values.clone();
        r.is_absent = a.is_absent.clone();
    })
}

/// Rename each series to the selected dot-segments of its metric path.
///
/// Negative indices count from the end; out-of-range indices are skipped
/// silently.
pub(crate) fn alias_by_node(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let fields = args::get_int_args(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let metric = extract_metric(&a.name);
            let nodes: Vec<&str> = metric.split('.').collect();

            let mut picked = Vec::new();
            for &f in &fields {
                let f = if f < 0 { f + nodes.len() as i64 } else { f };
                if f < 0 || f >= nodes.len() as i64 {
                    continue;
                }
                picked.push(nodes[f as usize]);
            }

            a.renamed(picked.join("."))
        })
        .collect())
}

/// Regex-replace over the metric path
pub(crate) fn alias_sub(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let search = args::get_string_arg(call, 1)?;
    let replace = args::get_string_arg(call, 2)?;

    let re = Regex::new(search).map_err(|e| {
        debug!(pattern = search, error = %e, "aliasSub pattern rejected");
        ErrorKind::BadType
    })?;

    Ok(arg
        .iter()
        .map(|a| {
            let metric = extract_metric(&a.name);
            a.renamed(re.replace_all(metric, replace).into_owned())
        })
        .collect())
}

pub(crate) fn color(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let color = args::get_string_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.renamed(format!("{}({})", call.target, a.name));
            r.attrs.color = Some(color.to_string());
            r
        })
        .collect())
}

/// `dashed` / `drawAsInfinite` / `secondYAxis`: set the matching flag
pub(crate) fn render_flag(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;

    Ok(arg
        .iter()
        .map(|a| {
            let mut r = a.renamed(format!("{}({})", call.target, a.name));
            match call.target {
                "dashed" => r.attrs.dashed = true,
                "drawAsInfinite" => r.attrs.draw_as_infinite = true,
                _ => r.attrs.second_y_axis = true,
            }
            r
        })
        .collect())
}

pub(crate) fn severity(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let severity = args::get_int_arg(call, 1)?;

    Ok(arg
        .iter()
        .map(|a| a.renamed(format!("{} sev:{}", a.name, severity)))
        .collect())
}

pub(crate) fn failure_threshold(
    call: &Call<'_>,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let arg = args::get_series_arg(&call.args[0], from, until, values)?;
    let failures = args::get_int_arg(call, 1)?;
    let max_data_points = args::get_int_arg(call, 2)?;

    if failures > max_data_points {
        debug!(
            failures,
            max_data_points, "failureThreshold exceeds max data points"
        );
        return Err(ErrorKind::BadType);
    }

    Ok(arg
        .iter()
        .map(|a| {
            a.renamed(format!(
                "{} numFailures: {} maxDataPoints: {}",
                a.name, failures, max_data_points
            ))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::eval;
    use super::extract_metric;
    use crate::parser::parse;
    use crate::types::{MetricRequest, Series, ValuesMap};

    fn fixture(names: &[&str]) -> ValuesMap {
        let series = names
            .iter()
            .map(|n| Series::new(*n, 0, 120, 60, vec![1.0, 2.0]))
            .collect();
        let mut map = ValuesMap::new();
        map.insert(MetricRequest::new("servers.*.cpu", 0, 120), series);
        map
    }

    fn run(target: &str, values: &ValuesMap) -> Vec<Series> {
        let (expr, _) = parse(target).unwrap();
        eval(&expr, 0, 120, values)
    }

    #[test]
    fn test_extract_metric() {
        assert_eq!(extract_metric("foo.bar"), "foo.bar");
        assert_eq!(extract_metric("movingAverage(foo.bar,10)"), "foo.bar");
        assert_eq!(extract_metric("scale(servers.{a,b}.cpu,2)"), "servers.{a,b}.cpu");
    }

    #[test]
    fn test_alias() {
        let values = fixture(&["servers.a.cpu"]);
        let out = run("alias(servers.*.cpu,'cpu load')", &values);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "cpu load");
        assert_eq!(out[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_alias_by_metric() {
        let values = fixture(&["servers.a.cpu"]);
        let out = run("aliasByMetric(servers.*.cpu)", &values);
        assert_eq!(out[0].name, "cpu");
        assert_eq!(out[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_alias_by_node() {
        let values = fixture(&["servers.a.cpu", "servers.b.cpu"]);
        let out = run("aliasByNode(servers.*.cpu,1)", &values);
        assert_eq!(out[0].name, "a");
        assert_eq!(out[1].name, "b");
    }

    #[test]
    fn test_alias_by_node_negative_and_out_of_range() {
        let values = fixture(&["servers.a.cpu"]);
        let out = run("aliasByNode(servers.*.cpu,-1,7)", &values);
        assert_eq!(out[0].name, "cpu");
    }

    #[test]
    fn test_alias_sub() {
        let values = fixture(&["servers.a.cpu"]);
        let out = run("aliasSub(servers.*.cpu,'servers\\.(.*)\\.cpu','$1')", &values);
        assert_eq!(out[0].name, "a");
    }

    #[test]
    fn test_alias_sub_bad_pattern_fails_closed() {
        let values = fixture(&["servers.a.cpu"]);
        let out = run("aliasSub(servers.*.cpu,'(unclosed','x')", &values);
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_flags() {
        let values = fixture(&["servers.a.cpu"]);

        let out = run("dashed(servers.*.cpu)", &values);
        assert_eq!(out[0].name, "dashed(servers.a.cpu)");
        assert!(out[0].attrs.dashed);

        let out = run("secondYAxis(servers.*.cpu)", &values);
        assert!(out[0].attrs.second_y_axis);

        let out = run("color(servers.*.cpu,'blue')", &values);
        assert_eq!(out[0].attrs.color.as_deref(), Some("blue"));
    }

    #[test]
    fn test_severity_and_failure_threshold() {
        let values = fixture(&["servers.a.cpu"]);

        let out = run("severity(servers.*.cpu,3)", &values);
        assert_eq!(out[0].name, "servers.a.cpu sev:3");

        let out = run("failureThreshold(servers.*.cpu,2,10)", &values);
        assert_eq!(
            out[0].name,
            "servers.a.cpu numFailures: 2 maxDataPoints: 10"
        );

        // threshold above max data points fails closed
        let out = run("failureThreshold(servers.*.cpu,20,10)", &values);
        assert!(out.is_empty());
    }
}
