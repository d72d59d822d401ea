//! Typed argument getters
//!
//! Each getter checks position and expression type, returning the taxonomy
//! tag on failure: `MissingArgument` when the position is empty, `BadType`
//! when the expression kind does not fit, `MissingTimeseries` when a series
//! argument evaluates to nothing. The `_default` variants substitute a
//! default for a missing position but still reject wrong types.

use super::{eval, Call};
use crate::ast::Expr;
use crate::error::{ErrorKind, EvalResult};
use crate::interval::parse_interval;
use crate::types::{Series, ValuesMap};

/// Evaluate one argument that must produce series
pub(crate) fn get_series_arg(
    arg: &Expr,
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    if !arg.yields_series() {
        return Err(ErrorKind::MissingTimeseries);
    }

    let a = eval(arg, from, until, values);
    if a.is_empty() {
        return Err(ErrorKind::MissingTimeseries);
    }

    Ok(a)
}

/// Evaluate every argument as series and concatenate the results
pub(crate) fn get_series_args(
    args: &[Expr],
    from: i32,
    until: i32,
    values: &ValuesMap,
) -> EvalResult<Vec<Series>> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(get_series_arg(arg, from, until, values)?);
    }

    if out.is_empty() {
        return Err(ErrorKind::MissingTimeseries);
    }

    Ok(out)
}

pub(crate) fn get_string_arg<'a>(call: &Call<'a>, n: usize) -> EvalResult<&'a str> {
    match call.args.get(n) {
        None => Err(ErrorKind::MissingArgument),
        Some(Expr::Str { val }) => Ok(val),
        Some(_) => Err(ErrorKind::BadType),
    }
}

pub(crate) fn get_string_arg_default<'a>(
    call: &Call<'a>,
    n: usize,
    default: &'a str,
) -> EvalResult<&'a str> {
    match call.args.get(n) {
        None => Ok(default),
        Some(Expr::Str { val }) => Ok(val),
        Some(_) => Err(ErrorKind::BadType),
    }
}

/// An interval-string argument in signed seconds
pub(crate) fn get_interval_arg(call: &Call<'_>, n: usize, default_sign: i32) -> EvalResult<i32> {
    match call.args.get(n) {
        None => Err(ErrorKind::MissingArgument),
        Some(Expr::Str { val }) => parse_interval(val, default_sign).map_err(|_| ErrorKind::BadType),
        Some(_) => Err(ErrorKind::BadType),
    }
}

pub(crate) fn get_float_arg(call: &Call<'_>, n: usize) -> EvalResult<f64> {
    match call.args.get(n) {
        None => Err(ErrorKind::MissingArgument),
        Some(Expr::Const { val }) => Ok(*val),
        Some(_) => Err(ErrorKind::BadType),
    }
}

pub(crate) fn get_float_arg_default(call: &Call<'_>, n: usize, default: f64) -> EvalResult<f64> {
    match call.args.get(n) {
        None => Ok(default),
        Some(Expr::Const { val }) => Ok(*val),
        Some(_) => Err(ErrorKind::BadType),
    }
}

pub(crate) fn get_int_arg(call: &Call<'_>, n: usize) -> EvalResult<i64> {
    get_float_arg(call, n).map(|v| v as i64)
}

pub(crate) fn get_int_arg_default(call: &Call<'_>, n: usize, default: i64) -> EvalResult<i64> {
    match call.args.get(n) {
        None => Ok(default),
        Some(Expr::Const { val }) => Ok(*val as i64),
        Some(_) => Err(ErrorKind::BadType),
    }
}

/// Every argument from position `n` onward as integers
pub(crate) fn get_int_args(call: &Call<'_>, n: usize) -> EvalResult<Vec<i64>> {
    if call.args.len() <= n {
        return Err(ErrorKind::MissingArgument);
    }

    (n..call.args.len()).map(|i| get_int_arg(call, i)).collect()
}

/// Booleans arrive as bare names: `true`, `True`, `false`, `False`
pub(crate) fn get_bool_arg_default(call: &Call<'_>, n: usize, default: bool) -> EvalResult<bool> {
    match call.args.get(n) {
        None => Ok(default),
        Some(Expr::Name { target }) => match target.as_str() {
            "true" | "True" => Ok(true),
            "false" | "False" => Ok(false),
            _ => Err(ErrorKind::BadType),
        },
        Some(_) => Err(ErrorKind::BadType),
    }
}
