use crate::error::{evaluation, RatingError};
use chrono::{Duration, NaiveDate};
use rating_dsl::ParsingError;
use rating_types::Value;

/// Dispatch a call to a built-in by name and arity. Returns `Ok(None)` if
/// `name` is not one of the built-ins, so the caller can fall through to
/// the user/host function registry; built-ins always take precedence
/// over a same-named registered function. Grounded on the built-in
/// contract table and the source's date/string helpers.
///
/// # Errors
///
/// Returns [`RatingError::Evaluation`] for a wrong argument type or an
/// out-of-domain numeric argument, and [`RatingError::Parsing`] for a
/// malformed date string or an out-of-range `substr` argument, matching
/// the concrete scenarios that classify those as parsing errors.
pub fn try_call(name: &str, args: &[Value]) -> Result<Option<Value>, RatingError> {
    match (name.to_lowercase().as_str(), args.len()) {
        ("max", 2) => num2(args, f64::max).map(Some),
        ("min", 2) => num2(args, f64::min).map(Some),
        ("rnd", 2) => rnd(args).map(Some),
        ("ceil", 1) => num1(args, f64::ceil).map(Some),
        ("floor", 1) => num1(args, f64::floor).map(Some),
        ("exp", 1) => exp(args).map(Some),
        ("day", 1) => date_part(args, DatePart::Day).map(Some),
        ("month", 1) => date_part(args, DatePart::Month).map(Some),
        ("year", 1) => date_part(args, DatePart::Year).map(Some),
        ("substr", 3) => substr(args).map(Some),
        ("adddays", 2) => add_days(args).map(Some),
        ("getdiffdays", 2) => get_diff_days(args).map(Some),
        ("differenceinmonths", 2) => difference_in_months(args).map(Some),
        ("paddedstring", 2) => padded_string(args).map(Some),
        _ => Ok(None),
    }
}

fn as_number(value: &Value, builtin: &str) -> Result<f64, RatingError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(evaluation(format!("{builtin}: expected a number, got {}", other.type_name()))),
    }
}

fn as_str<'a>(value: &'a Value, builtin: &str) -> Result<&'a str, RatingError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(evaluation(format!("{builtin}: expected a string, got {}", other.type_name()))),
    }
}

fn num1(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, RatingError> {
    Ok(Value::number(f(as_number(&args[0], "builtin")?)))
}

fn num2(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value, RatingError> {
    Ok(Value::number(f(as_number(&args[0], "builtin")?, as_number(&args[1], "builtin")?)))
}

fn rnd(args: &[Value]) -> Result<Value, RatingError> {
    let x = as_number(&args[0], "rnd")?;
    let n = as_number(&args[1], "rnd")?;
    let factor = 10f64.powf(n);
    Ok(Value::number((x * factor).round() / factor))
}

fn exp(args: &[Value]) -> Result<Value, RatingError> {
    let x = as_number(&args[0], "exp")?;
    let result = x.exp();
    if result.is_infinite() {
        return Err(evaluation("exp: overflow"));
    }
    Ok(Value::number(result))
}

enum DatePart {
    Day,
    Month,
    Year,
}

fn parse_date(s: &str, builtin: &str) -> Result<NaiveDate, RatingError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ParsingError::new(builtin, format!("'{s}' is not a valid ISO date"), 0, 0, s).into())
}

fn date_part(args: &[Value], part: DatePart) -> Result<Value, RatingError> {
    let builtin = match part {
        DatePart::Day => "day",
        DatePart::Month => "month",
        DatePart::Year => "year",
    };
    let s = as_str(&args[0], builtin)?;
    if s.is_empty() || s == "0001-01-01" {
        return Ok(Value::number(1.0));
    }
    let date = parse_date(s, builtin)?;
    let value = match part {
        DatePart::Day => date.format("%d").to_string().parse::<f64>().unwrap_or(1.0),
        DatePart::Month => date.format("%m").to_string().parse::<f64>().unwrap_or(1.0),
        DatePart::Year => f64::from(date.format("%Y").to_string().parse::<i32>().unwrap_or(1)),
    };
    Ok(Value::number(value))
}

fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn substr(args: &[Value]) -> Result<Value, RatingError> {
    let s = as_str(&args[0], "substr")?;
    let start = round_half_up(as_number(&args[1], "substr")?);
    let len = round_half_up(as_number(&args[2], "substr")?);
    let chars: Vec<char> = s.chars().collect();
    if start < 1 || len < 1 || (start - 1) as usize >= chars.len() || (start - 1) as usize + len as usize > chars.len() {
        return Err(ParsingError::new(
            "substr",
            format!("start={start}, len={len} is out of range for a string of length {}", chars.len()),
            0,
            0,
            s,
        )
        .into());
    }
    let begin = (start - 1) as usize;
    let end = begin + len as usize;
    Ok(Value::string(chars[begin..end].iter().collect::<String>()))
}

fn add_days(args: &[Value]) -> Result<Value, RatingError> {
    let s = as_str(&args[0], "addDays")?;
    let n = as_number(&args[1], "addDays")?;
    let date = parse_date(s, "addDays")?;
    let shifted = date + Duration::days(n.round() as i64);
    Ok(Value::string(shifted.format("%Y-%m-%d").to_string()))
}

fn get_diff_days(args: &[Value]) -> Result<Value, RatingError> {
    let a = parse_date(as_str(&args[0], "getDiffDays")?, "getDiffDays")?;
    let b = parse_date(as_str(&args[1], "getDiffDays")?, "getDiffDays")?;
    let diff = (a - b).num_days();
    if diff < 0 {
        return Err(evaluation("getDiffDays: negative difference"));
    }
    Ok(Value::number(diff as f64))
}

fn difference_in_months(args: &[Value]) -> Result<Value, RatingError> {
    let a = parse_date(as_str(&args[0], "differenceInMonths")?, "differenceInMonths")?;
    let b = parse_date(as_str(&args[1], "differenceInMonths")?, "differenceInMonths")?;
    let months = (i64::from(a.format("%Y").to_string().parse::<i32>().unwrap_or(0)) - i64::from(b.format("%Y").to_string().parse::<i32>().unwrap_or(0))) * 12
        + (i64::from(a.format("%m").to_string().parse::<i32>().unwrap_or(0)) - i64::from(b.format("%m").to_string().parse::<i32>().unwrap_or(0)));
    Ok(Value::number(months as f64))
}

/// Left-pads `s` with `'0'` to length `n`. The source constructs this same
/// padded string but discards it before returning (an apparent bug); this
/// implements the documented intended behavior instead.
fn padded_string(args: &[Value]) -> Result<Value, RatingError> {
    let s = as_str(&args[0], "paddedString")?;
    let n = as_number(&args[1], "paddedString")?;
    let target_len = if n <= 0.0 { 0 } else { n.round() as usize };
    let current_len = s.chars().count();
    if current_len >= target_len {
        return Ok(Value::string(s.to_string()));
    }
    let mut padded = "0".repeat(target_len - current_len);
    padded.push_str(s);
    Ok(Value::string(padded))
}
