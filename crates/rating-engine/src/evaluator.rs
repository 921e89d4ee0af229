use crate::builtins;
use crate::context::EvalContext;
use crate::error::{evaluation, RatingError};
use rating_dsl::{BinaryOp, Block, Expr, UnaryOp};
use rating_types::Value;

/// Evaluate a formula body. A block is always terminal: `if` dispatches to
/// exactly one arm's nested block (or yields void if no arm and no
/// `else` matched), `return` yields its expression's value, and `error`
/// aborts the whole `calculate` call. There is no statement sequencing to
/// unwind, so no non-local-exit machinery is needed: the recursive
/// structure of `Block` already makes every leaf a terminal value.
///
/// # Errors
///
/// Returns a [`RatingError`] if an identifier, operator, or built-in call
/// anywhere in the block fails.
pub fn eval_block(block: &Block, ctx: &EvalContext) -> Result<Value, RatingError> {
    match block {
        Block::Return(expr) => eval_expr(expr, ctx),
        Block::Error(expr) => {
            let code = eval_expr(expr, ctx)?;
            match code {
                Value::Number(n) => Err(RatingError::CalculationCancelled(n)),
                other => Err(evaluation(format!("error(code) requires a number, got {}", other.type_name()))),
            }
        }
        Block::If(if_statement) => {
            for (guard, body) in &if_statement.arms {
                let guard_value = eval_expr(guard, ctx)?;
                match guard_value {
                    Value::Bool(true) => return eval_block(body, ctx),
                    Value::Bool(false) => {}
                    other => return Err(evaluation(format!("if guard must be boolean, got {}", other.type_name()))),
                }
            }
            match &if_statement.else_branch {
                Some(else_block) => eval_block(else_block, ctx),
                None => Ok(Value::void()),
            }
        }
    }
}

/// Evaluate a single expression node against a scope.
///
/// # Errors
///
/// Returns a [`RatingError`] on unresolved identifiers, type mismatches,
/// division/mod by zero, or a failing built-in/function call.
pub fn eval_expr(expr: &Expr, ctx: &EvalContext) -> Result<Value, RatingError> {
    match expr {
        Expr::Number(n) => Ok(Value::number(*n)),
        Expr::Str(s) => Ok(Value::string(s.clone())),
        Expr::Bool(b) => Ok(Value::bool(*b)),
        Expr::Ident(name) => ctx.resolve(name),
        Expr::Unary { op, operand } => eval_unary(*op, eval_expr(operand, ctx)?),
        Expr::Binary { left, op, right } => {
            let left_value = eval_expr(left, ctx)?;
            let right_value = eval_expr(right, ctx)?;
            eval_binary(*op, left_value, right_value)
        }
        Expr::Call { name, args } => {
            let arg_values = args.iter().map(|arg| eval_expr(arg, ctx)).collect::<Result<Vec<_>, _>>()?;
            if let Some(result) = builtins::try_call(name, &arg_values)? {
                return Ok(result);
            }
            ctx.call_function(name, arg_values)
        }
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> Result<Value, RatingError> {
    match (op, operand) {
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::number(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::bool(!b)),
        (UnaryOp::Negate, other) => Err(evaluation(format!("unary '-' requires a number, got {}", other.type_name()))),
        (UnaryOp::Not, other) => Err(evaluation(format!("unary '!' requires a bool, got {}", other.type_name()))),
    }
}

#[allow(clippy::too_many_lines)]
fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RatingError> {
    match op {
        BinaryOp::Or => Ok(Value::bool(as_bool(&left, "||")? || as_bool(&right, "||")?)),
        BinaryOp::And => Ok(Value::bool(as_bool(&left, "&&")? && as_bool(&right, "&&")?)),
        BinaryOp::Eq => Ok(Value::bool(left == right)),
        BinaryOp::NotEq => Ok(Value::bool(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => compare(op, &left, &right),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Ok(Value::number(as_number(&left, "-")? - as_number(&right, "-")?)),
        BinaryOp::Mul => mul(left, right),
        BinaryOp::Div => {
            let divisor = as_number(&right, "/")?;
            if divisor == 0.0 {
                return Err(RatingError::DivisionByZero);
            }
            Ok(Value::number(as_number(&left, "/")? / divisor))
        }
        BinaryOp::Mod => {
            let dividend = as_number(&left, "mod")?;
            let divisor = as_number(&right, "mod")?;
            let result = dividend % divisor;
            if divisor == 0.0 || !result.is_finite() {
                return Err(RatingError::DivisionByZero);
            }
            Ok(Value::number(result))
        }
        BinaryOp::Pow => Ok(Value::number(as_number(&left, "^")?.powf(as_number(&right, "^")?))),
    }
}

fn as_bool(value: &Value, op: &str) -> Result<bool, RatingError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(evaluation(format!("'{op}' requires booleans, got {}", other.type_name()))),
    }
}

fn as_number(value: &Value, op: &str) -> Result<f64, RatingError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(evaluation(format!("'{op}' requires numbers, got {}", other.type_name()))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RatingError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        _ => {
            return Err(evaluation(format!(
                "ordering comparisons require two numbers or two strings, got {} and {}",
                left.type_name(),
                right.type_name()
            )))
        }
    };
    let Some(ordering) = ordering else {
        return Err(evaluation("ordering comparison produced an undefined result (NaN)"));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        _ => unreachable!("compare called with a non-ordering operator"),
    };
    Ok(Value::bool(result))
}

fn add(left: Value, right: Value) -> Result<Value, RatingError> {
    if left.is_string() || right.is_string() {
        return Ok(Value::string(format!("{}{}", left.concat_string(), right.concat_string())));
    }
    Ok(Value::number(as_number(&left, "+")? + as_number(&right, "+")?))
}

fn mul(left: Value, right: Value) -> Result<Value, RatingError> {
    match (&left, &right) {
        (Value::String(s), Value::Number(n)) => Ok(Value::string(s.repeat(round_to_usize(*n)))),
        (Value::Number(n), Value::String(s)) => Ok(Value::string(s.repeat(round_to_usize(*n)))),
        _ => Ok(Value::number(as_number(&left, "*")? * as_number(&right, "*")?)),
    }
}

fn round_to_usize(n: f64) -> usize {
    let rounded = n.round();
    if rounded <= 0.0 {
        0
    } else {
        rounded as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_concatenates_when_either_side_is_a_string() {
        let result = eval_binary(BinaryOp::Add, Value::string("A"), Value::number(50.0)).unwrap();
        assert_eq!(result, Value::string("A50"));
    }

    #[test]
    fn string_repetition_via_multiply() {
        let result = eval_binary(BinaryOp::Mul, Value::string("ab"), Value::number(3.0)).unwrap();
        assert_eq!(result, Value::string("ababab"));
    }

    #[test]
    fn division_by_zero_is_a_rating_error() {
        let err = eval_binary(BinaryOp::Div, Value::number(10.0), Value::number(0.0)).unwrap_err();
        assert!(matches!(err, RatingError::DivisionByZero));
    }

    #[test]
    fn mod_by_zero_is_a_rating_error() {
        let err = eval_binary(BinaryOp::Mod, Value::number(10.0), Value::number(0.0)).unwrap_err();
        assert!(matches!(err, RatingError::DivisionByZero));
    }

    #[test]
    fn mod_matches_fmod_semantics() {
        let result = eval_binary(BinaryOp::Mod, Value::number(10.0), Value::number(7.0)).unwrap();
        assert_eq!(result, Value::number(3.0));
    }

    #[test]
    fn logical_and_or_evaluate_both_sides_and_require_booleans() {
        assert_eq!(eval_binary(BinaryOp::And, Value::bool(true), Value::bool(false)).unwrap(), Value::bool(false));
        assert_eq!(eval_binary(BinaryOp::Or, Value::bool(false), Value::bool(true)).unwrap(), Value::bool(true));
        assert!(eval_binary(BinaryOp::And, Value::number(1.0), Value::bool(true)).is_err());
    }

    #[test]
    fn ordering_rejects_mixed_types() {
        assert!(compare(BinaryOp::Lt, &Value::number(1.0), &Value::string("x")).is_err());
    }

    #[test]
    fn equality_is_defined_for_all_pairs_and_void_never_equals() {
        assert_eq!(Value::void() == Value::void(), false);
        assert_eq!(Value::number(1.0) == Value::string("1"), false);
    }

    #[test]
    fn unary_negate_and_not() {
        assert_eq!(eval_unary(UnaryOp::Negate, Value::number(2.0)).unwrap(), Value::number(-2.0));
        assert_eq!(eval_unary(UnaryOp::Not, Value::bool(true)).unwrap(), Value::bool(false));
        assert!(eval_unary(UnaryOp::Negate, Value::bool(true)).is_err());
    }
}
