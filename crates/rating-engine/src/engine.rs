use crate::cache::{DefaultFunctionResultCache, DefaultParseTreeCache, FunctionResultCache, ParseTreeCache};
use crate::context::EvalContext;
use crate::error::RatingError;
use crate::evaluator::eval_block;
use crate::function::{HostFunction, UserFunction};
use crate::value_holder::ValueHolder;
use rating_dsl::parse_program;
use rating_types::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// A scalar result value: the host-facing types a computed variable can
/// take, narrower than the internal [`Value`] (no booleans — booleans are
/// converted to `"1"`/`"0"` strings at this boundary, and void results are
/// omitted from the result map entirely).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A numeric result.
    Number(f64),
    /// A string result.
    String(String),
}

/// One entry of the result (or input) map: either a single scalar, or a
/// fan-out keyed by instance id.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingValue {
    /// A plain scalar, stored under the empty instance id.
    Scalar(Scalar),
    /// A per-instance map of scalars.
    InstanceMap(HashMap<String, Scalar>),
}

/// The host-facing input/output map: `variableName -> RatingValue`.
pub type RatingMap = HashMap<String, RatingValue>;

/// One requested output: the variable to compute, its source formula (or
/// function header+body pair if it is a callable function), its sort
/// order, and the instance id to evaluate it for.
#[derive(Debug, Clone)]
pub struct RatingOutput {
    /// The variable name to compute and merge into the result.
    pub variable_name: String,
    /// Outputs are evaluated in ascending order of this field (stable on
    /// ties).
    pub sort_order: i64,
    /// The DSL source to parse and evaluate.
    pub formula: String,
    /// The instance id to evaluate for; empty string for the default,
    /// non-instanced entry.
    pub instance_id: String,
}

/// The top-level driver. Grounded on `RatingEngine::calculate`: seeds an
/// [`EvalContext`] from inputs and formulas, sorts the requested outputs,
/// evaluates each in turn, and aggregates the results.
pub struct Engine {
    parse_tree_cache: Rc<dyn ParseTreeCache>,
    function_result_cache: Rc<dyn FunctionResultCache>,
    host_functions: Vec<Rc<dyn HostFunction>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Rc::new(DefaultParseTreeCache::new()), Rc::new(DefaultFunctionResultCache::new()))
    }
}

impl Engine {
    /// Construct an engine backed by the given caches.
    #[must_use]
    pub fn new(parse_tree_cache: Rc<dyn ParseTreeCache>, function_result_cache: Rc<dyn FunctionResultCache>) -> Self {
        Self { parse_tree_cache, function_result_cache, host_functions: Vec::new() }
    }

    /// Register a host-supplied business function, made visible to every
    /// subsequent `calculate` call on this engine.
    pub fn register_host_function(&mut self, function: Rc<dyn HostFunction>) {
        self.host_functions.push(function);
    }

    /// Run one rating calculation: seed a fresh [`EvalContext`] from
    /// `input` and `rating_formulas`, evaluate `rating_output` in ascending
    /// `sort_order`, and return the merged result map.
    ///
    /// # Errors
    ///
    /// Returns the first [`RatingError`] raised while parsing or
    /// evaluating any requested output; evaluation stops at that point.
    pub fn calculate(
        &self,
        rate_key: &str,
        input: &RatingMap,
        rating_formulas: &HashMap<String, String>,
        rating_output: &[RatingOutput],
    ) -> Result<RatingMap, RatingError> {
        tracing::debug!(rate_key, input_count = input.len(), output_count = rating_output.len(), "starting calculate");

        let mut ctx = EvalContext::new(rate_key, Rc::clone(&self.parse_tree_cache), Rc::clone(&self.function_result_cache));

        for function in &self.host_functions {
            ctx.register_host_function(Rc::clone(function));
        }

        for (name, value) in input {
            ctx.add_calculated_variable(name, ValueHolder::Eager(Rc::new(std::cell::RefCell::new(rating_map_to_value_map(value)))));
        }

        for (key, source) in rating_formulas {
            match UserFunction::from_header(key, source.clone()) {
                Some(function) => ctx.register_user_function(Rc::new(function)),
                None => ctx.add_calculated_variable(key, ValueHolder::lazy(key.clone(), source.clone())),
            }
        }

        let mut sorted_output: Vec<&RatingOutput> = rating_output.iter().collect();
        sorted_output.sort_by_key(|output| output.sort_order);

        let mut result: RatingMap = HashMap::new();

        for output in sorted_output {
            tracing::trace!(
                variable = %output.variable_name,
                instance_id = %output.instance_id,
                sort_order = output.sort_order,
                "evaluating output"
            );

            ctx.set_current_output_variable(&output.variable_name);
            ctx.set_instance_id(output.instance_id.clone());

            // Keyed on the formula source itself, not the output variable name: two outputs can
            // share a variable name with different formulas (the sort-order override pattern),
            // and a name-only key would silently hand the second one the first's parse tree.
            let block = match self.parse_tree_cache.get(rate_key, &output.formula) {
                Some(cached) => cached,
                None => {
                    let parsed = Rc::new(parse_program(&output.variable_name, &output.formula).inspect_err(|error| {
                        tracing::warn!(variable = %output.variable_name, %error, "formula failed to parse");
                    })?);
                    self.parse_tree_cache.put(rate_key, &output.formula, Rc::clone(&parsed));
                    parsed
                }
            };

            let value = eval_block(&block, &ctx)?;

            ctx.store_calculated_result(&output.variable_name, &output.instance_id, value.clone());

            merge_into_result(&mut result, &output.variable_name, &output.instance_id, value)?;
        }

        Ok(result)
    }
}

fn rating_map_to_value_map(value: &RatingValue) -> HashMap<String, Value> {
    match value {
        RatingValue::Scalar(scalar) => {
            let mut map = HashMap::new();
            map.insert(String::new(), scalar_to_value(scalar));
            map
        }
        RatingValue::InstanceMap(instances) => {
            instances.iter().map(|(instance_id, scalar)| (instance_id.clone(), scalar_to_value(scalar))).collect()
        }
    }
}

fn scalar_to_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Number(n) => Value::number(*n),
        Scalar::String(s) => Value::string(s.clone()),
    }
}

/// Merge one computed `value` for `variable_name`/`instance_id` into
/// `result`, applying the host-boundary conversions confirmed from the
/// source's `InsertVisitor`: booleans become the strings `"1"`/`"0"`, and
/// void results are dropped silently rather than written as an entry.
///
/// # Errors
///
/// Returns [`RatingError::Evaluation`] if `instance_id` is non-empty but
/// `variable_name` already holds a plain scalar result from an earlier
/// output (an inconsistent result shape).
fn merge_into_result(result: &mut RatingMap, variable_name: &str, instance_id: &str, value: Value) -> Result<(), RatingError> {
    let scalar = match value {
        Value::Void => return Ok(()),
        Value::Bool(b) => Scalar::String(if b { "1".to_string() } else { "0".to_string() }),
        Value::Number(n) => Scalar::Number(n),
        Value::String(s) => Scalar::String(s),
    };

    if instance_id.is_empty() {
        result.insert(variable_name.to_string(), RatingValue::Scalar(scalar));
        return Ok(());
    }

    match result.entry(variable_name.to_string()).or_insert_with(|| RatingValue::InstanceMap(HashMap::new())) {
        RatingValue::InstanceMap(instances) => {
            instances.insert(instance_id.to_string(), scalar);
            Ok(())
        }
        RatingValue::Scalar(_) => Err(RatingError::Evaluation(format!(
            "inconsistent result type for '{variable_name}': already a scalar, cannot also be an instance map"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(name: &str, sort_order: i64, formula: &str, instance_id: &str) -> RatingOutput {
        RatingOutput { variable_name: name.to_string(), sort_order, formula: formula.to_string(), instance_id: instance_id.to_string() }
    }

    #[test]
    fn arithmetic_end_to_end() {
        let engine = Engine::default();
        let result = engine
            .calculate("rate-1", &HashMap::new(), &HashMap::new(), &[output("total", 0, "return 2+2", "")])
            .unwrap();
        assert_eq!(result.get("total"), Some(&RatingValue::Scalar(Scalar::Number(4.0))));
    }

    #[test]
    fn division_by_zero_propagates() {
        let engine = Engine::default();
        let err = engine
            .calculate("rate-1", &HashMap::new(), &HashMap::new(), &[output("bad", 0, "return 2/0", "")])
            .unwrap_err();
        assert!(matches!(err, RatingError::DivisionByZero));
    }

    #[test]
    fn boolean_results_become_1_or_0_strings() {
        let engine = Engine::default();
        let result = engine
            .calculate("rate-1", &HashMap::new(), &HashMap::new(), &[output("flag", 0, "return 1==1", "")])
            .unwrap();
        assert_eq!(result.get("flag"), Some(&RatingValue::Scalar(Scalar::String("1".to_string()))));
    }

    #[test]
    fn void_results_are_omitted_from_the_result_map() {
        let engine = Engine::default();
        let formula = "if (1==2) then return 1 end";
        let result = engine.calculate("rate-1", &HashMap::new(), &HashMap::new(), &[output("nothing", 0, formula, "")]).unwrap();
        assert!(!result.contains_key("nothing"));
    }

    #[test]
    fn later_sort_order_wins_for_the_same_variable() {
        let engine = Engine::default();
        let outputs = [output("v", 10, "return 'second'", ""), output("v", 1, "return 'first'", "")];
        let result = engine.calculate("rate-1", &HashMap::new(), &HashMap::new(), &outputs).unwrap();
        assert_eq!(result.get("v"), Some(&RatingValue::Scalar(Scalar::String("second".to_string()))));
    }

    #[test]
    fn instance_fan_out_builds_an_instance_map() {
        let engine = Engine::default();
        let outputs = [output("premium", 0, "return 100", "1"), output("premium", 1, "return 200", "2")];
        let result = engine.calculate("rate-1", &HashMap::new(), &HashMap::new(), &outputs).unwrap();
        match result.get("premium").unwrap() {
            RatingValue::InstanceMap(instances) => {
                assert_eq!(instances.get("1"), Some(&Scalar::Number(100.0)));
                assert_eq!(instances.get("2"), Some(&Scalar::Number(200.0)));
            }
            RatingValue::Scalar(_) => panic!("expected an instance map"),
        }
    }

    #[test]
    fn recursive_user_function() {
        let engine = Engine::default();
        let mut formulas = HashMap::new();
        formulas.insert("factorial(n)".to_string(), "if (n==1) then return 1 else return n*factorial(n-1) end".to_string());
        let result = engine
            .calculate("rate-1", &HashMap::new(), &formulas, &[output("result", 0, "return factorial(5)", "")])
            .unwrap();
        assert_eq!(result.get("result"), Some(&RatingValue::Scalar(Scalar::Number(120.0))));
    }

    #[test]
    fn lazy_variable_is_resolved_from_another_formula() {
        let engine = Engine::default();
        let mut input = HashMap::new();
        input.insert("value1".to_string(), RatingValue::Scalar(Scalar::Number(2.0)));
        let mut formulas = HashMap::new();
        formulas.insert("doubled".to_string(), "return value1*2".to_string());
        let outputs = [output("result", 0, "return doubled+1", "")];
        let result = engine.calculate("rate-1", &input, &formulas, &outputs).unwrap();
        assert_eq!(result.get("result"), Some(&RatingValue::Scalar(Scalar::Number(5.0))));
    }
}
