use crate::context::EvalContext;
use crate::error::RatingError;
use crate::evaluator::eval_block;
use crate::value_holder::ValueHolder;
use rating_dsl::{Block, parse_function_header, parse_program};
use rating_types::Value;
use std::rc::Rc;

/// A host-supplied business function, plugged into the function registry
/// by name and arity. Grounded on `IFunction::execute`.
pub trait HostFunction {
    /// The function's name, matched case-insensitively.
    fn name(&self) -> &str;
    /// The number of arguments this function accepts.
    fn arity(&self) -> usize;
    /// Execute the function against already-evaluated argument values.
    ///
    /// # Errors
    ///
    /// Implementations should return [`RatingError::CallerSpecific`] to
    /// tag a failure as caused by the caller's own data.
    fn execute(&self, args: &[Value], ctx: &EvalContext) -> Result<Value, RatingError>;
}

/// A formula-defined function: parses its header once to recover its name
/// and formal parameters, then re-parses (and caches) its body on each
/// distinct call signature. Grounded on `Function`.
pub struct UserFunction {
    name: String,
    params: Vec<String>,
    body_source: String,
}

impl UserFunction {
    /// Parse `header` (e.g. `"factorial(n)"`) and pair it with `body`.
    ///
    /// # Errors
    ///
    /// Returns `None` if `header` is not a valid function header.
    #[must_use]
    pub fn from_header(header: &str, body: impl Into<String>) -> Option<Self> {
        let parsed = parse_function_header(header)?;
        Some(Self { name: parsed.name, params: parsed.params, body_source: body.into() })
    }

    /// The function's name, as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's arity (number of formal parameters).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    fn function_id(&self) -> String {
        format!("{}/{}", self.name.to_lowercase(), self.params.len())
    }

    /// Invoke the function: build a child scope binding each formal
    /// parameter to its argument value, then parse (or reuse the cached
    /// parse tree for) and evaluate the body in that scope.
    ///
    /// # Errors
    ///
    /// Returns a [`RatingError`] if the argument count does not match the
    /// declared arity, the body fails to parse, or evaluation fails.
    pub fn call(&self, args: Vec<Value>, ctx: &EvalContext) -> Result<Value, RatingError> {
        if args.len() != self.params.len() {
            return Err(RatingError::Evaluation(format!(
                "invalid number of arguments ({}) for function {}, expected {}",
                args.len(),
                self.name,
                self.params.len()
            )));
        }

        let mut child = ctx.child_scope();
        for (param, value) in self.params.iter().zip(args) {
            child.assign_param(param, ValueHolder::FunctionArgument(value));
        }

        let function_id = self.function_id();
        let block = self.parsed_body(&child, &function_id)?;
        eval_block(&block, &child)
    }

    fn parsed_body(&self, ctx: &EvalContext, function_id: &str) -> Result<Rc<Block>, RatingError> {
        if let Some(cached) = ctx.parse_tree_cache().get(ctx.rate_key(), function_id) {
            return Ok(cached);
        }
        let block = Rc::new(parse_program(&self.name, &self.body_source)?);
        ctx.parse_tree_cache().put(ctx.rate_key(), function_id, Rc::clone(&block));
        Ok(block)
    }
}
