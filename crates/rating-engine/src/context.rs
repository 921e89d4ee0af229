use crate::cache::{FunctionResultCache, ParseTreeCache};
use crate::error::RatingError;
use crate::function::{HostFunction, UserFunction};
use crate::value_holder::ValueHolder;
use rating_types::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

enum FunctionEntry {
    Host(Rc<dyn HostFunction>),
    User(Rc<UserFunction>),
}

/// The evaluation scope threaded through parsing and evaluation: variable
/// bindings, the function registry, the current instance id and output
/// variable, the caches, and the accumulated function duration counter.
///
/// Grounded on `ParsingContext`. The source's parent pointer (used solely
/// to forward function-duration accounting to the root context) is
/// replaced here by a single [`Rc<Cell<u64>>`] shared by every context in
/// a call tree, which makes the pointer chain unnecessary. Per the
/// design's instruction that the function registry is shared "by
/// reference" rather than copied, it lives behind an `Rc` as well; only
/// variable bindings are copied into a child scope, and function-argument
/// bindings are dropped in the copy so a nested call cannot see its
/// caller's arguments.
pub struct EvalContext {
    variables: HashMap<String, ValueHolder>,
    functions: Rc<RefCell<HashMap<(String, usize), FunctionEntry>>>,
    parse_tree_cache: Rc<dyn ParseTreeCache>,
    function_result_cache: Rc<dyn FunctionResultCache>,
    rate_key: String,
    instance_id: String,
    current_output_variable: Option<String>,
    duration_micros: Rc<Cell<u64>>,
}

impl EvalContext {
    /// Construct a fresh root context for one `calculate` run.
    #[must_use]
    pub fn new(
        rate_key: impl Into<String>,
        parse_tree_cache: Rc<dyn ParseTreeCache>,
        function_result_cache: Rc<dyn FunctionResultCache>,
    ) -> Self {
        Self {
            variables: HashMap::new(),
            functions: Rc::new(RefCell::new(HashMap::new())),
            parse_tree_cache,
            function_result_cache,
            rate_key: rate_key.into(),
            instance_id: String::new(),
            current_output_variable: None,
            duration_micros: Rc::new(Cell::new(0)),
        }
    }

    /// Build a child scope for a function call: the function registry and
    /// caches are shared with the parent, but variable bindings are copied
    /// with any `FunctionArgument` bindings dropped, so the callee starts
    /// from the caller's calculated variables alone.
    #[must_use]
    pub fn child_scope(&self) -> Self {
        let variables = self
            .variables
            .iter()
            .filter(|(_, holder)| !holder.is_function_argument())
            .map(|(name, holder)| (name.clone(), holder.clone()))
            .collect();
        Self {
            variables,
            functions: Rc::clone(&self.functions),
            parse_tree_cache: Rc::clone(&self.parse_tree_cache),
            function_result_cache: Rc::clone(&self.function_result_cache),
            rate_key: self.rate_key.clone(),
            instance_id: self.instance_id.clone(),
            current_output_variable: self.current_output_variable.clone(),
            duration_micros: Rc::clone(&self.duration_micros),
        }
    }

    /// The rating key this context was created for.
    #[must_use]
    pub fn rate_key(&self) -> &str {
        &self.rate_key
    }

    /// The instance id currently being evaluated for (empty string is the
    /// scalar default).
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Set the instance id in place, for fan-out over instance variables.
    pub fn set_instance_id(&mut self, instance_id: impl Into<String>) {
        self.instance_id = instance_id.into();
    }

    /// The output variable currently being computed, if any; used to
    /// label errors raised while evaluating it.
    #[must_use]
    pub fn current_output_variable(&self) -> Option<&str> {
        self.current_output_variable.as_deref()
    }

    /// Record which output variable is currently being computed.
    pub fn set_current_output_variable(&mut self, name: impl Into<String>) {
        self.current_output_variable = Some(name.into());
    }

    /// Access the shared parse-tree cache.
    #[must_use]
    pub fn parse_tree_cache(&self) -> &Rc<dyn ParseTreeCache> {
        &self.parse_tree_cache
    }

    /// Access the shared function-result cache.
    #[must_use]
    pub fn function_result_cache(&self) -> &Rc<dyn FunctionResultCache> {
        &self.function_result_cache
    }

    /// Bind a variable eagerly, e.g. an input value supplied by the host.
    pub fn assign_param(&mut self, name: &str, holder: ValueHolder) {
        self.variables.insert(name.to_lowercase(), holder);
    }

    /// Record a freshly calculated output so later formulas can reference
    /// it by name.
    pub fn add_calculated_variable(&mut self, name: &str, holder: ValueHolder) {
        self.variables.insert(name.to_lowercase(), holder);
    }

    /// Record one instance's calculated result for `name`. If `name`
    /// already holds an eager map (e.g. from an earlier instance of the
    /// same output variable), the new instance is inserted into that same
    /// map rather than replacing it, so a variable computed across several
    /// instance ids stays resolvable under all of them. If `name` is backed
    /// by a `Lazy` holder (an output that merely re-exposes a lazy variable
    /// of the same name), the result is recorded in that holder's own memo
    /// instead of being shadowed by a brand-new, instance-incomplete eager
    /// map — otherwise a later instance would lose the formula needed to
    /// compute it.
    pub fn store_calculated_result(&mut self, name: &str, instance_id: &str, value: Value) {
        let key = name.to_lowercase();
        match self.variables.get(&key) {
            Some(ValueHolder::Eager(map)) => {
                map.borrow_mut().insert(instance_id.to_string(), value);
            }
            Some(ValueHolder::Lazy(lazy)) => {
                lazy.memo.borrow_mut().insert(instance_id.to_string(), value);
            }
            Some(ValueHolder::FunctionArgument(_)) | None => {
                let mut map = HashMap::new();
                map.insert(instance_id.to_string(), value);
                self.variables.insert(key, ValueHolder::Eager(Rc::new(RefCell::new(map))));
            }
        }
    }

    /// Register a host-implemented function under `(name, arity)`.
    pub fn register_host_function(&self, function: Rc<dyn HostFunction>) {
        let key = (function.name().to_lowercase(), function.arity());
        self.functions.borrow_mut().insert(key, FunctionEntry::Host(function));
    }

    /// Register a formula-defined function under `(name, arity)`.
    pub fn register_user_function(&self, function: Rc<UserFunction>) {
        let key = (function.name().to_lowercase(), function.arity());
        self.functions.borrow_mut().insert(key, FunctionEntry::User(function));
    }

    /// Resolve a variable by name for the current instance id, falling
    /// back to the default (empty string) instance id's value if no entry
    /// exists for a non-empty instance id. Grounded on `ValueHolder::getValue`
    /// and `ParsingContext::resolve`.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::InputParameterMissing`] if no binding at all
    /// exists under `name`, or [`RatingError::Evaluation`] if a binding
    /// exists but has no value for either the current or default instance.
    pub fn resolve(&self, name: &str) -> Result<Value, RatingError> {
        let key = name.to_lowercase();
        let holder = self.variables.get(&key).ok_or_else(|| RatingError::InputParameterMissing(name.to_string()))?;
        match holder {
            ValueHolder::FunctionArgument(value) => Ok(value.clone()),
            ValueHolder::Eager(map) => {
                let map = map.borrow();
                if let Some(value) = map.get(&self.instance_id) {
                    return Ok(value.clone());
                }
                if !self.instance_id.is_empty() {
                    if let Some(value) = map.get("") {
                        return Ok(value.clone());
                    }
                }
                Err(RatingError::Evaluation(format!("variable '{name}' has no value for instance '{}'", self.instance_id)))
            }
            ValueHolder::Lazy(lazy) => {
                if let Some(value) = lazy.memo.borrow().get(&self.instance_id) {
                    return Ok(value.clone());
                }
                if !self.instance_id.is_empty() {
                    if let Some(value) = lazy.memo.borrow().get("") {
                        return Ok(value.clone());
                    }
                }
                let block = self.parsed_lazy_body(lazy)?;
                let value = crate::evaluator::eval_block(&block, self)?;
                lazy.memo.borrow_mut().insert(self.instance_id.clone(), value.clone());
                Ok(value)
            }
        }
    }

    fn parsed_lazy_body(&self, lazy: &crate::value_holder::LazyFormula) -> Result<Rc<rating_dsl::Block>, RatingError> {
        if let Some(cached) = self.parse_tree_cache.get(&self.rate_key, &lazy.variable_name) {
            return Ok(cached);
        }
        let block = Rc::new(rating_dsl::parse_program(&lazy.variable_name, &lazy.formula)?);
        self.parse_tree_cache.put(&self.rate_key, &lazy.variable_name, Rc::clone(&block));
        Ok(block)
    }

    /// Look up and call a registered function by name and argument count,
    /// accumulating its wall-clock duration into the shared counter.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Evaluation`] if no function is registered
    /// under `(name, args.len())`.
    pub fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, RatingError> {
        let key = (name.to_lowercase(), args.len());
        let entry = {
            let functions = self.functions.borrow();
            match functions.get(&key) {
                Some(FunctionEntry::Host(f)) => FunctionEntry::Host(Rc::clone(f)),
                Some(FunctionEntry::User(f)) => FunctionEntry::User(Rc::clone(f)),
                None => return Err(RatingError::Evaluation(format!("function '{name}/{}' is not defined", args.len()))),
            }
        };
        let started = std::time::Instant::now();
        let result = match entry {
            FunctionEntry::Host(f) => f.execute(&args, self),
            FunctionEntry::User(f) => f.call(args, self),
        };
        let elapsed_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.duration_micros.set(self.duration_micros.get() + elapsed_micros);
        tracing::trace!(function = name, arity = key.1, elapsed_micros, "function call");
        result
    }

    /// Total function-call duration, in microseconds, accumulated across
    /// this whole call tree (shared with every scope derived from it).
    #[must_use]
    pub fn function_durations_micros(&self) -> u64 {
        self.duration_micros.get()
    }
}
