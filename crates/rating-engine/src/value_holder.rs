use rating_types::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A stored variable binding, tagged by how its value is produced.
///
/// Grounded on the source's `IValueHolder` hierarchy (`ValueHolder`,
/// `LazyValueHolder`, `FunctionArgument`), represented here as a single
/// tagged variant instead of a trait-object hierarchy, per the design's
/// note that the holder should be "a tagged variant" with interior
/// mutability for the lazy-to-eager transition.
#[derive(Clone)]
pub enum ValueHolder {
    /// A resolved `instanceId -> Value` map: how inputs and already
    /// calculated outputs are stored. Shared by `Rc` so a lazy holder can
    /// be replaced in place by an equivalent eager one without copying.
    Eager(Rc<RefCell<HashMap<String, Value>>>),
    /// A formula-defined value, computed on first reference per instance
    /// id and memoized.
    Lazy(Rc<LazyFormula>),
    /// A fixed value visible only in the function scope that bound it.
    FunctionArgument(Value),
}

/// The variable name and source of a lazy formula, plus its per-instance
/// memo of already-computed results.
pub struct LazyFormula {
    /// The variable's own name, used to label parsing errors and as the
    /// parse-tree cache key.
    pub variable_name: String,
    /// The formula's DSL source text.
    pub formula: String,
    /// Memoized results, keyed by instance id.
    pub memo: RefCell<HashMap<String, Value>>,
}

impl ValueHolder {
    /// Construct an eager holder from a single scalar value under the
    /// default (empty string) instance id.
    #[must_use]
    pub fn eager_scalar(value: Value) -> Self {
        let mut map = HashMap::new();
        map.insert(String::new(), value);
        Self::Eager(Rc::new(RefCell::new(map)))
    }

    /// Construct an eager holder from an already-built instance map.
    #[must_use]
    pub fn eager_map(map: HashMap<String, Value>) -> Self {
        Self::Eager(Rc::new(RefCell::new(map)))
    }

    /// Construct a lazy holder for a formula-defined variable.
    #[must_use]
    pub fn lazy(variable_name: String, formula: String) -> Self {
        Self::Lazy(Rc::new(LazyFormula { variable_name, formula, memo: RefCell::new(HashMap::new()) }))
    }

    /// `true` for `FunctionArgument` holders; used to filter a parent
    /// scope's variables when building a child scope for a function call.
    #[must_use]
    pub const fn is_function_argument(&self) -> bool {
        matches!(self, Self::FunctionArgument(_))
    }
}
