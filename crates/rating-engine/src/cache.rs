use rating_dsl::Block;
use rating_types::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Cache for compiled parse trees, keyed by `(rateKey, cacheKey)`.
///
/// A formula body is parsed at most once per cache; subsequent lookups
/// share the immutable tree by reference. Grounded on `IParseTreeCache`.
pub trait ParseTreeCache {
    /// Cache `tree` under `(rate_key, cache_key)`.
    fn put(&self, rate_key: &str, cache_key: &str, tree: Rc<Block>);
    /// Look up a previously cached tree.
    fn get(&self, rate_key: &str, cache_key: &str) -> Option<Rc<Block>>;
}

/// Cache for memoized host/built-in function results, optionally keyed by
/// a validity date window (for results that vary by e.g. tariff date).
/// Grounded on `IFunctionResultCache`.
pub trait FunctionResultCache {
    /// Cache a plain function result.
    fn put(&self, rate_key: &str, cache_key: &str, result: Value);
    /// Cache a function result valid for the ISO date window
    /// `[valid_from, valid_to]` (inclusive, compared lexicographically).
    fn put_with_validity(&self, rate_key: &str, cache_key: &str, valid_from: &str, valid_to: &str, result: Value);
    /// Look up a plain cached result.
    fn get(&self, rate_key: &str, cache_key: &str) -> Option<Value>;
    /// Look up a cached result valid for the given ISO lookup date.
    fn get_with_validity(&self, rate_key: &str, date: &str, cache_key: &str) -> Option<Value>;
}

/// The default, in-process, unsynchronized parse-tree cache.
///
/// Mirrors `DefaultParseTreeCache`: it does not actually partition by
/// `rate_key` (the key is accepted for interface symmetry but the backing
/// map is flat on `cache_key` alone), so a single instance is only safe to
/// reuse across `calculate` calls that share one rate key.
#[derive(Default)]
pub struct DefaultParseTreeCache {
    trees: RefCell<HashMap<String, Rc<Block>>>,
}

impl DefaultParseTreeCache {
    /// Construct an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParseTreeCache for DefaultParseTreeCache {
    fn put(&self, _rate_key: &str, cache_key: &str, tree: Rc<Block>) {
        self.trees.borrow_mut().insert(cache_key.to_string(), tree);
    }

    fn get(&self, _rate_key: &str, cache_key: &str) -> Option<Rc<Block>> {
        self.trees.borrow().get(cache_key).cloned()
    }
}

/// The default, in-process, unsynchronized function-result cache. Same
/// single-rate-key caveat as [`DefaultParseTreeCache`], mirroring
/// `DefaultFunctionResultCache`.
#[derive(Default)]
pub struct DefaultFunctionResultCache {
    results: RefCell<HashMap<String, Value>>,
    results_with_validity: RefCell<HashMap<String, Vec<(Value, String, String)>>>,
}

impl DefaultFunctionResultCache {
    /// Construct an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FunctionResultCache for DefaultFunctionResultCache {
    fn put(&self, _rate_key: &str, cache_key: &str, result: Value) {
        self.results.borrow_mut().insert(cache_key.to_string(), result);
    }

    fn put_with_validity(&self, _rate_key: &str, cache_key: &str, valid_from: &str, valid_to: &str, result: Value) {
        self.results_with_validity
            .borrow_mut()
            .entry(cache_key.to_string())
            .or_default()
            .push((result, valid_from.to_string(), valid_to.to_string()));
    }

    fn get(&self, _rate_key: &str, cache_key: &str) -> Option<Value> {
        self.results.borrow().get(cache_key).cloned()
    }

    fn get_with_validity(&self, _rate_key: &str, date: &str, cache_key: &str) -> Option<Value> {
        self.results_with_validity.borrow().get(cache_key).and_then(|entries| {
            entries
                .iter()
                .find(|(_, valid_from, valid_to)| valid_from.as_str() <= date && date <= valid_to.as_str())
                .map(|(value, ..)| value.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_dsl::{Block, Expr};

    #[test]
    fn parse_tree_cache_round_trips() {
        let cache = DefaultParseTreeCache::new();
        assert!(cache.get("rate-1", "foo").is_none());
        cache.put("rate-1", "foo", Rc::new(Block::Return(Expr::Number(1.0))));
        assert!(cache.get("rate-1", "foo").is_some());
        // Deliberately ignores rate_key, matching the source's DefaultParseTreeCache.
        assert!(cache.get("rate-2", "foo").is_some());
    }

    #[test]
    fn function_result_cache_validity_window_lookup() {
        let cache = DefaultFunctionResultCache::new();
        cache.put_with_validity("r", "tariff", "2020-01-01", "2020-12-31", Value::number(100.0));
        cache.put_with_validity("r", "tariff", "2021-01-01", "2021-12-31", Value::number(110.0));
        assert_eq!(cache.get_with_validity("r", "2020-06-01", "tariff"), Some(Value::number(100.0)));
        assert_eq!(cache.get_with_validity("r", "2021-06-01", "tariff"), Some(Value::number(110.0)));
        assert_eq!(cache.get_with_validity("r", "2019-06-01", "tariff"), None);
    }
}
