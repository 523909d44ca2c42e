//! Variable store
//!
//! A name to string map shared by every panel and by the dynamic variable
//! engine. Typed getters are lenient: a missing or unparsable value yields the
//! caller's default instead of an error, and a failed substitution leaves the
//! input unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::SubstitutionError;

/// String templating contract used by [`VariableStore::replace`].
pub trait Substitutor: Send + Sync {
    /// Expand `expr` against the current variable values.
    fn substitute(&self, expr: &str, variables: &VariableStore)
    -> Result<String, SubstitutionError>;
}

impl<F> Substitutor for F
where
    F: Fn(&str, &VariableStore) -> Result<String, SubstitutionError> + Send + Sync,
{
    fn substitute(
        &self,
        expr: &str,
        variables: &VariableStore,
    ) -> Result<String, SubstitutionError> {
        self(expr, variables)
    }
}

/// Replaces `${NAME}` placeholders with variable values.
///
/// Unknown names are left in place so a later pass can still resolve them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSubstitutor;

impl Substitutor for PlaceholderSubstitutor {
    fn substitute(
        &self,
        expr: &str,
        variables: &VariableStore,
    ) -> Result<String, SubstitutionError> {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        let mut consumed = 0;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(SubstitutionError::Unterminated {
                    input: expr.to_string(),
                    offset: consumed + start,
                });
            };
            let name = &after[..end];
            match variables.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            let advance = start + 2 + end + 1;
            consumed += advance;
            rest = &rest[advance..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Mutable key/value environment of an installation.
#[derive(Clone)]
pub struct VariableStore {
    values: BTreeMap<String, String>,
    /// Variable name -> blockers preventing dynamic re-derivation
    blocked: BTreeMap<String, BTreeSet<String>>,
    substitutor: Arc<dyn Substitutor>,
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("values", &self.values)
            .field("blocked", &self.blocked)
            .finish_non_exhaustive()
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Create an empty store using [`PlaceholderSubstitutor`].
    pub fn new() -> Self {
        Self::with_substitutor(PlaceholderSubstitutor)
    }

    /// Create an empty store delegating `replace` to `substitutor`.
    pub fn with_substitutor(substitutor: impl Substitutor + 'static) -> Self {
        Self {
            values: BTreeMap::new(),
            blocked: BTreeMap::new(),
            substitutor: Arc::new(substitutor),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Remove `name`, returning its previous value.
    pub fn unset(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Boolean value of `name`; only `true`/`false` (any case) are recognised.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_long(&self, name: &str, default: i64) -> i64 {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Substitute `value` through the configured substitutor.
    ///
    /// On failure the original string is returned unchanged and a warning is
    /// logged; substitution failure never blocks navigation.
    pub fn replace(&self, value: &str) -> String {
        match self.try_replace(value) {
            Ok(replaced) => replaced,
            Err(e) => {
                warn!("Substitution of '{}' failed: {}", value, e);
                value.to_string()
            }
        }
    }

    /// Substitute `value`, reporting failures to the caller.
    pub fn try_replace(&self, value: &str) -> Result<String, SubstitutionError> {
        self.substitutor.substitute(value, self)
    }

    /// Prevent refresh passes from changing `name` until every blocker releases it.
    pub fn block(&mut self, name: impl Into<String>, blocker: impl Into<String>) {
        self.blocked
            .entry(name.into())
            .or_default()
            .insert(blocker.into());
    }

    /// Release one blocker of `name`.
    pub fn unblock(&mut self, name: &str, blocker: &str) {
        if let Some(blockers) = self.blocked.get_mut(name) {
            blockers.remove(blocker);
            if blockers.is_empty() {
                self.blocked.remove(name);
            }
        }
    }

    pub fn is_blocked(&self, name: &str) -> bool {
        self.blocked.contains_key(name)
    }
}

impl<K, V> Extend<(K, V)> for VariableStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}
