//! Memoized template compilation.

use super::pattern::{compile, CompiledPattern, TemplateError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cache of compiled patterns keyed by template content.
///
/// Keys include the friendly-name table, so an edited mapping compiles fresh
/// on the next alert while unchanged mappings reuse the cached pattern.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: Mutex<HashMap<String, Arc<CompiledPattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `template` with `friendly_names`, reusing a prior compilation
    /// of identical inputs.
    pub fn get(
        &self,
        template: &str,
        friendly_names: &HashMap<String, String>,
    ) -> Result<Arc<CompiledPattern>, TemplateError> {
        let key = cache_key(template, friendly_names);

        if let Ok(entries) = self.entries.lock() {
            if let Some(found) = entries.get(&key) {
                return Ok(found.clone());
            }
        }

        let compiled = Arc::new(compile(template, friendly_names)?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, compiled.clone());
        }
        Ok(compiled)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

fn cache_key(template: &str, friendly_names: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = friendly_names.iter().collect();
    pairs.sort();
    let mut key = String::with_capacity(template.len() + pairs.len() * 16);
    key.push_str(template);
    for (name, friendly) in pairs {
        key.push('\u{1}');
        key.push_str(name);
        key.push('\u{2}');
        key.push_str(friendly);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_inputs_share_entry() {
        let cache = PatternCache::new();
        let names = HashMap::new();
        let a = cache.get("{{x}}", &names).unwrap();
        let b = cache.get("{{x}}", &names).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_friendly_names_differentiate_entries() {
        let cache = PatternCache::new();
        let a = cache.get("{{x}}", &HashMap::new()).unwrap();
        let b = cache
            .get(
                "{{x}}",
                &HashMap::from([("x".to_string(), "price".to_string())]),
            )
            .unwrap();
        assert_eq!(a.field_keys(), ["x"]);
        assert_eq!(b.field_keys(), ["price"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalid_template_not_cached() {
        let cache = PatternCache::new();
        assert!(cache.get("bad {{", &HashMap::new()).is_err());
        assert_eq!(cache.len(), 0);
    }
}
