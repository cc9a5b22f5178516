//! Per-package-prefix naming state for the class-name minifier (§4.7.1).
//!
//! A [`Namespace`] owns one type counter, one package counter, and a
//! dictionary iterator for each, scoped to a single package prefix. Both
//! `next_type_name` and `next_package_prefix` retry against the caller's
//! used-name set until a collision-free candidate is produced.

use std::sync::Arc;

use ahash::AHashSet;

use crate::dictionary::DictionaryIter;

pub struct Namespace {
    /// Package prefix this state allocates names under, slash-separated,
    /// with no leading `L` and no trailing `;` (`""` for the root package).
    package_prefix: String,
    type_dict: DictionaryIter,
    package_dict: DictionaryIter,
}

impl Namespace {
    pub fn new(package_prefix: String, class_dictionary: Vec<String>, package_dictionary: Vec<String>) -> Self {
        Namespace {
            package_prefix,
            type_dict: DictionaryIter::new(class_dictionary),
            package_dict: DictionaryIter::new(package_dictionary),
        }
    }

    pub fn package_prefix(&self) -> &str {
        &self.package_prefix
    }

    /// Yield the next candidate class descriptor in this namespace,
    /// retrying while it collides with `used`.
    pub fn next_type_name(&mut self, used: &AHashSet<Arc<str>>) -> Arc<str> {
        loop {
            let candidate = self.type_dict.next_candidate();
            let descriptor = if self.package_prefix.is_empty() {
                format!("L{candidate};")
            } else {
                format!("L{}/{candidate};", self.package_prefix)
            };
            let descriptor: Arc<str> = Arc::from(descriptor);
            if !used.contains(&descriptor) {
                return descriptor;
            }
        }
    }

    /// Yield the next candidate sub-package (no leading `L`, no trailing
    /// `;`), retrying while it collides with `used`.
    pub fn next_package_prefix(&mut self, used: &AHashSet<String>) -> String {
        loop {
            let candidate = self.package_dict.next_candidate();
            let full = if self.package_prefix.is_empty() {
                candidate
            } else {
                format!("{}/{}", self.package_prefix, candidate)
            };
            if !used.contains(&full) {
                return full;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_skip_used_candidates() {
        let mut ns = Namespace::new(String::new(), vec![], vec![]);
        let mut used = AHashSet::new();
        used.insert(Arc::from("La;"));
        let name = ns.next_type_name(&used);
        assert_eq!(&*name, "Lb;");
    }

    #[test]
    fn package_prefix_nests_under_parent() {
        let mut ns = Namespace::new("a".to_string(), vec![], vec![]);
        let used = AHashSet::new();
        let prefix = ns.next_package_prefix(&used);
        assert_eq!(prefix, "a/a");
    }
}
