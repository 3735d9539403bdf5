//! Option resolution
//!
//! Merges a batch-wide option layer with one file's own options. The per-file
//! layer always wins on a key collision; the global layer only fills gaps.

use super::OptionMap;

/// The resolved option set applied to one file's upload
pub type EffectiveOptions = OptionMap;

/// Merge `global` with `per_file`.
///
/// Starts from a copy of `global` and writes every `per_file` entry over it,
/// so an explicitly set per-file key is never replaced by a global one. Values
/// are cloned as-is; no type coercion happens here.
pub fn resolve(global: &OptionMap, per_file: &OptionMap) -> EffectiveOptions {
    let mut effective = global.clone();
    for (key, value) in per_file {
        effective.insert(key.clone(), value.clone());
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{keys, Acl, OptionValue};

    #[test]
    fn test_per_file_wins() {
        let global = OptionMap::new().with(keys::ACL, Acl::Private);
        let per_file = OptionMap::new().with(keys::ACL, Acl::PublicRead);

        let effective = resolve(&global, &per_file);
        assert_eq!(effective.acl(), Some(Acl::PublicRead));
    }

    #[test]
    fn test_global_fills_gaps() {
        let global = OptionMap::new()
            .with(keys::ACL, Acl::Private)
            .with(keys::CACHE_CONTROL, "max-age=60");
        let per_file = OptionMap::new().with_metadata([("universe", "Marvel")]);

        let effective = resolve(&global, &per_file);
        assert_eq!(effective.acl(), Some(Acl::Private));
        assert_eq!(effective.cache_control(), Some("max-age=60"));
        assert_eq!(effective.metadata().unwrap()["universe"], "Marvel");
        assert_eq!(effective.len(), 3);
    }

    #[test]
    fn test_metadata_is_replaced_not_merged() {
        let global = OptionMap::new().with_metadata([("a", "1")]);
        let per_file = OptionMap::new().with_metadata([("b", "2")]);

        let effective = resolve(&global, &per_file);
        let metadata = effective.metadata().unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["b"], "2");
    }

    #[test]
    fn test_value_types_preserved() {
        let global = OptionMap::new().with("x-flag", true);
        let per_file = OptionMap::new().with(keys::ACL, "public-read");

        let effective = resolve(&global, &per_file);
        assert_eq!(effective.get("x-flag"), Some(&OptionValue::Flag(true)));
        assert_eq!(
            effective.get(keys::ACL),
            Some(&OptionValue::Text("public-read".into()))
        );
    }

    #[test]
    fn test_empty_layers() {
        assert!(resolve(&OptionMap::new(), &OptionMap::new()).is_empty());
    }
}
