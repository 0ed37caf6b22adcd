//! Host function categories for selective call logging

use crate::parser::module::FunctionDefinition;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

bitflags::bitflags! {
    /// Categories of host functions to include in a call trace
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LogScopes: u32 {
        const NONE = 0;
        const CLOCK = 1 << 0;
        const FILESYSTEM = 1 << 1;
        const RANDOM = 1 << 2;
        const ALL = u32::MAX;
    }
}

impl Default for LogScopes {
    fn default() -> Self {
        LogScopes::ALL
    }
}

static NAMED_SCOPES: Lazy<HashMap<&'static str, LogScopes>> = Lazy::new(|| {
    HashMap::from([
        ("clock_res_get", LogScopes::CLOCK),
        ("clock_time_get", LogScopes::CLOCK),
        ("random_get", LogScopes::RANDOM),
    ])
});

/// Category a function name falls in, `NONE` when unclassified
pub fn scope_of(name: &str) -> LogScopes {
    if let Some(scope) = NAMED_SCOPES.get(name) {
        return *scope;
    }
    if name.starts_with("fd_") || name.starts_with("path_") {
        return LogScopes::FILESYSTEM;
    }
    LogScopes::NONE
}

/// Whether calls to `definition` should be logged under `scopes`
pub fn is_in_log_scope(definition: &FunctionDefinition, scopes: LogScopes) -> bool {
    if scopes == LogScopes::ALL {
        return true;
    }
    if scopes.is_empty() {
        return false;
    }
    let name = definition
        .name
        .as_deref()
        .or(definition.import.as_ref().map(|(_, name)| name.as_str()))
        .or(definition.export_names.first().map(String::as_str));
    name.is_some_and(|name| scopes.intersects(scope_of(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn named(name: &str) -> FunctionDefinition {
        FunctionDefinition {
            module_name: "wasi_snapshot_preview1".to_string(),
            name: Some(name.to_string()),
            is_host: true,
            ..Default::default()
        }
    }

    #[rstest]
    #[case("clock_time_get", LogScopes::CLOCK, true)]
    #[case("clock_time_get", LogScopes::FILESYSTEM, false)]
    #[case("clock_time_get", LogScopes::RANDOM, false)]
    #[case("clock_time_get", LogScopes::CLOCK | LogScopes::FILESYSTEM, true)]
    #[case("clock_time_get", LogScopes::FILESYSTEM | LogScopes::RANDOM, false)]
    #[case("clock_res_get", LogScopes::CLOCK, true)]
    #[case("fd_read", LogScopes::FILESYSTEM, true)]
    #[case("fd_read", LogScopes::CLOCK, false)]
    #[case("fd_read", LogScopes::RANDOM, false)]
    #[case("fd_read", LogScopes::CLOCK | LogScopes::FILESYSTEM, true)]
    #[case("fd_read", LogScopes::CLOCK | LogScopes::RANDOM, false)]
    #[case("path_open", LogScopes::FILESYSTEM, true)]
    #[case("random_get", LogScopes::RANDOM, true)]
    #[case("random_get", LogScopes::CLOCK, false)]
    #[case("random_get", LogScopes::FILESYSTEM, false)]
    #[case("random_get", LogScopes::FILESYSTEM | LogScopes::RANDOM, true)]
    #[case("random_get", LogScopes::CLOCK | LogScopes::FILESYSTEM, false)]
    #[case("proc_exit", LogScopes::CLOCK | LogScopes::FILESYSTEM | LogScopes::RANDOM, false)]
    fn test_is_in_log_scope(#[case] name: &str, #[case] scopes: LogScopes, #[case] expected: bool) {
        assert_eq!(is_in_log_scope(&named(name), scopes), expected);
    }

    #[rstest]
    #[case("clock_time_get")]
    #[case("fd_read")]
    #[case("random_get")]
    #[case("proc_exit")]
    fn test_all_and_none(#[case] name: &str) {
        assert!(is_in_log_scope(&named(name), LogScopes::ALL));
        assert!(!is_in_log_scope(&named(name), LogScopes::NONE));
    }

    #[test]
    fn test_import_name_is_classified() {
        let definition = FunctionDefinition {
            import: Some(("wasi_snapshot_preview1".to_string(), "fd_write".to_string())),
            ..Default::default()
        };
        assert!(is_in_log_scope(&definition, LogScopes::FILESYSTEM));
        assert!(!is_in_log_scope(&FunctionDefinition::default(), LogScopes::FILESYSTEM));
    }

    #[test]
    fn test_scopes_from_json() {
        let scopes: LogScopes = serde_json::from_str("\"CLOCK | RANDOM\"").unwrap();
        assert_eq!(scopes, LogScopes::CLOCK | LogScopes::RANDOM);
        assert_eq!(LogScopes::default(), LogScopes::ALL);
    }
}
