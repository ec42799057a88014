//! Property-based tests for environment merging, shell quoting and config
//! validation.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;

use flowkestra_cli::domain::{
    AmbientEnv, FlowkestraConfig, InstanceConfig, TRACKING_ENV_VAR, build_environment,
    validate_config,
};
use flowkestra_cli::infra::remote::sh_escape;

fn env_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[A-Z_][A-Z0-9_]{0,8}", "[ -~]{0,12}", 0..6)
}

proptest! {
    /// Every override key ends up with the override's value.
    #[test]
    fn prop_overrides_always_win(
        ambient in env_map(),
        overrides in env_map(),
        uri in proptest::option::of("http://[a-z]{1,8}:[0-9]{2,4}"),
    ) {
        let env = build_environment(&AmbientEnv::new(ambient), uri.as_deref(), &overrides);
        for (key, value) in &overrides {
            prop_assert_eq!(env.get(key), Some(value));
        }
    }

    /// The tracking variable is present iff a URI or an override provides it.
    #[test]
    fn prop_tracking_var_presence(
        overrides in env_map(),
        uri in proptest::option::of("http://[a-z]{1,8}:[0-9]{2,4}"),
    ) {
        let env = build_environment(&AmbientEnv::empty(), uri.as_deref(), &overrides);
        let expected = overrides.get(TRACKING_ENV_VAR).cloned().or(uri);
        prop_assert_eq!(env.get(TRACKING_ENV_VAR).cloned(), expected);
    }

    /// Ambient keys not overridden survive unchanged.
    #[test]
    fn prop_ambient_survives_when_not_overridden(
        ambient in env_map(),
        overrides in env_map(),
    ) {
        let env = build_environment(&AmbientEnv::new(ambient.clone()), None, &overrides);
        for (key, value) in ambient.iter().filter(|(k, _)| !overrides.contains_key(*k)) {
            prop_assert_eq!(env.get(key), Some(value));
        }
    }

    /// Quoting is reversible: strip the outer quotes and undo `'\''`.
    #[test]
    fn prop_sh_escape_is_reversible(s in "[ -~]{0,24}") {
        let quoted = sh_escape(&s);
        prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace(r"'\''", "'"), s);
    }

    /// Validation keeps declaration order and names unnamed instances by position.
    #[test]
    fn prop_validate_preserves_order(names in prop::collection::vec(proptest::option::of("[a-z]{1,6}"), 1..8)) {
        let config = FlowkestraConfig {
            mlflow_uri: None,
            instances: names
                .iter()
                .map(|n| InstanceConfig { name: n.clone(), ..InstanceConfig::default() })
                .collect(),
        };
        let specs = validate_config(&config).expect("valid");
        prop_assert_eq!(specs.len(), names.len());
        for (i, (spec, name)) in specs.iter().zip(&names).enumerate() {
            let expected = name.clone().unwrap_or_else(|| format!("instance-{}", i + 1));
            prop_assert_eq!(&spec.name, &expected);
        }
    }
}
