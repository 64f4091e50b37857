use super::{apply_env, apply_file, Settings};

use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_seed_demo_cases_on_localhost() {
    let settings = Settings::default();
    assert_eq!(settings.server_bind, "127.0.0.1:8080");
    assert!(settings.seed_demo_cases);
    assert_eq!(settings.staff_password, "123456");
    assert_eq!(settings.dfe_remediation_url, "/dfe/constituir");
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
bind_addr = "0.0.0.0:9000"
session_ttl_seconds = "120"
seed_demo_cases = "false"
citizens_without_dfe = "20-11111111-2, 27222222223,"
"#,
    );

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.session_ttl_seconds, 120);
    assert!(!settings.seed_demo_cases);
    assert_eq!(
        settings.citizens_without_dfe,
        vec!["20-11111111-2".to_string(), "27222222223".to_string()]
    );
}

#[test]
fn unparseable_file_is_ignored() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "bind_addr = [1, 2");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_env_wins_over_legacy_bind_variable() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env(&[
            ("SERVER_BIND", "127.0.0.1:1111"),
            ("APP__BIND_ADDR", "127.0.0.1:2222"),
            ("APP__SESSION_SECRET", "s3cret"),
            ("APP__MAX_BODY_BYTES", "2048"),
        ]),
    );

    assert_eq!(settings.server_bind, "127.0.0.1:2222");
    assert_eq!(settings.session_secret, "s3cret");
    assert_eq!(settings.max_body_bytes, 2048);
}

#[test]
fn invalid_numbers_keep_previous_value() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env(&[
            ("APP__SESSION_TTL_SECONDS", "soon"),
            ("APP__SEED_DEMO_CASES", "maybe"),
        ]),
    );

    assert_eq!(
        settings.session_ttl_seconds,
        Settings::default().session_ttl_seconds
    );
    assert!(settings.seed_demo_cases);
}
