//! Tests for configuration loading and validation

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::loader::parse_env_content;
    use serial_test::serial;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const KEY_VAR: &str = "CODEPAD_TEST_ADVISOR_KEY";

    #[test]
    #[serial]
    fn test_empty_config_uses_defaults() {
        let config = ConfigLoader::from_str("").unwrap();

        assert_eq!(config.engine.isolation, IsolationMode::Native);
        assert_eq!(config.engine.timeouts.native_ms, 5_000);
        assert_eq!(config.engine.timeouts.container_ms, 10_000);
        assert_eq!(config.engine.timeout(), Duration::from_secs(5));
        assert_eq!(config.engine.max_output_bytes, 1024 * 1024);
        assert!(!config.engine.retain_workspaces);
        assert_eq!(config.advisor.model, "llama3-70b-8192");
        assert_eq!(config.advisor.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(config.advisor.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_container_isolation_uses_container_timeout() {
        let yaml = r#"
engine:
  isolation: container
  timeouts:
    container_ms: 12000
  limits:
    memory_mb: 256
    pids: 64
"#;
        let config = ConfigLoader::from_str(yaml).unwrap();

        assert_eq!(config.engine.isolation, IsolationMode::Container);
        assert_eq!(config.engine.timeout(), Duration::from_secs(12));
        assert_eq!(config.engine.limits.memory_bytes(), Some(256 * 1024 * 1024));
        assert_eq!(config.engine.limits.pids, Some(64));
        assert_eq!(config.engine.limits.cpu_seconds, None);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ConfigLoader::from_str("engine: [not, a, map]").unwrap_err();
        assert!(matches!(err, crate::errors::EngineError::Config(_)));
    }

    #[test]
    fn test_unknown_isolation_rejected() {
        assert!(ConfigLoader::from_str("engine:\n  isolation: vm\n").is_err());
        assert_eq!("docker".parse::<IsolationMode>().unwrap(), IsolationMode::Container);
        assert!("vm".parse::<IsolationMode>().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CodepadConfig::default();
        config.engine.timeouts.native_ms = 0;
        assert!(config.validate().is_err());

        let mut config = CodepadConfig::default();
        config.server.bind_addr = "localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = CodepadConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = CodepadConfig::default();
        config.advisor.api_base = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        // a disabled advisor is not validated
        config.advisor.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_api_key_from_process_env() {
        std::env::set_var(KEY_VAR, "from-env");
        let yaml = format!("advisor:\n  api_key_env: {}\n", KEY_VAR);

        let config = ConfigLoader::from_str(&yaml).unwrap();
        std::env::remove_var(KEY_VAR);

        assert_eq!(config.advisor.api_key.as_deref(), Some("from-env"));
        assert!(config.advisor.is_usable());
    }

    #[test]
    #[serial]
    fn test_explicit_api_key_wins() {
        std::env::set_var(KEY_VAR, "from-env");
        let yaml = format!("advisor:\n  api_key: explicit\n  api_key_env: {}\n", KEY_VAR);

        let config = ConfigLoader::from_str(&yaml).unwrap();
        std::env::remove_var(KEY_VAR);

        assert_eq!(config.advisor.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    #[serial]
    fn test_api_key_from_env_file_without_touching_env() {
        std::env::remove_var(KEY_VAR);
        let mut env_file = NamedTempFile::new().unwrap();
        writeln!(env_file, "# secrets").unwrap();
        writeln!(env_file, "OTHER=1").unwrap();
        writeln!(env_file, "export {}=\"from-file\"", KEY_VAR).unwrap();
        let yaml = format!(
            "advisor:\n  api_key_env: {}\nenvironment:\n  env_files:\n    - {}\n",
            KEY_VAR,
            env_file.path().display()
        );

        let config = ConfigLoader::from_str(&yaml).unwrap();

        assert_eq!(config.advisor.api_key.as_deref(), Some("from-file"));
        assert!(std::env::var(KEY_VAR).is_err());
    }

    #[test]
    #[serial]
    fn test_missing_key_leaves_advisor_unusable() {
        std::env::remove_var(KEY_VAR);
        let yaml = format!("advisor:\n  api_key_env: {}\n", KEY_VAR);

        let config = ConfigLoader::from_str(&yaml).unwrap();

        assert!(config.advisor.api_key.is_none());
        assert!(!config.advisor.is_usable());
    }

    #[test]
    fn test_parse_env_content() {
        let vars = parse_env_content("A=1\n\n# c\nB = 'two'\nexport C=\"3\"\nnot a pair\n");
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "two");
        assert_eq!(vars["C"], "3");
    }

    #[tokio::test]
    #[serial]
    async fn test_from_file_and_missing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  bind_addr: 0.0.0.0:9000\nlogging:\n  level: debug").unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.logging.level, "debug");

        let missing = ConfigLoader::load_or_default(Some(std::path::Path::new(
            "/nonexistent/codepad.yaml",
        )))
        .await;
        assert!(missing.is_err());
    }
}
