use std::io::Write;

use weft_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
event_capacity = 64

[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
base_url = "http://localhost:11434/v1/chat/completions"
max_tokens = 1024
temperature = 0.5

[model.retry]
max_retries = 5
initial_backoff_ms = 100

[tools.word_count]
command = "wc -w"
timeout_secs = 10

[tools.fetch]
command = "curl -s https://example.com"

[hooks]
before_node = ["echo starting $WEFT_NODE_ID"]
after_node = []

[log]
log_dir = "/tmp/weft-logs"
level = 1
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.event_capacity, 64);

    let model = config.model.expect("model section");
    assert_eq!(model.provider, "openai");
    assert_eq!(model.model_id, "gpt-4o-mini");
    assert_eq!(model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(model.max_tokens, 1024);
    let retry = model.retry.expect("retry section");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 100);
    assert_eq!(retry.max_backoff_ms, 10_000);

    assert_eq!(config.tools.len(), 2);
    assert_eq!(config.tools["word_count"].timeout_secs, 10);
    assert_eq!(config.tools["fetch"].timeout_secs, 60);

    let hooks = config.hooks.expect("hooks section");
    assert_eq!(hooks.before_node.len(), 1);
    assert!(!hooks.is_empty());

    let log = config.log.expect("log section");
    assert!(log.enabled);
    assert_eq!(log.level, 1);
    assert_eq!(log.log_dir().to_str(), Some("/tmp/weft-logs"));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("WEFT_TEST_API_KEY", "sk-from-env");
    let config = AppConfig::from_toml_str(
        r#"
[model]
model_id = "m"
api_key = "${WEFT_TEST_API_KEY}"
"#,
    )
    .expect("parse");
    let model = config.model.unwrap();
    assert_eq!(model.api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(model.provider, "openai");
}

#[test]
fn test_invalid_config_is_an_error() {
    let err = AppConfig::from_toml_str("[engine]\nevent_capacity = \"lots\"").unwrap_err();
    assert!(err.to_string().contains("Config error"));
}
