// tests/config_load.rs
use std::{env, fs};
use weibo_digest::config::{DigestConfig, DEFAULT_LOG_DIR, DEFAULT_WINDOW_SECS, ENV_CONFIG_PATH};

fn clear_overrides() {
    for k in [
        ENV_CONFIG_PATH,
        "TARGET_URL",
        "FRESHNESS_WINDOW_SECS",
        "CRAWL_INTERVAL_SECS",
        "OUTPUT_DIR",
        "SMTP_HOST",
        "LOG_DIR",
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn explicit_path_toml_and_json() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("digest.toml");
    fs::write(&p_toml, "window_secs = 3600\noutput_dir = \"out\"\n").unwrap();
    let cfg = DigestConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.window_secs, 3600);
    assert_eq!(cfg.output_dir, std::path::PathBuf::from("out"));
    assert_eq!(cfg.log_dir, std::path::PathBuf::from(DEFAULT_LOG_DIR));

    env::set_var("LOG_DIR", "/var/log/weibo");
    let cfg = DigestConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.log_dir, std::path::PathBuf::from("/var/log/weibo"));
    env::remove_var("LOG_DIR");

    let p_json = dir.path().join("digest.json");
    fs::write(&p_json, r#"{"target_url": "https://m.weibo.cn/u/42"}"#).unwrap();
    let cfg = DigestConfig::load_from(&p_json).unwrap();
    assert_eq!(cfg.target_url, "https://m.weibo.cn/u/42");
    assert_eq!(cfg.window_secs, DEFAULT_WINDOW_SECS);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "window_secs = \"five hours\"").unwrap();
    assert!(DigestConfig::load_from(&bad).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Run from a temp CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_overrides();

    // 1) nothing on disk → defaults
    assert_eq!(DigestConfig::load_default().unwrap(), DigestConfig::default());

    // 2) config/digest.toml fallback
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/digest.toml"), "interval_secs = 120").unwrap();
    assert_eq!(DigestConfig::load_default().unwrap().interval_secs, 120);

    // 3) env path wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"interval_secs": 30}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(DigestConfig::load_default().unwrap().interval_secs, 30);

    // 4) env path to nowhere is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(DigestConfig::load_default().is_err());

    clear_overrides();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_single_keys() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("digest.toml");
    fs::write(&p, "window_secs = 3600\nsmtp_host = \"smtp.qq.com\"").unwrap();

    env::set_var("FRESHNESS_WINDOW_SECS", "7200");
    env::set_var("SMTP_HOST", "smtp.example.com");
    env::set_var("CRAWL_INTERVAL_SECS", "not-a-number");
    let cfg = DigestConfig::load_from(&p).unwrap();
    assert_eq!(cfg.window_secs, 7200);
    assert_eq!(cfg.smtp_host, "smtp.example.com");
    assert_eq!(cfg.interval_secs, 3600);

    clear_overrides();
}
