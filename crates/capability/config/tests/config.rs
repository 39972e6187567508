use plcdash_config::AppConfig;

#[test]
fn defaults_are_sane() {
    let config = AppConfig::default();
    assert_eq!(config.failure_threshold, 3);
    assert_eq!(config.write_max_retries, 3);
    assert!(config.read_timeout_ms > 0);
    assert!(config.subscriber_buffer > 0);
}

#[test]
fn from_env_falls_back_to_defaults() {
    // 测试进程未设置任何 PLCDASH_* 变量时全部取缺省值
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8080");
    assert_eq!(config.retention_sweep_interval_s, 60);
}
