use amdmid_core::{logging, Config};

#[test]
fn test_init_only_once() {
    let config = Config::new(std::env::temp_dir()).with_verbosity(2);
    assert!(logging::init_from_config(&config).is_ok());
    assert!(logging::init(0, true).is_err());

    tracing::debug!("subscriber installed");
}
