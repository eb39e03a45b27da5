//! Application bootstrap. Kept in its own test binary so the global
//! subscriber it installs is not raced by other tests.

use cinder_engine::prelude::*;

#[test]
fn bootstrap_installs_configured_subscriber() {
    let config = EngineConfig {
        log_filter: "cinder_ecs=debug,warn".to_owned(),
        ..EngineConfig::default()
    };
    let (mut driver, installed) =
        FrameDriver::bootstrap(EntityManager::new(ComponentRegistry::new()), config).unwrap();
    assert!(installed);
    // The subscriber is in place, so a later install is refused.
    assert!(!init_logging("info"));
    if std::env::var_os("RUST_LOG").is_none() {
        assert!(tracing::enabled!(target: "cinder_ecs", tracing::Level::DEBUG));
        assert!(!tracing::enabled!(target: "cinder_engine", tracing::Level::INFO));
    }

    driver.frame(0.02);
    assert_eq!(driver.frame_count(), 1);
}
