//! Exercises `Config::from_file` end-to-end against a real TOML file, including
//! the `[[ffc.flags]]` declarations the standalone host binary uses to seed its
//! `ConfigAppCatalog`.

use ffc_mpfc::config::Config;
use std::io::Write;

#[test]
fn loads_ffc_flags_and_mpfc_tunables_from_a_real_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        host = "0.0.0.0"
        log_level = "debug"

        [ffc]
        enabled = true
        rpc_bind = "127.0.0.1:17420"

        [[ffc.flags]]
        name = "ff_a"
        desc = "base capability"

        [[ffc.flags]]
        name = "ff_b"
        desc = "depends on ff_a"
        depends_on = ["ff_a"]
        stability = "experimental"

        [mpfc]
        enabled = true
        tick = "1s"
        "#
    )
    .unwrap();

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert!(config.ffc.enabled);
    assert_eq!(config.ffc.flags.len(), 2);
    assert_eq!(config.ffc.flags[1].depends_on, vec!["ff_a".to_string()]);
    assert_eq!(config.ffc.flags[1].stability, "experimental");
    assert!(config.mpfc.enabled);
    assert_eq!(config.mpfc.tick, std::time::Duration::from_secs(1));
}

#[test]
fn rejects_a_metrics_port_colliding_with_ffc_rpc_bind() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [ffc]
        enabled = true
        rpc_bind = "127.0.0.1:9420"

        [metrics]
        enabled = true
        port = 9420
        "#
    )
    .unwrap();

    let result = Config::from_file(file.path().to_str().unwrap());
    assert!(result.is_err());
}
