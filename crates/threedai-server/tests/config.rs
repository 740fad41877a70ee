use std::io::Write;
use threedai_backend::{BackendChoice, ExportFormat, PipelineCommand};
use threedai_server::http::DEFAULT_MAX_UPLOAD_BYTES;
use threedai_server::{ConfigError, ServerConfig};

#[test]
fn defaults_match_unconfigured_service() {
    let config = ServerConfig::default();
    assert_eq!(BackendChoice::Hunyuan, config.backend);
    assert_eq!(None, config.export_format);
    assert!(config.texture);
    assert_eq!(0, config.max_concurrent_generations);
    assert_eq!(DEFAULT_MAX_UPLOAD_BYTES, config.max_upload_bytes);
    assert!(config.results_dir.ends_with("threedai_results"));
}

#[test]
fn parses_keys_and_comments() {
    let mut config = ServerConfig::default();
    config
        .apply_str(
            "# pipeline settings\n\
             ; legacy comment style\n\
             backend = Trellis\n\
             \n\
             trellis_command = /opt/venv/bin/python -m trellis_runner --fp16\n\
             export_format = .stp\n\
             texture = off\n\
             max_concurrent_generations = 2\n\
             max_upload_bytes = 1048576\n",
        )
        .unwrap();

    assert_eq!(BackendChoice::Trellis, config.backend);
    assert_eq!(
        PipelineCommand::new("/opt/venv/bin/python", ["-m", "trellis_runner", "--fp16"]),
        config.trellis_command
    );
    assert_eq!(Some(ExportFormat::Step), config.export_format);
    assert!(!config.texture);
    assert_eq!(2, config.max_concurrent_generations);
    assert_eq!(1_048_576, config.max_upload_bytes);
}

#[test]
fn native_export_format_clears_override() {
    let mut config = ServerConfig::default();
    config.apply_str("export_format = stl\nexport_format = native\n").unwrap();
    assert_eq!(None, config.export_format);
}

#[test]
fn rejects_unknown_backend() {
    let mut config = ServerConfig::default();
    let err = config.apply_str("backend = stable-fast-3d\n").unwrap_err();
    match err {
        ConfigError::InvalidValue { key, value, .. } => {
            assert_eq!("backend", key);
            assert_eq!("stable-fast-3d", value);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn rejects_lines_without_equals() {
    let mut config = ServerConfig::default();
    let err = config.apply_str("backend = hunyuan\n[server]\n").unwrap_err();
    assert!(matches!(err, ConfigError::Syntax { line: 2, .. }), "{err:?}");
}

#[test]
fn rejects_malformed_values() {
    for text in [
        "texture = maybe",
        "max_concurrent_generations = -1",
        "max_upload_bytes = 0",
        "max_upload_bytes = lots",
        "export_format = obj",
        "hunyuan_command =",
    ] {
        let mut config = ServerConfig::default();
        let err = config.apply_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{text}: {err:?}");
    }
}

#[test]
fn unknown_keys_are_ignored() {
    let mut config = ServerConfig::default();
    config.apply_str("colour_scheme = dark\nbackend = trellis\n").unwrap();
    assert_eq!(BackendChoice::Trellis, config.backend);
}

#[test]
fn loads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threedai.conf");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "backend = trellis").unwrap();
    writeln!(file, "hunyuan_command = ./run_hunyuan.sh").unwrap();
    drop(file);

    let config = ServerConfig::from_file(&path).unwrap();
    assert_eq!(BackendChoice::Trellis, config.backend);
    assert_eq!(PipelineCommand::new("./run_hunyuan.sh", Vec::<String>::new()), config.hunyuan_command);

    let backends = config.build_backends();
    assert_eq!(vec![BackendChoice::Hunyuan, BackendChoice::Trellis], backends.choices());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ServerConfig::load(Some(&dir.path().join("absent.conf"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }), "{err:?}");
}
