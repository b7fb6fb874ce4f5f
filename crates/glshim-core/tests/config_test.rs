//! Integration test: configuration loading, id allocation and error classes
//!
//! Run with: cargo test -p glshim-core --test config_test -- --nocapture

use glshim_core::{GlShimConfig, HalError, HandleAllocator};
use glshim_types::ResourceType;

#[test]
fn test_defaults() {
    let config = GlShimConfig::default();
    assert!(config.backend.check_errors);
    assert!(!config.backend.log_commands);
    assert!(config.backend.flush_on_submit);
    assert_eq!(config.surface.width, 800);
    assert_eq!(config.surface.height, 600);
    assert!(config.surface.vsync);
    assert_eq!(config.logging.filter, "info");
}

#[test]
fn test_partial_sections_fill_defaults() {
    let config = GlShimConfig::from_toml(
        r#"
[backend]
log_commands = true

[surface]
width = 1280
"#,
    )
    .expect("parse");
    assert!(config.backend.log_commands);
    assert!(config.backend.check_errors);
    assert_eq!(config.surface.width, 1280);
    assert_eq!(config.surface.height, 600);
    assert_eq!(config.logging.filter, "info");

    let empty = GlShimConfig::from_toml("").expect("empty document");
    assert_eq!(empty.surface.width, 800);
}

#[test]
fn test_zero_surface_is_rejected() {
    match GlShimConfig::from_toml("[surface]\nheight = 0\n") {
        Err(HalError::Config(msg)) => {
            println!("rejected: {msg}");
            assert!(msg.contains("800x0"));
        }
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    match GlShimConfig::from_toml("[backend\ncheck_errors = yes") {
        Err(HalError::Config(_)) => {}
        other => panic!("expected Config error, got {:?}", other),
    }
    match GlShimConfig::from_toml("[backend]\ncheck_errors = \"yes\"\n") {
        Err(HalError::Config(_)) => {}
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_to_toml_reloads_identically() {
    let mut config = GlShimConfig::default();
    config.backend.flush_on_submit = false;
    config.surface.vsync = false;
    config.logging.filter = "glshim_backend=debug".to_string();

    let text = config.to_toml().expect("serialize");
    println!("{text}");
    let reloaded = GlShimConfig::from_toml(&text).expect("reload");
    assert!(!reloaded.backend.flush_on_submit);
    assert!(!reloaded.surface.vsync);
    assert_eq!(reloaded.logging.filter, "glshim_backend=debug");
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("glshim-config-{}.toml", std::process::id()));
    std::fs::write(&path, "[surface]\nwidth = 320\nheight = 240\n").expect("write config");
    let path_str = path.to_string_lossy().to_string();

    let config = GlShimConfig::load(&path_str).expect("load");
    assert_eq!((config.surface.width, config.surface.height), (320, 240));
    std::fs::remove_file(&path).ok();

    match GlShimConfig::load(&path_str) {
        Err(HalError::Io(_)) => {}
        other => panic!("expected Io error, got {:?}", other),
    }
    let fallback = GlShimConfig::load_or_default(&path_str);
    assert_eq!(fallback.surface.width, 800);
}

#[test]
fn test_allocators_get_distinct_devices() {
    let a = HandleAllocator::new();
    let b = HandleAllocator::new();
    assert_ne!(a.device_id(), 0);
    assert_ne!(a.device_id(), b.device_id());

    assert_eq!(a.allocated(), 0);
    let first = a.alloc(ResourceType::Buffer);
    let second = a.alloc(ResourceType::Texture);
    assert_eq!(first.index, 1);
    assert_eq!(second.index, 2);
    assert_eq!(second.resource_type, ResourceType::Texture);
    assert!(first.belongs_to(a.device_id()));
    assert!(!first.belongs_to(b.device_id()));
    assert_eq!(a.allocated(), 2);
    assert_eq!(b.allocated(), 0);
}

#[test]
fn test_only_device_loss_is_fatal() {
    assert!(HalError::DeviceLost.is_fatal());
    let recoverable = [
        HalError::RecordingState("not recording".into()),
        HalError::UnsupportedOperation("compute".into()),
        HalError::FramebufferIncomplete { status: 0x8cd6 },
        HalError::OutOfRange {
            offset: 8,
            len: 16,
            size: 16,
        },
        HalError::Config("bad".into()),
    ];
    for err in &recoverable {
        assert!(!err.is_fatal(), "{err} should not be fatal");
    }
}

#[test]
fn test_error_messages() {
    let err = HalError::OutOfRange {
        offset: 8,
        len: 16,
        size: 16,
    };
    assert_eq!(err.to_string(), "range out of bounds: offset=8, len=16, size=16");

    let err = HalError::FramebufferIncomplete { status: 0x8cd6 };
    assert_eq!(err.to_string(), "framebuffer incomplete: status=0x8cd6");

    let err = HalError::mismatch(ResourceType::Sampler, ResourceType::Buffer, 2);
    assert_eq!(
        err.to_string(),
        "resource type error: expected sampler, found buffer at binding 2"
    );

    let err = HalError::foreign(ResourceType::Texture, 5, 6);
    assert!(err.to_string().contains("owned by device 5 on device 6"));
}
