//! Integration test: format and state vocabulary helpers
//!
//! Run with: cargo test -p glshim-types --test vocabulary_test -- --nocapture

use glshim_types::{
    BlendState, CompareFunction, DepthBiasState, DepthStencilState, Extent3d, IndexFormat,
    ResourceId, ResourceType, StencilFaceState, StencilOperation, StencilState, TextureFormat,
    VertexFormat,
};

#[test]
fn test_texture_format_classes() {
    assert_eq!(TextureFormat::R8Unorm.block_size(), 1);
    assert_eq!(TextureFormat::Bgra8UnormSrgb.block_size(), 4);
    assert_eq!(TextureFormat::Rgba16Float.block_size(), 8);
    assert_eq!(TextureFormat::Rgba32Float.block_size(), 16);

    assert!(TextureFormat::Depth24PlusStencil8.has_depth());
    assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
    assert!(!TextureFormat::Depth32Float.has_stencil());
    assert!(TextureFormat::Depth32Float.is_depth_stencil());
    assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());

    assert!(TextureFormat::Rgba8UnormSrgb.is_srgb());
    assert!(!TextureFormat::Bgra8Unorm.is_srgb());
}

#[test]
fn test_vertex_format_layout() {
    assert_eq!(VertexFormat::Float32x3.byte_size(), 12);
    assert_eq!(VertexFormat::Unorm8x4.byte_size(), 4);
    assert_eq!(VertexFormat::Float16x2.byte_size(), 4);
    assert_eq!(VertexFormat::Sint32x2.components(), 2);

    assert!(VertexFormat::Snorm16x2.is_normalized());
    assert!(!VertexFormat::Snorm16x2.is_integer());
    assert!(VertexFormat::Uint8x2.is_integer());
    assert!(!VertexFormat::Float32.is_integer());

    assert_eq!(IndexFormat::Uint16.byte_size(), 2);
    assert_eq!(IndexFormat::Uint32.byte_size(), 4);
}

#[test]
fn test_mip_level_size_clamps_to_one() {
    let extent = Extent3d::new_2d(64, 16);
    assert_eq!(extent.mip_level_size(0), extent);
    assert_eq!(extent.mip_level_size(2), Extent3d::new_2d(16, 4));
    assert_eq!(extent.mip_level_size(5), Extent3d::new_2d(2, 1));
    assert_eq!(extent.mip_level_size(9), Extent3d::new_2d(1, 1));
}

#[test]
fn test_stencil_enablement() {
    assert!(!StencilState::default().is_enabled());

    let front = StencilFaceState {
        compare: CompareFunction::Equal,
        ..StencilFaceState::IGNORE
    };
    let masked_out = StencilState {
        front,
        ..StencilState::default()
    };
    assert!(!masked_out.is_enabled(), "zero masks leave the test off");

    let enabled = StencilState {
        read_mask: 0xff,
        ..masked_out
    };
    assert!(enabled.is_enabled());
    assert!(front.needs_ref_value());

    let replace_only = StencilFaceState {
        pass_op: StencilOperation::Replace,
        ..StencilFaceState::IGNORE
    };
    assert!(replace_only.needs_ref_value());
    assert!(!StencilFaceState::IGNORE.needs_ref_value());
}

#[test]
fn test_depth_enablement_and_bias() {
    let ds = DepthStencilState {
        format: TextureFormat::Depth24Plus,
        depth_write_enabled: false,
        depth_compare: CompareFunction::Always,
        stencil: StencilState::default(),
        bias: DepthBiasState::default(),
    };
    assert!(!ds.is_depth_enabled());
    assert!(!ds.bias.is_enabled());

    let writing = DepthStencilState {
        depth_write_enabled: true,
        ..ds
    };
    assert!(writing.is_depth_enabled());

    let biased = DepthBiasState {
        slope_scale: 0.5,
        ..DepthBiasState::default()
    };
    assert!(biased.is_enabled());
}

#[test]
fn test_depth_stencil_from_toml_defaults_stencil_and_bias() {
    let ds: DepthStencilState = toml::from_str(
        r#"
format = "Depth32Float"
depth_write_enabled = true
depth_compare = "LessEqual"
"#,
    )
    .expect("deserialize");
    assert_eq!(ds.format, TextureFormat::Depth32Float);
    assert_eq!(ds.depth_compare, CompareFunction::LessEqual);
    assert_eq!(ds.stencil, StencilState::default());
    assert!(!ds.bias.is_enabled());
}

#[test]
fn test_resource_id_ownership() {
    let null = ResourceId::null();
    assert!(null.is_null());

    let id = ResourceId {
        device_id: 3,
        index: 12,
        resource_type: ResourceType::BindGroup,
    };
    assert!(!id.is_null());
    assert!(id.belongs_to(3));
    assert!(!id.belongs_to(4));
    assert_eq!(id.to_string(), "bind group#12@dev3");
}

#[test]
fn test_blend_presets() {
    assert_ne!(BlendState::ALPHA_BLENDING, BlendState::REPLACE);
    assert_eq!(
        BlendState::PREMULTIPLIED_ALPHA_BLENDING.alpha,
        BlendState::ALPHA_BLENDING.alpha
    );
}
