//! Integration test: resource creation and validation
//!
//! Run with: cargo test --test device_test -- --nocapture

mod common;

use std::num::NonZeroU64;

use glshim_backend::native::consts;
use glshim_backend::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindingResource,
    BufferBinding, Capabilities, QuerySetDescriptor, QueryType, RenderPipelineDescriptor,
    TextureDescriptor, TextureViewDescriptor,
};
use glshim_core::HalError;
use glshim_types::{
    BindGroupLayoutEntry, BindingType, BufferBindingType, BufferUsages, Extent3d,
    MultisampleState, PrimitiveState, ResourceType, SamplerBindingType, SamplerDescriptor,
    ShaderStages, TextureDimension, TextureFormat, TextureUsages, TextureViewDimension,
    VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
};

use common::{program, Harness, SURFACE_HEIGHT, SURFACE_WIDTH};

fn texture_desc(size: Extent3d, mips: u32, samples: u32) -> TextureDescriptor<'static> {
    TextureDescriptor {
        label: Some("test texture"),
        size,
        mip_level_count: mips,
        sample_count: samples,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8Unorm,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
    }
}

fn uniform_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::VERTEX_FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    }
}

#[test]
fn test_zero_sized_texture_is_rejected() {
    let h = Harness::new();
    match h
        .device
        .create_texture(&texture_desc(Extent3d::new_2d(0, 16), 1, 1))
    {
        Err(HalError::ObjectCreation(msg)) => println!("rejected: {msg}"),
        other => panic!("expected ObjectCreation, got {:?}", other),
    }
    assert_eq!(h.device.live_resource_count(), 0);
    assert_eq!(h.soft.lock().live_textures(), 0);
}

#[test]
fn test_multisampled_texture_with_mips_is_rejected() {
    let h = Harness::new();
    match h
        .device
        .create_texture(&texture_desc(Extent3d::new_2d(16, 16), 4, 4))
    {
        Err(HalError::UnsupportedOperation(msg)) => println!("rejected: {msg}"),
        other => panic!("expected UnsupportedOperation, got {:?}", other),
    }
}

#[test]
fn test_texture_targets_and_sampling_defaults() {
    let h = Harness::new();
    let plain = h
        .device
        .create_texture(&texture_desc(Extent3d::new_2d(16, 16), 5, 1))
        .unwrap();
    let layered = h
        .device
        .create_texture(&texture_desc(
            Extent3d {
                width: 8,
                height: 8,
                depth_or_array_layers: 6,
            },
            1,
            1,
        ))
        .unwrap();
    let (msaa, _) = h.render_target(8, 8, 4);

    assert_eq!(plain.target(), consts::TEXTURE_2D);
    assert_eq!(layered.target(), consts::TEXTURE_2D_ARRAY);
    assert_eq!(msaa.target(), consts::TEXTURE_2D_MULTISAMPLE);
    assert!(msaa.is_multisampled());

    let soft = h.soft.lock();
    assert_eq!(
        soft.texture_parameter(plain.raw(), consts::TEXTURE_MAX_LEVEL),
        Some(4)
    );
    assert_eq!(
        soft.texture_parameter(plain.raw(), consts::TEXTURE_WRAP_S),
        Some(consts::CLAMP_TO_EDGE as i32)
    );
    assert_eq!(soft.live_textures(), 3);
}

#[test]
fn test_texture_views() {
    let h = Harness::new();
    let texture = h
        .device
        .create_texture(&texture_desc(Extent3d::new_2d(64, 32), 4, 1))
        .unwrap();

    let full = h
        .device
        .create_texture_view(&texture, &TextureViewDescriptor::default())
        .unwrap();
    assert_eq!(full.mip_level_count(), 4);
    assert_eq!(full.dimension(), TextureViewDimension::D2);
    assert_eq!(full.extent(), (64, 32));
    assert!(!full.is_surface());

    let level2 = h
        .device
        .create_texture_view(
            &texture,
            &TextureViewDescriptor {
                base_mip_level: 2,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(level2.extent(), (16, 8));
    assert_eq!(level2.mip_level_count(), 2);

    match h.device.create_texture_view(
        &texture,
        &TextureViewDescriptor {
            base_mip_level: 4,
            ..Default::default()
        },
    ) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
}

#[test]
fn test_surface_view_follows_configuration() {
    let h = Harness::new();
    let surface = h.device.create_surface().unwrap();
    let view = surface.acquire_texture();
    assert!(view.is_surface());
    assert!(view.texture().is_none());
    assert_eq!(view.extent(), (SURFACE_WIDTH, SURFACE_HEIGHT));

    surface.configure(640, 480);
    assert_eq!(surface.size(), (640, 480));
    assert_eq!(surface.acquire_texture().extent(), (640, 480));
    // Views acquired earlier keep the old size.
    assert_eq!(view.extent(), (SURFACE_WIDTH, SURFACE_HEIGHT));
}

#[test]
fn test_duplicate_layout_binding_is_rejected() {
    let h = Harness::new();
    let entries = [uniform_entry(1), uniform_entry(0), uniform_entry(1)];
    match h.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: None,
        entries: &entries,
    }) {
        Err(HalError::ResourceType { expected, reason }) => {
            assert_eq!(expected, ResourceType::BindGroupLayout);
            assert!(reason.contains("binding 1"), "{reason}");
        }
        other => panic!("expected ResourceType, got {:?}", other),
    }
}

#[test]
fn test_bind_group_entries_must_match_layout() {
    let h = Harness::new();
    let buffer = h.buffer(256, BufferUsages::UNIFORM);
    let sampler = h.device.create_sampler(&SamplerDescriptor::default()).unwrap();
    let entries = [
        uniform_entry(0),
        BindGroupLayoutEntry {
            binding: 1,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
        },
    ];
    let layout = h
        .device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("material"),
            entries: &entries,
        })
        .unwrap();
    let whole = |offset: u64, size: u64| {
        BindingResource::Buffer(BufferBinding {
            buffer: buffer.clone(),
            offset,
            size: NonZeroU64::new(size),
        })
    };

    // A buffer where the layout declares a sampler.
    match h.device.create_bind_group(&BindGroupDescriptor {
        label: None,
        layout: &layout,
        entries: vec![BindGroupEntry {
            binding: 1,
            resource: whole(0, 64),
        }],
    }) {
        Err(HalError::ResourceType { expected, reason }) => {
            assert_eq!(expected, ResourceType::Sampler);
            assert!(reason.contains("binding 1"), "{reason}");
        }
        other => panic!("expected ResourceType, got {:?}", other),
    }

    // A binding the layout does not declare.
    assert!(matches!(
        h.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries: vec![BindGroupEntry {
                binding: 7,
                resource: BindingResource::Sampler(sampler.clone()),
            }],
        }),
        Err(HalError::ResourceType { .. })
    ));

    // A range past the end of the buffer.
    assert!(matches!(
        h.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: whole(192, 128),
            }],
        }),
        Err(HalError::OutOfRange { .. })
    ));

    let group = h
        .device
        .create_bind_group(&BindGroupDescriptor {
            label: Some("material"),
            layout: &layout,
            entries: vec![
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(sampler.clone()),
                },
                BindGroupEntry {
                    binding: 0,
                    resource: whole(0, 64),
                },
            ],
        })
        .unwrap();
    assert_eq!(group.entries()[0].binding, 0);
    assert_eq!(group.layout().dynamic_offset_count(), 0);
}

#[test]
fn test_foreign_resources_are_rejected_at_creation() {
    let h = Harness::new();
    let other = Harness::new();
    let foreign_buffer = other.buffer(64, BufferUsages::UNIFORM);
    let layout = h
        .device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: &[uniform_entry(0)],
        })
        .unwrap();

    assert!(matches!(
        h.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: foreign_buffer.clone(),
                    offset: 0,
                    size: None,
                }),
            }],
        }),
        Err(HalError::ResourceType { .. })
    ));
    assert!(h.device.destroy_buffer(&foreign_buffer).is_err());
    assert_eq!(other.device.live_resource_count(), 1);

    let foreign_layout = other
        .device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: &[uniform_entry(0)],
        })
        .unwrap();
    let result = h.device.create_render_pipeline(&RenderPipelineDescriptor {
        label: None,
        program: program(3),
        bind_group_layouts: vec![foreign_layout],
        vertex_buffers: Vec::new(),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        targets: Vec::new(),
    });
    assert!(matches!(result, Err(HalError::ResourceType { .. })));
}

#[test]
fn test_vertex_attribute_limit() {
    let h = Harness::with_capabilities(Capabilities {
        max_vertex_attributes: 2,
        ..Capabilities::default()
    });
    let attribute = |location: u32| VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 16 * u64::from(location),
        shader_location: location,
    };
    let layout = VertexBufferLayout {
        array_stride: 48,
        step_mode: VertexStepMode::Vertex,
        attributes: vec![attribute(0), attribute(1), attribute(2)],
    };
    match h.device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("too wide"),
        program: program(3),
        bind_group_layouts: Vec::new(),
        vertex_buffers: vec![layout],
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        targets: Vec::new(),
    }) {
        Err(HalError::UnsupportedOperation(msg)) => println!("rejected: {msg}"),
        other => panic!("expected UnsupportedOperation, got {:?}", other),
    }
}

#[test]
fn test_live_resources_are_tracked() {
    let h = Harness::new();
    assert_eq!(h.device.live_resource_count(), 0);

    let buffer = h.buffer(16, BufferUsages::VERTEX);
    let (texture, view) = h.render_target(4, 4, 1);
    let sampler = h.device.create_sampler(&SamplerDescriptor::default()).unwrap();
    let fence = h.device.create_fence().unwrap();
    let surface = h.device.create_surface().unwrap();
    // Buffer, texture, view, sampler, fence, surface and its view.
    assert_eq!(h.device.live_resource_count(), 7);

    h.device.destroy_buffer(&buffer).unwrap();
    h.device.destroy_texture_view(&view).unwrap();
    h.device.destroy_texture(&texture).unwrap();
    h.device.destroy_sampler(&sampler).unwrap();
    h.device.destroy_fence(&fence).unwrap();
    h.device.destroy_surface(&surface).unwrap();
    assert_eq!(h.device.live_resource_count(), 0);

    let soft = h.soft.lock();
    assert_eq!(soft.live_buffers(), 0);
    assert_eq!(soft.live_textures(), 0);

    // Destroying twice only warns.
    drop(soft);
    h.device.destroy_sampler(&sampler).unwrap();
}

#[test]
fn test_query_sets() {
    let h = Harness::with_capabilities(Capabilities {
        timestamp_query: true,
        ..Capabilities::default()
    });
    let queries = h
        .device
        .create_query_set(&QuerySetDescriptor {
            label: Some("frame timing"),
            ty: QueryType::Timestamp,
            count: 8,
        })
        .unwrap();
    assert_eq!(queries.count(), 8);
    assert_eq!(queries.ty(), QueryType::Timestamp);
    assert_eq!(h.device.live_resource_count(), 1);
    h.device.destroy_query_set(&queries).unwrap();
    assert_eq!(h.device.live_resource_count(), 0);
}

#[test]
fn test_capabilities_come_from_the_context() {
    let h = Harness::with_capabilities(Capabilities::es30());
    let caps = h.device.capabilities();
    assert!(!caps.compute);
    assert!(!caps.indirect_draw);
    assert!(!caps.base_vertex);
    assert_eq!(caps, Capabilities::es30());
    assert_ne!(h.device.id(), 0);
}
