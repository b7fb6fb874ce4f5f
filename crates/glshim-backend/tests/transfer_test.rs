//! Integration test: transfers, readback and render-target emulation
//!
//! Covers buffer writes and reads, texture uploads and readback with the row
//! flip, MSAA resolve, framebuffer fallback and fence signaling.
//!
//! Run with: cargo test --test transfer_test -- --nocapture

mod common;

use std::time::Duration;

use glshim_backend::{
    BufferCopy, CommandBuffer, RenderPassColorAttachment, RenderPassDescriptor, TextureBufferCopy,
    TextureDataLayout, TextureDescriptor,
};
use glshim_core::HalError;
use glshim_types::{BufferUsages, Color, Extent3d, Operations, Origin3d, TextureFormat};

use common::{all_texels, Harness};

/// A `width × height` RGBA8 image whose texel (x, y) is `[y, x, 7, 255]`,
/// top row first.
fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[y as u8, x as u8, 7, 255]);
        }
    }
    data
}

#[test]
fn test_buffer_write_then_read() {
    let h = Harness::new();
    let buffer = h.buffer(64, BufferUsages::MAP_READ | BufferUsages::COPY_DST);
    let payload: Vec<u8> = (1..=16).collect();
    h.queue.write_buffer(&buffer, 8, &payload).unwrap();

    let mut out = vec![0u8; 16];
    h.queue.read_buffer(&buffer, 8, &mut out).unwrap();
    assert_eq!(out, payload);
    assert_eq!(buffer.shadow_len(), None, "plain writes must not allocate a shadow");

    let soft = h.soft.lock();
    let native = soft.buffer_contents(buffer.raw()).unwrap();
    assert_eq!(&native[8..24], payload.as_slice());
    assert!(native[..8].iter().all(|&b| b == 0));
}

#[test]
fn test_zero_length_transfers_are_noops() {
    let h = Harness::new();
    let buffer = h.buffer(16, BufferUsages::COPY_DST);
    h.soft.lock().take_calls();

    // Offsets past the end are fine when nothing is transferred.
    h.queue.write_buffer(&buffer, 64, &[]).unwrap();
    h.queue.read_buffer(&buffer, 64, &mut []).unwrap();
    assert!(h.soft.lock().calls().is_empty());
}

#[test]
fn test_out_of_range_buffer_access_fails() {
    let h = Harness::new();
    let buffer = h.buffer(16, BufferUsages::COPY_DST);
    match h.queue.write_buffer(&buffer, 12, &[0u8; 8]) {
        Err(HalError::OutOfRange { offset, len, size }) => {
            assert_eq!((offset, len, size), (12, 8, 16));
        }
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    let mut out = [0u8; 4];
    assert!(matches!(
        h.queue.read_buffer(&buffer, u64::MAX, &mut out),
        Err(HalError::OutOfRange { .. })
    ));
}

#[test]
fn test_clear_and_copy_buffer_replay() {
    let h = Harness::new();
    let src = h.buffer(32, BufferUsages::COPY_SRC | BufferUsages::COPY_DST);
    let dst = h.buffer(32, BufferUsages::COPY_DST | BufferUsages::MAP_READ);
    h.queue.write_buffer(&src, 0, &[0xAB; 32]).unwrap();
    h.queue.write_buffer(&dst, 0, &[0xCD; 32]).unwrap();

    let mut encoder = h.encoder();
    encoder.clear_buffer(Some(&src), 16, None).unwrap();
    encoder
        .copy_buffer_to_buffer(
            Some(&src),
            Some(&dst),
            &[BufferCopy {
                src_offset: 8,
                dst_offset: 0,
                size: 16,
            }],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = [0u8; 32];
    h.queue.read_buffer(&dst, 0, &mut out).unwrap();
    assert_eq!(&out[..8], &[0xAB; 8]);
    assert_eq!(&out[8..16], &[0; 8]);
    assert_eq!(&out[16..], &[0xCD; 16]);
}

#[test]
fn test_upload_stores_rows_bottom_first() {
    let h = Harness::new();
    let (texture, _) = h.render_target(4, 3, 1);
    let data = gradient(4, 3);
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &data,
            TextureDataLayout::default(),
            4,
            3,
        )
        .unwrap();

    let soft = h.soft.lock();
    let native = soft.texture_texels(texture.raw()).unwrap();
    let row = 4 * 4;
    // The caller's last row is the native bottom row.
    assert_eq!(&native[..row], &data[2 * row..]);
    assert_eq!(&native[2 * row..], &data[..row]);
}

#[test]
fn test_readback_restores_caller_row_order() {
    let h = Harness::new();
    let (texture, _) = h.render_target(4, 3, 1);
    let data = gradient(4, 3);
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &data,
            TextureDataLayout::default(),
            4,
            3,
        )
        .unwrap();
    let readback = h.buffer(96, BufferUsages::COPY_DST | BufferUsages::MAP_READ);

    let mut encoder = h.encoder();
    let region = TextureBufferCopy {
        bytes_per_row: Some(32),
        ..TextureBufferCopy::full(4, 3)
    };
    assert_eq!(region.required_bytes(), 80);
    encoder
        .copy_texture_to_buffer(Some(&texture), Some(&readback), &[region])
        .unwrap();
    h.submit(&mut encoder);

    let mut out = vec![0u8; 96];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    for row in 0..3 {
        let expected = &data[row * 16..(row + 1) * 16];
        assert_eq!(&out[row * 32..row * 32 + 16], expected, "row {row}");
        assert!(out[row * 32 + 16..row * 32 + 32].iter().all(|&b| b == 0));
    }
    assert!(texture.framebuffer().is_some(), "readback framebuffer not cached");
    assert_eq!(h.queue.execution_error_count(), 0);
}

#[test]
fn test_readback_of_subregion() {
    let h = Harness::new();
    let (texture, _) = h.render_target(4, 3, 1);
    let data = gradient(4, 3);
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &data,
            TextureDataLayout::default(),
            4,
            3,
        )
        .unwrap();
    let readback = h.buffer(16, BufferUsages::COPY_DST | BufferUsages::MAP_READ);

    let mut encoder = h.encoder();
    encoder
        .copy_texture_to_buffer(
            Some(&texture),
            Some(&readback),
            &[TextureBufferCopy {
                mip_level: 0,
                texture_origin: Origin3d { x: 1, y: 1, z: 0 },
                buffer_offset: 4,
                bytes_per_row: None,
                size: Extent3d::new_2d(2, 1),
            }],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = [0u8; 16];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    assert_eq!(&out[..4], &[0; 4]);
    assert_eq!(&out[4..8], &[1, 1, 7, 255]);
    assert_eq!(&out[8..12], &[1, 2, 7, 255]);
}

#[test]
fn test_bgra_round_trip() {
    let h = Harness::new();
    let (texture, _) = h.render_target_with_format(2, 2, 1, TextureFormat::Bgra8Unorm);
    let bgra: Vec<u8> = [10u8, 20, 30, 40].repeat(4);
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &bgra,
            TextureDataLayout::default(),
            2,
            2,
        )
        .unwrap();
    assert!(all_texels(
        h.soft.lock().texture_texels(texture.raw()).unwrap(),
        [30, 20, 10, 40]
    ));

    let readback = h.buffer(16, BufferUsages::COPY_DST | BufferUsages::MAP_READ);
    let mut encoder = h.encoder();
    encoder
        .copy_texture_to_buffer(
            Some(&texture),
            Some(&readback),
            &[TextureBufferCopy::full(2, 2)],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = [0u8; 16];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    assert_eq!(out.as_slice(), bgra.as_slice());
}

#[test]
fn test_shadowed_buffer_stays_coherent() {
    let h = Harness::new();
    let (texture, view) = h.render_target(2, 1, 1);
    let readback = h.buffer(16, BufferUsages::COPY_DST | BufferUsages::MAP_READ);
    let source = h.buffer(16, BufferUsages::COPY_SRC | BufferUsages::COPY_DST);
    h.queue.write_buffer(&source, 0, &[9u8; 16]).unwrap();

    let mut encoder = h.encoder();
    {
        let attachments = [Some(RenderPassColorAttachment {
            view: &view,
            resolve_target: None,
            ops: Operations::clear(Color::WHITE),
        })];
        encoder
            .begin_render_pass(&RenderPassDescriptor {
                color_attachments: &attachments,
                ..Default::default()
            })
            .unwrap()
            .end();
    }
    encoder
        .copy_texture_to_buffer(
            Some(&texture),
            Some(&readback),
            &[TextureBufferCopy::full(2, 1)],
        )
        .unwrap();
    h.submit(&mut encoder);
    assert_eq!(readback.shadow_len(), Some(16));

    // A direct write and a replayed copy both land in the shadow.
    h.queue.write_buffer(&readback, 0, &[1, 2, 3, 4]).unwrap();
    let mut encoder = h.encoder();
    encoder
        .copy_buffer_to_buffer(
            Some(&source),
            Some(&readback),
            &[BufferCopy {
                src_offset: 0,
                dst_offset: 12,
                size: 4,
            }],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = [0u8; 16];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    assert_eq!(&out[..4], &[1, 2, 3, 4]);
    assert_eq!(&out[4..8], &[255; 4]);
    assert_eq!(&out[12..], &[9; 4]);
}

#[test]
fn test_upload_validation() {
    let h = Harness::new();
    let (texture, _) = h.render_target(4, 4, 1);
    let (msaa, _) = h.render_target(4, 4, 4);
    let data = gradient(4, 4);

    match h.queue.write_texture(
        &texture,
        0,
        Origin3d { x: 2, y: 0, z: 0 },
        &data,
        TextureDataLayout::default(),
        4,
        4,
    ) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    match h.queue.write_texture(
        &texture,
        0,
        Origin3d::ZERO,
        &data[..32],
        TextureDataLayout::default(),
        4,
        4,
    ) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange for short data, got {:?}", other),
    }
    match h.queue.write_texture(
        &msaa,
        0,
        Origin3d::ZERO,
        &data,
        TextureDataLayout::default(),
        4,
        4,
    ) {
        Err(HalError::UnsupportedOperation(what)) => println!("rejected: {what}"),
        other => panic!("expected UnsupportedOperation, got {:?}", other),
    }
    // Empty regions succeed without touching the texture.
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &[],
            TextureDataLayout::default(),
            0,
            4,
        )
        .unwrap();
}

#[test]
fn test_region_origin_near_u32_max_is_out_of_range() {
    let h = Harness::new();
    let (texture, _) = h.render_target(4, 4, 1);
    let readback = h.buffer(16, BufferUsages::COPY_DST | BufferUsages::MAP_READ);

    for origin in [
        Origin3d { x: u32::MAX, y: 0, z: 0 },
        Origin3d { x: 0, y: u32::MAX, z: 0 },
    ] {
        match h.queue.write_texture(
            &texture,
            0,
            origin,
            &[0; 4],
            TextureDataLayout::default(),
            1,
            1,
        ) {
            Err(HalError::OutOfRange { .. }) => {}
            other => panic!("expected OutOfRange for {:?}, got {:?}", origin, other),
        }
    }
    match h.queue.write_texture(
        &texture,
        7,
        Origin3d::ZERO,
        &[0; 4],
        TextureDataLayout::default(),
        1,
        1,
    ) {
        Err(HalError::OutOfRange { offset, .. }) => assert_eq!(offset, 7),
        other => panic!("expected OutOfRange for mip 7, got {:?}", other),
    }

    let mut encoder = h.encoder();
    let overflowing = TextureBufferCopy {
        texture_origin: Origin3d { x: u32::MAX, y: 0, z: 0 },
        ..TextureBufferCopy::full(1, 1)
    };
    match encoder.copy_texture_to_buffer(Some(&texture), Some(&readback), &[overflowing]) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    let past_edge = TextureBufferCopy {
        texture_origin: Origin3d { x: 2, y: 3, z: 0 },
        ..TextureBufferCopy::full(2, 2)
    };
    match encoder.copy_texture_to_buffer(Some(&texture), Some(&readback), &[past_edge]) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    let missing_mip = TextureBufferCopy {
        mip_level: 5,
        ..TextureBufferCopy::full(1, 1)
    };
    match encoder.copy_texture_to_buffer(Some(&texture), Some(&readback), &[missing_mip]) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange for mip 5, got {:?}", other),
    }
    // A bad region rejects the whole copy.
    match encoder.copy_texture_to_buffer(
        Some(&texture),
        Some(&readback),
        &[TextureBufferCopy::full(4, 4), overflowing],
    ) {
        Err(HalError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    assert!(encoder.is_empty());
}

#[test]
fn test_failed_readback_region_does_not_stop_later_regions() {
    let h = Harness::new();
    let texture = h
        .device
        .create_texture(&TextureDescriptor {
            mip_level_count: 2,
            ..TextureDescriptor::render_target(None, 4, 4, TextureFormat::Rgba8Unorm, 1)
        })
        .unwrap();
    h.queue
        .write_texture(
            &texture,
            0,
            Origin3d::ZERO,
            &gradient(4, 4),
            TextureDataLayout::default(),
            4,
            4,
        )
        .unwrap();
    let readback = h.buffer(16, BufferUsages::COPY_DST | BufferUsages::MAP_READ);

    let mut encoder = h.encoder();
    encoder
        .copy_texture_to_buffer(
            Some(&texture),
            Some(&readback),
            &[
                // Mip levels past 0 cannot be read back.
                TextureBufferCopy {
                    mip_level: 1,
                    ..TextureBufferCopy::full(1, 1)
                },
                TextureBufferCopy {
                    mip_level: 0,
                    texture_origin: Origin3d { x: 1, y: 1, z: 0 },
                    buffer_offset: 8,
                    bytes_per_row: None,
                    size: Extent3d::new_2d(2, 1),
                },
            ],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = [0u8; 16];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    println!("readback: {:?}", out);
    assert_eq!(&out[..8], &[0; 8]);
    assert_eq!(&out[8..12], &[1, 1, 7, 255]);
    assert_eq!(&out[12..], &[1, 2, 7, 255]);
}

#[test]
fn test_msaa_resolve_then_readback() {
    let h = Harness::new();
    let (_, msaa_view) = h.render_target(16, 16, 4);
    let (resolved, resolved_view) = h.render_target(16, 16, 1);
    let readback = h.buffer(16 * 16 * 4, BufferUsages::COPY_DST | BufferUsages::MAP_READ);

    let mut encoder = h.encoder();
    {
        let attachments = [Some(RenderPassColorAttachment {
            view: &msaa_view,
            resolve_target: Some(&resolved_view),
            ops: Operations::clear(Color::new(0.0, 0.0, 1.0, 1.0)),
        })];
        encoder
            .begin_render_pass(&RenderPassDescriptor {
                label: Some("msaa"),
                color_attachments: &attachments,
                ..Default::default()
            })
            .unwrap()
            .end();
    }
    encoder
        .copy_texture_to_buffer(
            Some(&resolved),
            Some(&readback),
            &[TextureBufferCopy::full(16, 16)],
        )
        .unwrap();
    h.submit(&mut encoder);

    let mut out = vec![0u8; 16 * 16 * 4];
    h.queue.read_buffer(&readback, 0, &mut out).unwrap();
    assert!(all_texels(&out, [0, 0, 255, 255]));
    assert_eq!(h.queue.execution_error_count(), 0);

    let soft = h.soft.lock();
    let blits = soft
        .calls()
        .iter()
        .filter(|c| matches!(c, glshim_backend::GlCall::BlitFramebuffer { .. }))
        .count();
    assert_eq!(blits, 1);
}

#[test]
fn test_incomplete_framebuffer_falls_back_to_surface() {
    let h = Harness::new();
    let (texture, view) = h.render_target(8, 8, 1);
    h.soft.lock().set_force_incomplete_framebuffers(true);

    let mut encoder = h.encoder();
    {
        let attachments = [Some(RenderPassColorAttachment {
            view: &view,
            resolve_target: None,
            ops: Operations::clear(Color::new(1.0, 0.0, 0.0, 1.0)),
        })];
        encoder
            .begin_render_pass(&RenderPassDescriptor {
                color_attachments: &attachments,
                ..Default::default()
            })
            .unwrap()
            .end();
    }
    let buffer = h.finish(&mut encoder);
    h.queue
        .submit([buffer], None)
        .expect("incomplete framebuffers must not fail the submit");

    assert!(texture.framebuffer().is_none());
    let soft = h.soft.lock();
    assert_eq!(soft.live_framebuffers(), 0);
    assert!(all_texels(soft.surface_texels(), [255, 0, 0, 255]));
}

#[test]
fn test_framebuffer_cached_and_released_with_texture() {
    let h = Harness::new();
    let (texture, view) = h.render_target(8, 8, 1);

    for _ in 0..3 {
        let mut encoder = h.encoder();
        {
            let attachments = [Some(RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: Operations::clear(Color::BLACK),
            })];
            encoder
                .begin_render_pass(&RenderPassDescriptor {
                    color_attachments: &attachments,
                    ..Default::default()
                })
                .unwrap()
                .end();
        }
        h.submit(&mut encoder);
    }
    let cached = texture.framebuffer().expect("framebuffer not cached");
    assert_eq!(h.soft.lock().live_framebuffers(), 1);
    println!("cached framebuffer {}", cached.raw());

    h.device.destroy_texture(&texture).unwrap();
    assert!(texture.framebuffer().is_none());
    let soft = h.soft.lock();
    assert_eq!(soft.live_framebuffers(), 0);
    assert_eq!(soft.live_textures(), 0);
}

#[test]
fn test_fence_is_monotonic() {
    let h = Harness::new();
    let fence = h.device.create_fence().unwrap();
    assert_eq!(fence.value(), 0);

    for (signal, expected) in [(3, 3), (2, 3), (5, 5)] {
        let mut encoder = h.encoder();
        encoder.insert_debug_marker("tick").unwrap();
        let buffer = h.finish(&mut encoder);
        h.queue.submit([buffer], Some((&fence, signal))).unwrap();
        assert_eq!(fence.value(), expected);
    }

    assert!(h.device.wait(&fence, 5, Duration::ZERO).unwrap());
    assert!(h.device.wait(&fence, 1, Duration::ZERO).unwrap());
    assert!(!h.device.wait(&fence, 6, Duration::from_millis(5)).unwrap());

    fence.reset();
    assert_eq!(fence.value(), 0);
    assert!(!fence.wait(1));
}

#[test]
fn test_empty_submit_signals_fence() {
    let h = Harness::new();
    let fence = h.device.create_fence().unwrap();
    h.queue
        .submit(std::iter::empty::<CommandBuffer>(), Some((&fence, 1)))
        .unwrap();
    assert_eq!(fence.value(), 1);
}

#[test]
fn test_foreign_fence_is_rejected() {
    let h = Harness::new();
    let other = Harness::new();
    let fence = other.device.create_fence().unwrap();

    match h.queue.submit(std::iter::empty::<CommandBuffer>(), Some((&fence, 1))) {
        Err(HalError::ResourceType { reason, .. }) => println!("rejected: {reason}"),
        other => panic!("expected ResourceType, got {:?}", other),
    }
    assert_eq!(fence.value(), 0);
    assert!(h.device.wait(&fence, 0, Duration::ZERO).is_err());
}
