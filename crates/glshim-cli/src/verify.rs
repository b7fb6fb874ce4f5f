use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context};
use parking_lot::Mutex;
use serde::Serialize;

use glshim_backend::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindingResource,
    Buffer, BufferBinding, BufferDescriptor, Command, CommandBuffer, CommandEncoder,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipelineDescriptor, Device,
    NativeProgram, Queue, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipelineDescriptor, SharedContext, SoftContext, Texture, TextureBufferCopy,
    TextureDataLayout, TextureDescriptor, TextureView, TextureViewDescriptor,
};
use glshim_core::GlShimConfig;
use glshim_types::{
    BindGroupLayoutEntry, BindingType, BufferBindingType, BufferUsages, Color, ColorTargetState,
    ColorWrites, MultisampleState, Operations, Origin3d, PrimitiveState, ShaderStages,
    TextureFormat,
};

// ── Check result types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

type Scenario = fn(&GlShimConfig) -> anyhow::Result<Vec<String>>;

const SCENARIOS: &[(&str, Scenario)] = &[
    ("Compute recording", compute_recording),
    ("Clear recording", clear_recording),
    ("Indirect dispatch", indirect_dispatch),
    ("Surface clear", surface_clear),
    ("MSAA resolve", msaa_resolve),
    ("Readback flip", readback_flip),
    ("Fence signaling", fence_signaling),
    ("Buffer round trip", buffer_round_trip),
];

// ── Main entry point ────────────────────────────────────────────────────────

pub fn run_verify(config: &GlShimConfig, json: bool) -> anyhow::Result<()> {
    let results: Vec<CheckResult> = SCENARIOS
        .iter()
        .map(|(name, scenario)| match scenario(config) {
            Ok(details) => CheckResult {
                name: name.to_string(),
                status: CheckStatus::Pass,
                message: "ok".to_string(),
                details,
            },
            Err(e) => {
                tracing::warn!(scenario = *name, "check failed: {:#}", e);
                CheckResult {
                    name: name.to_string(),
                    status: CheckStatus::Fail,
                    message: format!("{:#}", e),
                    details: Vec::new(),
                }
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string(&results)?);
    } else {
        print_results_pretty(&results);
    }

    // Exit code 1 if any failures
    if results
        .iter()
        .any(|r| matches!(r.status, CheckStatus::Fail))
    {
        std::process::exit(1);
    }

    Ok(())
}

// ── Fixtures ────────────────────────────────────────────────────────────────

/// A device opened on a fresh software context that stays inspectable.
struct Rig {
    soft: Arc<Mutex<SoftContext>>,
    device: Device,
    queue: Queue,
}

impl Rig {
    fn open(config: &GlShimConfig) -> anyhow::Result<Self> {
        let soft = Arc::new(Mutex::new(SoftContext::new(
            config.surface.width,
            config.surface.height,
        )));
        let context: SharedContext = soft.clone();
        let (device, queue) = Device::open(context, config)?;
        Ok(Self {
            soft,
            device,
            queue,
        })
    }

    fn encoder(&self) -> anyhow::Result<CommandEncoder> {
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        encoder.begin_encoding(Some("verify"))?;
        Ok(encoder)
    }

    fn submit(&self, encoder: &mut CommandEncoder) -> anyhow::Result<()> {
        let buffer = encoder.end_encoding()?;
        self.queue.submit([buffer], None)?;
        Ok(())
    }

    fn buffer(&self, size: u64, usage: BufferUsages) -> anyhow::Result<Arc<Buffer>> {
        Ok(self.device.create_buffer(&BufferDescriptor {
            label: None,
            size,
            usage,
        })?)
    }

    fn render_target(
        &self,
        width: u32,
        height: u32,
        samples: u32,
    ) -> anyhow::Result<(Arc<Texture>, Arc<TextureView>)> {
        let texture = self.device.create_texture(&TextureDescriptor::render_target(
            None,
            width,
            height,
            TextureFormat::Rgba8Unorm,
            samples,
        ))?;
        let view = self
            .device
            .create_texture_view(&texture, &TextureViewDescriptor::default())?;
        Ok((texture, view))
    }

    fn uniform_group(&self, buffer: &Arc<Buffer>, dynamic: bool) -> anyhow::Result<Arc<BindGroup>> {
        let entries = [BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: None,
            },
        }];
        let layout = self
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            })?;
        Ok(self.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: buffer.clone(),
                    offset: 0,
                    size: NonZeroU64::new(64),
                }),
            }],
        })?)
    }
}

fn program(raw: u32) -> anyhow::Result<NativeProgram> {
    NativeProgram::from_raw(raw).context("program name must be non-zero")
}

fn all_texels(data: &[u8], texel: [u8; 4]) -> bool {
    !data.is_empty() && data.chunks_exact(4).all(|t| t == texel)
}

fn color_attachment<'a>(
    view: &'a Arc<TextureView>,
    resolve_target: Option<&'a Arc<TextureView>>,
    ops: Operations<Color>,
) -> [Option<RenderPassColorAttachment<'a>>; 1] {
    [Some(RenderPassColorAttachment {
        view,
        resolve_target,
        ops,
    })]
}

// ── Recording scenarios ─────────────────────────────────────────────────────

fn compute_recording(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let pipeline = rig.device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some("verify compute"),
        program: program(1)?,
        bind_group_layouts: Vec::new(),
    })?;
    let g = rig.uniform_group(&rig.buffer(256, BufferUsages::UNIFORM)?, false)?;
    let g2 = rig.uniform_group(&rig.buffer(512, BufferUsages::UNIFORM)?, true)?;

    let mut encoder = rig.encoder()?;
    {
        let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor::default())?;
        pass.set_pipeline(Some(&pipeline))?;
        pass.set_bind_group(0, Some(&g), &[])?;
        pass.set_bind_group(1, Some(&g2), &[128])?;
        pass.dispatch(64, 64, 1);
        pass.end();
    }
    let buffer = encoder.end_encoding()?;
    let kinds = buffer.kinds();
    ensure!(
        kinds == ["UseProgram", "BindGroup", "BindGroup", "Dispatch"],
        "recorded {:?}",
        kinds
    );
    match &buffer.commands()[2] {
        Command::BindGroup {
            index: 1,
            dynamic_offsets,
            ..
        } if dynamic_offsets.as_slice() == [128] => {}
        other => anyhow::bail!("second bind group recorded as {:?}", other),
    }
    Ok(vec![format!("Commands: {}", kinds.join(" → "))])
}

fn clear_recording(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let (_texture, view) = rig.render_target(16, 16, 1)?;
    let pipeline = rig.device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("verify draw"),
        program: program(2)?,
        bind_group_layouts: Vec::new(),
        vertex_buffers: Vec::new(),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        targets: vec![Some(ColorTargetState {
            format: TextureFormat::Rgba8Unorm,
            blend: None,
            write_mask: ColorWrites::ALL,
        })],
    })?;
    let clear = Color::new(1.0, 0.5, 0.25, 1.0);

    let mut encoder = rig.encoder()?;
    {
        let attachments = color_attachment(&view, None, Operations::clear(clear));
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            color_attachments: &attachments,
            ..Default::default()
        })?;
        pass.set_pipeline(Some(&pipeline))?;
        pass.draw(3, 1, 0, 0);
    }
    let buffer = encoder.end_encoding()?;

    let clears: Vec<usize> = positions(&buffer, "ClearColor");
    let draws: Vec<usize> = positions(&buffer, "Draw");
    ensure!(clears.len() == 1, "expected one clear, got {}", clears.len());
    ensure!(
        draws.first().is_some_and(|&d| clears[0] < d),
        "clear not recorded before the first draw"
    );
    match &buffer.commands()[clears[0]] {
        Command::ClearColor { color } if *color == clear => {}
        other => anyhow::bail!("clear recorded as {:?}", other),
    }
    Ok(vec![format!("{} commands recorded", buffer.len())])
}

fn positions(buffer: &CommandBuffer, kind: &str) -> Vec<usize> {
    buffer
        .kinds()
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == kind)
        .map(|(i, _)| i)
        .collect()
}

fn indirect_dispatch(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let args = rig.buffer(128, BufferUsages::INDIRECT)?;

    let mut encoder = rig.encoder()?;
    encoder
        .begin_compute_pass(&ComputePassDescriptor::default())?
        .dispatch_indirect(Some(&args), 64)?;
    let buffer = encoder.end_encoding()?;
    match buffer.commands() {
        [Command::DispatchIndirect { buffer, offset: 64 }] if Arc::ptr_eq(buffer, &args) => {}
        other => anyhow::bail!("recorded {:?}", other),
    }

    encoder.begin_encoding(None)?;
    encoder
        .begin_compute_pass(&ComputePassDescriptor::default())?
        .dispatch_indirect(None, 64)?;
    let buffer = encoder.end_encoding()?;
    ensure!(
        buffer.is_empty(),
        "null buffer recorded {:?}",
        buffer.kinds()
    );
    Ok(Vec::new())
}

// ── Replay scenarios ────────────────────────────────────────────────────────

fn surface_clear(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let surface = rig.device.create_surface()?;
    let view = surface.acquire_texture();

    let mut encoder = rig.encoder()?;
    {
        let attachments = color_attachment(&view, None, Operations::clear(Color::WHITE));
        encoder
            .begin_render_pass(&RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &attachments,
                ..Default::default()
            })?
            .end();
    }
    rig.submit(&mut encoder)?;
    rig.queue.present(&surface)?;

    let soft = rig.soft.lock();
    ensure!(
        all_texels(soft.surface_texels(), [255; 4]),
        "surface not cleared to white"
    );
    ensure!(soft.present_count() == 1, "present not forwarded");
    let (width, height) = surface.size();
    Ok(vec![format!("Surface: {}x{}", width, height)])
}

fn msaa_resolve(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let (_, msaa_view) = rig.render_target(16, 16, 4)?;
    let (resolved, resolved_view) = rig.render_target(16, 16, 1)?;
    let readback = rig.buffer(16 * 16 * 4, BufferUsages::COPY_DST | BufferUsages::MAP_READ)?;

    let mut encoder = rig.encoder()?;
    {
        let attachments = color_attachment(
            &msaa_view,
            Some(&resolved_view),
            Operations::clear(Color::new(0.0, 0.0, 1.0, 1.0)),
        );
        encoder
            .begin_render_pass(&RenderPassDescriptor {
                label: Some("msaa"),
                color_attachments: &attachments,
                ..Default::default()
            })?
            .end();
    }
    encoder.copy_texture_to_buffer(
        Some(&resolved),
        Some(&readback),
        &[TextureBufferCopy::full(16, 16)],
    )?;
    rig.submit(&mut encoder)?;

    let mut out = vec![0u8; 16 * 16 * 4];
    rig.queue.read_buffer(&readback, 0, &mut out)?;
    ensure!(
        all_texels(&out, [0, 0, 255, 255]),
        "resolved texels are not blue"
    );
    ensure!(
        rig.queue.execution_error_count() == 0,
        "replay raised {} execution errors",
        rig.queue.execution_error_count()
    );
    Ok(vec!["4x multisampled target resolved into 16x16".to_string()])
}

fn readback_flip(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let (width, height) = (4u32, 3u32);
    let (texture, _) = rig.render_target(width, height, 1)?;

    // Texel (x, y) is [y, x, 0, 255], top row first.
    let mut image = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            image.extend_from_slice(&[y as u8, x as u8, 0, 255]);
        }
    }
    rig.queue.write_texture(
        &texture,
        0,
        Origin3d::ZERO,
        &image,
        TextureDataLayout::default(),
        width,
        height,
    )?;

    let readback = rig.buffer(image.len() as u64, BufferUsages::COPY_DST | BufferUsages::MAP_READ)?;
    let mut encoder = rig.encoder()?;
    encoder.copy_texture_to_buffer(
        Some(&texture),
        Some(&readback),
        &[TextureBufferCopy::full(width, height)],
    )?;
    rig.submit(&mut encoder)?;

    let mut out = vec![0u8; image.len()];
    rig.queue.read_buffer(&readback, 0, &mut out)?;
    ensure!(out == image, "row order not preserved by upload and readback");

    let soft = rig.soft.lock();
    let stored = soft
        .texture_texels(texture.raw())
        .context("texture storage missing")?;
    let row = (width * 4) as usize;
    ensure!(
        stored[..row] == image[image.len() - row..],
        "native storage is not bottom row first"
    );
    Ok(vec![format!("{}x{} image round-tripped", width, height)])
}

fn fence_signaling(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let fence = rig.device.create_fence()?;

    rig.queue
        .submit(std::iter::empty::<CommandBuffer>(), Some((&fence, 3)))?;
    ensure!(fence.value() == 3, "fence at {} after submit", fence.value());
    ensure!(
        rig.device.wait(&fence, 3, Duration::from_millis(10))?,
        "wait for a reached value timed out"
    );
    ensure!(
        !rig.device.wait(&fence, 4, Duration::from_millis(10))?,
        "wait for an unreached value succeeded"
    );

    fence.signal(1);
    ensure!(fence.value() == 3, "fence moved backwards to {}", fence.value());
    Ok(vec![format!("Fence value: {}", fence.value())])
}

fn buffer_round_trip(config: &GlShimConfig) -> anyhow::Result<Vec<String>> {
    let rig = Rig::open(config)?;
    let buffer = rig.buffer(64, BufferUsages::COPY_DST | BufferUsages::MAP_READ)?;
    let payload: Vec<u8> = (1..=32).collect();

    rig.queue.write_buffer(&buffer, 16, &payload)?;
    let mut out = vec![0u8; payload.len()];
    rig.queue.read_buffer(&buffer, 16, &mut out)?;
    ensure!(out == payload, "read back {:?}", out);

    ensure!(
        rig.queue.write_buffer(&buffer, 48, &payload).is_err(),
        "out-of-range write accepted"
    );
    Ok(vec![format!("{} bytes at offset 16", payload.len())])
}

// ── Output formatters ───────────────────────────────────────────────────────

fn print_results_pretty(results: &[CheckResult]) {
    println!();
    println!("glshim Conformance Verification");
    println!("===============================");
    println!();

    let mut pass_count = 0u32;
    let mut fail_count = 0u32;

    for result in results {
        let (icon, color_start, color_end) = match result.status {
            CheckStatus::Pass => {
                pass_count += 1;
                ("[PASS]", "\x1b[32m", "\x1b[0m")
            }
            CheckStatus::Fail => {
                fail_count += 1;
                ("[FAIL]", "\x1b[31m", "\x1b[0m")
            }
        };

        println!(
            "  {}{}{} {} - {}",
            color_start, icon, color_end, result.name, result.message
        );

        for detail in &result.details {
            println!("         {}", detail);
        }
    }

    println!();
    println!("-------------------------------");
    println!("  {} passed, {} failed", pass_count, fail_count);
    println!();
}
