//! Replays a bind group onto indexed binding points and texture units.
//!
//! Binding numbers map directly to native binding points: a buffer at
//! binding `n` lands on uniform or storage index `n`, a texture view at
//! binding `n` lands on texture unit `n`.

use tracing::warn;

use crate::context::GlContext;
use crate::native::consts;
use crate::resource::{BindGroup, BindingResource, ViewSource};

pub(crate) fn bind_group(
    gl: &mut dyn GlContext,
    index: u32,
    group: &BindGroup,
    dynamic_offsets: &[u32],
) {
    let mut offsets = dynamic_offsets.iter().copied();

    for entry in &group.entries {
        match &entry.resource {
            BindingResource::Buffer(binding) => {
                let dynamic = group
                    .layout
                    .entry(entry.binding)
                    .is_some_and(|e| e.ty.has_dynamic_offset());
                let mut offset = binding.offset;
                if dynamic {
                    match offsets.next() {
                        Some(extra) => offset += u64::from(extra),
                        None => warn!(
                            group = index,
                            binding = entry.binding,
                            "missing dynamic offset, binding at base offset"
                        ),
                    }
                }

                let target = group.layout.buffer_target(entry.binding);
                let raw = Some(binding.buffer.raw);
                match binding.size {
                    Some(size) => {
                        gl.bind_buffer_range(target, entry.binding, raw, offset, size.get())
                    }
                    None if offset == 0 => gl.bind_buffer_base(target, entry.binding, raw),
                    None => {
                        let rest = binding.buffer.size.saturating_sub(offset);
                        gl.bind_buffer_range(target, entry.binding, raw, offset, rest);
                    }
                }
            }
            BindingResource::TextureView(view) => match &view.source {
                ViewSource::Texture(texture) => {
                    gl.active_texture(consts::TEXTURE0 + entry.binding);
                    gl.bind_texture(texture.target, Some(texture.raw));
                }
                ViewSource::Surface { .. } => warn!(
                    group = index,
                    binding = entry.binding,
                    "surface views cannot be sampled, skipping"
                ),
            },
            // Sampler state rides on the texture.
            BindingResource::Sampler(_) => {}
        }
    }

    if offsets.next().is_some() {
        warn!(group = index, "more dynamic offsets supplied than the layout consumes");
    }
}
