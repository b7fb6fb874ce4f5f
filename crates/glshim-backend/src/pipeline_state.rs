//! Translation of a render pipeline's fixed-function state into native
//! state-setting calls.
//!
//! Translation is split from application so the exact call sequence for a
//! pipeline can be inspected without a context.

use glshim_types::{
    BlendState, ColorTargetState, ColorWrites, DepthStencilState, MultisampleState,
    PrimitiveState, StencilFaceState, StencilState,
};

use crate::context::GlContext;
use crate::conv;
use crate::native::consts;
use crate::resource::RenderPipeline;

/// One native state-setting call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateOp {
    Enable(u32),
    Disable(u32),
    CullFace(u32),
    FrontFace(u32),
    DepthFunc(u32),
    DepthMask(bool),
    PolygonOffset {
        factor: f32,
        units: f32,
    },
    StencilFunc {
        face: u32,
        func: u32,
        reference: u32,
        read_mask: u32,
    },
    StencilOp {
        face: u32,
        fail: u32,
        depth_fail: u32,
        pass: u32,
    },
    StencilMask {
        face: u32,
        mask: u32,
    },
    ColorMask([bool; 4]),
    BlendEquation {
        color: u32,
        alpha: u32,
    },
    BlendFunc {
        src_rgb: u32,
        dst_rgb: u32,
        src_alpha: u32,
        dst_alpha: u32,
    },
}

impl StateOp {
    pub fn apply(&self, gl: &mut dyn GlContext) {
        match *self {
            StateOp::Enable(cap) => gl.enable(cap),
            StateOp::Disable(cap) => gl.disable(cap),
            StateOp::CullFace(face) => gl.cull_face(face),
            StateOp::FrontFace(mode) => gl.front_face(mode),
            StateOp::DepthFunc(func) => gl.depth_func(func),
            StateOp::DepthMask(write) => gl.depth_mask(write),
            StateOp::PolygonOffset { factor, units } => gl.polygon_offset(factor, units),
            StateOp::StencilFunc {
                face,
                func,
                reference,
                read_mask,
            } => gl.stencil_func_separate(face, func, reference as i32, read_mask),
            StateOp::StencilOp {
                face,
                fail,
                depth_fail,
                pass,
            } => gl.stencil_op_separate(face, fail, depth_fail, pass),
            StateOp::StencilMask { face, mask } => gl.stencil_mask_separate(face, mask),
            StateOp::ColorMask([r, g, b, a]) => gl.color_mask(r, g, b, a),
            StateOp::BlendEquation { color, alpha } => gl.blend_equation_separate(color, alpha),
            StateOp::BlendFunc {
                src_rgb,
                dst_rgb,
                src_alpha,
                dst_alpha,
            } => gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha),
        }
    }
}

pub fn apply_all(ops: &[StateOp], gl: &mut dyn GlContext) {
    for op in ops {
        op.apply(gl);
    }
}

/// Full state for a pipeline with the given stencil reference.
pub fn render_pipeline_state(pipeline: &RenderPipeline, stencil_reference: u32) -> Vec<StateOp> {
    translate_render_state(
        &pipeline.primitive,
        pipeline.depth_stencil.as_ref(),
        pipeline.targets.first().copied().flatten().as_ref(),
        &pipeline.multisample,
        stencil_reference,
    )
}

/// Translate fixed-function state. Only the first color target contributes
/// blend and write-mask state; the native API has one blend unit per
/// context.
pub fn translate_render_state(
    primitive: &PrimitiveState,
    depth_stencil: Option<&DepthStencilState>,
    target: Option<&ColorTargetState>,
    multisample: &MultisampleState,
    stencil_reference: u32,
) -> Vec<StateOp> {
    let mut ops = Vec::with_capacity(16);

    ops.push(StateOp::FrontFace(conv::front_face(primitive.front_face)));
    match primitive.cull_mode {
        Some(face) => {
            ops.push(StateOp::Enable(consts::CULL_FACE));
            ops.push(StateOp::CullFace(conv::cull_face(face)));
        }
        None => ops.push(StateOp::Disable(consts::CULL_FACE)),
    }

    match depth_stencil {
        Some(ds) => {
            depth_ops(ds, &mut ops);
            stencil_ops(&ds.stencil, stencil_reference, &mut ops);
        }
        None => {
            ops.push(StateOp::Disable(consts::DEPTH_TEST));
            ops.push(StateOp::Disable(consts::POLYGON_OFFSET_FILL));
            ops.push(StateOp::Disable(consts::STENCIL_TEST));
        }
    }

    let write_mask = target.map_or(ColorWrites::ALL, |t| t.write_mask);
    ops.push(StateOp::ColorMask(color_mask(write_mask)));
    match target.and_then(|t| t.blend) {
        Some(blend) => blend_ops(&blend, &mut ops),
        None => ops.push(StateOp::Disable(consts::BLEND)),
    }

    ops.push(if multisample.alpha_to_coverage_enabled {
        StateOp::Enable(consts::SAMPLE_ALPHA_TO_COVERAGE)
    } else {
        StateOp::Disable(consts::SAMPLE_ALPHA_TO_COVERAGE)
    });

    ops
}

/// Stencil compare state for a new reference value. Empty when the
/// pipeline does not test stencil.
pub fn stencil_reference_state(
    depth_stencil: Option<&DepthStencilState>,
    reference: u32,
) -> Vec<StateOp> {
    let Some(ds) = depth_stencil.filter(|ds| ds.stencil.is_enabled()) else {
        return Vec::new();
    };
    vec![
        stencil_func(consts::FRONT, &ds.stencil.front, &ds.stencil, reference),
        stencil_func(consts::BACK, &ds.stencil.back, &ds.stencil, reference),
    ]
}

fn depth_ops(ds: &DepthStencilState, ops: &mut Vec<StateOp>) {
    if ds.is_depth_enabled() {
        ops.push(StateOp::Enable(consts::DEPTH_TEST));
        ops.push(StateOp::DepthFunc(conv::compare_function(ds.depth_compare)));
    } else {
        ops.push(StateOp::Disable(consts::DEPTH_TEST));
    }
    ops.push(StateOp::DepthMask(ds.depth_write_enabled));

    if ds.bias.is_enabled() {
        ops.push(StateOp::Enable(consts::POLYGON_OFFSET_FILL));
        ops.push(StateOp::PolygonOffset {
            factor: ds.bias.slope_scale,
            units: ds.bias.constant as f32,
        });
    } else {
        ops.push(StateOp::Disable(consts::POLYGON_OFFSET_FILL));
    }
}

fn stencil_ops(stencil: &StencilState, reference: u32, ops: &mut Vec<StateOp>) {
    if !stencil.is_enabled() {
        ops.push(StateOp::Disable(consts::STENCIL_TEST));
        return;
    }
    ops.push(StateOp::Enable(consts::STENCIL_TEST));
    for (face, state) in [
        (consts::FRONT, &stencil.front),
        (consts::BACK, &stencil.back),
    ] {
        ops.push(stencil_func(face, state, stencil, reference));
        ops.push(StateOp::StencilOp {
            face,
            fail: conv::stencil_op(state.fail_op),
            depth_fail: conv::stencil_op(state.depth_fail_op),
            pass: conv::stencil_op(state.pass_op),
        });
        ops.push(StateOp::StencilMask {
            face,
            mask: stencil.write_mask,
        });
    }
}

fn stencil_func(
    face: u32,
    state: &StencilFaceState,
    stencil: &StencilState,
    reference: u32,
) -> StateOp {
    StateOp::StencilFunc {
        face,
        func: conv::compare_function(state.compare),
        reference,
        read_mask: stencil.read_mask,
    }
}

fn blend_ops(blend: &BlendState, ops: &mut Vec<StateOp>) {
    ops.push(StateOp::Enable(consts::BLEND));
    ops.push(StateOp::BlendEquation {
        color: conv::blend_equation(blend.color.operation),
        alpha: conv::blend_equation(blend.alpha.operation),
    });
    ops.push(StateOp::BlendFunc {
        src_rgb: conv::blend_factor(blend.color.src_factor),
        dst_rgb: conv::blend_factor(blend.color.dst_factor),
        src_alpha: conv::blend_factor(blend.alpha.src_factor),
        dst_alpha: conv::blend_factor(blend.alpha.dst_factor),
    });
}

pub(crate) fn color_mask(mask: ColorWrites) -> [bool; 4] {
    [
        mask.contains(ColorWrites::RED),
        mask.contains(ColorWrites::GREEN),
        mask.contains(ColorWrites::BLUE),
        mask.contains(ColorWrites::ALPHA),
    ]
}
