//! Integration test: fixed-function state translation
//!
//! Checks the exact state-op sequences produced for render pipelines,
//! without a context.
//!
//! Run with: cargo test --test pipeline_state_test -- --nocapture

use glshim_backend::native::consts;
use glshim_backend::pipeline_state::{stencil_reference_state, translate_render_state, StateOp};
use glshim_types::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, ColorTargetState, ColorWrites,
    CompareFunction, DepthBiasState, DepthStencilState, Face, FrontFace, MultisampleState,
    PrimitiveState, StencilFaceState, StencilOperation, StencilState, TextureFormat,
};

fn target(blend: Option<BlendState>, write_mask: ColorWrites) -> ColorTargetState {
    ColorTargetState {
        format: TextureFormat::Rgba8Unorm,
        blend,
        write_mask,
    }
}

fn depth_only(compare: CompareFunction, write: bool) -> DepthStencilState {
    DepthStencilState {
        format: TextureFormat::Depth32Float,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: StencilState::default(),
        bias: DepthBiasState::default(),
    }
}

#[test]
fn test_default_state_disables_everything() {
    let ops = translate_render_state(
        &PrimitiveState::default(),
        None,
        None,
        &MultisampleState::default(),
        0,
    );
    assert_eq!(
        ops,
        vec![
            StateOp::FrontFace(consts::CCW),
            StateOp::Disable(consts::CULL_FACE),
            StateOp::Disable(consts::DEPTH_TEST),
            StateOp::Disable(consts::POLYGON_OFFSET_FILL),
            StateOp::Disable(consts::STENCIL_TEST),
            StateOp::ColorMask([true; 4]),
            StateOp::Disable(consts::BLEND),
            StateOp::Disable(consts::SAMPLE_ALPHA_TO_COVERAGE),
        ]
    );
}

#[test]
fn test_cull_and_front_face() {
    let primitive = PrimitiveState {
        front_face: FrontFace::Cw,
        cull_mode: Some(Face::Front),
        ..PrimitiveState::default()
    };
    let ops = translate_render_state(&primitive, None, None, &MultisampleState::default(), 0);
    assert_eq!(
        &ops[..3],
        &[
            StateOp::FrontFace(consts::CW),
            StateOp::Enable(consts::CULL_FACE),
            StateOp::CullFace(consts::FRONT),
        ]
    );
}

#[test]
fn test_depth_always_without_writes_disables_the_test() {
    let ds = depth_only(CompareFunction::Always, false);
    let ops = translate_render_state(
        &PrimitiveState::default(),
        Some(&ds),
        None,
        &MultisampleState::default(),
        0,
    );
    assert!(ops.contains(&StateOp::Disable(consts::DEPTH_TEST)));
    assert!(ops.contains(&StateOp::DepthMask(false)));
    assert!(!ops.iter().any(|op| matches!(op, StateOp::DepthFunc(_))));

    // Writes still need the test enabled.
    let ds = depth_only(CompareFunction::Always, true);
    let ops = translate_render_state(
        &PrimitiveState::default(),
        Some(&ds),
        None,
        &MultisampleState::default(),
        0,
    );
    assert!(ops.contains(&StateOp::Enable(consts::DEPTH_TEST)));
    assert!(ops.contains(&StateOp::DepthFunc(consts::ALWAYS)));
}

#[test]
fn test_depth_bias_maps_to_polygon_offset() {
    let ds = DepthStencilState {
        bias: DepthBiasState {
            constant: 2,
            slope_scale: 1.5,
            clamp: 0.0,
        },
        ..depth_only(CompareFunction::LessEqual, true)
    };
    let ops = translate_render_state(
        &PrimitiveState::default(),
        Some(&ds),
        None,
        &MultisampleState::default(),
        0,
    );
    let at = ops
        .iter()
        .position(|op| *op == StateOp::Enable(consts::POLYGON_OFFSET_FILL))
        .expect("polygon offset not enabled");
    assert_eq!(
        ops[at + 1],
        StateOp::PolygonOffset {
            factor: 1.5,
            units: 2.0,
        }
    );
    assert!(ops.contains(&StateOp::DepthFunc(consts::LEQUAL)));
}

#[test]
fn test_stencil_faces_are_set_separately() {
    let ds = DepthStencilState {
        stencil: StencilState {
            front: StencilFaceState {
                compare: CompareFunction::NotEqual,
                fail_op: StencilOperation::Zero,
                depth_fail_op: StencilOperation::IncrementClamp,
                pass_op: StencilOperation::IncrementWrap,
            },
            back: StencilFaceState {
                compare: CompareFunction::Greater,
                fail_op: StencilOperation::Invert,
                depth_fail_op: StencilOperation::DecrementClamp,
                pass_op: StencilOperation::DecrementWrap,
            },
            read_mask: 0x7f,
            write_mask: 0xf0,
        },
        ..depth_only(CompareFunction::Less, false)
    };
    let ops = translate_render_state(
        &PrimitiveState::default(),
        Some(&ds),
        None,
        &MultisampleState::default(),
        3,
    );
    let stencil: Vec<StateOp> = ops
        .iter()
        .skip_while(|op| **op != StateOp::Enable(consts::STENCIL_TEST))
        .take(7)
        .copied()
        .collect();
    assert_eq!(
        stencil,
        vec![
            StateOp::Enable(consts::STENCIL_TEST),
            StateOp::StencilFunc {
                face: consts::FRONT,
                func: consts::NOTEQUAL,
                reference: 3,
                read_mask: 0x7f,
            },
            StateOp::StencilOp {
                face: consts::FRONT,
                fail: consts::ZERO,
                depth_fail: consts::INCR,
                pass: consts::INCR_WRAP,
            },
            StateOp::StencilMask {
                face: consts::FRONT,
                mask: 0xf0,
            },
            StateOp::StencilFunc {
                face: consts::BACK,
                func: consts::GREATER,
                reference: 3,
                read_mask: 0x7f,
            },
            StateOp::StencilOp {
                face: consts::BACK,
                fail: consts::INVERT,
                depth_fail: consts::DECR,
                pass: consts::DECR_WRAP,
            },
            StateOp::StencilMask {
                face: consts::BACK,
                mask: 0xf0,
            },
        ]
    );

    let update = stencil_reference_state(Some(&ds), 200);
    assert_eq!(update.len(), 2);
    assert!(update.iter().all(|op| matches!(
        op,
        StateOp::StencilFunc {
            reference: 200,
            read_mask: 0x7f,
            ..
        }
    )));
}

#[test]
fn test_stencil_reference_ignored_without_stencil() {
    assert!(stencil_reference_state(None, 5).is_empty());
    let ds = depth_only(CompareFunction::Less, true);
    assert!(stencil_reference_state(Some(&ds), 5).is_empty());
}

#[test]
fn test_blend_and_write_mask_follow_first_target() {
    let additive = BlendState {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::Zero,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Max,
        },
    };
    let first = target(Some(additive), ColorWrites::RED | ColorWrites::ALPHA);
    let ops = translate_render_state(
        &PrimitiveState::default(),
        None,
        Some(&first),
        &MultisampleState::default(),
        0,
    );
    assert!(ops.contains(&StateOp::ColorMask([true, false, false, true])));
    assert!(ops.contains(&StateOp::Enable(consts::BLEND)));
    assert!(ops.contains(&StateOp::BlendEquation {
        color: consts::FUNC_ADD,
        alpha: consts::MAX,
    }));
    assert!(ops.contains(&StateOp::BlendFunc {
        src_rgb: consts::ONE,
        dst_rgb: consts::ONE,
        src_alpha: consts::ZERO,
        dst_alpha: consts::ONE,
    }));
}

#[test]
fn test_alpha_to_coverage() {
    let multisample = MultisampleState {
        count: 4,
        alpha_to_coverage_enabled: true,
        ..MultisampleState::default()
    };
    let ops = translate_render_state(&PrimitiveState::default(), None, None, &multisample, 0);
    assert_eq!(
        ops.last(),
        Some(&StateOp::Enable(consts::SAMPLE_ALPHA_TO_COVERAGE))
    );
}
