use glshim_types::ResourceType;

/// Errors surfaced by the compatibility backend.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// Encoder state-machine misuse, e.g. ending an encoder that is not recording.
    #[error("recording state error: {0}")]
    RecordingState(String),

    /// A resource argument is not the kind expected, or was created by another device.
    #[error("resource type error: expected {expected}, {reason}")]
    ResourceType {
        expected: ResourceType,
        reason: String,
    },

    /// The live context lacks a capability the operation needs.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A lazily created framebuffer failed completeness validation.
    #[error("framebuffer incomplete: status=0x{status:04x}")]
    FramebufferIncomplete { status: u32 },

    /// A replayed command left the context's error flag set.
    #[error("execution error: command {index} ({kind}) raised 0x{code:04x}")]
    Execution {
        index: usize,
        kind: &'static str,
        code: u32,
    },

    #[error("range out of bounds: offset={offset}, len={len}, size={size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    #[error("native object creation failed: {0}")]
    ObjectCreation(String),

    #[error("device lost")]
    DeviceLost,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    pub fn foreign(expected: ResourceType, owner: u32, device: u32) -> Self {
        HalError::ResourceType {
            expected,
            reason: format!("got one owned by device {owner} on device {device}"),
        }
    }

    pub fn mismatch(expected: ResourceType, found: ResourceType, binding: u32) -> Self {
        HalError::ResourceType {
            expected,
            reason: format!("found {found} at binding {binding}"),
        }
    }

    /// Whether the device can keep operating after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HalError::DeviceLost)
    }
}

pub type HalResult<T> = Result<T, HalError>;
