/// Default scratch capacity for a [`MessageBuilder`](crate::MessageBuilder): 16 KiB.
pub const DEFAULT_BUILDER_CAPACITY: usize = 16 * 1024;

/// Default largest message the verifier will look at: 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Controls envelope encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Initial capacity of the scratch buffers.
    pub capacity: usize,
    /// When true, payload fields holding their zero value are still encoded.
    pub force_defaults: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUILDER_CAPACITY,
            force_defaults: true,
        }
    }
}

/// Controls envelope verification and payload schema loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConfig {
    /// When true, payload schemas reject properties they do not declare.
    pub strict_mode: bool,
    /// When true, kinds without a payload schema fail verification.
    pub fail_on_missing_schema: bool,
    /// Maximum number of schemas loaded from a directory.
    pub max_schemas_from_directory: usize,
    /// Maximum bytes allowed per schema file loaded from a directory.
    pub max_schema_file_size: usize,
    /// Messages larger than this are rejected before parsing.
    pub max_message_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            fail_on_missing_schema: false,
            max_schemas_from_directory: 64,
            max_schema_file_size: 256 * 1024,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
