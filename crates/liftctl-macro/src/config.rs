use liftctl_frame::AfMode;

/// Limits applied when loading macro files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroConfig {
    /// Maximum bytes read from a macro file.
    pub max_file_size: usize,
    /// Maximum number of rows accepted from a macro file.
    pub max_rows: usize,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
            max_rows: 10_000,
        }
    }
}

/// Device context used while validating rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationOptions {
    /// When set, access channels must belong to this A/F mode.
    pub enforce_access_mode: Option<AfMode>,
    /// Channel number used for rows that leave the channel cell empty.
    pub default_channel: u16,
}
