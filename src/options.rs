//! Decode options shared across the record and set decoders.

/// Decode mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// No local recovery: the first structural error aborts the call
    /// (spec §7's default policy).
    Strict,
    /// Optional sub-records (cache patches, ObjC fixups, must-be-missing
    /// paths) that fail to decode are skipped with a logged warning instead
    /// of aborting the whole top-level call. Required, non-optional fields
    /// (the header itself, its magic) still fail the call.
    Permissive,
}

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::Strict
    }
}

impl ParseMode {
    pub(crate) fn is_permissive(&self) -> bool {
        matches!(self, ParseMode::Permissive)
    }
}

/// Options accepted by every entry point in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub parse_mode: ParseMode,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn permissive() -> Self {
        DecodeOptions {
            parse_mode: ParseMode::Permissive,
        }
    }

    pub fn strict() -> Self {
        DecodeOptions {
            parse_mode: ParseMode::Strict,
        }
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }
}

/// Helper trait to ease permissive parsing fallbacks for optional sub-records.
///
/// When `permissive` is true, errors are downgraded to a logged warning and
/// a default/provided value is used instead; otherwise the original error
/// is propagated.
pub(crate) trait Permissive<T, E> {
    fn or_permissive_and_default(self, permissive: bool, context: &str) -> core::result::Result<T, E>;
}

impl<T: Default, E: core::fmt::Display> Permissive<T, E> for core::result::Result<T, E> {
    fn or_permissive_and_default(self, permissive: bool, context: &str) -> core::result::Result<T, E> {
        self.or_else(|e| {
            if permissive {
                log::warn!("{context}: {e}, continuing with empty/default value");
                Ok(T::default())
            } else {
                Err(e)
            }
        })
    }
}
