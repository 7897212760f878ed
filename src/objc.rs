//! ObjC fixup sub-record of a `PrebuiltLoader`. The ObjC hash tables
//! themselves are out of scope (spec §1); only the fixup offsets and the
//! already-enumerated protocol/selector-reference fixup arrays are decoded.

use scroll::{Pread, Pwrite, SizeWith};

use crate::bind_target::BindTargetRef;

/// Fixed-size header, offsets relative to its own start (spec §6).
#[repr(C)]
#[derive(Clone, Copy, Pread, Pwrite, SizeWith)]
pub struct ObjCBinaryInfoRaw {
    pub protocol_fixups_offset: u32,
    pub protocol_list_count: u32,
    pub selector_references_fixups_offset: u32,
    pub selector_references_fixups_count: u32,
}

pub const SIZEOF_OBJC_BINARY_INFO: usize = 16;

/// Materialized ObjC fixup sub-record.
#[derive(Debug, Clone, Default)]
pub struct ObjCBinaryInfo {
    /// One bool per protocol in the protocol list, indicating whether
    /// that protocol requires a fixup.
    pub protocol_fixups: Vec<bool>,
    /// `BindTargetRef`s for every selector-reference that needs fixing up.
    pub selector_references_fixups: Vec<BindTargetRef>,
}
