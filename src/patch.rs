//! `DylibPatch` (per-loader patch list, null-terminated) and `CachePatch`
//! (set-wide patch array).

use scroll::{Pread, Pwrite, SizeWith};

use crate::bind_target::BindTargetRef;

/// `kind == -1` is the sentinel terminating a loader's patch list
/// (`endOfPatchTable`); the terminator is included in the materialized
/// list so callers can distinguish "no patches" from "empty patch section".
pub const END_OF_PATCH_TABLE: i64 = -1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pread, Pwrite, SizeWith)]
pub struct DylibPatch {
    pub override_offset_of_impl: i64,
    pub kind: i64,
}

pub const SIZEOF_DYLIB_PATCH: usize = 16;

impl DylibPatch {
    pub fn is_terminator(&self) -> bool {
        self.kind == END_OF_PATCH_TABLE
    }
}

/// A single entry of the set-wide cache-patch array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pread, Pwrite, SizeWith)]
pub struct CachePatch {
    pub dylib_index: u32,
    pub dylib_vm_offset: u32,
    pub patch_to: BindTargetRef,
}

pub const SIZEOF_CACHE_PATCH: usize = 16;

impl CachePatch {
    /// Non-interpreting convenience: flags the condition the upstream
    /// tool's own comment calls out as "doesn't make sense" (spec §9 Open
    /// Question): the patch's relative target loader-ref offset equals
    /// this entry's own `dylib_vm_offset`. This does not add new meaning
    /// to the patch record, only names an observable byte-for-byte
    /// coincidence so a caller can filter without duplicating the check.
    pub fn is_self_patch(&self) -> bool {
        !self.patch_to.is_absolute() && self.patch_to.offset() == self.dylib_vm_offset as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::Pread;

    #[test]
    fn terminator_is_recognized() {
        let p = DylibPatch {
            override_offset_of_impl: 0,
            kind: -1,
        };
        assert!(p.is_terminator());
        let q = DylibPatch {
            override_offset_of_impl: 0,
            kind: 0,
        };
        assert!(!q.is_terminator());
    }

    #[test]
    fn dylib_patch_reads_via_scroll() {
        let mut bytes = [0u8; SIZEOF_DYLIB_PATCH];
        bytes[8..16].copy_from_slice(&(-1i64).to_le_bytes());
        let p: DylibPatch = bytes.pread_with(0, scroll::LE).unwrap();
        assert!(p.is_terminator());
    }
}
