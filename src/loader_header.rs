//! `LoaderHeader`: the 8-byte header common to prebuilt and JIT loader
//! variants (spec calls this type `Loader`; renamed here to avoid clashing
//! with this crate's `PrebuiltLoader`).

use scroll::{Pread, Pwrite, SizeWith};

use crate::bits::extract_bits;

/// Magic for a loader record header: `"l4yd"`.
pub const LOADER_MAGIC: u32 = 0x6C34_7964;

#[repr(C)]
#[derive(Clone, Copy, Default, Pread, Pwrite, SizeWith)]
pub struct LoaderHeaderRaw {
    pub magic: u32,
    pub flags: u16,
    pub ref_: u16,
}

pub const SIZEOF_LOADER_HEADER: usize = 8;

/// Decoded flag word. Bits 0-8 are named; the remaining high bits are
/// reserved padding up to the 16-bit word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LoaderFlags(pub u16);

macro_rules! flag_accessor {
    ($name:ident, $bit:expr) => {
        pub fn $name(&self) -> bool {
            extract_bits(self.0 as u64, $bit, 1) != 0
        }
    };
}

impl LoaderFlags {
    flag_accessor!(is_prebuilt, 0);
    flag_accessor!(dylib_in_dyld_cache, 1);
    flag_accessor!(has_objc, 2);
    flag_accessor!(may_have_plus_load, 3);
    flag_accessor!(has_ro_data, 4);
    flag_accessor!(never_unload, 5);
    flag_accessor!(leave_mapped, 6);
    flag_accessor!(has_ro_objc, 7);
    flag_accessor!(pre_2022_binary, 8);

    /// Names of every flag currently set, in bit order. For display/
    /// debugging only; the decoded representation remains the raw `u16`.
    pub fn iter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        const NAMES: &[(&str, u32)] = &[
            ("is_prebuilt", 0),
            ("dylib_in_dyld_cache", 1),
            ("has_objc", 2),
            ("may_have_plus_load", 3),
            ("has_ro_data", 4),
            ("never_unload", 5),
            ("leave_mapped", 6),
            ("has_ro_objc", 7),
            ("pre_2022_binary", 8),
        ];
        NAMES
            .iter()
            .filter(move |(_, bit)| extract_bits(self.0 as u64, *bit, 1) != 0)
            .map(|(name, _)| *name)
    }
}

impl core::fmt::Debug for LoaderFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter_names()).finish()
    }
}

/// The common 8-byte loader record header.
#[derive(Clone, Copy, Debug)]
pub struct LoaderHeader {
    pub magic: u32,
    pub flags: LoaderFlags,
    pub r#ref: crate::loader_ref::LoaderRef,
}

impl LoaderHeader {
    pub fn parse(raw: LoaderHeaderRaw) -> crate::error::Result<Self> {
        if raw.magic != LOADER_MAGIC {
            return Err(crate::error::Error::BadMagic {
                expected: LOADER_MAGIC,
                found: raw.magic,
            });
        }
        Ok(LoaderHeader {
            magic: raw.magic,
            flags: LoaderFlags(raw.flags),
            r#ref: crate::loader_ref::LoaderRef(raw.ref_),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let raw = LoaderHeaderRaw {
            magic: 0xDEAD_BEEF,
            flags: 0,
            ref_: 0,
        };
        let err = LoaderHeader::parse(raw).unwrap_err();
        assert!(matches!(err, crate::error::Error::BadMagic { .. }));
    }

    #[test]
    fn flag_bits_decode_independently() {
        let flags = LoaderFlags(0b1_0000_0101); // bits 0, 2, 8
        assert!(flags.is_prebuilt());
        assert!(!flags.dylib_in_dyld_cache());
        assert!(flags.has_objc());
        assert!(flags.pre_2022_binary());
        let names: Vec<_> = flags.iter_names().collect();
        assert_eq!(names, vec!["is_prebuilt", "has_objc", "pre_2022_binary"]);
    }
}
