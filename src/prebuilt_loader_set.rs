//! Set Decoder (`parse_prebuilt_loader_set`, spec §4.4).

use scroll::ctx::StrCtx;
use scroll::{Pread, Pwrite, SizeWith};

use crate::collaborators::ImageTable;
use crate::error::{Error, Result};
use crate::options::{DecodeOptions, Permissive};
use crate::patch::{CachePatch, SIZEOF_CACHE_PATCH};
use crate::prebuilt_loader::{parse_prebuilt_loader, PrebuiltLoader};

/// Magic for a `PrebuiltLoaderSet`: `"sp4d"`.
pub const SET_MAGIC: u32 = 0x7370_3464;

#[repr(C)]
#[derive(Clone, Copy, Default, Pread, Pwrite, SizeWith)]
pub struct PrebuiltLoaderSetHeaderRaw {
    pub magic: u32,
    pub version_hash: u32,
    pub total_length: u32,
    pub loaders_array_offset: u32,
    pub loaders_array_count: u32,
    pub cache_patch_offset: u32,
    pub cache_patch_count: u32,
    pub dyld_cache_uuid_offset: u32,
    pub must_be_missing_paths_offset: u32,
    pub must_be_missing_paths_count: u32,
    pub objc_selector_hash_table_offset: u32,
    pub objc_class_hash_table_offset: u32,
    pub objc_protocol_hash_table_offset: u32,
    pub objc_header_info_ro_array_offset: u32,
    _reserved: u32,
    pub objc_protocol_class_cache_offset: u64,
    pub swift_type_conformance_table_offset: u32,
    pub swift_metadata_conformance_table_offset: u32,
    pub swift_foreign_type_conformance_table_offset: u32,
}

pub const SIZEOF_PREBUILT_LOADER_SET_HEADER: usize = 80;

impl PrebuiltLoaderSetHeaderRaw {
    #[cfg(test)]
    pub(crate) fn with_magic(magic: u32) -> Self {
        PrebuiltLoaderSetHeaderRaw { magic, ..Default::default() }
    }
}

/// A fully-materialized `PrebuiltLoaderSet`. Owns every `PrebuiltLoader`
/// decoded from it; loaders are delivered in ascending `loaders_array`
/// index order (spec §5).
#[derive(Debug, Clone)]
pub struct PrebuiltLoaderSet {
    pub version_hash: u32,
    pub total_length: u32,
    pub loaders: Vec<PrebuiltLoader>,
    pub cache_patches: Vec<CachePatch>,
    pub dyld_cache_uuid: Option<[u8; 16]>,
    pub must_be_missing_paths: Vec<String>,
    pub objc_selector_hash_table_offset: u32,
    pub objc_class_hash_table_offset: u32,
    pub objc_protocol_hash_table_offset: u32,
    pub objc_header_info_ro_array_offset: u32,
    pub objc_protocol_class_cache_offset: u64,
    pub swift_type_conformance_table_offset: u32,
    pub swift_metadata_conformance_table_offset: u32,
    pub swift_foreign_type_conformance_table_offset: u32,
}

fn bounds_check(offset: usize, needed: usize, len: usize) -> Result<()> {
    if offset.checked_add(needed).map(|end| end > len).unwrap_or(true) {
        return Err(Error::ShortRead { offset, needed, len });
    }
    Ok(())
}

/// Parses a `PrebuiltLoaderSet` from a window positioned at its start.
pub fn parse_prebuilt_loader_set(
    window: &[u8],
    image_table: &dyn ImageTable,
    options: DecodeOptions,
) -> Result<PrebuiltLoaderSet> {
    bounds_check(0, SIZEOF_PREBUILT_LOADER_SET_HEADER, window.len())?;
    let raw: PrebuiltLoaderSetHeaderRaw = window.pread_with(0, scroll::LE)?;
    if raw.magic != SET_MAGIC {
        return Err(Error::BadMagic { expected: SET_MAGIC, found: raw.magic });
    }

    let permissive = options.parse_mode.is_permissive();
    let image_name = |i: usize| image_table.name(i);

    let mut loader_offsets = Vec::with_capacity(raw.loaders_array_count as usize);
    let base = raw.loaders_array_offset as usize;
    for i in 0..raw.loaders_array_count as usize {
        let offset = base + i * 4;
        bounds_check(offset, 4, window.len())?;
        loader_offsets.push(window.pread_with::<u32>(offset, scroll::LE)?);
    }

    let mut loaders = Vec::with_capacity(loader_offsets.len());
    for loader_offset in loader_offsets {
        let start = loader_offset as usize;
        bounds_check(start, 0, window.len())?;
        let sub_window = &window[start..];
        loaders.push(parse_prebuilt_loader(sub_window, &image_name, options)?);
    }

    let cache_patches = if raw.cache_patch_count > 0 {
        let decode = || -> Result<Vec<CachePatch>> {
            let base = raw.cache_patch_offset as usize;
            let mut out = Vec::with_capacity(raw.cache_patch_count as usize);
            for i in 0..raw.cache_patch_count as usize {
                let offset = base + i * SIZEOF_CACHE_PATCH;
                bounds_check(offset, SIZEOF_CACHE_PATCH, window.len())?;
                out.push(window.pread_with::<CachePatch>(offset, scroll::LE)?);
            }
            Ok(out)
        };
        decode().or_permissive_and_default(permissive, "cache patch array")?
    } else {
        Vec::new()
    };

    let dyld_cache_uuid = if raw.dyld_cache_uuid_offset != 0 {
        let offset = raw.dyld_cache_uuid_offset as usize;
        bounds_check(offset, 16, window.len())?;
        Some(window.pread_with::<[u8; 16]>(offset, scroll::LE)?)
    } else {
        None
    };

    let mut must_be_missing_paths = Vec::with_capacity(raw.must_be_missing_paths_count as usize);
    if raw.must_be_missing_paths_count > 0 {
        let decode = || -> Result<Vec<String>> {
            let mut offset = raw.must_be_missing_paths_offset as usize;
            let mut out = Vec::with_capacity(raw.must_be_missing_paths_count as usize);
            for _ in 0..raw.must_be_missing_paths_count {
                bounds_check(offset, 0, window.len())?;
                let s: &str =
                    window.pread_with(offset, StrCtx::Delimiter(0u8))?;
                offset += s.len() + 1;
                out.push(s.to_string());
            }
            Ok(out)
        };
        must_be_missing_paths = decode().or_permissive_and_default(permissive, "must-be-missing paths")?;
    }

    Ok(PrebuiltLoaderSet {
        version_hash: raw.version_hash,
        total_length: raw.total_length,
        loaders,
        cache_patches,
        dyld_cache_uuid,
        must_be_missing_paths,
        objc_selector_hash_table_offset: raw.objc_selector_hash_table_offset,
        objc_class_hash_table_offset: raw.objc_class_hash_table_offset,
        objc_protocol_hash_table_offset: raw.objc_protocol_hash_table_offset,
        objc_header_info_ro_array_offset: raw.objc_header_info_ro_array_offset,
        objc_protocol_class_cache_offset: raw.objc_protocol_class_cache_offset,
        swift_type_conformance_table_offset: raw.swift_type_conformance_table_offset,
        swift_metadata_conformance_table_offset: raw.swift_metadata_conformance_table_offset,
        swift_foreign_type_conformance_table_offset: raw.swift_foreign_type_conformance_table_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::fixture;

    struct EmptyImageTable;
    impl ImageTable for EmptyImageTable {
        fn name(&self, _index: usize) -> Option<String> {
            None
        }
        fn index_of(&self, _path: &str) -> Option<usize> {
            None
        }
    }

    #[test]
    fn set_with_must_be_missing_path() {
        let window = fixture::set_with_must_be_missing_paths(&["/x"]);
        let set = parse_prebuilt_loader_set(&window, &EmptyImageTable, DecodeOptions::default()).unwrap();
        assert_eq!(set.must_be_missing_paths, vec!["/x".to_string()]);
    }

    #[test]
    fn set_rejects_bad_magic() {
        let mut window = fixture::set_with_must_be_missing_paths(&[]);
        window[0] = 0;
        let err =
            parse_prebuilt_loader_set(&window, &EmptyImageTable, DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }

    #[test]
    fn cache_patches_decode_at_their_true_16_byte_stride() {
        let window = fixture::set_with_cache_patches(&[(1, 0x10), (2, 0x20), (3, 0x30)]);
        let set = parse_prebuilt_loader_set(&window, &EmptyImageTable, DecodeOptions::default()).unwrap();
        assert_eq!(set.cache_patches.len(), 3);
        for (i, patch) in set.cache_patches.iter().enumerate() {
            let dylib_index = i as u32 + 1;
            assert_eq!(patch.dylib_index, dylib_index);
            assert_eq!(patch.dylib_vm_offset, dylib_index << 4);
            assert_eq!(patch.patch_to.offset(), dylib_index as u64);
        }
    }

    #[test]
    fn loaders_decode_in_ascending_array_order() {
        let window = fixture::set_with_two_loaders(&["/a", "/b"]);
        let set = parse_prebuilt_loader_set(&window, &EmptyImageTable, DecodeOptions::default()).unwrap();
        assert_eq!(set.loaders.len(), 2);
        assert_eq!(set.loaders[0].path.as_deref(), Some("/a"));
        assert_eq!(set.loaders[1].path.as_deref(), Some("/b"));
    }
}
