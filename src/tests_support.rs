//! Test-only byte fixtures for the seed scenarios in spec §8. Not part of
//! the public API; this crate's Non-goals exclude an emitting encoder for
//! production use, but a small test-only builder mirrors the way `goblin`
//! exercises its own parser in `tests/macho_writer.rs`.

#![cfg(test)]

pub mod fixture {
    use scroll::Pwrite;

    use crate::bind_target::BindTargetRef;
    use crate::loader_header::{LoaderHeaderRaw, LOADER_MAGIC};
    use crate::loader_ref::LoaderRef;
    use crate::patch::{CachePatch, DylibPatch};
    use crate::prebuilt_loader::{PrebuiltLoaderHeaderRaw, SIZEOF_PREBUILT_LOADER_HEADER};
    use crate::prebuilt_loader_set::{PrebuiltLoaderSetHeaderRaw, SET_MAGIC, SIZEOF_PREBUILT_LOADER_SET_HEADER};

    use crate::loader_header::SIZEOF_LOADER_HEADER;

    pub const FIXED_HEADER_LEN: usize = SIZEOF_LOADER_HEADER + SIZEOF_PREBUILT_LOADER_HEADER;

    fn write_fixed_header(buf: &mut Vec<u8>, prebuilt: PrebuiltLoaderHeaderRaw) {
        let header = LoaderHeaderRaw {
            magic: LOADER_MAGIC,
            flags: 0,
            ref_: 0,
        };
        buf.resize(FIXED_HEADER_LEN, 0);
        buf.pwrite_with(header, 0, scroll::LE).unwrap();
        buf.pwrite_with(prebuilt, SIZEOF_LOADER_HEADER, scroll::LE).unwrap();
    }

    fn push_cstr(buf: &mut Vec<u8>, s: &[u8]) -> u16 {
        let offset = buf.len() as u16;
        buf.extend_from_slice(s);
        buf.push(0);
        offset
    }

    pub fn minimal_loader(path: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_fixed_header(&mut buf, PrebuiltLoaderHeaderRaw::default());
        let path_offset = push_cstr(&mut buf, path);
        buf.pwrite_with(path_offset, SIZEOF_LOADER_HEADER, scroll::LE).unwrap();
        buf
    }

    /// `deps`: `(index, is_app)` pairs. `kinds`: optional per-dependent byte.
    pub fn loader_with_dependents(deps: &[(u16, bool)], kinds: Option<&[u8]>) -> Vec<u8> {
        let mut buf = Vec::new();
        write_fixed_header(&mut buf, PrebuiltLoaderHeaderRaw::default());

        let refs_offset = buf.len() as u16;
        for &(index, is_app) in deps {
            let raw = index | if is_app { 0x8000 } else { 0 };
            let loader_ref = LoaderRef(raw);
            let pos = buf.len();
            buf.resize(pos + 2, 0);
            buf.pwrite_with(loader_ref, pos, scroll::LE).unwrap();
        }

        let kinds_offset = if let Some(kinds) = kinds {
            let offset = buf.len() as u16;
            buf.extend_from_slice(kinds);
            offset
        } else {
            0
        };

        let mut prebuilt = PrebuiltLoaderHeaderRaw::default();
        prebuilt.dep_loader_refs_offset = refs_offset;
        prebuilt.dep_kind_offset = kinds_offset;
        prebuilt.dependent_count = deps.len() as u16;
        buf.pwrite_with(prebuilt, SIZEOF_LOADER_HEADER, scroll::LE).unwrap();
        buf
    }

    /// `kinds`: the `kind` field of each patch entry, in order.
    /// `with_terminator` appends a final `kind == -1` entry.
    pub fn loader_with_patches(kinds: &[i64], with_terminator: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_fixed_header(&mut buf, PrebuiltLoaderHeaderRaw::default());

        let patch_offset = buf.len() as u16;
        for &kind in kinds {
            let patch = DylibPatch { override_offset_of_impl: 0, kind };
            let pos = buf.len();
            buf.resize(pos + 16, 0);
            buf.pwrite_with(patch, pos, scroll::LE).unwrap();
        }
        if with_terminator {
            let patch = DylibPatch { override_offset_of_impl: 0, kind: -1 };
            let pos = buf.len();
            buf.resize(pos + 16, 0);
            buf.pwrite_with(patch, pos, scroll::LE).unwrap();
        }

        let mut prebuilt = PrebuiltLoaderHeaderRaw::default();
        prebuilt.patch_table_offset = patch_offset as u32;
        buf.pwrite_with(prebuilt, SIZEOF_LOADER_HEADER, scroll::LE).unwrap();
        buf
    }

    pub fn loader_with_twin(twin_index: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut prebuilt = PrebuiltLoaderHeaderRaw::default();
        prebuilt.index_of_twin = twin_index;
        write_fixed_header(&mut buf, prebuilt);
        buf
    }

    fn init_set_header(buf: &mut Vec<u8>, header: PrebuiltLoaderSetHeaderRaw) {
        buf.resize(SIZEOF_PREBUILT_LOADER_SET_HEADER, 0);
        buf.pwrite_with(header, 0, scroll::LE).unwrap();
    }

    /// Rewrites just the header in place; `buf` must already be at least
    /// `SIZEOF_PREBUILT_LOADER_SET_HEADER` bytes (tail data already appended).
    fn patch_set_header(buf: &mut Vec<u8>, header: PrebuiltLoaderSetHeaderRaw) {
        buf.pwrite_with(header, 0, scroll::LE).unwrap();
    }

    fn default_set_header() -> PrebuiltLoaderSetHeaderRaw {
        PrebuiltLoaderSetHeaderRaw::with_magic(SET_MAGIC)
    }

    pub fn set_with_must_be_missing_paths(paths: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        init_set_header(&mut buf, default_set_header());

        let offset = buf.len() as u32;
        for path in paths {
            buf.extend_from_slice(path.as_bytes());
            buf.push(0);
        }

        let mut header = default_set_header();
        header.must_be_missing_paths_offset = offset;
        header.must_be_missing_paths_count = paths.len() as u32;
        patch_set_header(&mut buf, header);
        buf
    }

    /// `patches`: `(dylib_index, dylib_vm_offset)` pairs; `patch_to` is a
    /// relative target whose `loader_ref` index equals `dylib_index`, so a
    /// mis-strided read is easy to spot (each entry's fields would bleed
    /// into its neighbor's).
    pub fn set_with_cache_patches(patches: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        init_set_header(&mut buf, default_set_header());

        let offset = buf.len() as u32;
        for &(dylib_index, dylib_vm_offset) in patches {
            let patch = CachePatch {
                dylib_index,
                dylib_vm_offset,
                // Relative target, loader_ref=0, high8=0, low39=dylib_index,
                // so `patch_to.offset()` reads back as plain `dylib_index`.
                patch_to: BindTargetRef((dylib_index as u64) << 24),
            };
            let pos = buf.len();
            buf.resize(pos + 16, 0);
            buf.pwrite_with(patch, pos, scroll::LE).unwrap();
        }

        let mut header = default_set_header();
        header.cache_patch_offset = offset;
        header.cache_patch_count = patches.len() as u32;
        patch_set_header(&mut buf, header);
        buf
    }

    pub fn set_with_two_loaders(paths: &[&str; 2]) -> Vec<u8> {
        let mut buf = Vec::new();
        init_set_header(&mut buf, default_set_header());

        let mut loader_bufs = Vec::new();
        for path in paths {
            loader_bufs.push(minimal_loader(path.as_bytes()));
        }

        let mut loader_offsets = Vec::new();
        for loader in &loader_bufs {
            loader_offsets.push(buf.len() as u32);
            buf.extend_from_slice(loader);
        }

        let array_offset = buf.len() as u32;
        for offset in &loader_offsets {
            let pos = buf.len();
            buf.resize(pos + 4, 0);
            buf.pwrite_with(*offset, pos, scroll::LE).unwrap();
        }

        let mut header = default_set_header();
        header.loaders_array_offset = array_offset;
        header.loaders_array_count = loader_offsets.len() as u32;
        patch_set_header(&mut buf, header);
        buf
    }
}
