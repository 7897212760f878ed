//! Record Decoder (`parse_prebuilt_loader`, spec §4.3): consumes a
//! positioned byte window and produces a fully-materialized `PrebuiltLoader`.

use scroll::ctx::StrCtx;
use scroll::{Pread, Pwrite, SizeWith};

use crate::bind_target::{BindTargetRef, SIZEOF_BIND_TARGET_REF};
use crate::bits::extract_bits;
use crate::dependent::{Dependent, DependentKind};
use crate::error::{Error, Result};
use crate::file_validation::FileValidation;
use crate::loader_header::{LoaderHeader, LoaderHeaderRaw, SIZEOF_LOADER_HEADER};
use crate::loader_ref::{LoaderRef, SIZEOF_LOADER_REF};
use crate::objc::{ObjCBinaryInfo, ObjCBinaryInfoRaw};
use crate::options::{DecodeOptions, Permissive};
use crate::patch::{DylibPatch, SIZEOF_DYLIB_PATCH};
use crate::region::{Region, SIZEOF_REGION};
use crate::resolved_symbol::ResolvedSymbol;

/// No twin (`index_of_twin == 0xFFFF`).
pub const NO_TWIN: u16 = 0xFFFF;

#[repr(C)]
#[derive(Clone, Copy, Default, Pread, Pwrite, SizeWith)]
pub struct PrebuiltLoaderHeaderRaw {
    pub path_offset: u16,
    pub dep_loader_refs_offset: u16,
    pub dep_kind_offset: u16,
    pub fixups_load_command_offset: u16,
    pub alt_path_offset: u16,
    pub file_validation_offset: u16,
    /// Low 4 bits: has_initializers, is_overridable, supports_catalyst,
    /// is_catalyst_override. High 12 bits: regions_count.
    pub flags_and_regions_count: u16,
    pub regions_offset: u16,
    pub dependent_count: u16,
    pub bind_target_refs_offset: u16,
    pub bind_target_refs_count: u32,
    pub objc_binary_info_offset: u32,
    pub index_of_twin: u16,
    _padding: u16,
    /// In the loader's own VM image, not this record's window.
    pub exports_trie_loader_offset: u64,
    pub exports_trie_size: u32,
    pub vm_size: u32,
    pub code_signature_file_offset: u32,
    pub code_signature_size: u32,
    pub patch_table_offset: u32,
    pub override_bind_target_refs_offset: u32,
    pub override_bind_target_refs_count: u32,
}

pub const SIZEOF_PREBUILT_LOADER_HEADER: usize = 68;

/// `has_initializers`/`is_overridable`/`supports_catalyst`/`is_catalyst_override`
/// plus `regions_count`, packed into one 16-bit word.
#[derive(Clone, Copy, Debug)]
pub struct PrebuiltLoaderFlags(pub u16);

impl PrebuiltLoaderFlags {
    pub fn has_initializers(&self) -> bool {
        extract_bits(self.0 as u64, 0, 1) != 0
    }
    pub fn is_overridable(&self) -> bool {
        extract_bits(self.0 as u64, 1, 1) != 0
    }
    pub fn supports_catalyst(&self) -> bool {
        extract_bits(self.0 as u64, 2, 1) != 0
    }
    pub fn is_catalyst_override(&self) -> bool {
        extract_bits(self.0 as u64, 3, 1) != 0
    }
    pub fn regions_count(&self) -> u16 {
        extract_bits(self.0 as u64, 4, 12) as u16
    }
}

/// A fully-materialized loader record. Immutable once decoded; owns copies
/// of every variable-length sub-structure.
#[derive(Debug, Clone)]
pub struct PrebuiltLoader {
    pub header: LoaderHeader,
    pub flags: Option<PrebuiltLoaderFlagsView>,
    pub path: Option<String>,
    pub alt_path: Option<String>,
    pub file_validation: Option<FileValidation>,
    pub regions: Vec<Region>,
    pub dependents: Vec<Dependent>,
    pub bind_target_refs: Vec<BindTargetRef>,
    pub override_bind_target_refs: Vec<BindTargetRef>,
    pub objc_binary_info: Option<ObjCBinaryInfo>,
    pub twin: Option<ResolvedSymbol>,
    pub exports_trie_loader_offset: u64,
    pub exports_trie_size: u32,
    pub vm_size: u32,
    pub code_signature_file_offset: u32,
    pub code_signature_size: u32,
    pub patches: Vec<DylibPatch>,
}

/// Decoded copy of [`PrebuiltLoaderFlags`], kept as plain booleans on the
/// materialized type (the on-disk packing only matters during decode).
#[derive(Debug, Clone, Copy, Default)]
pub struct PrebuiltLoaderFlagsView {
    pub has_initializers: bool,
    pub is_overridable: bool,
    pub supports_catalyst: bool,
    pub is_catalyst_override: bool,
}

fn bounds_check(offset: usize, needed: usize, len: usize) -> Result<()> {
    if offset.checked_add(needed).map(|end| end > len).unwrap_or(true) {
        return Err(Error::ShortRead { offset, needed, len });
    }
    Ok(())
}

fn checked_count(count: u64, elem_size: usize, window_len: usize) -> Result<usize> {
    let bytes = count
        .checked_mul(elem_size as u64)
        .ok_or(Error::InvalidCount { count, bound: window_len as u64 })?;
    if bytes > window_len as u64 {
        return Err(Error::InvalidCount { count, bound: window_len as u64 });
    }
    Ok(count as usize)
}

fn read_cstr(window: &[u8], offset: u16) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let offset = offset as usize;
    bounds_check(offset, 0, window.len())?;
    let s: &str = window.pread_with(offset, StrCtx::Delimiter(0u8))?;
    Ok(s.to_string())
}

/// Consumes a positioned window whose byte 0 is the start of a
/// `PrebuiltLoader` record, resolving dependent/twin display names from
/// `image_name` (indexed the same way the owning set's image table is).
pub fn parse_prebuilt_loader(
    window: &[u8],
    image_name: &dyn Fn(usize) -> Option<String>,
    options: DecodeOptions,
) -> Result<PrebuiltLoader> {
    bounds_check(0, SIZEOF_LOADER_HEADER, window.len())?;
    let header_raw: LoaderHeaderRaw = window.pread_with(0, scroll::LE)?;
    let header = LoaderHeader::parse(header_raw)?;

    bounds_check(SIZEOF_LOADER_HEADER, SIZEOF_PREBUILT_LOADER_HEADER, window.len())?;
    let raw: PrebuiltLoaderHeaderRaw = window.pread_with(SIZEOF_LOADER_HEADER, scroll::LE)?;

    let flags = PrebuiltLoaderFlags(raw.flags_and_regions_count);
    let permissive = options.parse_mode.is_permissive();

    let path = if raw.path_offset != 0 {
        Some(read_cstr(window, raw.path_offset)?)
    } else {
        None
    };
    let alt_path = if raw.alt_path_offset != 0 {
        Some(read_cstr(window, raw.alt_path_offset)?)
    } else {
        None
    };

    let file_validation = if raw.file_validation_offset != 0 {
        let offset = raw.file_validation_offset as usize;
        bounds_check(offset, crate::file_validation::SIZEOF_FILE_VALIDATION, window.len())?;
        Some(window.pread_with::<FileValidation>(offset, scroll::LE)?)
    } else {
        None
    };

    let regions_count = flags.regions_count() as usize;
    let mut regions = Vec::with_capacity(regions_count);
    if regions_count > 0 {
        let base = raw.regions_offset as usize;
        for i in 0..regions_count {
            let offset = base + i * SIZEOF_REGION;
            bounds_check(offset, SIZEOF_REGION, window.len())?;
            regions.push(window.pread_with::<Region>(offset, scroll::LE)?);
        }
    }

    let dep_count = raw.dependent_count as usize;
    let mut dependents = Vec::with_capacity(dep_count);
    if raw.dep_loader_refs_offset != 0 {
        let refs_base = raw.dep_loader_refs_offset as usize;
        let kinds_base = raw.dep_kind_offset as usize;
        for i in 0..dep_count {
            let ref_offset = refs_base + i * SIZEOF_LOADER_REF;
            bounds_check(ref_offset, SIZEOF_LOADER_REF, window.len())?;
            let loader_ref: LoaderRef = window.pread_with(ref_offset, scroll::LE)?;
            let kind = if raw.dep_kind_offset != 0 {
                let kind_offset = kinds_base + i;
                bounds_check(kind_offset, 1, window.len())?;
                DependentKind::from_byte(window[kind_offset])
            } else {
                DependentKind::Normal
            };
            let resolved = ResolvedSymbol::resolve(
                loader_ref.index() as usize,
                image_name,
                || format!("{loader_ref:?}"),
            );
            dependents.push(Dependent { loader_ref, kind, resolved });
        }
    }

    let bind_target_refs = read_bind_targets(
        window,
        raw.bind_target_refs_offset as usize,
        raw.bind_target_refs_count as u64,
    )?;
    let override_bind_target_refs = read_bind_targets(
        window,
        raw.override_bind_target_refs_offset as usize,
        raw.override_bind_target_refs_count as u64,
    )?;

    let objc_binary_info = if raw.objc_binary_info_offset != 0 {
        let decode = || -> Result<ObjCBinaryInfo> {
            let base = raw.objc_binary_info_offset as usize;
            bounds_check(base, crate::objc::SIZEOF_OBJC_BINARY_INFO, window.len())?;
            let objc_raw: ObjCBinaryInfoRaw = window.pread_with(base, scroll::LE)?;

            let protocol_fixups_base = base + objc_raw.protocol_fixups_offset as usize;
            let n = checked_count(objc_raw.protocol_list_count as u64, 1, window.len())?;
            let mut protocol_fixups = Vec::with_capacity(n);
            for i in 0..n {
                let offset = protocol_fixups_base + i;
                bounds_check(offset, 1, window.len())?;
                protocol_fixups.push(window[offset] != 0);
            }

            let sel_base = base + objc_raw.selector_references_fixups_offset as usize;
            let selector_references_fixups =
                read_bind_targets(window, sel_base, objc_raw.selector_references_fixups_count as u64)?;

            Ok(ObjCBinaryInfo { protocol_fixups, selector_references_fixups })
        };
        decode().map(Some).or_permissive_and_default(permissive, "objc binary info")?
    } else {
        None
    };

    let twin = if raw.index_of_twin != NO_TWIN {
        Some(ResolvedSymbol::resolve(
            raw.index_of_twin as usize,
            image_name,
            || format!("twin#{}", raw.index_of_twin),
        ))
    } else {
        None
    };

    let patches = if raw.patch_table_offset != 0 {
        let decode = || -> Result<Vec<DylibPatch>> {
            let mut patches = Vec::new();
            let mut offset = raw.patch_table_offset as usize;
            loop {
                bounds_check(offset, SIZEOF_DYLIB_PATCH, window.len())?;
                let patch: DylibPatch = window.pread_with(offset, scroll::LE)?;
                let terminator = patch.is_terminator();
                patches.push(patch);
                if terminator {
                    break;
                }
                offset += SIZEOF_DYLIB_PATCH;
            }
            Ok(patches)
        };
        decode().or_permissive_and_default(permissive, "patch table")?
    } else {
        Vec::new()
    };

    Ok(PrebuiltLoader {
        header,
        flags: Some(PrebuiltLoaderFlagsView {
            has_initializers: flags.has_initializers(),
            is_overridable: flags.is_overridable(),
            supports_catalyst: flags.supports_catalyst(),
            is_catalyst_override: flags.is_catalyst_override(),
        }),
        path,
        alt_path,
        file_validation,
        regions,
        dependents,
        bind_target_refs,
        override_bind_target_refs,
        objc_binary_info,
        twin,
        exports_trie_loader_offset: raw.exports_trie_loader_offset,
        exports_trie_size: raw.exports_trie_size,
        vm_size: raw.vm_size,
        code_signature_file_offset: raw.code_signature_file_offset,
        code_signature_size: raw.code_signature_size,
        patches,
    })
}

fn read_bind_targets(window: &[u8], offset: usize, count: u64) -> Result<Vec<BindTargetRef>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let n = checked_count(count, SIZEOF_BIND_TARGET_REF, window.len())?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let elem_offset = offset + i * SIZEOF_BIND_TARGET_REF;
        bounds_check(elem_offset, SIZEOF_BIND_TARGET_REF, window.len())?;
        out.push(window.pread_with::<BindTargetRef>(elem_offset, scroll::LE)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::fixture;

    #[test]
    fn minimal_loader_parses_path_only() {
        let window = fixture::minimal_loader(b"/a");
        let name = |_: usize| None;
        let loader = parse_prebuilt_loader(&window, &name, DecodeOptions::default()).unwrap();
        assert_eq!(loader.path.as_deref(), Some("/a"));
        assert!(loader.regions.is_empty());
        assert!(loader.dependents.is_empty());
        assert!(loader.bind_target_refs.is_empty());
        assert!(loader.patches.is_empty());
    }

    #[test]
    fn two_normal_dependents_resolve_from_image_table() {
        let window = fixture::loader_with_dependents(&[(3, false), (5, false)], None);
        let names = |i: usize| Some(format!("image#{i}"));
        let loader = parse_prebuilt_loader(&window, &names, DecodeOptions::default()).unwrap();
        assert_eq!(loader.dependents.len(), 2);
        assert!(loader.dependents.iter().all(|d| d.kind == DependentKind::Normal));
        assert_eq!(loader.dependents[0].resolved.name, "image#3");
        assert_eq!(loader.dependents[1].resolved.name, "image#5");
    }

    #[test]
    fn mixed_dependent_kinds() {
        let window = fixture::loader_with_dependents(&[(3, false), (5, false)], Some(&[0, 2]));
        let names = |i: usize| Some(format!("image#{i}"));
        let loader = parse_prebuilt_loader(&window, &names, DecodeOptions::default()).unwrap();
        assert_eq!(loader.dependents[0].kind, DependentKind::Normal);
        assert_eq!(loader.dependents[1].kind, DependentKind::Reexport);
    }

    #[test]
    fn patch_list_terminates_on_sentinel_and_keeps_it() {
        let window = fixture::loader_with_patches(&[1, 2], true);
        let name = |_: usize| None;
        let loader = parse_prebuilt_loader(&window, &name, DecodeOptions::default()).unwrap();
        assert_eq!(loader.patches.len(), 3);
        assert!(loader.patches[2].is_terminator());
        assert!(!loader.patches[0].is_terminator());
        assert!(!loader.patches[1].is_terminator());
    }

    #[test]
    fn twin_resolves_name_from_image_table() {
        let window = fixture::loader_with_twin(2);
        let names = |i: usize| Some(format!("image#{i}"));
        let loader = parse_prebuilt_loader(&window, &names, DecodeOptions::default()).unwrap();
        let twin = loader.twin.unwrap();
        assert_eq!(twin.index, 2);
        assert_eq!(twin.name, "image#2");
    }

    #[test]
    fn no_twin_sentinel_leaves_twin_unset() {
        let window = fixture::loader_with_twin(NO_TWIN);
        let name = |_: usize| None;
        let loader = parse_prebuilt_loader(&window, &name, DecodeOptions::default()).unwrap();
        assert!(loader.twin.is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut window = fixture::minimal_loader(b"/a");
        window[0] = 0xFF;
        let name = |_: usize| None;
        let err = parse_prebuilt_loader(&window, &name, DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }
}
