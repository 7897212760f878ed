//! Trie-Index Façade (spec §4.5) and Version/Capability Gate (spec §4.6).
//!
//! Each entry point composes the trait-based collaborators in
//! [`crate::collaborators`] with the Record/Set decoders to answer one of
//! the four questions spec §6 names: enumerate every launch pair, enumerate
//! launch paths only, resolve one launch path, or resolve one dylib image.

use crate::collaborators::{CacheReader, ContainerHeader, ImageTable, TrieService};
use crate::error::{Error, Result};
use crate::options::DecodeOptions;
use crate::prebuilt_loader::PrebuiltLoader;
use crate::prebuilt_loader_set::{parse_prebuilt_loader_set, PrebuiltLoaderSet};

fn read_uleb128(bytes: &[u8], offset: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes
            .get(*offset)
            .ok_or(Error::ShortRead { offset: *offset, needed: 1, len: bytes.len() })?;
        *offset += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

/// `mapping_offset ≥ field-offset-of(program_trie_size)`, the minimum
/// container header layout that carries the program trie (spec §4.6).
pub fn is_supported(header: &dyn ContainerHeader) -> bool {
    header.mapping_offset() >= header.program_trie_size_field_offset()
}

fn require_supported(header: &dyn ContainerHeader) -> Result<()> {
    if is_supported(header) {
        Ok(())
    } else {
        Err(Error::Unsupported)
    }
}

fn require_nonzero(addr: u64) -> Result<u64> {
    if addr != 0 {
        Ok(addr)
    } else {
        Err(Error::Unsupported)
    }
}

fn program_trie_nodes(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    trie: &dyn TrieService,
) -> Result<Vec<crate::collaborators::TrieNode>> {
    let addr = require_nonzero(header.program_trie_addr())?;
    let (uuid, file_offset) = cache.get_offset(addr)?;
    let bytes = cache.read_bytes(uuid, file_offset, header.program_trie_size() as usize)?;
    trie.parse(&bytes)
}

fn decode_set_at_pool_offset(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    image_table: &dyn ImageTable,
    pool_offset: u64,
    options: DecodeOptions,
) -> Result<PrebuiltLoaderSet> {
    let pool_addr = require_nonzero(header.programs_pbl_set_pool_addr())?;
    let (uuid, file_offset) = cache.get_offset(pool_addr + pool_offset)?;
    let window = cache.read_bytes(uuid, file_offset, u32::MAX as usize)?;
    parse_prebuilt_loader_set(&window, image_table, options)
}

/// Enumerates every (exec-path, decoded set) pair reachable from the
/// program trie, in pre-order DFS order (spec §5 Ordering). `handler`
/// returning `Err` aborts the enumeration; callers that want best-effort
/// enumeration should swallow the error themselves and return `Ok(())`.
pub fn for_each_launch_loader_set(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    trie: &dyn TrieService,
    image_table: &dyn ImageTable,
    options: DecodeOptions,
    mut handler: impl FnMut(&str, &PrebuiltLoaderSet) -> Result<()>,
) -> Result<()> {
    require_supported(header)?;
    let addr = require_nonzero(header.program_trie_addr())?;
    let (uuid, file_offset) = cache.get_offset(addr)?;
    let bytes = cache.read_bytes(uuid, file_offset, header.program_trie_size() as usize)?;
    let nodes = trie.parse(&bytes)?;
    for node in nodes {
        let mut offset = node.offset;
        let pool_offset = read_uleb128(&bytes, &mut offset)?;
        let set = decode_set_at_pool_offset(header, cache, image_table, pool_offset, options)?;
        handler(&node.data, &set)?;
    }
    Ok(())
}

/// Enumerates every exec-path reachable from the program trie, without
/// decoding the sets they point to (spec §4.5, "identical but only yields
/// paths").
pub fn for_each_launch_loader_set_path(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    trie: &dyn TrieService,
    mut handler: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    require_supported(header)?;
    let nodes = program_trie_nodes(header, cache, trie)?;
    for node in nodes {
        handler(&node.data)?;
    }
    Ok(())
}

/// Resolves a single exec-path to its decoded launch `PrebuiltLoaderSet`.
pub fn get_launch_loader_set(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    trie: &dyn TrieService,
    image_table: &dyn ImageTable,
    exec_path: &str,
    options: DecodeOptions,
) -> Result<PrebuiltLoaderSet> {
    require_supported(header)?;
    let addr = require_nonzero(header.program_trie_addr())?;
    let (uuid, file_offset) = cache.get_offset(addr)?;
    let bytes = cache.read_bytes(uuid, file_offset, header.program_trie_size() as usize)?;
    let mut cursor = trie.walk(&bytes, exec_path)?;
    let pool_offset = trie.read_uleb128(&bytes, &mut cursor)?;
    decode_set_at_pool_offset(header, cache, image_table, pool_offset, options)
}

/// Resolves a single dylib image path to its decoded `PrebuiltLoader`.
pub fn get_dylib_prebuilt_loader(
    header: &dyn ContainerHeader,
    cache: &dyn CacheReader,
    image_table: &dyn ImageTable,
    path: &str,
    options: DecodeOptions,
) -> Result<PrebuiltLoader> {
    require_supported(header)?;
    let addr = require_nonzero(header.dylibs_pbl_set_addr())?;
    let (uuid, file_offset) = cache.get_offset(addr)?;
    // Upper bound unknown ahead of decode; the cache reader is expected to
    // hand back whatever remains of its region and the set header's own
    // `total_length` bounds the actual parse.
    let window = cache.read_bytes(uuid, file_offset, u32::MAX as usize)?;
    let set = parse_prebuilt_loader_set(&window, image_table, options)?;

    let image_index = image_table
        .index_of(path)
        .ok_or_else(|| Error::ImageNotFound(path.to_string()))?;
    set.loaders
        .get(image_index)
        .cloned()
        .ok_or_else(|| Error::ImageNotFound(path.to_string()))
}
