//! Trait-shaped seams for the collaborators spec.md names but leaves
//! undefined: the shared-cache region reader, the image table, the trie
//! walker, and the gate fields on the outer container header. Consumers of
//! this crate implement these against their own shared-cache reader; a
//! reference `TrieService` implementation lives in [`crate::trie`] so the
//! façade and its tests are runnable end-to-end.

use crate::error::Result;

/// A 16-byte identifier for a sub-cache file. Not the `uuid` crate's type:
/// goblin's own dependency set carries no UUID crate, and this is a
/// passthrough identifier rather than something requiring RFC4122
/// parsing/generation.
pub type Uuid = [u8; 16];

/// Maps a shared-cache VM address to a region identifier and a byte offset
/// within it, and reads bytes back out of that region.
pub trait CacheReader {
    fn get_offset(&self, vm_addr: u64) -> Result<(Uuid, u64)>;
    fn read_bytes(&self, uuid: Uuid, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// `Images[i].Name` / `has_image_path(path)` from spec §6.
pub trait ImageTable {
    fn name(&self, index: usize) -> Option<String>;
    fn index_of(&self, path: &str) -> Option<usize>;
}

/// One node yielded by [`TrieService::parse`]: `offset` is the node's
/// position in the trie buffer (the start of its ULEB128 payload), `data`
/// is the full path string that node terminates.
#[derive(Debug, Clone)]
pub struct TrieNode {
    pub offset: usize,
    pub data: String,
}

/// A cursor into a trie buffer, positioned just after a matched node by
/// [`TrieService::walk`].
#[derive(Debug, Clone, Copy)]
pub struct TrieCursor(pub usize);

/// `ParseTrie`/`WalkTrie`/`ReadUleb128` from spec §6, consumed as a
/// black-box sequence-of-nodes or path-lookup service.
pub trait TrieService {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<TrieNode>>;
    fn walk(&self, bytes: &[u8], path: &str) -> Result<TrieCursor>;
    fn read_uleb128(&self, bytes: &[u8], cursor: &mut TrieCursor) -> Result<u64>;
}

/// The gate fields the outer container header exposes (spec §4.6, §6).
/// The container's own byte layout is out of scope for this crate; an
/// implementation reads its own header and reports these fields.
pub trait ContainerHeader {
    /// Byte offset, within the container header, of the `mapping_offset` field's value.
    fn mapping_offset(&self) -> u64;
    /// Byte offset, within the container header, of the `program_trie_size` field itself.
    /// The gate requires `mapping_offset >= program_trie_size_field_offset`.
    fn program_trie_size_field_offset(&self) -> u64;
    fn program_trie_size(&self) -> u64;
    fn program_trie_addr(&self) -> u64;
    fn programs_pbl_set_pool_addr(&self) -> u64;
    fn dylibs_pbl_set_addr(&self) -> u64;
}
