//! Error taxonomy for the decoder, per the "no local recovery" policy:
//! any structural error aborts the current top-level call and is returned
//! to the caller (spec §7).

use core::result;

/// All errors this crate's decoders can return.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The container predates the `PrebuiltLoaderSet` feature; a sentinel,
    /// not a structural failure. Callers should treat this as an expected,
    /// non-fatal capability miss.
    #[error("container does not support PrebuiltLoaderSet")]
    Unsupported,

    /// A record's magic did not match the expected constant.
    #[error("bad magic: expected {expected:#x}, found {found:#x}")]
    BadMagic { expected: u32, found: u32 },

    /// A read ran past the end of the buffer.
    #[error("short read: needed {needed} bytes at offset {offset}, buffer is {len} bytes")]
    ShortRead {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A non-zero offset field pointed outside its record's declared window.
    #[error("invalid offset {offset} (window is {bound} bytes)")]
    InvalidOffset { offset: u64, bound: u64 },

    /// A count field, multiplied by its element size, overflowed or
    /// exceeded the enclosing window.
    #[error("invalid count {count} (bound is {bound})")]
    InvalidCount { count: u64, bound: u64 },

    /// `get_launch_loader_set` could not find `exec_path` in the trie.
    #[error("executable path not found in program trie: {0}")]
    PathNotFound(String),

    /// `get_dylib_prebuilt_loader` could not find the image in the image table.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// A lower-level `scroll` read failure not otherwise classified above.
    #[error(transparent)]
    Scroll(#[from] scroll::Error),
}

pub type Result<T> = result::Result<T, Error>;
