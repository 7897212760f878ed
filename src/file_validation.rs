//! `FileValidation`: on-disk provenance checks for a loader's backing file.
//! Two validation modes coexist; either, both, or neither may apply.

use scroll::{Pread, Pwrite, SizeWith};

#[repr(C)]
#[derive(Clone, Copy, Pread, Pwrite, SizeWith)]
pub struct FileValidation {
    pub slice_offset: u64,
    pub inode: u64,
    pub mtime: u64,
    pub cd_hash: [u8; 20],
    pub uuid: [u8; 16],
    check_inode_mtime: u8,
    check_cd_hash: u8,
    _reserved: u16,
}

pub const SIZEOF_FILE_VALIDATION: usize = 64;

impl FileValidation {
    pub fn check_inode_mtime(&self) -> bool {
        self.check_inode_mtime != 0
    }

    pub fn check_cd_hash(&self) -> bool {
        self.check_cd_hash != 0
    }
}

impl core::fmt::Debug for FileValidation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileValidation")
            .field("slice_offset", &self.slice_offset)
            .field("inode", &self.inode)
            .field("mtime", &self.mtime)
            .field("cd_hash", &self.cd_hash)
            .field("uuid", &self.uuid)
            .field("check_inode_mtime", &self.check_inode_mtime())
            .field("check_cd_hash", &self.check_cd_hash())
            .finish()
    }
}
