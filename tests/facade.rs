//! End-to-end coverage of the trie-index façade against an in-memory
//! shared-cache stand-in, wiring together every collaborator trait with a
//! single region and the bundled `BasicTrie`.

use dyld_prebuilt_loader::{
    facade, BasicTrie, CacheReader, ContainerHeader, DecodeOptions, Error, ImageTable,
};

const REGION: [u8; 16] = *b"region-00000000\0";

struct MemCache {
    bytes: Vec<u8>,
}

impl CacheReader for MemCache {
    fn get_offset(&self, vm_addr: u64) -> dyld_prebuilt_loader::Result<(dyld_prebuilt_loader::Uuid, u64)> {
        Ok((REGION, vm_addr))
    }

    fn read_bytes(&self, _uuid: dyld_prebuilt_loader::Uuid, offset: u64, len: usize) -> dyld_prebuilt_loader::Result<Vec<u8>> {
        let offset = offset as usize;
        let end = (offset + len).min(self.bytes.len());
        Ok(self.bytes[offset.min(end)..end].to_vec())
    }
}

struct Images(Vec<&'static str>);

impl ImageTable for Images {
    fn name(&self, index: usize) -> Option<String> {
        self.0.get(index).map(|s| s.to_string())
    }

    fn index_of(&self, path: &str) -> Option<usize> {
        self.0.iter().position(|&p| p == path)
    }
}

struct FixedHeader {
    mapping_offset: u64,
    program_trie_size: u64,
    program_trie_addr: u64,
    programs_pbl_set_pool_addr: u64,
    dylibs_pbl_set_addr: u64,
}

impl ContainerHeader for FixedHeader {
    fn mapping_offset(&self) -> u64 {
        self.mapping_offset
    }
    fn program_trie_size_field_offset(&self) -> u64 {
        0
    }
    fn program_trie_size(&self) -> u64 {
        self.program_trie_size
    }
    fn program_trie_addr(&self) -> u64 {
        self.program_trie_addr
    }
    fn programs_pbl_set_pool_addr(&self) -> u64 {
        self.programs_pbl_set_pool_addr
    }
    fn dylibs_pbl_set_addr(&self) -> u64 {
        self.dylibs_pbl_set_addr
    }
}

fn write_uleb128(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if v == 0 {
            break;
        }
    }
}

/// A minimal `PrebuiltLoaderSet` containing a single loader at `path`,
/// laid out at whatever offset it's written to in the backing cache.
fn minimal_set(path: &str) -> Vec<u8> {
    let loader_header_len = 8 + 68; // LoaderHeaderRaw + PrebuiltLoaderHeaderRaw
    let mut loader = vec![0u8; loader_header_len];
    loader[0..4].copy_from_slice(&0x6C34_7964u32.to_le_bytes());
    let path_offset = loader.len() as u16;
    loader.extend_from_slice(path.as_bytes());
    loader.push(0);
    loader[8..10].copy_from_slice(&path_offset.to_le_bytes());

    let set_header_len = 80;
    let mut set = vec![0u8; set_header_len];
    let loader_offset = set.len() as u32;
    set.extend_from_slice(&loader);

    let array_offset = set.len() as u32;
    set.extend_from_slice(&loader_offset.to_le_bytes());

    set[0..4].copy_from_slice(&0x7370_3464u32.to_le_bytes()); // "sp4d"
    set[12..16].copy_from_slice(&array_offset.to_le_bytes());
    set[16..20].copy_from_slice(&1u32.to_le_bytes()); // loaders_array_count
    set
}

/// A single-leaf trie mapping `exec_path` to `pool_offset`.
fn single_entry_trie(exec_path: &str, pool_offset: u64) -> Vec<u8> {
    let mut payload = Vec::new();
    write_uleb128(&mut payload, pool_offset);

    let mut leaf = Vec::new();
    write_uleb128(&mut leaf, payload.len() as u64);
    leaf.extend_from_slice(&payload);
    leaf.push(0); // child_count

    let mut root = Vec::new();
    write_uleb128(&mut root, 0); // terminal_size
    root.push(1); // child_count
    root.extend_from_slice(exec_path.as_bytes());
    root.push(0);
    let leaf_offset = root.len() + 1; // +1 for this uleb128 byte itself
    assert!(leaf_offset < 0x80);
    write_uleb128(&mut root, leaf_offset as u64);
    root.extend_from_slice(&leaf);
    root
}

fn build_cache(exec_path: &str, dylib_path: &str) -> (MemCache, u64, u64, u64) {
    let set = minimal_set(dylib_path);

    let trie_addr = 0x1000u64;
    let pool_addr = 0x2000u64;
    let dylibs_set_addr = 0x3000u64;

    let pool_offset = 0u64;
    let trie = single_entry_trie(exec_path, pool_offset);

    let mut bytes = vec![0u8; 0x4000];
    bytes[trie_addr as usize..trie_addr as usize + trie.len()].copy_from_slice(&trie);
    bytes[pool_addr as usize..pool_addr as usize + set.len()].copy_from_slice(&set);
    bytes[dylibs_set_addr as usize..dylibs_set_addr as usize + set.len()].copy_from_slice(&set);

    (MemCache { bytes }, trie_addr, pool_addr, dylibs_set_addr)
}

#[test]
fn get_launch_loader_set_resolves_exec_path_through_trie() {
    let (cache, trie_addr, pool_addr, _) = build_cache("/bin/a", "/usr/lib/libSystem.dylib");
    let header = FixedHeader {
        mapping_offset: 100,
        program_trie_size: 0x400,
        program_trie_addr: trie_addr,
        programs_pbl_set_pool_addr: pool_addr,
        dylibs_pbl_set_addr: 0,
    };
    let trie = BasicTrie;
    let images = Images(vec!["/usr/lib/libSystem.dylib"]);

    let set = facade::get_launch_loader_set(
        &header,
        &cache,
        &trie,
        &images,
        "/bin/a",
        DecodeOptions::default(),
    )
    .unwrap();

    assert_eq!(set.loaders.len(), 1);
    assert_eq!(set.loaders[0].path.as_deref(), Some("/usr/lib/libSystem.dylib"));
}

#[test]
fn for_each_launch_loader_set_path_matches_for_each_launch_loader_set() {
    let (cache, trie_addr, pool_addr, _) = build_cache("/bin/a", "/usr/lib/libSystem.dylib");
    let header = FixedHeader {
        mapping_offset: 100,
        program_trie_size: 0x400,
        program_trie_addr: trie_addr,
        programs_pbl_set_pool_addr: pool_addr,
        dylibs_pbl_set_addr: 0,
    };
    let trie = BasicTrie;
    let images = Images(vec!["/usr/lib/libSystem.dylib"]);

    let mut paths_only = Vec::new();
    facade::for_each_launch_loader_set_path(&header, &cache, &trie, |path| {
        paths_only.push(path.to_string());
        Ok(())
    })
    .unwrap();

    let mut paths_with_sets = Vec::new();
    facade::for_each_launch_loader_set(&header, &cache, &trie, &images, DecodeOptions::default(), |path, _set| {
        paths_with_sets.push(path.to_string());
        Ok(())
    })
    .unwrap();

    assert_eq!(paths_only, paths_with_sets);
    assert_eq!(paths_only, vec!["/bin/a".to_string()]);
}

#[test]
fn get_dylib_prebuilt_loader_resolves_via_image_table() {
    let (cache, _, _, dylibs_set_addr) = build_cache("/bin/a", "/usr/lib/libSystem.dylib");
    let header = FixedHeader {
        mapping_offset: 100,
        program_trie_size: 0x400,
        program_trie_addr: 0x1000,
        programs_pbl_set_pool_addr: 0x2000,
        dylibs_pbl_set_addr: dylibs_set_addr,
    };
    let images = Images(vec!["/usr/lib/libSystem.dylib"]);

    let loader = facade::get_dylib_prebuilt_loader(
        &header,
        &cache,
        &images,
        "/usr/lib/libSystem.dylib",
        DecodeOptions::default(),
    )
    .unwrap();

    assert_eq!(loader.path.as_deref(), Some("/usr/lib/libSystem.dylib"));
}

#[test]
fn get_dylib_prebuilt_loader_reports_image_not_found() {
    let (cache, _, _, dylibs_set_addr) = build_cache("/bin/a", "/usr/lib/libSystem.dylib");
    let header = FixedHeader {
        mapping_offset: 100,
        program_trie_size: 0x400,
        program_trie_addr: 0x1000,
        programs_pbl_set_pool_addr: 0x2000,
        dylibs_pbl_set_addr: dylibs_set_addr,
    };
    let images = Images(vec!["/usr/lib/libSystem.dylib"]);

    let err = facade::get_dylib_prebuilt_loader(
        &header,
        &cache,
        &images,
        "/usr/lib/libOther.dylib",
        DecodeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::ImageNotFound(_)));
}

#[test]
fn unsupported_container_rejects_every_entry_point_without_touching_the_stream() {
    struct TooSmall;
    impl ContainerHeader for TooSmall {
        fn mapping_offset(&self) -> u64 {
            4
        }
        fn program_trie_size_field_offset(&self) -> u64 {
            40
        }
        fn program_trie_size(&self) -> u64 {
            0
        }
        fn program_trie_addr(&self) -> u64 {
            0
        }
        fn programs_pbl_set_pool_addr(&self) -> u64 {
            0
        }
        fn dylibs_pbl_set_addr(&self) -> u64 {
            0
        }
    }

    let cache = MemCache { bytes: Vec::new() };
    let trie = BasicTrie;
    let images = Images(vec![]);

    assert!(matches!(
        facade::get_launch_loader_set(&TooSmall, &cache, &trie, &images, "/bin/a", DecodeOptions::default())
            .unwrap_err(),
        Error::Unsupported
    ));
    assert!(matches!(
        facade::get_dylib_prebuilt_loader(&TooSmall, &cache, &images, "/bin/a", DecodeOptions::default())
            .unwrap_err(),
        Error::Unsupported
    ));
    assert!(matches!(
        facade::for_each_launch_loader_set_path(&TooSmall, &cache, &trie, |_| Ok(())).unwrap_err(),
        Error::Unsupported
    ));
    assert!(!facade::is_supported(&TooSmall));
}
