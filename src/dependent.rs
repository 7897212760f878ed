//! `DependentKind` and the materialized `Dependent` entry zipping a
//! dependency's `LoaderRef` with its link kind and display name.

use crate::loader_ref::LoaderRef;
use crate::resolved_symbol::ResolvedSymbol;

/// The four link kinds a Mach-O `LC_*_DYLIB` load command can express.
/// spec.md names `Normal` and `Reexport` explicitly; `Weak` and `Upward`
/// are supplemented from the same family (see SPEC_FULL §4). An
/// unrecognized byte is not a structural error; it decodes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentKind {
    Normal,
    Weak,
    Reexport,
    Upward,
    Unknown(u8),
}

impl DependentKind {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => DependentKind::Normal,
            1 => DependentKind::Weak,
            2 => DependentKind::Reexport,
            3 => DependentKind::Upward,
            other => DependentKind::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            DependentKind::Normal => 0,
            DependentKind::Weak => 1,
            DependentKind::Reexport => 2,
            DependentKind::Upward => 3,
            DependentKind::Unknown(b) => b,
        }
    }
}

impl Default for DependentKind {
    fn default() -> Self {
        DependentKind::Normal
    }
}

/// One dependency of a `PrebuiltLoader`, as materialized by the record
/// decoder: the raw ref, its kind, and a display name resolved from the
/// owning set's image table (or the ref's textual rendering if the index
/// is out of range).
#[derive(Debug, Clone)]
pub struct Dependent {
    pub loader_ref: LoaderRef,
    pub kind: DependentKind,
    pub resolved: ResolvedSymbol,
}
