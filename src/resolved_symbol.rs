//! `ResolvedSymbol`: an image-table index paired with the display name
//! resolved from it. Used wherever a loader record references another
//! image by index and the record decoder resolves the name eagerly
//! (dependents, twins) rather than leaving callers to re-look it up.

/// An index into the owning set's image table together with the name
/// resolved from it, or a textual fallback when the table has no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub index: usize,
    pub name: String,
}

impl ResolvedSymbol {
    pub fn resolve(
        index: usize,
        image_name: &dyn Fn(usize) -> Option<String>,
        fallback: impl FnOnce() -> String,
    ) -> Self {
        let name = image_name(index).unwrap_or_else(fallback);
        ResolvedSymbol { index, name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_image_table_over_fallback() {
        let sym = ResolvedSymbol::resolve(3, &|i| Some(format!("image#{i}")), || "fallback".to_string());
        assert_eq!(sym.name, "image#3");
    }

    #[test]
    fn resolve_falls_back_when_table_has_no_entry() {
        let sym = ResolvedSymbol::resolve(9, &|_| None, || "fallback".to_string());
        assert_eq!(sym.name, "fallback");
    }
}
