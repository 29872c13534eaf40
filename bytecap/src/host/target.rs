//! Which packages get a capture session

/// Lookup of class names in the target application's class loader
pub trait ClassProbe {
    fn class_exists(&self, name: &str) -> bool;
}

impl<F> ClassProbe for F
where
    F: Fn(&str) -> bool,
{
    fn class_exists(&self, name: &str) -> bool {
        self(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelector {
    packages: Vec<String>,
    packed_entries: Vec<String>,
}

impl TargetSelector {
    pub fn new(packages: Vec<String>, packed_entries: Vec<String>) -> Self {
        Self {
            packages,
            packed_entries,
        }
    }

    /// Exact package-name membership
    pub fn is_target(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }

    /// Whether a packer entry is required before installing
    pub fn requires_packed_entry(&self) -> bool {
        !self.packed_entries.is_empty()
    }

    /// First configured packer entry class present in the app
    pub fn find_packed_entry<P: ClassProbe + ?Sized>(&self, probe: &P) -> Option<&str> {
        self.packed_entries
            .iter()
            .map(String::as_str)
            .find(|entry| probe.class_exists(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> TargetSelector {
        TargetSelector::new(
            vec!["com.sfysoft.shellingtest".to_string()],
            vec!["com.stub.StubApp".to_string(), "s.h.e.l.l.S".to_string()],
        )
    }

    #[test]
    fn test_is_target_exact_match() {
        let selector = selector();
        assert!(selector.is_target("com.sfysoft.shellingtest"));
        assert!(!selector.is_target("com.sfysoft"));
        assert!(!selector.is_target("com.sfysoft.shellingtest.debug"));
    }

    #[test]
    fn test_find_packed_entry_in_configured_order() {
        let selector = selector();
        let probe = |name: &str| name == "s.h.e.l.l.S" || name == "com.stub.StubApp";
        assert_eq!(selector.find_packed_entry(&probe), Some("com.stub.StubApp"));

        let probe = |name: &str| name == "s.h.e.l.l.S";
        assert_eq!(selector.find_packed_entry(&probe), Some("s.h.e.l.l.S"));

        let probe = |_: &str| false;
        assert_eq!(selector.find_packed_entry(&probe), None);
    }

    #[test]
    fn test_no_packed_entries_means_no_requirement() {
        let selector = TargetSelector::new(vec!["com.example".to_string()], Vec::new());
        assert!(!selector.requires_packed_entry());
        assert!(selector.is_target("com.example"));
    }
}
