use std::fmt;

/// Stored procedures the relay is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    ScanItem,
    UnscanItem,
    ListScans,
    Finalize,
    Meta,
    ListItems,
    ReturnItem,
}

impl Procedure {
    pub const ALL: [Procedure; 7] = [
        Procedure::ScanItem,
        Procedure::UnscanItem,
        Procedure::ListScans,
        Procedure::Finalize,
        Procedure::Meta,
        Procedure::ListItems,
        Procedure::ReturnItem,
    ];

    /// Name under `/rest/v1/rpc/`.
    pub fn name(self) -> &'static str {
        match self {
            Procedure::ScanItem => "scan_dispatch_item",
            Procedure::UnscanItem => "unscan_dispatch_item",
            Procedure::ListScans => "list_dispatch_scans",
            Procedure::Finalize => "finalize_dispatch",
            Procedure::Meta => "get_dispatch_meta",
            Procedure::ListItems => "list_dispatch_items",
            Procedure::ReturnItem => "return_dispatch_item",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = Procedure::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), Procedure::ALL.len());
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(Procedure::ScanItem.to_string(), "scan_dispatch_item");
        assert_eq!(Procedure::Finalize.to_string(), "finalize_dispatch");
    }
}
