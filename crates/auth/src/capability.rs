use serde::{Deserialize, Serialize};

/// Operations gated by [`crate::authorize`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Open a reorder request against a supplier.
    CreateReorder,
    /// See a reorder request and its timeline.
    ReadReorder,
    /// Append a discussion note.
    AnnotateReorder,
    /// Move a request to acknowledged / in_progress / shipped.
    SupplierTransition,
    /// Move a request to delivered / rejected.
    StaffTransition,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateReorder => "create_reorder",
            Capability::ReadReorder => "read_reorder",
            Capability::AnnotateReorder => "annotate_reorder",
            Capability::SupplierTransition => "supplier_transition",
            Capability::StaffTransition => "staff_transition",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
