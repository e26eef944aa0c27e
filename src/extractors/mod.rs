// src/extractors/mod.rs
pub mod locator;
pub mod section;
pub mod table;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use section::{
    FixedPageStrategy,
    Section,
    SectionStrategy,
    SectionTarget,
    UntilTotalStrategy,
};
#[allow(unused_imports)]
pub use table::{
    CandidateRow,
    StructureTableStrategy,
    TableInput,
    TableResult,
    TableSource,
    TableStrategy,
    TextTableStrategy,
};
