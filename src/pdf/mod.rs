// src/pdf/mod.rs
pub mod backend;
pub mod page;
pub mod structure;
pub mod subset;

#[allow(unused_imports)]
pub use backend::{LopdfBackend, PdfBackend, PdfDocument, PdftotextBackend};
pub use page::{Columns, Page};
pub use structure::{DoclingCli, StructureRecognizer};
pub use subset::write_page_subset;
