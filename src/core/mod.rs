pub mod model;
pub mod output;
pub mod source;

pub use model::{Manga, Chapter, Page};
pub use output::AtomicWriter;
pub use source::{Source, SourceOutput};
