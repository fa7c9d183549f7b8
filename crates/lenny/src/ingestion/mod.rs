//! Offline index building: PDF → text → chunks → embeddings → index files

mod builder;
mod chunker;
mod parser;

pub use builder::{BuildReport, IndexBuilder};
pub use chunker::SentenceChunker;
pub use parser::{ExtractedPdf, PdfExtractor};
