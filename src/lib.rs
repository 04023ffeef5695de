pub mod checksum;
pub mod codec;
pub mod error;
pub mod header;
pub mod metadata;
pub mod reader;
pub mod table;
pub mod validate;
pub mod writer;

pub use codec::Variant;
pub use error::{PackError, PackResult};
pub use header::{Header, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use metadata::ModMetadata;
pub use reader::ModPack;
pub use table::FileEntry;
pub use validate::{validate, Report};
pub use writer::{pack_dir, PackOptions, PackSummary};
