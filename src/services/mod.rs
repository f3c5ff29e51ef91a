pub mod catalog_loader;
pub mod result_archiver;

pub use catalog_loader::CatalogLoader;
pub use result_archiver::{archive_key, ResultArchiver, RESULT_CONTENT_TYPE, RESULT_FILE_NAME};
