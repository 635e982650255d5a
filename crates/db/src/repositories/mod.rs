//! Repository implementations backed by SeaORM.

pub mod listing;
pub mod upload;

pub use listing::ListingRepository;
pub use upload::UploadRepository;
