pub mod multipart;
pub mod request;
pub mod response;

// Re-exports for convenience
pub use multipart::{MultipartEvent, MultipartParser};
pub use request::LoadRequest;
pub use response::LoadResponse;
