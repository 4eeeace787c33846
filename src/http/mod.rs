pub mod types;
pub mod client;
pub mod testing;

pub use client::{HttpClient, HttpSession, DEFAULT_USER_AGENT};
pub use types::{HttpRequest, HttpResponse, RequestBody, UploadFile};
