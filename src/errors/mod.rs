pub mod types;
pub mod classification;
pub mod retry;

pub use types::FlaghuntError;
pub use classification::ErrorClassification;
pub use retry::{parse_retry_delay, DEFAULT_RETRY_DELAY_SECS};
