pub mod extractor;
pub mod token;

pub use extractor::{DEVICE_ID_HEADER, bearer_token, device_id};
pub use token::match_device_token;
