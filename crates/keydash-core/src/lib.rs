pub mod api_key;
pub mod listing;

pub use api_key::{
    generate_key, ApiKey, CreateApiKey, KeyStatus, NewApiKey, UpdateApiKey, ValidationOutcome,
    DEFAULT_KEY_NAME, DEFAULT_KEY_PREFIX, GENERATED_KEY_LEN,
};
pub use listing::{filter_api_keys, paginate, Page, DEFAULT_PER_PAGE};
