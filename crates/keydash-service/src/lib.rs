mod fingerprint;
mod http;
mod local;
mod traits;

pub use fingerprint::{key_fingerprint, sha256_hex};
pub use http::HttpService;
pub use local::LocalService;
pub use traits::{KeyService, ServiceError};
