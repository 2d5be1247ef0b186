pub mod credentials;

pub use credentials::{KeychainTokenStore, MemoryTokenStore, TokenStore, TOKEN_KEY};
