pub mod token;

pub use token::{AccessToken, TokenCache, TokenSource};
