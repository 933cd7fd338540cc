pub mod errors;
pub mod http;
pub mod logger;
pub mod output;
pub mod paths;
pub mod pem;

pub use errors::*;
pub use logger::Logger;
pub use output::*;
pub use paths::*;
