pub mod clock;
pub mod filename;
pub mod fs;
pub mod http_client;
