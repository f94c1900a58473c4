//! CLI commands implementation

pub mod comments;
pub mod ingest;
pub mod init;
pub mod status;
pub mod video;

pub use comments::*;
pub use ingest::*;
pub use init::*;
pub use status::*;
pub use video::*;
