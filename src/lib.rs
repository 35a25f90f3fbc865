mod archive;
mod checksum;
mod compression;
mod error;
mod header;
mod pem;
mod read;
mod signer;
pub mod toc;
mod tree;

pub use self::archive::*;
pub use self::checksum::*;
pub use self::compression::*;
pub use self::error::*;
pub use self::header::*;
pub use self::pem::*;
pub use self::read::*;
pub use self::signer::*;
pub use self::tree::*;
