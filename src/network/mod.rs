pub mod client;
pub mod protocol;
pub mod io;
pub mod tls;

#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use protocol::*;
pub use io::*;
pub use tls::*;
