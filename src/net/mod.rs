pub mod framing;
pub mod protocol;
pub mod session;
pub mod snapshot;
pub mod viewer;
