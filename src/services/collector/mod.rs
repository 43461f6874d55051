pub mod transport;
pub mod wire;

pub use transport::{HttpTransport, Transport, TransportFuture};
pub use wire::{FormBody, HeartbeatRequest, RegisterRequest, RetractRequest};
