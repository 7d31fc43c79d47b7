pub mod codec;
pub mod host;
pub mod outbox;
pub mod router;

pub use host::serve;
pub use outbox::Outbox;
pub use router::MessageRouter;
