//! Domain services.

pub mod credentials;
pub mod feed;
pub mod outbox;

pub use credentials::CredentialService;
pub use feed::FeedService;
pub use outbox::Outbox;
