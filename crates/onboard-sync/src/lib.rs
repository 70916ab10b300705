//! Sync layer: adapters from the pipeline's collaborator ports to real services.

mod fs;
pub use fs::FsBlobSource;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{
    HttpBlobSource, HttpEmbedder, HttpFormService, HttpMatcher, HttpPrefillGenerator, SyncClient,
    SyncError,
};
