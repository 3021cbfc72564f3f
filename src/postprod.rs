pub mod assets;
pub mod auth;
pub mod fetch;
mod formatter;
pub mod layout;
mod markup;
pub mod metadata;
pub mod pipeline;
pub mod request;
mod result;
mod runner;
mod template;
mod transform;
mod writer;

pub use metadata::PuzzleMetadata;
pub use request::{DocumentRef, ImageWidth, PostprodRequest};
pub use result::{PublishResult, Rejection};
pub use runner::Postprod;
