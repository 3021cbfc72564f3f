//! Default pipeline stages.
//!
//! 1. **FetchStage** - Export source documents as HTML
//! 2. **AssetStage** - Download and optimize referenced images
//! 3. **TransformStage** - Clean exported markup into page content
//! 4. **BindStage** - Render content into the page templates
//! 5. **WriteStage** - Check out a working copy and write generated files
//! 6. **FormatStage** - Run the repository formatter over written files
//! 7. **PublishStage** - Commit and push the branch

mod assets;
mod bind;
mod fetch;
mod format;
mod publish;
mod transform;
mod write;

pub use assets::AssetStage;
pub use bind::BindStage;
pub use fetch::FetchStage;
pub use format::FormatStage;
pub use publish::PublishStage;
pub use transform::TransformStage;
pub use write::WriteStage;
