//! Pipeline context for sharing services across stages.

use crate::config::{FormatterConfig, LayoutConfig};
use crate::git::HuntRepo;
use crate::postprod::assets::AssetSource;
use crate::postprod::fetch::DocumentService;
use crate::postprod::template::Binder;

/// Shared context for pipeline stages.
///
/// Holds the services and configuration every run uses. Per-run state lives
/// in [`PostprodRun`](super::PostprodRun).
pub struct PipelineContext<'a> {
    // === Services ===
    /// Exports documents as HTML
    pub documents: &'a dyn DocumentService,

    /// Downloads image bytes
    pub assets: &'a dyn AssetSource,

    /// Page template renderer
    pub binder: &'a Binder,

    /// Remote hunt repository
    pub repository: &'a HuntRepo,

    // === Configuration ===
    pub layout: &'a LayoutConfig,

    pub formatter: &'a FormatterConfig,
}
