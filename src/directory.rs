//! The image directory capability the resolver is built against.

use crate::errors::Result;
use chrono::{DateTime, Utc};

/// A versioned, immutable machine image tracked by the directory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// The provider-assigned, opaque image id.
    pub image_id: String,
    /// The human-oriented image name.
    pub name: String,
    /// When the image was registered.
    pub created_at: DateTime<Utc>,
    /// The account that owns the image.
    pub owner: String,
    /// The region the image lives in.
    pub region: String,
}

/// Lookup capability over a provider's image catalog.
///
/// Implementations answer two kinds of question: "does this exact id exist
/// for this owner" and "which images match this name glob". A missing exact
/// id is `Ok(None)`, distinct from transport or auth failures which are
/// `Err`. Name globs use provider-side semantics: `*` matches any sequence,
/// everything else is a case-sensitive literal.
pub trait ImageDirectory {
    /// Looks up a single image by its exact id under `owner` in `region`.
    fn find_by_id(&self, owner: &str, region: &str, image_id: &str)
        -> Result<Option<ImageRecord>>;

    /// Returns every image owned by `owner` in `region` whose name matches
    /// the glob `pattern`. The result order carries no guarantee.
    fn find_by_name(&self, owner: &str, region: &str, pattern: &str) -> Result<Vec<ImageRecord>>;
}
