//! Resolution of stale image references to their latest successors.
//!
//! Input tokens come in two flavors, told apart once, here, by their
//! prefix: a literal image id ("this one specific reference, find its
//! successor", zero or one mapping out) or a name glob ("this whole
//! family, collapse every member onto the newest", zero or more mappings
//! out). Downstream components only ever see the already-classified mode.

use crate::directory::{ImageDirectory, ImageRecord};
use crate::errors::Result;
use crate::plan::{ReplacementMapping, ReplacementPlan, IMAGE_ID_PREFIX};
use log::{debug, warn};

/// A rule for generalizing a compound image name back into the glob that
/// matches its whole family.
///
/// An exact-id lookup yields one concrete name like
/// `bottlerocket-aws-ecs-2-aarch64-v1.19.0-abc123`; re-querying with that
/// literal name rarely finds newer versions. When a name contains the
/// rule's family token, the rule's glob is searched instead.
#[derive(Debug, Clone)]
pub struct FamilyRule {
    token: String,
    glob: String,
}

impl FamilyRule {
    pub fn new(token: impl Into<String>, glob: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            glob: glob.into(),
        }
    }

    fn applies_to(&self, name: &str) -> bool {
        name.contains(&self.token)
    }
}

/// The family rules known to ship in image fleets this tool is pointed at.
pub fn default_family_rules() -> Vec<FamilyRule> {
    vec![FamilyRule::new(
        "bottlerocket-aws-ecs-2-aarch64-",
        "bottlerocket-aws-ecs-2-aarch64-*",
    )]
}

/// How an input token is interpreted.
enum PatternKind<'a> {
    /// A literal image id (`ami-` prefixed).
    ImageId(&'a str),
    /// A name glob to match against image names.
    NameGlob(&'a str),
}

fn classify(pattern: &str) -> PatternKind<'_> {
    if pattern.starts_with(IMAGE_ID_PREFIX) {
        PatternKind::ImageId(pattern)
    } else {
        PatternKind::NameGlob(pattern)
    }
}

/// Computes replacement mappings by querying an [`ImageDirectory`].
pub struct Resolver<D> {
    directory: D,
    family_rules: Vec<FamilyRule>,
}

impl<D: ImageDirectory> Resolver<D> {
    /// Creates a resolver with the default family rules.
    pub fn new(directory: D) -> Self {
        Self::with_family_rules(directory, default_family_rules())
    }

    /// Creates a resolver with a caller-supplied family rule set.
    pub fn with_family_rules(directory: D, family_rules: Vec<FamilyRule>) -> Self {
        Self {
            directory,
            family_rules,
        }
    }

    /// Resolves a single input token under one (owner, region) pair.
    pub fn resolve(
        &self,
        owner: &str,
        region: &str,
        pattern: &str,
    ) -> Result<Vec<ReplacementMapping>> {
        match classify(pattern) {
            PatternKind::ImageId(image_id) => self.resolve_image_id(owner, region, image_id),
            PatternKind::NameGlob(glob) => self.resolve_name_glob(owner, region, glob),
        }
    }

    /// Resolves every pattern for one (owner, region) pair. The first
    /// query failure aborts the pair.
    pub fn resolve_pair(
        &self,
        owner: &str,
        region: &str,
        patterns: &[String],
    ) -> Result<Vec<ReplacementMapping>> {
        let mut mappings = Vec::new();
        for pattern in patterns {
            mappings.extend(self.resolve(owner, region, pattern)?);
        }
        Ok(mappings)
    }

    /// Builds a best-effort plan across every account and region.
    ///
    /// Mappings are concatenated in discovery order: accounts outer,
    /// regions inner, patterns innermost. A query failure for one
    /// (account, region) pair is logged as a warning and that pair
    /// contributes nothing; the sweep continues.
    pub fn resolve_all(
        &self,
        accounts: &[String],
        regions: &[String],
        patterns: &[String],
    ) -> ReplacementPlan {
        let mut plan = ReplacementPlan::new();

        for account in accounts {
            debug!("processing account {account}");

            for region in regions {
                debug!("  processing region {region}");

                match self.resolve_pair(account, region, patterns) {
                    Ok(mappings) => {
                        debug!("    found {} image replacements", mappings.len());
                        plan.extend(mappings);
                    }
                    Err(err) => {
                        warn!("failed to query images for account {account} in {region}: {err}");
                    }
                }
            }
        }

        plan
    }

    /// Exact-id mode: find the referenced image, generalize its name into
    /// a family search pattern, and map the id onto the family's newest
    /// member if that differs.
    ///
    /// An id absent from this owner/region is silently skipped: the image
    /// may already have been deregistered, or never existed in this
    /// account.
    fn resolve_image_id(
        &self,
        owner: &str,
        region: &str,
        image_id: &str,
    ) -> Result<Vec<ReplacementMapping>> {
        let Some(origin) = self.directory.find_by_id(owner, region, image_id)? else {
            debug!("image {image_id} not found for {owner} in {region}, skipping");
            return Ok(Vec::new());
        };

        let pattern = self.derive_search_pattern(&origin.name);
        let mut candidates = self.directory.find_by_name(owner, region, &pattern)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        sort_newest_first(&mut candidates);

        let latest = &candidates[0];
        if latest.image_id == origin.image_id {
            return Ok(Vec::new());
        }

        Ok(vec![ReplacementMapping {
            old_id: origin.image_id,
            new_id: latest.image_id.clone(),
            name: origin.name,
        }])
    }

    /// Name-glob mode: every matching image except the newest maps onto
    /// the newest.
    fn resolve_name_glob(
        &self,
        owner: &str,
        region: &str,
        glob: &str,
    ) -> Result<Vec<ReplacementMapping>> {
        let mut candidates = self.directory.find_by_name(owner, region, glob)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        sort_newest_first(&mut candidates);

        let latest_id = candidates[0].image_id.clone();
        Ok(candidates[1..]
            .iter()
            .map(|candidate| ReplacementMapping {
                old_id: candidate.image_id.clone(),
                new_id: latest_id.clone(),
                name: candidate.name.clone(),
            })
            .collect())
    }

    /// Generalizes a concrete image name into the pattern used to find its
    /// siblings: the first matching family rule's glob, or the literal
    /// name when no rule applies.
    fn derive_search_pattern(&self, name: &str) -> String {
        self.family_rules
            .iter()
            .find(|rule| rule.applies_to(name))
            .map(|rule| rule.glob.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

/// Most recent first. `sort_by` is stable, so candidates with equal
/// timestamps keep their query order; the provider guarantees no
/// secondary key.
fn sort_newest_first(records: &mut [ImageRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
