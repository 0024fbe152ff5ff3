//! Replacement mappings and the text rewrite they drive.
//!
//! A [`ReplacementPlan`] is an ordered list of old-id → new-id mappings
//! collected across accounts, regions, and patterns. Applying a plan is a
//! plain substring rewrite: no YAML/JSON/HCL parsing, so surrounding
//! formatting and comments survive untouched, and applying the same plan
//! twice is a no-op because the old ids no longer occur.

use crate::errors::Result;
use regex::Regex;
use std::collections::HashSet;

/// The literal prefix that distinguishes an image id from a name pattern.
pub const IMAGE_ID_PREFIX: &str = "ami-";

/// Image identifier syntax: fixed prefix plus 8-17 lowercase hex characters.
pub const IMAGE_ID_PATTERN: &str = r"ami-[a-f0-9]{8,17}";

/// A directive to substitute one stale image id with its resolved successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementMapping {
    /// The stale image id to replace.
    pub old_id: String,
    /// The id of the most recent image in the same family.
    pub new_id: String,
    /// The name of the stale image, kept for reporting.
    pub name: String,
}

/// An ordered collection of replacement mappings.
///
/// Mappings are kept in discovery order (account, then region, then
/// pattern). Duplicates are not collapsed: each mapping rewrites a unique
/// token, so re-applying one is harmless.
#[derive(Debug, Clone, Default)]
pub struct ReplacementPlan {
    mappings: Vec<ReplacementMapping>,
}

impl ReplacementPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single mapping.
    pub fn push(&mut self, mapping: ReplacementMapping) {
        self.mappings.push(mapping);
    }

    /// Appends all mappings from `iter`, preserving their order.
    pub fn extend<I: IntoIterator<Item = ReplacementMapping>>(&mut self, iter: I) {
        self.mappings.extend(iter);
    }

    /// The mappings in discovery order.
    pub fn mappings(&self) -> &[ReplacementMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Applies every mapping to `content` and returns the rewritten text
    /// together with the total number of substitutions.
    ///
    /// Occurrences are counted against the current (possibly already
    /// rewritten) content, mapping by mapping. When nothing matches, the
    /// returned string equals the input and the count is zero.
    pub fn apply_to(&self, content: &str) -> (String, usize) {
        let mut new_content = content.to_string();
        let mut total = 0;

        for mapping in &self.mappings {
            let count = new_content.matches(&mapping.old_id).count();
            if count > 0 {
                new_content = new_content.replace(&mapping.old_id, &mapping.new_id);
                total += count;
            }
        }

        (new_content, total)
    }
}

/// Scans `content` for literal image id tokens and returns the deduplicated
/// set in first-seen order.
pub fn extract_image_ids(content: &str) -> Result<Vec<String>> {
    let id_regex = Regex::new(IMAGE_ID_PATTERN)?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for found in id_regex.find_iter(content) {
        if seen.insert(found.as_str()) {
            ids.push(found.as_str().to_string());
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(old_id: &str, new_id: &str) -> ReplacementMapping {
        ReplacementMapping {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
            name: format!("image-{old_id}"),
        }
    }

    #[test]
    fn rewrites_every_stale_id_to_the_latest() {
        let mut plan = ReplacementPlan::new();
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));
        plan.push(mapping("ami-cccc3333", "ami-bbbb2222"));

        let (rewritten, count) = plan.apply_to("use ami-aaaa1111 and ami-cccc3333");
        assert_eq!(rewritten, "use ami-bbbb2222 and ami-bbbb2222");
        assert_eq!(count, 2);
    }

    #[test]
    fn counts_repeated_occurrences_of_one_id() {
        let mut plan = ReplacementPlan::new();
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));

        let content = "ami: ami-aaaa1111\nfallback: ami-aaaa1111\n";
        let (rewritten, count) = plan.apply_to(content);
        assert_eq!(count, 2);
        assert!(!rewritten.contains("ami-aaaa1111"));
    }

    #[test]
    fn is_a_no_op_on_non_matching_content() {
        let mut plan = ReplacementPlan::new();
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));

        let content = "instance_type: t3.micro\n";
        let (rewritten, count) = plan.apply_to(content);
        assert_eq!(rewritten, content);
        assert_eq!(count, 0);
    }

    #[test]
    fn applying_twice_changes_nothing_further() {
        let mut plan = ReplacementPlan::new();
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));
        plan.push(mapping("ami-cccc3333", "ami-bbbb2222"));

        let (first, first_count) = plan.apply_to("ami-aaaa1111 ami-cccc3333");
        assert_eq!(first_count, 2);

        let (second, second_count) = plan.apply_to(&first);
        assert_eq!(second, first);
        assert_eq!(second_count, 0);
    }

    #[test]
    fn duplicate_mappings_apply_idempotently() {
        let mut plan = ReplacementPlan::new();
        // The same mapping discovered through two query paths.
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));
        plan.push(mapping("ami-aaaa1111", "ami-bbbb2222"));

        let (rewritten, count) = plan.apply_to("id: ami-aaaa1111");
        assert_eq!(rewritten, "id: ami-bbbb2222");
        assert_eq!(count, 1);
    }

    #[test]
    fn extracts_deduplicated_ids() {
        let content = "a: ami-0123456789abcdef0\nb: ami-deadbeef\na2: ami-0123456789abcdef0\n";
        let ids = extract_image_ids(content).unwrap();
        assert_eq!(ids, vec!["ami-0123456789abcdef0", "ami-deadbeef"]);
    }

    #[test]
    fn extraction_respects_id_syntax() {
        // Too short (7 hex chars) and uppercase hex are not ids.
        let ids = extract_image_ids("ami-abc1234 ami-DEADBEEF00").unwrap();
        assert!(ids.is_empty());

        let ids = extract_image_ids("ami-abcd1234").unwrap();
        assert_eq!(ids, vec!["ami-abcd1234"]);
    }
}
