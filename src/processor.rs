//! Applies a replacement plan to files on disk, with backup-on-write safety.
//!
//! Before a file is rewritten its original bytes go to a `.backup` sibling;
//! if that backup cannot be written the target stays untouched. Files where
//! nothing matches are never written at all.

use crate::cli::ExtractFormat;
use crate::errors::{Error, Result};
use crate::plan::{extract_image_ids, ReplacementPlan, IMAGE_ID_PATTERN};
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Suffix of the sibling file holding a target's pre-rewrite content.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Extensions treated as text configuration without looking at content.
const TEXT_EXTENSIONS: &[&str] = &[
    "yaml", "yml", "json", "txt", "tf", "hcl", "conf", "cfg", "ini", "env", "sh", "bash", "zsh",
    "fish", "ps1", "bat", "cmd", "xml", "toml",
];

/// The outcome of processing a single file.
#[derive(Debug)]
pub struct FileMutationResult {
    /// The processed file.
    pub path: PathBuf,
    /// How many image references were rewritten.
    pub substitutions: usize,
    /// Where the pre-rewrite content was saved, if a write occurred.
    pub backup_path: Option<PathBuf>,
}

/// Aggregate counts for a directory sweep.
#[derive(Debug, Default)]
pub struct DirectoryStats {
    /// Files that were actually rewritten (not merely scanned).
    pub files_touched: usize,
    /// Total substitutions across all rewritten files.
    pub total_substitutions: usize,
}

/// Rewrites image references in files and file trees according to a plan.
pub struct FileProcessor {
    plan: ReplacementPlan,
}

impl FileProcessor {
    pub fn new(plan: ReplacementPlan) -> Self {
        Self { plan }
    }

    /// Processes a single file.
    ///
    /// 1. Read the full content (unreadable file: error).
    /// 2. Apply the plan.
    /// 3. Zero substitutions: no write, no backup, filesystem untouched.
    /// 4. Otherwise: write the original bytes to `path + ".backup"`
    ///    (overwriting any prior backup), then atomically replace `path`
    ///    with the rewritten content, preserving its permissions. If the
    ///    backup write fails the target is left unmodified.
    pub fn process_file(&self, path: &Path) -> Result<FileMutationResult> {
        let original = fs::read_to_string(path)?;
        let (rewritten, substitutions) = self.plan.apply_to(&original);

        if substitutions == 0 {
            debug!("no image replacements needed in {}", path.display());
            return Ok(FileMutationResult {
                path: path.to_path_buf(),
                substitutions: 0,
                backup_path: None,
            });
        }

        let permissions = fs::metadata(path)?.permissions();
        let backup_path = backup_path_for(path);
        fs::write(&backup_path, original.as_bytes()).map_err(|source| Error::Backup {
            path: backup_path.clone(),
            source,
        })?;
        fs::set_permissions(&backup_path, permissions.clone()).map_err(|source| Error::Backup {
            path: backup_path.clone(),
            source,
        })?;

        self.replace_content(path, &rewritten, permissions)?;

        info!(
            "updated {substitutions} image references in {} (backup created at {})",
            path.display(),
            backup_path.display()
        );

        Ok(FileMutationResult {
            path: path.to_path_buf(),
            substitutions,
            backup_path: Some(backup_path),
        })
    }

    /// Atomically replaces `path` with `content` via a sibling tempfile.
    fn replace_content(
        &self,
        path: &Path,
        content: &str,
        permissions: fs::Permissions,
    ) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        fs::set_permissions(temp_file.path(), permissions)?;
        temp_file.persist(path)?;

        Ok(())
    }

    /// Recursively processes every candidate file under `root`.
    ///
    /// A traversal error aborts the whole sweep; a mutation failure on one
    /// file is logged and the sweep continues. The returned counts cover
    /// only files that were actually rewritten.
    pub fn process_directory(&self, root: &Path) -> Result<DirectoryStats> {
        let files = collect_candidates(root)?;
        let mut stats = DirectoryStats::default();

        for file in &files {
            match self.process_file(file) {
                Ok(result) if result.substitutions > 0 => {
                    stats.files_touched += 1;
                    stats.total_substitutions += result.substitutions;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("failed to process {}: {err}", file.display());
                }
            }
        }

        info!(
            "total image replacements: {} across {} files",
            stats.total_substitutions, stats.files_touched
        );

        Ok(stats)
    }
}

/// The `.backup` sibling path for a target file.
fn backup_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(BACKUP_SUFFIX);
    PathBuf::from(os)
}

/// Collects candidate files under `root`: regular files whose extension is
/// a known text format, or whose content carries at least one image id
/// (the sniff covers unlabeled files). Backup siblings are skipped so
/// repeated runs never reprocess their own output.
fn collect_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let sniffer = regex::bytes::Regex::new(IMAGE_ID_PATTERN)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() || path.to_string_lossy().ends_with(BACKUP_SUFFIX) {
            continue;
        }

        if is_candidate(path, &sniffer) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

fn is_candidate(path: &Path, sniffer: &regex::bytes::Regex) -> bool {
    if let Some(ext) = path.extension().and_then(|os| os.to_str()) {
        if TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }

    match fs::read(path) {
        Ok(content) => sniffer.is_match(&content),
        Err(_) => false,
    }
}

/// Scans a file for literal image id tokens and returns the deduplicated
/// set. Used to auto-discover which references a target file carries.
pub fn find_images_in_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    extract_image_ids(&content)
}

/// The main entry point for the `extract` command.
pub fn run_extract(file: PathBuf, format: ExtractFormat) -> Result<()> {
    let ids = find_images_in_file(&file)?;

    match format {
        ExtractFormat::Text => {
            for id in &ids {
                println!("{id}");
            }
        }
        ExtractFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&ids)?);
        }
    }

    Ok(())
}

/// The main entry point for the `undo` command.
///
/// Walks `dir` for `.backup` siblings and copies each one back over its
/// original. Unless `keep_backups` is set, restored backups are removed.
pub fn run_undo(dir: PathBuf, keep_backups: bool) -> Result<()> {
    let mut found = 0;
    let mut restored = 0;

    for entry in WalkDir::new(&dir) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let lossy = path.to_string_lossy();
        let Some(original) = lossy.strip_suffix(BACKUP_SUFFIX) else {
            continue;
        };

        found += 1;
        let original_path = PathBuf::from(original);
        fs::copy(path, &original_path)?;
        if !keep_backups {
            fs::remove_file(path)?;
        }
        restored += 1;
        println!("Restored {}", original_path.display());
    }

    println!("\nBackups found: {found}, restored: {restored}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ReplacementMapping;
    use tempfile::TempDir;

    fn plan_for(old_id: &str, new_id: &str) -> ReplacementPlan {
        let mut plan = ReplacementPlan::new();
        plan.push(ReplacementMapping {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
            name: "al2023-ami-2025.6.1-x86_64".to_string(),
        });
        plan
    }

    #[test]
    fn rewrites_file_and_saves_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("launch.yaml");
        fs::write(&target, "image_id: ami-aaaa1111\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let result = processor.process_file(&target).unwrap();

        assert_eq!(result.substitutions, 1);
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "image_id: ami-bbbb2222\n"
        );

        let backup = result.backup_path.unwrap();
        assert_eq!(
            fs::read_to_string(backup).unwrap(),
            "image_id: ami-aaaa1111\n"
        );
    }

    #[test]
    fn leaves_non_matching_file_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("launch.yaml");
        fs::write(&target, "image_id: ami-ffff9999\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let result = processor.process_file(&target).unwrap();

        assert_eq!(result.substitutions, 0);
        assert!(result.backup_path.is_none());
        assert!(!backup_path_for(&target).exists());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "image_id: ami-ffff9999\n"
        );
    }

    #[test]
    fn failed_backup_leaves_target_unmodified() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("launch.yaml");
        fs::write(&target, "image_id: ami-aaaa1111\n").unwrap();

        // Occupy the backup path with a directory so the backup write fails.
        fs::create_dir(backup_path_for(&target)).unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let err = processor.process_file(&target).unwrap_err();
        assert!(matches!(err, Error::Backup { .. }));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "image_id: ami-aaaa1111\n"
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let err = processor
            .process_file(Path::new("/nonexistent/launch.yaml"))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn directory_sweep_counts_only_written_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "image: ami-aaaa1111\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "image: ami-ffff9999\n").unwrap();
        fs::write(dir.path().join("c.yaml"), "no images here\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let stats = processor.process_directory(dir.path()).unwrap();

        assert_eq!(stats.files_touched, 1);
        assert_eq!(stats.total_substitutions, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("b.yaml")).unwrap(),
            "image: ami-ffff9999\n"
        );
    }

    #[test]
    fn repeated_sweeps_skip_backups_and_change_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.yaml");
        fs::write(&target, "image: ami-aaaa1111\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let first = processor.process_directory(dir.path()).unwrap();
        assert_eq!(first.files_touched, 1);

        // Second run: the target already carries the new id and the backup
        // sibling must not be rewritten back.
        let second = processor.process_directory(dir.path()).unwrap();
        assert_eq!(second.files_touched, 0);
        assert_eq!(second.total_substitutions, 0);
        assert_eq!(
            fs::read_to_string(backup_path_for(&target)).unwrap(),
            "image: ami-aaaa1111\n"
        );
    }

    #[test]
    fn unlabeled_files_are_sniffed_for_image_ids() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes"), "uses ami-aaaa1111 today\n").unwrap();
        fs::write(dir.path().join("readme"), "nothing relevant\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let stats = processor.process_directory(dir.path()).unwrap();

        assert_eq!(stats.files_touched, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("notes")).unwrap(),
            "uses ami-bbbb2222 today\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("readme")).unwrap(),
            "nothing relevant\n"
        );
    }

    #[test]
    fn sweep_continues_past_unreadable_candidates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "image: ami-aaaa1111\n").unwrap();

        // A candidate that is readable at classification time but fails
        // UTF-8 decoding during processing.
        fs::write(dir.path().join("b.yaml"), [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        let stats = processor.process_directory(dir.path()).unwrap();

        assert_eq!(stats.files_touched, 1);
    }

    #[test]
    fn undo_restores_originals() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.yaml");
        fs::write(&target, "image: ami-aaaa1111\n").unwrap();

        let processor = FileProcessor::new(plan_for("ami-aaaa1111", "ami-bbbb2222"));
        processor.process_file(&target).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "image: ami-bbbb2222\n"
        );

        run_undo(dir.path().to_path_buf(), false).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "image: ami-aaaa1111\n"
        );
        assert!(!backup_path_for(&target).exists());
    }

    #[test]
    fn finds_images_referenced_by_a_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("stack.tf");
        fs::write(
            &target,
            "ami = \"ami-0123456789abcdef0\"\nspare = \"ami-deadbeef\"\n",
        )
        .unwrap();

        let ids = find_images_in_file(&target).unwrap();
        assert_eq!(ids, vec!["ami-0123456789abcdef0", "ami-deadbeef"]);
    }
}
