//! Line attribution from git history.

use std::path::{Path, PathBuf};

use git2::{BlameOptions, Repository};
use serde::Serialize;

use crate::error::Error;

/// Who last changed a line, and in which commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameInfo {
    /// Author name of the commit that last touched the line.
    pub author: String,
    /// Commit summary (first line of the message).
    pub message: String,
    /// Full commit id.
    pub revision: String,
    /// Author time, seconds since the Unix epoch.
    pub timestamp: i64,
}

/// Attribute one committed line of `unit` (relative to `root`).
///
/// Only committed content is blamed; working-tree edits are not considered.
///
/// # Errors
///
/// Returns `Error::BlameFailed` if `root` is not inside a git work tree, the
/// unit is not tracked, or `line` is out of range.
pub fn blame(root: &Path, unit: &Path, line: u32) -> Result<BlameInfo, Error> {
    let failed = |reason: String| {
        return Error::BlameFailed {
            line,
            reason,
            unit: unit.to_path_buf(),
        };
    };

    if line == 0 {
        return Err(failed("line numbers start at 1".to_string()));
    }
    let line_number = usize::try_from(line).map_err(|e| return failed(e.to_string()))?;

    let repo = Repository::discover(root).map_err(|e| return failed(e.message().to_string()))?;
    let repo_path = path_in_repo(&repo, root, unit).map_err(failed)?;

    let committed_lines = committed_line_count(&repo, &repo_path).map_err(failed)?;
    if line_number > committed_lines {
        return Err(failed(format!("the committed file has {committed_lines} lines")));
    }

    let mut options = BlameOptions::new();
    options.min_line(line_number).max_line(line_number);
    let blame = repo
        .blame_file(&repo_path, Some(&mut options))
        .map_err(|e| return failed(e.message().to_string()))?;

    let hunk = blame
        .get_line(line_number)
        .ok_or_else(|| return failed("line is past the end of the committed file".to_string()))?;
    let hunk_end = hunk.final_start_line().saturating_add(hunk.lines_in_hunk());
    if line_number >= hunk_end {
        return Err(failed("line is past the end of the committed file".to_string()));
    }

    let signature = hunk.final_signature();
    let commit_id = hunk.final_commit_id();
    let commit = repo
        .find_commit(commit_id)
        .map_err(|e| return failed(e.message().to_string()))?;

    let info = BlameInfo {
        author: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
        message: commit.summary().unwrap_or_default().to_string(),
        revision: commit_id.to_string(),
        timestamp: signature.when().seconds(),
    };
    log::debug!("blame {}:{line} -> {}", unit.display(), info.revision);
    return Ok(info);
}

/// Number of lines in the HEAD version of `repo_path`. A final line without
/// a trailing newline still counts.
fn committed_line_count(repo: &Repository, repo_path: &Path) -> Result<usize, String> {
    let tree = repo
        .head()
        .and_then(|head| return head.peel_to_tree())
        .map_err(|e| return e.message().to_string())?;
    let blob = tree
        .get_path(repo_path)
        .and_then(|entry| return entry.to_object(repo))
        .and_then(|object| return object.peel_to_blob())
        .map_err(|e| return e.message().to_string())?;

    let content = blob.content();
    let newlines = content.iter().filter(|b| return **b == b'\n').count();
    if content.last().is_some_and(|b| return *b != b'\n') {
        return Ok(newlines.saturating_add(1));
    }
    return Ok(newlines);
}

/// Express `root/unit` relative to the repository's work tree.
fn path_in_repo(repo: &Repository, root: &Path, unit: &Path) -> Result<PathBuf, String> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| return "repository has no work tree".to_string())?;
    let workdir = workdir.canonicalize().map_err(|e| return e.to_string())?;
    let absolute = root.join(unit).canonicalize().map_err(|e| return e.to_string())?;

    return absolute
        .strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .map_err(|_| return format!("{} is outside {}", absolute.display(), workdir.display()));
}

#[cfg(test)]
mod tests {
    use git2::{Signature, Time};

    use super::*;

    fn commit_file(repo: &Repository, rel: &str, content: &str, author: &str, when: i64, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let path = workdir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(rel)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new(author, "dev@example.com", &Time::new(when, 0)).unwrap();

        let parent = repo.head().ok().and_then(|h| return h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        return repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
    }

    #[test]
    fn attributes_each_line_to_its_last_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = commit_file(&repo, "pkg/mod.py", "a = 1\nb = 2\n", "Ada", 1_700_000_000, "add module\n\nbody");
        let second = commit_file(&repo, "pkg/mod.py", "a = 1\nb = 3\n", "Grace", 1_700_000_500, "bump b");

        let line1 = blame(dir.path(), Path::new("pkg/mod.py"), 1).unwrap();
        assert_eq!(line1.author, "Ada");
        assert_eq!(line1.message, "add module");
        assert_eq!(line1.revision, first.to_string());
        assert_eq!(line1.timestamp, 1_700_000_000);

        let line2 = blame(dir.path(), Path::new("pkg/mod.py"), 2).unwrap();
        assert_eq!(line2.author, "Grace");
        assert_eq!(line2.revision, second.to_string());
    }

    #[test]
    fn root_may_be_a_subdirectory_of_the_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "pkg/mod.py", "x = 1\n", "Ada", 1_700_000_000, "init");

        let info = blame(&dir.path().join("pkg"), Path::new("mod.py"), 1).unwrap();
        assert_eq!(info.author, "Ada");
    }

    #[test]
    fn bad_lines_and_untracked_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.py", "x = 1\n", "Ada", 1_700_000_000, "init");
        std::fs::write(dir.path().join("new.py"), "y = 2\n").unwrap();

        assert!(matches!(blame(dir.path(), Path::new("a.py"), 0), Err(Error::BlameFailed { .. })));
        assert!(matches!(blame(dir.path(), Path::new("a.py"), 40), Err(Error::BlameFailed { .. })));
        assert!(matches!(blame(dir.path(), Path::new("new.py"), 1), Err(Error::BlameFailed { .. })));
    }

    #[test]
    fn lines_past_the_committed_end_fail() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.py", "x = 1\ny = 2", "Ada", 1_700_000_000, "init");

        assert_eq!(blame(dir.path(), Path::new("a.py"), 2).unwrap().author, "Ada");
        for past_end in [3, 40] {
            let err = blame(dir.path(), Path::new("a.py"), past_end).unwrap_err();
            assert!(matches!(err, Error::BlameFailed { line, .. } if line == past_end));
        }
    }

    #[test]
    fn working_tree_lines_beyond_head_fail() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.py", "x = 1\n", "Ada", 1_700_000_000, "init");
        std::fs::write(dir.path().join("a.py"), "x = 1\ny = 2\nz = 3\n").unwrap();

        assert!(blame(dir.path(), Path::new("a.py"), 1).is_ok());
        assert!(matches!(blame(dir.path(), Path::new("a.py"), 3), Err(Error::BlameFailed { .. })));
    }

    #[test]
    fn outside_a_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let err = blame(dir.path(), Path::new("a.py"), 1).unwrap_err();
        assert!(matches!(err, Error::BlameFailed { line: 1, .. }));
    }
}
