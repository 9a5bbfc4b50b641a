//! Pattern-based path exclusion using glob patterns

use super::ExclusionError;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Suffix of in-flight transfer files; never part of a snapshot
pub const TEMP_SUFFIX: &str = ".sshcp-tmp";

/// Pattern matcher using globset for efficient matching
///
/// Paths are matched in their normalized relative form (`dir/file.txt`).
/// A pattern without a `/` matches a name at any depth, and a matching
/// directory excludes everything below it.
#[derive(Debug)]
pub struct PatternMatcher {
	/// Compiled user patterns
	exclude_set: GlobSet,

	/// Always-excluded patterns (built-in)
	always_exclude: GlobSet,

	/// Original user patterns, kept for display
	patterns: Vec<String>,
}

impl PatternMatcher {
	/// Create a new pattern matcher from user patterns
	pub fn new(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let always_exclude = Self::build_always_excluded()?;
		let exclude_set = Self::build_glob_set(exclude_patterns)?;

		Ok(Self { exclude_set, always_exclude, patterns: exclude_patterns.to_vec() })
	}

	/// Matcher with only the built-in exclusions
	pub fn builtin() -> Result<Self, ExclusionError> {
		Self::new(&[])
	}

	fn build_always_excluded() -> Result<GlobSet, ExclusionError> {
		let patterns = vec![
			format!("*{}", TEMP_SUFFIX), // our in-flight transfers
			".DS_Store".to_string(),     // macOS cruft
			"Thumbs.db".to_string(),     // Windows cruft
			"desktop.ini".to_string(),   // Windows cruft
			"*.swp".to_string(),         // Vim swap files
			"*.swo".to_string(),
			"*~".to_string(), // Editor backups
			".nfs*".to_string(),
		];

		Self::build_glob_set(&patterns)
	}

	/// Expand one user pattern into the globs it stands for
	fn expand(pattern: &str) -> Vec<String> {
		let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
		let anchored = trimmed.trim_start_matches('/');
		let mut globs = vec![anchored.to_string(), format!("{}/**", anchored)];
		if !anchored.contains('/') {
			globs.push(format!("**/{}", anchored));
			globs.push(format!("**/{}/**", anchored));
		}
		globs
	}

	fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ExclusionError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in patterns {
			if pattern.trim().is_empty() {
				continue;
			}
			for expanded in Self::expand(pattern) {
				let glob = Glob::new(&expanded).map_err(|e| ExclusionError::InvalidPattern {
					pattern: pattern.clone(),
					message: e.to_string(),
				})?;
				builder.add(glob);
			}
		}

		builder.build().map_err(|e| ExclusionError::InvalidPattern {
			pattern: patterns.join(", "),
			message: e.to_string(),
		})
	}

	/// Check if a relative path is excluded
	pub fn is_excluded(&self, rel_path: &str) -> bool {
		self.always_exclude.is_match(rel_path) || self.exclude_set.is_match(rel_path)
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn matcher(patterns: &[&str]) -> PatternMatcher {
		let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
		PatternMatcher::new(&patterns).unwrap()
	}

	#[test]
	fn test_basic_exclusion() {
		let m = matcher(&["*.log", "*.tmp"]);

		assert!(m.is_excluded("test.log"));
		assert!(m.is_excluded("foo/bar.tmp"));
		assert!(!m.is_excluded("test.txt"));
	}

	#[test]
	fn test_bare_name_matches_at_any_depth() {
		let m = matcher(&["node_modules", ".git/"]);

		assert!(m.is_excluded("node_modules"));
		assert!(m.is_excluded("node_modules/pkg/index.js"));
		assert!(m.is_excluded("web/node_modules/pkg/index.js"));
		assert!(m.is_excluded("sub/.git/HEAD"));
		assert!(!m.is_excluded("src/main.rs"));
	}

	#[test]
	fn test_anchored_directory_pattern() {
		let m = matcher(&["build/out"]);

		assert!(m.is_excluded("build/out/app.bin"));
		assert!(!m.is_excluded("other/build/out/app.bin"));
	}

	#[test]
	fn test_always_excluded() {
		let m = PatternMatcher::builtin().unwrap();

		assert!(m.is_excluded("docs/report.txt.sshcp-tmp"));
		assert!(m.is_excluded(".DS_Store"));
		assert!(m.is_excluded("foo/Thumbs.db"));
		assert!(m.is_excluded("file.swp"));
		assert!(m.is_excluded("backup~"));
		assert!(!m.is_excluded("notes.md"));
	}

	#[test]
	fn test_invalid_pattern() {
		let err = PatternMatcher::new(&["a[".to_string()]).unwrap_err();
		assert!(err.to_string().contains("a["));
	}
}

// vim: ts=4
