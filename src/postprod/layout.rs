//! Path conversion for generated files inside the hunt repository.
//!
//! This module handles conversions between:
//! - Page kinds and slugs (what is being published)
//! - Repository paths (where pages, assets and fixtures are written)
//! - Import paths (how a page refers to its assets)

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;

/// The two pages generated for every puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Puzzle,
    Solution,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Puzzle => "puzzle",
            PageKind::Solution => "solution",
        }
    }

    /// Name the page template is registered under.
    pub fn template_name(self) -> &'static str {
        match self {
            PageKind::Puzzle => "puzzle.tsx",
            PageKind::Solution => "solution.tsx",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LayoutConfig {
    /// Directory holding the page for `slug`.
    ///
    /// # Examples
    /// ```ignore
    /// page_dir(Puzzle, "crossword", None) => "client/pages/puzzles/crossword"
    /// page_dir(Puzzle, "crossword", Some("client/pages/metas")) => "client/pages/metas/crossword"
    /// page_dir(Solution, "crossword", None) => "client/pages/solutions/crossword"
    /// ```
    pub fn page_dir(&self, kind: PageKind, slug: &str, puzzle_dir: Option<&str>) -> PathBuf {
        let base = match (kind, puzzle_dir) {
            (PageKind::Puzzle, Some(dir)) => PathBuf::from(dir),
            (PageKind::Puzzle, None) => self.puzzle_pages.clone(),
            (PageKind::Solution, _) => self.solution_pages.clone(),
        };
        base.join(slug)
    }

    /// Page file for `slug`, e.g. `client/pages/puzzles/crossword/index.tsx`.
    pub fn page_path(&self, kind: PageKind, slug: &str, puzzle_dir: Option<&str>) -> PathBuf {
        self.page_dir(kind, slug, puzzle_dir).join(&self.page_file)
    }

    /// Directory the page's images are written to.
    pub fn asset_dir(&self, kind: PageKind, slug: &str) -> PathBuf {
        match kind {
            PageKind::Puzzle => self.puzzle_assets.join(slug),
            PageKind::Solution => self.solution_assets.join(slug),
        }
    }

    /// Import path a page uses for one of its assets.
    ///
    /// Relative to the client root and always `/`-separated.
    ///
    /// # Examples
    /// ```ignore
    /// asset_import(Puzzle, "crossword", "0.png") => "assets/puzzles/crossword/0.png"
    /// ```
    pub fn asset_import(&self, kind: PageKind, slug: &str, file_name: &str) -> String {
        let path = self.asset_dir(kind, slug).join(file_name);
        let relative = path.strip_prefix(&self.client_dir).unwrap_or(&path);
        to_slash(relative)
    }

    /// Fixture file for `slug`.
    pub fn fixture_path(&self, slug: &str) -> PathBuf {
        self.fixtures.join(format!("{slug}.yaml"))
    }
}

/// Join path components with `/` regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path_defaults() {
        let layout = LayoutConfig::default();
        assert_eq!(
            layout.page_path(PageKind::Puzzle, "crossword", None),
            PathBuf::from("client/pages/puzzles/crossword/index.tsx")
        );
        assert_eq!(
            layout.page_path(PageKind::Solution, "crossword", None),
            PathBuf::from("client/pages/solutions/crossword/index.tsx")
        );
    }

    #[test]
    fn test_page_path_puzzle_directory_override() {
        let layout = LayoutConfig::default();
        assert_eq!(
            layout.page_path(PageKind::Puzzle, "crossword", Some("client/pages/metas")),
            PathBuf::from("client/pages/metas/crossword/index.tsx")
        );
        // Solutions ignore the puzzle directory override
        assert_eq!(
            layout.page_path(PageKind::Solution, "crossword", Some("client/pages/metas")),
            PathBuf::from("client/pages/solutions/crossword/index.tsx")
        );
    }

    #[test]
    fn test_asset_dir() {
        let layout = LayoutConfig::default();
        assert_eq!(
            layout.asset_dir(PageKind::Puzzle, "crossword"),
            PathBuf::from("client/assets/puzzles/crossword")
        );
        assert_eq!(
            layout.asset_dir(PageKind::Solution, "crossword"),
            PathBuf::from("client/assets/solutions/crossword")
        );
    }

    #[test]
    fn test_asset_import() {
        let layout = LayoutConfig::default();
        assert_eq!(
            layout.asset_import(PageKind::Puzzle, "crossword", "0.png"),
            "assets/puzzles/crossword/0.png"
        );
        assert_eq!(
            layout.asset_import(PageKind::Solution, "crossword", "1.gif"),
            "assets/solutions/crossword/1.gif"
        );
    }

    #[test]
    fn test_asset_import_outside_client_dir() {
        let layout = LayoutConfig {
            puzzle_assets: PathBuf::from("static/images"),
            ..LayoutConfig::default()
        };
        assert_eq!(
            layout.asset_import(PageKind::Puzzle, "crossword", "0.png"),
            "static/images/crossword/0.png"
        );
    }

    #[test]
    fn test_fixture_path() {
        assert_eq!(
            LayoutConfig::default().fixture_path("crossword"),
            PathBuf::from("server/tph/fixtures/puzzles/crossword.yaml")
        );
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b/c.png")), "a/b/c.png");
        assert_eq!(to_slash(Path::new("./a/b")), "a/b");
    }

    #[test]
    fn test_page_kind_names() {
        assert_eq!(PageKind::Puzzle.to_string(), "puzzle");
        assert_eq!(PageKind::Solution.template_name(), "solution.tsx");
    }
}
