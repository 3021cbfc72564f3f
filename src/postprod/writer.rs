//! Writing generated pages, assets and fixtures into a working copy.

use std::path::{Path, PathBuf};

use super::assets::Asset;
use super::layout::{PageKind, to_slash};
use super::metadata::PuzzleMetadata;
use super::pipeline::Cause;
use crate::config::LayoutConfig;

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize fixture for '{slug}': {source}")]
    Fixture {
        slug: String,
        source: serde_yaml::Error,
    },
}

impl WriteError {
    pub fn cause(&self) -> Cause {
        Cause::Io
    }
}

/// Repository-relative paths touched by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub pages: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub fixtures: Vec<PathBuf>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.assets.is_empty() && self.fixtures.is_empty()
    }

    /// Every changed file, `/`-separated.
    pub fn all(&self) -> Vec<String> {
        self.pages
            .iter()
            .chain(&self.assets)
            .chain(&self.fixtures)
            .map(|path| to_slash(path))
            .collect()
    }

    /// Text files the formatter should see.
    pub fn formattable(&self) -> Vec<PathBuf> {
        self.pages.iter().chain(&self.fixtures).cloned().collect()
    }
}

/// Writes into a working copy rooted at `root`.
pub struct RepoWriter<'a> {
    root: &'a Path,
    layout: &'a LayoutConfig,
}

impl<'a> RepoWriter<'a> {
    pub fn new(root: &'a Path, layout: &'a LayoutConfig) -> Self {
        Self { root, layout }
    }

    pub fn page_exists(&self, kind: PageKind, slug: &str, puzzle_dir: Option<&str>) -> bool {
        self.root
            .join(self.layout.page_path(kind, slug, puzzle_dir))
            .is_file()
    }

    /// Write a page and replace its asset directory with `assets`.
    pub fn write_page(
        &self,
        changes: &mut Changes,
        kind: PageKind,
        slug: &str,
        puzzle_dir: Option<&str>,
        page: &str,
        assets: &[Asset],
    ) -> Result<(), WriteError> {
        let asset_dir = self.layout.asset_dir(kind, slug);
        let absolute_dir = self.root.join(&asset_dir);
        if absolute_dir.exists() {
            std::fs::remove_dir_all(&absolute_dir).map_err(|source| WriteError::Io {
                path: asset_dir.clone(),
                source,
            })?;
        }
        for asset in assets {
            let path = asset_dir.join(asset.file_name());
            self.write_file(&path, &asset.bytes)?;
            changes.assets.push(path);
        }

        let page_path = self.layout.page_path(kind, slug, puzzle_dir);
        self.write_file(&page_path, page.as_bytes())?;
        changes.pages.push(page_path);
        Ok(())
    }

    pub fn write_fixture(
        &self,
        changes: &mut Changes,
        metadata: &PuzzleMetadata,
    ) -> Result<(), WriteError> {
        let yaml = metadata
            .fixture_yaml()
            .map_err(|source| WriteError::Fixture {
                slug: metadata.slug.clone(),
                source,
            })?;
        let path = self.layout.fixture_path(&metadata.slug);
        self.write_file(&path, yaml.as_bytes())?;
        changes.fixtures.push(path);
        Ok(())
    }

    fn write_file(&self, relative: &Path, contents: &[u8]) -> Result<(), WriteError> {
        let path = self.root.join(relative);
        let io_error = |source| WriteError::Io {
            path: relative.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(&path, contents).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprod::assets::tests::png_bytes;
    use tempfile::TempDir;

    fn metadata() -> PuzzleMetadata {
        serde_json::from_str(
            r#"{"id": 5, "slug": "crossword", "title": "Crossword", "answer": "PUZZLE"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_write_page_with_assets() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let writer = RepoWriter::new(dir.path(), &layout);
        let mut changes = Changes::default();
        let assets = vec![Asset::downloaded(0, "https://img.example/a.png", png_bytes(4, 4))];

        writer
            .write_page(&mut changes, PageKind::Puzzle, "crossword", None, "page", &assets)
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("client/pages/puzzles/crossword/index.tsx"))
                .unwrap(),
            "page"
        );
        assert!(dir.path().join("client/assets/puzzles/crossword/0.png").is_file());
        assert_eq!(
            changes.all(),
            vec![
                "client/pages/puzzles/crossword/index.tsx",
                "client/assets/puzzles/crossword/0.png"
            ]
        );
        assert_eq!(
            changes.formattable(),
            vec![PathBuf::from("client/pages/puzzles/crossword/index.tsx")]
        );
    }

    #[test]
    fn test_write_page_replaces_stale_assets() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let stale = dir.path().join("client/assets/puzzles/crossword/7.png");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"old").unwrap();

        let writer = RepoWriter::new(dir.path(), &layout);
        writer
            .write_page(&mut Changes::default(), PageKind::Puzzle, "crossword", None, "page", &[])
            .unwrap();

        assert!(!stale.exists());
        assert!(writer.page_exists(PageKind::Puzzle, "crossword", None));
        assert!(!writer.page_exists(PageKind::Solution, "crossword", None));
    }

    #[test]
    fn test_write_page_in_custom_directory() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let writer = RepoWriter::new(dir.path(), &layout);
        writer
            .write_page(
                &mut Changes::default(),
                PageKind::Puzzle,
                "crossword",
                Some("client/pages/metas"),
                "page",
                &[],
            )
            .unwrap();
        assert!(dir.path().join("client/pages/metas/crossword/index.tsx").is_file());
    }

    #[test]
    fn test_write_fixture() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let mut changes = Changes::default();
        RepoWriter::new(dir.path(), &layout)
            .write_fixture(&mut changes, &metadata())
            .unwrap();

        let yaml =
            std::fs::read_to_string(dir.path().join("server/tph/fixtures/puzzles/crossword.yaml"))
                .unwrap();
        assert!(yaml.contains("model: spoilr_core.puzzle"));
        assert!(yaml.contains("answer: PUZZLE"));
        assert_eq!(changes.all(), vec!["server/tph/fixtures/puzzles/crossword.yaml"]);
    }
}
