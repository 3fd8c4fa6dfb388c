//! Append-only lessons file
//!
//! Lessons learned from past trades live in a plain UTF-8 text file, one per
//! line, each written as `\n- <lesson>`. The whole file is fed back into the
//! analysis context so the model can take past mistakes into account.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Default lessons file, relative to the working directory
pub const DEFAULT_KNOWLEDGE_PATH: &str = "knowledge.txt";

const LESSON_PREFIX: &str = "- ";

/// Handle to the lessons file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBase {
    path: PathBuf,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWLEDGE_PATH)
    }
}

impl KnowledgeBase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full file contents; a missing file reads as empty
    pub fn load(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No knowledge base at {}", self.path.display());
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Bullet lines without their prefix, oldest first
    ///
    /// Free text the user typed into the file by hand is skipped.
    pub fn lessons(&self) -> io::Result<Vec<String>> {
        Ok(parse_lessons(&self.load()?))
    }

    /// Append one lesson, creating the file if needed
    ///
    /// The text is written as given except that line breaks become spaces,
    /// so one lesson stays one line. Existing content is never rewritten.
    pub fn append_lesson(&self, lesson: &str) -> io::Result<()> {
        let lesson = lesson.replace(['\r', '\n'], " ");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(file, "\n{LESSON_PREFIX}{lesson}")?;
        file.flush()?;

        info!("Saved lesson to {}", self.path.display());
        Ok(())
    }
}

fn parse_lessons(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix(LESSON_PREFIX))
        .map(|lesson| lesson.trim().to_string())
        .filter(|lesson| !lesson.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn knowledge_in(dir: &TempDir) -> KnowledgeBase {
        KnowledgeBase::new(dir.path().join("knowledge.txt"))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let kb = knowledge_in(&dir);
        assert_eq!(kb.load().unwrap(), "");
        assert!(kb.lessons().unwrap().is_empty());
        assert!(!kb.path().exists());
    }

    #[test]
    fn test_append_creates_file() {
        let dir = TempDir::new().unwrap();
        let kb = knowledge_in(&dir);

        kb.append_lesson("Wait for retest").unwrap();

        let content = kb.load().unwrap();
        assert_eq!(content, "\n- Wait for retest");
        assert_eq!(content.lines().last(), Some("- Wait for retest"));
    }

    #[test]
    fn test_append_preserves_existing_content() {
        let dir = TempDir::new().unwrap();
        let kb = knowledge_in(&dir);
        fs::write(kb.path(), "My trading journal").unwrap();

        kb.append_lesson("Do not trade the London open").unwrap();
        kb.append_lesson("Wait for retest").unwrap();

        let content = kb.load().unwrap();
        assert!(content.starts_with("My trading journal"));
        assert_eq!(content.lines().last(), Some("- Wait for retest"));
        assert_eq!(
            kb.lessons().unwrap(),
            vec![
                "Do not trade the London open".to_string(),
                "Wait for retest".to_string(),
            ]
        );
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let dir = TempDir::new().unwrap();
        let kb = knowledge_in(&dir);

        kb.append_lesson("Move stop to break-even\r\nafter 1R").unwrap();
        assert_eq!(kb.load().unwrap(), "\n- Move stop to break-even  after 1R");
    }

    #[test]
    fn test_lesson_text_is_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let kb = knowledge_in(&dir);

        kb.append_lesson("  R:R  >=  1:2 ").unwrap();
        kb.append_lesson("").unwrap();
        assert_eq!(kb.load().unwrap(), "\n-   R:R  >=  1:2 \n- ");
    }

    #[test]
    fn test_parse_lessons_skips_free_text() {
        let content = "journal\n\n- a\n-  b \n-\n";
        assert_eq!(parse_lessons(content), vec!["a".to_string(), "b".to_string()]);
    }
}
