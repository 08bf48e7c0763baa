use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::Utc;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::cards::{
    ATTACHMENTS_DIR, CARD_CONTENT_FILE, CARD_METADATA_FILE, CARD_NAME_RE, CHILDREN_DIR, Card,
    CardMetadata,
};
use crate::resources::{Error, Result};

/// Filesystem walker over one card tree.
///
/// The root directory's entries that match the card-name pattern are the
/// top-level cards; descent stops at the first matching level, and children
/// are only looked up under each card's `c/` subdirectory. The same
/// container is used for a project's `cardRoot` and for template card trees.
#[derive(Debug, Clone)]
pub struct CardContainer {
    root: PathBuf,
}

impl CardContainer {
    pub fn new(root: PathBuf) -> Self {
        CardContainer { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the cards directly under the container root, with their child
    /// trees. A missing root directory yields an empty list.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn cards(&self, include_content: bool) -> Result<Vec<Card>> {
        let dirs = card_dirs_in(&self.root).await?;
        let mut cards = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match self.read_card(&dir, include_content).await {
                Ok(card) => cards.push(card),
                Err(e) => {
                    // Skip unreadable card directories, same as invalid entries
                    // in a directory listing.
                    warn!("Skipping invalid card directory '{}': {}", dir.display(), e);
                }
            }
        }
        debug!("Found {} cards", cards.len());
        Ok(cards)
    }

    /// Finds the card with the given key anywhere in this tree.
    pub async fn card(&self, key: &str, include_content: bool) -> Result<Card> {
        let dir = self
            .find_card_dir(key)
            .await?
            .ok_or_else(|| Error::CardNotFound(key.to_string()))?;
        self.read_card(&dir, include_content).await
    }

    /// Returns the directory of the card with the given key, if present.
    pub async fn find_card_dir(&self, key: &str) -> Result<Option<PathBuf>> {
        for dir in self.card_dirs().await? {
            if dir.file_name().and_then(|n| n.to_str()) == Some(key) {
                return Ok(Some(dir));
            }
        }
        Ok(None)
    }

    /// Flat list of every card directory in the tree, depth first.
    pub async fn card_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut all = Vec::new();
        let mut pending = card_dirs_in(&self.root).await?;
        while let Some(dir) = pending.pop() {
            let children = card_dirs_in(&dir.join(CHILDREN_DIR)).await?;
            pending.extend(children);
            all.push(dir);
        }
        Ok(all)
    }

    fn read_card<'a>(
        &'a self,
        dir: &'a Path,
        include_content: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Card>> + Send + 'a>> {
        Box::pin(async move {
            let key = dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| Error::CardNotFound(dir.display().to_string()))?
                .to_string();

            let metadata = Some(read_metadata(dir).await?);
            let content = if include_content {
                match fs::read_to_string(dir.join(CARD_CONTENT_FILE)).await {
                    Ok(text) => Some(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(Error::Io(e)),
                }
            } else {
                None
            };

            let mut children = Vec::new();
            for child_dir in card_dirs_in(&dir.join(CHILDREN_DIR)).await? {
                children.push(self.read_card(&child_dir, include_content).await?);
            }

            Ok(Card {
                key,
                path: dir.to_path_buf(),
                metadata,
                content,
                children,
                attachments: attachments_in(dir).await?,
            })
        })
    }

    /// Creates a card directory under the container root or under the given
    /// parent card's `c/` subdirectory.
    #[instrument(skip(self, metadata), fields(root = %self.root.display()))]
    pub async fn create_card(
        &self,
        parent_key: Option<&str>,
        key: &str,
        mut metadata: CardMetadata,
    ) -> Result<Card> {
        let parent_dir = match parent_key {
            Some(parent) => {
                let dir = self
                    .find_card_dir(parent)
                    .await?
                    .ok_or_else(|| Error::CardNotFound(parent.to_string()))?;
                dir.join(CHILDREN_DIR)
            }
            None => self.root.clone(),
        };

        let dir = parent_dir.join(key);
        fs::create_dir_all(&dir).await?;
        save_metadata(&dir, &mut metadata).await?;
        fs::write(dir.join(CARD_CONTENT_FILE), "").await?;

        debug!("Card '{}' created at {}", key, dir.display());
        Ok(Card {
            key: key.to_string(),
            path: dir,
            metadata: Some(metadata),
            content: Some(String::new()),
            children: Vec::new(),
            attachments: Vec::new(),
        })
    }

    /// Removes a card directory and everything under it, children included.
    #[instrument(skip(self))]
    pub async fn remove_card(&self, key: &str) -> Result<()> {
        let dir = self
            .find_card_dir(key)
            .await?
            .ok_or_else(|| Error::CardNotFound(key.to_string()))?;
        fs::remove_dir_all(&dir).await?;
        debug!("Card '{}' removed", key);
        Ok(())
    }
}

/// Reads and deserializes a card's `index.json`.
pub(crate) async fn read_metadata(card_dir: &Path) -> Result<CardMetadata> {
    let path = card_dir.join(CARD_METADATA_FILE);
    let content = fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::CardNotFound(card_dir.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Serializes a card's metadata to `index.json`, stamping `lastUpdated`.
pub(crate) async fn save_metadata(card_dir: &Path, metadata: &mut CardMetadata) -> Result<()> {
    metadata.last_updated = Some(Utc::now());
    let content = serde_json::to_string_pretty(metadata)?;
    fs::write(card_dir.join(CARD_METADATA_FILE), content).await?;
    Ok(())
}

/// Lists the card directories directly inside `dir` (non-recursive).
///
/// Only directories whose name matches the card-name pattern and which carry
/// a metadata file count; anything else is left alone. A missing `dir` yields
/// an empty list.
async fn card_dirs_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !CARD_NAME_RE.is_match(&file_name) {
            continue;
        }
        if !fs::try_exists(path.join(CARD_METADATA_FILE)).await? {
            warn!(
                "Skipping card-like directory without metadata: {}",
                path.display()
            );
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}

async fn attachments_in(card_dir: &Path) -> Result<Vec<String>> {
    let mut read_dir = match fs::read_dir(card_dir.join(ATTACHMENTS_DIR)).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        if entry.path().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata() -> CardMetadata {
        CardMetadata::new("A card", "decision/cardTypes/decision", "Draft", "0|a")
    }

    #[tokio::test]
    async fn create_and_read_card() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());

        let card = container
            .create_card(None, "decision_abc123", metadata())
            .await
            .unwrap();
        assert!(card.path.join(CARD_METADATA_FILE).exists());
        assert!(card.path.join(CARD_CONTENT_FILE).exists());

        let read = container.card("decision_abc123", true).await.unwrap();
        let md = read.metadata.unwrap();
        assert_eq!(md.title, "A card");
        assert!(md.last_updated.is_some(), "save should stamp lastUpdated");
        assert_eq!(read.content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn children_live_under_c_subdirectory() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());

        container
            .create_card(None, "decision_parent1", metadata())
            .await
            .unwrap();
        container
            .create_card(Some("decision_parent1"), "decision_child01", metadata())
            .await
            .unwrap();

        let cards = container.cards(false).await.unwrap();
        assert_eq!(cards.len(), 1, "child cards must not appear at top level");
        assert_eq!(cards[0].children.len(), 1);
        assert_eq!(cards[0].children[0].key, "decision_child01");

        let dirs = container.card_dirs().await.unwrap();
        assert_eq!(dirs.len(), 2);
    }

    #[tokio::test]
    async fn non_card_directories_are_ignored() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());

        fs::create_dir_all(dir.path().join("NotACard")).await.unwrap();
        fs::create_dir_all(dir.path().join("decision_nometa"))
            .await
            .unwrap();
        container
            .create_card(None, "decision_real01", metadata())
            .await
            .unwrap();

        let cards = container.cards(false).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].key, "decision_real01");
    }

    #[tokio::test]
    async fn missing_card_fails() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());
        let err = container.card("decision_absent1", false).await.unwrap_err();
        assert!(matches!(err, Error::CardNotFound(_)));
    }

    #[tokio::test]
    async fn attachments_are_listed() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());
        let card = container
            .create_card(None, "decision_att0001", metadata())
            .await
            .unwrap();

        let attachment_dir = card.path.join(ATTACHMENTS_DIR);
        fs::create_dir_all(&attachment_dir).await.unwrap();
        fs::write(attachment_dir.join("diagram.png"), b"png")
            .await
            .unwrap();

        let read = container.card("decision_att0001", false).await.unwrap();
        assert_eq!(read.attachments, vec!["diagram.png".to_string()]);
    }

    #[tokio::test]
    async fn remove_card_deletes_subtree() {
        let dir = tempdir().unwrap();
        let container = CardContainer::new(dir.path().to_path_buf());
        container
            .create_card(None, "decision_parent1", metadata())
            .await
            .unwrap();
        container
            .create_card(Some("decision_parent1"), "decision_child01", metadata())
            .await
            .unwrap();

        container.remove_card("decision_parent1").await.unwrap();
        assert!(container.cards(false).await.unwrap().is_empty());
    }
}
