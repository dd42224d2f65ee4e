use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::errors::{ChatError, ChatResult};

/// Number of chunks joined into a search result
const SEARCH_LIMIT: usize = 3;

/// Ingests a local document so later searches can use it
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    async fn index_document(&self, path: &Path) -> ChatResult<()>;
}

/// Looks up indexed material relevant to a query; empty when nothing matches
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str) -> ChatResult<String>;
}

#[derive(Debug, Clone)]
struct Chunk {
    source: PathBuf,
    text: String,
    terms: HashSet<String>,
}

/// Keyword index held in memory for the lifetime of a chat session.
///
/// PDF text is extracted page by page, anything else is read as lossy
/// UTF-8. The text is then split on blank lines.
#[derive(Debug, Default)]
pub struct VolatileKnowledgeBase {
    chunks: RwLock<Vec<Chunk>>,
}

impl VolatileKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed chunks
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Paths of every indexed document, in indexing order
    pub async fn sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = Vec::new();
        for chunk in self.chunks.read().await.iter() {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        sources
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Text of every page, pages separated by a blank line
fn pdf_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let document = lopdf::Document::load_mem(bytes)?;
    let mut pages = Vec::new();
    for page in document.get_pages().into_keys() {
        pages.push(document.extract_text(&[page])?);
    }
    Ok(pages.join("\n\n"))
}

fn indexing_error(path: &Path, error: impl std::fmt::Display) -> ChatError {
    ChatError::Indexing(format!("{}: {}", path.display(), error))
}

async fn read_document(path: &Path) -> ChatResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| indexing_error(path, e))?;
    if !is_pdf(path) {
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    // Parsing is CPU bound
    tokio::task::spawn_blocking(move || pdf_text(&bytes))
        .await
        .map_err(|e| indexing_error(path, e))?
        .map_err(|e| indexing_error(path, e))
}

fn split_chunks(source: &Path, text: &str) -> Vec<Chunk> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| Chunk {
            source: source.to_path_buf(),
            text: paragraph.to_string(),
            terms: terms(paragraph),
        })
        .collect()
}

#[async_trait]
impl DocumentIndexer for VolatileKnowledgeBase {
    async fn index_document(&self, path: &Path) -> ChatResult<()> {
        let text = read_document(path).await?;
        let chunks = split_chunks(path, &text);
        tracing::debug!(path = %path.display(), chunks = chunks.len(), "indexed document");
        self.chunks.write().await.extend(chunks);
        Ok(())
    }
}

#[async_trait]
impl KnowledgeSearch for VolatileKnowledgeBase {
    async fn search(&self, query: &str) -> ChatResult<String> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(String::new());
        }

        let chunks = self.chunks.read().await;
        let mut scored: Vec<(usize, usize)> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| (index, chunk.terms.intersection(&query_terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Best score first, earlier chunks win ties
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|(index, _)| chunks[index].text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
