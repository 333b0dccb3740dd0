//! Turns a directory of plain-text documents into searchable chunks.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::DocumentChunk;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
    pub words_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self { Self { max_tokens: 500, overlap_percent: 0.2, words_per_chunk: 300 } }
}

pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    extensions: Vec<String>,
}

impl Default for DataProcessor {
    fn default() -> Self { Self { chunking_config: ChunkingConfig::default(), extensions: vec!["txt".to_string()] } }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    /// Accept files with any of these extensions (case-insensitive, no dot).
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(|e| e.into().trim_start_matches('.').to_lowercase()).collect();
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, chunking_config: ChunkingConfig) -> Self {
        self.chunking_config = chunking_config;
        self
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        let files = self.list_files(data_dir);
        if files.is_empty() {
            tracing::info!(dir = %data_dir.display(), "no matching files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!("processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let content = Self::read_file_content(file_path)?;
            let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
            let doc_id = Self::extract_doc_id(file_path);
            let chunks = self.chunk_content(&content, &doc_id, relative);
            all_chunks.extend(chunks);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "processed corpus");
        Ok(all_chunks)
    }

    fn read_file_content(file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_doc_id(file_path: &Path) -> String {
        file_path
            .file_stem()
            .map_or_else(|| file_path.to_string_lossy().to_string(), |s| s.to_string_lossy().to_string())
    }

    fn chunk_content(&self, content: &str, doc_id: &str, relative_path: &Path) -> Vec<DocumentChunk> {
        let doc_path = relative_path.to_string_lossy().to_string();
        let mut pieces = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() { continue; }
            if Self::count_tokens(paragraph) <= self.chunking_config.max_tokens {
                pieces.push(paragraph.to_string());
            } else {
                pieces.extend(self.split_paragraph_with_overlap(paragraph));
            }
        }
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                id: format!("{doc_id}:{chunk_index}"),
                doc_id: doc_id.to_string(),
                doc_path: doc_path.clone(),
                content,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn count_tokens(text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f32 / 0.75) as usize
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = self.chunking_config.words_per_chunk.max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
            if matches { files.push(path.to_path_buf()); }
        }
        files.sort();
        files
    }
}
