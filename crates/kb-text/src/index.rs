use anyhow::{anyhow, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use kb_core::types::DocumentChunk;

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// A keyword match: BM25 score plus the position of the chunk in the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalHit {
	pub score: f32,
	pub ord: usize,
}

/// In-memory tantivy index over a static set of chunks. Built once,
/// searched read-only afterwards.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	text_field: Field,
	ord_field: Field,
	chunks: Vec<DocumentChunk>,
}

impl LexicalIndex {
	pub fn build(chunks: Vec<DocumentChunk>) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let path_field = schema.get_field("doc_path")?;
		let ord_field = schema.get_field("ord")?;
		let text_field = schema.get_field("text")?;

		let mut index_writer: IndexWriter = index.writer(50_000_000)?;
		for (ord, c) in chunks.iter().enumerate() {
			index_writer.add_document(doc!(
				id_field => c.id.clone(),
				path_field => c.doc_path.clone(),
				ord_field => ord as u64,
				text_field => c.content.clone(),
			))?;
		}
		index_writer.commit()?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		tracing::debug!(chunks = chunks.len(), "lexical index built");
		Ok(Self { index, reader, text_field, ord_field, chunks })
	}

	pub fn chunks(&self) -> &[DocumentChunk] { &self.chunks }

	pub fn chunk(&self, ord: usize) -> Option<&DocumentChunk> { self.chunks.get(ord) }

	/// Keyword search. Query syntax errors are tolerated; an all-stopword
	/// query simply matches nothing. `limit` is clamped to the corpus size.
	pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<LexicalHit>> {
		let searcher = self.reader.searcher();
		let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (query, errors) = query_parser.parse_query_lenient(query_text);
		if !errors.is_empty() {
			tracing::debug!(?errors, "lenient query parse dropped parts of the query");
		}
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.clamp(1, self.chunks.len().max(1))))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let ord = doc
				.get_first(self.ord_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| anyhow!("stored document lacks its ordinal"))?;
			hits.push(LexicalHit { score, ord: usize::try_from(ord)? });
		}
		Ok(hits)
	}

	/// Case-insensitive substring scan in corpus order.
	pub fn substring_search(&self, needle: &str, limit: usize) -> Vec<usize> {
		let needle = needle.trim().to_lowercase();
		if needle.is_empty() { return vec![]; }
		self.chunks
			.iter()
			.enumerate()
			.filter(|(_, c)| c.content.to_lowercase().contains(&needle))
			.map(|(ord, _)| ord)
			.take(limit)
			.collect()
	}
}
