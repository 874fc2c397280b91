use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::event::Event;
use crate::io::{build_output_path, get_filename, read_text};
use crate::model::cancel::CancelFlag;
use crate::model::tokenizer::tokenize;

/// Characters per chunk when splitting a corpus.
pub const DEFAULT_CHUNK_SIZE: usize = 80_000;

/// Tokenized form of a corpus, persisted next to its source file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct TokenCache {
	max_run: usize,
	chunk_size: usize,
	chars: usize,
	/// CRC-32 of the source text.
	checksum: u32,
	tokens: Vec<String>,
}

/// Reference corpus held by the host for the lifetime of the process.
///
/// The corpus is split into fixed-size character chunks; each chunk is
/// tokenized on its own, so a run crossing a chunk boundary is cut there.
/// A `Corpus` is never mutated while a generation reads it: share it as
/// `Arc<Corpus>`.
#[derive(Clone, Debug)]
pub struct Corpus {
	name: String,
	chunk_size: usize,
	chunks: Vec<String>,
	chars: usize,
	cache: Option<TokenCache>,
}

impl Corpus {
	/// Splits `text` into chunks of `chunk_size` characters.
	pub fn from_text(name: &str, text: &str, chunk_size: usize) -> Self {
		let chunk_size = chunk_size.max(1);
		let mut chunks = Vec::new();
		let mut start = 0;
		let mut chars = 0;

		for (index, _) in text.char_indices() {
			if chars > 0 && chars % chunk_size == 0 {
				chunks.push(text[start..index].to_owned());
				start = index;
			}
			chars += 1;
		}
		if start < text.len() {
			chunks.push(text[start..].to_owned());
		}

		let corpus = Self { name: name.to_owned(), chunk_size, chunks, chars, cache: None };
		info!("corpus '{}': {} characters in {} chunks", corpus.name, corpus.chars, corpus.chunks.len());
		corpus
	}

	/// Loads a corpus file, reusing or rebuilding its token cache.
	///
	/// - The cache lives at `<stem>.bin` beside the file (postcard).
	/// - A cache built with another `max_run` or chunk size, or for another
	///   text (length or checksum), is rebuilt.
	/// - Rebuilding tokenizes chunks on all available cores.
	/// - A cache that cannot be read or written only costs a rebuild; the
	///   tokens are kept in memory either way.
	pub fn load<P: AsRef<Path>>(path: P, chunk_size: usize, max_run: usize) -> Result<Self, GenError> {
		let path = path.as_ref();
		let text = read_text(path)?;
		let checksum = crc32fast::hash(text.as_bytes());
		let mut corpus = Self::from_text(&get_filename(path)?, &text, chunk_size);

		let cache_path = build_output_path(path, "bin")?;
		if cache_path.exists() {
			let decoded = fs::read(&cache_path)
				.map_err(GenError::from)
				.and_then(|bytes| postcard::from_bytes::<TokenCache>(&bytes).map_err(GenError::from));
			match decoded {
				Ok(cache) if corpus.matches_cache(&cache, max_run, checksum) => {
					info!("corpus '{}': using token cache {}", corpus.name, cache_path.display());
					corpus.cache = Some(cache);
					return Ok(corpus);
				}
				Ok(_) => info!("corpus '{}': token cache is stale, rebuilding", corpus.name),
				Err(e) => warn!("corpus '{}': unreadable token cache ({e}), rebuilding", corpus.name),
			}
		}

		let cache = TokenCache {
			max_run,
			chunk_size: corpus.chunk_size,
			chars: corpus.chars,
			checksum,
			tokens: corpus.tokenize_parallel(max_run),
		};
		let written = postcard::to_stdvec(&cache)
			.map_err(GenError::from)
			.and_then(|bytes| fs::write(&cache_path, bytes).map_err(GenError::from));
		if let Err(e) = written {
			warn!("corpus '{}': cannot write token cache {} ({e})", corpus.name, cache_path.display());
		}
		corpus.cache = Some(cache);
		Ok(corpus)
	}

	fn matches_cache(&self, cache: &TokenCache, max_run: usize, checksum: u32) -> bool {
		cache.max_run == max_run
			&& cache.chunk_size == self.chunk_size
			&& cache.chars == self.chars
			&& cache.checksum == checksum
	}

	/// Appends another corpus after this one.
	///
	/// Token caches survive only when both sides were tokenized alike.
	pub fn merge(&mut self, other: Corpus) {
		self.cache = match (self.cache.take(), other.cache) {
			(Some(mut mine), Some(theirs)) if mine.max_run == theirs.max_run => {
				mine.chars += theirs.chars;
				mine.tokens.extend(theirs.tokens);
				Some(mine)
			}
			_ => None,
		};
		self.name = format!("{}+{}", self.name, other.name);
		self.chars += other.chars;
		self.chunks.extend(other.chunks);
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn chunks(&self) -> &[String] {
		&self.chunks
	}

	pub fn chunk_count(&self) -> usize {
		self.chunks.len()
	}

	pub fn char_count(&self) -> usize {
		self.chars
	}

	pub fn is_empty(&self) -> bool {
		self.chars == 0
	}

	/// Log-style acknowledgement sent back to the host after initialization.
	pub fn acknowledgement(&self) -> Event {
		Event::Log {
			msg: format!("corpus '{}' split into {} chunks ({} characters)", self.name, self.chunks.len(), self.chars),
		}
	}

	/// Cached tokens, if they were built with `max_run`.
	pub fn cached_tokens(&self, max_run: usize) -> Option<&[String]> {
		self.cache.as_ref().filter(|cache| cache.max_run == max_run).map(|cache| cache.tokens.as_slice())
	}

	/// Tokenizes every chunk across worker threads, keeping chunk order.
	pub fn tokenize_parallel(&self, max_run: usize) -> Vec<String> {
		let cpus = num_cpus::get();
		let per_thread = self.chunks.len().div_ceil(cpus).max(1);

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (index, group) in self.chunks.chunks(per_thread).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let tokens: Vec<String> = group.iter().flat_map(|chunk| tokenize(chunk, max_run)).collect();
					// The receiver outlives the scope.
					let _ = tx.send((index, tokens));
				});
			}
		});
		drop(tx);

		let mut parts: Vec<(usize, Vec<String>)> = rx.iter().collect();
		parts.sort_by_key(|(index, _)| *index);
		parts.into_iter().flat_map(|(_, tokens)| tokens).collect()
	}

	/// Tokenizes chunk by chunk, yielding to the runtime every
	/// `yield_every` chunks.
	///
	/// # Errors
	/// Returns `Cancelled` if `cancel` is raised at a yield point.
	pub async fn tokenize(&self, max_run: usize, yield_every: usize, cancel: &CancelFlag) -> Result<Vec<String>, GenError> {
		let yield_every = yield_every.max(1);
		let mut tokens = Vec::new();

		for (index, chunk) in self.chunks.iter().enumerate() {
			tokens.extend(tokenize(chunk, max_run));
			if (index + 1) % yield_every == 0 {
				cancel.checkpoint(Default::default()).await?;
			}
		}

		Ok(tokens)
	}

	/// Corpus tokens for `max_run`: borrowed from the cache when possible,
	/// tokenized cooperatively otherwise.
	pub async fn tokens(&self, max_run: usize, yield_every: usize, cancel: &CancelFlag) -> Result<Cow<'_, [String]>, GenError> {
		match self.cached_tokens(max_run) {
			Some(tokens) => Ok(Cow::Borrowed(tokens)),
			None => Ok(Cow::Owned(self.tokenize(max_run, yield_every, cancel).await?)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunks_cover_the_text_in_order() {
		let corpus = Corpus::from_text("t", "猫が走る。犬が走る。", 4);
		assert_eq!(corpus.chunks(), ["猫が走る", "。犬が走", "る。"]);
		assert_eq!(corpus.char_count(), 10);
		assert_eq!(corpus.chunks().concat(), "猫が走る。犬が走る。");
	}

	#[test]
	fn empty_text_has_no_chunks() {
		let corpus = Corpus::from_text("empty", "", DEFAULT_CHUNK_SIZE);
		assert!(corpus.is_empty());
		assert_eq!(corpus.chunk_count(), 0);
		assert!(corpus.tokenize_parallel(10).is_empty());
	}

	#[test]
	fn acknowledgement_reports_chunk_count() {
		let corpus = Corpus::from_text("novel", "abcdef", 2);
		match corpus.acknowledgement() {
			Event::Log { msg } => assert!(msg.contains("3 chunks"), "{msg}"),
			other => panic!("unexpected event {other:?}"),
		}
	}

	#[tokio::test]
	async fn parallel_and_cooperative_tokenization_agree() {
		let text = "猫が走る。The quick brown fox jumps. 犬が鳴く！".repeat(50);
		let corpus = Corpus::from_text("t", &text, 7);
		let parallel = corpus.tokenize_parallel(3);
		let cooperative = corpus.tokenize(3, 2, &CancelFlag::new()).await.unwrap();

		assert_eq!(parallel, cooperative);
		assert_eq!(parallel.concat(), text);
	}

	#[tokio::test]
	async fn cancelled_tokenization_stops() {
		let corpus = Corpus::from_text("t", "abcdefgh", 2);
		let cancel = CancelFlag::new();
		cancel.cancel();
		assert!(matches!(corpus.tokenize(3, 1, &cancel).await, Err(GenError::Cancelled)));
	}

	#[test]
	fn load_writes_and_reuses_cache() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("novel.txt");
		fs::write(&path, "猫が走る。犬が走る。").unwrap();

		let first = Corpus::load(&path, 4, 10).unwrap();
		assert!(dir.path().join("novel.bin").exists());
		assert_eq!(first.name(), "novel");
		let tokens = first.cached_tokens(10).unwrap().to_vec();
		assert_eq!(tokens.concat(), "猫が走る。犬が走る。");
		assert!(first.cached_tokens(3).is_none());

		let second = Corpus::load(&path, 4, 10).unwrap();
		assert_eq!(second.cached_tokens(10).unwrap(), tokens.as_slice());

		// Another run length invalidates the cache.
		let third = Corpus::load(&path, 4, 2).unwrap();
		assert!(third.cached_tokens(2).is_some());
		assert!(third.cached_tokens(10).is_none());
	}

	#[test]
	fn same_length_edit_rebuilds_cache() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("novel.txt");
		fs::write(&path, "猫が走る。").unwrap();
		Corpus::load(&path, 4, 10).unwrap();

		fs::write(&path, "犬が鳴く。").unwrap();
		let edited = Corpus::load(&path, 4, 10).unwrap();
		assert_eq!(edited.cached_tokens(10).unwrap().concat(), "犬が鳴く。");
	}

	#[test]
	fn unwritable_cache_keeps_tokens_in_memory() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("novel.txt");
		fs::write(&path, "猫が走る。").unwrap();
		// A directory where the cache file should go: neither readable nor writable as a file.
		fs::create_dir(dir.path().join("novel.bin")).unwrap();

		let corpus = Corpus::load(&path, 4, 10).unwrap();
		assert_eq!(corpus.cached_tokens(10).unwrap().concat(), "猫が走る。");
	}

	#[test]
	fn merge_concatenates_chunks_and_caches() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.txt");
		let b = dir.path().join("b.txt");
		fs::write(&a, "猫が走る。").unwrap();
		fs::write(&b, "犬が鳴く。").unwrap();

		let mut corpus = Corpus::load(&a, 100, 10).unwrap();
		corpus.merge(Corpus::load(&b, 100, 10).unwrap());
		assert_eq!(corpus.name(), "a+b");
		assert_eq!(corpus.chunk_count(), 2);
		assert_eq!(corpus.cached_tokens(10).unwrap().concat(), "猫が走る。犬が鳴く。");

		corpus.merge(Corpus::from_text("c", "鳥", 100));
		assert!(corpus.cached_tokens(10).is_none());
		assert_eq!(corpus.char_count(), 11);
	}
}
