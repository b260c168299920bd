// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Manages the tokenizer used to encode meme transcriptions:
//
//   - import(): copy a pretrained HuggingFace tokenizer.json
//     into the store so prediction reuses the exact same one
//   - load_or_build(): reuse the stored tokenizer, or build a
//     word-level BERT-style vocabulary from the training texts
//   - load(): read the stored tokenizer back
//
// Built vocabularies are written as tokenizer JSON and read back
// through Tokenizer::from_file.
//
// Special token ids are contiguous from zero so the embedding
// table needs no holes:
//   [PAD]=0  [UNK]=1  [CLS]=2  [SEP]=3  [MASK]=4

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::{
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer,
    Tokenizer,
};

const TOKENIZER_FILE: &str = "tokenizer.json";
const SPECIAL_TOKENS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load an external tokenizer file and save a copy in the store,
    /// without any padding or truncation it was exported with
    pub fn import(&self, source: &Path) -> Result<Tokenizer> {
        let mut tokenizer = Tokenizer::from_file(source).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", source.display(), e)
        })?;
        // Samples are fitted to text_max_length by the dataset
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| anyhow::anyhow!("Cannot clear truncation: {e}"))?;
        self.save(&tokenizer)?;
        tracing::info!("Imported tokenizer from '{}'", source.display());
        Ok(tokenizer)
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow::anyhow!("Cannot save tokenizer to '{}': {}", path.display(), e))
    }

    /// Build a word-level vocabulary from the texts and write a
    /// tokenizer JSON in HuggingFace format.
    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Count word frequencies ────────────────────────────────────
        // Words are the pieces the finished tokenizer will look up, so
        // they come from its own normalizer and pre-tokenizer.
        let shell = tokenizer_json(special_vocab())
            .to_string()
            .parse::<Tokenizer>()
            .map_err(|e| anyhow::anyhow!("Cannot create tokenizer: {e}"))?;
        let freq = count_words(&shell, texts)?;

        // Most frequent first; ties broken alphabetically so the
        // same corpus always yields the same ids
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: Build vocab JSON ──────────────────────────────────────────
        let mut vocab   = special_vocab();
        let mut next_id = SPECIAL_TOKENS.len();
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        // ── Step 3: Write tokenizer JSON ──────────────────────────────────────
        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json(vocab))?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", tok_path.display()))?;

        tracing::info!(
            "Tokenizer built with {} tokens, saved to '{}'",
            next_id,
            tok_path.display()
        );

        Tokenizer::from_file(&tok_path)
            .map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

fn special_vocab() -> serde_json::Map<String, serde_json::Value> {
    SPECIAL_TOKENS
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), serde_json::json!(id)))
        .collect()
}

fn tokenizer_json(vocab: serde_json::Map<String, serde_json::Value>) -> serde_json::Value {
    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .enumerate()
        .map(|(id, token)| {
            serde_json::json!({
                "id": id, "content": token, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            })
        })
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": {
            "type": "Whitespace"
        },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
}

/// Frequency of every pre-tokenized piece `tokenizer` produces for `texts`
fn count_words(tokenizer: &Tokenizer, texts: &[String]) -> Result<HashMap<String, usize>> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        let mut normalized = NormalizedString::from(text.as_str());
        if let Some(normalizer) = tokenizer.get_normalizer() {
            normalizer
                .normalize(&mut normalized)
                .map_err(|e| anyhow::anyhow!("Cannot normalize '{text}': {e}"))?;
        }
        let mut pieces = PreTokenizedString::from(normalized);
        if let Some(pre_tokenizer) = tokenizer.get_pre_tokenizer() {
            pre_tokenizer
                .pre_tokenize(&mut pieces)
                .map_err(|e| anyhow::anyhow!("Cannot pre-tokenize '{text}': {e}"))?;
        }
        for (word, _, _) in pieces.get_splits(OffsetReferential::Normalized, OffsetType::Byte) {
            if !word.trim().is_empty() {
                *freq.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }
    Ok(freq)
}

/// Rows needed in an embedding table indexed by this tokenizer's ids
pub fn embedding_size(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map(|&max| max as usize + 1)
        .unwrap_or(0)
}

/// Id used to pad sequences: `[PAD]` if the vocabulary has it, else 0
pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.token_to_id("[PAD]").unwrap_or(0)
}
