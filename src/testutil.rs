//! In-process fake engines shared by unit tests. The fake tokenizer covers
//! just enough of the real engine's behavior (clitic splitting, punctuation
//! splitting, PTB bracket codes, sentinel pass-through) to exercise the
//! query and pipeline paths.

use std::cell::RefCell;
use std::sync::Mutex;

use crate::backend::{ParserBackend, RerankerBackend, ScoredTree};
use crate::error::{Error, Result};
use crate::options::Options;

lazy_static! {
  /// Serializes tests that touch the process-wide loaded-model registry.
  pub static ref REGISTRY_GUARD: Mutex<()> = Mutex::new(());
}

#[derive(Debug, Default)]
pub struct MockParser {
  /// returned verbatim by `parse`
  pub candidates: Vec<ScoredTree>,
  /// when set, `parse` fails with this engine error instead
  pub parse_error: Option<String>,
  pub loaded_model: RefCell<Option<String>>,
  pub seen_constraints: RefCell<Option<Vec<Vec<String>>>>,
}

impl MockParser {
  pub fn with_candidates(candidates: Vec<ScoredTree>) -> Self {
    Self {
      candidates,
      ..Self::default()
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      parse_error: Some(message.to_string()),
      ..Self::default()
    }
  }
}

impl ParserBackend for MockParser {
  fn load_model(&mut self, model_dir: &str) -> Result<()> {
    *self.loaded_model.borrow_mut() = Some(model_dir.to_string());
    Ok(())
  }

  fn set_options(&mut self, _options: &Options) -> Result<()> {
    Ok(())
  }

  fn tokenize(&self, marked_text: &str, hard_cap: usize) -> Result<Vec<String>> {
    let s = marked_text.trim();
    let s = s.strip_prefix("<s>").unwrap_or(s);
    let s = s.strip_suffix("</s>").unwrap_or(s);

    let mut tokens = Vec::new();
    for chunk in s.split_whitespace() {
      split_chunk(chunk, &mut tokens);
    }
    tokens.truncate(hard_cap);
    Ok(tokens)
  }

  fn parse(
    &self,
    _tokens: &[String],
    tag_constraints: Option<&[Vec<String>]>,
  ) -> Result<Vec<ScoredTree>> {
    *self.seen_constraints.borrow_mut() = tag_constraints.map(|c| c.to_vec());
    if let Some(message) = &self.parse_error {
      return Err(Error::Engine(message.clone()));
    }
    Ok(self.candidates.clone())
  }
}

#[derive(Debug, Default)]
pub struct MockReranker {
  /// returned verbatim by `score`
  pub scores: Vec<f64>,
  pub loaded_weights: RefCell<Option<(Option<String>, String, String)>>,
  pub seen_nbest_text: RefCell<Option<String>>,
}

impl MockReranker {
  pub fn with_scores(scores: Vec<f64>) -> Self {
    Self {
      scores,
      ..Self::default()
    }
  }
}

impl RerankerBackend for MockReranker {
  type NBest = String;

  fn load_weights(
    &mut self,
    feature_class: Option<&str>,
    features_path: &str,
    weights_path: &str,
  ) -> Result<()> {
    *self.loaded_weights.borrow_mut() = Some((
      feature_class.map(str::to_string),
      features_path.to_string(),
      weights_path.to_string(),
    ));
    Ok(())
  }

  fn set_options(&mut self, _debug_level: i32, _relative_counts: bool) -> Result<()> {
    Ok(())
  }

  fn read_nbest(&self, text: &str, case_insensitive: bool) -> Result<String> {
    let text = if case_insensitive {
      text.to_ascii_lowercase()
    } else {
      text.to_string()
    };
    *self.seen_nbest_text.borrow_mut() = Some(text.clone());
    Ok(text)
  }

  fn score(&self, _nbest: &String) -> Result<Vec<f64>> {
    Ok(self.scores.clone())
  }
}

fn is_sentinel(chunk: &str) -> bool {
  chunk == "CARET_CARET"
    || (chunk.starts_with("CLOSE_") && chunk.ends_with("_TAG"))
}

fn bracket_code(c: char) -> Option<&'static str> {
  match c {
    '(' => Some("-LRB-"),
    ')' => Some("-RRB-"),
    '[' => Some("-LSB-"),
    ']' => Some("-RSB-"),
    '{' => Some("-LCB-"),
    '}' => Some("-RCB-"),
    _ => None,
  }
}

fn split_chunk(chunk: &str, out: &mut Vec<String>) {
  if is_sentinel(chunk) {
    out.push(chunk.to_string());
    return;
  }

  let mut word = String::new();
  for c in chunk.chars() {
    if let Some(code) = bracket_code(c) {
      if !word.is_empty() {
        split_word(&std::mem::take(&mut word), out);
      }
      out.push(code.to_string());
    } else {
      word.push(c);
    }
  }
  if !word.is_empty() {
    split_word(&word, out);
  }
}

const CLITICS: [&str; 7] = ["n't", "'s", "'re", "'ll", "'ve", "'d", "'m"];

fn split_word(word: &str, out: &mut Vec<String>) {
  let mut stem = word;
  let mut trailing = Vec::new();
  while let Some(last) = stem.chars().next_back() {
    if matches!(last, '.' | ',' | '?' | '!' | ':' | ';') {
      trailing.push(last.to_string());
      stem = &stem[..stem.len() - last.len_utf8()];
    } else {
      break;
    }
  }

  if !stem.is_empty() {
    let lower = stem.to_ascii_lowercase();
    let clitic = CLITICS
      .iter()
      .find(|c| lower.ends_with(*c) && stem.len() > c.len());
    if let Some(clitic) = clitic {
      let split_at = stem.len() - clitic.len();
      out.push(stem[..split_at].to_string());
      out.push(stem[split_at..].to_string());
    } else {
      out.push(stem.to_string());
    }
  }

  // collected innermost-last, emit in sentence order
  for t in trailing.into_iter().rev() {
    out.push(t);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(input: &str) -> Vec<String> {
    let parser = MockParser::default();
    parser
      .tokenize(&format!("<s> {} </s>", input), 399)
      .unwrap()
  }

  #[test]
  fn test_fake_tokenizer_splits_clitics_and_punctuation() {
    assert_eq!(
      tokens("These aren't the droids you're looking for."),
      "These are n't the droids you 're looking for ."
        .split(' ')
        .map(str::to_string)
        .collect::<Vec<_>>()
    );
  }

  #[test]
  fn test_fake_tokenizer_brackets() {
    assert_eq!(
      tokens("Lots of brackets but no spaces: ()[]{}"),
      "Lots of brackets but no spaces : -LRB- -RRB- -LSB- -RSB- -LCB- -RCB-"
        .split(' ')
        .map(str::to_string)
        .collect::<Vec<_>>()
    );
  }

  #[test]
  fn test_fake_tokenizer_passes_sentinels_through() {
    assert_eq!(
      tokens("a CLOSE_s_TAG tag and a CARET_CARET"),
      vec!["a", "CLOSE_s_TAG", "tag", "and", "a", "CARET_CARET"]
    );
  }
}
