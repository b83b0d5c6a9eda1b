//! The boundary with the external parsing and reranking engines.
//!
//! The crate does not implement parsing or reranking itself: the real
//! engines live in natively-built components, and embedders wire them in by
//! implementing these traits. The pipeline only ever talks to the engines
//! through them, so everything on this side stays testable with in-process
//! fakes.
//!
//! Thread safety is owned by the engines, not by this crate: the pipeline
//! serializes model checks and dispatch behind a process-wide lock, but
//! concurrent engines are on the implementor.

use crate::error::{Error, Result};
use crate::options::Options;

/// One candidate emitted by the parsing engine: a log-probability and a
/// bracketed tree in the engine's PTB-escaped form.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTree {
  pub score: f64,
  pub tree: String,
}

impl ScoredTree {
  pub fn new(score: f64, tree: impl Into<String>) -> Self {
    Self {
      score,
      tree: tree.into(),
    }
  }
}

/// The native parsing engine. Only one parsing model can be resident per
/// process; the pipeline enforces that through its loaded-model registry,
/// so implementations can assume `load_model` and `parse` are serialized.
pub trait ParserBackend {
  /// Loads the parsing model from a directory. Fatal if the path is
  /// invalid; reloading the same path must be harmless.
  fn load_model(&mut self, model_dir: &str) -> Result<()>;

  /// Pushes the current option values down to the engine. Called once at
  /// pipeline construction, after the model is loaded.
  fn set_options(&mut self, options: &Options) -> Result<()>;

  /// Splits escaped, `<s>`-marked text into tokens, respecting the hard
  /// token cap.
  fn tokenize(&self, marked_text: &str, hard_cap: usize) -> Result<Vec<String>>;

  /// Parses a token sequence, optionally constrained to the allowed tags
  /// per position (an empty tag set means unconstrained). May return an
  /// empty list when no parse was found within the engine's limits.
  fn parse(
    &self,
    tokens: &[String],
    tag_constraints: Option<&[Vec<String>]>,
  ) -> Result<Vec<ScoredTree>>;

  /// Renders candidates into the n-best text the reranker consumes: a
  /// header line with the candidate count and a sentence identifier, then
  /// one score line and one tree line per candidate.
  fn as_nbest_list(&self, candidates: &[ScoredTree], id: &str) -> String {
    let mut out = format!("{} {}\n", candidates.len(), id);
    for candidate in candidates {
      out.push_str(&format!("{}\n{}\n", candidate.score, candidate.tree));
    }
    out
  }
}

/// The native reranking engine. Weights are a per-process singleton, same
/// as the parsing model.
pub trait RerankerBackend {
  /// The engine's internal representation of a read n-best list.
  type NBest;

  /// Loads feature and weight files, optionally selecting a feature class
  /// within the feature extractor. Fatal if either path is invalid.
  fn load_weights(
    &mut self,
    feature_class: Option<&str>,
    features_path: &str,
    weights_path: &str,
  ) -> Result<()>;

  /// Pushes reranker option values down to the engine.
  fn set_options(&mut self, debug_level: i32, relative_counts: bool) -> Result<()>;

  /// Reads n-best text (the output of [`ParserBackend::as_nbest_list`])
  /// into the engine's internal representation.
  fn read_nbest(&self, text: &str, case_insensitive: bool) -> Result<Self::NBest>;

  /// Scores a read n-best list, one real-valued score per candidate,
  /// aligned by position.
  fn score(&self, nbest: &Self::NBest) -> Result<Vec<f64>>;
}

/// Placeholder reranker for parser-only pipelines. Never invoked; every
/// method is a usage error.
#[derive(Debug, Default)]
pub struct NoReranker;

impl RerankerBackend for NoReranker {
  type NBest = ();

  fn load_weights(
    &mut self,
    _feature_class: Option<&str>,
    _features_path: &str,
    _weights_path: &str,
  ) -> Result<()> {
    Err(Error::Usage(
      "this pipeline was built without a reranker".to_string(),
    ))
  }

  fn set_options(&mut self, _debug_level: i32, _relative_counts: bool) -> Result<()> {
    Err(Error::Usage(
      "this pipeline was built without a reranker".to_string(),
    ))
  }

  fn read_nbest(&self, _text: &str, _case_insensitive: bool) -> Result<()> {
    Err(Error::Usage(
      "this pipeline was built without a reranker".to_string(),
    ))
  }

  fn score(&self, _nbest: &()) -> Result<Vec<f64>> {
    Err(Error::Usage(
      "this pipeline was built without a reranker".to_string(),
    ))
  }
}
