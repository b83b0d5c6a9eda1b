use std::fmt;
use std::fs;
use std::path::{MAIN_SEPARATOR, Path};

use crate::error::{Error, Result};

/// Which stages of the pipeline are in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Components {
  ParserOnly,
  RerankingParser,
}

/// All the knobs the pipeline accepts. Construct with [`Options::parser_only`]
/// or [`Options::reranking`] and tweak the public fields before handing the
/// options to a pipeline, which validates them eagerly and treats them as
/// read-only from then on.
///
/// Potentially confusing is that there are two sentence-length fields.
/// `max_sentence_length` is the largest number of tokens ever accepted;
/// most of the pipeline expects this to be 399 and changing it is not
/// recommended. Longer sentences are cropped at this many tokens.
/// `max_sentence_length_to_parse` is the longest sentence we will actually
/// attempt to parse; anything longer gets a failure tree instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
  // general
  pub components: Components,
  /// whether the n-best list is left in parser order (false) or sorted by
  /// reranker scores (true)
  pub sort_by_reranker_scores: bool,
  pub max_sentence_length_to_parse: usize,

  // parser
  pub parser_model_dir: String,
  pub num_parses: usize,
  pub parser_debug_level: i32,
  pub parser_extra_smoothing: bool,
  pub parser_over_parsing: f64,
  pub parser_extra_pos_smoothing: f64,
  pub parser_case_insensitive: bool,
  pub parser_language: String,
  pub max_sentence_length: usize,

  // reranker
  pub reranker_features_path: Option<String>,
  pub reranker_weights_path: Option<String>,
  pub reranker_feature_class: Option<String>,
  // oops, this probably should have defaulted to true. doesn't affect
  // rankings, just the absolute scores.
  pub relative_counts: bool,
  pub reranker_debug_level: i32,
  /// intentionally independent of `parser_case_insensitive`: typical usage
  /// keeps the parser case sensitive while the reranker lowercases everything
  pub reranker_case_insensitive: bool,
}

impl Options {
  fn defaults(parser_model_dir: String, components: Components) -> Self {
    Self {
      components,
      sort_by_reranker_scores: false,
      max_sentence_length_to_parse: 60,
      parser_model_dir,
      num_parses: 50,
      parser_debug_level: 0,
      parser_extra_smoothing: true,
      parser_over_parsing: 21.0,
      parser_extra_pos_smoothing: 0.0,
      parser_case_insensitive: false,
      parser_language: "En".to_string(),
      max_sentence_length: 399,
      reranker_features_path: None,
      reranker_weights_path: None,
      reranker_feature_class: None,
      relative_counts: false,
      reranker_debug_level: 0,
      reranker_case_insensitive: true,
    }
  }

  /// Options for running the parser by itself.
  pub fn parser_only(parser_model_dir: impl Into<String>) -> Self {
    Self::defaults(parser_model_dir.into(), Components::ParserOnly)
  }

  /// Options for the full reranking parser. Turns on sorting the n-best
  /// list by reranker scores.
  pub fn reranking(
    parser_model_dir: impl Into<String>,
    reranker_features_path: impl Into<String>,
    reranker_weights_path: impl Into<String>,
  ) -> Self {
    let mut options =
      Self::defaults(parser_model_dir.into(), Components::RerankingParser);
    options.reranker_features_path = Some(reranker_features_path.into());
    options.reranker_weights_path = Some(reranker_weights_path.into());
    options.sort_by_reranker_scores = true;
    options
  }

  /// Builds reranking options from a unified model directory containing
  /// `parser/` and `reranker/features.{gz,bz2}` / `reranker/weights.{gz,bz2}`.
  pub fn from_unified_model(unified_model_dir: impl AsRef<Path>) -> Self {
    let base = unified_model_dir.as_ref();

    let pick = |name: &str| {
      let gz = base.join("reranker").join(format!("{}.gz", name));
      if gz.exists() {
        gz
      } else {
        base.join("reranker").join(format!("{}.bz2", name))
      }
    };

    Self::reranking(
      base.join("parser").to_string_lossy().into_owned(),
      pick("features").to_string_lossy().into_owned(),
      pick("weights").to_string_lossy().into_owned(),
    )
  }

  /// Whether the reranker stage is enabled.
  pub fn using_reranker(&self) -> bool {
    self.components == Components::RerankingParser
  }

  /// Makes sure the options are consistent and required model files exist.
  /// The first violated check determines the reported error; all of them are
  /// fatal configuration errors, never retried. On success the parser model
  /// directory is normalized (trailing separators stripped) so repeated
  /// loads can be compared by equality.
  pub fn validate(&mut self) -> Result<()> {
    if self.num_parses < 1 {
      return Err(Error::Config(format!(
        "num_parses must be at least 1 (currently {})",
        self.num_parses
      )));
    }

    check_readable("parser model", &self.parser_model_dir, true)?;

    if self.using_reranker() {
      if self.num_parses <= 1 {
        return Err(Error::Config(
          "can't use the reranker without multiple parses (set num_parses > 1)"
            .to_string(),
        ));
      }
      let features = self.reranker_features_path.as_deref().ok_or_else(|| {
        Error::Config("reranker features path is not set".to_string())
      })?;
      check_readable("reranker features", features, false)?;
      let weights = self.reranker_weights_path.as_deref().ok_or_else(|| {
        Error::Config("reranker weights path is not set".to_string())
      })?;
      check_readable("reranker weights", weights, false)?;
    } else if self.sort_by_reranker_scores {
      return Err(Error::Config(
        "can't sort by reranker scores if not using the reranker".to_string(),
      ));
    }

    if self.max_sentence_length < 1 || self.max_sentence_length > 399 {
      return Err(Error::Config(format!(
        "max_sentence_length must be >= 1 and <= 399 (currently {})",
        self.max_sentence_length
      )));
    }

    if self.max_sentence_length_to_parse > self.max_sentence_length {
      return Err(Error::Config(
        "max_sentence_length_to_parse can't be greater than max_sentence_length"
          .to_string(),
      ));
    }

    self.parser_model_dir = normalize_dir(&self.parser_model_dir);

    Ok(())
  }
}

impl fmt::Display for Options {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Options[")?;
    writeln!(f, "  components: {:?}", self.components)?;
    writeln!(f, "  sort_by_reranker_scores: {}", self.sort_by_reranker_scores)?;
    writeln!(
      f,
      "  max_sentence_length_to_parse: {}",
      self.max_sentence_length_to_parse
    )?;
    writeln!(f, "  parser_model_dir: {}", self.parser_model_dir)?;
    writeln!(f, "  num_parses: {}", self.num_parses)?;
    writeln!(f, "  parser_debug_level: {}", self.parser_debug_level)?;
    writeln!(f, "  parser_extra_smoothing: {}", self.parser_extra_smoothing)?;
    writeln!(f, "  parser_over_parsing: {}", self.parser_over_parsing)?;
    writeln!(
      f,
      "  parser_extra_pos_smoothing: {}",
      self.parser_extra_pos_smoothing
    )?;
    writeln!(f, "  parser_case_insensitive: {}", self.parser_case_insensitive)?;
    writeln!(f, "  parser_language: {}", self.parser_language)?;
    writeln!(f, "  max_sentence_length: {}", self.max_sentence_length)?;
    writeln!(
      f,
      "  reranker_features_path: {:?}",
      self.reranker_features_path
    )?;
    writeln!(f, "  reranker_weights_path: {:?}", self.reranker_weights_path)?;
    writeln!(f, "  reranker_feature_class: {:?}", self.reranker_feature_class)?;
    writeln!(f, "  relative_counts: {}", self.relative_counts)?;
    writeln!(f, "  reranker_debug_level: {}", self.reranker_debug_level)?;
    writeln!(
      f,
      "  reranker_case_insensitive: {}",
      self.reranker_case_insensitive
    )?;
    write!(f, "]")
  }
}

/// Checks that `path` is a readable directory (or regular file), reporting a
/// human-readable description embedding the offending path.
pub fn check_readable(
  description: &str,
  path: &str,
  expect_directory: bool,
) -> Result<()> {
  let p = Path::new(path);

  if expect_directory {
    if !p.is_dir() {
      return Err(Error::Config(format!(
        "{} ({}) is not a directory",
        path, description
      )));
    }
    if fs::read_dir(p).is_err() {
      return Err(Error::Config(format!(
        "{} ({}) exists but is not readable",
        path, description
      )));
    }
  } else {
    if !p.is_file() {
      return Err(Error::Config(format!(
        "{} ({}) is not a regular file",
        path, description
      )));
    }
    if fs::File::open(p).is_err() {
      return Err(Error::Config(format!(
        "{} ({}) exists but is not readable",
        path, description
      )));
    }
  }

  Ok(())
}

fn normalize_dir(path: &str) -> String {
  let trimmed = path.trim_end_matches(['/', MAIN_SEPARATOR]);
  if trimmed.is_empty() {
    path.to_string()
  } else {
    trimmed.to_string()
  }
}
