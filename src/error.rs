/// Errors raised by the pipeline and its supporting types.
///
/// Only genuinely fatal conditions surface through this enum. Per-query
/// failures (over-length sentences, engine exceptions, empty n-best lists)
/// are *not* errors: they collapse the query's result list to a single
/// fragment parse and set its failure description instead, so batch callers
/// can keep going without special-casing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Options failed their sanity check: bad n-best size, missing model
  /// files, inconsistent mode/sort combination, out-of-range length caps.
  /// Raised at validation time, before any engine is touched.
  #[error("invalid configuration: {0}")]
  Config(String),

  /// Caller contract violation: tag constraints on untokenized input,
  /// constraint/token length mismatch, reading text from a token-only
  /// query, processing against a model that is no longer loaded.
  #[error("usage error: {0}")]
  Usage(String),

  /// Malformed n-best exchange text: declared/actual count mismatch or an
  /// unparsable score field. Fatal to the single deserialization call.
  #[error("bad n-best format: {0}")]
  Format(String),

  /// A failure reported by an external engine while loading a model or
  /// scoring an n-best list.
  #[error("engine error: {0}")]
  Engine(String),
}

pub type Result<T> = std::result::Result<T, Error>;
