use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::backend::{NoReranker, ParserBackend, RerankerBackend};
use crate::error::{Error, Result};
use crate::escape::unescape_text;
use crate::options::Options;
use crate::parse::Parse;
use crate::query::Query;

lazy_static! {
  /// The engine can only hold one parsing model per process. This records
  /// the normalized directory of the model currently resident, and its lock
  /// is held across the "right model loaded?" check and the engine dispatch
  /// so a query never runs against a model directory it didn't request.
  static ref LOADED_MODEL: Mutex<Option<String>> = Mutex::new(None);
}

/// Drives the query lifecycle: tokenization, the length guard, dispatch to
/// the external parsing engine and (optionally) the reranking engine, result
/// assembly, and the optional reranker sort.
///
/// Constructing a pipeline validates its options eagerly and loads the
/// parsing model (and reranker weights, when enabled). Options are
/// read-only from then on.
pub struct Pipeline<P, R = NoReranker> {
  options: Options,
  parser: P,
  reranker: Option<R>,
}

impl<P: ParserBackend> Pipeline<P> {
  /// Builds a parser-only pipeline.
  pub fn parser_only(options: Options, parser: P) -> Result<Self> {
    if options.using_reranker() {
      return Err(Error::Config(
        "options enable the reranker but no reranker backend was supplied"
          .to_string(),
      ));
    }
    Self::build(options, parser, None)
  }
}

impl<P: ParserBackend, R: RerankerBackend> Pipeline<P, R> {
  /// Builds a reranking pipeline.
  pub fn reranking(options: Options, parser: P, reranker: R) -> Result<Self> {
    if !options.using_reranker() {
      return Err(Error::Config(
        "options are parser-only but a reranker backend was supplied".to_string(),
      ));
    }
    Self::build(options, parser, Some(reranker))
  }

  fn build(mut options: Options, mut parser: P, mut reranker: Option<R>) -> Result<Self> {
    options.validate()?;

    {
      let mut loaded = lock_registry();
      if loaded.as_deref() != Some(options.parser_model_dir.as_str()) {
        info!(model_dir = %options.parser_model_dir, "loading parsing model");
        parser.load_model(&options.parser_model_dir)?;
        *loaded = Some(options.parser_model_dir.clone());
      }
      parser.set_options(&options)?;
    }

    if options.using_reranker() {
      let reranker = reranker.as_mut().ok_or_else(|| {
        Error::Config("reranker enabled but no backend supplied".to_string())
      })?;
      reranker.set_options(options.reranker_debug_level, options.relative_counts)?;
      let features = options.reranker_features_path.as_deref().ok_or_else(|| {
        Error::Config("reranker features path is not set".to_string())
      })?;
      let weights = options.reranker_weights_path.as_deref().ok_or_else(|| {
        Error::Config("reranker weights path is not set".to_string())
      })?;
      info!(features, weights, "loading reranker weights");
      reranker.load_weights(
        options.reranker_feature_class.as_deref(),
        features,
        weights,
      )?;
    }

    Ok(Self {
      options,
      parser,
      reranker,
    })
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  pub fn parser(&self) -> &P {
    &self.parser
  }

  pub fn reranker(&self) -> Option<&R> {
    self.reranker.as_ref()
  }

  /// Processes a query in place. On return, exactly one of these holds:
  /// a non-empty parse list with no failure description, or a single
  /// synthetic fragment parse with a failure description. Per-query
  /// failures (over-length input, an engine exception, zero parses) land in
  /// the second shape and are `Ok`; only configuration and usage errors are
  /// `Err`.
  pub fn process(&mut self, query: &mut Query) -> Result<()> {
    // held until we're done dispatching into the engines
    let loaded = lock_registry();
    if loaded.as_deref() != Some(self.options.parser_model_dir.as_str()) {
      return Err(Error::Usage(format!(
        "the parsing model for this pipeline ({}) is no longer loaded; the \
         engine can only hold one parsing model at a time",
        self.options.parser_model_dir
      )));
    }

    // reset in case this query was already processed, perhaps with
    // different constraints
    query.reset_results();

    let tokens = query.tokenize(&self.options, &self.parser)?.to_vec();

    // fail fast if the sentence is too long
    if tokens.len() > self.options.max_sentence_length_to_parse {
      if tokens.len() > self.options.max_sentence_length {
        // past the hard cap we can't even keep the whole failure tree;
        // keep the first max_sentence_length tokens and drop the stale
        // text form
        warn!(num_tokens = tokens.len(), "sentence exceeds the hard length cap");
        let truncated = tokens[..self.options.max_sentence_length].to_vec();
        query.set_tokens(truncated.clone());
        query.fail("Sentence is WAY too long", &truncated);
      } else {
        debug!(num_tokens = tokens.len(), "sentence exceeds the parse length cap");
        query.fail("Sentence is too long", &tokens);
      }
      return Ok(());
    }

    let tag_matrix = query.tag_matrix(tokens.len())?;

    // the real parsing happens here
    let candidates = match self.parser.parse(&tokens, tag_matrix.as_deref()) {
      Ok(candidates) => candidates,
      Err(e) => {
        warn!(error = %e, "parsing engine failure");
        query.fail(format!("Parser engine exception: {}", e), &tokens);
        return Ok(());
      }
    };

    // in the rare cases where the engine couldn't parse the sentence at
    // all, substitute a failure tree
    if candidates.is_empty() {
      debug!("engine returned no parses");
      query.fail("No parses", &tokens);
      return Ok(());
    }

    // the real reranking happens here (if desired)
    let reranker_scores = if self.options.using_reranker() {
      let reranker = self.reranker.as_ref().ok_or_else(|| {
        Error::Config("reranker enabled but no backend supplied".to_string())
      })?;
      // TODO: support sentence IDs; they are always dummy for now
      let nbest_text = self.parser.as_nbest_list(&candidates, "dummy");
      let nbest = reranker
        .read_nbest(&nbest_text, self.options.reranker_case_insensitive)?;
      let scores = reranker.score(&nbest)?;
      if scores.len() != candidates.len() {
        return Err(Error::Engine(format!(
          "reranker returned {} scores for {} candidates",
          scores.len(),
          candidates.len()
        )));
      }
      Some(scores)
    } else {
      None
    };

    let mut parses = Vec::with_capacity(candidates.len());
    for (rank, candidate) in candidates.iter().enumerate() {
      let tree = unescape_text(&candidate.tree);
      let reranker_score = reranker_scores.as_ref().map(|scores| scores[rank]);
      parses.push(Parse::scored(tree, candidate.score, reranker_score, rank));
    }
    query.set_parses(parses);

    if self.options.sort_by_reranker_scores {
      query.sort_by_reranker_scores();
    }

    Ok(())
  }
}

fn lock_registry() -> std::sync::MutexGuard<'static, Option<String>> {
  LOADED_MODEL
    .lock()
    .unwrap_or_else(|poisoned| poisoned.into_inner())
}
