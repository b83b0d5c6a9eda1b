#[macro_use]
extern crate lazy_static;

pub mod backend;
pub mod error;
pub mod escape;
pub mod options;
pub mod parse;
pub mod pipeline;
pub mod query;

#[cfg(test)]
mod testutil;

pub use crate::backend::{NoReranker, ParserBackend, RerankerBackend, ScoredTree};
pub use crate::error::{Error, Result};
pub use crate::options::{Components, Options};
pub use crate::parse::Parse;
pub use crate::pipeline::Pipeline;
pub use crate::query::Query;

#[test]
fn test_end_to_end_reranking() {
  use crate::testutil::{MockParser, MockReranker, REGISTRY_GUARD};

  let _guard = REGISTRY_GUARD
    .lock()
    .unwrap_or_else(|poisoned| poisoned.into_inner());

  let parser = MockParser::with_candidates(vec![
    ScoredTree::new(-38.7, "(S1 (NP (DT A) (JJ short) (NN sentence) (. .)))"),
    ScoredTree::new(-43.9, "(S1 (NP (NP (DT A) (JJ short) (NN sentence)) (. .)))"),
  ]);
  let reranker = MockReranker::with_scores(vec![2.6, 0.06]);

  let mut pipeline = Pipeline::reranking(
    Options::reranking(".", "Cargo.toml", "Cargo.toml"),
    parser,
    reranker,
  )
  .unwrap();

  let mut query = Query::from_text("A short sentence.");
  pipeline.process(&mut query).unwrap();

  assert!(query.failure_description().is_none());
  assert_eq!(query.num_parses(), 2);
  assert_eq!(
    query.top_penn_parse(),
    Some("(S1 (NP (DT A) (JJ short) (NN sentence) (. .)))")
  );
  assert_eq!(query.best_parse_from_reranker().unwrap().reranker_rank, Some(0));

  // the n-best list survives a trip through the exchange format
  let rendered = query.to_reranker_format().unwrap();
  let mut read_back = Query::from_text("A short sentence.");
  read_back.read_parses_from_reranker_format(&rendered).unwrap();
  assert_eq!(read_back.num_parses(), 2);
  assert_eq!(read_back.top_penn_parse(), query.top_penn_parse());
}
