use std::collections::HashMap;
use std::fmt;

use crate::backend::ParserBackend;
use crate::error::{Error, Result};
use crate::escape::{escape_text, ptb_escape};
use crate::options::Options;
use crate::parse::{
  self, Parse, best_parse_from_parser, best_parse_from_reranker,
};

/// The text to be parsed, in exactly one of its two representations.
/// Reassigning the input invalidates any tokenization the query has cached.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
  /// Untokenized text; the engine's tokenizer will split it.
  Text(String),
  /// Pre-tokenized text, used verbatim (after escaping), order preserved.
  Tokens(Vec<String>),
}

/// A single piece of text (sentence or utterance) to be parsed. Feed it to
/// [`Pipeline::process`](crate::pipeline::Pipeline::process) and the results
/// (parses and possibly a failure description) are populated in place.
///
/// A query can be reprocessed: every processing attempt starts by resetting
/// the parses and failure description, so running the same query again with
/// different constraints is supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  input: Input,
  /// allowed part-of-speech tags by 0-based token position; only valid for
  /// pre-tokenized input
  tag_constraints: Option<HashMap<usize, Vec<String>>>,
  parses: Option<Vec<Parse>>,
  failure_description: Option<String>,
  /// escaped token sequence, built on demand and wiped by the setters
  cached_tokens: Option<Vec<String>>,
}

impl Query {
  pub fn from_text(text: impl Into<String>) -> Self {
    Self {
      input: Input::Text(text.into()),
      tag_constraints: None,
      parses: None,
      failure_description: None,
      cached_tokens: None,
    }
  }

  pub fn from_tokens(tokens: Vec<String>) -> Self {
    Self {
      input: Input::Tokens(tokens),
      tag_constraints: None,
      parses: None,
      failure_description: None,
      cached_tokens: None,
    }
  }

  /// Whether the input is pre-tokenized.
  pub fn already_tokenized(&self) -> bool {
    matches!(self.input, Input::Tokens(_))
  }

  /// The original untokenized text. Usage error for a query constructed
  /// from tokens, which doesn't know its original text.
  pub fn text(&self) -> Result<&str> {
    match &self.input {
      Input::Text(text) => Ok(text),
      Input::Tokens(_) => Err(Error::Usage(
        "don't know the original text for this query since it was constructed from tokens"
          .to_string(),
      )),
    }
  }

  /// The token sequence: the escaped tokenization if one has been built,
  /// otherwise the pre-tokenized input. Usage error for an untokenized
  /// text query (call [`Query::tokenize`] first).
  pub fn tokens(&self) -> Result<&[String]> {
    if let Some(tokens) = &self.cached_tokens {
      return Ok(tokens);
    }
    match &self.input {
      Input::Tokens(tokens) => Ok(tokens),
      Input::Text(_) => Err(Error::Usage(
        "tokens unavailable for this query (call tokenize() first)".to_string(),
      )),
    }
  }

  /// Replaces the input with untokenized text. Clears the cached
  /// tokenization and any tag constraints, which only apply to
  /// pre-tokenized input.
  pub fn set_text(&mut self, text: impl Into<String>) {
    self.input = Input::Text(text.into());
    self.cached_tokens = None;
    self.tag_constraints = None;
  }

  /// Replaces the input with pre-tokenized text and clears the cached
  /// tokenization. Tag constraints are kept; re-set them if they should
  /// change along with the tokens.
  pub fn set_tokens(&mut self, tokens: Vec<String>) {
    self.input = Input::Tokens(tokens);
    self.cached_tokens = None;
  }

  pub fn tag_constraints(&self) -> Option<&HashMap<usize, Vec<String>>> {
    self.tag_constraints.as_ref()
  }

  /// Constrains the allowed part-of-speech tags at the given 0-based token
  /// positions. Usage error unless the input is pre-tokenized.
  pub fn set_tag_constraints(
    &mut self,
    tag_constraints: HashMap<usize, Vec<String>>,
  ) -> Result<()> {
    if !self.already_tokenized() {
      return Err(Error::Usage(
        "can't use tag constraints unless input is already tokenized".to_string(),
      ));
    }
    self.tag_constraints = Some(tag_constraints);
    self.cached_tokens = None;
    Ok(())
  }

  pub fn clear_tag_constraints(&mut self) {
    self.tag_constraints = None;
    self.cached_tokens = None;
  }

  /// Escapes the input and produces the token sequence the engines consume.
  /// Pre-tokenized input is escaped token by token (bracket escapes first,
  /// then tokenizer escapes) and used verbatim; raw text is escaped whole,
  /// wrapped in sentence markers, and split by the engine's tokenizer under
  /// the hard length cap. The result is cached until the input changes.
  pub fn tokenize<P: ParserBackend>(
    &mut self,
    options: &Options,
    parser: &P,
  ) -> Result<&[String]> {
    if self.cached_tokens.is_none() {
      let tokens = match &self.input {
        Input::Tokens(tokens) => tokens
          .iter()
          .map(|token| escape_text(&ptb_escape(token)))
          .collect(),
        Input::Text(text) => {
          let marked = format!("<s> {} </s>", escape_text(text));
          parser.tokenize(&marked, options.max_sentence_length)?
        }
      };
      self.cached_tokens = Some(tokens);
    }

    Ok(self.cached_tokens.as_deref().expect("tokenization was just cached"))
  }

  /// Builds the per-position allowed-tag structure, aligned 1:1 with the
  /// token sequence (an empty tag set means unconstrained). `None` when the
  /// query has no constraints. A constraint beyond the token count is a
  /// usage error.
  pub fn tag_matrix(&self, num_tokens: usize) -> Result<Option<Vec<Vec<String>>>> {
    let constraints = match &self.tag_constraints {
      Some(constraints) => constraints,
      None => return Ok(None),
    };

    let mut matrix = vec![Vec::new(); num_tokens];
    for (&position, tags) in constraints {
      if position >= num_tokens {
        return Err(Error::Usage(format!(
          "tag constraint at position {} doesn't fit the sentence ({} tokens)",
          position, num_tokens
        )));
      }
      matrix[position] = tags.clone();
    }

    Ok(Some(matrix))
  }

  //
  // results
  //

  pub fn parses(&self) -> Option<&[Parse]> {
    self.parses.as_deref()
  }

  pub fn set_parses(&mut self, parses: Vec<Parse>) {
    self.parses = Some(parses);
  }

  pub fn failure_description(&self) -> Option<&str> {
    self.failure_description.as_deref()
  }

  /// Wipes parses and failure description so the query can be processed
  /// again, perhaps with different constraints.
  pub fn reset_results(&mut self) {
    self.parses = None;
    self.failure_description = None;
  }

  /// Collapses the result list to a single synthetic fragment parse and
  /// records the failure description. Used for the recoverable per-query
  /// failures: over-length sentences, engine exceptions, empty n-best lists.
  pub fn fail(&mut self, description: impl Into<String>, tokens: &[String]) {
    self.parses = Some(vec![Parse::new(fragment_tree(tokens))]);
    self.failure_description = Some(description.into());
  }

  pub fn num_parses(&self) -> usize {
    self.parses.as_ref().map_or(0, Vec::len)
  }

  /// The first parse of the n-best list in Penn Treebank format, or `None`
  /// if the query hasn't produced any parses.
  pub fn top_penn_parse(&self) -> Option<&str> {
    self
      .parses
      .as_ref()
      .and_then(|parses| parses.first())
      .map(|parse| parse.penn_parse.as_str())
  }

  /// Best parse according to the parser; ties keep the first one seen.
  pub fn best_parse_from_parser(&self) -> Option<&Parse> {
    best_parse_from_parser(self.parses.as_deref().unwrap_or(&[]))
  }

  /// Best parse according to the reranker; ties keep the first one seen.
  pub fn best_parse_from_reranker(&self) -> Option<&Parse> {
    best_parse_from_reranker(self.parses.as_deref().unwrap_or(&[]))
  }

  /// Sorts the parses in place by reranker score and assigns reranker
  /// ranks. See [`parse::sort_by_reranker_scores`].
  pub fn sort_by_reranker_scores(&mut self) {
    if let Some(parses) = &mut self.parses {
      parse::sort_by_reranker_scores(parses);
    }
  }

  /// Sorts the parses in place by parser probability. See
  /// [`parse::sort_by_parser_probabilities`].
  pub fn sort_by_parser_probabilities(&mut self) {
    if let Some(parses) = &mut self.parses {
      parse::sort_by_parser_probabilities(parses);
    }
  }

  //
  // reranker n-best exchange format
  //

  /// Renders the n-best list in the command-line reranker's output format:
  /// a `count id` header, then one score line (`rerankerScore parserScore`,
  /// or `fail <description>`) and one tree line per parse. An absent score
  /// is written as the literal `null`.
  pub fn to_reranker_format(&self) -> Result<String> {
    let parses = self.parses.as_ref().ok_or_else(|| {
      Error::Usage("query has no parses to serialize (process it first)".to_string())
    })?;

    let mut out = format!("{} d\n", parses.len());

    if let Some(description) = &self.failure_description {
      let tree = parses.first().ok_or_else(|| {
        Error::Usage("failed query with an empty parse list".to_string())
      })?;
      out.push_str(&format!("fail {}\n{}\n", description, tree.penn_parse));
    } else {
      if parses.is_empty() {
        return Err(Error::Usage(
          "query with no parses but no failure description".to_string(),
        ));
      }
      for parse in parses {
        out.push_str(&format!(
          "{} {}\n{}\n",
          format_score(parse.reranker_score),
          format_score(parse.parser_probability),
          parse.penn_parse
        ));
      }
    }

    Ok(out)
  }

  /// Reads an n-best list in the format produced by
  /// [`Query::to_reranker_format`], replacing this query's parses (and
  /// failure description) only if the whole text parses cleanly. The
  /// declared candidate count must match the actual number of score/tree
  /// line pairs.
  pub fn read_parses_from_reranker_format(&mut self, text: &str) -> Result<()> {
    if text.is_empty() {
      return Err(Error::Format("empty text".to_string()));
    }

    let mut lines = text.lines();
    let header = lines
      .next()
      .ok_or_else(|| Error::Format("missing header line".to_string()))?;
    let declared: usize = header
      .split_whitespace()
      .next()
      .ok_or_else(|| Error::Format("blank header line".to_string()))?
      .parse()
      .map_err(|_| {
        Error::Format(format!("unparsable parse count in header {:?}", header))
      })?;

    let mut new_parses = Vec::new();
    let mut failure = None;

    while let Some(score_line) = lines.next() {
      let tree_line = lines.next().ok_or_else(|| {
        Error::Format(format!("score line {:?} has no tree line", score_line))
      })?;

      let mut pieces = score_line.splitn(2, char::is_whitespace);
      let first = pieces.next().unwrap_or("");

      if first == "fail" {
        failure = Some(pieces.next().unwrap_or("").to_string());
        new_parses.push(Parse::new(tree_line));
      } else {
        let reranker_score = parse_score(first)?;
        let parser_probability =
          parse_score(pieces.next().map(str::trim).ok_or_else(|| {
            Error::Format(format!("score line {:?} is missing the parser score", score_line))
          })?)?;
        new_parses.push(Parse {
          penn_parse: tree_line.to_string(),
          parser_probability,
          reranker_score,
          parser_rank: None,
          reranker_rank: None,
        });
      }
    }

    if declared != new_parses.len() {
      return Err(Error::Format(format!(
        "number of parses declared ({}) doesn't match actual number given ({})",
        declared,
        new_parses.len()
      )));
    }

    self.parses = Some(new_parses);
    self.failure_description = failure;
    Ok(())
  }
}

impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Query[")?;
    match &self.input {
      Input::Text(text) => write!(f, "text=\"{}\"", text)?,
      Input::Tokens(tokens) => write!(f, "tokens={:?}", tokens)?,
    }
    if let Some(top) = self.top_penn_parse() {
      write!(f, ", top_penn_parse=\"{}\"", top)?;
    }
    write!(f, ", num_parses={}]", self.num_parses())
  }
}

/// `(S1 (FRAG (X tok) ...))` placeholder substituted when no real parse is
/// produced.
fn fragment_tree(tokens: &[String]) -> String {
  let mut tree = String::from("(S1 (FRAG");
  for token in tokens {
    tree.push_str(&format!(" (X {})", token));
  }
  tree.push_str("))");
  tree
}

fn format_score(score: Option<f64>) -> String {
  match score {
    Some(score) => score.to_string(),
    None => "null".to_string(),
  }
}

fn parse_score(field: &str) -> Result<Option<f64>> {
  if field == "null" {
    return Ok(None);
  }
  field
    .parse::<f64>()
    .map(Some)
    .map_err(|e| Error::Format(format!("unparsable score field {:?}: {}", field, e)))
}
