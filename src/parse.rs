use std::fmt;

/// A single candidate parse of some text, potentially carrying its parser
/// log-probability and reranker score. You typically obtain these from a
/// processed [`Query`](crate::query::Query).
///
/// The tree text is fixed at construction. The parser rank records the
/// 0-based position in the order the parsing engine emitted candidates and
/// never changes; the reranker rank is only assigned by
/// [`sort_by_reranker_scores`] and starts out absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
  pub penn_parse: String,
  pub parser_probability: Option<f64>,
  pub reranker_score: Option<f64>,
  pub parser_rank: Option<usize>,
  pub reranker_rank: Option<usize>,
}

impl Parse {
  pub fn new(penn_parse: impl Into<String>) -> Self {
    Self {
      penn_parse: penn_parse.into(),
      parser_probability: None,
      reranker_score: None,
      parser_rank: None,
      reranker_rank: None,
    }
  }

  pub fn scored(
    penn_parse: impl Into<String>,
    parser_probability: f64,
    reranker_score: Option<f64>,
    parser_rank: usize,
  ) -> Self {
    Self {
      penn_parse: penn_parse.into(),
      parser_probability: Some(parser_probability),
      reranker_score,
      parser_rank: Some(parser_rank),
      reranker_rank: None,
    }
  }
}

impl fmt::Display for Parse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Parse[penn_parse=\"{}\"", self.penn_parse)?;
    if let Some(p) = self.parser_probability {
      write!(f, ", parser_probability={}", p)?;
    }
    if let Some(s) = self.reranker_score {
      write!(f, ", reranker_score={}", s)?;
    }
    write!(f, "]")
  }
}

/// Missing scores sort below every real score.
fn score_key(score: Option<f64>) -> f64 {
  score.unwrap_or(f64::NEG_INFINITY)
}

/// Sorts the parses in place by reranker score, descending. Ties are broken
/// by ascending parser rank, so the candidate the parser preferred comes
/// first. Assigns every parse its reranker rank (0-based position in the
/// new order), overwriting any previous value.
pub fn sort_by_reranker_scores(parses: &mut [Parse]) {
  parses.sort_by(|a, b| {
    score_key(b.reranker_score)
      .total_cmp(&score_key(a.reranker_score))
      .then_with(|| a.parser_rank.cmp(&b.parser_rank))
  });

  for (rank, parse) in parses.iter_mut().enumerate() {
    parse.reranker_rank = Some(rank);
  }
}

/// Sorts the parses in place by parser probability, descending. Ties are
/// broken by descending reranker score. Does not touch either rank field.
pub fn sort_by_parser_probabilities(parses: &mut [Parse]) {
  parses.sort_by(|a, b| {
    score_key(b.parser_probability)
      .total_cmp(&score_key(a.parser_probability))
      .then_with(|| {
        score_key(b.reranker_score).total_cmp(&score_key(a.reranker_score))
      })
  });
}

/// The parse with the strictly greatest parser probability, or `None` for an
/// empty list. In the rare case of a tie we stick with the first one seen.
pub fn best_parse_from_parser(parses: &[Parse]) -> Option<&Parse> {
  let mut best = parses.first()?;
  for parse in parses {
    if parse.parser_probability > best.parser_probability {
      best = parse;
    }
  }
  Some(best)
}

/// The parse with the strictly greatest reranker score, or `None` for an
/// empty list. Ties are broken by n-best list order, first one wins.
pub fn best_parse_from_reranker(parses: &[Parse]) -> Option<&Parse> {
  let mut best = parses.first()?;
  for parse in parses {
    if parse.reranker_score > best.reranker_score {
      best = parse;
    }
  }
  Some(best)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixed_list() -> Vec<Parse> {
    vec![
      Parse::scored("(S1 (X a))", -38.7, Some(2.6), 0),
      Parse::scored("(S1 (X b))", -43.9, Some(0.06), 1),
      Parse::scored("(S1 (X c))", -50.0, Some(9.9), 2),
    ]
  }

  #[test]
  fn test_sort_by_reranker_scores_and_back() {
    let mut parses = fixed_list();
    sort_by_reranker_scores(&mut parses);

    assert_eq!(parses[0].penn_parse, "(S1 (X c))");
    assert_eq!(parses[1].penn_parse, "(S1 (X a))");
    assert_eq!(parses[2].penn_parse, "(S1 (X b))");
    assert_eq!(parses[0].reranker_rank, Some(0));
    assert_eq!(parses[1].reranker_rank, Some(1));
    assert_eq!(parses[2].reranker_rank, Some(2));

    // sorting by parser probability restores emission order without
    // touching the parser ranks
    sort_by_parser_probabilities(&mut parses);
    assert_eq!(parses[0].penn_parse, "(S1 (X a))");
    assert_eq!(parses[1].penn_parse, "(S1 (X b))");
    assert_eq!(parses[2].penn_parse, "(S1 (X c))");
    assert_eq!(parses[0].parser_rank, Some(0));
    assert_eq!(parses[1].parser_rank, Some(1));
    assert_eq!(parses[2].parser_rank, Some(2));
  }

  #[test]
  fn test_reranker_sort_breaks_ties_by_parser_rank() {
    let mut parses = vec![
      Parse::scored("(S1 (X a))", -40.0, Some(1.5), 0),
      Parse::scored("(S1 (X b))", -41.0, Some(1.5), 1),
      Parse::scored("(S1 (X c))", -42.0, Some(2.0), 2),
    ];
    sort_by_reranker_scores(&mut parses);
    assert_eq!(parses[0].penn_parse, "(S1 (X c))");
    // equal reranker scores: the parser's preference wins
    assert_eq!(parses[1].penn_parse, "(S1 (X a))");
    assert_eq!(parses[2].penn_parse, "(S1 (X b))");
  }

  #[test]
  fn test_best_parses() {
    let parses = fixed_list();
    assert_eq!(
      best_parse_from_parser(&parses).unwrap().penn_parse,
      "(S1 (X a))"
    );
    assert_eq!(
      best_parse_from_reranker(&parses).unwrap().penn_parse,
      "(S1 (X c))"
    );
    assert!(best_parse_from_parser(&[]).is_none());
    assert!(best_parse_from_reranker(&[]).is_none());
  }

  #[test]
  fn test_best_parse_ties_keep_first_seen() {
    let parses = vec![
      Parse::scored("(S1 (X a))", -40.0, Some(3.0), 0),
      Parse::scored("(S1 (X b))", -40.0, Some(3.0), 1),
    ];
    assert_eq!(
      best_parse_from_parser(&parses).unwrap().penn_parse,
      "(S1 (X a))"
    );
    assert_eq!(
      best_parse_from_reranker(&parses).unwrap().penn_parse,
      "(S1 (X a))"
    );
  }
}
