//! Reversible text transforms protecting tokenizer-breaking substrings, plus
//! the standard Penn Treebank bracket escapes.

use regex::Regex;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Bracket characters and their fixed PTB codes. Applied once, in this
/// order, never recursively, so already-escaped text is not double-escaped.
const PTB_MAPPING: [(&str, &str); 6] = [
  ("-LRB-", "("),
  ("-RRB-", ")"),
  ("-LCB-", "{"),
  ("-RCB-", "}"),
  ("-LSB-", "["),
  ("-RSB-", "]"),
];

/// Escapes substrings which confuse the parsing engine's tokenizer: the
/// double caret and any `</s>` tag (case-insensitive, original casing kept
/// so it can be restored exactly). Sentinels are padded with spaces to force
/// tokenization boundaries around them.
pub fn escape_text(text: &str) -> String {
  regex_static!(CLOSE_S_TAG, r"(?i)</(s)>");

  let text = text.replace("^^", " CARET_CARET ");
  CLOSE_S_TAG.replace_all(&text, " CLOSE_${1}_TAG ").into_owned()
}

/// Unescapes text previously escaped by [`escape_text`]. Not an exact
/// inverse: the spaces `escape_text` inserts around sentinels are left
/// alone, since by the time this runs they have become token boundaries.
pub fn unescape_text(text: &str) -> String {
  regex_static!(ESCAPED_CLOSE_S_TAG, r"(?i)CLOSE_(s)_TAG");

  let text = text.replace("CARET_CARET", "^^");
  ESCAPED_CLOSE_S_TAG
    .replace_all(&text, "</${1}>")
    .into_owned()
}

/// Replaces the six bracket characters with their PTB codes.
pub fn ptb_escape(text: &str) -> String {
  let mut text = text.to_string();
  for (code, bracket) in PTB_MAPPING {
    text = text.replace(bracket, code);
  }
  text
}

/// Replaces PTB bracket codes with the literal bracket characters.
pub fn ptb_unescape(text: &str) -> String {
  let mut text = text.to_string();
  for (code, bracket) in PTB_MAPPING {
    text = text.replace(code, bracket);
  }
  text
}
