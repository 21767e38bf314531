use std::fmt;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "parser/const_grammar.pest"] // relative to src
pub struct ConstNameParser;

/// Is `name` a syntactically valid constant name (`Foo`, `HTTP_2`, `Ünïcode`)?
pub fn is_valid_constant_name(name: &str) -> bool {
    ConstNameParser::parse(Rule::single_name, name).is_ok()
}

/// A parsed `A::B::C` reference. A leading `::` makes the path absolute, meaning the
/// first segment is looked up from the root object class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPath {
    absolute: bool,
    segments: Vec<String>,
}

impl ConstantPath {
    pub fn parse(path: &str) -> Result<Self, pest::error::Error<Rule>> {
        let mut pairs = ConstNameParser::parse(Rule::constant_path, path)?;
        let mut absolute = false;
        let mut segments = vec![];
        if let Some(root) = pairs.next() {
            for pair in root.into_inner() {
                match pair.as_rule() {
                    Rule::root_marker => absolute = true,
                    Rule::constant_name => segments.push(segment_text(pair)),
                    _ => {}
                }
            }
        }
        Ok(ConstantPath { absolute, segments })
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// More than one segment, i.e. the path needs intermediate module lookups.
    pub fn is_scoped(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last(&self) -> &str {
        self.segments.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// The path text up to and including segment `index`, used in error messages.
    pub fn prefix(&self, index: usize) -> String {
        let joined = self.segments[..=index.min(self.segments.len().saturating_sub(1))].join("::");
        if self.absolute {
            format!("::{}", joined)
        } else {
            joined
        }
    }
}

fn segment_text(pair: Pair<Rule>) -> String {
    pair.as_str().to_string()
}

impl fmt::Display for ConstantPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "::")?;
        }
        write!(f, "{}", self.segments.join("::"))
    }
}
