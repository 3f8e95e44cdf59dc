//! Placeholders in package environment values.
//!
//! Package descriptors do not know where they will live in the store, so
//! their `env` values refer to store paths symbolically:
//!
//! - `$${out}` - the store path of the package contributing the variable
//! - `$${pkg:NAME}` - the store path of package NAME in the same set
//!
//! Single `$` characters pass through unchanged, so `$HOME` and `$PATH` stay
//! shell variables. `$$${` produces a literal `$${`.
//!
//! ```
//! use pinenv_lib::placeholder::{parse, Placeholder, Segment};
//!
//! let segments = parse("$${out}/lib:$LD_LIBRARY_PATH").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder(Placeholder::Out),
//!     Segment::Literal("/lib:$LD_LIBRARY_PATH".to_string()),
//! ]);
//! ```

use thiserror::Error;

const OPEN: &str = "$${";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${out}`
  Out,
  /// `$${pkg:NAME}`
  Package(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("placeholder refers to package '{0}', which is not in the package set")]
  UnresolvedPackage(String),
}

/// Supplies values for placeholders.
pub trait Resolver {
  /// Store path of the package the value belongs to.
  fn resolve_out(&self) -> Result<&str, PlaceholderError>;

  /// Store path of another package.
  fn resolve_package(&self, name: &str) -> Result<&str, PlaceholderError>;
}

/// Split a string into literals and placeholders.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(idx) = rest.find(OPEN) {
    let after_open = idx + OPEN.len();

    // `$$${` is an escaped `$${`.
    if idx > 0 && rest.as_bytes()[idx - 1] == b'$' {
      literal.push_str(&rest[..idx - 1]);
      literal.push_str(OPEN);
      offset += after_open;
      rest = &rest[after_open..];
      continue;
    }

    literal.push_str(&rest[..idx]);

    let close = rest[after_open..]
      .find('}')
      .ok_or(PlaceholderError::Unclosed(offset + idx))?;
    let body = &rest[after_open..after_open + close];

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Placeholder(parse_body(body)?));

    let consumed = after_open + close + 1;
    offset += consumed;
    rest = &rest[consumed..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_body(body: &str) -> Result<Placeholder, PlaceholderError> {
  if body == "out" {
    return Ok(Placeholder::Out);
  }

  match body.split_once(':') {
    Some(("pkg", "")) => Err(PlaceholderError::Malformed(format!("missing package name in '{body}'"))),
    Some(("pkg", name)) => Ok(Placeholder::Package(name.to_string())),
    Some((kind, _)) => Err(PlaceholderError::UnknownType(kind.to_string())),
    None => Err(PlaceholderError::Malformed(format!("'{body}'"))),
  }
}

/// Parse `input` and substitute every placeholder.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Out) => result.push_str(resolver.resolve_out()?),
      Segment::Placeholder(Placeholder::Package(name)) => result.push_str(resolver.resolve_package(name)?),
    }
  }

  Ok(result)
}

/// Names of the packages referenced through `$${pkg:NAME}`.
pub fn referenced_packages(input: &str) -> Result<Vec<String>, PlaceholderError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Placeholder(Placeholder::Package(name)) => Some(name),
        _ => None,
      })
      .collect(),
  )
}
