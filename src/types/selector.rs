use super::version::{Op, PkgVersion};
use crate::warn;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, space0},
    combinator::{eof, map_opt, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};
use once_cell::sync::OnceCell;

/// One parsed package selector: a name, an optional architecture pin and
/// an optional version constraint.
#[derive(Clone, Debug)]
pub struct PkgSelector {
    /// The alternative's original text, as split from the expression.
    pub raw: String,
    pub package: String,
    pub architecture: Option<String>,
    pub op: Option<Op>,
    pub version: Option<String>,

    parsed_version: OnceCell<Option<PkgVersion>>,
}

impl PkgSelector {
    /// Parsed form of the constraint version, computed once. `None` when
    /// the selector has no constraint or its version doesn't fit the
    /// dpkg shape.
    pub fn parsed_version(&self) -> Option<&PkgVersion> {
        self.parsed_version
            .get_or_init(|| self.version.as_deref().and_then(PkgVersion::parse))
            .as_ref()
    }
}

// parser combinators
fn package_name(s: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "+.-".contains(c))(s)
}

fn architecture(s: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')(s)
}

fn version_op(s: &str) -> IResult<&str, Op> {
    map_opt(
        alt((tag("<="), tag(">="), tag("<<"), tag(">>"), tag("="))),
        Op::from_str,
    )(s)
}

fn version_token(s: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(pair(digit1, char(':'))),
        take_while1(|c: char| c.is_ascii_alphanumeric() || ".+~-".contains(c)),
    ))(s)
}

// Both parentheses are individually optional: `(>= 1.0)`, `>= 1.0` and
// even `(>= 1.0` all parse.
fn constraint(s: &str) -> IResult<&str, (Op, &str)> {
    let (s, _) = space0(s)?;
    let (s, _) = opt(char('('))(s)?;
    let (s, op) = version_op(s)?;
    let (s, _) = space0(s)?;
    let (s, version) = version_token(s)?;
    let (s, _) = opt(char(')'))(s)?;
    Ok((s, (op, version)))
}

fn selector(s: &str) -> IResult<&str, PkgSelector> {
    let (s, (_, package, architecture, constraint, _, _)) = tuple((
        space0,
        package_name,
        opt(preceded(char(':'), architecture)),
        opt(constraint),
        space0,
        eof,
    ))(s)?;
    let (op, version) = match constraint {
        Some((op, version)) => (Some(op), Some(version.to_string())),
        None => (None, None),
    };
    Ok((
        s,
        PkgSelector {
            raw: String::new(),
            package: package.to_string(),
            architecture: architecture.map(|a| a.to_string()),
            op,
            version,
            parsed_version: OnceCell::new(),
        },
    ))
}

/// Parse a single selector alternative. `None` when the text doesn't fit
/// the grammar.
pub fn parse_selector(s: &str) -> Option<PkgSelector> {
    match selector(s) {
        Ok((_, mut sel)) => {
            sel.raw = s.to_string();
            Some(sel)
        }
        Err(_) => None,
    }
}

/// Parse a full selector expression: `|`-separated alternatives in
/// declared order. Unparsable alternatives are dropped with a
/// diagnostic.
pub fn parse_selectors(s: &str) -> Vec<PkgSelector> {
    s.split('|')
        .filter_map(|alternative| {
            let sel = parse_selector(alternative);
            if sel.is_none() {
                warn!("Ignoring invalid package selector: {}", alternative.trim());
            }
            sel
        })
        .collect()
}
