use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

lazy_static! {
    // Lazy upstream match, so the revision (if any) goes to the last dash
    static ref VERSION_SHAPE: Regex =
        Regex::new(r"^(?:(\d+):)?([0-9][0-9A-Za-z.+~-]*?)(?:-([0-9A-Za-z.+~]*))?$").unwrap();
}

/// dpkg-style version, split into epoch, upstream version and revision.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PkgVersion {
    pub raw: String,
    pub epoch: u32,
    pub upstream: String,
    pub revision: String,
}

impl PkgVersion {
    /// Parse a version string. Returns `None` if the string doesn't have
    /// the epoch:upstream-revision shape (e.g. upstream not starting with
    /// a digit). Never an error: callers treat unparsable versions as
    /// matching any requirement.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = VERSION_SHAPE.captures(s)?;
        let epoch = match caps.get(1) {
            // The shape regex only allows digits here
            Some(e) => e.as_str().parse().ok()?,
            None => 0,
        };
        Some(PkgVersion {
            raw: s.to_string(),
            epoch,
            upstream: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
            revision: caps.get(3).map(|m| m.as_str()).unwrap_or("").to_string(),
        })
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_fragment(&self.upstream, &other.upstream))
            .then_with(|| compare_fragment(&self.revision, &other.revision))
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Character rank for the non-digit scan: `~` sorts below end-of-string,
// end-of-string below alphanumerics, and everything else above them by
// raw code plus an offset (so `.` > `a`, unlike plain ASCII order).
fn rank(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() || c.is_ascii_alphabetic() => c as i32,
        Some(c) => c as i32 + 256,
    }
}

/// Compare one fragment (upstream version or revision) of two versions
/// with the dpkg algorithm: alternate between non-digit runs compared
/// character-by-character through `rank`, and digit runs compared as
/// unsigned magnitudes.
pub fn compare_fragment(x: &str, y: &str) -> Ordering {
    let x = x.as_bytes();
    let y = y.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    while i < x.len() || j < y.len() {
        // Non-digit run: both cursors advance together
        while (i < x.len() && !x[i].is_ascii_digit()) || (j < y.len() && !y[j].is_ascii_digit()) {
            let rx = rank(x.get(i).copied());
            let ry = rank(y.get(j).copied());
            if rx != ry {
                return rx.cmp(&ry);
            }
            i += 1;
            j += 1;
        }
        // Both cursors now sit on a digit (or past the end)
        let mut cx: u128 = 0;
        let mut cy: u128 = 0;
        while i < x.len() && x[i].is_ascii_digit() {
            cx = cx * 10 + u128::from(x[i] - b'0');
            i += 1;
        }
        while j < y.len() && y[j].is_ascii_digit() {
            cy = cy * 10 + u128::from(y[j] - b'0');
            j += 1;
        }
        if cx != cy {
            return cx.cmp(&cy);
        }
    }
    Ordering::Equal
}

/// Comparison operators allowed in selector expressions.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Op {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
}

impl Op {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "<=" => Some(Op::Le),
            ">=" => Some(Op::Ge),
            "<<" => Some(Op::Lt),
            ">>" => Some(Op::Gt),
            "=" => Some(Op::Eq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Lt => "<<",
            Op::Gt => ">>",
            Op::Eq => "=",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            Op::Le => ord != Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Gt => ord == Ordering::Greater,
            Op::Eq => ord == Ordering::Equal,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test `x op y`. Permissive: if either side is absent or failed to
/// parse, the comparison is vacuously satisfied (an unversioned selector
/// or unversioned candidate matches any requirement).
pub fn test_version(x: Option<&PkgVersion>, op: Option<Op>, y: Option<&PkgVersion>) -> bool {
    match (x, y) {
        (Some(x), Some(y)) => match op {
            Some(op) => op.accepts(x.cmp(y)),
            None => true,
        },
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cmp::Ordering::*;

    fn v(s: &str) -> PkgVersion {
        PkgVersion::parse(s).unwrap()
    }

    #[test]
    fn version_parse() {
        let source = vec![
            ("1.0", 0, "1.0", ""),
            ("1:2.3.4-1", 1, "2.3.4", "1"),
            ("999:0+git20210608-1", 999, "0+git20210608", "1"),
            ("2.4.47-2+b1", 0, "2.4.47", "2+b1"),
            ("1.0-1-2", 0, "1.0-1", "2"),
            ("1.0~rc1", 0, "1.0~rc1", ""),
        ];
        for (raw, epoch, upstream, revision) in source {
            let parsed = v(raw);
            assert_eq!(parsed.epoch, epoch, "epoch of {raw}");
            assert_eq!(parsed.upstream, upstream, "upstream of {raw}");
            assert_eq!(parsed.revision, revision, "revision of {raw}");
            assert_eq!(parsed.raw, raw);
        }
    }

    #[test]
    fn version_parse_idempotent() {
        for raw in ["1.0", "1:2.3-4", "0.9.2+cvs.1.0.dev.2004.07.28-1"] {
            assert_eq!(PkgVersion::parse(raw), PkgVersion::parse(raw));
        }
    }

    #[test]
    fn version_parse_reject() {
        // Upstream must start with a digit
        assert_eq!(PkgVersion::parse("abc"), None);
        assert_eq!(PkgVersion::parse(""), None);
        assert_eq!(PkgVersion::parse("x:1.0"), None);
        assert_eq!(PkgVersion::parse("1.0 "), None);
    }

    #[test]
    fn version_ord() {
        let source = vec![
            ("1.1.1", Less, "1.1.2"),
            ("1b", Greater, "1a"),
            ("1", Less, "1.1"),
            ("1.0", Less, "1.1"),
            ("1.2", Less, "1.11"),
            ("1.0-1", Less, "1.1"),
            ("1.0-1", Less, "1.0-12"),
            ("1:1.0-0", Equal, "1:1.0"),
            ("1.0", Equal, "1.0"),
            ("1.0-1", Equal, "1.0-1"),
            ("1:1.0-1", Equal, "1:1.0-1"),
            ("1.0-1", Less, "1.0-2"),
            ("1.0final-5sarge1", Greater, "1.0final-5"),
            ("1.0final-5", Greater, "1.0a7-2"),
            ("0.9.2-5", Less, "0.9.2+cvs.1.0.dev.2004.07.28-1"),
            ("1:500", Less, "1:5000"),
            ("100:500", Greater, "11:5000"),
            ("1.0.4-2", Greater, "1.0pre7-2"),
            // A letter run after the last digit sorts above end-of-string
            ("1.5rc1", Greater, "1.5"),
            ("1.5rc1", Less, "1.5+1"),
            ("1.5rc1", Less, "1.5rc2"),
            ("1.5rc1", Greater, "1.5dev0"),
            ("1.0~rc1", Less, "1.0"),
            ("1.0~~", Less, "1.0~"),
            ("1.0+a", Less, "1.0.a"),
        ];
        for e in source {
            assert_eq!(v(e.0).cmp(&v(e.2)), e.1, "{} vs {}", e.0, e.2);
        }
    }

    #[test]
    fn version_ord_consistency() {
        let versions = ["1.0~rc1", "1.0", "1.0-1", "1.0-2", "1:0.5", "2.0"];
        for a in versions {
            assert_eq!(v(a).cmp(&v(a)), Equal);
            for b in versions {
                assert_eq!(v(a).cmp(&v(b)), v(b).cmp(&v(a)).reverse());
            }
        }
        // Transitivity over the sorted list
        let mut parsed: Vec<PkgVersion> = versions.iter().map(|s| v(s)).collect();
        parsed.sort();
        for w in parsed.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn version_test_ops() {
        let cases = vec![
            ("1.0~rc1", Op::Lt, "1.0", true),
            ("1:0.5", Op::Gt, "2.0", true),
            ("1.0-1", Op::Eq, "1.0-1", true),
            ("1.0", Op::Ge, "1.0", true),
            ("1.0", Op::Le, "0.9", false),
            ("2.0", Op::Eq, "2.1", false),
        ];
        for (x, op, y, expect) in cases {
            assert_eq!(
                test_version(Some(&v(x)), Some(op), Some(&v(y))),
                expect,
                "{x} {op} {y}"
            );
        }
    }

    #[test]
    fn version_test_permissive() {
        // Unparsable or absent side always satisfies
        assert!(test_version(None, Some(Op::Lt), Some(&v("1.0"))));
        assert!(test_version(Some(&v("1.0")), Some(Op::Gt), None));
        assert!(test_version(None, None, None));
    }

    #[test]
    fn fragment_lattice() {
        // ~ < "" < alphanumerics < punctuation
        assert_eq!(compare_fragment("~", ""), Less);
        assert_eq!(compare_fragment("", "a"), Less);
        assert_eq!(compare_fragment("a", "."), Less);
        assert_eq!(compare_fragment("abc", "abd"), Less);
    }
}
