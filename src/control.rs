use anyhow::{bail, Result};
use std::collections::HashMap;

/// Parse RFC822-like control text (Release, Packages) into one field map
/// per stanza. Stanzas are separated by blank lines. A line starting with
/// whitespace continues the previous field; a continuation consisting of
/// a single `.` stands for an embedded empty line.
///
/// The only hard failure is a field line with no `:` in it; everything
/// else degrades (unterminated input still yields its final stanza).
pub fn parse_control(text: &str) -> Result<Vec<HashMap<String, String>>> {
    let mut stanzas = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    for (lineno, line) in text.split('\n').enumerate() {
        if line.is_empty() {
            // Stanza boundary
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }
        if line.starts_with(|c: char| c.is_whitespace()) {
            // Continuation of the previous field
            if let Some(key) = &last_key {
                let value = current.entry(key.clone()).or_default();
                value.push('\n');
                if line.trim() != "." {
                    value.push_str(line.trim());
                }
            }
            continue;
        }
        match line.find(':') {
            Some(colon) => {
                let key = line[..colon].trim().to_string();
                let value = line[colon + 1..].trim().to_string();
                current.insert(key.clone(), value);
                last_key = Some(key);
            }
            None => bail!(
                "Malformed control file: expected `:` at line {}, column {}",
                lineno + 1,
                line.len() + 1
            ),
        }
    }

    if !current.is_empty() {
        stanzas.push(current);
    }
    Ok(stanzas)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn two_stanzas() {
        let parsed = parse_control("Package: a\nVersion: 1\n\nPackage: b\nVersion: 2\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["Package"], "a");
        assert_eq!(parsed[0]["Version"], "1");
        assert_eq!(parsed[1]["Package"], "b");
        assert_eq!(parsed[1]["Version"], "2");
    }

    #[test]
    fn continuation_lines() {
        let parsed = parse_control("Description: x\n more\n").unwrap();
        assert_eq!(parsed[0]["Description"], "x\nmore");

        // Lone dot marks an embedded empty line
        let parsed = parse_control("Description: x\n .\n tail\n").unwrap();
        assert_eq!(parsed[0]["Description"], "x\n\ntail");
    }

    #[test]
    fn hash_table_field() {
        let parsed = parse_control("SHA256:\n abc 1 main/binary-amd64/Packages\n").unwrap();
        assert_eq!(parsed[0]["SHA256"], "\nabc 1 main/binary-amd64/Packages");
    }

    #[test]
    fn empty_value() {
        let parsed = parse_control("Key:\nOther: v\n").unwrap();
        assert_eq!(parsed[0]["Key"], "");
        assert_eq!(parsed[0]["Other"], "v");
    }

    #[test]
    fn unterminated_final_stanza() {
        let parsed = parse_control("Package: a\nVersion: 1").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["Version"], "1");
    }

    #[test]
    fn missing_colon_is_fatal() {
        let err = parse_control("Package: a\nBogus line\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{msg}");
    }
}
