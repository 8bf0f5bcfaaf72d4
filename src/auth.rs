use crate::warn;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref AUTH_LINE: Regex =
        Regex::new(r"^\s*machine\s+(?:(\S+)://)?(\S+)\s+login\s+(\S+)\s+password\s+(\S+)$")
            .unwrap();
}

/// One `machine ... login ... password ...` entry from an apt
/// auth.conf-style file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConf {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Default)]
pub struct AuthStore {
    conf: Vec<AuthConf>,
}

impl AuthStore {
    pub fn new() -> Self {
        AuthStore { conf: Vec::new() }
    }

    /// Parse auth.conf text. Lines that don't fit the grammar are
    /// skipped with a diagnostic; comments and blanks are ignored.
    pub fn parse(text: &str) -> Self {
        let mut store = AuthStore::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match AUTH_LINE.captures(line) {
                Some(caps) => {
                    let protocol = caps.get(1).map(|m| m.as_str()).unwrap_or("https");
                    store.conf.push(AuthConf {
                        url: format!("{}://{}", protocol, &caps[2]),
                        username: caps[3].to_string(),
                        password: caps[4].to_string(),
                    });
                }
                None => {
                    warn!("Ignoring invalid auth configuration line: {line}");
                }
            }
        }
        store
    }

    /// Find credentials for a URL by longest matching URL prefix.
    pub fn find(&self, url: &str) -> Option<&AuthConf> {
        self.conf
            .iter()
            .filter(|c| url.starts_with(&c.url))
            .max_by_key(|c| c.url.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_lookup() {
        let store = AuthStore::parse(
            "# comment\n\
             machine deb.example.org login user password pass\n\
             machine http://deb.example.org/private login admin password hunter2\n\
             not a valid line\n",
        );
        // Bad line dropped, two good entries kept
        assert_eq!(
            store.find("https://deb.example.org/dists/stable/Release").unwrap().username,
            "user"
        );
        assert!(store.find("https://other.example.org/x").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let store = AuthStore::parse(
            "machine deb.example.org login short password a\n\
             machine deb.example.org/private login long password b\n",
        );
        assert_eq!(
            store.find("https://deb.example.org/private/dists/x").unwrap().username,
            "long"
        );
        assert_eq!(
            store.find("https://deb.example.org/public").unwrap().username,
            "short"
        );
    }
}
