use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[clap(about, version, author)]
pub struct Opts {
    #[clap(short, long, help = "APT source entry, repeatable")]
    pub entry: Vec<String>,
    #[clap(short = 'f', long, help = "APT sources.list file, repeatable")]
    pub entry_file: Vec<PathBuf>,
    #[clap(short, long, default_value = "any", help = "Default architecture")]
    pub arch: String,
    #[clap(short, long, help = "Metadata cache directory")]
    pub cache_dir: Option<PathBuf>,
    #[clap(long, help = "apt auth.conf-style credential file")]
    pub auth_conf: Option<PathBuf>,
    #[clap(long, help = "TOML file supplying the same settings as the flags")]
    pub config: Option<PathBuf>,
    #[clap(short, long, help = "Suppress progress bars")]
    pub quiet: bool,
    #[clap(short, long, help = "Print additional debug information")]
    pub verbose: bool,
    #[clap(subcommand)]
    pub subcmd: SubCmd,
}

#[derive(Parser)]
pub enum SubCmd {
    /// Resolve package selectors against the configured repositories
    Resolve(ResolvePkg),
    /// Find packages owning paths, apt-file style
    Find(FindFile),
}

#[derive(Parser)]
pub struct ResolvePkg {
    #[clap(required = true, help = "Package selectors to resolve")]
    pub selectors: Vec<String>,
    #[clap(short, long, help = "Resolve dependencies recursively")]
    pub recursive: bool,
    #[clap(long, help = "Show unresolvable dependencies as placeholders")]
    pub missing: bool,
    #[clap(long, help = "Allow a package to reappear on sibling branches")]
    pub no_unique: bool,
    #[clap(
        long,
        default_value = "{package}:{architecture} ({selector})",
        help = "Output line template"
    )]
    pub format: String,
    #[clap(long, default_value = "2", help = "Tree indent width")]
    pub indent: usize,
    #[clap(long, help = "Marker replaced by a line break in the template")]
    pub newline: Option<String>,
}

#[derive(Parser)]
pub struct FindFile {
    #[clap(required = true, help = "Regular expressions to search for")]
    pub patterns: Vec<String>,
    #[clap(
        long,
        default_value = "{package}:{architecture}: {path}",
        help = "Output line template"
    )]
    pub format: String,
    #[clap(long, help = "Marker replaced by a line break in the template")]
    pub newline: Option<String>,
}

/// Optional TOML configuration carrying the same repository settings as
/// the global flags. Flags win; config entries are appended.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub entry: Vec<String>,
    pub entry_file: Vec<PathBuf>,
    pub arch: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub auth_conf: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

impl Opts {
    pub fn merge_config(&mut self, config: ConfigFile) {
        self.entry.extend(config.entry);
        self.entry_file.extend(config.entry_file);
        if self.arch == "any" {
            if let Some(arch) = config.arch {
                self.arch = arch;
            }
        }
        if self.cache_dir.is_none() {
            self.cache_dir = config.cache_dir;
        }
        if self.auth_conf.is_none() {
            self.auth_conf = config.auth_conf;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_merge() {
        let mut opts = Opts::parse_from(["aptsel", "resolve", "foo"]);
        let config: ConfigFile = toml::from_str(
            "entry = [\"deb http://deb.example.org/debian stable main\"]\n\
             arch = \"amd64\"\n\
             cache_dir = \"/var/cache/aptsel\"\n",
        )
        .unwrap();
        opts.merge_config(config);
        assert_eq!(opts.entry.len(), 1);
        assert_eq!(opts.arch, "amd64");
        assert_eq!(opts.cache_dir, Some(PathBuf::from("/var/cache/aptsel")));
    }

    #[test]
    fn flags_win_over_config() {
        let mut opts = Opts::parse_from(["aptsel", "-a", "i386", "resolve", "foo"]);
        opts.merge_config(ConfigFile {
            arch: Some("amd64".to_string()),
            ..ConfigFile::default()
        });
        assert_eq!(opts.arch, "i386");
    }

    #[test]
    fn resolve_flags() {
        let opts = Opts::parse_from([
            "aptsel", "-e", "deb http://x stable main", "resolve", "-r", "--missing",
            "--indent", "4", "foo", "bar:i386 (>= 1.0)",
        ]);
        match opts.subcmd {
            SubCmd::Resolve(resolve) => {
                assert!(resolve.recursive);
                assert!(resolve.missing);
                assert!(!resolve.no_unique);
                assert_eq!(resolve.indent, 4);
                assert_eq!(resolve.selectors.len(), 2);
            }
            _ => panic!("expected resolve subcommand"),
        }
    }
}
