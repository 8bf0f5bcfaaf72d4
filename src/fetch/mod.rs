use crate::auth::AuthStore;
use crate::types::HashEntry;
use crate::{debug, warn};

use anyhow::{bail, format_err, Context, Result};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, Url};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^0-9A-Za-z]+").unwrap();
}

/// Fetches repository files over HTTP with retry, an on-disk cache,
/// checksum verification and extension-driven decompression. The rest
/// of the program only ever sees decompressed UTF-8 text.
pub struct Fetcher {
    client: Client,
    cache_dir: Option<PathBuf>,
    auth: AuthStore,
    max_retry: usize,
    quiet: bool,
}

impl Fetcher {
    pub fn new(cache_dir: Option<PathBuf>, auth: AuthStore, quiet: bool) -> Self {
        Fetcher {
            client: Client::new(),
            cache_dir,
            auth,
            max_retry: 3,
            quiet,
        }
    }

    /// Fetch `base/name` as text. When hash-table rows for the file are
    /// supplied, the compressed variants they describe are tried
    /// smallest-first and verified against their digests; otherwise the
    /// plain path is fetched as-is.
    pub async fn fetch_text(&self, base: &str, name: &str, hashes: &[&HashEntry]) -> Result<String> {
        if !hashes.is_empty() {
            let mut variants = hashes.to_vec();
            variants.sort_by_key(|h| h.size);
            for entry in variants {
                let url = format!("{}/{}", base, entry.path);
                match self.fetch_blob(&url, Some(entry)).await {
                    Ok(data) => {
                        return String::from_utf8(data)
                            .with_context(|| format!("{url} is not valid UTF-8"))
                    }
                    Err(e) => {
                        warn!("Failed to fetch {url}: {e}");
                    }
                }
            }
            bail!("No usable variant of {base}/{name}");
        }
        let url = format!("{base}/{name}");
        let data = self.fetch_blob(&url, None).await?;
        String::from_utf8(data).with_context(|| format!("{url} is not valid UTF-8"))
    }

    async fn fetch_blob(&self, url: &str, hash: Option<&HashEntry>) -> Result<Vec<u8>> {
        let raw = match self.read_cache(url).await {
            Some(data) => {
                debug!("Using cached copy of {url}");
                data
            }
            None => self.download(url).await?,
        };
        // The digest covers the file as stored in the repository, so
        // validate before decompressing.
        if let Some(entry) = hash {
            let mut validator = entry.checksum()?.get_validator();
            validator.update(&raw);
            if !validator.finish() {
                bail!("Checksum mismatch for {url}");
            }
        }
        decompress(url, raw).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_err = None;
        for attempt in 1..=self.max_retry {
            match self.download_once(url).await {
                Ok(data) => {
                    self.write_cache(url, &data).await;
                    return Ok(data);
                }
                Err(e) => {
                    debug!("Fetching {url} (attempt {attempt}): {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| format_err!("Failed to fetch {url}")))
            .with_context(|| format!("Failed to fetch {url}"))
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut parsed = Url::parse(url)?;
        // Credentials embedded in the URL take precedence over auth.conf
        let creds = if !parsed.username().is_empty() || parsed.password().is_some() {
            let creds = (
                parsed.username().to_string(),
                parsed.password().unwrap_or("").to_string(),
            );
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            Some(creds)
        } else {
            self.auth
                .find(url)
                .map(|a| (a.username.clone(), a.password.clone()))
        };

        let mut req = self.client.get(parsed);
        if let Some((username, password)) = creds {
            req = req.basic_auth(username, Some(password));
        }
        let mut resp = req.send().await?;
        resp.error_for_status_ref()?;

        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(resp.content_length().unwrap_or(0));
            let template = if crate::WRITER.get_max_len() < 90 {
                " {wide_msg} {total_bytes:>10} {binary_bytes_per_sec:>12} {percent:>3}%"
            } else {
                " {msg:<48} {total_bytes:>10} {binary_bytes_per_sec:>12} [{wide_bar:.white/black}] {percent:>3}%"
            };
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(template)
                    .progress_chars("=>-"),
            );
            let mut msg = url.to_string();
            if console::measure_text_width(&msg) > 48 {
                msg = console::truncate_str(&msg, 45, "...").to_string();
            }
            bar.set_message(msg);
            bar
        };

        let mut data = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            data.extend_from_slice(&chunk);
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();
        Ok(data)
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(NON_WORD.replace_all(url, "_").into_owned()))
    }

    async fn read_cache(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(url)?;
        tokio::fs::read(&path).await.ok()
    }

    async fn write_cache(&self, url: &str, data: &[u8]) {
        let path = match self.cache_path(url) {
            Some(path) => path,
            None => return,
        };
        if let Some(dir) = path.parent() {
            if tokio::fs::create_dir_all(dir).await.is_err() {
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&path, data).await {
            warn!("Failed to cache {url}: {e}");
        }
    }
}

/// Decompress downloaded bytes according to the URL's file extension.
/// Unknown extensions pass through untouched.
async fn decompress(url: &str, data: Vec<u8>) -> Result<Vec<u8>> {
    let lower = url.to_ascii_lowercase();
    let mut out = Vec::new();
    if lower.ends_with(".gz") || lower.ends_with(".gzip") {
        GzipDecoder::new(&data[..])
            .read_to_end(&mut out)
            .await
            .with_context(|| format!("Failed to decompress {url}"))?;
    } else if lower.ends_with(".xz") {
        XzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .await
            .with_context(|| format!("Failed to decompress {url}"))?;
    } else if lower.ends_with(".bz2") {
        BzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .await
            .with_context(|| format!("Failed to decompress {url}"))?;
    } else {
        return Ok(data);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    const GZIP_STANZA: &[u8] = &[
        31, 139, 8, 0, 0, 0, 0, 0, 2, 3, 11, 72, 76, 206, 78, 76, 79, 181, 82, 72, 228, 10, 75,
        45, 42, 206, 204, 207, 179, 82, 48, 228, 2, 0, 185, 173, 79, 42, 22, 0, 0, 0,
    ];

    #[test]
    fn cache_filename_shape() {
        let fetcher = Fetcher::new(
            Some(PathBuf::from("/tmp/cache")),
            AuthStore::new(),
            true,
        );
        let path = fetcher
            .cache_path("http://deb.example.org/dists/stable/Release.gz")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tmp/cache/http_deb_example_org_dists_stable_Release_gz")
        );
        assert!(Fetcher::new(None, AuthStore::new(), true)
            .cache_path("http://x/y")
            .is_none());
    }

    #[tokio::test]
    async fn decompress_by_extension() {
        let out = decompress("http://x/Packages.gz", GZIP_STANZA.to_vec())
            .await
            .unwrap();
        assert_eq!(out, b"Package: a\nVersion: 1\n");

        // Plain files pass through
        let out = decompress("http://x/Packages", b"plain".to_vec()).await.unwrap();
        assert_eq!(out, b"plain");
    }
}
