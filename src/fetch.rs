use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use sha2::Digest as _;

/// Disk-backed fetcher. Bodies of successful responses are kept under a
/// SHA-256 key of the request URL, so a same-day rerun replays the whole
/// run without touching the network. Entries never expire.
pub struct CachedFetcher {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
    delay: Duration,
}

#[derive(Debug)]
pub struct FetchedBody {
    pub status: u16,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl CachedFetcher {
    pub fn new(cache_dir: &Path, delay: Duration) -> anyhow::Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("create cache dir: {}", cache_dir.display()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("paperbound/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            cache_dir: cache_dir.to_path_buf(),
            delay,
        })
    }

    /// Cached GET. The rate-limit delay applies after every live exchange,
    /// whatever its status; cache hits return immediately.
    pub fn fetch(&self, url: &str) -> anyhow::Result<FetchedBody> {
        let cache_path = self.cache_path(url);
        if cache_path.exists() {
            let body = std::fs::read(&cache_path)
                .with_context(|| format!("read cached body: {}", cache_path.display()))?;
            tracing::debug!(%url, "fetch served from cache");
            return Ok(FetchedBody {
                status: 200,
                body,
                from_cache: true,
            });
        }

        let response = self.client.get(url).send().with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .with_context(|| format!("read response body: {url}"))?
            .to_vec();

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if (200..300).contains(&status) {
            std::fs::write(&cache_path, &body)
                .with_context(|| format!("write cached body: {}", cache_path.display()))?;
        }
        tracing::debug!(%url, status, bytes = body.len(), "fetched live");

        Ok(FetchedBody {
            status,
            body,
            from_cache: false,
        })
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = sha2::Sha256::new();
        hasher.update(url.as_bytes());
        self.cache_dir.join(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn spawn_counting_server() -> (String, Arc<AtomicUsize>, std::thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}", server.server_addr());
        let hits = Arc::new(AtomicUsize::new(0));

        let server_hits = Arc::clone(&hits);
        let handle = std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                if path == "/stop" {
                    let _ = request.respond(tiny_http::Response::from_string("bye"));
                    break;
                }
                server_hits.fetch_add(1, Ordering::SeqCst);
                let response = match path.as_str() {
                    "/body" => tiny_http::Response::from_string("hello").with_status_code(200),
                    _ => tiny_http::Response::from_string("not found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        (base_url, hits, handle)
    }

    #[test]
    fn second_fetch_is_served_from_cache() -> anyhow::Result<()> {
        let (base_url, hits, handle) = spawn_counting_server();
        let temp = tempfile::TempDir::new()?;
        let fetcher = CachedFetcher::new(temp.path(), Duration::ZERO)?;

        let url = format!("{base_url}/body");
        let first = fetcher.fetch(&url)?;
        assert!(first.is_success());
        assert!(!first.from_cache);
        assert_eq!(first.body, b"hello");

        let second = fetcher.fetch(&url)?;
        assert!(second.from_cache);
        assert_eq!(second.body, first.body);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let _ = fetcher.fetch(&format!("{base_url}/stop"));
        let _ = handle.join();
        Ok(())
    }

    #[test]
    fn failure_responses_are_not_cached() -> anyhow::Result<()> {
        let (base_url, hits, handle) = spawn_counting_server();
        let temp = tempfile::TempDir::new()?;
        let fetcher = CachedFetcher::new(temp.path(), Duration::ZERO)?;

        let url = format!("{base_url}/missing");
        let first = fetcher.fetch(&url)?;
        assert_eq!(first.status, 404);
        assert!(!first.is_success());

        let second = fetcher.fetch(&url)?;
        assert_eq!(second.status, 404);
        assert!(!second.from_cache);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let _ = fetcher.fetch(&format!("{base_url}/stop"));
        let _ = handle.join();
        Ok(())
    }
}
