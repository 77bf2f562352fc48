// src/sources/batoto.rs
use std::collections::HashSet;
use std::sync::Arc;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{info, debug, warn};

use crate::config::BatotoConfig;
use crate::context::Context;
use crate::core::model::Manga;
use crate::core::source::{Source, SourceOutput};
use crate::engine::gather;
use crate::error::{ScrapeResult, ScrapeError};
use crate::utils::http::Fetcher;

const NAME: &str = "batoto";

static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s([^>]*)>(.*?)</a>"#).expect("anchor pattern is valid")
});
static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).expect("href pattern is valid")
});
static ITEM_TITLE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*["'][^"']*\bitem-title\b[^"']*["']"#).expect("class pattern is valid")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));")
        .expect("entity pattern is valid")
});

/// Bato.to browse listing
pub struct BatotoSource {
    fetcher: Arc<dyn Fetcher>,
    config: BatotoConfig,
}

impl BatotoSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: BatotoConfig) -> Self {
        Self { fetcher, config }
    }

    fn page_urls(&self) -> Vec<String> {
        let base = self.config.base_url.trim_end_matches('/');
        (1..=self.config.pages.max(1))
            .map(|page| format!("{}/browse?page={}", base, page))
            .collect()
    }
}

/// Extract every series link marked with the `item-title` class
fn extract_series(html: &str) -> Vec<Manga> {
    ANCHOR
        .captures_iter(html)
        .filter(|caps| ITEM_TITLE_CLASS.is_match(&caps[1]))
        .filter_map(|caps| {
            let href = decode_entities(HREF.captures(&caps[1])?.get(1)?.as_str().trim());
            let id = href.trim_end_matches('/').rsplit('/').next()?.to_string();
            if id.is_empty() {
                return None;
            }

            let title = decode_entities(TAG.replace_all(&caps[2], "").trim());
            let mut manga = Manga::new(id, title);
            manga.url = Some(href);
            Some(manga)
        })
        .collect()
}

/// Decode numeric and common named character references in one pass.
/// Unknown names and invalid code points are left as written.
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| named_entity(name.as_str()))
            };

            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "middot" => '·',
        "times" => '×',
        "deg" => '°',
        "frac12" => '½',
        "iexcl" => '¡',
        "iquest" => '¿',
        "szlig" => 'ß',
        "aacute" => 'á',
        "Aacute" => 'Á',
        "agrave" => 'à',
        "Agrave" => 'À',
        "acirc" => 'â',
        "Acirc" => 'Â',
        "atilde" => 'ã',
        "Atilde" => 'Ã',
        "auml" => 'ä',
        "Auml" => 'Ä',
        "aring" => 'å',
        "Aring" => 'Å',
        "aelig" => 'æ',
        "AElig" => 'Æ',
        "ccedil" => 'ç',
        "Ccedil" => 'Ç',
        "eacute" => 'é',
        "Eacute" => 'É',
        "egrave" => 'è',
        "Egrave" => 'È',
        "ecirc" => 'ê',
        "Ecirc" => 'Ê',
        "euml" => 'ë',
        "Euml" => 'Ë',
        "iacute" => 'í',
        "Iacute" => 'Í',
        "igrave" => 'ì',
        "Igrave" => 'Ì',
        "icirc" => 'î',
        "Icirc" => 'Î',
        "iuml" => 'ï',
        "Iuml" => 'Ï',
        "ntilde" => 'ñ',
        "Ntilde" => 'Ñ',
        "oacute" => 'ó',
        "Oacute" => 'Ó',
        "ograve" => 'ò',
        "Ograve" => 'Ò',
        "ocirc" => 'ô',
        "Ocirc" => 'Ô',
        "otilde" => 'õ',
        "Otilde" => 'Õ',
        "ouml" => 'ö',
        "Ouml" => 'Ö',
        "oslash" => 'ø',
        "Oslash" => 'Ø',
        "uacute" => 'ú',
        "Uacute" => 'Ú',
        "ugrave" => 'ù',
        "Ugrave" => 'Ù',
        "ucirc" => 'û',
        "Ucirc" => 'Û',
        "uuml" => 'ü',
        "Uuml" => 'Ü',
        "yacute" => 'ý',
        "Yacute" => 'Ý',
        "yuml" => 'ÿ',
        _ => return None,
    };
    Some(c)
}

#[async_trait]
impl Source for BatotoSource {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Bato.to browse listing"
    }

    async fn execute(&self, ctx: &Context) -> ScrapeResult<SourceOutput> {
        let urls = self.page_urls();
        info!(source = NAME, "Fetching {} listing pages", urls.len());

        let jobs: Vec<_> = urls
            .iter()
            .cloned()
            .map(|url| {
                let fetcher = self.fetcher.clone();
                async move {
                    match fetcher.fetch_text(&url).await {
                        Ok(html) => Ok(extract_series(&html)),
                        Err(e) => Err(ScrapeError::NetworkError(format!("{:#}", e))),
                    }
                }
            })
            .collect();

        let pages = gather(&ctx.pool, jobs).await?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (url, page) in urls.iter().zip(pages) {
            let series = match page {
                Some(Ok(series)) => series,
                Some(Err(e)) => {
                    warn!(source = NAME, "Listing page {} failed: {}", url, e);
                    return Err(ScrapeError::source_failure(NAME, e));
                }
                None => {
                    return Err(ScrapeError::source_failure(NAME, format!("{}: page task faulted", url)));
                }
            };

            debug!(source = NAME, "{} series on {}", series.len(), url);
            results.extend(series.into_iter().filter(|m| seen.insert(m.id.clone())));
        }

        ctx.save(NAME, results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::output::AtomicWriter;
    use crate::engine::TaskPool;
    use crate::utils::http::MockFetcher;

    const LISTING: &str = r#"
        <div id="series-list">
          <div class="col item">
            <a class="item-cover" href="/series/1001/one-piece"><img src="x.jpg"></a>
            <div class="item-text">
              <a href="/series/1001/one-piece" class="item-title">One <b>Piece</b></a>
            </div>
          </div>
          <div class="col item">
            <A CLASS="fw-bold item-title" HREF='/series/1002/tom-&amp;-jerry/'>Tom &amp; Jerry</A>
          </div>
          <div class="col item">
            <a class="item-title" href="">Missing link</a>
          </div>
        </div>
    "#;

    #[test]
    fn test_extract_series_from_listing() {
        let series = extract_series(LISTING);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].id, "one-piece");
        assert_eq!(series[0].title, "One Piece");
        assert_eq!(series[0].url.as_deref(), Some("/series/1001/one-piece"));
        assert_eq!(series[1].id, "tom-&-jerry");
        assert_eq!(series[1].url.as_deref(), Some("/series/1002/tom-&-jerry/"));
        assert_eq!(series[1].title, "Tom & Jerry");
    }

    #[test]
    fn test_decode_numeric_and_named_entities() {
        assert_eq!(decode_entities("Pok&eacute;mon &#8217;Adventures&#x2019;"), "Pokémon ’Adventures’");
        assert_eq!(decode_entities("Caf&#233; &amp; Cr&#xE8;me"), "Café & Crème");
        assert_eq!(decode_entities("&lt;b&gt; &quot;x&quot; &#39;y&apos;"), "<b> \"x\" 'y'");
        // Decoding is a single pass: escaped references stay escaped once
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        // Unknown names and invalid code points are kept verbatim
        assert_eq!(decode_entities("&bogus; &#xD800; & plain"), "&bogus; &#xD800; & plain");
    }

    #[test]
    fn test_extract_series_decodes_numeric_title_entities() {
        let html = r#"<a class="item-title" href="/series/7/jojo">JoJo&#8217;s Bizarre Adventure &eacute;dition</a>"#;
        let series = extract_series(html);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].title, "JoJo’s Bizarre Adventure édition");
    }

    #[test]
    fn test_page_urls() {
        let source = BatotoSource::new(
            Arc::new(MockFetcher::new()),
            BatotoConfig { base_url: "https://bato.example/".to_string(), pages: 2 },
        );
        assert_eq!(
            source.page_urls(),
            vec!["https://bato.example/browse?page=1", "https://bato.example/browse?page=2"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_execute_merges_pages_without_duplicates() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch_text().times(2).returning(|url| {
            if url.ends_with("page=1") {
                Ok(LISTING.to_string())
            } else {
                Ok(r#"<a class="item-title" href="/series/1001/one-piece">One Piece</a>
                      <a class="item-title" href="/series/2000/bleach">Bleach</a>"#.to_string())
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path(), Arc::new(TaskPool::new(2)), Arc::new(AtomicWriter::new()));
        let source = BatotoSource::new(
            Arc::new(fetcher),
            BatotoConfig { base_url: "https://bato.example".to_string(), pages: 2 },
        );

        let output = source.execute(&ctx).await.unwrap();
        ctx.pool.stop().await.unwrap();

        assert_eq!(output.records, 3);
        let written: Vec<Manga> = serde_json::from_str(&std::fs::read_to_string(&output.path).unwrap()).unwrap();
        let ids: Vec<_> = written.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["one-piece", "tom-&-jerry", "bleach"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_source() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch_text().returning(|_| Err(anyhow::anyhow!("timed out")));

        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path(), Arc::new(TaskPool::new(1)), Arc::new(AtomicWriter::new()));
        let source = BatotoSource::new(Arc::new(fetcher), BatotoConfig::default());

        let result = source.execute(&ctx).await;
        ctx.pool.stop().await.unwrap();

        assert!(matches!(result, Err(ScrapeError::SourceError { .. })));
        assert!(!dir.path().join("batoto.json").exists());
    }
}
