use std::time::Duration;

use doccrawl_client::{ChatClient, FsArtifactStore, HtmdCleaner, OpenAiTransformer, ReqwestFetcher};
use doccrawl_core::config::PromptConfig;
use doccrawl_core::models::{CrawlTarget, FailureKind};
use doccrawl_core::page::HttpPageFetcher;
use doccrawl_core::pipeline::{BatchPipeline, count_crawlable_urls};
use doccrawl_core::processor::PageProcessor;
use doccrawl_core::rate_limit::{RateLimitConfig, RateLimitedCaller};
use doccrawl_core::traits::NullExtractor;
use doccrawl_core::UrlDiscoverer;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{chat_reply, credentials, doc_page, local_fetcher, serve, serve_status, sitemap};

type Pipeline = BatchPipeline<
    HttpPageFetcher<ReqwestFetcher, HtmdCleaner, NullExtractor>,
    OpenAiTransformer,
    FsArtifactStore,
>;

async fn mount_model(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_reply("```markdown\n# 文档\n\n内容\n```")),
        )
        .mount(server)
        .await;
}

fn pipeline(server: &MockServer, fetcher: ReqwestFetcher, store: FsArtifactStore) -> Pipeline {
    let processor = PageProcessor::new(
        HttpPageFetcher::new(fetcher, HtmdCleaner::new()),
        OpenAiTransformer::new(ChatClient::new(&credentials(server), "test-model").unwrap()),
        store,
        PromptConfig::default(),
    );
    BatchPipeline::new(
        processor,
        RateLimitedCaller::new(RateLimitConfig::default().without_delays()),
    )
}

#[tokio::test]
async fn sitemap_run_is_capped_and_writes_markdown() {
    let server = MockServer::start().await;
    let urls: Vec<String> = (0..30).map(|i| format!("{}/docs/{i}", server.uri())).collect();
    serve(&server, "/sitemap.xml", sitemap(&urls)).await;
    for i in 0..30 {
        serve(&server, &format!("/docs/{i}"), doc_page(&format!("Page {i}"))).await;
    }
    mount_model(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::create(dir.path().join("general")).unwrap();
    let discovered = UrlDiscoverer::new(local_fetcher())
        .discover(&format!("{}/docs", server.uri()), 10)
        .await;
    assert_eq!(discovered, urls[..10].to_vec());

    let result = pipeline(&server, local_fetcher(), store.clone())
        .run(CrawlTarget::from_urls(&discovered), 10, CancellationToken::new())
        .await;

    assert_eq!(result.success_count(), 10);
    let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
    assert_eq!(files.len(), 10);
    let first = result.successes().next().unwrap().output_path.clone().unwrap();
    assert_eq!(std::fs::read_to_string(first).unwrap(), "# 文档\n\n内容");
}

#[tokio::test]
async fn slow_page_fails_while_siblings_succeed() {
    let server = MockServer::start().await;
    serve(&server, "/docs/a", doc_page("A")).await;
    serve(&server, "/docs/c", doc_page("C")).await;
    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(doc_page("B"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_model(&server).await;

    let fetcher = ReqwestFetcher::with_options(Duration::from_millis(500), "test-agent")
        .unwrap()
        .allow_private_urls();
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::create(dir.path()).unwrap();
    let targets = CrawlTarget::from_urls(["a", "b", "c"].map(|p| format!("{}/docs/{p}", server.uri())));

    let result = pipeline(&server, fetcher, store)
        .run(targets, 20, CancellationToken::new())
        .await;

    assert_eq!(result.success_count(), 2);
    let failed: Vec<_> = result.failures().collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].url.ends_with("/docs/b"));
    assert_eq!(failed[0].failure_kind, Some(FailureKind::Fetch));
}

#[tokio::test]
async fn count_uses_seed_links_when_sitemap_missing() {
    let server = MockServer::start().await;
    serve_status(&server, "/sitemap.xml", 404).await;
    serve(
        &server,
        "/docs",
        r##"<html><body>
            <a href="/docs/1">1</a><a href="/docs/2">2</a><a href="/docs/3">3</a>
            <a href="/docs/4">4</a><a href="/docs/5">5</a>
            <a href="https://elsewhere.example/">out</a><a href="#top">top</a>
        </body></html>"##,
    )
    .await;

    let count = count_crawlable_urls(local_fetcher(), &format!("{}/docs", server.uri())).await;
    assert_eq!(count, 5);
}
