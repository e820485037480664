use doccrawl_client::ReqwestFetcher;
use doccrawl_core::config::ApiCredentials;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetcher that is allowed to talk to the local mock server.
pub fn local_fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new().unwrap().allow_private_urls()
}

pub fn credentials(server: &MockServer) -> ApiCredentials {
    ApiCredentials::from_values(Some("sk-test".into()), Some(format!("{}/v1", server.uri()))).unwrap()
}

/// Serve `body` with status 200 for `GET route`.
pub async fn serve(server: &MockServer, route: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

/// Serve an empty response with `status` for `GET route`.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn sitemap(urls: &[String]) -> String {
    let entries: String = urls.iter().map(|u| format!("<url><loc>{u}</loc></url>")).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

pub fn doc_page(title: &str) -> String {
    format!(
        "<html><body><nav><a href=\"/\">Home</a></nav><main><h1>{title}</h1>\
         <p>This page explains how to install, configure and run the service in production.</p>\
         </main><footer>Footer</footer></body></html>"
    )
}

/// A chat/completions reply carrying `content`.
pub fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}
