mod common;

use acr_toolkit::registry::catalog::CatalogClient;
use acr_toolkit::registry::token_exchange::{RegistryEndpoint, TokenExchangeClient};
use acr_toolkit::{AcrError, Logger};
use common::{account, mount_access_token, mount_exchange, registry};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tokens() -> TokenExchangeClient {
    TokenExchangeClient::new(reqwest::Client::new(), Logger::new_quiet())
}

#[tokio::test]
async fn test_repository_with_no_tags_lists_empty() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("scope=repository%3Aapp%3Apull"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "pullAT" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/app/tags/list"))
        .and(header("authorization", "Bearer pullAT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "app", "tags": null })))
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());

    let images = catalog.list_tags_by_name(&registry(&server.uri()), "app").await.unwrap();
    assert!(images.is_empty());
}

#[tokio::test]
async fn test_tags_keep_registry_order() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;
    mount_access_token(&server, "pullAT").await;
    Mock::given(method("GET"))
        .and(path("/v2/team/app/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "team/app", "tags": ["v2", "latest", "v1"] })))
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());

    let images = catalog
        .list_tags_by_name(&registry(&server.uri()), "team/app")
        .await
        .unwrap();
    let tags: Vec<&str> = images.iter().map(|image| image.tag.as_str()).collect();
    assert_eq!(tags, vec!["v2", "latest", "v1"]);
    assert_eq!(images[0].repository, "team/app");
    assert_eq!(images[0].tokens.access_token, "pullAT");
}

#[tokio::test]
async fn test_catalog_listing_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "repositories": ["zeta", "alpha", "mid"] })))
        .expect(2)
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());
    let endpoint = RegistryEndpoint::from_login_server(&server.uri()).unwrap();

    let first = catalog.fetch_repository_names(&endpoint, "acrAT").await.unwrap();
    let second = catalog.fetch_repository_names(&endpoint, "acrAT").await.unwrap();
    assert_eq!(first, vec!["zeta", "alpha", "mid"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_catalog_body_is_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());
    let endpoint = RegistryEndpoint::from_login_server(&server.uri()).unwrap();

    assert!(catalog.fetch_repository_names(&endpoint, "acrAT").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());
    let endpoint = RegistryEndpoint::from_login_server(&server.uri()).unwrap();

    match catalog.fetch_repository_names(&endpoint, "expired").await.unwrap_err() {
        AcrError::RegistryApi { status, operation, .. } => {
            assert_eq!(status, 401);
            assert_eq!(operation, "repository listing");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_image_uses_repository_wildcard_scope() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("scope=repository%3Aapp%3A*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "deleteAT" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/_acr/app/tags/v1"))
        .and(header("authorization", "Bearer deleteAT"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());

    catalog
        .delete_image(&registry(&server.uri()), "app", "v1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_repository() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;
    mount_access_token(&server, "deleteAT").await;
    Mock::given(method("DELETE"))
        .and(path("/v2/_acr/app/repository"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "manifestsDeleted": [], "tagsDeleted": ["v1"] })))
        .expect(1)
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());

    catalog
        .delete_repository(&registry(&server.uri()), "app")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_missing_tag_is_registry_error() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;
    mount_access_token(&server, "deleteAT").await;
    Mock::given(method("DELETE"))
        .and(path("/v2/_acr/app/tags/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("TAG_UNKNOWN"))
        .mount(&server)
        .await;

    let account = account();
    let tokens = tokens();
    let catalog = CatalogClient::new(reqwest::Client::new(), &tokens, &account, Logger::new_quiet());

    let err = catalog
        .delete_image(&registry(&server.uri()), "app", "gone")
        .await
        .unwrap_err();
    assert!(matches!(err, AcrError::RegistryApi { status: 404, .. }));
}
