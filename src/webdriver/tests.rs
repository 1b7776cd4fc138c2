//! WebDriver layer tests
//!
//! The wire client is exercised against a `wiremock` server; the mock
//! document is checked for the behaviours the engine relies on.

use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use super::*;
use crate::Error;

async fn session_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-1", "capabilities": { "browserName": "chrome" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_connect_creates_session() {
    let server = session_server().await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({ "browserName": "chrome" }))
        .await
        .unwrap();

    assert_eq!(client.session_id(), "s-1");
    assert_eq!(client.endpoint(), server.uri());
}

#[tokio::test]
async fn test_connect_failure_maps_error() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "session not created", "message": "Chrome failed to start" }
        })))
        .mount(&server)
        .await;

    let result = WebDriverClientImpl::connect(server.uri(), json!({})).await;
    assert!(matches!(result, Err(Error::WebDriver { code, .. }) if code == "session not created"));
}

#[tokio::test]
async fn test_find_element_sends_wire_strategy() {
    let server = session_server().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session/s-1/element"))
        .and(matchers::body_json(json!({ "using": "css selector", "value": "#main" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { ELEMENT_KEY: "e-42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let element = client
        .find_element(LocatorStrategy::CssSelector, "#main", None)
        .await
        .unwrap();

    assert_eq!(element.id(), "e-42");
}

#[tokio::test]
async fn test_find_element_scoped_to_root() {
    let server = session_server().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session/s-1/element/root-1/elements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ ELEMENT_KEY: "c-1" }, { ELEMENT_KEY: "c-2" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let root = WebElement("root-1".to_string());
    let children = client
        .find_elements(LocatorStrategy::ClassName, "card", Some(&root))
        .await
        .unwrap();

    assert_eq!(children.len(), 2);
    assert_eq!(children[1].id(), "c-2");
}

#[tokio::test]
async fn test_no_such_element_maps_to_not_found() {
    let server = session_server().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "Unable to locate element", "stacktrace": "" }
        })))
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let result = client.find_element(LocatorStrategy::Id, "missing", None).await;

    assert!(matches!(result, Err(Error::ElementNotFound(_))));
}

#[tokio::test]
async fn test_stale_click_maps_to_stale_element() {
    let server = session_server().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session/s-1/element/e-1/click"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "stale element reference", "message": "element is not attached" }
        })))
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let result = client.element_click(&WebElement("e-1".to_string())).await;

    assert!(matches!(result, Err(Error::StaleElement(_))));
}

#[tokio::test]
async fn test_execute_script_passes_element_arguments() {
    let server = session_server().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/session/s-1/execute/sync"))
        .and(matchers::body_json(json!({
            "script": "return arguments[0].id;",
            "args": [{ ELEMENT_KEY: "e-7" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "job-list" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let value = client
        .execute_script("return arguments[0].id;", vec![WebElement("e-7".to_string()).to_json()])
        .await
        .unwrap();

    assert_eq!(value, json!("job-list"));
}

#[tokio::test]
async fn test_get_cookies_normalizes_expiry() {
    let server = session_server().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/session/s-1/cookie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "name": "li_at", "value": "t", "domain": ".example.com", "path": "/",
                "expiry": 1_900_000_000.5, "secure": true, "httpOnly": true, "sameSite": "None"
            }]
        })))
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    let cookies = client.get_cookies().await.unwrap();

    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].expiry, Some(1_900_000_000));
    assert!(cookies[0].http_only);
}

#[tokio::test]
async fn test_close_tolerates_missing_session() {
    let server = session_server().await;

    Mock::given(matchers::method("DELETE"))
        .and(matchers::path("/session/s-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "invalid session id", "message": "session deleted" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebDriverClientImpl::connect(server.uri(), json!({})).await.unwrap();
    assert!(client.close().await.is_ok());
}

fn two_item_document() -> MockDocument {
    let mut doc = MockDocument::new();
    let list = doc.push(MockNode::new("ul").id("list").class("results grow"));
    doc.push(MockNode::new("li").class("item").text("first").parent(list));
    doc.push(MockNode::new("li").class("item").text("second").parent(list));
    doc.push(MockNode::new("p").id("footer").revealed_after(2));
    doc
}

#[tokio::test]
async fn test_mock_navigation_invalidates_handles() {
    let driver = MockWebDriver::with_document(two_item_document());
    driver.navigate("https://jobs.example.com/search").await.unwrap();

    let list = driver.find_element(LocatorStrategy::Id, "list", None).await.unwrap();
    assert!(driver.element_displayed(&list).await.unwrap());

    driver.refresh().await.unwrap();
    let result = driver.element_displayed(&list).await;
    assert!(matches!(result, Err(Error::StaleElement(_))));
}

#[tokio::test]
async fn test_mock_lazy_nodes_need_scrolls() {
    let driver = MockWebDriver::with_document(two_item_document());
    driver.navigate("https://jobs.example.com/search").await.unwrap();

    assert!(driver.find_element(LocatorStrategy::Id, "footer", None).await.is_err());

    for _ in 0..2 {
        driver
            .execute_script(&crate::scripts::scroll_by_script(300, false), vec![])
            .await
            .unwrap();
    }

    assert!(driver.find_element(LocatorStrategy::Id, "footer", None).await.is_ok());
}

#[tokio::test]
async fn test_mock_scoped_find_and_xpath() {
    let driver = MockWebDriver::with_document(two_item_document());
    driver.navigate("https://jobs.example.com/search").await.unwrap();

    let list = driver.find_element(LocatorStrategy::CssSelector, "#list", None).await.unwrap();
    let items = driver
        .find_elements(LocatorStrategy::TagName, "li", Some(&list))
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let xpath = driver
        .execute_script(crate::scripts::XPATH_SCRIPT, vec![items[1].to_json()])
        .await
        .unwrap();
    assert_eq!(xpath, json!("/html/body/ul[1]/li[2]"));
}

#[tokio::test]
async fn test_mock_cookie_rules() {
    let driver = MockWebDriver::with_document(MockDocument::new());
    let cookie = Cookie::new("li_at", "token", "");

    let before_visit = driver.add_cookie(&cookie).await;
    assert!(matches!(before_visit, Err(Error::CookieRejected(_))));

    driver.navigate("https://jobs.example.com/").await.unwrap();
    driver.add_cookie(&cookie).await.unwrap();

    driver.reject_cookie("bcookie");
    let rejected = driver.add_cookie(&Cookie::new("bcookie", "x", "")).await;
    assert!(matches!(rejected, Err(Error::CookieRejected(_))));

    let jar = driver.get_cookies().await.unwrap();
    assert_eq!(jar.len(), 1);
    assert_eq!(jar[0].domain, "jobs.example.com");
}

#[tokio::test]
async fn test_mock_closed_session_rejects_commands() {
    let driver = MockWebDriver::with_document(MockDocument::new());
    driver.close().await.unwrap();

    assert!(driver.is_closed());
    let result = driver.navigate("https://jobs.example.com/").await;
    assert!(matches!(result, Err(Error::SessionClosed(_))));
}
