//! Element locator and scroll controller tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::*;
use crate::locator::LocatorDescriptor;
use crate::session::SessionManager;
use crate::webdriver::{MockDocument, MockNode, MockWebDriver};
use crate::Error;

const PAGE: &str = "https://jobs.example.com/search/";

fn feed_document() -> MockDocument {
    let mut doc = MockDocument::new();
    let list = doc.push(MockNode::new("div").id("list").class("scaffold-layout__list"));
    doc.push(MockNode::new("button").id("apply").text("Apply").parent(list));
    doc.push(MockNode::new("input").id("email"));
    doc.push(MockNode::new("p").id("footer").revealed_after(3));
    doc.push(MockNode::new("span").id("ghost").hidden());
    doc.push(MockNode::new("span").id("banner"));
    doc
}

async fn setup() -> (Arc<MockWebDriver>, Arc<SessionManager>) {
    let driver = Arc::new(MockWebDriver::with_document(feed_document()));
    let session = Arc::new(SessionManager::with_client(driver.clone(), Duration::ZERO));
    session.navigate(PAGE).await.unwrap();
    (driver, session)
}

fn locator(session: &Arc<SessionManager>) -> ElementLocator {
    ElementLocator::new(
        session.clone(),
        Duration::from_millis(5),
        Duration::from_millis(50),
        Duration::ZERO,
    )
}

fn fast_poll(max_attempts: u32) -> ScrollPoll {
    ScrollPoll {
        max_attempts,
        poll_interval: Duration::ZERO,
        step: 300,
    }
}

#[tokio::test]
async fn test_find_records_last_located() {
    let (_driver, session) = setup().await;
    let mut locator = locator(&session);

    let found = locator
        .find(&LocatorDescriptor::id("apply"), Duration::from_millis(50))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(locator.last_located(), Some(&found));
}

#[tokio::test]
async fn test_find_times_out_with_none() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);

    let start = Instant::now();
    let result = locator
        .find(&LocatorDescriptor::id("missing"), Duration::from_millis(40))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(driver.count("find id missing") > 1);
}

#[tokio::test]
async fn test_find_within_root() {
    let (_driver, session) = setup().await;
    let mut locator = locator(&session);

    let list = locator
        .find(&LocatorDescriptor::id("list"), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();

    let inside = locator
        .find_within(&LocatorDescriptor::id("apply"), &list, Duration::ZERO)
        .await
        .unwrap();
    let outside = locator
        .find_within(&LocatorDescriptor::id("email"), &list, Duration::ZERO)
        .await
        .unwrap();

    assert!(inside.is_some());
    assert!(outside.is_none());
}

#[tokio::test]
async fn test_stale_click_recovers_through_fallback() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);
    let apply = LocatorDescriptor::id("apply");

    let handle = locator.find(&apply, Duration::ZERO).await.unwrap().unwrap();
    driver.rerender();

    let clicked = locator.click(Some(&handle), Some(&apply)).await.unwrap();

    assert_ne!(clicked, handle);
    assert_eq!(driver.count("click"), 2);
    assert_eq!(locator.last_located(), Some(&clicked));
}

#[tokio::test]
async fn test_stale_click_without_fallback_surfaces_stale() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);

    let handle = locator
        .find(&LocatorDescriptor::id("apply"), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    driver.rerender();

    let result = locator.click(Some(&handle), None).await;
    assert!(matches!(result, Err(Error::StaleElement(_))));
}

#[tokio::test]
async fn test_handle_held_across_navigation_recovers_with_fallback() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);
    let apply = LocatorDescriptor::id("apply");

    let handle = locator.find(&apply, Duration::ZERO).await.unwrap().unwrap();
    session.reload().await.unwrap();

    locator.click(Some(&handle), Some(&apply)).await.unwrap();

    // The old handle never reached the browser
    assert_eq!(driver.count("click"), 1);
}

#[tokio::test]
async fn test_failed_fallback_surfaces_stale() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);

    let handle = locator
        .find(&LocatorDescriptor::id("apply"), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    driver.rerender();

    let result = locator
        .click(Some(&handle), Some(&LocatorDescriptor::id("does-not-exist")))
        .await;
    assert!(matches!(result, Err(Error::StaleElement(_))));
}

#[tokio::test]
async fn test_send_keys_defaults_to_last_located() {
    let (driver, session) = setup().await;
    let mut locator = locator(&session);

    locator
        .find(&LocatorDescriptor::id("email"), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    locator.send_keys(None, "user@example.com").await.unwrap();

    assert!(driver
        .commands()
        .iter()
        .any(|c| c.starts_with("send_keys") && c.ends_with("user@example.com")));
}

#[tokio::test]
async fn test_send_keys_without_any_element_fails() {
    let (_driver, session) = setup().await;
    let mut locator = locator(&session);

    let result = locator.send_keys(None, "x").await;
    assert!(matches!(result, Err(Error::ElementNotFound(_))));
}

#[tokio::test]
async fn test_scroll_until_visible_bounded() {
    let (driver, session) = setup().await;
    let scroller = ScrollController::new(session.clone());
    let ghost = session
        .find_element(&LocatorDescriptor::id("ghost"), None)
        .await
        .unwrap()
        .unwrap();

    let visible = scroller
        .scroll_until_visible(None, Some(&ghost), &fast_poll(7))
        .await
        .unwrap();

    assert!(!visible);
    assert_eq!(driver.scroll_count(), 7);
}

#[tokio::test]
async fn test_scroll_until_visible_without_watch_is_noop() {
    let (driver, session) = setup().await;
    let scroller = ScrollController::new(session.clone());

    let visible = scroller
        .scroll_until_visible(None, None, &fast_poll(5))
        .await
        .unwrap();

    assert!(!visible);
    assert_eq!(driver.scroll_count(), 0);
}

#[tokio::test]
async fn test_scroll_until_visible_success() {
    let (driver, session) = setup().await;
    let scroller = ScrollController::new(session.clone());
    let banner = session
        .find_element(&LocatorDescriptor::id("banner"), None)
        .await
        .unwrap()
        .unwrap();

    let visible = scroller
        .scroll_until_visible(None, Some(&banner), &fast_poll(5))
        .await
        .unwrap();

    assert!(visible);
    assert_eq!(driver.scroll_count(), 1);
}

#[tokio::test]
async fn test_scroll_until_located_reveals_lazy_node() {
    let (driver, session) = setup().await;
    let scroller = ScrollController::new(session.clone());
    let list = session
        .find_element(&LocatorDescriptor::id("list"), None)
        .await
        .unwrap()
        .unwrap();

    let footer = scroller
        .scroll_until_located(Some(&list), &LocatorDescriptor::id("footer"), &fast_poll(10))
        .await
        .unwrap();

    assert!(footer.is_some());
    assert_eq!(driver.scroll_count(), 3);
}

#[tokio::test]
async fn test_scroll_to_top_does_not_load_more() {
    let (driver, session) = setup().await;
    let scroller = ScrollController::new(session.clone());
    let list = session
        .find_element(&LocatorDescriptor::id("list"), None)
        .await
        .unwrap()
        .unwrap();

    scroller.scroll(ScrollDirection::Bottom, 0, Some(&list)).await.unwrap();
    scroller.scroll(ScrollDirection::Top, 0, Some(&list)).await.unwrap();
    scroller.scroll(ScrollDirection::Top, 0, None).await.unwrap();
    scroller.scroll(ScrollDirection::Up, 300, None).await.unwrap();

    assert_eq!(driver.scroll_count(), 2);
    assert!(driver
        .commands()
        .iter()
        .any(|c| c == "script window.scrollBy(0, -300);"));
}
