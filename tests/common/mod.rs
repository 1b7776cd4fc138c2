//! Common test utilities
//!
//! A mock job board served by `MockWebDriver`: a sign-in page until the
//! session cookie is present, then result pages addressed by the `start`
//! query parameter with lazily rendered pagination footers and expandable
//! detail panels.

#![allow(dead_code)]

use harvest_oxide::config::{Config, LocatorConfig, TimeoutConfig};
use harvest_oxide::session::SessionManager;
use harvest_oxide::webdriver::{ClickEffect, Cookie, MockDocument, MockNode, MockRequest, MockWebDriver};
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://jobs.example.com/jobs/search/";
pub const SESSION_COOKIE: &str = "li_at";
pub const PAGE_SIZE: u32 = 25;
pub const EXPANDED_TEXT: &str = "<p>Company details in full</p>";

/// Shape of the fake board
#[derive(Debug, Clone)]
pub struct JobBoard {
    /// Job identifiers shown on each result page
    pub pages: Vec<Vec<String>>,
    /// Serve the sign-in page until the session cookie is set
    pub require_login: bool,
    /// Submitting the sign-in form sets the session cookie
    pub login_works: bool,
    /// Scrolls needed before the pagination footer renders
    pub footer_after: u32,
    /// Put a failing expand control before the working one
    pub failing_expand: bool,
    /// Render cards without a DOM id
    pub without_dom_ids: bool,
    /// Result pages rendered without a job list
    pub pages_without_list: Vec<usize>,
}

impl JobBoard {
    pub fn new(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|ids| ids.iter().map(|id| id.to_string()).collect())
                .collect(),
            require_login: true,
            login_works: true,
            footer_after: 2,
            failing_expand: false,
            without_dom_ids: false,
            pages_without_list: Vec::new(),
        }
    }

    pub fn public(mut self) -> Self {
        self.require_login = false;
        self
    }

    pub fn broken_login(mut self) -> Self {
        self.login_works = false;
        self
    }

    pub fn failing_expand(mut self) -> Self {
        self.failing_expand = true;
        self
    }

    pub fn without_dom_ids(mut self) -> Self {
        self.without_dom_ids = true;
        self
    }

    pub fn without_list_on(mut self, page: usize) -> Self {
        self.pages_without_list.push(page);
        self
    }

    /// Configuration pointed at this board with every wait set to zero
    ///
    /// Login is required exactly when the board gates on a session cookie.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.site.base_url = BASE_URL.to_string();
        config.site.login_trigger = LocatorConfig::css(".sign-in-modal__outlet-btn");
        config.site.email_input = LocatorConfig::id("session_key");
        config.site.password_input = LocatorConfig::id("session_password");
        config.site.submit_button = LocatorConfig::css("#submit");
        config.site.job_list = LocatorConfig::css("#job-list");
        config.site.detail_panel = LocatorConfig::css("#detail");
        config.site.pagination_footer = LocatorConfig::css("#footer");
        config.harvest.page_size = PAGE_SIZE;
        config.harvest.page_count = 1;
        config.harvest.require_login = self.require_login;
        config.timeouts = TimeoutConfig {
            scroll_attempts: 5,
            ..TimeoutConfig::immediate()
        };
        config
    }

    /// Same as [`JobBoard::config`] with credentials filled in
    pub fn config_with_credentials(&self) -> Config {
        let mut config = self.config();
        config.harvest.email = Some("analyst@example.com".to_string());
        config.harvest.password = Some("correct horse".to_string());
        config
    }

    /// Mock browser serving this board
    pub fn driver(&self) -> Arc<MockWebDriver> {
        let board = self.clone();
        Arc::new(MockWebDriver::new(move |request: &MockRequest<'_>| board.render(request)))
    }

    fn render(&self, request: &MockRequest<'_>) -> MockDocument {
        if !request.url.starts_with("http") {
            return MockDocument::new();
        }
        if self.require_login && !request.has_cookie(SESSION_COOKIE) {
            return self.sign_in_page();
        }

        let start: u32 = url::Url::parse(request.url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "start")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .unwrap_or(0);
        let page = (start / PAGE_SIZE) as usize;
        if self.pages_without_list.contains(&page) {
            return MockDocument::new().with(MockNode::new("p").id("maintenance").text("Try again later"));
        }
        let ids = self.pages.get(page).cloned().unwrap_or_default();

        self.results_page(&ids)
    }

    fn sign_in_page(&self) -> MockDocument {
        let mut submit = MockNode::new("button").id("submit").text("Sign in");
        if self.login_works {
            submit = submit.on_click(ClickEffect::SetCookie(Cookie::new(
                SESSION_COOKIE,
                "token",
                "jobs.example.com",
            )));
        }
        submit = submit.on_click(ClickEffect::Navigate(BASE_URL.to_string()));

        MockDocument::new()
            .with(MockNode::new("button").id("sign-in").class("sign-in-modal__outlet-btn"))
            .with(MockNode::new("input").id("session_key"))
            .with(MockNode::new("input").id("session_password"))
            .with(submit)
    }

    fn card_markup(&self, id: &str) -> String {
        if self.without_dom_ids {
            format!(
                r#"<li class="scaffold-layout__list-item" data-occludable-job-id="{id}">Job {id}</li>"#
            )
        } else {
            format!(
                r#"<li id="ember{id}" class="scaffold-layout__list-item" data-occludable-job-id="{id}">Job {id}</li>"#
            )
        }
    }

    fn results_page(&self, ids: &[String]) -> MockDocument {
        let mut doc = MockDocument::new();
        let markup: String = ids.iter().map(|id| self.card_markup(id)).collect();

        let list = doc.push(MockNode::new("div").id("job-list").class("scaffold-layout__list").html(markup));
        doc.push(MockNode::new("p").id("footer").revealed_after(self.footer_after));
        let detail = doc.push(MockNode::new("div").id("detail"));
        let company = doc.push(MockNode::new("section").class("jobs-company").parent(detail));

        if self.failing_expand {
            doc.push(
                MockNode::new("button")
                    .class("inline-show-more-text__button")
                    .text("展开")
                    .parent(company)
                    .failing_click(),
            );
        }
        doc.push(
            MockNode::new("button")
                .class("inline-show-more-text__button inline-show-more-text__button--light")
                .text("\n   展开  ")
                .parent(company)
                .on_click(ClickEffect::AppendHtml {
                    target: detail,
                    html: EXPANDED_TEXT.to_string(),
                }),
        );
        doc.push(
            MockNode::new("button")
                .class("follow-button")
                .text("Follow")
                .parent(company)
                .on_click(ClickEffect::AppendHtml {
                    target: detail,
                    html: "<p>FOLLOWED</p>".to_string(),
                }),
        );

        for id in ids {
            let mut card = MockNode::new("li")
                .class("scaffold-layout__list-item")
                .attr("data-occludable-job-id", id.as_str())
                .parent(list)
                .on_click(ClickEffect::SetHtml {
                    target: detail,
                    html: format!("<h2>Job {}</h2>", id),
                });
            if !self.without_dom_ids {
                card = card.id(format!("ember{}", id));
            }
            doc.push(card);
        }

        doc
    }
}

/// Session over a mock driver, without navigation settle
pub fn session_for(driver: &Arc<MockWebDriver>) -> Arc<SessionManager> {
    Arc::new(SessionManager::with_client(driver.clone(), Duration::ZERO))
}
