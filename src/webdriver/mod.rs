//! # WebDriver 协议层
//!
//! 基于 W3C WebDriver 的 JSON-over-HTTP 协议与远程浏览器通信，是整个采集引擎唯一面向网络的契约。
//!
//! ## 主要功能
//! - **会话创建**: 通过 `POST /session` 创建远程会话
//! - **导航控制**: 页面导航、刷新、读取当前 URL
//! - **元素查询**: 按 id / class name / tag name / name / xpath / css selector / link text 查找元素
//! - **脚本执行**: 同步执行 JavaScript，支持元素参数
//! - **Cookie 管理**: 读取与写入当前文档的 Cookie
//!
//! ## 模块结构
//! - `traits`: WebDriver 客户端 trait 定义
//! - `types`: 协议数据类型与错误映射
//! - `client`: 基于 reqwest 的客户端实现
//! - `mock`: 用于测试的内存文档 Mock 实现
//!
//! ## 使用示例
//! ```rust,no_run
//! use harvest_oxide::webdriver::{LocatorStrategy, WebDriverClient, WebDriverClientImpl};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WebDriverClientImpl::connect("http://127.0.0.1:9515", serde_json::json!({})).await?;
//! client.navigate("https://example.com").await?;
//! let heading = client.find_element(LocatorStrategy::TagName, "h1", None).await?;
//! println!("{}", client.element_text(&heading).await?);
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod client;
pub mod mock;

#[cfg(test)]
pub mod tests;

pub use traits::WebDriverClient;
pub use types::{Cookie, LocatorStrategy, Rect, WebElement, ELEMENT_KEY};

// Re-export implementation structs
pub use client::WebDriverClientImpl;

// Re-export mock for development/testing
pub use mock::{ClickEffect, MockDocument, MockNode, MockRequest, MockWebDriver};
