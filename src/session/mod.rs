//! # 会话管理层
//!
//! 独占唯一的远程浏览器会话，负责驱动程序的解析与启动、页面导航、Cookie 持久化以及脚本执行。
//!
//! ## 主要功能
//! - **驱动解析**: 依次尝试配置路径、系统安装、本地缓存和网络下载
//! - **导航控制**: 页面导航、刷新、查询参数改写后导航
//! - **Cookie 持久化**: 保存与恢复 Cookie，被拒绝的 Cookie 记录警告后跳过
//! - **元素句柄**: 以页面纪元标记元素引用，跨导航使用旧句柄会得到 StaleElement
//! - **会话清理**: 关闭会话与驱动进程，可重复调用
//!
//! ## 模块结构
//! - `manager`: 会话管理器实现
//! - `handle`: 带纪元的元素句柄
//! - `driver`: 驱动解析、启动参数与进程管理
//! - `cookies`: Cookie 文件读写
//! - `query`: 查询参数改写
//!
//! ## 使用示例
//! ```rust,no_run
//! use harvest_oxide::config::BrowserConfig;
//! use harvest_oxide::session::SessionManager;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionManager::open(&BrowserConfig::default(), Duration::from_secs(2)).await?;
//! session.navigate("https://www.linkedin.com/jobs/search/").await?;
//! session
//!     .rewrite_query_and_navigate(&[("start", "25".to_string()), ("keywords", "data analyst".to_string())])
//!     .await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod handle;
pub mod driver;
pub mod cookies;
pub mod query;


pub use manager::{CookieLoadReport, SessionManager};
pub use handle::ElementHandle;
pub use driver::{DriverProcess, DriverResolver, DriverSource, ResolvedDriver};
pub use query::rewrite_query;
