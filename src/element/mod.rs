//! # 元素交互层
//!
//! 在会话之上提供带超时的元素查找、失效恢复点击以及驱动懒加载的滚动控制。
//!
//! ## 主要功能
//! - **有界等待**: 在超时内轮询元素，超时返回 `None` 而不是错误
//! - **失效恢复**: 点击遇到 StaleElement 时按备用定位器重新解析并重试一次
//! - **滚动控制**: 窗口或容器内按像素、到顶部、到底部滚动
//! - **懒加载触发**: 滚动并轮询，直到目标元素出现或可见
//!
//! ## 模块结构
//! - `locator`: 元素定位器实现
//! - `scroll`: 滚动控制器实现

pub mod locator;
pub mod scroll;

#[cfg(test)]
pub mod tests;

pub use locator::ElementLocator;
pub use scroll::{ScrollController, ScrollDirection, ScrollPoll};
