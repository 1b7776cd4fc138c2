//! # 定位器层
//!
//! 从活动元素推导多种定位策略，并按固定优先级排序；描述符本身是纯数据，不依赖浏览器。
//!
//! ## 主要功能
//! - **策略推导**: 为元素推导 Id、ClassName、TagName、Name、XPath、CssSelector、LinkText 描述符
//! - **优先级排序**: Id > ClassName > XPath > CssSelector > Name > TagName
//! - **相对定位**: 去除位置限定（`:nth-child(n)`、`[n]`、`/html/body/` 前缀），匹配一类元素
//! - **元素快照**: 属性表、文本与位置尺寸
//!
//! ## 模块结构
//! - `descriptor`: 定位描述符、排序与相对化
//! - `resolver`: 基于元素内省的推导实现

pub mod descriptor;
pub mod resolver;

pub use descriptor::{priority_of, rank_best, to_relative, LocatorDescriptor};
pub use resolver::{ElementIntrospection, ElementSnapshot, LocatorReport, LocatorResolver};
