//! # 采集编排层
//!
//! 分页采集状态机：登录、逐页发现记录标识、打开详情面板并导出原始 HTML。
//!
//! ## 主要功能
//! - **登录流程**: 优先使用保存的 Cookie，失败后使用凭据登录，并以职位列表的出现确认登录
//! - **逐页发现**: 改写 `start`/`keywords` 查询参数，滚动触发懒加载后解析卡片标识
//! - **去重**: 整个运行期间维护单调增长的已见标识集合，重复采集同一页不会产生重复记录
//! - **详情提取**: 点击卡片、展开折叠内容、抓取详情面板的内部 HTML
//! - **协作式取消**: 在页与页、记录与记录之间检查取消信号，任何路径都会关闭会话
//! - **运行摘要**: 终止时写出摘要，可据此从最后一页恢复
//!
//! ## 模块结构
//! - `state`: 状态机、页状态与记录类型
//! - `cards`: 列表 HTML 中的卡片解析
//! - `sink`: 记录输出（文件、通道流、内存）
//! - `summary`: 运行摘要
//! - `harvester`: 采集状态机实现
//!
//! ## 使用示例
//!
//! ```no_run
//! use harvest_oxide::config::Config;
//! use harvest_oxide::harvest::{FileSink, PaginationHarvester};
//! use harvest_oxide::session::SessionManager;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> harvest_oxide::Result<()> {
//! let config = Config::load(None)?;
//! let session = Arc::new(SessionManager::open(&config.browser, config.timeouts.navigation_settle()).await?);
//! let mut sink = FileSink::new(config.harvest.output_dir())?;
//! let mut harvester = PaginationHarvester::new(session, &config);
//! let summary = harvester.run(&mut sink, &CancellationToken::new()).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod cards;
pub mod harvester;
pub mod sink;
pub mod state;
pub mod summary;


pub use cards::{extract_cards, CardRef};
pub use harvester::{normalize_label, PaginationHarvester};
pub use sink::{channel, sanitize_file_name, ChannelSink, FileSink, RecordSink};
pub use state::{HarvestState, PageState, Record};
pub use summary::HarvestSummary;
