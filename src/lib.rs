pub mod config;
pub mod confirm;
pub mod error;
pub mod gateway;
pub mod models;
pub mod pager;
pub mod thread_list;
pub mod thread_view;

// Re-export commonly used items for tests / external users
pub use confirm::ConfirmPrompt;
pub use error::{BoardError, BoardResult};
pub use gateway::{DataGateway, Filter, GatewayError, Order, SelectQuery, Table};
pub use pager::{page_range, PageWindow, RowRange};
pub use thread_list::{LoadToken, ThreadListController, ThreadListState};
pub use thread_view::{ThreadViewController, ThreadViewState};
