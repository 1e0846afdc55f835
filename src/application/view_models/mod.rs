//! View-Models - 展示层状态
//!
//! 持有展示层需要的状态，协调端口调用；展示层只读取快照并转发用户操作

mod book_list;
mod summary_tree;

pub use book_list::BookListViewModel;
pub use summary_tree::{ContentSource, ExpandOutcome, SummaryTreeViewModel};
