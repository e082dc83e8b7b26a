//! Promptline Store - durable per-file progress for batch prompt runs
//!
//! - [`WorkItem`]: one prompt from an input dataset, identified by [`IdentityKey`]
//! - [`AnswerTable`]: ground truth looked up by subject id
//! - [`ResultRecord`] / [`Response`]: one persisted outcome
//! - [`RecordStore`]: result file ⇄ in-memory record map, rewritten atomically

pub mod answers;
pub mod error;
pub mod item;
pub mod record;
pub mod store;

pub use answers::AnswerTable;
pub use error::StoreError;
pub use item::{IdentityKey, WorkItem, load_work_items};
pub use record::{Response, ResultRecord};
pub use store::{RecordStore, cleanup_tmp_files};
