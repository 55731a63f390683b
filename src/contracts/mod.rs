//! Contract templates, categories and the signing lifecycle.

pub mod lifecycle;
pub mod preview;
pub mod reorder;
pub mod status;
pub mod templates;
pub mod workflow;

pub use lifecycle::{ContractAction, SigningDialog};
pub use status::{ContractStatus, StatusTally};
pub use workflow::{ContractDesk, ContractFilter, ContractRow};
