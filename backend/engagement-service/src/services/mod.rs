pub mod cascade;
pub mod interactions;
pub mod subtree;

pub use cascade::{CascadeDeleteExecutor, CascadeOutcome};
pub use interactions::InteractionService;
pub use subtree::SubtreeResolver;
