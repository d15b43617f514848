pub mod sequence;
pub use sequence::Sequence;

pub mod journal;
pub use journal::{EditOp, Journal, JournalBuilder};

pub mod view;
pub use view::MemberView;

pub mod braid;
pub use braid::{Braid, MemberId};
