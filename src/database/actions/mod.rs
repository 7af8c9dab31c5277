mod ingredients;
mod recipes;
mod relations;
mod subscriptions;
mod tags;
mod users;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
