mod lookup;
mod notify;
mod pg;

pub use lookup::*;
pub use notify::*;
pub use pg::*;
