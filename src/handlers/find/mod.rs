pub mod lookup;
pub mod search;

pub use lookup::lookup_get;
pub use search::find_get;
