mod collection;
mod errors;

pub use collection::{election_filter, ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_duplicate_key_error;
