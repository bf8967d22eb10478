pub mod db_utils;
pub mod pagination;
pub mod query;
pub mod username_index;
