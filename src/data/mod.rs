//! Storage layer.

pub mod db {
    pub use crate::db::*;
}

pub mod store {
    pub use crate::store::*;
}
