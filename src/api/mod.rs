// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod analysis_handler {
    pub use crate::analysis_handler::*;
}

pub mod auth {
    pub use crate::auth::*;
}

pub mod routes {
    pub use crate::routes::*;
}
