// Thin namespace wrapper for HTTP-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod routes {
    pub use crate::routes::*;
}

pub mod openapi {
    pub use crate::openapi::*;
}
