// Provider-independent logic and shared errors/models
pub mod validation {
    pub use crate::validation::*;
}

pub mod classifier {
    pub use crate::classifier::*;
}

pub mod envelope {
    pub use crate::envelope::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
