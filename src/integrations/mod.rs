//! Provider adapters.

pub mod mail {
    pub use crate::mail_client::*;
}

pub mod text {
    pub use crate::llm_client::*;
}

pub mod crm {
    pub use crate::crm_client::*;
}

pub mod search {
    pub use crate::search_client::*;
}
