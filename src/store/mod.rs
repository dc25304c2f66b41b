/// Storage backends
///
/// `PgStore` is the production backend; `MemoryStore` has the same
/// semantics and backs the tests and database-less local runs.

mod memory;
mod postgres;

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::RefreshTokenStore;
use crate::domain::{NoteStore, UserStore};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store handles shared by every worker
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            notes: store.clone(),
            refresh_tokens: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            notes: store.clone(),
            refresh_tokens: store,
        }
    }
}
