//! Repository layer for document access.
//!
//! [`GenericRepository`] provides typed CRUD, filtered and windowed queries,
//! counting, aggregation and pagination for any collection. Documents are
//! decoded into whatever `serde` type the caller asks for.

mod decode;
mod error;
mod generic_repo;
mod pagination;


pub use decode::{decode_all, decode_first};
pub use error::{RepositoryError, RepositoryResult};
pub use generic_repo::GenericRepository;
pub use pagination::{MAX_PAGE_SIZE, Page, PageRequest};
