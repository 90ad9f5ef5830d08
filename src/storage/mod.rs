pub mod jsonl;

pub use jsonl::{InsertOutcome, Review, ReviewStore, StoreSession};
