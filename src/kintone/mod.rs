//! kintone backend: wire types, request building, and the HTTP client

pub mod client;
pub mod download;
pub mod query;
pub mod types;

pub use client::{Credentials, DownloadedFile, KintoneClient};
pub use query::Query;
pub use types::{
    AppDetail, CommentInput, Entity, FieldValue, FileRef, Mention, MentionType, Record,
    RowValue, TableRow,
};
