//! Google Drive collaborator for letter storage
//!
//! The remote document store behind the letter API. Letters are created as
//! Google Docs (so they open in Drive's editor) and read back as plain text
//! via export. The client carries no credentials of its own; every call goes
//! through a token-bound `DriveHandle` produced per request.

pub mod client;
pub mod error;

pub use client::{
    DEFAULT_LETTER_NAME, DOC_MIME_TYPE, DRIVE_API_BASE, DRIVE_UPLOAD_BASE, DriveClient, DriveFile,
    DriveHandle,
};
pub use error::{Error, Result};
