mod client;
mod oauth;

pub use client::{
    ApiErrorClass, DriveClient, DriveError, DriveFile, FOLDER_MIME_TYPE, ObjectKind,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
