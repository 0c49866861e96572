use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const PAGE_SIZE: u32 = 100;
const DEFAULT_FILE_FIELDS: &str = "id,name,mimeType,modifiedTime";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Folder,
    File,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Lists every direct, non-trashed child of `parent_id`, following page
    /// tokens until the listing is exhausted.
    pub async fn list_children(
        &self,
        parent_id: &str,
        order_by: Option<&str>,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let query = FileQuery {
            parent_id: Some(parent_id),
            name: None,
            kind: None,
        };
        self.list_all(&query, order_by).await
    }

    /// Looks up non-trashed objects by exact name, optionally scoped to a
    /// parent and to a folder/file kind.
    pub async fn find_by_name(
        &self,
        parent_id: Option<&str>,
        name: &str,
        kind: Option<ObjectKind>,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let query = FileQuery {
            parent_id,
            name: Some(name),
            kind,
        };
        self.list_all(&query, None).await
    }

    pub async fn create_folder(
        &self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<DriveFile, DriveError> {
        let metadata = CreateRequest {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: parent_id.map(|id| vec![id.to_string()]),
        };
        self.create_metadata(&metadata).await
    }

    /// Creates an empty file object; content is attached afterwards with
    /// [`DriveClient::update_content`].
    pub async fn create_file(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        let metadata = CreateRequest {
            name,
            mime_type: None,
            parents: Some(vec![parent_id.to_string()]),
        };
        self.create_metadata(&metadata).await
    }

    /// Replaces the content of an existing object in place. The identifier,
    /// name, and parent are unchanged.
    pub async fn update_content(&self, file_id: &str, content: Body) -> Result<(), DriveError> {
        let mut url = self
            .base_url
            .join(&format!("/upload/drive/v3/files/{file_id}"))?;
        url.query_pairs_mut().append_pair("uploadType", "media");
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }

    async fn create_metadata(&self, metadata: &CreateRequest<'_>) -> Result<DriveFile, DriveError> {
        let mut url = self.base_url.join("/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("fields", DEFAULT_FILE_FIELDS);
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn list_all(
        &self,
        query: &FileQuery<'_>,
        order_by: Option<&str>,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(query, order_by, page_token.as_deref())
                .await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    async fn list_page(
        &self,
        query: &FileQuery<'_>,
        order_by: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut url = self.base_url.join("/drive/v3/files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.to_q());
            pairs.append_pair("spaces", "drive");
            pairs.append_pair("pageSize", &PAGE_SIZE.to_string());
            pairs.append_pair(
                "fields",
                &format!("nextPageToken,files({DEFAULT_FILE_FIELDS})"),
            );
            if let Some(order_by) = order_by {
                pairs.append_pair("orderBy", order_by);
            }
            if let Some(page_token) = page_token {
                pairs.append_pair("pageToken", page_token);
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.classification(), Some(ApiErrorClass::Auth))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

struct FileQuery<'a> {
    parent_id: Option<&'a str>,
    name: Option<&'a str>,
    kind: Option<ObjectKind>,
}

impl FileQuery<'_> {
    // Trashed objects must never count as existing; every query carries the
    // trashed=false term.
    fn to_q(&self) -> String {
        let mut terms = vec!["trashed=false".to_string()];
        if let Some(parent_id) = self.parent_id {
            terms.push(format!("'{}' in parents", escape_q_value(parent_id)));
        }
        if let Some(name) = self.name {
            terms.push(format!("name='{}'", escape_q_value(name)));
        }
        match self.kind {
            Some(ObjectKind::Folder) => {
                terms.push(format!("mimeType='{FOLDER_MIME_TYPE}'"));
            }
            Some(ObjectKind::File) => {
                terms.push(format!("mimeType!='{FOLDER_MIME_TYPE}'"));
            }
            None => {}
        }
        terms.join(" and ")
    }
}

fn escape_q_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "modifiedTime", default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<String>>,
}
