use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque URI of a file held by the inference provider
pub type RemoteHandle = String;

/// A local file that was successfully uploaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Remote handle (unique)
    pub file_uri: RemoteHandle,

    /// Local path the upload came from
    pub local_path: String,

    pub upload_time: DateTime<Utc>,

    /// Size in bytes
    pub file_size: u64,

    pub mime_type: String,
}
