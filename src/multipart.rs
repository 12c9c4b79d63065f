//! Rewrites a signed request into a `multipart/form-data` one.
//!
//! The signature is computed over the form-encoded, file-free body. A
//! multipart body cannot be hashed that way, so the already computed
//! `oauth_*` parameters travel as plain text fields next to the signed
//! fields, and the `Authorization` header is not sent.

use std::path::Path;

use http::Method;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder as ReqwestRequestBuilder};
use tracing::debug;
use url::Url;

use crate::{BodyMap, EncodingError, OutgoingRequest};

const DEFAULT_MIME: &str = "application/octet-stream";

/// A file read from disk, ready to become a multipart part.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub file_name: String,
    pub mime: &'static str,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MultipartRequest {
    method: Method,
    url: Url,
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl MultipartRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Text fields in send order: signed body parameters, then `oauth_*`.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    pub(crate) fn build(self, client: &ReqwestClient) -> reqwest::Result<ReqwestRequestBuilder> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = Part::bytes(file.content)
                .file_name(file.file_name)
                .mime_str(file.mime)?;
            form = form.part(file.name, part);
        }
        Ok(client.request(self.method, self.url).multipart(form))
    }
}

/// Convert a signed request into its multipart form, reading every file entry
/// of `body` from disk.
pub async fn convert(
    request: OutgoingRequest,
    body: &BodyMap,
) -> Result<MultipartRequest, EncodingError> {
    let mut fields: Vec<(String, String)> = request.body().to_vec();
    fields.extend(request.oauth_parameters());

    let mut files = Vec::new();
    for (name, value) in body {
        if let Some(path) = value.as_file() {
            files.push(read_file_part(name, path).await?);
        }
    }
    debug!(
        fields = fields.len(),
        files = files.len(),
        "converted request to multipart"
    );

    Ok(MultipartRequest {
        method: request.method().clone(),
        url: request.url().clone(),
        fields,
        files,
    })
}

async fn read_file_part(name: &str, path: &Path) -> Result<FilePart, EncodingError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| EncodingError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    Ok(FilePart {
        name: name.to_string(),
        file_name,
        mime: guess_mime(path),
        content,
    })
}

/// Content type for an upload, inferred from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME,
    };
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => DEFAULT_MIME,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;
    use crate::{ConsumerCredentials, OAuthParameters, Secrets, Signer, Token};

    fn signed_post(body: &BodyMap) -> OutgoingRequest {
        let consumer = ConsumerCredentials::new("ck", "cs");
        let token = Token::new("tk", "ts");
        let secrets = Secrets::new(&consumer).token(&token);
        let params = OAuthParameters::new().version(true);
        let url = Url::parse("https://api.tumblr.com/v2/blog/x/post").unwrap();
        let mut request = OutgoingRequest::post(url, body);
        request.sign(&Signer::new(&secrets, &params));
        request
    }

    #[tokio::test]
    async fn files_become_parts_and_text_becomes_fields() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG fake").unwrap();

        let mut body = BodyMap::new();
        body.insert("caption".into(), "hello".into());
        body.insert("type".into(), "photo".into());
        body.insert("data".into(), file.path().into());
        let request = signed_post(&body);
        let signature = request
            .oauth_parameters()
            .into_iter()
            .find(|(k, _)| k == crate::OAUTH_SIGNATURE_KEY)
            .unwrap();

        let multipart = convert(request, &body).await.unwrap();

        let fields = multipart.fields();
        assert!(fields.contains(&("caption".to_string(), "hello".to_string())));
        assert!(fields.contains(&("type".to_string(), "photo".to_string())));
        assert!(fields.contains(&signature));
        assert!(fields.iter().any(|(k, _)| k == "oauth_consumer_key"));
        assert!(fields.iter().all(|(k, _)| k != "data"));

        let files = multipart.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "data");
        assert_eq!(files[0].mime, "image/png");
        assert_eq!(files[0].content, b"\x89PNG fake");
        assert!(files[0].file_name.ends_with(".png"));
    }

    #[tokio::test]
    async fn missing_file_is_an_encoding_error() {
        let mut body = BodyMap::new();
        body.insert(
            "data".into(),
            PathBuf::from("/definitely/not/here.jpg").into(),
        );
        let request = signed_post(&body);

        let err = convert(request, &body).await.unwrap_err();
        match err {
            EncodingError::FileUnreadable { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.jpg"))
            }
        }
    }

    #[test]
    fn mime_guessing() {
        assert_eq!(guess_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(guess_mime(Path::new("song.mp3")), "audio/mpeg");
        assert_eq!(guess_mime(Path::new("noext")), DEFAULT_MIME);
        assert_eq!(guess_mime(Path::new("x.unknown")), DEFAULT_MIME);
    }
}
