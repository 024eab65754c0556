use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{validate_key, ObjectStore, ObjectStoreError, StoredObject, UploadOptions};

/// Google Cloud Storage object store backend.
/// All namespaces share one bucket; objects are named `<namespace>/<key>`.
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: tokio::sync::RwLock<String>,
    credentials_file: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The subset of the GCS object resource we read back after an upload.
#[derive(Deserialize)]
struct ObjectResource {
    name: String,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: tokio::sync::RwLock::new(String::new()),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store.refresh_token().await?;
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        let mut lock = self.access_token.write().await;
        *lock = token;
        Ok(())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    /// Send a request, refreshing the access token once if GCS answers 401.
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response, ObjectStoreError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.access_token.read().await.clone();
        let resp = build(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        tracing::debug!(bucket = %self.bucket, "GCS token rejected, refreshing");
        self.refresh_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS token refresh failed: {e}")))?;

        let token = self.access_token.read().await.clone();
        build(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    fn upload_url(&self, overwrite: bool) -> String {
        let mut url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.bucket
        );
        if !overwrite {
            // Precondition: only succeed if no live object has this name
            url.push_str("&ifGenerationMatch=0");
        }
        url
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}",
            self.bucket,
            encode_object_name(name)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn upload(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, ObjectStoreError> {
        let name = object_name(namespace, key)?;
        let boundary = format!("song-uploader-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &name, &data, options)?;
        let url = self.upload_url(options.overwrite);

        let resp = self
            .send_authorized(|token| {
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .header(
                        "Content-Type",
                        format!("multipart/related; boundary={boundary}"),
                    )
                    .body(body.clone())
            })
            .await?;

        if resp.status() == StatusCode::PRECONDITION_FAILED {
            return Err(ObjectStoreError::AlreadyExists(name));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS upload failed ({status}): {body}"
            )));
        }

        let object: ObjectResource = resp
            .json()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("Malformed GCS response: {e}")))?;

        let prefix = format!("{namespace}/");
        let path = object
            .name
            .strip_prefix(&prefix)
            .unwrap_or(&object.name)
            .to_string();

        Ok(StoredObject { path })
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        let name = object_name(namespace, key)?;
        let url = format!("{}?alt=media", self.object_url(&name));

        let resp = self
            .send_authorized(|token| self.client.get(&url).bearer_auth(token))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(name));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS download failed ({status}): {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), ObjectStoreError> {
        let name = object_name(namespace, key)?;
        let url = self.object_url(&name);

        let resp = self
            .send_authorized(|token| self.client.delete(&url).bearer_auth(token))
            .await?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, ObjectStoreError> {
        let name = object_name(namespace, key)?;
        let url = self.object_url(&name);

        let resp = self
            .send_authorized(|token| self.client.get(&url).bearer_auth(token))
            .await?;

        Ok(resp.status().is_success())
    }
}

fn object_name(namespace: &str, key: &str) -> Result<String, ObjectStoreError> {
    validate_key(namespace)?;
    validate_key(key)?;
    Ok(format!("{namespace}/{key}"))
}

/// Validated names only contain the namespace separator as a reserved character.
fn encode_object_name(name: &str) -> String {
    name.replace('/', "%2F")
}

/// Build a `multipart/related` body: JSON object metadata followed by the media.
fn multipart_related_body(
    boundary: &str,
    name: &str,
    data: &[u8],
    options: &UploadOptions,
) -> Result<Bytes, ObjectStoreError> {
    let metadata = serde_json::to_vec(&serde_json::json!({
        "name": name,
        "contentType": options.content_type,
        "cacheControl": options.cache_control_header(),
    }))
    .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

    let mut body = BytesMut::with_capacity(data.len() + metadata.len() + 256);
    body.put_slice(format!("--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(&metadata);
    body.put_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", options.content_type).as_bytes());
    body.put_slice(data);
    body.put_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok(body.freeze())
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM armor and decode the PKCS#8 DER payload
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn object_names_are_namespaced_and_encoded() {
        let name = object_name("songs", "song-abc").unwrap();
        assert_eq!(name, "songs/song-abc");
        assert_eq!(encode_object_name(&name), "songs%2Fsong-abc");
        assert!(object_name("songs", "../etc").is_err());
    }

    #[test]
    fn multipart_body_carries_metadata_and_media() {
        let options = UploadOptions {
            cache_control: Duration::from_secs(3600),
            content_type: "image/png".to_string(),
            overwrite: false,
        };
        let body = multipart_related_body("b", "images/image-1", b"PNGDATA", &options).unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--b\r\n"));
        assert!(text.contains("\"cacheControl\":\"max-age=3600\""));
        assert!(text.contains("\"name\":\"images/image-1\""));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNGDATA"));
        assert!(text.ends_with("--b--\r\n"));
    }
}
