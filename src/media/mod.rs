use chrono::Utc;
use reqwest::multipart;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Client for the Cloudinary-style image hosting API: signed uploads and
/// deletions, nothing else.
#[derive(Clone)]
pub struct ImageStore {
    client: reqwest::Client,
    credentials: Option<ImageStoreCredentials>,
}

#[derive(Clone)]
struct ImageStoreCredentials {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

/// A stored image: its public URL and the id used to delete it later.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
}

impl ImageStore {
    pub fn new(config: &Config) -> Self {
        let credentials = match (
            &config.cloudinary_cloud_name,
            &config.cloudinary_api_key,
            &config.cloudinary_api_secret,
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(ImageStoreCredentials {
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => None,
        };

        if credentials.is_none() {
            tracing::warn!("Image hosting credentials missing, uploads will be rejected");
        }

        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&ImageStoreCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| AppError::InternalError("Image hosting is not configured".to_string()))
    }

    pub async fn upload(&self, bytes: Vec<u8>, filename: &str, folder: &str) -> Result<UploadedImage> {
        let creds = self.credentials()?;
        let timestamp = Utc::now().timestamp();
        let public_id = format!("{}-{}", Utc::now().timestamp_millis(), stem(filename));

        let signature = sign(
            &[
                ("folder", folder),
                ("public_id", &public_id),
                ("timestamp", &timestamp.to_string()),
            ],
            &creds.api_secret,
        );

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("api_key", creds.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .text("folder", folder.to_string())
            .text("public_id", public_id);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            creds.cloud_name
        );
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Image upload failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::InternalError(format!(
                "Image upload rejected: {}",
                body
            )));
        }

        let uploaded: UploadedImage = response
            .json()
            .await
            .map_err(|e| AppError::InternalError(format!("Invalid upload response: {}", e)))?;

        tracing::debug!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(uploaded)
    }

    pub async fn destroy(&self, public_id: &str) -> Result<()> {
        let creds = self.credentials()?;
        let timestamp = Utc::now().timestamp();
        let signature = sign(
            &[
                ("public_id", public_id),
                ("timestamp", &timestamp.to_string()),
            ],
            &creds.api_secret,
        );

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/destroy",
            creds.cloud_name
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("public_id", public_id),
                ("api_key", &creds.api_key),
                ("timestamp", &timestamp.to_string()),
                ("signature", &signature),
            ])
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Image deletion failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::InternalError(format!(
                "Image deletion rejected: {}",
                body
            )));
        }

        tracing::debug!(public_id = %public_id, "Image deleted");
        Ok(())
    }
}

/// Hosting API request signature: sorted params joined with `&`, secret
/// appended, SHA-1 hex digest.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    }
}

/// Recover the public id of an image from its hosted URL: the last path
/// segment without its extension, prefixed with the folder it lives in.
pub fn public_id_from_url(url: &str, folder: &str) -> String {
    let filename = url.rsplit('/').next().unwrap_or(url);
    format!("{}/{}", folder, stem(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn public_id_is_folder_plus_filename_stem() {
        let url = "https://res.cloudinary.com/demo/image/upload/v1/events/1722945600-wedding.webp";
        assert_eq!(public_id_from_url(url, "events"), "events/1722945600-wedding");
    }

    #[test]
    fn public_id_handles_urls_without_extension() {
        let url = "https://host/x/events/shot";
        assert_eq!(public_id_from_url(url, "events"), "events/shot");
    }

    #[test]
    fn signature_is_deterministic_and_order_independent() {
        let a = sign(&[("public_id", "x"), ("timestamp", "123")], "secret");
        let b = sign(&[("timestamp", "123"), ("public_id", "x")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn stem_strips_only_the_last_extension() {
        assert_eq!(stem("a.b.webp"), "a.b");
        assert_eq!(stem("noext"), "noext");
        assert_eq!(stem(".hidden"), ".hidden");
    }
}
