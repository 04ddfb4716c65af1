use anyhow::{Context, Result};
use reqwest::multipart;
use std::time::Duration;
use tracing::info;

use super::types::{
    CreateLectureResponse, Envelope, MyNotesResponse, NoteSummary, Subject, SubjectsResponse,
};
use crate::socket::FinalNotes;

/// Typed client for the lecture backend's HTTP API.
///
/// Every request carries `Authorization: Bearer <token>`. Responses use the
/// backend's `{success, ...}` envelope; `success: false` is an error here.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, auth_token: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /api/lectures/ — create a lecture, returns its backend id
    pub async fn create_lecture(&self, title: &str, subject_id: &str) -> Result<String> {
        let resp: CreateLectureResponse = self
            .http
            .post(self.url("/api/lectures/"))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "title": title, "subject_id": subject_id }))
            .send()
            .await
            .context("Failed to create lecture")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed create-lecture response")?;

        info!("Created lecture {} ({})", resp.id, title);
        Ok(resp.id)
    }

    /// POST /api/documents/lecture/{id}/upload — attach a reference document
    pub async fn upload_document(
        &self,
        lecture_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);

        self.http
            .post(self.url(&format!("/api/documents/lecture/{}/upload", lecture_id)))
            .bearer_auth(&self.auth_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload document")?
            .error_for_status()?;

        info!("Uploaded document {} to lecture {}", filename, lecture_id);
        Ok(())
    }

    /// POST /api/audio/lecture/{id}/chunk — submit one audio segment.
    ///
    /// The response body is ignored beyond success/failure.
    pub async fn upload_chunk(&self, lecture_id: &str, wav_bytes: Vec<u8>) -> Result<()> {
        let part = multipart::Part::bytes(wav_bytes)
            .file_name("audio_chunk.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new().part("audio_file", part);

        self.http
            .post(self.url(&format!("/api/audio/lecture/{}/chunk", lecture_id)))
            .bearer_auth(&self.auth_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload audio chunk")?
            .error_for_status()?;

        Ok(())
    }

    /// POST /api/notes/save — persist the final notes for a lecture.
    ///
    /// Success is only reported when the backend acknowledges it.
    pub async fn save_notes(&self, lecture_id: &str, notes: &FinalNotes) -> Result<()> {
        let envelope: Envelope = self
            .http
            .post(self.url("/api/notes/save"))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({
                "lecture_id": lecture_id,
                "title": notes.title,
                "markdown": notes.markdown,
                "key_takeaways": notes.key_takeaways,
            }))
            .send()
            .await
            .context("Failed to reach backend")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed save response")?;

        if !envelope.success {
            anyhow::bail!(
                "backend rejected save: {}",
                envelope.message.unwrap_or_else(|| "no reason given".into())
            );
        }

        info!("Final notes saved for lecture {}", lecture_id);
        Ok(())
    }

    /// GET /api/dashboard/stats
    pub async fn dashboard_stats(&self) -> Result<serde_json::Value> {
        let stats = self
            .http
            .get(self.url("/api/dashboard/stats"))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("Failed to fetch dashboard stats")?
            .error_for_status()?
            .json()
            .await?;

        Ok(stats)
    }

    /// GET /api/subjects/
    pub async fn subjects(&self) -> Result<Vec<Subject>> {
        let resp: SubjectsResponse = self
            .http
            .get(self.url("/api/subjects/"))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("Failed to fetch subjects")?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.subjects)
    }

    /// POST /api/subjects/
    pub async fn create_subject(&self, name: &str, description: Option<&str>) -> Result<()> {
        self.http
            .post(self.url("/api/subjects/"))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "name": name, "description": description }))
            .send()
            .await
            .context("Failed to create subject")?
            .error_for_status()?;

        Ok(())
    }

    /// PUT /api/subjects/{id}
    pub async fn update_subject(&self, id: &str, updates: serde_json::Value) -> Result<()> {
        self.http
            .put(self.url(&format!("/api/subjects/{}", id)))
            .bearer_auth(&self.auth_token)
            .json(&updates)
            .send()
            .await
            .context("Failed to update subject")?
            .error_for_status()?;

        Ok(())
    }

    /// DELETE /api/subjects/{id}
    pub async fn delete_subject(&self, id: &str) -> Result<()> {
        self.http
            .delete(self.url(&format!("/api/subjects/{}", id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("Failed to delete subject")?
            .error_for_status()?;

        Ok(())
    }

    /// GET /api/notes/my-notes
    pub async fn my_notes(&self) -> Result<Vec<NoteSummary>> {
        let resp: MyNotesResponse = self
            .http
            .get(self.url("/api/notes/my-notes"))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("Failed to fetch notes")?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.notes)
    }
}
