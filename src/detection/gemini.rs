use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detection::{Detector, DetectorError, parse_detections};
use crate::models::{Detection, EncodedImage};

const PROMPT: &str = "Detect all license plates in this image. Return ONLY a JSON array of objects \
with 'box_2d' [ymin, xmin, ymax, xmax] (0-1000) and 'label'.";

/// Longest error body kept in a `DetectorError::Status`
const MAX_ERROR_BODY: usize = 512;

// --- Request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Plate detector backed by the Gemini `generateContent` API
pub struct GeminiDetector {
    client: Client,
    api_key: String,
    config: DetectorConfig,
}

impl GeminiDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(DetectorError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DetectorError::Transport(e.to_string()))?;

        info!(model = %config.model, "Gemini detector ready");
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(image: &EncodedImage) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Image {
                        inline_data: InlineData {
                            mime_type: image.mime_type().to_string(),
                            data: STANDARD.encode(image.bytes()),
                        },
                    },
                    RequestPart::Text {
                        text: PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: json!({
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "box_2d": { "type": "ARRAY", "items": { "type": "NUMBER" } },
                            "label": { "type": "STRING" }
                        },
                        "required": ["box_2d", "label"]
                    }
                }),
            },
        }
    }
}

impl Detector for GeminiDetector {
    async fn detect(&self, image: &EncodedImage) -> Result<Vec<Detection>, DetectorError> {
        debug!(bytes = image.len(), mime = image.mime_type(), "sending image to detector");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(image))
            .send()
            .await
            .map_err(|e| DetectorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(DetectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::MalformedResponse(e.to_string()))?;

        let detections = parse_detections(&parsed.text())?;
        debug!(count = detections.len(), "detector replied");
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[test]
    fn request_carries_inline_image_and_schema() {
        let image = EncodedImage::new(vec![1u8, 2, 3], ImageFormat::Png);
        let value = serde_json::to_value(GeminiDetector::build_request(&image)).unwrap();

        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert!(parts[1]["text"].as_str().unwrap().contains("box_2d"));

        let config = &value["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert_eq!(
            config["responseSchema"]["items"]["required"],
            json!(["box_2d", "label"])
        );
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "[{\"box_2d\": [1,2,"}, {"text": "3,4], \"label\": \"p\"}]"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let detections = parse_detections(&parsed.text()).unwrap();
        assert_eq!(detections, vec![Detection::new([1.0, 2.0, 3.0, 4.0], "p")]);
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = DetectorConfig {
            api_key: Some("   ".to_string()),
            ..DetectorConfig::default()
        };
        assert!(matches!(
            GeminiDetector::new(config),
            Err(DetectorError::MissingApiKey)
        ));
    }

    #[test]
    fn url_targets_configured_model() {
        let config = DetectorConfig {
            api_key: Some("key".to_string()),
            endpoint: "http://localhost:8080/v1beta/".to_string(),
            model: "test-model".to_string(),
            ..DetectorConfig::default()
        };
        let detector = GeminiDetector::new(config).unwrap();
        assert_eq!(
            detector.url(),
            "http://localhost:8080/v1beta/models/test-model:generateContent"
        );
    }
}
