use crate::detection::DetectorError;
use crate::models::Detection;

/// Parse the model's JSON text into detections.
///
/// Expects an array of `{"box_2d": [ymin, xmin, ymax, xmax], "label": "..."}`.
/// An empty reply means "nothing found"; anything else that does not match
/// the schema is an error.
pub fn parse_detections(text: &str) -> Result<Vec<Detection>, DetectorError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(body).map_err(|e| DetectorError::MalformedResponse(e.to_string()))
}

/// Models sometimes wrap JSON in a markdown fence even when asked not to
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boxes_in_order() {
        let text = r#"[
            {"box_2d": [512, 301, 560, 420], "label": "license_plate"},
            {"box_2d": [100.5, 10, 140, 90.25], "label": "plate"}
        ]"#;
        let detections = parse_detections(text).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0], Detection::new([512.0, 301.0, 560.0, 420.0], "license_plate"));
        assert_eq!(detections[1].bbox.y_min, 100.5);
        assert_eq!(detections[1].bbox.x_max, 90.25);
    }

    #[test]
    fn empty_reply_means_no_detections() {
        assert!(parse_detections("").unwrap().is_empty());
        assert!(parse_detections("  \n").unwrap().is_empty());
        assert!(parse_detections("[]").unwrap().is_empty());
    }

    #[test]
    fn fenced_json_is_accepted() {
        let text = "```json\n[{\"box_2d\": [1, 2, 3, 4], \"label\": \"p\"}]\n```";
        assert_eq!(parse_detections(text).unwrap().len(), 1);
    }

    #[test]
    fn schema_mismatch_is_malformed() {
        let cases = [
            r#"{"box_2d": [1, 2, 3, 4], "label": "p"}"#,
            r#"[{"box_2d": [1, 2, 3], "label": "p"}]"#,
            r#"[{"box_2d": [1, 2, 3, 4, 5], "label": "p"}]"#,
            r#"[{"box_2d": ["1", 2, 3, 4], "label": "p"}]"#,
            r#"[{"box_2d": [1, 2, 3, 4]}]"#,
            "no plates here",
        ];
        for case in cases {
            let err = parse_detections(case).unwrap_err();
            assert!(matches!(err, DetectorError::MalformedResponse(_)), "{case}: {err}");
        }
    }
}
