//! Digest save tool: writes the finished digest to a file.
//!
//! Filesystem failures are reported in the result payload rather than
//! raised, so the pipeline can surface them without aborting.

use async_trait::async_trait;
use newsloom_core::error::ToolError;
use newsloom_core::tool::{Tool, ToolResult};

pub struct DigestSaveTool;

#[async_trait]
impl Tool for DigestSaveTool {
    fn name(&self) -> &str {
        "save_digest_to_file"
    }

    fn description(&self) -> &str {
        "Save the digest content to a file. Creates the file if it doesn't exist, \
         overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "digest": {
                    "type": "string",
                    "description": "The digest content to save"
                },
                "filename": {
                    "type": "string",
                    "description": "The filename to save to"
                }
            },
            "required": ["digest", "filename"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let digest = arguments["digest"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'digest' argument".into()))?;

        let filename = arguments["filename"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filename' argument".into()))?;

        let status = match tokio::fs::write(filename, digest).await {
            Ok(()) => SaveStatus {
                status: "success".into(),
                message: format!("Saved to {filename}"),
            },
            Err(e) => SaveStatus {
                status: "error".into(),
                message: e.to_string(),
            },
        };

        Ok(ToolResult {
            call_id: String::new(),
            success: status.status == "success",
            output: serde_json::to_string_pretty(&status).unwrap_or_default(),
            data: Some(serde_json::to_value(&status).unwrap_or_default()),
        })
    }
}

#[derive(serde::Serialize)]
struct SaveStatus {
    status: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = DigestSaveTool;
        assert_eq!(tool.name(), "save_digest_to_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["digest", "filename"]));
    }

    #[tokio::test]
    async fn save_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.md");

        let tool = DigestSaveTool;
        let result = tool
            .execute(serde_json::json!({
                "digest": "# Daily Digest\n\nThree stories today.",
                "filename": path.to_str().unwrap()
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("Saved to"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "# Daily Digest\n\nThree stories today.");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.md");
        std::fs::write(&path, "yesterday's digest").unwrap();

        let tool = DigestSaveTool;
        let result = tool
            .execute(serde_json::json!({
                "digest": "today's digest",
                "filename": path.to_str().unwrap()
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "today's digest");
    }

    #[tokio::test]
    async fn unwritable_path_reports_error_status() {
        let tool = DigestSaveTool;
        let result = tool
            .execute(serde_json::json!({
                "digest": "content",
                "filename": "/nonexistent-dir/deeply/nested/digest.md"
            }))
            .await
            .unwrap();

        assert!(!result.success);
        let data = result.data.unwrap();
        assert_eq!(data["status"], "error");
        assert!(!data["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_digest_argument() {
        let tool = DigestSaveTool;
        let result = tool
            .execute(serde_json::json!({ "filename": "/tmp/digest.md" }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_filename_argument() {
        let tool = DigestSaveTool;
        let result = tool.execute(serde_json::json!({ "digest": "content" })).await;
        assert!(result.is_err());
    }
}
