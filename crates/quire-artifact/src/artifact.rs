use serde::{Deserialize, Serialize};

/// On-disk representation of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
  /// Structured document, serialized as JSON.
  #[default]
  Json,
  /// Free text rendered as markdown.
  Markdown,
  /// Plain free text.
  Text,
}

impl ArtifactFormat {
  /// All formats, in the order a store probes them when reading.
  pub const ALL: [ArtifactFormat; 3] = [
    ArtifactFormat::Json,
    ArtifactFormat::Markdown,
    ArtifactFormat::Text,
  ];

  /// File extension used for this format.
  pub fn extension(&self) -> &'static str {
    match self {
      ArtifactFormat::Json => "json",
      ArtifactFormat::Markdown => "md",
      ArtifactFormat::Text => "txt",
    }
  }

  /// Whether the payload is free text rather than a structured document.
  pub fn is_text(&self) -> bool {
    !matches!(self, ArtifactFormat::Json)
  }
}

/// The persisted result of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
  /// A structured result (nested maps, sequences and scalars).
  Json(serde_json::Value),
  /// A free-text result in the given text format.
  Text {
    format: ArtifactFormat,
    content: String,
  },
}

impl Artifact {
  /// Create a markdown artifact.
  pub fn markdown(content: impl Into<String>) -> Self {
    Artifact::Text {
      format: ArtifactFormat::Markdown,
      content: content.into(),
    }
  }

  /// Create a plain text artifact.
  pub fn text(content: impl Into<String>) -> Self {
    Artifact::Text {
      format: ArtifactFormat::Text,
      content: content.into(),
    }
  }

  pub fn format(&self) -> ArtifactFormat {
    match self {
      Artifact::Json(_) => ArtifactFormat::Json,
      Artifact::Text { format, .. } => *format,
    }
  }

  /// Convert into a JSON value for downstream consumption.
  ///
  /// Text artifacts become JSON strings.
  pub fn into_value(self) -> serde_json::Value {
    match self {
      Artifact::Json(value) => value,
      Artifact::Text { content, .. } => serde_json::Value::String(content),
    }
  }

  /// Borrow the structured payload, if this is a JSON artifact.
  pub fn as_json(&self) -> Option<&serde_json::Value> {
    match self {
      Artifact::Json(value) => Some(value),
      Artifact::Text { .. } => None,
    }
  }
}
