use crate::error::{GenImgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which request shape a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text+image model answering a content-generation call; images come back
    /// as inline parts next to optional text.
    MultimodalContent,
    /// Dedicated image endpoint taking a count and a size.
    DedicatedImage,
}

impl FromStr for Capability {
    type Err = GenImgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content" => Ok(Capability::MultimodalContent),
            "predict" => Ok(Capability::DedicatedImage),
            other => Err(GenImgError::ValidationError(format!(
                "The --api-mode argument must be \"content\" or \"predict\", got \"{}\".",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Hd,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::Hd => "hd",
        }
    }
}

impl FromStr for Quality {
    type Err = GenImgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(Quality::Standard),
            "hd" => Ok(Quality::Hd),
            other => Err(GenImgError::ValidationError(format!(
                "The --quality argument must be \"standard\" or \"hd\", got \"{}\".",
                other
            ))),
        }
    }
}

/// Requested output size. Gemini's predict endpoint wants an aspect ratio
/// (`16:9`), OpenAI-style endpoints want pixel dimensions (`1024x1024`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    AspectRatio { width: u32, height: u32 },
    Dimensions { width: u32, height: u32 },
}

impl ImageSize {
    pub fn is_aspect_ratio(&self) -> bool {
        matches!(self, ImageSize::AspectRatio { .. })
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSize::AspectRatio { width, height } => write!(f, "{}:{}", width, height),
            ImageSize::Dimensions { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl FromStr for ImageSize {
    type Err = GenImgError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            GenImgError::ValidationError(format!(
                "The --size argument must look like \"W:H\" or \"WxH\", got \"{}\".",
                s
            ))
        };
        let parse_pair = |left: &str, right: &str| -> Result<(u32, u32)> {
            let w = left.trim().parse::<u32>().map_err(|_| invalid())?;
            let h = right.trim().parse::<u32>().map_err(|_| invalid())?;
            if w == 0 || h == 0 {
                return Err(invalid());
            }
            Ok((w, h))
        };

        let normalized = s.trim().to_ascii_lowercase();
        if let Some((left, right)) = normalized.split_once(':') {
            let (width, height) = parse_pair(left, right)?;
            Ok(ImageSize::AspectRatio { width, height })
        } else if let Some((left, right)) = normalized.split_once('x') {
            let (width, height) = parse_pair(left, right)?;
            Ok(ImageSize::Dimensions { width, height })
        } else {
            Err(invalid())
        }
    }
}

/// A fully validated generation call. Built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub capability: Capability,
    pub size: ImageSize,
    pub quality: Quality,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sizes() {
        assert_eq!(
            "16:9".parse::<ImageSize>().unwrap(),
            ImageSize::AspectRatio {
                width: 16,
                height: 9
            }
        );
        assert_eq!(
            "1024X1792".parse::<ImageSize>().unwrap(),
            ImageSize::Dimensions {
                width: 1024,
                height: 1792
            }
        );
        assert_eq!("3:4".parse::<ImageSize>().unwrap().to_string(), "3:4");
        assert_eq!(
            "512x512".parse::<ImageSize>().unwrap().to_string(),
            "512x512"
        );
    }

    #[test]
    fn test_reject_bad_sizes() {
        for bad in ["", "square", "0:1", "16:", "x512", "-1x5", "1:2:3"] {
            assert!(bad.parse::<ImageSize>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!("hd".parse::<Quality>().unwrap(), Quality::Hd);
        assert_eq!(Quality::Standard.as_str(), "standard");
        assert!("ultra".parse::<Quality>().unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_capability() {
        assert_eq!(
            "content".parse::<Capability>().unwrap(),
            Capability::MultimodalContent
        );
        assert_eq!(
            "predict".parse::<Capability>().unwrap(),
            Capability::DedicatedImage
        );
        assert!("chat".parse::<Capability>().is_err());
        assert!("image".parse::<Capability>().is_err());
    }
}
