use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Logo files above this size are turned away by the intake filter.
pub const MAXIMUM_LOGO_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// The image formats a logo can be provided in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogoMediaType {
    Png,
    Jpeg,
}

impl LogoMediaType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            LogoMediaType::Png => "image/png",
            LogoMediaType::Jpeg => "image/jpeg",
        }
    }

    /// Recognizes the accepted MIME types, `image/jpg` included.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(LogoMediaType::Png),
            "image/jpg" | "image/jpeg" => Some(LogoMediaType::Jpeg),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(LogoMediaType::Png),
            "jpg" | "jpeg" => Some(LogoMediaType::Jpeg),
            _ => None,
        }
    }
}

/// A logo file which went through the intake filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogoFile {
    path: PathBuf,
    media_type: LogoMediaType,
}

impl LogoFile {
    /// The intake filter: only PNG and JPEG files within the size limit get through.
    /// Anything else is turned away here and never reaches the form.
    pub fn accept(logo_path: &Path) -> Option<LogoFile> {
        let Some(media_type) = logo_path
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(LogoMediaType::from_extension)
        else {
            log::warn!(
                "Rejected the logo {:?}, only PNG and JPEG images are accepted",
                logo_path
            );
            return None;
        };

        match std::fs::metadata(logo_path) {
            Ok(metadata) if metadata.is_file() && metadata.len() <= MAXIMUM_LOGO_FILE_SIZE => {
                Some(LogoFile {
                    path: logo_path.to_path_buf(),
                    media_type,
                })
            }
            Ok(metadata) if metadata.is_file() => {
                log::warn!(
                    "Rejected the logo {:?}, it is {} bytes while at most {} are accepted",
                    logo_path,
                    metadata.len(),
                    MAXIMUM_LOGO_FILE_SIZE
                );
                None
            }
            Ok(_) => {
                log::warn!("Rejected the logo {:?}, it is not a file", logo_path);
                None
            }
            Err(error) => {
                log::warn!("Rejected the logo {:?}: {}", logo_path, error);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> LogoMediaType {
        self.media_type
    }

    /// Reads the whole file once and encodes it into a self-contained data URI.
    pub fn encode(&self) -> Result<DataUri, ContextError> {
        let logo_bytes = std::fs::read(&self.path).map_err(|error| {
            ContextError::with_error(format!("Unable to read the logo {:?}", self.path), &error)
        })?;
        log::debug!(
            "Encoding the logo {:?} ({} bytes) as {}",
            self.path,
            logo_bytes.len(),
            self.media_type.mime_type()
        );

        Ok(DataUri::from_bytes(self.media_type.mime_type(), &logo_bytes))
    }
}

/// Binary content together with its media type, encoded in base64 in the
/// `data:{media type};base64,{payload}` form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUri {
    media_type: String,
    payload: String,
}

impl DataUri {
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        DataUri {
            media_type: media_type.to_string(),
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Parses a base64 data URI. Data URIs that are not base64 encoded are refused.
    pub fn parse(data_uri: &str) -> Result<Self, ContextError> {
        let data_uri = data_uri.trim();
        let Some(data_uri_body) = data_uri
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &data_uri[5..])
        else {
            return Err(ContextError::with_context(
                "The logo is not a data URI, it does not begin with `data:`",
            ));
        };
        let Some((metadata, payload)) = data_uri_body.split_once(',') else {
            return Err(ContextError::with_context(
                "The logo data URI has no comma separating its payload",
            ));
        };
        let Some(media_type) = metadata
            .strip_suffix(";base64")
            .or_else(|| metadata.strip_suffix(";BASE64"))
        else {
            return Err(ContextError::with_context(format!(
                "The logo data URI {:?} is not base64 encoded",
                metadata
            )));
        };

        Ok(DataUri {
            media_type: media_type.to_string(),
            payload: payload.to_string(),
        })
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, ContextError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|error| ContextError::with_error("Unable to decode the logo data", &error))
    }

    /// Decodes the embedded image. The media type has to be one of the accepted logo
    /// formats, while the bytes are decoded by their content.
    pub fn decode_image(&self) -> Result<image::DynamicImage, ContextError> {
        if LogoMediaType::from_mime_type(&self.media_type).is_none() {
            return Err(ContextError::with_context(format!(
                "The logo media type {:?} is not supported",
                self.media_type
            )));
        }
        let logo_bytes = self.decode_bytes()?;
        image::load_from_memory(&logo_bytes)
            .map_err(|error| ContextError::with_error("Unable to decode the logo image", &error))
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "data:{};base64,{}", self.media_type, self.payload)
    }
}

impl TryFrom<String> for DataUri {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DataUri::parse(&value)
    }
}

impl From<DataUri> for String {
    fn from(value: DataUri) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_carries_its_media_type_and_payload() {
        let data_uri = DataUri::from_bytes("image/png", b"logo");

        assert_eq!(data_uri.to_string(), "data:image/png;base64,bG9nbw==");
        assert_eq!(DataUri::parse(&data_uri.to_string()).unwrap(), data_uri);
        assert_eq!(data_uri.decode_bytes().unwrap(), b"logo".to_vec());
    }

    #[test]
    fn data_uris_without_base64_are_refused() {
        assert!(DataUri::parse("data:image/png,rawdata").is_err());
        assert!(DataUri::parse("https://example.com/logo.png").is_err());
        assert!(DataUri::parse("data:image/png;base64").is_err());
    }

    #[test]
    fn corrupt_images_fail_to_decode() {
        let data_uri = DataUri::from_bytes("image/png", b"definitely not a png");

        let error = data_uri.decode_image().unwrap_err();
        assert_eq!(error.context, "Unable to decode the logo image");
    }

    #[test]
    fn logos_of_other_media_types_are_refused() {
        let data_uri = DataUri::parse("data:image/gif;base64,R0lGODlh").unwrap();

        let error = data_uri.decode_image().unwrap_err();
        assert_eq!(error.context, "The logo media type \"image/gif\" is not supported");
    }

    #[test]
    fn media_types_are_recognized_from_mime_types_and_extensions() {
        assert_eq!(
            LogoMediaType::from_mime_type("image/jpg"),
            Some(LogoMediaType::Jpeg)
        );
        assert_eq!(
            LogoMediaType::from_mime_type("image/png"),
            Some(LogoMediaType::Png)
        );
        assert_eq!(LogoMediaType::from_mime_type("image/gif"), None);
        assert_eq!(
            LogoMediaType::from_extension("JPEG"),
            Some(LogoMediaType::Jpeg)
        );
        assert_eq!(LogoMediaType::from_extension("svg"), None);
    }

    #[test]
    fn intake_filter_turns_away_other_file_types() {
        assert_eq!(LogoFile::accept(Path::new("Cargo.toml")), None);
        assert_eq!(LogoFile::accept(Path::new("missing-logo.png")), None);
    }
}
