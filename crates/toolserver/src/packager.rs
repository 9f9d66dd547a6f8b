//! Turns collected artifacts into a response body.

use crate::{collector::Artifact, error::JobError};
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{Cursor, Write},
    str::FromStr,
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub const MULTIPART_BOUNDARY: &str = "X-GALLERY-BOUNDARY";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data; boundary=X-GALLERY-BOUNDARY";
pub const ARCHIVE_NAME: &str = "gallery.zip";
pub const ARCHIVE_MIME: &str = "application/zip";

/// RFC 5987 `attr-char` minus alphanumerics; everything else is percent-encoded.
const ATTR_CHARS: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Single,
    #[serde(alias = "zip")]
    Archive,
    Multipart,
    #[serde(alias = "json")]
    JsonList,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "archive" | "zip" => Ok(Self::Archive),
            "multipart" => Ok(Self::Multipart),
            "json-list" | "json" => Ok(Self::JsonList),
            other => Err(format!(
                "unknown mode `{other}` (expected single, archive, multipart or json-list)"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Archive => "archive",
            Self::Multipart => "multipart",
            Self::JsonList => "json-list",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFile {
    pub index: usize,
    pub filename: String,
    pub mime: String,
    pub size: usize,
    pub data_base64: String,
}

#[derive(Debug)]
pub enum PackagedResponse {
    Single {
        filename: String,
        mime: &'static str,
        data: Vec<u8>,
    },
    Archive(Vec<u8>),
    Multipart(Vec<u8>),
    JsonList(Vec<EncodedFile>),
}

pub fn pack(artifacts: &[Artifact], mode: Mode) -> Result<PackagedResponse, JobError> {
    if artifacts.is_empty() {
        return Err(JobError::EmptyResult("no files were downloaded"));
    }

    match mode {
        Mode::Single => match artifacts {
            [only] => Ok(PackagedResponse::Single {
                filename: only.name.clone(),
                mime: only.mime,
                data: only.data.clone(),
            }),
            _ => archive(artifacts).map(PackagedResponse::Archive),
        },
        Mode::Archive => archive(artifacts).map(PackagedResponse::Archive),
        Mode::Multipart => Ok(PackagedResponse::Multipart(multipart(artifacts))),
        Mode::JsonList => Ok(PackagedResponse::JsonList(encode_all(artifacts))),
    }
}

fn archive(artifacts: &[Artifact]) -> Result<Vec<u8>, JobError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(artifacts.iter().any(|a| a.data.len() as u64 >= u32::MAX as u64));

    for artifact in artifacts {
        zip.start_file(artifact.relative_path.as_str(), options)
            .map_err(JobError::packaging)?;
        zip.write_all(&artifact.data).map_err(JobError::packaging)?;
    }

    let cursor = zip.finish().map_err(JobError::packaging)?;
    Ok(cursor.into_inner())
}

fn multipart(artifacts: &[Artifact]) -> Vec<u8> {
    let total: usize = artifacts.iter().map(|a| a.data.len() + 160).sum();
    let mut body = Vec::with_capacity(total);

    for artifact in artifacts {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: {}\r\n\r\n",
                quote_escape(&artifact.name),
                artifact.mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(&artifact.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn encode_all(artifacts: &[Artifact]) -> Vec<EncodedFile> {
    artifacts
        .iter()
        .enumerate()
        .map(|(index, a)| EncodedFile {
            index,
            filename: a.name.clone(),
            mime: a.mime.to_string(),
            size: a.data.len(),
            data_base64: STANDARD.encode(&a.data),
        })
        .collect()
}

fn quote_escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `attachment; filename="..."` with a visible-ASCII fallback, plus `filename*`
/// carrying the exact UTF-8 name when the fallback had to replace characters.
fn attachment(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let mut value = format!("attachment; filename=\"{}\"", quote_escape(&ascii));
    if ascii != filename {
        value.push_str("; filename*=UTF-8''");
        value.extend(utf8_percent_encode(filename, ATTR_CHARS));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

impl IntoResponse for PackagedResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Single { filename, mime, data } => (
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
                    (header::CONTENT_DISPOSITION, attachment(&filename)),
                ],
                data,
            )
                .into_response(),
            Self::Archive(data) => (
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(ARCHIVE_MIME)),
                    (header::CONTENT_DISPOSITION, attachment(ARCHIVE_NAME)),
                ],
                data,
            )
                .into_response(),
            Self::Multipart(body) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static(MULTIPART_CONTENT_TYPE))],
                body,
            )
                .into_response(),
            Self::JsonList(files) => Json(files).into_response(),
        }
    }
}
