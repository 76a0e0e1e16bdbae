//! QR code rendering

use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Response},
};
use image::{DynamicImage, ImageFormat, Luma};
use iris_common::errors::{AppError, Result};
use qrcode::QrCode;
use serde::Deserialize;
use std::io::Cursor;

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    pub url: Option<String>,
}

/// Encode `data` as a PNG QR code
pub fn render_png(data: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| AppError::InvalidFormat {
        message: format!("Cannot encode QR payload: {}", e),
    })?;
    let image = code.render::<Luma<u8>>().build();

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| AppError::Internal {
            message: format!("PNG encoding failed: {}", e),
        })?;

    Ok(buf.into_inner())
}

/// Render `?url=` as a QR code image
pub async fn qr(Query(query): Query<QrQuery>) -> Result<Response> {
    let url = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::missing("url"))?;

    let png = render_png(&url)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
