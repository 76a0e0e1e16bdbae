//! Request extractors

use crate::AppState;
use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};
use iris_common::{errors::AppError, services::ClientContext};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// JSON body whose rejections are reported as `AppError`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Client address and user agent of the request
pub struct ClientMeta(pub ClientContext);

fn forwarded_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
}

impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.server.trust_forwarded_for {
            forwarded_ip(parts)
        } else {
            None
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(ClientMeta(ClientContext {
            ip: forwarded.or(peer),
            user_agent,
        }))
    }
}
