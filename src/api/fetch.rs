//! `window.fetch` transport.

use super::{HttpResponse, Transport, TransportError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

/// Fetch with JSON bodies. No timeout beyond the browser's own.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchTransport;

fn network_err(e: JsValue) -> TransportError {
    let msg = e.as_string().unwrap_or_else(|| format!("{:?}", e));
    TransportError::Network(msg)
}

impl Transport for FetchTransport {
    async fn post_json(&self, url: &str, body: &str) -> Result<HttpResponse, TransportError> {
        let window =
            web_sys::window().ok_or_else(|| TransportError::Network("No window object".into()))?;

        let headers = Headers::new().map_err(network_err)?;
        headers
            .set("Content-Type", "application/json")
            .map_err(network_err)?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(body));

        let request = Request::new_with_str_and_init(url, &init).map_err(network_err)?;

        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(network_err)?
            .dyn_into()
            .map_err(|_| TransportError::Network("fetch did not return a Response".into()))?;

        let status = response.status();
        let text = JsFuture::from(response.text().map_err(network_err)?)
            .await
            .map_err(network_err)?;

        let body = text.as_string().ok_or_else(|| TransportError::InvalidResponse {
            status,
            reason: "body is not text".to_string(),
        })?;

        Ok(HttpResponse { status, body })
    }
}
