//! View models and the pure functions that build them.
//!
//! Handlers decide *what* to show by calling these; a [`super::View`]
//! decides *where* it ends up on the page.

use crate::api::DeviceMessage;

const MISSING_API_KEY: &str = "⚠️ Informe uma chave de API.";
const API_KEY_SAVED: &str = "✅ Chave da API salva com sucesso!";
const API_KEY_REJECTED: &str = "❌ Erro ao salvar a chave da API: ";
const API_KEY_REQUEST_FAILED: &str = "❌ Erro na requisição ao salvar a chave da API.";
const CHECK_FAILED: &str = "❌ Erro: ";
const CHECK_REQUEST_FAILED: &str = "❌ Erro na requisição.";
const DEVICE_FOUND: &str = "✅ Dispositivo encontrado!";

/// Page regions the handlers write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    /// Main results area, also used for warnings and errors.
    Results,
    /// Confirmation area next to the API key form.
    ApiKeyStatus,
}

impl Panel {
    pub const fn element_id(self) -> &'static str {
        match self {
            Panel::Results => "resultado",
            Panel::ApiKeyStatus => "resultadoApiKey",
        }
    }
}

/// Replace the content of `panel` with `html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelUpdate {
    pub panel: Panel,
    pub html: String,
}

impl PanelUpdate {
    fn new(panel: Panel, html: impl Into<String>) -> Self {
        Self {
            panel,
            html: html.into(),
        }
    }
}

pub fn missing_api_key() -> PanelUpdate {
    PanelUpdate::new(Panel::Results, MISSING_API_KEY)
}

pub fn api_key_saved() -> PanelUpdate {
    PanelUpdate::new(Panel::ApiKeyStatus, API_KEY_SAVED)
}

pub fn api_key_rejected(error: &str) -> PanelUpdate {
    PanelUpdate::new(
        Panel::Results,
        format!("{}{}", API_KEY_REJECTED, escape_html(error)),
    )
}

pub fn api_key_request_failed() -> PanelUpdate {
    PanelUpdate::new(Panel::Results, API_KEY_REQUEST_FAILED)
}

/// One `<div>` per finding, or the "device found" notice when there are none.
pub fn device_messages(messages: &[DeviceMessage]) -> PanelUpdate {
    if messages.is_empty() {
        return PanelUpdate::new(Panel::Results, DEVICE_FOUND);
    }
    let html = messages
        .iter()
        .map(|item| {
            format!(
                "<div><strong>{}</strong> - {}</div>",
                escape_html(&item.category.to_uppercase()),
                escape_html(&item.message)
            )
        })
        .collect::<String>();
    PanelUpdate::new(Panel::Results, html)
}

/// Raw output from the legacy endpoint.
pub fn device_output(output: &str) -> PanelUpdate {
    if output.trim().is_empty() {
        return PanelUpdate::new(Panel::Results, DEVICE_FOUND);
    }
    PanelUpdate::new(Panel::Results, format!("<pre>{}</pre>", escape_html(output)))
}

pub fn device_check_failed(error: &str) -> PanelUpdate {
    PanelUpdate::new(Panel::Results, format!("{}{}", CHECK_FAILED, escape_html(error)))
}

pub fn device_request_failed() -> PanelUpdate {
    PanelUpdate::new(Panel::Results, CHECK_REQUEST_FAILED)
}

/// Escapes text for interpolation into element content.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
