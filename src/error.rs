use anyhow::anyhow;
use reqwest::StatusCode;

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
    // Some gateways respond with {"message":...,"detail":...}
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) detail: Option<String>,
}

impl ApiErrorResponse {
    fn is_empty(&self) -> bool {
        self.error.is_none()
            && self.error_description.is_none()
            && self.message.is_none()
            && self.detail.is_none()
    }
}

/// Parses a non-2xx body as a researchmap error payload, if it looks like one.
pub(crate) fn parse_api_error(body: &str) -> Option<ApiErrorResponse> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .filter(|e| !e.is_empty())
}

pub(crate) fn format_api_error(
    status: StatusCode,
    url: &str,
    e: &ApiErrorResponse,
) -> anyhow::Error {
    let title = e
        .error
        .as_deref()
        .or(e.message.as_deref())
        .unwrap_or("");
    let detail = e
        .error_description
        .as_deref()
        .or(e.detail.as_deref())
        .unwrap_or("");

    if status == StatusCode::NOT_FOUND {
        return anyhow!(
            "researchmap resource not found (HTTP 404).\n- Check that the researcher permalink is correct (it is the last path segment of https://researchmap.jp/<permalink>)\n- Check that the base url points at https://api.researchmap.jp\n\nServer message: {}\n{}\nrequest: {}",
            title,
            detail,
            url
        );
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "researchmap refused the request (HTTP {}).\n- The researcher profile may be private or the endpoint may not be public\n\nServer message: {}\n{}\nrequest: {}",
            status.as_u16(),
            title,
            detail,
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}\n{}",
        status.as_u16(),
        url,
        title,
        detail
    )
}
