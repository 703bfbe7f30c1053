use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use url::form_urlencoded;

use super::error::ProtocolError;
use super::{Header, Target};
use crate::utils::parse_target;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientTimeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(10)),
            read: Some(Duration::from_secs(30)),
            write: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientTimeouts {
    pub fn disabled() -> Self {
        Self {
            connect: None,
            read: None,
            write: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub target: Target,
    pub method: String,
    pub headers: Vec<Header>,
    pub body: Option<Bytes>,
    pub trailers: Option<Vec<Header>>,
    pub params: Vec<(String, String)>,
    pub json: Option<Value>,
    pub cookies: Vec<(String, String)>,
    pub timeout: Option<ClientTimeouts>,
    pub allow_redirects: bool,
}

impl Request {
    pub fn new(target: &str, method: impl Into<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            target: parse_target(target)?,
            method: method.into(),
            headers: Vec::new(),
            body: None,
            trailers: None,
            params: Vec::new(),
            json: None,
            cookies: Vec::new(),
            timeout: None,
            allow_redirects: true,
        })
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_headers(mut self, headers: Vec<Header>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self.json = None;
        self
    }

    pub fn with_optional_body<B: Into<Bytes>>(mut self, body: Option<B>) -> Self {
        self.body = body.map(Into::into);
        if self.body.is_some() {
            self.json = None;
        }
        self
    }

    pub fn with_trailers(mut self, trailers: Option<Vec<Header>>) -> Self {
        self.trailers = trailers;
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        let serialized =
            serde_json::to_vec(&json).expect("serializing JSON body into bytes must succeed");
        self.body = Some(Bytes::from(serialized));
        self.json = Some(json);
        self
    }

    pub fn with_cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies = cookies
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self
    }

    pub fn with_timeout(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeout = Some(timeouts);
        self
    }

    pub fn with_allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    pub fn path(&self) -> String {
        let path = self.target.url.path();
        let path = if path.is_empty() { "/" } else { path };

        let existing_query = self.target.url.query();

        if self.params.is_empty() {
            match existing_query {
                Some(query) => {
                    let mut result = String::with_capacity(path.len() + query.len() + 1);
                    result.push_str(path);
                    result.push('?');
                    result.push_str(query);
                    result
                }
                None => path.to_string(),
            }
        } else {
            let estimated_param_size: usize = self
                .params
                .iter()
                .map(|(k, v)| k.len() + v.len() + 3)
                .sum();

            let total_capacity = path.len()
                + existing_query.map(|q| q.len() + 1).unwrap_or(0)
                + estimated_param_size
                + 10;

            let mut serializer =
                form_urlencoded::Serializer::new(String::with_capacity(estimated_param_size));
            for (key, value) in &self.params {
                serializer.append_pair(key, value);
            }
            let new_query = serializer.finish();

            let mut result = String::with_capacity(total_capacity);
            result.push_str(path);
            result.push('?');

            if let Some(existing) = existing_query {
                result.push_str(existing);
                if !new_query.is_empty() {
                    result.push('&');
                    result.push_str(&new_query);
                }
            } else {
                result.push_str(&new_query);
            }

            result
        }
    }

    pub fn effective_headers(&self) -> Vec<Header> {
        let additional_headers = (if self.json.is_some()
            && !Self::has_header_case_insensitive(&self.headers, crate::utils::CONTENT_TYPE_HEADER)
        {
            1
        } else {
            0
        }) + (if !self.cookies.is_empty()
            && !Self::has_header_case_insensitive(&self.headers, crate::utils::COOKIE_HEADER)
        {
            1
        } else {
            0
        });

        let mut headers = Vec::with_capacity(self.headers.len() + additional_headers);
        headers.extend_from_slice(&self.headers);

        if self.json.is_some()
            && !Self::has_header_case_insensitive(&headers, crate::utils::CONTENT_TYPE_HEADER)
        {
            headers.push(Header::new(
                crate::utils::CONTENT_TYPE_HEADER.to_string(),
                crate::utils::APPLICATION_JSON.to_string(),
            ));
        }

        if let Some(cookie_value) = self.cookie_header_value() {
            if !Self::has_header_case_insensitive(&headers, crate::utils::COOKIE_HEADER) {
                headers.push(Header::new(
                    crate::utils::COOKIE_HEADER.to_string(),
                    cookie_value,
                ));
            }
        }

        headers
    }

    pub fn effective_timeouts(&self, fallback: &ClientTimeouts) -> ClientTimeouts {
        self.timeout.clone().unwrap_or_else(|| fallback.clone())
    }

    fn cookie_header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            None
        } else {
            let estimated_size: usize = self
                .cookies
                .iter()
                .map(|(name, value)| name.len() + value.len() + 3)
                .sum();

            let mut result = String::with_capacity(estimated_size);
            let mut first = true;

            for (name, value) in &self.cookies {
                if !first {
                    result.push_str("; ");
                }
                result.push_str(name);
                result.push('=');
                result.push_str(value);
                first = false;
            }

            Some(result)
        }
    }

    fn has_header_case_insensitive(headers: &[Header], name: &str) -> bool {
        headers
            .iter()
            .any(|header| header.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_appends_params_to_existing_query() {
        let req = Request::new("https://h.example/search?q=a", "GET")
            .unwrap()
            .with_params([("page", "2")]);
        assert_eq!(req.path(), "/search?q=a&page=2");
    }

    #[test]
    fn effective_headers_adds_content_type_for_json() {
        let req = Request::new("https://h.example/", "POST")
            .unwrap()
            .with_json(serde_json::json!({"a": 1}));
        let headers = req.effective_headers();
        assert!(headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case(crate::utils::CONTENT_TYPE_HEADER)));
    }

    #[test]
    fn effective_headers_builds_cookie_header() {
        let req = Request::new("https://h.example/", "GET")
            .unwrap()
            .with_cookies([("a", "1"), ("b", "2")]);
        let headers = req.effective_headers();
        let cookie = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(crate::utils::COOKIE_HEADER))
            .expect("cookie header present");
        assert_eq!(cookie.value.as_deref(), Some("a=1; b=2"));
    }
}
