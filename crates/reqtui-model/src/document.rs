//! Document and Environment (spec §3): the shape a parsed `.http`-style file
//! takes once handed to the engine. Parsing itself is an external
//! collaborator (spec §1, "Parser" is out of scope); this module only models
//! what the parser is expected to hand back.

use crate::request::RequestDescriptor;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub name: String,
    pub variables: HashMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: HashMap::new(),
        }
    }
}

/// One parsed `.http`-family file: a sequence of requests plus any
/// document-level defaults (spec §3, §4.2: "doc defaults" is the lowest
/// precedence provider in the variable chain).
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub requests: Vec<RequestDescriptor>,
    pub defaults: HashMap<String, String>,
}

impl Document {
    /// Find the request whose `line_range` contains `line` (spec §3: cursor
    /// position maps to "the request under the cursor").
    pub fn request_at_line(&self, line: usize) -> Option<&RequestDescriptor> {
        self.requests
            .iter()
            .find(|r| r.line_range.0 <= line && line <= r.line_range.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::request::{BodySource, HttpMethod, Method, RequestMetadata, RequestSettings};

    fn request(range: (usize, usize)) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::Http(HttpMethod::Get),
            url: "https://example.com".into(),
            grpc: None,
            headers: Headers::new(),
            body: BodySource::None,
            metadata: RequestMetadata::default(),
            settings: RequestSettings::default(),
            line_range: range,
        }
    }

    #[test]
    fn request_at_line_matches_containing_range() {
        let doc = Document {
            path: "/a.http".into(),
            requests: vec![request((0, 4)), request((5, 10))],
            defaults: HashMap::new(),
        };
        assert!(doc.request_at_line(2).unwrap().line_range == (0, 4));
        assert!(doc.request_at_line(7).unwrap().line_range == (5, 10));
        assert!(doc.request_at_line(100).is_none());
    }
}
