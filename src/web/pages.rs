//! Attribute page handler.

use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;

use crate::render::{collect_attributes, render, AttributeSource, PageFormat};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub format: Option<String>,
}

/// Render the session's attributes. Serves `/` (anonymous allowed) and
/// `/login` (behind the require-account layer).
pub async fn index(
    Query(query): Query<IndexQuery>,
    session: Option<Extension<Session>>,
) -> Response {
    let format = PageFormat::from_query(query.format.as_deref());
    let source = session
        .as_ref()
        .map(|Extension(s)| s as &dyn AttributeSource);
    let attributes = collect_attributes(source);

    match render(&attributes, format) {
        Ok(page) => ([(header::CONTENT_TYPE, page.content_type)], page.body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(format: Option<&str>) -> Query<IndexQuery> {
        Query(IndexQuery {
            format: format.map(|f| f.to_string()),
        })
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn test_session() -> Session {
        let mut session = Session::new(
            "user@example.com".to_string(),
            "assertion-1".to_string(),
            "https://idp.example.com".to_string(),
            3600,
        );
        session.attributes.insert(
            "roles".to_string(),
            vec!["admin".to_string(), "user".to_string()],
        );
        session
    }

    #[tokio::test]
    async fn test_anonymous_html_page() {
        let response = index(query(None), None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let body = body_string(response).await;
        assert!(body.contains(r#"<a href="/login">login</a>"#));
        assert!(!body.contains("SAML Attributes"));
    }

    #[tokio::test]
    async fn test_unknown_format_is_html() {
        let response = index(query(Some("garbage")), None).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_text_page_with_session() {
        let session = test_session();
        let response = index(query(Some("text")), Some(Extension(session))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

        let body = body_string(response).await;
        assert_eq!(body, "# SAML Attributes\nroles: admin\nroles: user\n");
    }

    #[tokio::test]
    async fn test_html_page_with_session() {
        let session = test_session();
        let response = index(query(None), Some(Extension(session))).await;

        let body = body_string(response).await;
        assert_eq!(body.matches("<th>roles</th>").count(), 2);
        assert!(body.contains("<td>admin</td>"));
        assert!(body.contains("<td>user</td>"));
    }
}
