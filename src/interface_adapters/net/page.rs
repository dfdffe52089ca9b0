use axum::response::Html;

// Client page shipped inside the binary so the server has no runtime file dependency.
const INDEX_HTML: &str = include_str!("../../../static/index.html");

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
