use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::mail::templates::post_url;
use crate::render::excerpt;
use crate::state::AppState;

const FEED_SIZE: i64 = 50;
const DESCRIPTION_CHARS: usize = 300;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn render_feed(site: &SiteConfig, posts: &[Post]) -> String {
    let mut items = String::new();
    for post in posts {
        let link = post_url(site, &post.slug);
        items.push_str(&format!(
            "    <item>\n\
                   <title>{}</title>\n\
                   <link>{}</link>\n\
                   <description>{}</description>\n\
                   <pubDate>{}</pubDate>\n\
                   <guid isPermaLink=\"true\">{}</guid>\n\
                 </item>\n",
            escape_xml(&post.title),
            escape_xml(&link),
            escape_xml(&excerpt(&post.body, DESCRIPTION_CHARS)),
            rfc822(&post.created_at),
            escape_xml(&link),
        ));
    }

    let feed_url = format!("{}/rss.xml", site.url);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(&site.title),
        escape_xml(&site.url),
        escape_xml(&site.description),
        escape_xml(&feed_url),
        posts.first().map(|p| rfc822(&p.created_at)).unwrap_or_default(),
        items,
    )
}

/// GET /rss.xml - latest posts as RSS 2.0
pub async fn rss_feed(State(state): State<AppState>) -> AppResult<Response> {
    let posts = state.store.recent_posts(FEED_SIZE).await?;
    let xml = render_feed(&state.config.site, &posts);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, stale-while-revalidate=600",
            ),
        ],
        xml,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<title>"), "&lt;title&gt;");
        assert_eq!(escape_xml("\"quote\""), "&quot;quote&quot;");
    }

    #[test]
    fn test_rfc822_format() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(rfc822(&dt), "Mon, 15 Jan 2024 12:00:00 +0000");
    }

    #[test]
    fn test_render_feed_escapes_and_links() {
        let site = SiteConfig {
            url: "https://blog.example.com".to_string(),
            title: "Notes & Drafts".to_string(),
            description: "d".to_string(),
        };
        let post = Post {
            id: Uuid::new_v4(),
            title: "<b>Bold</b>".to_string(),
            slug: "bold".to_string(),
            body: "text".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            updated_at: None,
        };
        let xml = render_feed(&site, &[post]);
        assert!(xml.contains("<title>Notes &amp; Drafts</title>"));
        assert!(xml.contains("<title>&lt;b&gt;Bold&lt;/b&gt;</title>"));
        assert!(xml.contains("<link>https://blog.example.com/posts/bold</link>"));
        assert!(xml.contains("<lastBuildDate>Mon, 15 Jan 2024 12:00:00 +0000</lastBuildDate>"));
    }

    #[tokio::test]
    async fn test_rss_route_serves_xml() {
        let app = TestApp::new().await;
        app.create_post("Feed Me", "hungry").await;

        let req = Request::get("/rss.xml").body(Body::empty()).unwrap();
        let res = tower::ServiceExt::oneshot(app.router(), req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "application/rss+xml; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let xml = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(xml.contains("http://blog.test/posts/feed-me"));
    }
}
