//! Email bodies for each notification kind.

use super::MailContent;
use crate::config::SiteConfig;
use crate::db::models::Post;
use crate::render::{escape_html, excerpt, render_broadcast_html};

const EXCERPT_CHARS: usize = 280;

pub fn post_url(site: &SiteConfig, slug: &str) -> String {
    format!("{}/posts/{}", site.url, slug)
}

pub fn new_post(site: &SiteConfig, post: &Post) -> MailContent {
    let url = post_url(site, &post.slug);
    let preview = excerpt(&post.body, EXCERPT_CHARS);

    MailContent {
        subject: format!("New post: {}", post.title),
        html: format!(
            "<h2>{}</h2>\n<p>{}</p>\n<p><a href=\"{}\">Read the full post</a></p>",
            escape_html(&post.title),
            escape_html(&preview),
            escape_html(&url),
        ),
        text: format!("{}\n\n{}\n\nRead the full post: {}", post.title, preview, url),
    }
}

pub fn welcome(site: &SiteConfig) -> MailContent {
    MailContent {
        subject: format!("Subscribed to {}", site.title),
        html: format!(
            "<p>Thanks for subscribing to <a href=\"{}\">{}</a>. \
             You will get an email whenever a new post is published.</p>",
            escape_html(&site.url),
            escape_html(&site.title),
        ),
        text: format!(
            "Thanks for subscribing to {} ({}). \
             You will get an email whenever a new post is published.",
            site.title, site.url
        ),
    }
}

pub fn broadcast(subject: &str, message: &str) -> MailContent {
    MailContent {
        subject: subject.to_string(),
        html: render_broadcast_html(message),
        text: message.to_string(),
    }
}

pub fn test_message(site: &SiteConfig) -> MailContent {
    MailContent {
        subject: format!("Test email from {}", site.title),
        html: "<p>Email delivery is working.</p>".to_string(),
        text: "Email delivery is working.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn site() -> SiteConfig {
        SiteConfig {
            url: "https://blog.example.com".to_string(),
            title: "Notes".to_string(),
            description: "Things".to_string(),
        }
    }

    #[test]
    fn test_new_post_links_to_slug_and_escapes_title() {
        let post = Post {
            id: Uuid::new_v4(),
            title: "Tips & <Tricks>".to_string(),
            slug: "tips-tricks".to_string(),
            body: "Line one\nline two".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };
        let mail = new_post(&site(), &post);

        assert_eq!(mail.subject, "New post: Tips & <Tricks>");
        assert!(mail.html.contains("Tips &amp; &lt;Tricks&gt;"));
        assert!(mail.html.contains("https://blog.example.com/posts/tips-tricks"));
        assert!(mail.text.contains("Line one line two"));
    }

    #[test]
    fn test_broadcast_uses_broadcast_rendering() {
        let mail = broadcast("Hi", "a <b>\nc");
        assert_eq!(mail.html, "a &lt;b><br>c");
        assert_eq!(mail.text, "a <b>\nc");
    }
}
