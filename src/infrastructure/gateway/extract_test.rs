use serde_json::json;
use serde_json::Value;

use super::extract_image;
use crate::domain::models::ChatReply;

fn reply_with_message(message: Value) -> ChatReply {
    return ChatReply::new(json!({"choices": [{"message": message}]}));
}

mod extract_image {
    use super::*;

    #[test]
    fn it_finds_images_array_image_url() {
        let reply = reply_with_message(json!({
            "images": [{"image_url": {"url": "data:image/png;base64,aaa"}}]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("data:image/png;base64,aaa".to_string())
        );
    }

    #[test]
    fn it_falls_back_to_images_array_url() {
        let reply = reply_with_message(json!({
            "images": [{"url": "https://img.example.com/a.png"}]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("https://img.example.com/a.png".to_string())
        );
    }

    #[test]
    fn it_prefers_images_array_over_content_string() {
        let reply = reply_with_message(json!({
            "images": [{"image_url": {"url": "A"}}],
            "content": "https://img.example.com/B.png"
        }));

        assert_eq!(extract_image(&reply), Some("A".to_string()));
    }

    #[test]
    fn it_scans_multimodal_content_parts() {
        let reply = reply_with_message(json!({
            "content": [
                {"type": "text", "text": "here you go"},
                {"type": "image_url", "image_url": {"url": "https://img.example.com/b.png"}}
            ]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("https://img.example.com/b.png".to_string())
        );
    }

    #[test]
    fn it_wraps_base64_image_parts_as_data_uris() {
        let reply = reply_with_message(json!({
            "content": [{"type": "image", "data": "zzz"}]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("data:image/png;base64,zzz".to_string())
        );
    }

    #[test]
    fn it_skips_malformed_parts_without_aborting_the_scan() {
        let reply = reply_with_message(json!({
            "content": [
                {"text": "part without a type"},
                {"type": "image_url", "image_url": {}},
                {"type": "image", "url": "https://img.example.com/c.png"}
            ]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("https://img.example.com/c.png".to_string())
        );
    }

    #[test]
    fn it_accepts_url_shaped_content_strings() {
        let reply = reply_with_message(json!({"content": "data:image/png;base64,bbb"}));

        assert_eq!(
            extract_image(&reply),
            Some("data:image/png;base64,bbb".to_string())
        );
    }

    #[test]
    fn it_rejects_prose_content_strings() {
        let reply = reply_with_message(json!({
            "content": "I cannot generate images, but here is a description."
        }));

        assert_eq!(extract_image(&reply), None);
    }

    #[test]
    fn it_checks_top_level_alternates_last() {
        let reply = ChatReply::new(json!({
            "choices": [{"message": {"content": "plain text"}}],
            "data": [{"url": "https://img.example.com/d.png"}]
        }));

        assert_eq!(
            extract_image(&reply),
            Some("https://img.example.com/d.png".to_string())
        );
    }

    #[test]
    fn it_returns_none_when_nothing_matches() {
        let reply = ChatReply::new(json!({"choices": []}));

        assert_eq!(extract_image(&reply), None);
    }
}
