use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::looks_like_image;
use super::normalize_data_uri;
use super::save_version;

mod normalize {
    use super::*;

    #[test]
    fn it_prefixes_raw_base64() {
        assert_eq!(
            normalize_data_uri("iVBORw0KGgo="),
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn it_keeps_data_uris_untouched() {
        assert_eq!(
            normalize_data_uri("data:image/jpeg;base64,abc"),
            "data:image/jpeg;base64,abc"
        );
    }

    #[test]
    fn it_keeps_urls_untouched() {
        assert_eq!(
            normalize_data_uri("https://img.example.com/a.png"),
            "https://img.example.com/a.png"
        );
    }
}

mod looks_like {
    use super::*;

    #[test]
    fn it_accepts_image_data_uris_and_urls() {
        assert!(looks_like_image("data:image/png;base64,abc"));
        assert!(looks_like_image("http://img.example.com/a.png"));
        assert!(looks_like_image("https://img.example.com/a.png"));
    }

    #[test]
    fn it_rejects_prose_and_foreign_data_uris() {
        assert!(!looks_like_image("a nice description of a figure"));
        assert!(!looks_like_image("data:text/plain;base64,abc"));
    }
}

mod save {
    use super::*;

    #[test]
    fn it_writes_decoded_png_bytes_with_version_naming() -> Result<()> {
        let dir = std::env::temp_dir().join("easel-images-test");
        let payload = BASE64.encode(b"not really a png");
        let image = format!("data:image/png;base64,{payload}");

        let path = save_version(&image, &dir, 2)?;

        assert!(path.ends_with("academic-figure-v2.png"));
        assert_eq!(std::fs::read(&path)?, b"not really a png");

        std::fs::remove_dir_all(&dir)?;
        return Ok(());
    }

    #[test]
    fn it_refuses_remote_urls() {
        let dir = std::env::temp_dir().join("easel-images-test-url");
        let res = save_version("https://img.example.com/a.png", &dir, 1);
        assert!(res.is_err());
    }
}
