//! 本服务自己生成的 VAST 文档

use quick_xml::escape::escape;

use super::VastDocument;

const VAST_OPEN: &str = r#"<VAST version="4.2" xmlns="http://www.iab.com/VAST">"#;
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// 只包含 `<Error>` 的文档，播放器总能解析
pub fn error_document(message: &str) -> VastDocument {
    VastDocument::from_trusted(format!(
        "{}\n{}<Error>{}</Error></VAST>",
        XML_DECL,
        VAST_OPEN,
        escape(message)
    ))
}

/// 指向另一个 VAST 地址的 Wrapper 广告
///
/// `impression` 为 `(id, url)`，可选。
pub fn wrapper_document(ad_id: &str, tag_uri: &str, impression: Option<(&str, &str)>) -> VastDocument {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECL);
    xml.push('\n');
    xml.push_str(VAST_OPEN);
    xml.push_str(&format!("<Ad id=\"{}\"><Wrapper>", escape(ad_id)));
    xml.push_str("<AdSystem>AdServer</AdSystem>");
    xml.push_str(&format!("<VASTAdTagURI>{}</VASTAdTagURI>", escape(tag_uri)));
    if let Some((id, url)) = impression {
        xml.push_str(&format!(
            "<Impression id=\"{}\">{}</Impression>",
            escape(id),
            escape(url)
        ));
    }
    xml.push_str("</Wrapper></Ad></VAST>");
    VastDocument::from_trusted(xml)
}

/// 兜底广告：Wrapper + zone 级别的 fallback 跟踪
pub fn fallback_wrapper(
    base_url: &str,
    zone_id: i64,
    fallback_id: i64,
    vast_url: &str,
) -> VastDocument {
    let tracking = format!(
        "{}/serve?type=track&zone_id={}&event=fallback",
        base_url.trim_end_matches('/'),
        zone_id
    );
    wrapper_document(
        &format!("fallback_{}", fallback_id),
        vast_url,
        Some(("tracking_fallback", &tracking)),
    )
}
