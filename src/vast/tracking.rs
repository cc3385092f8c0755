//! 跟踪注入
//!
//! 在每个 `Ad > InLine` 的末尾追加一个 `<Impression>`，指向本服务的跟踪像素。
//! 原文档中的其它节点按原样流式写回，不重排、不删除。

use std::io::Cursor;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::{debug, warn};

use super::{VastDocument, VastParseError};

/// 一次注入所需的跟踪参数
#[derive(Debug, Clone)]
pub struct TrackingTag<'a> {
    pub zone_id: i64,
    pub campaign_id: Option<i64>,
    pub impression_id: &'a str,
    /// internal / external / fallback，写入 `id="tracking_<kind>"`
    pub kind: &'a str,
}

#[derive(Debug, Clone)]
pub struct TrackingWrapper {
    base_url: String,
}

impl TrackingWrapper {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn tracking_url(&self, tag: &TrackingTag<'_>) -> String {
        let mut url = format!(
            "{}/serve?type=track&zone_id={}",
            self.base_url, tag.zone_id
        );
        if let Some(campaign_id) = tag.campaign_id {
            url.push_str(&format!("&campaign_id={}", campaign_id));
        }
        url.push_str(&format!(
            "&impression_id={}&event=impression",
            urlencoding::encode(tag.impression_id)
        ));
        url
    }

    /// 注入跟踪；任何解析 / 序列化失败都原样返回输入文档
    pub fn wrap(&self, doc: &VastDocument, tag: &TrackingTag<'_>) -> VastDocument {
        let url = self.tracking_url(tag);
        let impression_id = format!("tracking_{}", tag.kind);

        match inject(doc.as_str(), &impression_id, &url) {
            Ok((xml, 0)) => {
                debug!("TrackingWrapper: no InLine ad found, document unchanged");
                VastDocument::from_trusted(xml)
            }
            Ok((xml, injected)) => match VastDocument::parse(&xml) {
                Ok(wrapped) => {
                    debug!(
                        "TrackingWrapper: injected {} impression tracker(s) for zone {}",
                        injected, tag.zone_id
                    );
                    wrapped
                }
                Err(e) => {
                    warn!("TrackingWrapper: wrapped document invalid ({}), serving original", e);
                    doc.clone()
                }
            },
            Err(e) => {
                warn!("TrackingWrapper: failed to inject tracking ({}), serving original", e);
                doc.clone()
            }
        }
    }
}

fn xml_err(e: impl std::fmt::Display) -> VastParseError {
    VastParseError::Malformed(e.to_string())
}

/// 返回新文档以及注入的 Impression 数量
fn inject(xml: &str, impression_id: &str, url: &str) -> Result<(String, usize), VastParseError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(xml.len() + 256)));
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut injected = 0;

    let write_tracker = |writer: &mut Writer<Cursor<Vec<u8>>>| -> Result<(), VastParseError> {
        writer
            .write_event(Event::Start(
                BytesStart::new("Impression").with_attributes([("id", impression_id)]),
            ))
            .map_err(xml_err)?;
        writer
            .write_event(Event::CData(BytesCData::new(url)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("Impression")))
            .map_err(xml_err)?;
        Ok(())
    };

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(e) => {
                stack.push(e.local_name().as_ref().to_vec());
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
            }
            Event::End(e) => {
                let closes_inline = e.local_name().as_ref() == b"InLine"
                    && stack.len() >= 2
                    && stack[stack.len() - 2] == b"Ad";
                if closes_inline {
                    write_tracker(&mut writer)?;
                    injected += 1;
                }
                stack.pop();
                writer.write_event(Event::End(e)).map_err(xml_err)?;
            }
            Event::Empty(e)
                if e.local_name().as_ref() == b"InLine"
                    && stack.last().is_some_and(|parent| parent == b"Ad") =>
            {
                // <InLine/> 展开后再注入
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
                write_tracker(&mut writer)?;
                injected += 1;
                writer
                    .write_event(Event::End(BytesEnd::new(name)))
                    .map_err(xml_err)?;
            }
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }

    let bytes = writer.into_inner().into_inner();
    let out = String::from_utf8(bytes).map_err(xml_err)?;
    Ok((out, injected))
}
